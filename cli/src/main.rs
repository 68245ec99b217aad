#![allow(clippy::let_and_return, clippy::let_unit_value)]

mod args;

use std::io::stderr;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

use modsym::breakpad::BreakpadProvider;
use modsym::symbolize::Symbolizer;
use modsym::ModuleMap;

use clap::Parser as _;

use tracing::subscriber::set_global_default as set_global_subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::FmtSubscriber;


/// Build the module map from the `--module` arguments, rejecting
/// modules named more than once.
fn module_map(modules: Vec<args::Module>) -> Result<ModuleMap> {
    let mut map = ModuleMap::new();
    for args::Module { name, base, size } in modules {
        if map.insert(name.as_str(), base, size).is_some() {
            bail!("module `{name}` specified more than once");
        }
    }
    Ok(map)
}

fn symbolize(args: args::Args) -> Result<()> {
    let args::Args {
        symbol_dir,
        ext,
        modules,
        no_lines,
        no_inlined,
        no_demangle,
        inputs,
        verbosity,
    } = args;

    let modules = module_map(modules)?;

    let symbolizer = Symbolizer::builder()
        .set_symbol_dir(symbol_dir)
        .set_debug_file_ext(ext)
        .enable_line_number_info(!no_lines)
        .enable_inlined_fns(!no_inlined)
        .enable_demangling(!no_demangle)
        .enable_debug_output(verbosity > 0)
        .build(BreakpadProvider::new(), modules)
        .context("failed to create symbolizer")?;

    for args::Input { module, offset } in inputs {
        println!("{}", symbolizer.symbolize(&module, offset));
    }

    let () = symbolizer.teardown();
    Ok(())
}


fn main() -> Result<()> {
    let args = args::Args::parse();
    let level = match args.verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_span_events(FmtSpan::FULL)
        .with_timer(SystemTime)
        .with_writer(stderr)
        .finish();

    let () =
        set_global_subscriber(subscriber).with_context(|| "failed to set tracing subscriber")?;

    symbolize(args)
}
