use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context as _;
use anyhow::Error;
use anyhow::Result;

use modsym::Addr;

use clap::ArgAction;
use clap::Parser;


/// Parse a hexadecimal number, with or without `0x` prefix.
fn parse_hex(s: &str) -> Result<u64> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .with_context(|| format!("failed to parse hexadecimal number: {s}"))
}


/// A loaded module, as specified on the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name: String,
    pub base: Addr,
    pub size: u64,
}

impl FromStr for Module {
    type Err = Error;

    /// Parse a module from a string of the form `NAME=BASE:SIZE`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, range) = s
            .rsplit_once('=')
            .with_context(|| format!("module `{s}` is not of the form NAME=BASE:SIZE"))?;
        let (base, size) = range
            .split_once(':')
            .with_context(|| format!("module range `{range}` is not of the form BASE:SIZE"))?;

        let module = Self {
            name: name.to_string(),
            base: parse_hex(base)?,
            size: parse_hex(size)?,
        };
        Ok(module)
    }
}


/// A module relative offset to symbolize.
#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    pub module: String,
    pub offset: u64,
}

impl FromStr for Input {
    type Err = Error;

    /// Parse an input of the form `MODULE+OFFSET`.
    fn from_str(s: &str) -> Result<Self> {
        let (module, offset) = s
            .rsplit_once('+')
            .with_context(|| format!("input `{s}` is not of the form MODULE+OFFSET"))?;

        let input = Self {
            module: module.to_string(),
            offset: parse_hex(offset)?,
        };
        Ok(input)
    }
}


/// Symbolize module relative offsets using Breakpad symbol files.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    /// The directory containing the symbol files.
    #[arg(short, long, default_value = ".")]
    pub symbol_dir: PathBuf,
    /// The extension of symbol files.
    #[arg(short, long, default_value = "sym")]
    pub ext: String,
    /// A loaded module, in the form NAME=BASE:SIZE (with BASE and SIZE
    /// in hexadecimal). Can be supplied multiple times.
    #[arg(short, long = "module")]
    pub modules: Vec<Module>,
    /// Disable the reporting of source code locations.
    #[arg(long)]
    pub no_lines: bool,
    /// Disable the usage of inline information.
    #[arg(long)]
    pub no_inlined: bool,
    /// Disable the demangling of symbol names.
    #[arg(long)]
    pub no_demangle: bool,
    /// The module relative offsets to symbolize, in the form
    /// MODULE+OFFSET (with OFFSET in hexadecimal).
    #[arg(required = true)]
    pub inputs: Vec<Input>,
    /// Increase verbosity (can be supplied multiple times).
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbosity: u8,
}
