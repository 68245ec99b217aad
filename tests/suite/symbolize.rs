use std::path::Path;
use std::sync::Arc;

use modsym::symbolize::format;
use modsym::symbolize::Reason;
use modsym::symbolize::Symbolized;
use modsym::symbolize::Symbolizer;
use modsym::ErrorKind;
use modsym::InlineContext;
use modsym::ModuleMap;
use modsym::ResolvedLine;
use modsym::ResolvedSym;

use test_log::test;

use crate::suite::common::CountingLocator;
use crate::suite::common::Script;
use crate::suite::common::ScriptedProvider;


const NTFS_BASE: u64 = 0xfffff80000000000;

fn ntfs_modules() -> ModuleMap {
    let mut modules = ModuleMap::new();
    let _prev = modules.insert("ntfs.sys", NTFS_BASE, 0x100000);
    modules
}

fn ntfs_read() -> Option<ResolvedSym> {
    Some(ResolvedSym::new("NtfsRead", 0x20))
}

/// Create a symbolizer using a provider following `script` and the
/// module map with `ntfs.sys`.
fn ntfs_symbolizer(script: Script) -> (Symbolizer, Arc<ScriptedProvider>, Arc<CountingLocator>) {
    let provider = Arc::new(ScriptedProvider::new(script));
    let locator = Arc::new(CountingLocator::new(ntfs_modules()));
    let symbolizer = Symbolizer::builder()
        .set_symbol_dir("C:\\symbols")
        .build(Arc::clone(&provider), Arc::clone(&locator))
        .unwrap();
    (symbolizer, provider, locator)
}


/// Check that a module unknown to the locator is reported as module
/// plus offset, without consulting the provider.
#[test]
fn symbolize_unknown_module() {
    let provider = Arc::new(ScriptedProvider::default());
    let locator = Arc::new(CountingLocator::default());
    let symbolizer = Symbolizer::new(Arc::clone(&provider), Arc::clone(&locator)).unwrap();

    assert_eq!(symbolizer.symbolize("ntfs.sys", 0x100), "ntfs.sys+100");
    assert_eq!(
        symbolizer.resolve("ntfs.sys", 0x100),
        Symbolized::Unknown(Reason::ModuleNotFound)
    );
    assert_eq!(provider.load_count(), 0);
    assert_eq!(provider.calls.nearest_symbol.get(), 0);

    // The failure is remembered.
    assert_eq!(symbolizer.symbolize("ntfs.sys", 0x200), "ntfs.sys+200");
    assert_eq!(locator.lookups.get(), 1);
    assert_eq!(provider.load_count(), 0);
}

/// Make sure that a module whose debug symbols failed to load is never
/// attempted again.
#[test]
fn symbolize_negative_cache() {
    let (symbolizer, provider, locator) = ntfs_symbolizer(Script {
        load: false,
        ..Default::default()
    });

    for offset in [0x100, 0x200, 0x100, 0x0] {
        let result = symbolizer.resolve("ntfs.sys", offset);
        assert_eq!(result, Symbolized::Unknown(Reason::MissingSyms));
    }
    assert_eq!(symbolizer.symbolize("ntfs.sys", 0x300), "ntfs.sys+300");

    assert_eq!(provider.load_count(), 1);
    assert_eq!(locator.lookups.get(), 1);
    assert_eq!(provider.calls.nearest_symbol.get(), 0);

    // Tearing down does not unload anything for the failed module.
    let () = symbolizer.teardown();
    assert_eq!(provider.unload_count(), 0);
}

/// Check that the provider is asked to load the debug file derived from
/// the module name at the module's location.
#[test]
fn symbolize_load_parameters() {
    let (symbolizer, provider, _locator) = ntfs_symbolizer(Script::default());
    let _s = symbolizer.symbolize("ntfs.sys", 0x100);

    let loads = provider.calls.loads.lock().unwrap();
    assert_eq!(
        loads.as_slice(),
        &[(
            Path::new("C:\\symbols").join("ntfs.pdb"),
            NTFS_BASE,
            0x100000
        )]
    );
}

/// Check that a configured debug file extension is honored.
#[test]
fn symbolize_debug_file_ext() {
    let provider = Arc::new(ScriptedProvider::default());
    let symbolizer = Symbolizer::builder()
        .set_symbol_dir("syms")
        .set_debug_file_ext("sym")
        .build(Arc::clone(&provider), ntfs_modules())
        .unwrap();
    let _s = symbolizer.symbolize("ntfs.sys", 0x100);

    assert_eq!(
        provider.calls.loads.lock().unwrap()[0].0,
        Path::new("syms").join("ntfs.sym")
    );
}

/// Check that we report a symbol without source information.
#[test]
fn symbolize_symbol_only() {
    let (symbolizer, provider, _locator) = ntfs_symbolizer(Script {
        symbol: Some(ntfs_read()),
        ..Default::default()
    });

    assert_eq!(symbolizer.symbolize("ntfs.sys", 0x100), "ntfs.sys!NtfsRead+20");
    assert_eq!(provider.calls.resolve_line.get(), 1);
    assert_eq!(provider.calls.query_inline_context.get(), 0);
}

/// Check that we report source information from an inline context.
#[test]
fn symbolize_inline_line() {
    let (symbolizer, provider, _locator) = ntfs_symbolizer(Script {
        symbol: Some(ntfs_read()),
        inline_frames: true,
        inline_line: Some(Some(ResolvedLine::new("ntfs.c", 542, 0))),
        ..Default::default()
    });

    assert_eq!(
        symbolizer.symbolize("ntfs.sys", 0x100),
        "ntfs.sys!NtfsRead+20 [ntfs.c @ 542]"
    );
    // Direct line lookup is not necessary.
    assert_eq!(provider.calls.resolve_line.get(), 0);

    let sym = symbolizer.resolve("ntfs.sys", 0x100).into_sym().unwrap();
    assert_eq!(sym.name, "NtfsRead");
    assert_eq!(sym.offset, 0x20);
    let code_info = sym.code_info.unwrap();
    assert_eq!(code_info.file, "ntfs.c");
    assert_eq!(code_info.line, 542);
    assert!(code_info.inlined);
}

/// Check the fallback behavior of the various provider query failure
/// combinations.
#[test]
fn symbolize_fallback_grid() {
    let direct = || Some(Some(ResolvedLine::new("ntfs.c", 100, 4)));
    let inline = || Some(Some(ResolvedLine::new("attr.h", 7, 0)));
    let cases = [
        // Symbol lookup failure.
        (
            Script {
                symbol: None,
                line: direct(),
                ..Default::default()
            },
            "ntfs.sys+100",
        ),
        // No symbol.
        (
            Script {
                line: direct(),
                ..Default::default()
            },
            "ntfs.sys+100",
        ),
        // Symbol with direct line information.
        (
            Script {
                symbol: Some(ntfs_read()),
                line: direct(),
                ..Default::default()
            },
            "ntfs.sys!NtfsRead+20 [ntfs.c @ 100]",
        ),
        // Failing direct line lookup.
        (
            Script {
                symbol: Some(ntfs_read()),
                line: None,
                ..Default::default()
            },
            "ntfs.sys!NtfsRead+20",
        ),
        // Failing inline context query falls back to direct lookup.
        (
            Script {
                symbol: Some(ntfs_read()),
                inline_frames: true,
                inline_context: None,
                inline_line: inline(),
                line: direct(),
                ..Default::default()
            },
            "ntfs.sys!NtfsRead+20 [ntfs.c @ 100]",
        ),
        // Missing inline line falls back to direct lookup.
        (
            Script {
                symbol: Some(ntfs_read()),
                inline_frames: true,
                inline_line: Some(None),
                line: direct(),
                ..Default::default()
            },
            "ntfs.sys!NtfsRead+20 [ntfs.c @ 100]",
        ),
        // Failing inline line lookup falls back to direct lookup.
        (
            Script {
                symbol: Some(ntfs_read()),
                inline_frames: true,
                inline_line: None,
                line: None,
                ..Default::default()
            },
            "ntfs.sys!NtfsRead+20",
        ),
        // Inline information takes precedence.
        (
            Script {
                symbol: Some(ntfs_read()),
                inline_frames: true,
                inline_line: inline(),
                line: direct(),
                ..Default::default()
            },
            "ntfs.sys!NtfsRead+20 [attr.h @ 7]",
        ),
    ];

    for (script, expected) in cases {
        let (symbolizer, _provider, _locator) = ntfs_symbolizer(script.clone());
        assert_eq!(
            symbolizer.symbolize("ntfs.sys", 0x100),
            expected,
            "{script:?}"
        );
    }
}

/// Make sure that an inline context is queried at most once per
/// request.
#[test]
fn symbolize_inline_context_query() {
    let (symbolizer, provider, _locator) = ntfs_symbolizer(Script {
        symbol: Some(ntfs_read()),
        inline_frames: true,
        inline_context: Some(InlineContext::new(3)),
        inline_line: Some(Some(ResolvedLine::new("ntfs.c", 542, 0))),
        ..Default::default()
    });

    let _s = symbolizer.symbolize("ntfs.sys", 0x100);
    assert_eq!(provider.calls.has_inline_frames.get(), 1);
    assert_eq!(provider.calls.query_inline_context.get(), 1);
    assert_eq!(provider.calls.resolve_inline_line.get(), 1);
}

/// Check that symbolizing the same offset twice yields the same result.
#[test]
fn symbolize_deterministic() {
    let (symbolizer, provider, _locator) = ntfs_symbolizer(Script {
        symbol: Some(ntfs_read()),
        line: Some(Some(ResolvedLine::new("ntfs.c", 100, 0))),
        ..Default::default()
    });

    let first = symbolizer.symbolize("ntfs.sys", 0x100);
    let second = symbolizer.symbolize("ntfs.sys", 0x100);
    assert_eq!(first, second);
    // Debug symbols are loaded once, but looked up every time.
    assert_eq!(provider.load_count(), 1);
    assert_eq!(provider.calls.nearest_symbol.get(), 2);
}

/// Check that the structured and textual results agree.
#[test]
fn symbolize_format_consistency() {
    let (symbolizer, _provider, _locator) = ntfs_symbolizer(Script {
        symbol: Some(ntfs_read()),
        line: Some(Some(ResolvedLine::new("ntfs.c", 100, 0))),
        ..Default::default()
    });

    for module in ["ntfs.sys", "hal.dll"] {
        let result = symbolizer.resolve(module, 0x42);
        assert_eq!(format(module, 0x42, &result), symbolizer.symbolize(module, 0x42));
    }
}

/// Make sure that long symbol and file names are reported in full.
#[test]
fn symbolize_long_names() {
    let name = format!("NtfsRead{}", "X".repeat(2000));
    let file = format!("{}\\ntfs.c", "d".repeat(600));
    let (symbolizer, _provider, _locator) = ntfs_symbolizer(Script {
        symbol: Some(Some(ResolvedSym::new(&name, 0x1))),
        line: Some(Some(ResolvedLine::new(&file, 1, 0))),
        ..Default::default()
    });

    assert_eq!(
        symbolizer.symbolize("ntfs.sys", 0x100),
        format!("ntfs.sys!{name}+1 [{file} @ 1]")
    );
}

/// Check that teardown releases every loaded session exactly once.
#[test]
fn symbolize_teardown_twice() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut modules = ntfs_modules();
    let _prev = modules.insert("hal.dll", 0x80000000, 0x10000);
    let symbolizer = Symbolizer::new(Arc::clone(&provider), modules).unwrap();

    let _s = symbolizer.symbolize("ntfs.sys", 0x1);
    let _s = symbolizer.symbolize("hal.dll", 0x1);
    let _s = symbolizer.symbolize("win32k.sys", 0x1);
    assert_eq!(provider.load_count(), 2);

    let () = symbolizer.teardown();
    assert_eq!(provider.unload_count(), 2);
    let () = symbolizer.teardown();
    assert_eq!(provider.unload_count(), 2);

    // Dropping does not unload anything either.
    let () = drop(symbolizer);
    assert_eq!(provider.unload_count(), 2);
}

/// Make sure that requests after teardown degrade to module plus
/// offset.
#[test]
fn symbolize_after_teardown() {
    let (symbolizer, provider, locator) = ntfs_symbolizer(Script {
        symbol: Some(ntfs_read()),
        ..Default::default()
    });
    assert_eq!(symbolizer.symbolize("ntfs.sys", 0x100), "ntfs.sys!NtfsRead+20");

    let () = symbolizer.teardown();
    assert_eq!(symbolizer.symbolize("ntfs.sys", 0x100), "ntfs.sys+100");
    assert_eq!(
        symbolizer.resolve("ntfs.sys", 0x100),
        Symbolized::Unknown(Reason::TornDown)
    );
    assert_eq!(provider.load_count(), 1);
    assert_eq!(provider.calls.nearest_symbol.get(), 1);
    assert_eq!(locator.lookups.get(), 1);
}

/// Check that a provider initialization failure is reported to the
/// caller.
#[test]
fn symbolize_init_failure() {
    let provider = Arc::new(ScriptedProvider::new(Script {
        init: false,
        ..Default::default()
    }));
    let err = Symbolizer::new(Arc::clone(&provider), ntfs_modules()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(
        format!("{err:#}").contains("symbol engine unavailable"),
        "{err:#}"
    );
    assert_eq!(provider.calls.initialize.get(), 1);
    assert_eq!(provider.load_count(), 0);
}
