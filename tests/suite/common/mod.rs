use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use modsym::Addr;
use modsym::Error;
use modsym::InlineContext;
use modsym::ModuleInfo;
use modsym::ModuleLocator;
use modsym::ModuleMap;
use modsym::ResolvedLine;
use modsym::ResolvedSym;
use modsym::Result;
use modsym::SessionHandle;
use modsym::SymOptions;
use modsym::SymbolProvider;


fn failure(msg: &str) -> Error {
    Error::from(io::Error::new(io::ErrorKind::Other, msg.to_string()))
}

/// A thread safe call counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicUsize);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    fn bump(&self) {
        let _prev = self.0.fetch_add(1, Ordering::Relaxed);
    }
}


/// The answers a [`ScriptedProvider`] gives.
///
/// `None` for one of the `Result` fields means that the corresponding
/// query fails.
#[derive(Clone, Debug)]
pub struct Script {
    pub init: bool,
    pub load: bool,
    pub symbol: Option<Option<ResolvedSym>>,
    pub inline_frames: bool,
    pub inline_context: Option<InlineContext>,
    pub inline_line: Option<Option<ResolvedLine>>,
    pub line: Option<Option<ResolvedLine>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            init: true,
            load: true,
            symbol: Some(None),
            inline_frames: false,
            inline_context: Some(InlineContext::new(0)),
            inline_line: Some(None),
            line: Some(None),
        }
    }
}


/// Counters of the calls a [`ScriptedProvider`] received.
#[derive(Debug, Default)]
pub struct Calls {
    pub initialize: Counter,
    pub loads: Mutex<Vec<(PathBuf, Addr, u64)>>,
    pub unloads: Mutex<Vec<SessionHandle>>,
    pub nearest_symbol: Counter,
    pub has_inline_frames: Counter,
    pub query_inline_context: Counter,
    pub resolve_inline_line: Counter,
    pub resolve_line: Counter,
}


/// A symbol provider answering queries according to a [`Script`] and
/// counting how often it got invoked.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    pub script: Script,
    pub calls: Calls,
    next_handle: AtomicU64,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Calls::default(),
            next_handle: AtomicU64::new(0),
        }
    }

    pub fn load_count(&self) -> usize {
        self.calls.loads.lock().unwrap().len()
    }

    pub fn unload_count(&self) -> usize {
        self.calls.unloads.lock().unwrap().len()
    }
}

impl SymbolProvider for ScriptedProvider {
    fn initialize(&self, _opts: &SymOptions) -> Result<()> {
        let () = self.calls.initialize.bump();
        if self.script.init {
            Ok(())
        } else {
            Err(failure("symbol engine unavailable"))
        }
    }

    fn load_session(&self, path: &Path, base: Addr, size: u64) -> Result<SessionHandle> {
        let () = self
            .calls
            .loads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), base, size));

        if !self.script.load {
            return Err(failure("debug file not found"))
        }

        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(SessionHandle::new(raw).unwrap())
    }

    fn unload_session(&self, session: SessionHandle) {
        let () = self.calls.unloads.lock().unwrap().push(session);
    }

    fn nearest_symbol(&self, _addr: Addr) -> Result<Option<ResolvedSym>> {
        let () = self.calls.nearest_symbol.bump();
        self.script
            .symbol
            .clone()
            .ok_or_else(|| failure("symbol lookup failed"))
    }

    fn has_inline_frames(&self, _addr: Addr) -> bool {
        let () = self.calls.has_inline_frames.bump();
        self.script.inline_frames
    }

    fn query_inline_context(&self, _addr: Addr) -> Result<InlineContext> {
        let () = self.calls.query_inline_context.bump();
        self.script
            .inline_context
            .ok_or_else(|| failure("inline context query failed"))
    }

    fn resolve_inline_line(
        &self,
        _addr: Addr,
        _ctx: InlineContext,
    ) -> Result<Option<ResolvedLine>> {
        let () = self.calls.resolve_inline_line.bump();
        self.script
            .inline_line
            .clone()
            .ok_or_else(|| failure("inline line lookup failed"))
    }

    fn resolve_line(&self, _addr: Addr) -> Result<Option<ResolvedLine>> {
        let () = self.calls.resolve_line.bump();
        self.script
            .line
            .clone()
            .ok_or_else(|| failure("line lookup failed"))
    }
}


/// A module locator counting the lookups it served.
#[derive(Debug, Default)]
pub struct CountingLocator {
    pub modules: ModuleMap,
    pub lookups: Counter,
}

impl CountingLocator {
    pub fn new(modules: ModuleMap) -> Self {
        Self {
            modules,
            lookups: Counter::default(),
        }
    }
}

impl ModuleLocator for CountingLocator {
    fn find_module(&self, name: &str) -> Option<ModuleInfo> {
        let () = self.lookups.bump();
        self.modules.find_module(name)
    }
}
