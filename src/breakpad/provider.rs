use std::cell::Cell;
use std::cell::RefCell;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;

use memmap2::Mmap;

use crate::log;
use crate::Addr;
use crate::Error;
use crate::ErrorExt as _;
use crate::InlineContext;
use crate::IntoError as _;
use crate::ResolvedLine;
use crate::ResolvedSym;
use crate::Result;
use crate::SessionHandle;
use crate::SymOptions;
use crate::SymbolProvider;

use super::parser::parse_symbol_file;
use super::types::Function;
use super::types::SymbolFile;


/// A loaded Breakpad symbol file.
struct Session {
    handle: SessionHandle,
    path: PathBuf,
    base: Addr,
    size: u64,
    file: SymbolFile,
}

impl Session {
    /// Convert `addr` into an address relative to the module's base, if
    /// it belongs to the module.
    #[inline]
    fn relative(&self, addr: Addr) -> Option<u64> {
        addr.checked_sub(self.base)
            .filter(|offset| *offset < self.size)
    }

    fn overlaps(&self, base: Addr, size: u64) -> bool {
        base < self.base.saturating_add(self.size) && self.base < base.saturating_add(size)
    }

    fn source_file(&self, id: u32) -> Result<&str> {
        self.file
            .files
            .get(&id)
            .map(String::as_str)
            .ok_or_invalid_data(|| {
                format!("source file {id} not found in {}", self.path.display())
            })
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct(stringify!(Session))
            .field("handle", &self.handle)
            .field("path", &self.path)
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &format_args!("{:#x}", self.size))
            .finish()
    }
}


/// A [`SymbolProvider`] using Breakpad symbol files.
///
/// Each session corresponds to one symbol file, which is parsed in its
/// entirety when loaded. Address based queries are answered by the
/// session whose module covers the address.
///
/// ```no_run
/// use modsym::breakpad::BreakpadProvider;
/// use modsym::symbolize::Symbolizer;
/// use modsym::ModuleMap;
///
/// let mut modules = ModuleMap::new();
/// let _prev = modules.insert("ntfs.sys", 0xfffff80000000000, 0x100000);
///
/// let symbolizer = Symbolizer::builder()
///     .set_symbol_dir("/var/cache/symbols")
///     .set_debug_file_ext("sym")
///     .build(BreakpadProvider::new(), modules)
///     .unwrap();
/// println!("{}", symbolizer.symbolize("ntfs.sys", 0x1234));
/// ```
pub struct BreakpadProvider {
    /// The options the provider got initialized with.
    opts: Cell<Option<SymOptions>>,
    /// All loaded sessions.
    sessions: RefCell<Vec<Session>>,
    /// The raw value of the next session handle to hand out.
    next_handle: Cell<u64>,
}

impl BreakpadProvider {
    /// Create a new, uninitialized [`BreakpadProvider`].
    pub fn new() -> Self {
        Self {
            opts: Cell::new(None),
            sessions: RefCell::new(Vec::new()),
            next_handle: Cell::new(1),
        }
    }

    fn opts(&self) -> Result<SymOptions> {
        self.opts
            .get()
            .ok_or_invalid_input(|| "Breakpad provider is not initialized")
    }

    fn ensure_line_numbers(&self) -> Result<()> {
        if self.opts()?.line_numbers {
            Ok(())
        } else {
            Err(Error::with_unsupported(
                "line number information is disabled",
            ))
        }
    }

    fn next_handle(&self) -> Result<SessionHandle> {
        let raw = self.next_handle.get();
        let handle = SessionHandle::new(raw)
            .ok_or_invalid_data(|| "session handle space is exhausted")?;
        let () = self.next_handle.set(raw.wrapping_add(1));
        Ok(handle)
    }

    /// Run `f` on the function of the session covering `addr`, along
    /// with the module relative address.
    fn with_function<F, R>(&self, addr: Addr, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&Session, &Function, u64) -> Result<Option<R>>,
    {
        let sessions = self.sessions.borrow();
        let session = sessions
            .iter()
            .find_map(|session| Some((session, session.relative(addr)?)));

        match session {
            Some((session, rel)) => match session.file.find_function(rel) {
                Some(func) => f(session, func, rel),
                None => Ok(None),
            },
            None => {
                log::trace!("no session covers address {addr:#x}");
                Ok(None)
            }
        }
    }
}

impl Default for BreakpadProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for BreakpadProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct(stringify!(BreakpadProvider))
            .field("opts", &self.opts.get())
            .field("sessions", &self.sessions.borrow())
            .finish()
    }
}

impl SymbolProvider for BreakpadProvider {
    fn initialize(&self, opts: &SymOptions) -> Result<()> {
        if self.opts.get().is_some() {
            return Err(Error::with_already_exists(
                "Breakpad provider is already initialized",
            ))
        }

        let () = self.opts.set(Some(*opts));
        Ok(())
    }

    fn load_session(&self, path: &Path, base: Addr, size: u64) -> Result<SessionHandle> {
        let opts = self.opts()?;

        if size == 0 {
            return Err(Error::with_invalid_input(format!(
                "module at {base:#x} has zero size"
            )))
        }
        if base.checked_add(size).is_none() {
            return Err(Error::with_invalid_input(format!(
                "module at {base:#x} with size {size:#x} overflows the address space"
            )))
        }
        if let Some(session) = self
            .sessions
            .borrow()
            .iter()
            .find(|session| session.overlaps(base, size))
        {
            return Err(Error::with_invalid_input(format!(
                "module at {base:#x} overlaps with {} at {:#x}",
                session.path.display(),
                session.base
            )))
        }

        let file = File::open(path)
            .with_context(|| format!("failed to open Breakpad file {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("failed to query metadata of {}", path.display()))?
            .len();
        if len == 0 {
            return Err(Error::with_invalid_data(format!(
                "Breakpad file {} is empty",
                path.display()
            )))
        }

        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to memory map {}", path.display()))?;
        let symbol_file = parse_symbol_file(&mmap)
            .with_context(|| format!("failed to parse Breakpad file {}", path.display()))?;

        let handle = self.next_handle()?;
        if opts.debug {
            log::debug!(
                "loaded {} functions and {} public symbols from {} as session {}",
                symbol_file.functions.len(),
                symbol_file.publics.len(),
                path.display(),
                handle.get()
            );
        }

        let session = Session {
            handle,
            path: path.to_path_buf(),
            base,
            size,
            file: symbol_file,
        };
        let () = self.sessions.borrow_mut().push(session);
        Ok(handle)
    }

    fn unload_session(&self, session: SessionHandle) {
        let mut sessions = self.sessions.borrow_mut();
        if let Some(idx) = sessions.iter().position(|s| s.handle == session) {
            let session = sessions.swap_remove(idx);
            log::debug!("unloaded session {} ({})", session.handle.get(), session.path.display());
        } else {
            log::warn!("attempted to unload unknown session {}", session.get());
        }
    }

    fn nearest_symbol(&self, addr: Addr) -> Result<Option<ResolvedSym>> {
        let sessions = self.sessions.borrow();
        let session = sessions
            .iter()
            .find_map(|session| Some((session, session.relative(addr)?)));

        let (session, rel) = if let Some(session) = session {
            session
        } else {
            log::trace!("no session covers address {addr:#x}");
            return Ok(None)
        };

        if let Some(func) = session.file.find_function(rel) {
            return Ok(Some(ResolvedSym::new(&func.name, rel - func.addr)))
        }

        let sym = session
            .file
            .find_public(rel)
            .map(|public| ResolvedSym::new(&public.name, rel - public.addr));
        Ok(sym)
    }

    fn has_inline_frames(&self, addr: Addr) -> bool {
        match self.opts() {
            Ok(opts) if opts.inlined_fns => (),
            _ => return false,
        }

        self.with_function(addr, |_session, func, rel| {
            Ok(func.find_inlinee_at_depth(0, rel).map(|_inlinee| ()))
        })
        .map(|found| found.is_some())
        .unwrap_or(false)
    }

    fn query_inline_context(&self, addr: Addr) -> Result<InlineContext> {
        let ctx = self.with_function(addr, |_session, func, rel| {
            let depth = func.find_inlinees(rel).len();
            let ctx = depth
                .checked_sub(1)
                .and_then(|depth| u32::try_from(depth).ok())
                .map(InlineContext::new);
            Ok(ctx)
        })?;

        ctx.ok_or_not_found(|| format!("no inline frames at address {addr:#x}"))
    }

    fn resolve_inline_line(&self, addr: Addr, ctx: InlineContext) -> Result<Option<ResolvedLine>> {
        let () = self.ensure_line_numbers()?;

        self.with_function(addr, |session, func, rel| {
            let inlinees = func.find_inlinees(rel);
            let depth = usize::try_from(ctx.get()).map_err(Error::with_invalid_input)?;
            if depth >= inlinees.len() {
                return Err(Error::with_invalid_input(format!(
                    "inline context {} is invalid at address {addr:#x}",
                    ctx.get()
                )))
            }

            if let Some(deeper) = inlinees.get(depth + 1) {
                let file = session.source_file(deeper.call_file)?;
                let line = ResolvedLine::new(file, deeper.call_line, rel - deeper.addr);
                return Ok(Some(line))
            }

            match func.find_line(rel) {
                Some(line) => {
                    let file = session.source_file(line.file)?;
                    Ok(Some(ResolvedLine::new(file, line.line, rel - line.addr)))
                }
                None => Ok(None),
            }
        })
    }

    fn resolve_line(&self, addr: Addr) -> Result<Option<ResolvedLine>> {
        let () = self.ensure_line_numbers()?;

        self.with_function(addr, |session, func, rel| match func.find_line(rel) {
            Some(line) => {
                let file = session.source_file(line.file)?;
                Ok(Some(ResolvedLine::new(file, line.line, rel - line.addr)))
            }
            None => Ok(None),
        })
    }
}
