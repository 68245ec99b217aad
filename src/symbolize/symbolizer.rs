use std::borrow::Cow;
use std::cell::Cell;
use std::ffi::OsString;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::path::Path;
use std::path::PathBuf;

use crate::log;
use crate::Addr;
use crate::ErrorExt as _;
use crate::ModuleLocator;
use crate::Result;
use crate::SymOptions;
use crate::SymbolProvider;

use super::format::format;
use super::loader::Loader;
use super::loader::DEFAULT_DEBUG_FILE_EXT;
use super::registry::ModuleState;
use super::registry::Registry;
use super::CodeInfo;
use super::Reason;
use super::Sym;
use super::Symbolized;


/// Demangle a symbol name, if possible.
#[cfg(feature = "demangle")]
fn maybe_demangle(name: String, demangle: bool) -> String {
    if !demangle {
        return name
    }

    if let Ok(demangled) = rustc_demangle::try_demangle(&name) {
        return format!("{demangled:#}")
    }

    cpp_demangle::Symbol::new(name.as_bytes())
        .ok()
        .and_then(|sym| sym.demangle(&Default::default()).ok())
        .unwrap_or(name)
}

#[cfg(not(feature = "demangle"))]
fn maybe_demangle(name: String, _demangle: bool) -> String {
    // Demangling is disabled.
    name
}


/// A builder for configurable construction of [`Symbolizer`] objects.
///
/// By default all features are enabled and debug files are expected to
/// carry a `pdb` extension.
#[derive(Clone, Debug)]
pub struct Builder {
    /// See [`Builder::set_symbol_dir`].
    symbol_dir: PathBuf,
    /// See [`Builder::set_debug_file_ext`].
    debug_file_ext: OsString,
    /// See [`Builder::enable_line_number_info`].
    line_number_info: bool,
    /// See [`Builder::enable_inlined_fns`].
    inlined_fns: bool,
    /// See [`Builder::enable_debug_output`].
    debug_output: bool,
    /// See [`Builder::enable_demangling`].
    demangle: bool,
}

impl Builder {
    /// Set the directory in which to look for debug files.
    ///
    /// The directory is not validated. If it does not exist, loading
    /// debug symbols fails for every module.
    pub fn set_symbol_dir<P>(mut self, dir: P) -> Builder
    where
        P: Into<PathBuf>,
    {
        self.symbol_dir = dir.into();
        self
    }

    /// Set the extension of debug files.
    ///
    /// The debug file of a module is named after the module, with its
    /// last extension replaced by this one.
    pub fn set_debug_file_ext<E>(mut self, ext: E) -> Builder
    where
        E: Into<OsString>,
    {
        self.debug_file_ext = ext.into();
        self
    }

    /// Enable/disable the reporting of source file and line
    /// information.
    pub fn enable_line_number_info(mut self, enable: bool) -> Builder {
        self.line_number_info = enable;
        self
    }

    /// Enable/disable the resolution of source locations through
    /// inline-expansion contexts.
    pub fn enable_inlined_fns(mut self, enable: bool) -> Builder {
        self.inlined_fns = enable;
        self
    }

    /// Enable/disable diagnostic output of the symbol provider.
    pub fn enable_debug_output(mut self, enable: bool) -> Builder {
        self.debug_output = enable;
        self
    }

    /// Enable/disable the demangling of symbol names.
    ///
    /// Demangling only happens if the `demangle` feature is enabled.
    pub fn enable_demangling(mut self, enable: bool) -> Builder {
        self.demangle = enable;
        self
    }

    /// Create the [`Symbolizer`] object, initializing the provided
    /// [`SymbolProvider`].
    ///
    /// A failure to initialize the provider is reported as an error.
    /// No symbolization is possible in this case.
    pub fn build<P, L>(self, provider: P, locator: L) -> Result<Symbolizer>
    where
        P: SymbolProvider + Send + 'static,
        L: ModuleLocator + Send + 'static,
    {
        let Self {
            symbol_dir,
            debug_file_ext,
            line_number_info,
            inlined_fns,
            debug_output,
            demangle,
        } = self;

        let opts = SymOptions {
            line_numbers: line_number_info,
            inlined_fns,
            debug: debug_output,
            _non_exhaustive: (),
        };
        let () = provider
            .initialize(&opts)
            .context("failed to initialize debug symbol provider")?;
        log::debug!("initialized debug symbol provider {provider:?} with {opts:?}");

        let symbolizer = Symbolizer {
            provider: Box::new(provider),
            locator: Box::new(locator),
            registry: Registry::new(),
            loader: Loader::new(symbol_dir, debug_file_ext),
            line_number_info,
            inlined_fns,
            demangle,
            torn_down: Cell::new(false),
        };
        Ok(symbolizer)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            symbol_dir: PathBuf::new(),
            debug_file_ext: OsString::from(DEFAULT_DEBUG_FILE_EXT),
            line_number_info: true,
            inlined_fns: true,
            debug_output: true,
            demangle: true,
        }
    }
}


/// Symbolizer provides an interface to symbolize module relative
/// offsets.
///
/// An instance of this type is the unit at which debug symbol sessions
/// are cached: each module has its debug symbols loaded at most once
/// during the symbolizer's lifetime and a module for which loading
/// failed is never attempted again.
///
/// A `Symbolizer` is `Send` but not `Sync`. Users wanting to
/// symbolize from multiple threads have to guard it with a lock (e.g.,
/// share an `Arc<Mutex<Symbolizer>>`), as the underlying
/// [`SymbolProvider`] is assumed to not be reentrant.
///
/// All loaded sessions are released by [`Symbolizer::teardown`] or,
/// at the latest, when the object is dropped.
pub struct Symbolizer {
    provider: Box<dyn SymbolProvider + Send>,
    locator: Box<dyn ModuleLocator + Send>,
    registry: Registry,
    loader: Loader,
    line_number_info: bool,
    inlined_fns: bool,
    demangle: bool,
    torn_down: Cell<bool>,
}

impl Symbolizer {
    /// Retrieve a [`Builder`] object for configurable construction of a
    /// [`Symbolizer`].
    #[inline]
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Create a new [`Symbolizer`] with the default configuration.
    pub fn new<P, L>(provider: P, locator: L) -> Result<Self>
    where
        P: SymbolProvider + Send + 'static,
        L: ModuleLocator + Send + 'static,
    {
        Builder::default().build(provider, locator)
    }

    /// Retrieve the directory in which debug files are looked up.
    #[inline]
    pub fn symbol_dir(&self) -> &Path {
        self.loader.symbol_dir()
    }

    /// Retrieve the path of the debug file that is (or would be) used
    /// for `module`.
    #[inline]
    pub fn debug_file_path(&self, module: &str) -> PathBuf {
        self.loader.debug_file_path(module)
    }

    fn module_state(&self, module: &str) -> ModuleState {
        self.registry.get_or_load(module, &*self.provider, || {
            self.loader.load(module, &*self.locator, &*self.provider)
        })
    }

    /// Find source code information for `addr`, preferring the inline
    /// context over direct line lookup.
    fn find_code_info(&self, addr: Addr) -> Option<CodeInfo<'static>> {
        if self.inlined_fns && self.provider.has_inline_frames(addr) {
            let result = self
                .provider
                .query_inline_context(addr)
                .context("failed to query inline context")
                .and_then(|ctx| {
                    self.provider
                        .resolve_inline_line(addr, ctx)
                        .with_context(|| format!("failed to resolve line in inline context {ctx:?}"))
                });

            match result {
                Ok(Some(line)) => return Some(CodeInfo::from_line(line, true)),
                Ok(None) => {
                    log::debug!("no inline line information for address {addr:#x}")
                }
                Err(err) => log::debug!("{err:#} for address {addr:#x}"),
            }
        }

        match self.provider.resolve_line(addr) {
            Ok(Some(line)) => Some(CodeInfo::from_line(line, false)),
            Ok(None) => {
                log::trace!("no line information for address {addr:#x}");
                None
            }
            Err(err) => {
                log::debug!("failed to resolve line for address {addr:#x}: {err:#}");
                None
            }
        }
    }

    /// Symbolize `offset` in `module`, reporting the structured result.
    ///
    /// Only the decision whether a module's debug symbols could be
    /// loaded is cached. Symbol and line information are queried from
    /// the provider on every call.
    #[cfg_attr(feature = "tracing", crate::log::instrument(skip_all, fields(module = module, offset = format_args!("{offset:#x}"))))]
    pub fn resolve(&self, module: &str, offset: u64) -> Symbolized<'static> {
        if self.torn_down.get() {
            log::warn!("attempted to symbolize {module}+{offset:#x} after teardown");
            return Symbolized::Unknown(Reason::TornDown)
        }

        let base = match self.module_state(module) {
            ModuleState::Loaded { base, .. } => base,
            ModuleState::Unavailable(reason) => return Symbolized::Unknown(reason),
        };

        let addr = if let Some(addr) = base.checked_add(offset) {
            addr
        } else {
            log::debug!("offset {offset:#x} overflows module `{module}` at {base:#x}");
            return Symbolized::Unknown(Reason::UnknownAddr)
        };

        let sym = match self.provider.nearest_symbol(addr) {
            Ok(Some(sym)) => sym,
            Ok(None) => {
                log::trace!("no symbol found for address {addr:#x}");
                return Symbolized::Unknown(Reason::UnknownAddr)
            }
            Err(err) => {
                log::debug!("failed to find symbol for address {addr:#x}: {err:#}");
                return Symbolized::Unknown(Reason::UnknownAddr)
            }
        };

        let code_info = if self.line_number_info {
            self.find_code_info(addr)
        } else {
            None
        };

        Symbolized::Sym(Sym {
            name: Cow::Owned(maybe_demangle(sym.name, self.demangle)),
            offset: sym.displacement,
            code_info,
            _non_exhaustive: (),
        })
    }

    /// Symbolize `offset` in `module`, producing a display string.
    ///
    /// This method never fails. If no symbol can be found the result
    /// has the form `<module>+<offset>`.
    pub fn symbolize(&self, module: &str, offset: u64) -> String {
        let symbolized = self.resolve(module, offset);
        format(module, offset, &symbolized)
    }

    /// Release all loaded debug symbol sessions.
    ///
    /// After this call, every symbolization request reports
    /// [`Reason::TornDown`]. Calling this method more than once has no
    /// additional effect.
    pub fn teardown(&self) {
        if self.torn_down.replace(true) {
            return
        }

        let () = self.registry.teardown(&*self.provider);
        log::debug!("symbolizer torn down");
    }
}

impl Debug for Symbolizer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct(stringify!(Symbolizer))
            .field("provider", &self.provider)
            .field("locator", &self.locator)
            .field("symbol_dir", &self.loader.symbol_dir())
            .field("torn_down", &self.torn_down.get())
            .finish()
    }
}

impl Drop for Symbolizer {
    fn drop(&mut self) {
        let () = self.teardown();
    }
}
