//! **modsym** is a library for turning module relative code offsets into
//! human readable symbols.
//!
//! Given the name of a module loaded into a monitored process and a byte
//! offset into it, a [`Symbolizer`][symbolize::Symbolizer] lazily loads
//! the module's debug symbols through a [`SymbolProvider`], remembers
//! modules for which that failed, and produces one of three textual
//! shapes:
//!
//! - `<module>+<offset>` if no symbol could be found,
//! - `<module>!<symbol>+<displacement>` if a symbol but no source
//!   location is known,
//! - `<module>!<symbol>+<displacement> [<file> @ <line>]` otherwise.
//!
//! ```
//! use std::path::Path;
//!
//! use modsym::symbolize::Symbolizer;
//! use modsym::InlineContext;
//! use modsym::ModuleMap;
//! use modsym::ResolvedLine;
//! use modsym::ResolvedSym;
//! use modsym::Result;
//! use modsym::SessionHandle;
//! use modsym::SymOptions;
//! use modsym::SymbolProvider;
//! use modsym::Addr;
//!
//! /// A provider that knows about a single function spanning the
//! /// entire module.
//! #[derive(Debug)]
//! struct OneFunction;
//!
//! impl SymbolProvider for OneFunction {
//!     fn initialize(&self, _opts: &SymOptions) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn load_session(&self, _path: &Path, base: Addr, _size: u64) -> Result<SessionHandle> {
//!         Ok(SessionHandle::new(base).unwrap())
//!     }
//!
//!     fn unload_session(&self, _session: SessionHandle) {}
//!
//!     fn nearest_symbol(&self, addr: Addr) -> Result<Option<ResolvedSym>> {
//!         Ok(Some(ResolvedSym::new("DriverEntry", addr - 0x1000)))
//!     }
//!
//!     fn has_inline_frames(&self, _addr: Addr) -> bool {
//!         false
//!     }
//!
//!     fn query_inline_context(&self, _addr: Addr) -> Result<InlineContext> {
//!         unreachable!()
//!     }
//!
//!     fn resolve_inline_line(&self, _addr: Addr, _ctx: InlineContext) -> Result<Option<ResolvedLine>> {
//!         unreachable!()
//!     }
//!
//!     fn resolve_line(&self, _addr: Addr) -> Result<Option<ResolvedLine>> {
//!         Ok(None)
//!     }
//! }
//!
//! let mut modules = ModuleMap::new();
//! let _prev = modules.insert("driver.sys", 0x1000, 0x2000);
//!
//! let symbolizer = Symbolizer::builder()
//!     .set_symbol_dir("C:\\symbols")
//!     .build(OneFunction, modules)
//!     .unwrap();
//! assert_eq!(symbolizer.symbolize("driver.sys", 0x42), "driver.sys!DriverEntry+42");
//! assert_eq!(symbolizer.symbolize("other.sys", 0x42), "other.sys+42");
//! ```

#![allow(clippy::let_and_return, clippy::let_unit_value)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "breakpad")]
#[cfg_attr(docsrs, doc(cfg(feature = "breakpad")))]
pub mod breakpad;
mod error;
mod locate;
mod provider;
pub mod symbolize;
mod util;

pub use crate::error::Error;
pub use crate::error::ErrorExt;
pub use crate::error::ErrorKind;
pub use crate::error::IntoCowStr;
#[cfg(feature = "breakpad")]
pub(crate) use crate::error::IntoError;
pub use crate::locate::ModuleInfo;
pub use crate::locate::ModuleLocator;
pub use crate::locate::ModuleMap;
pub use crate::provider::InlineContext;
pub use crate::provider::ResolvedLine;
pub use crate::provider::ResolvedSym;
pub use crate::provider::SessionHandle;
pub use crate::provider::SymOptions;
pub use crate::provider::SymbolProvider;


/// A type representing addresses.
pub type Addr = u64;

/// A result type using our [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;


#[cfg(feature = "tracing")]
#[macro_use]
#[allow(unused_imports)]
mod log {
    pub(crate) use tracing::debug;
    pub(crate) use tracing::error;
    pub(crate) use tracing::info;
    pub(crate) use tracing::instrument;
    pub(crate) use tracing::trace;
    pub(crate) use tracing::warn;
}

#[cfg(not(feature = "tracing"))]
#[macro_use]
#[allow(unused_imports)]
mod log {
    macro_rules! debug {
        ($($args:tt)*) => {{
          if false {
            // Make sure to use `args` to prevent any warnings about
            // unused variables.
            let _args = format_args!($($args)*);
          }
        }};
    }
    pub(crate) use debug;
    pub(crate) use debug as error;
    pub(crate) use debug as info;
    pub(crate) use debug as trace;
    pub(crate) use debug as warn;
}
