use std::fmt::Debug;
use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;

use crate::Addr;
use crate::Result;


/// An opaque reference to a debug symbol session loaded by a
/// [`SymbolProvider`].
///
/// A raw handle value of zero is reserved for "no session" and cannot
/// be represented.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SessionHandle(NonZeroU64);

impl SessionHandle {
    /// Create a [`SessionHandle`] from a raw provider handle.
    ///
    /// Returns `None` if `raw` is zero.
    #[inline]
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Retrieve the raw handle value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}


/// An opaque, provider defined inline-expansion context for an address.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct InlineContext(u32);

impl InlineContext {
    /// Create an [`InlineContext`] from a raw provider value.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Retrieve the raw context value.
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}


/// Global options requested from a [`SymbolProvider`] when it gets
/// initialized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SymOptions {
    /// Whether to load and report source line information.
    pub line_numbers: bool,
    /// Whether to take inline-expansion frames into account.
    pub inlined_fns: bool,
    /// Whether the provider should emit its own diagnostic output.
    pub debug: bool,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub _non_exhaustive: (),
}

impl Default for SymOptions {
    fn default() -> Self {
        Self {
            line_numbers: true,
            inlined_fns: true,
            debug: true,
            _non_exhaustive: (),
        }
    }
}


/// The symbol found closest to (and not after) a queried address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedSym {
    /// The symbol's name.
    pub name: String,
    /// The distance from the start of the symbol to the queried
    /// address.
    pub displacement: u64,
}

impl ResolvedSym {
    /// Create a new [`ResolvedSym`].
    #[inline]
    pub fn new<S>(name: S, displacement: u64) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            displacement,
        }
    }
}


/// Source location information for an address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedLine {
    /// The source file's name, as recorded in the debug information.
    pub file: String,
    /// The line number.
    pub line: u32,
    /// The distance from the start of the line's code to the queried
    /// address.
    ///
    /// This value is informational only and not part of the formatted
    /// output.
    pub displacement: u64,
}

impl ResolvedLine {
    /// Create a new [`ResolvedLine`].
    #[inline]
    pub fn new<S>(file: S, line: u32, displacement: u64) -> Self
    where
        S: Into<String>,
    {
        Self {
            file: file.into(),
            line,
            displacement,
        }
    }
}


/// A stateful backend providing access to debug symbol databases.
///
/// All address arguments are absolute, i.e., they include the base
/// address a module's session was loaded at. A
/// [`Symbolizer`][crate::symbolize::Symbolizer] requires its provider
/// to be `Send`, but it is not `Sync` itself and never calls into the
/// provider concurrently. Implementations may hence use interior
/// mutability without locking.
pub trait SymbolProvider
where
    Self: Debug,
{
    /// Set the provider's global options.
    ///
    /// This method is invoked exactly once, before any other one. An
    /// error reported here is fatal, as no symbolization is possible.
    fn initialize(&self, opts: &SymOptions) -> Result<()>;

    /// Load the debug symbol database at `path` for a module mapped at
    /// `base` with the given `size`.
    fn load_session(&self, path: &Path, base: Addr, size: u64) -> Result<SessionHandle>;

    /// Unload a previously loaded session.
    fn unload_session(&self, session: SessionHandle);

    /// Find the symbol closest to, but not after, `addr`.
    ///
    /// `Ok(None)` indicates that no symbol covers the address.
    fn nearest_symbol(&self, addr: Addr) -> Result<Option<ResolvedSym>>;

    /// Check whether `addr` is part of an inline-expanded call.
    fn has_inline_frames(&self, addr: Addr) -> bool;

    /// Retrieve the inline context for `addr`.
    fn query_inline_context(&self, addr: Addr) -> Result<InlineContext>;

    /// Resolve source line information for `addr` within the provided
    /// inline context.
    fn resolve_inline_line(&self, addr: Addr, ctx: InlineContext) -> Result<Option<ResolvedLine>>;

    /// Resolve source line information for `addr` directly.
    fn resolve_line(&self, addr: Addr) -> Result<Option<ResolvedLine>>;
}

impl<P> SymbolProvider for Arc<P>
where
    P: SymbolProvider + ?Sized,
{
    #[inline]
    fn initialize(&self, opts: &SymOptions) -> Result<()> {
        (**self).initialize(opts)
    }

    #[inline]
    fn load_session(&self, path: &Path, base: Addr, size: u64) -> Result<SessionHandle> {
        (**self).load_session(path, base, size)
    }

    #[inline]
    fn unload_session(&self, session: SessionHandle) {
        (**self).unload_session(session)
    }

    #[inline]
    fn nearest_symbol(&self, addr: Addr) -> Result<Option<ResolvedSym>> {
        (**self).nearest_symbol(addr)
    }

    #[inline]
    fn has_inline_frames(&self, addr: Addr) -> bool {
        (**self).has_inline_frames(addr)
    }

    #[inline]
    fn query_inline_context(&self, addr: Addr) -> Result<InlineContext> {
        (**self).query_inline_context(addr)
    }

    #[inline]
    fn resolve_inline_line(&self, addr: Addr, ctx: InlineContext) -> Result<Option<ResolvedLine>> {
        (**self).resolve_inline_line(addr, ctx)
    }

    #[inline]
    fn resolve_line(&self, addr: Addr) -> Result<Option<ResolvedLine>> {
        (**self).resolve_line(addr)
    }
}
