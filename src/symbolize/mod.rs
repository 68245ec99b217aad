//! Functionality for symbolizing module relative offsets.
//!
//! A [`Symbolizer`] owns a registry of modules it has attempted to load
//! debug symbols for. The first request for a module consults the
//! configured [`ModuleLocator`][crate::ModuleLocator] and asks the
//! [`SymbolProvider`][crate::SymbolProvider] to load the module's debug
//! file. Whatever the outcome, it is remembered: a module whose symbols
//! could not be loaded is never attempted again during the lifetime of
//! the symbolizer.
//!
//! Per-address lookups, on the other hand, are never cached and always
//! go through the provider.

mod format;
mod loader;
mod registry;
mod symbolizer;

use std::borrow::Cow;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

pub use format::format;
pub use symbolizer::Builder;
pub use symbolizer::Symbolizer;

use crate::ResolvedLine;


/// The reason why symbolization failed.
///
/// The reason is intended to be primarily user-facing and diagnostic
/// in nature.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Reason {
    /// The module is not known to the module locator.
    ModuleNotFound,
    /// The debug symbols of the module could not be loaded.
    MissingSyms,
    /// The address does not belong to a known symbol or the symbol
    /// lookup failed.
    UnknownAddr,
    /// The symbolizer has already been torn down.
    TornDown,
}

impl Reason {
    #[doc(hidden)]
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleNotFound => "module not found",
            Self::MissingSyms => "module has no debug symbols",
            Self::UnknownAddr => "address not found in symbol database",
            Self::TornDown => "symbolizer has been torn down",
        }
    }
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}


/// Source code location information for a symbolized address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CodeInfo<'src> {
    /// The source file name.
    pub file: Cow<'src, str>,
    /// The line number of the symbolized instruction.
    pub line: u32,
    /// Whether the information was retrieved through an inline
    /// context.
    pub inlined: bool,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub _non_exhaustive: (),
}

impl CodeInfo<'_> {
    pub(crate) fn from_line(line: ResolvedLine, inlined: bool) -> CodeInfo<'static> {
        let ResolvedLine {
            file,
            line,
            displacement: _,
        } = line;

        CodeInfo {
            file: Cow::Owned(file),
            line,
            inlined,
            _non_exhaustive: (),
        }
    }

    /// Convert this object into one owning all its data.
    pub fn to_owned(&self) -> CodeInfo<'static> {
        CodeInfo {
            file: Cow::Owned(self.file.to_string()),
            line: self.line,
            inlined: self.inlined,
            _non_exhaustive: (),
        }
    }
}


/// The result of symbolizing an address that maps to a symbol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sym<'src> {
    /// The (possibly demangled) symbol name.
    pub name: Cow<'src, str>,
    /// The byte offset of the address from the start of the symbol.
    pub offset: u64,
    /// Source code location information, if available.
    pub code_info: Option<CodeInfo<'src>>,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub _non_exhaustive: (),
}


/// An enumeration used as reporting vehicle for address symbolization.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Symbolized<'src> {
    /// The input address was symbolized as the provided symbol.
    Sym(Sym<'src>),
    /// The input address was not found and could not be symbolized.
    ///
    /// The provided reason is a best guess, hinting at what ultimately
    /// prevented the symbolization from being successful.
    Unknown(Reason),
}

impl<'src> Symbolized<'src> {
    /// Convert the object into a [`Sym`] reference, if the corresponding
    /// variant is active.
    #[inline]
    pub fn as_sym(&self) -> Option<&Sym<'src>> {
        match self {
            Self::Sym(sym) => Some(sym),
            Self::Unknown(..) => None,
        }
    }

    /// Convert the object into a [`Sym`] object, if the corresponding
    /// variant is active.
    #[inline]
    pub fn into_sym(self) -> Option<Sym<'src>> {
        match self {
            Self::Sym(sym) => Some(sym),
            Self::Unknown(..) => None,
        }
    }
}
