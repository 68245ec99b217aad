//! Support for Breakpad symbol files as source of debug information.
//!
//! Breakpad symbol files are plain text files, typically produced by
//! `dump_syms` from a PDB or DWARF debug file. The
//! [`BreakpadProvider`] exposes their contents through the
//! [`SymbolProvider`][crate::SymbolProvider] interface, which allows
//! for symbolization on systems not offering a native debug help
//! library.

mod parser;
mod provider;
mod types;

pub use provider::BreakpadProvider;
