// Based on rust-minidump (https://github.com/rust-minidump/rust-minidump):
// > Copyright 2015 Ted Mielczarek.
// >
// > Copyright (c) 2015-2023 rust-minidump contributors
// >
// > Permission is hereby granted, free of charge, to any person
// > obtaining a copy of this software and associated documentation
// > files (the "Software"), to deal in the Software without
// > restriction, including without limitation the rights to use, copy,
// > modify, merge, publish, distribute, sublicense, and/or sell
// > copies of the Software, and to permit persons to whom the
// > Software is furnished to do so, subject to the following
// > conditions:
// > The above copyright notice and this permission notice shall be
// > included in all copies or substantial portions of the Software.
// >
// > THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// > IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// > FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// > AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// > LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// > FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// > DEALINGS IN THE SOFTWARE.

use std::collections::HashMap;

use crate::util::find_match_or_lower_bound_by_key;


/// A publicly visible linker symbol, described by a `PUBLIC` record.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct PublicSymbol {
    /// The symbol's address relative to the module's load address.
    pub addr: u64,
    /// The name of the symbol.
    pub name: String,
}

/// A mapping from machine code bytes to source line and file.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct SourceLine {
    /// The start address relative to the module's load address.
    pub addr: u64,
    /// The size of this range of instructions in bytes.
    pub size: u32,
    /// The source file that generated this machine code, as an index
    /// into `SymbolFile::files`.
    pub file: u32,
    /// The line number in `file` that generated this machine code.
    pub line: u32,
}

impl SourceLine {
    #[inline]
    fn contains(&self, addr: u64) -> bool {
        (self.addr == addr && self.size == 0)
            || (self.addr <= addr && addr - self.addr < u64::from(self.size))
    }
}

/// A single address range covered by an inlined function call.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct Inlinee {
    /// The nesting depth of the inline call, starting at zero for calls
    /// inlined directly into the enclosing function.
    pub depth: u32,
    /// The start address relative to the module's load address.
    pub addr: u64,
    /// The size of this range of instructions in bytes.
    pub size: u32,
    /// The source file containing the call, as an index into
    /// `SymbolFile::files`.
    pub call_file: u32,
    /// The line number in `call_file` of the call.
    pub call_line: u32,
    /// The inlined function, as an index into
    /// `SymbolFile::inline_origins`.
    pub origin_id: u32,
}

/// A source-language function, described by a `FUNC` record and the
/// line and `INLINE` records following it.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct Function {
    /// The function's start address relative to the module's load address.
    pub addr: u64,
    /// The size of the function in bytes.
    pub size: u32,
    /// The name of the function.
    pub name: String,
    /// Source line information, sorted by start address.
    pub lines: Vec<SourceLine>,
    /// Inline call information, sorted by (depth, address).
    pub inlinees: Vec<Inlinee>,
}

impl Function {
    /// Find the line record covering `addr`.
    pub fn find_line(&self, addr: u64) -> Option<&SourceLine> {
        let idx = find_match_or_lower_bound_by_key(&self.lines, addr, |line| line.addr)?;
        self.lines[idx..]
            .iter()
            .take_while(|line| line.addr <= addr)
            .find(|line| line.contains(addr))
    }

    /// Find the inline record covering `addr` at the given `depth`.
    pub fn find_inlinee_at_depth(&self, depth: u32, addr: u64) -> Option<&Inlinee> {
        let idx = match self
            .inlinees
            .binary_search_by_key(&(depth, addr), |inlinee| (inlinee.depth, inlinee.addr))
        {
            Ok(idx) => idx,
            Err(0) => return None,
            Err(idx) => idx - 1,
        };

        let inlinee = &self.inlinees[idx];
        if inlinee.depth != depth {
            return None
        }

        if addr - inlinee.addr < u64::from(inlinee.size) {
            Some(inlinee)
        } else {
            None
        }
    }

    /// Find the chain of inline records covering `addr`, outermost
    /// first.
    pub fn find_inlinees(&self, addr: u64) -> Vec<&Inlinee> {
        let mut inlinees = Vec::new();
        while let Some(inlinee) = u32::try_from(inlinees.len())
            .ok()
            .and_then(|depth| self.find_inlinee_at_depth(depth, addr))
        {
            let () = inlinees.push(inlinee);
        }
        inlinees
    }

    #[inline]
    fn contains(&self, addr: u64) -> bool {
        (self.addr == addr && self.size == 0)
            || (self.addr <= addr && addr - self.addr < u64::from(self.size))
    }
}


/// The parsed contents of a Breakpad symbol file.
#[derive(Debug, Default)]
pub(crate) struct SymbolFile {
    /// Source file names, by index.
    pub files: HashMap<u32, String>,
    /// Names of inlined functions, by index.
    pub inline_origins: HashMap<u32, String>,
    /// Functions, sorted by address.
    pub functions: Vec<Function>,
    /// Public symbols, sorted by address.
    pub publics: Vec<PublicSymbol>,
}

impl SymbolFile {
    /// Find the function covering `addr`.
    pub fn find_function(&self, addr: u64) -> Option<&Function> {
        let idx = find_match_or_lower_bound_by_key(&self.functions, addr, |func| func.addr)?;
        self.functions[idx..]
            .iter()
            .take_while(|func| func.addr <= addr)
            .find(|func| func.contains(addr))
    }

    /// Find the public symbol at or closest before `addr`.
    pub fn find_public(&self, addr: u64) -> Option<&PublicSymbol> {
        let idx = self.publics.partition_point(|public| public.addr <= addr);
        self.publics.get(idx.checked_sub(1)?)
    }
}
