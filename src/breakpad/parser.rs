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

//! Parser for Breakpad symbol files.
//!
//! See <https://github.com/google/breakpad/blob/main/docs/symbol_files.md>

use std::mem::take;
use std::str;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::bytes::complete::take_till1;
use nom::character::complete::digit1;
use nom::character::complete::hex_digit1;
use nom::character::complete::space1;
use nom::combinator::all_consuming;
use nom::combinator::cut;
use nom::combinator::map;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::combinator::rest;
use nom::error::convert_error;
use nom::error::VerboseError;
use nom::multi::separated_list1;
use nom::sequence::preceded;
use nom::sequence::separated_pair;
use nom::sequence::terminated;
use nom::sequence::tuple;
use nom::Err;
use nom::IResult;

use crate::Error;
use crate::ErrorExt as _;
use crate::Result;

use super::types::Function;
use super::types::Inlinee;
use super::types::PublicSymbol;
use super::types::SourceLine;
use super::types::SymbolFile;


type ParseResult<'input, T> = IResult<&'input str, T, VerboseError<&'input str>>;


/// A single record of a symbol file.
#[derive(Debug, PartialEq)]
enum Record {
    Module,
    Info,
    File(u32, String),
    InlineOrigin(u32, String),
    Func(Function),
    Inline(Vec<Inlinee>),
    Line(SourceLine),
    Public(PublicSymbol),
    Stack,
}


fn hex_u64(input: &str) -> ParseResult<'_, u64> {
    map_res(hex_digit1, |s: &str| u64::from_str_radix(s, 16))(input)
}

fn hex_u32(input: &str) -> ParseResult<'_, u32> {
    map_res(hex_digit1, |s: &str| u32::from_str_radix(s, 16))(input)
}

fn dec_u32(input: &str) -> ParseResult<'_, u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

fn non_space(input: &str) -> ParseResult<'_, &str> {
    take_till1(|c: char| c.is_ascii_whitespace())(input)
}

/// Match a record keyword followed by at least one space.
fn keyword<'input>(
    name: &'static str,
) -> impl FnMut(&'input str) -> ParseResult<'input, &'input str> {
    terminated(tag(name), space1)
}

/// Match the optional `m` marker that Breakpad uses to flag symbols
/// with multiple names.
fn multiple(input: &str) -> ParseResult<'_, Option<&str>> {
    opt(terminated(tag("m"), space1))(input)
}

/// Match `MODULE <os> <cpu> <id> <name>`.
fn module_record(input: &str) -> ParseResult<'_, Record> {
    let (input, _) = keyword("MODULE")(input)?;
    let (input, _) = cut(tuple((
        terminated(non_space, space1),
        terminated(non_space, space1),
        terminated(hex_digit1, space1),
        rest,
    )))(input)?;
    Ok((input, Record::Module))
}

/// Match `INFO <anything>`.
fn info_record(input: &str) -> ParseResult<'_, Record> {
    map(preceded(keyword("INFO"), rest), |_| Record::Info)(input)
}

/// Match `FILE <id> <name>`.
fn file_record(input: &str) -> ParseResult<'_, Record> {
    let (input, _) = keyword("FILE")(input)?;
    let (input, (id, name)) = cut(separated_pair(dec_u32, space1, rest))(input)?;
    Ok((input, Record::File(id, name.to_string())))
}

/// Match `INLINE_ORIGIN <id> <name>`.
fn inline_origin_record(input: &str) -> ParseResult<'_, Record> {
    let (input, _) = keyword("INLINE_ORIGIN")(input)?;
    let (input, (id, name)) = cut(separated_pair(dec_u32, space1, rest))(input)?;
    Ok((input, Record::InlineOrigin(id, name.to_string())))
}

/// Match `INLINE <depth> <call line> <call file> <origin> [<addr> <size>]+`.
fn inline_record(input: &str) -> ParseResult<'_, Record> {
    let (input, _) = keyword("INLINE")(input)?;
    let (input, (depth, call_line, call_file, origin_id, ranges)) = cut(tuple((
        terminated(dec_u32, space1),
        terminated(dec_u32, space1),
        terminated(dec_u32, space1),
        terminated(dec_u32, space1),
        separated_list1(space1, separated_pair(hex_u64, space1, hex_u32)),
    )))(input)?;

    let inlinees = ranges
        .into_iter()
        .map(|(addr, size)| Inlinee {
            depth,
            addr,
            size,
            call_file,
            call_line,
            origin_id,
        })
        .collect();
    Ok((input, Record::Inline(inlinees)))
}

/// Match `FUNC [m] <addr> <size> <param size> <name>`.
fn func_record(input: &str) -> ParseResult<'_, Record> {
    let (input, _) = keyword("FUNC")(input)?;
    let (input, (_multiple, addr, size, _param_size, name)) = cut(tuple((
        multiple,
        terminated(hex_u64, space1),
        terminated(hex_u32, space1),
        terminated(hex_u32, space1),
        rest,
    )))(input)?;

    let func = Function {
        addr,
        size,
        name: name.to_string(),
        lines: Vec::new(),
        inlinees: Vec::new(),
    };
    Ok((input, Record::Func(func)))
}

/// Match `PUBLIC [m] <addr> <param size> <name>`.
fn public_record(input: &str) -> ParseResult<'_, Record> {
    let (input, _) = keyword("PUBLIC")(input)?;
    let (input, (_multiple, addr, _param_size, name)) = cut(tuple((
        multiple,
        terminated(hex_u64, space1),
        terminated(hex_u32, space1),
        rest,
    )))(input)?;

    let public = PublicSymbol {
        addr,
        name: name.to_string(),
    };
    Ok((input, Record::Public(public)))
}

/// Match `STACK WIN ...` and `STACK CFI ...` records, which we have
/// no use for.
fn stack_record(input: &str) -> ParseResult<'_, Record> {
    map(preceded(keyword("STACK"), rest), |_| Record::Stack)(input)
}

/// Match `<addr> <size> <line> <file>`.
fn line_record(input: &str) -> ParseResult<'_, Record> {
    let (input, (addr, size, line, file)) = tuple((
        terminated(hex_u64, space1),
        terminated(hex_u32, space1),
        terminated(dec_u32, space1),
        dec_u32,
    ))(input)?;

    let line = SourceLine {
        addr,
        size,
        file,
        line,
    };
    Ok((input, Record::Line(line)))
}

fn record(input: &str) -> ParseResult<'_, Record> {
    all_consuming(alt((
        module_record,
        info_record,
        file_record,
        inline_origin_record,
        inline_record,
        func_record,
        public_record,
        stack_record,
        line_record,
    )))(input)
}

fn parse_record(line: &str) -> Result<Record> {
    match record(line) {
        Ok((_, record)) => Ok(record),
        Err(Err::Error(err)) | Err(Err::Failure(err)) => {
            Err(Error::with_invalid_data(convert_error(line, err)))
        }
        Err(Err::Incomplete(..)) => Err(Error::with_unexpected_eof("record is truncated")),
    }
}


/// The state of parsing a symbol file.
#[derive(Debug, Default)]
struct Parser {
    file: SymbolFile,
    /// The function whose line and inline records are being parsed.
    func: Option<Function>,
    /// The number of records processed.
    records: usize,
}

impl Parser {
    fn finish_func(&mut self) {
        if let Some(mut func) = self.func.take() {
            let () = func.lines.sort_by_key(|line| (line.addr, line.size));
            let () = func
                .inlinees
                .sort_by_key(|inlinee| (inlinee.depth, inlinee.addr));
            let () = self.file.functions.push(func);
        }
    }

    fn add_record(&mut self, record: Record) -> Result<()> {
        match record {
            Record::Module if self.records != 0 => {
                return Err(Error::with_invalid_data(
                    "MODULE record found after the start of the file",
                ))
            }
            Record::Module | Record::Info | Record::Stack => (),
            Record::File(id, name) => {
                let _prev = self.file.files.insert(id, name);
            }
            Record::InlineOrigin(id, name) => {
                let _prev = self.file.inline_origins.insert(id, name);
            }
            Record::Public(public) => {
                let () = self.finish_func();
                let () = self.file.publics.push(public);
            }
            Record::Func(func) => {
                let () = self.finish_func();
                self.func = Some(func);
            }
            Record::Line(line) => match &mut self.func {
                Some(func) => func.lines.push(line),
                None => {
                    return Err(Error::with_invalid_data(
                        "line record found outside of a FUNC record",
                    ))
                }
            },
            Record::Inline(inlinees) => match &mut self.func {
                Some(func) => func.inlinees.extend(inlinees),
                None => {
                    return Err(Error::with_invalid_data(
                        "INLINE record found outside of a FUNC record",
                    ))
                }
            },
        }

        self.records += 1;
        Ok(())
    }

    fn finish(mut self) -> SymbolFile {
        let () = self.finish_func();

        let mut file = take(&mut self.file);
        let () = file
            .functions
            .sort_by(|x, y| x.addr.cmp(&y.addr).then_with(|| x.size.cmp(&y.size)));
        let () = file.publics.sort_by_key(|public| public.addr);
        file
    }
}


/// Parse the contents of a Breakpad symbol file.
pub(crate) fn parse_symbol_file(data: &[u8]) -> Result<SymbolFile> {
    let mut parser = Parser::default();

    for (idx, line) in data.split(|b| *b == b'\n').enumerate() {
        let lineno = idx + 1;
        let line = str::from_utf8(line)
            .map_err(Error::with_invalid_data)
            .with_context(|| format!("line {lineno} is not valid UTF-8"))?
            .trim_end();
        if line.is_empty() {
            continue
        }

        let record = parse_record(line).with_context(|| format!("failed to parse line {lineno}"))?;
        let () = parser
            .add_record(record)
            .with_context(|| format!("invalid record on line {lineno}"))?;
    }

    if parser.records == 0 {
        return Err(Error::with_invalid_data("symbol file contains no records"))
    }
    Ok(parser.finish())
}
