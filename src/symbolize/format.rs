use super::CodeInfo;
use super::Sym;
use super::Symbolized;


/// Format the result of symbolizing `offset` in `module`.
///
/// The output has one of three shapes:
/// - `<module>+<offset>` for [`Symbolized::Unknown`]
/// - `<module>!<name>+<offset>` for a [`Sym`] without code information
/// - `<module>!<name>+<offset> [<file> @ <line>]` otherwise
///
/// Offsets are printed in lower case hexadecimal without a prefix and
/// line numbers in decimal.
pub fn format(module: &str, offset: u64, symbolized: &Symbolized<'_>) -> String {
    match symbolized {
        Symbolized::Unknown(_reason) => format!("{module}+{offset:x}"),
        Symbolized::Sym(Sym {
            name,
            offset,
            code_info,
            _non_exhaustive: (),
        }) => match code_info {
            None => format!("{module}!{name}+{offset:x}"),
            Some(CodeInfo { file, line, .. }) => {
                format!("{module}!{name}+{offset:x} [{file} @ {line}]")
            }
        },
    }
}
