//! Token-level grammar of the analysis report.
//!
//! ```text
//! Report     := Block*
//! Block      := Header "Memory" "Effect:" Tag ArgLine*
//! Header     := <any tokens> '@' NameToken        NameToken closes with "):"
//! ArgLine    := "Arg" '#'Index':' "Effect:" Tag "Capture:" YesNo
//! ```
//!
//! A block starts at the `@` introducing the function name inside the header
//! and ends at the token `Function` (the lead word of the next block's
//! header) or at end of input. Everything before an `@` is ignored, so
//! arbitrary header prose never confuses the parser; any unrecognized token
//! *inside* a block is malformed and fails the whole parse.

use super::cursor::TokenCursor;
use super::{ArgEffect, KernelInfo, ReportTable};
use crate::error::{InspectError, Result};

/// Parse report text into a table. Whole-input, atomic: any grammar
/// violation abandons the parse.
pub(super) fn parse(text: &str) -> Result<ReportTable> {
    let mut cur = TokenCursor::new(text);
    let mut table = ReportTable::default();

    // A report with no '@' at all is an empty report, not an error.
    while cur.seek_past('@') {
        table.insert(parse_block(&mut cur)?);
    }
    Ok(table)
}

/// Parse one function block, starting right after its `@`.
fn parse_block(cur: &mut TokenCursor<'_>) -> Result<KernelInfo> {
    let name = function_name(cur)?;
    expect(cur, "Memory")?;
    expect(cur, "Effect:")?;
    let memory_effect = required(cur, "memory effect tag")?.to_string();

    let mut ptr_args = Vec::new();
    loop {
        match cur.next_token() {
            // End of input terminates the final block.
            None => break,
            // Lead word of the next header; consumed as a pure terminator.
            Some("Function") => break,
            Some("Arg") => ptr_args.push(parse_arg(cur)?),
            Some(other) => {
                return Err(malformed(cur, format!("unexpected token `{other}`")));
            }
        }
    }

    Ok(KernelInfo {
        name,
        memory_effect,
        ptr_args,
    })
}

/// Extract the function name from the header's name token.
///
/// The header closes with `):` directly after the name, so exactly the two
/// trailing characters are stripped.
fn function_name(cur: &mut TokenCursor<'_>) -> Result<String> {
    let tok = required(cur, "function name")?;
    let mut chars = tok.chars();
    if chars.next_back().is_none() || chars.next_back().is_none() {
        return Err(malformed(
            cur,
            format!("function name token `{tok}` shorter than closing `):`"),
        ));
    }
    Ok(chars.as_str().to_string())
}

/// Parse one argument record, starting right after its `Arg` keyword.
fn parse_arg(cur: &mut TokenCursor<'_>) -> Result<ArgEffect> {
    let index = arg_index(cur)?;
    expect(cur, "Effect:")?;
    let effect = required(cur, "argument effect tag")?.to_string();
    expect(cur, "Capture:")?;
    let capture = required(cur, "capture flag")?.to_string();
    Ok(ArgEffect {
        index,
        effect,
        capture,
    })
}

/// Parse the `#<index>:` token following `Arg`.
fn arg_index(cur: &mut TokenCursor<'_>) -> Result<u32> {
    let tok = required(cur, "argument index")?;
    let digits = tok
        .strip_prefix('#')
        .and_then(|t| t.strip_suffix(':'))
        .ok_or_else(|| malformed(cur, format!("expected `#<index>:`, found `{tok}`")))?;
    digits
        .parse()
        .map_err(|_| malformed(cur, format!("invalid argument index `{digits}`")))
}

fn expect(cur: &mut TokenCursor<'_>, keyword: &str) -> Result<()> {
    match cur.next_token() {
        Some(tok) if tok == keyword => Ok(()),
        Some(tok) => Err(malformed(cur, format!("expected `{keyword}`, found `{tok}`"))),
        None => Err(malformed(
            cur,
            format!("expected `{keyword}`, found end of report"),
        )),
    }
}

fn required<'a>(cur: &mut TokenCursor<'a>, what: &str) -> Result<&'a str> {
    let tok = cur.next_token();
    tok.ok_or_else(|| malformed(cur, format!("missing {what} at end of report")))
}

fn malformed(cur: &TokenCursor<'_>, detail: String) -> InspectError {
    InspectError::ReportFormat {
        line: cur.line(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::super::ReportTable;
    use crate::error::InspectError;

    const SINGLE_BLOCK: &str = "\
Function (@vec_add):
Memory Effect: ArgMemOnly
Arg #0: Effect: ReadOnly Capture: No
Arg #2: Effect: ReadWrite Capture: No
";

    #[test]
    fn test_single_block_roundtrip() {
        let table = ReportTable::parse(SINGLE_BLOCK).unwrap();
        assert_eq!(table.len(), 1);

        let info = table.get("vec_add").unwrap();
        assert_eq!(info.name, "vec_add");
        assert_eq!(info.memory_effect, "ArgMemOnly");
        assert_eq!(info.ptr_args.len(), 2);
        assert_eq!(info.ptr_args[0].index, 0);
        assert_eq!(info.ptr_args[0].effect, "ReadOnly");
        assert_eq!(info.ptr_args[1].index, 2);
        assert_eq!(info.ptr_args[1].effect, "ReadWrite");
    }

    #[test]
    fn test_capture_flag_preserved() {
        let table = ReportTable::parse(
            "Function (@k):\nMemory Effect: Any\nArg #0: Effect: ReadOnly Capture: Yes\n",
        )
        .unwrap();
        assert_eq!(table.get("k").unwrap().ptr_args[0].capture, "Yes");
    }

    #[test]
    fn test_two_blocks() {
        let text = "\
Function (@alpha):
Memory Effect: ArgMemOnly
Arg #0: Effect: ReadOnly Capture: No
Function (@beta):
Memory Effect: Any
Arg #1: Effect: ReadWrite Capture: Yes
";
        let table = ReportTable::parse(text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("alpha").unwrap().ptr_args[0].index, 0);
        assert_eq!(table.get("beta").unwrap().memory_effect, "Any");
        assert_eq!(table.get("beta").unwrap().ptr_args[0].index, 1);
    }

    #[test]
    fn test_duplicate_name_last_write_wins() {
        let text = "\
Function (@k):
Memory Effect: First
Arg #0: Effect: ReadOnly Capture: No
Function (@k):
Memory Effect: Second
";
        let table = ReportTable::parse(text).unwrap();
        assert_eq!(table.len(), 1);
        let info = table.get("k").unwrap();
        assert_eq!(info.memory_effect, "Second");
        assert!(info.ptr_args.is_empty());
    }

    #[test]
    fn test_block_without_args() {
        let table = ReportTable::parse("Function (@bare):\nMemory Effect: None\n").unwrap();
        assert!(table.get("bare").unwrap().ptr_args.is_empty());
    }

    #[test]
    fn test_empty_report() {
        let table = ReportTable::parse("").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_report_without_marker_is_empty() {
        // Arbitrary prose with no '@' parses as an empty report.
        let table = ReportTable::parse("analysis pass ran, nothing to say\n").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_trailing_prose_after_last_block_ignored() {
        let text = "Function (@k):\nMemory Effect: Any\nFunction summary: 1 kernel\n";
        // "Function" ends the block; the rest contains no '@' and is skipped.
        let table = ReportTable::parse(text).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_malformed_arg_keyword() {
        let text = "\
Function (@k):
Memory Effect: ArgMemOnly
Argument #0: Effect: ReadOnly Capture: No
";
        let err = ReportTable::parse(text).unwrap_err();
        match err {
            InspectError::ReportFormat { line, detail } => {
                assert_eq!(line, 3);
                assert!(detail.contains("Argument"));
            }
            other => panic!("expected ReportFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_index_token() {
        let text = "Function (@k):\nMemory Effect: Any\nArg 0: Effect: ReadOnly Capture: No\n";
        let err = ReportTable::parse(text).unwrap_err();
        assert!(matches!(err, InspectError::ReportFormat { .. }));
        assert!(err.to_string().contains("#<index>:"));
    }

    #[test]
    fn test_name_token_too_short() {
        let err = ReportTable::parse("@x\nMemory Effect: Any\n").unwrap_err();
        assert!(matches!(err, InspectError::ReportFormat { .. }));
        assert!(err.to_string().contains("shorter"));
    }

    #[test]
    fn test_truncated_header() {
        let err = ReportTable::parse("Function (@k):\nMemory\n").unwrap_err();
        assert!(err.to_string().contains("Effect:"));
    }

    #[test]
    fn test_truncated_arg_record() {
        let text = "Function (@k):\nMemory Effect: Any\nArg #0: Effect:\n";
        let err = ReportTable::parse(text).unwrap_err();
        assert!(err.to_string().contains("argument effect tag"));
    }

    #[test]
    fn test_failed_parse_returns_no_table() {
        // First block is fine, second is malformed: the whole parse fails.
        let text = "\
Function (@good):
Memory Effect: Any
Function (@bad):
Memory Effekt: Any
";
        assert!(ReportTable::parse(text).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::super::ReportTable;
    use proptest::prelude::*;

    /// Strategy for well-formed report identifiers.
    fn ident() -> impl Strategy<Value = String> {
        "[A-Za-z_][A-Za-z0-9_]{0,24}"
    }

    proptest! {
        /// The parser never panics: arbitrary input either parses or fails
        /// with ReportFormat.
        #[test]
        fn prop_parse_never_panics(input in ".{0,400}") {
            let _ = ReportTable::parse(&input);
        }

        /// Generated well-formed single blocks round-trip verbatim.
        #[test]
        fn prop_wellformed_block_roundtrips(
            name in ident(),
            effect in ident(),
            args in proptest::collection::vec((0u32..16, "[A-Za-z]{1,12}"), 0..6),
        ) {
            let mut text = format!("Function (@{name}):\nMemory Effect: {effect}\n");
            for (index, tag) in &args {
                text.push_str(&format!("Arg #{index}: Effect: {tag} Capture: No\n"));
            }

            let table = ReportTable::parse(&text).unwrap();
            let info = table.get(&name).unwrap();
            prop_assert_eq!(&info.memory_effect, &effect);
            prop_assert_eq!(info.ptr_args.len(), args.len());
            for (parsed, (index, tag)) in info.ptr_args.iter().zip(&args) {
                prop_assert_eq!(parsed.index, *index);
                prop_assert_eq!(&parsed.effect, tag);
            }
        }
    }
}
