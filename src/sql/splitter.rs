//! # Statement Splitter
//!
//! Partitions one client-supplied SQL string into independently executable
//! statement units using the scanner's span stream. A semicolon is a
//! statement boundary iff it sits at parenthesis depth 0 in a `Text` span;
//! semicolons inside strings, comments, dollar quotes, escape clauses, or
//! parenthesized bodies (rule actions like `DO (stmt; stmt;)`) never
//! split.
//!
//! Segments that contain nothing executable -- empty input, a trailing
//! semicolon, whitespace, bare comments -- are excluded from the unit
//! list rather than represented as zero-length statements.

use super::lexer::{ScanOutput, SpanKind};
use smallvec::SmallVec;
use std::ops::Range;

/// One executable statement, 1-based-indexed within its batch, holding the
/// final (escape-translated) SQL text and its `?` placeholder count.
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementUnit {
    pub index: usize,
    pub sql: String,
    pub param_count: usize,
}

/// Split the input into raw executable segment ranges at the scanner's
/// top-level semicolon boundaries. Ranges exclude the semicolons
/// themselves; non-executable segments are dropped.
pub fn split_ranges<'a>(input: &str, output: &ScanOutput<'a>) -> SmallVec<[Range<usize>; 2]> {
    let mut ranges: SmallVec<[Range<usize>; 2]> = SmallVec::new();
    let mut start = 0usize;

    for &boundary in &output.boundaries {
        push_executable(input, output, start..boundary, &mut ranges);
        start = boundary + 1;
    }
    push_executable(input, output, start..input.len(), &mut ranges);
    ranges
}

fn push_executable(
    input: &str,
    output: &ScanOutput<'_>,
    range: Range<usize>,
    ranges: &mut SmallVec<[Range<usize>; 2]>,
) {
    if range.is_empty() {
        return;
    }
    if is_executable(input, output, &range) {
        ranges.push(range);
    }
}

/// A segment is executable iff some overlapping non-comment span
/// contributes a non-whitespace byte. Quoting and escape spans always do
/// (their delimiters are content); text spans are checked byte-wise.
fn is_executable(input: &str, output: &ScanOutput<'_>, range: &Range<usize>) -> bool {
    for span in &output.spans {
        if span.end <= range.start || span.start >= range.end {
            continue;
        }
        if span.is_comment() {
            continue;
        }
        match span.kind {
            SpanKind::Text => {
                let lo = span.start.max(range.start);
                let hi = span.end.min(range.end);
                if input[lo..hi].bytes().any(|b| !b.is_ascii_whitespace()) {
                    return true;
                }
            }
            _ => return true,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::lexer::{scan, SqlOptions};

    fn split(input: &str) -> Vec<String> {
        let options = SqlOptions {
            accept_json_operators: true,
        };
        let output = scan(input, &options).unwrap();
        split_ranges(input, &output)
            .into_iter()
            .map(|r| input[r].trim().to_string())
            .collect()
    }

    #[test]
    fn splits_at_top_level_semicolons() {
        let units = split("SELECT 1; UPDATE t SET i=1; SELECT 2");
        assert_eq!(units, vec!["SELECT 1", "UPDATE t SET i=1", "SELECT 2"]);
    }

    #[test]
    fn trailing_semicolon_yields_no_empty_unit() {
        assert_eq!(split("SELECT 1;"), vec!["SELECT 1"]);
    }

    #[test]
    fn empty_and_whitespace_inputs_yield_nothing() {
        assert!(split("").is_empty());
        assert!(split("   \n\t  ").is_empty());
        assert!(split(";;;").is_empty());
    }

    #[test]
    fn comment_only_segments_are_excluded() {
        assert_eq!(split("/* */; SELECT 1"), vec!["SELECT 1"]);
        assert_eq!(split("-- note\n; SELECT 1"), vec!["SELECT 1"]);
        assert!(split("/* only a comment */").is_empty());
    }

    #[test]
    fn rule_body_semicolons_stay_together() {
        let sql = "CREATE RULE r1 AS ON INSERT TO escapetest DO (DELETE FROM t ; \
                   INSERT INTO t VALUES (1); INSERT INTO t VALUES (2); );";
        assert_eq!(split(sql).len(), 1);
    }

    #[test]
    fn dollar_quoted_semicolon_does_not_split() {
        assert_eq!(split("SELECT $$;$$"), vec!["SELECT $$;$$"]);
        assert_eq!(split("SELECT '$a$ ; $a$'"), vec!["SELECT '$a$ ; $a$'"]);
    }

    #[test]
    fn tag_exact_dollar_quotes_survive_splitting() {
        let sql = "SELECT $OR$$a$'$b$a$$OR$ WHERE '$a$''$b$a$'=$OR$$a$'$b$a$$OR$OR ';'=''";
        assert_eq!(split(sql), vec![sql]);
    }

    #[test]
    fn string_semicolons_do_not_split() {
        assert_eq!(
            split("INSERT INTO t VALUES ('hello; world'); SELECT 1"),
            vec!["INSERT INTO t VALUES ('hello; world')", "SELECT 1"]
        );
    }

    #[test]
    fn comment_wrapped_quoting_stays_single() {
        assert_eq!(
            split("SELECT /* */$$;$$/**//*;*/"),
            vec!["SELECT /* */$$;$$/**//*;*/"]
        );
        assert_eq!(
            split("SELECT /* */--;\n$$a$$/**/--\n--;\n"),
            vec!["SELECT /* */--;\n$$a$$/**/--\n--;"]
        );
    }

    #[test]
    fn boundaries_are_lossless() {
        let input = "SELECT 1 ; UPDATE t SET i = 2;\n SELECT 3";
        let units = split(input);
        let rejoined = units.join("; ");
        let normalized: String = input.split(';').map(str::trim).collect::<Vec<_>>().join("; ");
        assert_eq!(rejoined, normalized);
    }
}
