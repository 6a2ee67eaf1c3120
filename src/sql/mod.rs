//! # SQL Text Processing
//!
//! Everything that happens to client-supplied SQL before it reaches the
//! wire protocol lives here:
//!
//! - `lexer`: zero-copy scanner classifying the input into covering spans
//!   (text, comments, string/identifier/dollar quoting, escape clauses)
//!   while tracking parenthesis depth and parameter placeholders
//! - `splitter`: partitions the input into executable statement units at
//!   top-level semicolons only
//! - `escape`: recursive translation of JDBC `{...}` escape clauses into
//!   native PostgreSQL syntax
//!
//! The scanner only needs enough structure to find statement boundaries,
//! quoting regions, and escape-clause spans; it never builds an AST and
//! performs no semantic validation.
//!
//! ## Pipeline
//!
//! ```text
//! raw SQL ──scan──▶ spans + boundaries ──split──▶ raw segments
//!                                      ──escape──▶ translated units
//! ```
//!
//! All three stages are synchronous, single-threaded, and side-effect-free
//! over an immutable input string.

pub mod escape;
pub mod lexer;
pub mod splitter;

pub use lexer::{scan, ScanOutput, Span, SpanKind, SqlOptions};
pub use splitter::{split_ranges, StatementUnit};

use eyre::Result;

/// Lex, split, and (optionally) escape-translate one client-supplied SQL
/// string into the ordered sequence of executable statement units.
///
/// Any lexical or escape-syntax error aborts the whole call before a
/// single unit is produced; partial batches never escape this function.
pub fn prepare_statements(
    input: &str,
    options: &SqlOptions,
    escape_processing: bool,
) -> Result<Vec<StatementUnit>> {
    let output = scan(input, options)?;
    let ranges = split_ranges(input, &output);

    let mut units = Vec::with_capacity(ranges.len());
    for range in ranges {
        let raw = &input[range.clone()];
        let sql = if escape_processing {
            escape::process(raw, range.start)?
        } else {
            raw.to_string()
        };
        let sql = sql.trim().to_string();
        if sql.is_empty() {
            continue;
        }
        let param_count = lexer::count_placeholders(&sql, options)?;
        units.push(StatementUnit {
            index: units.len() + 1,
            sql,
            param_count,
        });
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SqlOptions {
        SqlOptions {
            accept_json_operators: true,
        }
    }

    #[test]
    fn prepare_translates_and_counts_params() {
        let units = prepare_statements("SELECT {fn concat('a', ?)}", &options(), true).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sql, "SELECT ('a' || ?)");
        assert_eq!(units[0].param_count, 1);
    }

    #[test]
    fn prepare_without_escape_processing_passes_braces_through() {
        let units = prepare_statements("SELECT {fn now()}", &options(), false).unwrap();
        assert_eq!(units[0].sql, "SELECT {fn now()}");
    }

    #[test]
    fn prepare_excludes_comment_only_units() {
        let units = prepare_statements("/* */; SELECT 1", &options(), true).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sql, "SELECT 1");
        assert_eq!(units[0].index, 1);
    }
}
