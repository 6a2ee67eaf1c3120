//! # Escape-Clause Translation
//!
//! Rewrites JDBC vendor escape clauses embedded in client SQL into native
//! PostgreSQL syntax:
//!
//! - `{fn name(args...)}` -- portable function calls, mapped through the
//!   table in [`functions`]
//! - `{d '...'}`, `{t '...'}`, `{ts '...'}` -- date/time/timestamp
//!   literal casts
//! - `{oj a LEFT OUTER JOIN b ON cond}` -- braces stripped, join syntax
//!   is native
//! - `{escape 'c'}` -- `ESCAPE 'c'` in place
//! - `{timestampadd(...)}` / `{timestampdiff(...)}` -- bare-call form,
//!   treated as `fn`
//!
//! Clauses are matched with an explicit `{`/`}` stack into an
//! [`EscapeNode`] tree; a node's children render before the node itself,
//! so nested escapes translate inside-out (`{fn log({fn log(3.0)})}`
//! becomes `ln(ln(3.0))`). Braces inside string literals, quoted
//! identifiers, comments, and dollar quotes are ordinary characters.
//!
//! Unknown function names pass through unchanged with translated
//! arguments; the translator optimizes for compatibility, not
//! completeness. Structurally malformed clauses are escape-syntax errors,
//! surfaced before any network round trip.

pub(crate) mod functions;

use crate::error::DriverError;
use eyre::Result;
use smallvec::SmallVec;

/// One `{...}` clause: ordered body fragments, each literal text or a
/// nested clause. Built bottom-up with an explicit brace stack.
#[derive(Debug)]
pub struct EscapeNode {
    pieces: Vec<Fragment>,
    start: usize,
}

#[derive(Debug)]
enum Fragment {
    Literal(String),
    Clause(EscapeNode),
}

/// Translate every escape clause in one statement's text. `base` is the
/// statement's byte offset in the original input, used for error
/// positions.
pub fn process(text: &str, base: usize) -> Result<String> {
    let pieces = build(text, base)?;
    render_fragments(pieces)
}

/// Brace-match the text into a fragment tree. Quoting and comment
/// constructs are copied verbatim; only braces outside them structure the
/// tree.
fn build(text: &str, base: usize) -> Result<Vec<Fragment>> {
    let bytes = text.as_bytes();
    let mut root: Vec<Fragment> = Vec::new();
    let mut stack: Vec<EscapeNode> = Vec::new();
    let mut lit_start = 0usize;
    let mut pos = 0usize;

    macro_rules! flush {
        () => {{
            if lit_start < pos {
                let target = match stack.last_mut() {
                    Some(node) => &mut node.pieces,
                    None => &mut root,
                };
                target.push(Fragment::Literal(text[lit_start..pos].to_string()));
            }
        }};
    }

    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' => pos = skip_quoted(bytes, pos, b'\'', base)?,
            b'"' => pos = skip_quoted(bytes, pos, b'"', base)?,
            b'-' if bytes.get(pos + 1) == Some(&b'-') => pos = skip_line_comment(bytes, pos),
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = skip_block_comment(bytes, pos, base)?
            }
            b'$' => match dollar_tag_end(bytes, pos) {
                Some(open_end) => pos = skip_dollar_quote(text, pos, open_end, base)?,
                None => pos += 1,
            },
            b'{' => {
                flush!();
                stack.push(EscapeNode {
                    pieces: Vec::new(),
                    start: base + pos,
                });
                pos += 1;
                lit_start = pos;
            }
            b'}' => {
                flush!();
                let node = stack.pop().ok_or_else(|| {
                    DriverError::escape_syntax("unmatched '}'", base + pos)
                })?;
                let target = match stack.last_mut() {
                    Some(parent) => &mut parent.pieces,
                    None => &mut root,
                };
                target.push(Fragment::Clause(node));
                pos += 1;
                lit_start = pos;
            }
            _ => pos += 1,
        }
    }

    if let Some(node) = stack.pop() {
        return Err(DriverError::escape_syntax("unterminated escape clause", node.start).into());
    }
    flush!();
    Ok(root)
}

fn render_fragments(pieces: Vec<Fragment>) -> Result<String> {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Fragment::Literal(text) => out.push_str(&text),
            Fragment::Clause(node) => out.push_str(&render_clause(node)?),
        }
    }
    Ok(out)
}

fn render_clause(node: EscapeNode) -> Result<String> {
    let start = node.start;
    // children resolve first: the body seen below is already native SQL
    let body = render_fragments(node.pieces)?;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(DriverError::escape_syntax("empty escape clause", start).into());
    }

    let (word, rest) = split_leading_word(trimmed);
    match word.to_ascii_lowercase().as_str() {
        "fn" => {
            let (name, args) = parse_call(rest, start)?;
            functions::rewrite(&name, &args, start)
        }
        "d" => literal_cast("DATE", rest, start),
        "t" => literal_cast("TIME", rest, start),
        "ts" => literal_cast("TIMESTAMP", rest, start),
        "oj" => {
            if rest.trim().is_empty() {
                return Err(DriverError::escape_syntax("empty outer-join clause", start).into());
            }
            Ok(rest.trim().to_string())
        }
        "escape" => {
            if rest.trim().is_empty() {
                return Err(DriverError::escape_syntax("empty ESCAPE clause", start).into());
            }
            Ok(format!("ESCAPE {}", rest.trim()))
        }
        _ if rest.trim_start().starts_with('(') => {
            // bare function-call form, e.g. {timestampadd(...)}
            let (name, args) = parse_call(trimmed, start)?;
            functions::rewrite(&name, &args, start)
        }
        other => Err(DriverError::escape_syntax(
            format!("unrecognized escape clause '{}'", other),
            start,
        )
        .into()),
    }
}

fn literal_cast(cast: &str, rest: &str, start: usize) -> Result<String> {
    let literal = rest.trim();
    if literal.is_empty() {
        return Err(DriverError::escape_syntax(
            format!("{} escape requires a literal", cast),
            start,
        )
        .into());
    }
    Ok(format!("{} {}", cast, literal))
}

fn split_leading_word(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    (&text[..end], &text[end..])
}

/// Parse `name(arg, arg, ...)`, splitting arguments at top-level commas
/// only: commas nested in parens, strings, or dollar quotes never split.
fn parse_call(text: &str, start: usize) -> Result<(String, SmallVec<[String; 4]>)> {
    let trimmed = text.trim();
    let (name, rest) = split_leading_word(trimmed);
    if name.is_empty() {
        return Err(DriverError::escape_syntax("expected function name", start).into());
    }
    let rest = rest.trim_start();
    if !rest.starts_with('(') {
        return Err(DriverError::escape_syntax(
            format!("expected '(' after function name '{}'", name),
            start,
        )
        .into());
    }

    let bytes = rest.as_bytes();
    let mut depth = 0i32;
    let mut pos = 0usize;
    let mut arg_start = 1usize;
    let mut args: SmallVec<[String; 4]> = SmallVec::new();
    let mut body_end = None;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' => pos = skip_quoted(bytes, pos, b'\'', start)?,
            b'"' => pos = skip_quoted(bytes, pos, b'"', start)?,
            b'$' => match dollar_tag_end(bytes, pos) {
                Some(open_end) => pos = skip_dollar_quote(rest, pos, open_end, start)?,
                None => pos += 1,
            },
            b'(' => {
                depth += 1;
                pos += 1;
            }
            b')' => {
                depth -= 1;
                pos += 1;
                if depth == 0 {
                    body_end = Some(pos - 1);
                    break;
                }
            }
            b',' if depth == 1 => {
                let arg = rest[arg_start..pos].trim();
                if arg.is_empty() {
                    return Err(DriverError::escape_syntax(
                        format!("empty argument in call to '{}'", name),
                        start,
                    )
                    .into());
                }
                args.push(arg.to_string());
                pos += 1;
                arg_start = pos;
            }
            _ => pos += 1,
        }
    }

    let body_end = body_end.ok_or_else(|| {
        DriverError::escape_syntax(format!("unterminated argument list for '{}'", name), start)
    })?;
    if !rest[body_end + 1..].trim().is_empty() {
        return Err(DriverError::escape_syntax(
            format!("unexpected text after '{}(...)'", name),
            start,
        )
        .into());
    }

    let last = rest[arg_start..body_end].trim();
    if !last.is_empty() {
        args.push(last.to_string());
    } else if !args.is_empty() {
        return Err(DriverError::escape_syntax(
            format!("empty argument in call to '{}'", name),
            start,
        )
        .into());
    }

    Ok((name.to_string(), args))
}

fn skip_quoted(bytes: &[u8], open: usize, quote: u8, base: usize) -> Result<usize> {
    let mut pos = open + 1;
    while pos < bytes.len() {
        if bytes[pos] == quote {
            if bytes.get(pos + 1) == Some(&quote) {
                pos += 2;
            } else {
                return Ok(pos + 1);
            }
        } else {
            pos += 1;
        }
    }
    Err(DriverError::lexical("unterminated string literal", base + open).into())
}

fn skip_line_comment(bytes: &[u8], open: usize) -> usize {
    let mut pos = open;
    while pos < bytes.len() && bytes[pos] != b'\n' {
        pos += 1;
    }
    pos.min(bytes.len())
}

fn skip_block_comment(bytes: &[u8], open: usize, base: usize) -> Result<usize> {
    let mut pos = open + 2;
    let mut depth = 1u32;
    while pos < bytes.len() && depth > 0 {
        if bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'*') {
            depth += 1;
            pos += 2;
        } else if bytes[pos] == b'*' && bytes.get(pos + 1) == Some(&b'/') {
            depth -= 1;
            pos += 2;
        } else {
            pos += 1;
        }
    }
    if depth > 0 {
        return Err(DriverError::lexical("unterminated block comment", base + open).into());
    }
    Ok(pos)
}

/// At a `$`, the exclusive end of the opening delimiter iff this opens a
/// dollar quote.
fn dollar_tag_end(bytes: &[u8], at: usize) -> Option<usize> {
    let mut i = at + 1;
    match bytes.get(i) {
        Some(b'$') => return Some(i + 1),
        Some(c) if c.is_ascii_alphabetic() || *c == b'_' => {}
        _ => return None,
    }
    i += 1;
    while let Some(c) = bytes.get(i) {
        if c.is_ascii_alphanumeric() || *c == b'_' {
            i += 1;
        } else if *c == b'$' {
            return Some(i + 1);
        } else {
            return None;
        }
    }
    None
}

fn skip_dollar_quote(text: &str, open: usize, open_end: usize, base: usize) -> Result<usize> {
    let delimiter = &text[open..open_end];
    match text[open_end..].find(delimiter) {
        Some(idx) => Ok(open_end + idx + delimiter.len()),
        None => Err(DriverError::lexical("unterminated dollar-quoted string", base + open).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;

    fn translate(text: &str) -> String {
        process(text, 0).unwrap()
    }

    fn translate_err(text: &str) -> DriverError {
        process(text, 0)
            .unwrap_err()
            .downcast_ref::<DriverError>()
            .cloned()
            .expect("expected a DriverError")
    }

    #[test]
    fn text_without_escapes_is_unchanged() {
        assert_eq!(translate("SELECT 1 FROM t"), "SELECT 1 FROM t");
    }

    #[test]
    fn date_time_timestamp_literals() {
        assert_eq!(translate("{d '1900-01-01'}"), "DATE '1900-01-01'");
        assert_eq!(translate("{t '00:00:00'}"), "TIME '00:00:00'");
        assert_eq!(
            translate("{ts '1900-01-01 00:00:00'}"),
            "TIMESTAMP '1900-01-01 00:00:00'"
        );
    }

    #[test]
    fn escape_clause_in_place() {
        assert_eq!(
            translate("select s from t where s like '|_abcd' {escape '|'}"),
            "select s from t where s like '|_abcd' ESCAPE '|'"
        );
    }

    #[test]
    fn outer_join_braces_stripped() {
        assert_eq!(
            translate("select * from {oj a left outer join b on (a.i = b.i)}"),
            "select * from a left outer join b on (a.i = b.i)"
        );
    }

    #[test]
    fn nested_escapes_resolve_inside_out() {
        assert_eq!(translate("{fn log({fn log(3.0)})}"), "ln(ln(3.0))");
    }

    #[test]
    fn deeply_nested_datetime_escapes() {
        assert_eq!(
            translate("{fn dayofweek({ts '2005-01-17 12:00:00'})}"),
            "(extract(dow from TIMESTAMP '2005-01-17 12:00:00') + 1)"
        );
    }

    #[test]
    fn braces_inside_string_arguments_are_literal() {
        assert_eq!(translate("{fn concat('{','}')}"), "('{' || '}')");
        assert_eq!(translate("{fn concat('''','\"')}"), "('''' || '\"')");
    }

    #[test]
    fn quoted_identifier_arguments_survive() {
        assert_eq!(
            translate("{fn concat(\"\"\"){a}'\", '''}''')}"),
            "(\"\"\"){a}'\" || '''}''')"
        );
    }

    #[test]
    fn commas_inside_nested_calls_do_not_split_arguments() {
        assert_eq!(
            translate("{fn power({fn round(3.1294,2)},2)}"),
            "power(round(3.1294, 2), 2)"
        );
    }

    #[test]
    fn multiple_clauses_in_one_statement() {
        assert_eq!(
            translate("select {fn user()} as u, {fn pi()} as p"),
            "select user as u, pi() as p"
        );
    }

    #[test]
    fn bare_call_form_is_a_function_escape() {
        assert_eq!(
            translate("{timestampadd(SQL_TSI_DAY, 3, now())}"),
            "(now() + 3 * interval '1 day')"
        );
    }

    #[test]
    fn unknown_function_passes_through() {
        assert_eq!(
            translate("{fn frobnicate(a, b)}"),
            "frobnicate(a, b)"
        );
    }

    #[test]
    fn unmatched_close_brace_is_error() {
        assert!(matches!(
            translate_err("SELECT 1 }"),
            DriverError::EscapeSyntax { .. }
        ));
    }

    #[test]
    fn unterminated_clause_is_error() {
        assert!(matches!(
            translate_err("SELECT {fn now("),
            DriverError::EscapeSyntax { .. }
        ));
    }

    #[test]
    fn empty_clause_is_error() {
        assert!(matches!(
            translate_err("SELECT {}"),
            DriverError::EscapeSyntax { .. }
        ));
    }

    #[test]
    fn unrecognized_keyword_is_error() {
        assert!(matches!(
            translate_err("SELECT {bogus 'x'}"),
            DriverError::EscapeSyntax { .. }
        ));
    }

    #[test]
    fn missing_call_after_fn_is_error() {
        assert!(matches!(
            translate_err("SELECT {fn}"),
            DriverError::EscapeSyntax { .. }
        ));
    }

    #[test]
    fn empty_argument_is_error() {
        assert!(matches!(
            translate_err("SELECT {fn concat(a,)}"),
            DriverError::EscapeSyntax { .. }
        ));
    }

    #[test]
    fn braces_in_comments_inside_clause_are_literal() {
        assert_eq!(translate("{fn pi()} /* { not a clause } */"), "pi() /* { not a clause } */");
    }
}
