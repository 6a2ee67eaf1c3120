//! # Escape-Function Mapping Table
//!
//! Rewrites for the `{fn ...}` vocabulary, targeting PostgreSQL. Lookup is
//! a compile-time perfect hash (phf), keyed by the lowercased function
//! name. Functions absent from the table pass through unchanged with
//! their translated arguments; compatibility over completeness.
//!
//! `timestampadd`/`timestampdiff` use real calendar intervals for month,
//! quarter, and year: addition multiplies an interval literal, difference
//! decomposes `age()` rather than dividing a fixed epoch length.

use crate::error::DriverError;
use eyre::Result;
use phf::phf_map;

enum FnKind {
    /// Native call, possibly under another name: `target(args...)`.
    Call(&'static str),
    /// Keyword or niladic expression emitted without call syntax.
    Bare(&'static str),
    /// `(a || b || ...)`
    Concat,
    /// `position(s in t)` / `(position(s in substring(t from n)) + n - 1)`
    Locate,
    /// `overlay(a placing r from p for l)`
    Insert,
    /// `repeat(' ', n)`
    Space,
    /// `extract(<field> from x)`
    Extract(&'static str),
    /// `(extract(dow from x) + 1)` -- JDBC wants Sunday = 1
    DayOfWeek,
    /// `to_char(x, '<format>')`
    ToChar(&'static str),
    TimestampAdd,
    TimestampDiff,
}

static FUNCTIONS: phf::Map<&'static str, FnKind> = phf_map! {
    // numeric, largely 1:1
    "abs" => FnKind::Call("abs"),
    "acos" => FnKind::Call("acos"),
    "asin" => FnKind::Call("asin"),
    "atan" => FnKind::Call("atan"),
    "atan2" => FnKind::Call("atan2"),
    "ceiling" => FnKind::Call("ceil"),
    "cos" => FnKind::Call("cos"),
    "cot" => FnKind::Call("cot"),
    "degrees" => FnKind::Call("degrees"),
    "exp" => FnKind::Call("exp"),
    "floor" => FnKind::Call("floor"),
    "log" => FnKind::Call("ln"),
    "log10" => FnKind::Call("log"),
    "mod" => FnKind::Call("mod"),
    "pi" => FnKind::Call("pi"),
    "power" => FnKind::Call("power"),
    "radians" => FnKind::Call("radians"),
    "round" => FnKind::Call("round"),
    "sign" => FnKind::Call("sign"),
    "sin" => FnKind::Call("sin"),
    "sqrt" => FnKind::Call("sqrt"),
    "tan" => FnKind::Call("tan"),
    "truncate" => FnKind::Call("trunc"),
    // string
    "ascii" => FnKind::Call("ascii"),
    "char" => FnKind::Call("chr"),
    "concat" => FnKind::Concat,
    "insert" => FnKind::Insert,
    "lcase" => FnKind::Call("lower"),
    "left" => FnKind::Call("left"),
    "length" => FnKind::Call("length"),
    "locate" => FnKind::Locate,
    "ltrim" => FnKind::Call("ltrim"),
    "repeat" => FnKind::Call("repeat"),
    "replace" => FnKind::Call("replace"),
    "right" => FnKind::Call("right"),
    "rtrim" => FnKind::Call("rtrim"),
    "space" => FnKind::Space,
    "substring" => FnKind::Call("substring"),
    "ucase" => FnKind::Call("upper"),
    // date/time
    "curdate" => FnKind::Bare("current_date"),
    "curtime" => FnKind::Bare("current_time"),
    "now" => FnKind::Call("now"),
    "dayname" => FnKind::ToChar("Day"),
    "dayofmonth" => FnKind::Extract("day"),
    "dayofweek" => FnKind::DayOfWeek,
    "dayofyear" => FnKind::Extract("doy"),
    "hour" => FnKind::Extract("hour"),
    "minute" => FnKind::Extract("minute"),
    "month" => FnKind::Extract("month"),
    "monthname" => FnKind::ToChar("Month"),
    "quarter" => FnKind::Extract("quarter"),
    "second" => FnKind::Extract("second"),
    "week" => FnKind::Extract("week"),
    "year" => FnKind::Extract("year"),
    "timestampadd" => FnKind::TimestampAdd,
    "timestampdiff" => FnKind::TimestampDiff,
    // system
    "database" => FnKind::Call("current_database"),
    "ifnull" => FnKind::Call("coalesce"),
    "user" => FnKind::Bare("user"),
};

/// How `timestampdiff` computes a unit difference.
enum DiffRule {
    /// Truncated division of the epoch-seconds difference.
    EpochSeconds(u64),
    /// `age()` decomposition in months, divided by the month span.
    Months(u32),
    /// Year component of `age()` alone.
    Years,
}

struct IntervalUnit {
    /// Interval literal multiplied by the amount in `timestampadd`.
    interval: &'static str,
    diff: DiffRule,
}

static INTERVAL_UNITS: phf::Map<&'static str, IntervalUnit> = phf_map! {
    "SQL_TSI_SECOND" => IntervalUnit { interval: "1 second", diff: DiffRule::EpochSeconds(1) },
    "SQL_TSI_MINUTE" => IntervalUnit { interval: "1 minute", diff: DiffRule::EpochSeconds(60) },
    "SQL_TSI_HOUR" => IntervalUnit { interval: "1 hour", diff: DiffRule::EpochSeconds(3600) },
    "SQL_TSI_DAY" => IntervalUnit { interval: "1 day", diff: DiffRule::EpochSeconds(86400) },
    "SQL_TSI_WEEK" => IntervalUnit { interval: "1 week", diff: DiffRule::EpochSeconds(604800) },
    "SQL_TSI_MONTH" => IntervalUnit { interval: "1 month", diff: DiffRule::Months(1) },
    "SQL_TSI_QUARTER" => IntervalUnit { interval: "3 months", diff: DiffRule::Months(3) },
    "SQL_TSI_YEAR" => IntervalUnit { interval: "1 year", diff: DiffRule::Years },
};

/// Rewrite one `{fn name(args...)}` clause to native syntax. Arguments
/// arrive already translated (nested escapes resolved).
pub(crate) fn rewrite(name: &str, args: &[String], at: usize) -> Result<String> {
    let kind = match FUNCTIONS.get(name.to_ascii_lowercase().as_str()) {
        Some(kind) => kind,
        None => return Ok(format!("{}({})", name, args.join(", "))),
    };

    match kind {
        FnKind::Call(target) => Ok(format!("{}({})", target, args.join(", "))),
        FnKind::Bare(target) => {
            expect_args(name, args, 0, at)?;
            Ok((*target).to_string())
        }
        FnKind::Concat => {
            if args.is_empty() {
                return Err(arity_error(name, "at least 1", args.len(), at));
            }
            Ok(format!("({})", args.join(" || ")))
        }
        FnKind::Locate => match args {
            [needle, haystack] => Ok(format!("position({} in {})", needle, haystack)),
            [needle, haystack, from] => Ok(format!(
                "(position({} in substring({} from {})) + {} - 1)",
                needle, haystack, from, from
            )),
            _ => Err(arity_error(name, "2 or 3", args.len(), at)),
        },
        FnKind::Insert => match args {
            [text, from, len, replacement] => Ok(format!(
                "overlay({} placing {} from {} for {})",
                text, replacement, from, len
            )),
            _ => Err(arity_error(name, "4", args.len(), at)),
        },
        FnKind::Space => match args {
            [count] => Ok(format!("repeat(' ', {})", count)),
            _ => Err(arity_error(name, "1", args.len(), at)),
        },
        FnKind::Extract(field) => match args {
            [value] => Ok(format!("extract({} from {})", field, value)),
            _ => Err(arity_error(name, "1", args.len(), at)),
        },
        FnKind::DayOfWeek => match args {
            [value] => Ok(format!("(extract(dow from {}) + 1)", value)),
            _ => Err(arity_error(name, "1", args.len(), at)),
        },
        FnKind::ToChar(format) => match args {
            [value] => Ok(format!("to_char({}, '{}')", value, format)),
            _ => Err(arity_error(name, "1", args.len(), at)),
        },
        FnKind::TimestampAdd => match args {
            [unit, amount, ts] => {
                let unit = interval_unit(unit, at)?;
                Ok(format!(
                    "({} + {} * interval '{}')",
                    ts, amount, unit.interval
                ))
            }
            _ => Err(arity_error(name, "3", args.len(), at)),
        },
        FnKind::TimestampDiff => match args {
            [unit, from, to] => {
                let unit = interval_unit(unit, at)?;
                Ok(timestamp_diff(&unit.diff, from, to))
            }
            _ => Err(arity_error(name, "3", args.len(), at)),
        },
    }
}

fn timestamp_diff(rule: &DiffRule, from: &str, to: &str) -> String {
    match rule {
        DiffRule::EpochSeconds(1) => {
            format!("trunc(extract(epoch from ({} - {})))::bigint", to, from)
        }
        DiffRule::EpochSeconds(seconds) => format!(
            "trunc(extract(epoch from ({} - {})) / {})::bigint",
            to, from, seconds
        ),
        DiffRule::Months(1) => format!(
            "(extract(year from age({to}, {from})) * 12 + extract(month from age({to}, {from})))::bigint",
            to = to,
            from = from
        ),
        DiffRule::Months(months) => format!(
            "trunc((extract(year from age({to}, {from})) * 12 + extract(month from age({to}, {from}))) / {m})::bigint",
            to = to,
            from = from,
            m = months
        ),
        DiffRule::Years => format!(
            "extract(year from age({}, {}))::bigint",
            to, from
        ),
    }
}

fn interval_unit(keyword: &str, at: usize) -> Result<&'static IntervalUnit> {
    INTERVAL_UNITS
        .get(keyword.to_ascii_uppercase().as_str())
        .ok_or_else(|| {
            DriverError::escape_syntax(format!("unknown interval unit '{}'", keyword), at).into()
        })
}

fn expect_args(name: &str, args: &[String], want: usize, at: usize) -> Result<()> {
    if args.len() != want {
        return Err(arity_error(name, &want.to_string(), args.len(), at));
    }
    Ok(())
}

fn arity_error(name: &str, want: &str, got: usize, at: usize) -> eyre::Report {
    DriverError::escape_syntax(
        format!("'{}' expects {} argument(s), got {}", name, want, got),
        at,
    )
    .into()
}
