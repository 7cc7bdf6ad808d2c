//! Recovery of the comment-embedded sub-DSLs and JSDoc blocks from raw source text.
//!
//! None of this is part of the host grammar: markers live in line comments, so they
//! are found by scanning text. Malformed marker lines are skipped, never fatal.

use crate::contract::ast::FunctionDecl;
use crate::contract::module::{
    matching_close, split_top_level, ExpectExpression, Pattern, PipeExpression, PipeOperation,
    WhenClause, WhenExpression,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const DEFAULT_EXPECT_MESSAGE: &str = "Expected value but found None";

static WHEN_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"//\s*@when\s+([A-Za-z_$][\w$.]*)").expect("valid when marker regex")
});

static PIPE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//\s*@pipe\s+([^\n]+)").expect("valid pipe marker regex"));

static EXPECT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//\s*@expect\s+([^\n]+)").expect("valid expect marker regex"));

static IF_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bif\s*\(").expect("valid if regex"));

static HAS_PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:["'](\w+)["']\s+in\s+([\w$.]+)|([\w$.]+)\.hasOwnProperty\(\s*["'](\w+)["']\s*\))$"#)
        .expect("valid has-property regex")
});

static STEP_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$.]*$").expect("valid step name regex"));

// ---------------------------------------------------------------------------
// @when

pub fn when_expressions(body: &str) -> Vec<WhenExpression> {
    WHEN_MARKER
        .captures_iter(body)
        .map(|caps| {
            let scrutinee = caps[1].to_string();
            let clauses = when_clauses(body, &scrutinee);
            if clauses.is_empty() {
                warn!(scrutinee = %scrutinee, "@when marker without matching if-chain");
            }
            WhenExpression { scrutinee, clauses }
        })
        .collect()
}

/// Clauses for every `if (...)` testing `scrutinee`, in source order.
fn when_clauses(body: &str, scrutinee: &str) -> Vec<WhenClause> {
    let mut clauses = Vec::new();

    for found in IF_OPEN.find_iter(body) {
        let open = found.end() - 1;
        let Some(close) = matching_close(body, open) else {
            continue;
        };
        let Some((pattern, guard)) = clause_test(body[open + 1..close].trim(), scrutinee) else {
            continue;
        };
        let Some((block_open, block_close)) = block_after(body, close + 1) else {
            continue;
        };
        clauses.push(WhenClause {
            pattern,
            guard,
            body: body[block_open + 1..block_close].trim().to_string(),
        });

        // a plain `else { .. }` ends the chain with a wildcard
        let after = body[block_close + 1..].trim_start();
        if let Some(rest) = after.strip_prefix("else") {
            let rest = rest.trim_start();
            if rest.starts_with('{') {
                let else_open = body.len() - rest.len();
                if let Some(else_close) = matching_close(body, else_open) {
                    clauses.push(WhenClause {
                        pattern: Pattern::Wildcard,
                        guard: None,
                        body: body[else_open + 1..else_close].trim().to_string(),
                    });
                }
            }
        }
    }

    clauses
}

/// Offsets of the `{ .. }` block starting at or after `from` (whitespace only in between).
fn block_after(text: &str, from: usize) -> Option<(usize, usize)> {
    let rest = &text[from..];
    let open = from + (rest.len() - rest.trim_start().len());
    if text.as_bytes().get(open) != Some(&b'{') {
        return None;
    }
    matching_close(text, open).map(|close| (open, close))
}

fn clause_test(condition: &str, scrutinee: &str) -> Option<(Pattern, Option<String>)> {
    if condition.contains("||") {
        return None;
    }
    let parts = split_top_level(condition, &['&']);
    let (test, rest) = parts.split_first()?;
    let guard = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" && "))
    };

    if let Some(caps) = HAS_PROPERTY.captures(test) {
        let (key, target) = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
            (Some(key), Some(target), _, _) => (key.as_str(), target.as_str()),
            (_, _, Some(target), Some(key)) => (key.as_str(), target.as_str()),
            _ => return None,
        };
        return (target == scrutinee).then(|| {
            (
                Pattern::Constructor {
                    name: key.to_string(),
                    args: Vec::new(),
                },
                guard,
            )
        });
    }

    let rest = test.strip_prefix(scrutinee)?.trim_start();
    let value = rest
        .strip_prefix("===")
        .or_else(|| rest.strip_prefix("=="))?
        .trim();
    if value.is_empty() {
        return None;
    }
    Some((Pattern::Literal(literal_pattern(value)), guard))
}

fn literal_pattern(value: &str) -> String {
    match value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        Some(inner) => format!("\"{}\"", inner),
        None => value.to_string(),
    }
}

// ---------------------------------------------------------------------------
// @pipe

pub fn pipe_expressions(body: &str) -> Vec<PipeExpression> {
    PIPE_MARKER
        .captures_iter(body)
        .filter_map(|caps| {
            let offset = caps.get(0)?.start();
            let mut pipe = parse_pipe_line(&caps[1])?;
            pipe.offset = offset;
            Some(pipe)
        })
        .collect()
}

/// `seed |> step |> step(args..)`; `None` when the line is malformed.
pub fn parse_pipe_line(line: &str) -> Option<PipeExpression> {
    let segments: Vec<&str> = line.split("|>").map(str::trim).collect();
    if segments.len() < 2 || segments.iter().any(|segment| segment.is_empty()) {
        warn!(line = %line.trim(), "skipping malformed @pipe marker");
        return None;
    }

    let operations = segments[1..]
        .iter()
        .map(|segment| parse_step(segment))
        .collect::<Option<Vec<_>>>();
    match operations {
        Some(operations) => Some(PipeExpression {
            initial_value: segments[0].to_string(),
            operations,
            offset: 0,
        }),
        None => {
            warn!(line = %line.trim(), "skipping @pipe marker with an unreadable step");
            None
        }
    }
}

fn parse_step(segment: &str) -> Option<PipeOperation> {
    let (name, args) = match segment.find('(') {
        Some(open) => {
            let close = matching_close(segment, open)?;
            if close != segment.len() - 1 {
                return None;
            }
            (
                segment[..open].trim(),
                split_top_level(&segment[open + 1..close], &[',']),
            )
        }
        None => (segment, Vec::new()),
    };
    STEP_NAME.is_match(name).then(|| PipeOperation {
        function_name: name.to_string(),
        args,
    })
}

// ---------------------------------------------------------------------------
// @expect

/// `expr` or `expr, "message"`.
pub fn parse_expect_line(line: &str) -> Option<ExpectExpression> {
    let mut parts = split_top_level(line.trim(), &[',']);
    let message = match parts.last().map(|part| unquote(part)) {
        Some(Some(message)) if parts.len() > 1 => {
            parts.pop();
            Some(message)
        }
        _ => None,
    };
    if parts.is_empty() {
        return None;
    }
    Some(ExpectExpression {
        expression: parts.join(", "),
        error_message: message,
    })
}

fn unquote(text: &str) -> Option<String> {
    let text = text.trim();
    ['"', '\'', '`'].iter().find_map(|quote| {
        text.strip_prefix(*quote)
            .and_then(|rest| rest.strip_suffix(*quote))
            .map(str::to_string)
    })
}

/// Byte span of a function-like declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpan {
    pub start: usize,
    pub body_start: usize,
    pub body_end: usize,
}

impl FunctionSpan {
    pub fn of(decl: &FunctionDecl) -> Self {
        Self {
            start: decl.start,
            body_start: decl.body.start,
            body_end: decl.body.end,
        }
    }
}

struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        Self {
            newlines: source.match_indices('\n').map(|(index, _)| index).collect(),
        }
    }

    /// 1-based line of a byte offset.
    fn line(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&newline| newline < offset) + 1
    }
}

/// `@expect` markers grouped by the function they belong to.
///
/// A marker inside a function body belongs to that function. Any other marker
/// belongs to the nearest following declaration when it sits within `lookback`
/// lines of it, so adjacent markers always land on the same function.
#[derive(Debug, Default)]
pub struct ExpectIndex {
    by_function: HashMap<usize, Vec<ExpectExpression>>,
}

impl ExpectIndex {
    pub fn build(source: &str, spans: &[FunctionSpan], lookback: usize) -> Self {
        let lines = LineIndex::new(source);
        let mut by_function: HashMap<usize, Vec<ExpectExpression>> = HashMap::new();

        for caps in EXPECT_MARKER.captures_iter(source) {
            let Some(marker) = caps.get(0) else {
                continue;
            };
            let offset = marker.start();
            let Some(expect) = parse_expect_line(&caps[1]) else {
                warn!(line = lines.line(offset), "skipping empty @expect marker");
                continue;
            };

            let enclosing = spans
                .iter()
                .filter(|span| span.body_start <= offset && offset < span.body_end)
                .max_by_key(|span| span.body_start);
            let following = || {
                spans
                    .iter()
                    .filter(|span| span.start > offset)
                    .min_by_key(|span| span.start)
                    .filter(|span| lines.line(span.start) - lines.line(offset) <= lookback)
            };

            match enclosing.or_else(following) {
                Some(span) => by_function.entry(span.start).or_default().push(expect),
                None => debug!(line = lines.line(offset), "@expect marker outside any function"),
            }
        }

        Self { by_function }
    }

    /// Markers for the function declared at `start`; each is handed out once.
    pub fn take(&mut self, start: usize) -> Vec<ExpectExpression> {
        self.by_function.remove(&start).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// JSDoc

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Docs {
    pub lines: Vec<String>,
    pub opaque: bool,
}

fn doc_lines(block: &str) -> Docs {
    let mut opaque = false;
    let mut lines: Vec<String> = block
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim().to_string())
        .filter(|line| {
            if line.starts_with("@opaque") {
                opaque = true;
                false
            } else {
                !line.starts_with("@module")
            }
        })
        .collect();

    while lines.first().is_some_and(|line| line.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    Docs { lines, opaque }
}

/// The `/** .. */` block directly above `start`, if any.
pub fn leading_docs(source: &str, start: usize) -> Docs {
    let before = source[..start.min(source.len())].trim_end();
    let Some(head) = before.strip_suffix("*/") else {
        return Docs::default();
    };
    let Some(open) = head.rfind("/**") else {
        return Docs::default();
    };
    let block = &head[open + 3..];
    if block.contains("*/") || block.contains("@module") {
        return Docs::default();
    }
    doc_lines(block)
}

/// A leading file block tagged `@module`.
pub fn module_docs(source: &str) -> Vec<String> {
    let trimmed = source.trim_start();
    let Some(rest) = trimmed.strip_prefix("/**") else {
        return Vec::new();
    };
    match rest.find("*/") {
        Some(end) if rest[..end].contains("@module") => doc_lines(&rest[..end]).lines,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_line() {
        let pipe = parse_pipe_line("x |> double |> add(1, y)").unwrap();
        assert_eq!(pipe.initial_value, "x");
        assert_eq!(pipe.operations.len(), 2);
        assert_eq!(pipe.operations[0].function_name, "double");
        assert!(pipe.operations[0].args.is_empty());
        assert_eq!(pipe.operations[1].args, vec!["1", "y"]);
    }

    #[test]
    fn test_malformed_pipe_lines_are_skipped() {
        assert!(parse_pipe_line("x").is_none());
        assert!(parse_pipe_line("x |> ").is_none());
        assert!(parse_pipe_line("x |> 3bad").is_none());
        assert!(parse_pipe_line("x |> f(a) trailing").is_none());
    }

    #[test]
    fn test_expect_line() {
        let expect = parse_expect_line("datum.owner, \"missing owner\"").unwrap();
        assert_eq!(expect.expression, "datum.owner");
        assert_eq!(expect.error_message.as_deref(), Some("missing owner"));

        let bare = parse_expect_line("find(xs, 1)").unwrap();
        assert_eq!(bare.expression, "find(xs, 1)");
        assert_eq!(bare.error_message, None);

        assert!(parse_expect_line("   ").is_none());
    }

    #[test]
    fn test_when_literal_clauses_in_order() {
        let body = r#"{
  // @when action
  if (action === 1) { return a; }
  else if (action === 2) { return b; }
  else { return c; }
}"#;
        let whens = when_expressions(body);
        assert_eq!(whens.len(), 1);
        let clauses = &whens[0].clauses;
        assert_eq!(clauses.len(), 3);
        assert_eq!(clauses[0].pattern, Pattern::Literal("1".to_string()));
        assert_eq!(clauses[0].body, "return a;");
        assert_eq!(clauses[1].pattern, Pattern::Literal("2".to_string()));
        assert_eq!(clauses[2].pattern, Pattern::Wildcard);
        assert_eq!(clauses[2].body, "return c;");
    }

    #[test]
    fn test_when_has_property_and_guard() {
        let body = r#"{
  // @when redeemer
  if ("Claim" in redeemer && now > deadline) { return true; }
  if (redeemer.hasOwnProperty("Cancel")) { return false; }
}"#;
        let clauses = &when_expressions(body)[0].clauses;
        assert_eq!(
            clauses[0].pattern,
            Pattern::Constructor {
                name: "Claim".to_string(),
                args: Vec::new()
            }
        );
        assert_eq!(clauses[0].guard.as_deref(), Some("now > deadline"));
        assert_eq!(
            clauses[1].pattern,
            Pattern::Constructor {
                name: "Cancel".to_string(),
                args: Vec::new()
            }
        );
    }

    #[test]
    fn test_expect_association_with_lookback() {
        let source = "function a() {\n  return 1;\n}\n// @expect x, \"no x\"\n// @expect y\nfunction b() {\n  return 2;\n}\n";
        let a = source.find("function a").unwrap();
        let b = source.find("function b").unwrap();
        let spans = vec![
            FunctionSpan {
                start: a,
                body_start: source.find('{').unwrap(),
                body_end: source.find("}\n").unwrap() + 1,
            },
            FunctionSpan {
                start: b,
                body_start: b + source[b..].find('{').unwrap(),
                body_end: source.len() - 1,
            },
        ];

        let mut index = ExpectIndex::build(source, &spans, 10);
        assert!(index.take(a).is_empty());
        let expects = index.take(b);
        assert_eq!(expects.len(), 2);
        assert_eq!(expects[0].error_message.as_deref(), Some("no x"));
        assert_eq!(expects[1].expression, "y");

        let mut narrow = ExpectIndex::build(source, &spans, 0);
        assert!(narrow.take(b).is_empty());
    }

    #[test]
    fn test_leading_docs() {
        let source = "/**\n * Owner datum.\n * @opaque\n */\ntype Owner = string;";
        let start = source.find("type").unwrap();
        let docs = leading_docs(source, start);
        assert_eq!(docs.lines, vec!["Owner datum."]);
        assert!(docs.opaque);

        assert_eq!(leading_docs("const a = 1;\nconst b = 2;", 13), Docs::default());
    }

    #[test]
    fn test_module_docs() {
        let source = "/**\n * @module vesting\n * Time-locked payouts.\n */\nconst A = 1;";
        assert_eq!(module_docs(source), vec!["Time-locked payouts."]);
        assert!(module_docs("/** plain */ const A = 1;").is_empty());
    }
}
