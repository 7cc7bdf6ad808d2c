//! Text-level body conversion for bodies outside the structurally parsed subset.
//!
//! An ordered list of rewrites over the raw body text. It does not understand
//! scoping or strings, so bodies outside the supported subset come out wrong in
//! predictable ways; the limitation tests below pin those down.

use crate::contract::module::matching_close;
use crate::transpiler::builtins::BuiltinRegistry;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid body rewrite regex")
}

static BINDING: Lazy<Regex> = Lazy::new(|| regex(r"\b(?:const|let|var)\s+"));
static NE_TRUE: Lazy<Regex> = Lazy::new(|| regex(r"([A-Za-z_$][\w$.]*)\s*!==?\s*true\b"));
static NE_FALSE: Lazy<Regex> = Lazy::new(|| regex(r"([^!=\s])\s*!==?\s*false\b"));
static EQ_TRUE: Lazy<Regex> = Lazy::new(|| regex(r"([^!=\s])\s*===?\s*true\b"));
static EQ_FALSE: Lazy<Regex> = Lazy::new(|| regex(r"([A-Za-z_$][\w$.]*)\s*===?\s*false\b"));
static LOGICAL_AND: Lazy<Regex> = Lazy::new(|| regex(r"\s*&&\s*"));
static LOGICAL_OR: Lazy<Regex> = Lazy::new(|| regex(r"\s*\|\|\s*"));
static RETURN: Lazy<Regex> = Lazy::new(|| regex(r"\breturn\b\s*"));
static TERMINATOR: Lazy<Regex> = Lazy::new(|| regex(r"(?m);([ \t]*(?:\}|$))"));
static NULLISH: Lazy<Regex> = Lazy::new(|| regex(r"\b(?:null|undefined)\b"));
static DATE_NOW: Lazy<Regex> = Lazy::new(|| regex(r"\bDate\.now\(\)"));
static TYPEOF: Lazy<Regex> =
    Lazy::new(|| regex(r#"typeof\s+([\w$.]+)\s*(==|!=)\s*["'](string|number|bigint|boolean)["']"#));
static STRINGIFY: Lazy<Regex> = Lazy::new(|| regex(r"\bJSON\.stringify\("));
static SPREAD: Lazy<Regex> = Lazy::new(|| regex(r"\.\.\."));
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| regex(r"(?m)[ \t]*//[^\n]*$"));
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| regex(r"(?s)/\*.*?\*/"));
static IN_CHECK: Lazy<Regex> = Lazy::new(|| regex(r#"["'](\w+)["']\s+in\s+([\w$.]+)"#));
static HAS_OWN: Lazy<Regex> =
    Lazy::new(|| regex(r#"([\w$.]+)\.hasOwnProperty\(\s*["'](\w+)["']\s*\)"#));
static LENGTH: Lazy<Regex> = Lazy::new(|| regex(r"([A-Za-z_$][\w$.]*)\.length\b"));
static INDEX: Lazy<Regex> = Lazy::new(|| regex(r"([A-Za-z_$][\w$.]*)\[([^\[\]]+)\]"));
static CONSOLE_LOG: Lazy<Regex> = Lazy::new(|| regex(r"\bconsole\.(?:log|error|warn)\("));
static TX: Lazy<Regex> = Lazy::new(|| regex(r"\btx\b"));
static TRUE: Lazy<Regex> = Lazy::new(|| regex(r"\btrue\b"));
static FALSE: Lazy<Regex> = Lazy::new(|| regex(r"\bfalse\b"));

/// Convert a raw body (braces included or not) into target text.
///
/// Rewrites that introduce library calls record them in `registry`.
pub fn convert_body(raw: &str, registry: &mut BuiltinRegistry) -> String {
    let text = BINDING.replace_all(raw, "let ").into_owned();

    // negated comparisons before plain ones
    let text = NE_TRUE.replace_all(&text, "!$1").into_owned();
    let text = NE_FALSE.replace_all(&text, "$1").into_owned();
    let text = EQ_TRUE.replace_all(&text, "$1").into_owned();
    let text = EQ_FALSE.replace_all(&text, "!$1").into_owned();
    let text = text.replace("===", "==").replace("!==", "!=");

    let text = LOGICAL_AND.replace_all(&text, " && ").into_owned();
    let text = LOGICAL_OR.replace_all(&text, " || ").into_owned();

    let text = strip_if_parens(&text);
    let text = RETURN.replace_all(&text, "").into_owned();
    let text = TERMINATOR.replace_all(&text, "$1").into_owned();
    let text = NULLISH.replace_all(&text, "None").into_owned();

    let text = host_library_rewrites(&text, registry);

    let text = TRUE.replace_all(&text, "True").into_owned();
    let text = FALSE.replace_all(&text, "False").into_owned();

    tidy(strip_outer_braces(&text))
}

fn host_library_rewrites(text: &str, registry: &mut BuiltinRegistry) -> String {
    let text = DATE_NOW
        .replace_all(text, "current_time(transaction)")
        .into_owned();
    let text = TYPEOF
        .replace_all(&text, |caps: &Captures| {
            let target = match &caps[3] {
                "string" => "ByteArray",
                "boolean" => "Bool",
                _ => "Int",
            };
            if &caps[2] == "!=" {
                format!("!({} is {})", &caps[1], target)
            } else {
                format!("{} is {}", &caps[1], target)
            }
        })
        .into_owned();

    let text = if STRINGIFY.is_match(&text) {
        registry.mark_used("cbor.diagnostic");
        STRINGIFY.replace_all(&text, "cbor.diagnostic(").into_owned()
    } else {
        text
    };

    let text = SPREAD.replace_all(&text, "..").into_owned();
    let text = BLOCK_COMMENT.replace_all(&text, "").into_owned();
    let text = LINE_COMMENT.replace_all(&text, "").into_owned();

    let text = IN_CHECK.replace_all(&text, "$2 is $1").into_owned();
    let text = HAS_OWN.replace_all(&text, "$1 is $2").into_owned();

    let text = if LENGTH.is_match(&text) {
        registry.mark_used("list.length");
        LENGTH.replace_all(&text, "list.length($1)").into_owned()
    } else {
        text
    };
    let text = if INDEX.is_match(&text) {
        registry.mark_used("list.at");
        INDEX.replace_all(&text, "list.at($1, $2)").into_owned()
    } else {
        text
    };

    let text = CONSOLE_LOG.replace_all(&text, "trace(").into_owned();
    TX.replace_all(&text, "transaction").into_owned()
}

/// `if (cond) {` -> `if cond {`, using bracket matching for nested parens.
fn strip_if_parens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(found) = find_if_open(rest) {
        let (before, from_if) = rest.split_at(found);
        out.push_str(before);
        let open = from_if.find('(').unwrap_or(0);
        match matching_close(from_if, open) {
            Some(close) if from_if[close + 1..].trim_start().starts_with('{') => {
                out.push_str("if ");
                out.push_str(from_if[open + 1..close].trim());
                rest = &from_if[close + 1..];
            }
            _ => {
                out.push_str(&from_if[..open + 1]);
                rest = &from_if[open + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

static IF_PAREN: Lazy<Regex> = Lazy::new(|| regex(r"\bif\s*\("));

fn find_if_open(text: &str) -> Option<usize> {
    IF_PAREN.find(text).map(|found| found.start())
}

fn strip_outer_braces(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && matching_close(trimmed, 0) == Some(trimmed.len() - 1) {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Drop blank edge lines and trailing spaces, then remove the common indentation.
fn tidy(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|line| !line.is_empty());
    let end = lines.iter().rposition(|line| !line.is_empty());
    let (Some(start), Some(end)) = (start, end) else {
        return String::new();
    };

    let lines: Vec<&str> = lines[start..=end]
        .iter()
        .copied()
        .filter(|line| !line.trim().is_empty())
        .collect();
    // counted in chars: leading whitespace may be multi-byte
    let indent = lines
        .iter()
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|line| strip_indent(line, indent))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_indent(line: &str, width: usize) -> &str {
    match line.char_indices().nth(width) {
        Some((offset, _)) => &line[offset..],
        None => line.trim_start(),
    }
}
