//! Emitters for the comment-marker sub-languages: `when` blocks, pipelines and expects.

use super::body::convert_body;
use crate::contract::module::{
    matching_close, ExpectExpression, Pattern, PipeExpression, WhenExpression,
};
use crate::transpiler::builtins::BuiltinRegistry;
use crate::transpiler::parser::markers::DEFAULT_EXPECT_MESSAGE;

/// Bare constructors with a conventional payload binding.
const CONSTRUCTOR_OVERRIDES: &[(&str, &str)] = &[("Ok", "Ok(value)"), ("Err", "Err(error)")];

pub fn pattern(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Wildcard => "_".to_string(),
        Pattern::Literal(value) | Pattern::Variable(value) => value.clone(),
        Pattern::Constructor { name, args } if args.is_empty() => CONSTRUCTOR_OVERRIDES
            .iter()
            .find(|(ctor, _)| ctor == name)
            .map(|(_, rendered)| rendered.to_string())
            .unwrap_or_else(|| name.clone()),
        Pattern::Constructor { name, args } => format!("{}({})", name, patterns(args)),
        Pattern::Tuple(items) => format!("({})", patterns(items)),
        Pattern::List(items) => format!("[{}]", patterns(items)),
    }
}

fn patterns(items: &[Pattern]) -> String {
    items.iter().map(pattern).collect::<Vec<_>>().join(", ")
}

/// `when x is { ... }` with clauses in authored order.
pub fn when_block(when: &WhenExpression, registry: &mut BuiltinRegistry) -> String {
    let mut code = format!("when {} is {{\n", when.scrutinee);

    for clause in &when.clauses {
        let mut head = pattern(&clause.pattern);
        if let Some(guard) = &clause.guard {
            head.push_str(" if ");
            head.push_str(&convert_body(guard, registry));
        }

        let body = convert_body(&clause.body, registry);
        let body = if body.is_empty() { "Void".to_string() } else { body };
        if body.contains('\n') {
            code.push_str(&format!("  {} => {{\n{}\n  }},\n", head, indent(&body, 4)));
        } else {
            code.push_str(&format!("  {} => {},\n", head, body));
        }
    }

    code.push('}');
    code
}

/// Left fold of the steps over the seed: `x |> f |> g(a)` becomes `g(f(x), a)`.
pub fn pipeline(pipe: &PipeExpression, registry: &mut BuiltinRegistry) -> String {
    pipe.operations
        .iter()
        .fold(pipe.initial_value.trim().to_string(), |acc, op| {
            let name = match registry.get(&op.function_name) {
                Some(mapping) => {
                    registry.mark_mapping(mapping);
                    mapping.target.to_string()
                }
                None => op.function_name.clone(),
            };
            let mut args = vec![acc];
            args.extend(op.args.iter().map(|arg| arg.trim().to_string()));
            format!("{}({})", name, args.join(", "))
        })
}

pub fn expect_line(expect: &ExpectExpression) -> String {
    let message = expect
        .error_message
        .as_deref()
        .unwrap_or(DEFAULT_EXPECT_MESSAGE);
    format!("assert({}, \"{}\")", expect.expression.trim(), message)
}

/// `if (c) { .. } else { .. }` bodies with recovered pipelines become
/// `if c { p1 } else { p2 }`.
///
/// Returns `None` when the body does not have that exact shape. The result has
/// no enclosing braces, so callers must not wrap it again.
pub fn conditional_pipeline(
    raw: &str,
    pipes: &[PipeExpression],
    registry: &mut BuiltinRegistry,
) -> Option<String> {
    if pipes.len() < 2 {
        return None;
    }
    let shape = IfElseShape::find(raw)?;

    let within = |range: (usize, usize)| {
        pipes
            .iter()
            .find(|pipe| range.0 <= pipe.offset && pipe.offset < range.1)
    };
    let (then_pipe, else_pipe) = match (within(shape.then_block), within(shape.else_block)) {
        (None, None) => (pipes.first(), pipes.get(1)),
        found => found,
    };
    let then_pipe = then_pipe?;

    let condition = convert_body(&raw[shape.condition.0..shape.condition.1], registry);
    let then_code = pipeline(then_pipe, registry);
    let else_code = match else_pipe {
        Some(pipe) => pipeline(pipe, registry),
        None => convert_body(&raw[shape.else_block.0..shape.else_block.1], registry),
    };

    Some(format!(
        "if {} {{\n{}\n}} else {{\n{}\n}}",
        condition,
        indent(&then_code, 2),
        indent(&else_code, 2)
    ))
}

/// Byte ranges of a body consisting of exactly one `if (..) {..} else {..}`.
struct IfElseShape {
    condition: (usize, usize),
    then_block: (usize, usize),
    else_block: (usize, usize),
}

impl IfElseShape {
    fn find(raw: &str) -> Option<Self> {
        let open = raw.find('{')?;
        let close = matching_close(raw, open)?;

        let at = skip_trivia(raw, open + 1);
        let after_if = raw[at..].strip_prefix("if")?;
        let paren = at + 2 + (after_if.len() - after_if.trim_start().len());
        if raw.as_bytes().get(paren) != Some(&b'(') {
            return None;
        }
        let paren_close = matching_close(raw, paren)?;

        let then_open = skip_trivia(raw, paren_close + 1);
        if raw.as_bytes().get(then_open) != Some(&b'{') {
            return None;
        }
        let then_close = matching_close(raw, then_open)?;

        let else_at = skip_trivia(raw, then_close + 1);
        raw[else_at..].strip_prefix("else")?;
        let else_open = skip_trivia(raw, else_at + 4);
        if raw.as_bytes().get(else_open) != Some(&b'{') {
            return None;
        }
        let else_close = matching_close(raw, else_open)?;

        if skip_trivia(raw, else_close + 1) != close {
            return None;
        }

        Some(Self {
            condition: (paren + 1, paren_close),
            then_block: (then_open, then_close + 1),
            else_block: (else_open, else_close + 1),
        })
    }
}

/// Advance past whitespace and comments.
fn skip_trivia(text: &str, mut at: usize) -> usize {
    loop {
        let rest = &text[at.min(text.len())..];
        let trimmed = rest.trim_start();
        at += rest.len() - trimmed.len();
        if trimmed.starts_with("//") {
            at += trimmed.find('\n').unwrap_or(trimmed.len());
        } else if trimmed.starts_with("/*") {
            at += trimmed.find("*/").map(|end| end + 2).unwrap_or(trimmed.len());
        } else {
            return at.min(text.len());
        }
    }
}

pub(crate) fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
