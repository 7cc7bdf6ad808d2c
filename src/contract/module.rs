use crate::contract::ast::{Expr, Stmt};
use crate::transpiler::validator::Purpose;
use serde::Serialize;

/// One compiled source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Module {
    pub name: String,
    pub docs: Vec<String>,
    pub imports: Vec<Import>,
    pub types: Vec<TypeDef>,
    pub constants: Vec<Constant>,
    pub functions: Vec<Function>,
    pub tests: Vec<Function>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn validators(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| f.purpose.is_some())
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Import {
    pub module: String,
    pub alias: Option<String>,
    pub exposing: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDef {
    pub name: String,
    pub type_params: Vec<String>,
    /// Rendered type body; its shape (alias, record or sum) is decided at generation time.
    pub definition: String,
    pub is_opaque: bool,
    pub is_public: bool,
    pub docs: Vec<String>,
}

impl TypeDef {
    /// Record fields as `(name, type)` pairs when the definition is brace-delimited.
    pub fn record_fields(&self) -> Option<Vec<(String, String)>> {
        let body = self.definition.trim();
        // `{ a: Int } | { b: Bool }` starts and ends with braces but is a union
        if !body.starts_with('{') || matching_close(body, 0)? != body.len() - 1 {
            return None;
        }
        let inner = &body[1..body.len() - 1];
        let fields = split_top_level(inner, &[',', '\n', ';'])
            .into_iter()
            .filter_map(|field| {
                let (name, ty) = field.split_once(':')?;
                Some((name.trim().to_string(), ty.trim().to_string()))
            })
            .collect();
        Some(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constant {
    pub name: String,
    pub ty: Option<String>,
    pub value: String,
    pub is_public: bool,
    pub docs: Vec<String>,
    #[serde(skip)]
    pub value_expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl Parameter {
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
        }
    }
}

/// A function, validator handler or test.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Function {
    pub name: String,
    pub type_params: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub return_type: String,
    /// Raw body text including outer braces, or a finished `validator` block after transformation.
    pub body: String,
    pub when_expressions: Vec<WhenExpression>,
    pub pipe_expressions: Vec<PipeExpression>,
    pub expect_expressions: Vec<ExpectExpression>,
    pub is_public: bool,
    pub docs: Vec<String>,
    pub purpose: Option<Purpose>,
    pub class_name: Option<String>,
    /// Statement tree for bodies inside the structurally supported subset.
    #[serde(skip)]
    pub statements: Option<Vec<Stmt>>,
    /// Target text produced from `statements` by the transformer.
    pub converted_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Pattern {
    Wildcard,
    Literal(String),
    Variable(String),
    Constructor { name: String, args: Vec<Pattern> },
    Tuple(Vec<Pattern>),
    List(Vec<Pattern>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhenClause {
    pub pattern: Pattern,
    pub guard: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhenExpression {
    pub scrutinee: String,
    pub clauses: Vec<WhenClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipeOperation {
    pub function_name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipeExpression {
    pub initial_value: String,
    pub operations: Vec<PipeOperation>,
    /// Byte offset of the marker within the raw body.
    #[serde(skip)]
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectExpression {
    pub expression: String,
    pub error_message: Option<String>,
}

/// Whole-class view: datums plus purpose-tagged validators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    pub name: String,
    pub datums: Vec<Datum>,
    pub validators: Vec<Validator>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datum {
    pub name: String,
    pub fields: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validator {
    pub name: String,
    pub purpose: Purpose,
    pub parameters: Vec<Parameter>,
    pub return_type: String,
    pub body: String,
}

/// Split on any of `separators` outside of brackets, braces, parens and string literals.
pub fn split_top_level(text: &str, separators: &[char]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut current = String::new();
    let mut prev = ' ';

    for ch in text.chars() {
        let last = std::mem::replace(&mut prev, ch);
        if let Some(q) = quote {
            current.push(ch);
            if ch == q && last != '\\' {
                quote = None;
            }
            continue;
        }
        match ch {
            '>' if last == '-' || last == '=' => current.push(ch),
            '"' | '\'' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' | '>' => {
                depth = (depth - 1).max(0);
                current.push(ch);
            }
            c if depth == 0 && separators.contains(&c) => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Byte index of the bracket closing the one at `open`, skipping string literals.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let (open_ch, close_ch) = match bytes.get(open)? {
        b'(' => (b'(', b')'),
        b'[' => (b'[', b']'),
        b'{' => (b'{', b'}'),
        _ => return None,
    };
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut index = open;
    while index < bytes.len() {
        let ch = bytes[index];
        if let Some(q) = quote {
            if ch == b'\\' {
                index += 1;
            } else if ch == q {
                quote = None;
            }
        } else if ch == b'"' || ch == b'\'' || ch == b'`' {
            quote = Some(ch);
        } else if ch == open_ch {
            depth += 1;
        } else if ch == close_ch {
            depth -= 1;
            if depth == 0 {
                return Some(index);
            }
        }
        index += 1;
    }
    None
}
