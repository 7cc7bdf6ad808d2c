use crate::contract::ast::{ArrowBody, Expr, Stmt};
use crate::transpiler::builtins::{BuiltinMapping, BuiltinRegistry, MappingKind};
use crate::transpiler::types::TypeMapper;

/// Local name conventionally bound to the enclosing transaction.
const TRANSACTION_BINDING: &str = "tx";
const TRANSACTION_PARAM: &str = "transaction";

/// Target spelling of a local binding. Every use of `tx` renders as
/// `transaction`, so every place that binds `tx` must be renamed the same way.
pub fn binding_name(name: &str) -> &str {
    if name == TRANSACTION_BINDING {
        TRANSACTION_PARAM
    } else {
        name
    }
}

/// Target code plus every builtin it referenced, for the caller to mark as used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub code: String,
    pub builtins: Vec<&'static BuiltinMapping>,
}

impl Rendered {
    /// Record the referenced builtins against a registry's usage set.
    pub fn mark_used(&self, registry: &mut BuiltinRegistry) {
        for mapping in &self.builtins {
            registry.mark_mapping(mapping);
        }
    }
}

fn map_operator(op: &str) -> &str {
    match op {
        "===" => "==",
        "!==" => "!=",
        "==" | "!=" | "<" | ">" | "<=" | ">=" => op,
        "+" | "-" | "*" | "/" | "%" => op,
        "&&" | "||" => op,
        other => other,
    }
}

fn typeof_target(name: &str) -> Option<&'static str> {
    match name {
        "string" => Some("ByteArray"),
        "number" | "bigint" => Some("Int"),
        "boolean" => Some("Bool"),
        _ => None,
    }
}

/// Dotted path of a pure identifier chain, e.g. `Math.max`.
fn dotted_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(name) => Some(name.clone()),
        Expr::Member { object, property } => {
            dotted_path(object).map(|base| format!("{}.{}", base, property))
        }
        _ => None,
    }
}

/// Whether a statement list always ends in a `return` or `throw`.
fn terminates(stmts: &[Stmt]) -> bool {
    match stmts.last() {
        Some(Stmt::Return(_)) | Some(Stmt::Throw(_)) => true,
        Some(Stmt::If {
            then,
            otherwise: Some(otherwise),
            ..
        }) => terminates(then) && terminates(otherwise),
        _ => false,
    }
}

fn indent(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            if line.is_empty() {
                line
            } else {
                format!("  {}", line)
            }
        })
        .collect()
}

/// Renders host expressions and statements as target code.
pub struct ExpressionTransformer<'a> {
    registry: &'a BuiltinRegistry,
}

impl<'a> ExpressionTransformer<'a> {
    pub fn new(registry: &'a BuiltinRegistry) -> Self {
        Self { registry }
    }

    pub fn to_target_expr(&self, expr: &Expr) -> Rendered {
        let mut builtins = Vec::new();
        let code = self.expr(expr, &mut builtins);
        Rendered { code, builtins }
    }

    /// Convert a statement block, folding early returns into `if/else` chains.
    pub fn convert_statements(&self, stmts: &[Stmt]) -> Rendered {
        let mut builtins = Vec::new();
        let code = self.block(stmts, &mut builtins).join("\n");
        Rendered { code, builtins }
    }

    fn expr(&self, expr: &Expr, used: &mut Vec<&'static BuiltinMapping>) -> String {
        match expr {
            Expr::Ident(name) => binding_name(name).to_string(),
            Expr::Number(text) => text.trim_end_matches('n').to_string(),
            Expr::Str(text) => format!("\"{}\"", text),
            Expr::Bool(true) => "True".to_string(),
            Expr::Bool(false) => "False".to_string(),
            Expr::Null | Expr::Undefined => "None".to_string(),
            Expr::Binary { op, left, right } => self.binary(op, left, right, used),
            Expr::Unary { op, operand } => {
                let inner = self.expr(operand, used);
                match op.as_str() {
                    "typeof" => inner,
                    "!" => format!("!{}", inner),
                    other => format!("{}{}", other, inner),
                }
            }
            Expr::Member { object, property } => self.member(object, property, used),
            Expr::Index { object, index } => {
                let object = self.expr(object, used);
                let index = self.expr(index, used);
                self.builtin_call("list.at", vec![object, index], used)
            }
            Expr::Call { callee, args } => self.call(callee, args, used),
            Expr::New { callee, args } => self.call(callee, args, used),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => format!(
                "if {} {{ {} }} else {{ {} }}",
                self.expr(cond, used),
                self.expr(then, used),
                self.expr(otherwise, used)
            ),
            Expr::Arrow { params, body } => {
                let params: Vec<&str> = params.iter().map(|p| binding_name(p)).collect();
                match body {
                    ArrowBody::Expr(inner) => {
                        format!("fn({}) {{ {} }}", params.join(", "), self.expr(inner, used))
                    }
                    ArrowBody::Block(stmts) => {
                        let mut lines = vec![format!("fn({}) {{", params.join(", "))];
                        lines.extend(indent(self.block(stmts, used)));
                        lines.push("}".to_string());
                        lines.join("\n")
                    }
                }
            }
            Expr::Paren(inner) => format!("({})", self.expr(inner, used)),
            Expr::Array(items) => format!("[{}]", self.list(items, used)),
            Expr::Object(fields) => {
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|(key, value)| match value {
                        Expr::Ident(name) if name == key && binding_name(name) == name => key.clone(),
                        Expr::Spread(_) => self.expr(value, used),
                        _ => format!("{}: {}", key, self.expr(value, used)),
                    })
                    .collect();
                format!("{{ {} }}", rendered.join(", "))
            }
            Expr::Spread(inner) => format!("..{}", self.expr(inner, used)),
        }
    }

    fn list(&self, items: &[Expr], used: &mut Vec<&'static BuiltinMapping>) -> String {
        items
            .iter()
            .map(|item| self.expr(item, used))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn binary(
        &self,
        op: &str,
        left: &Expr,
        right: &Expr,
        used: &mut Vec<&'static BuiltinMapping>,
    ) -> String {
        let equality = matches!(op, "==" | "===");
        let inequality = matches!(op, "!=" | "!==");

        if equality || inequality {
            // typeof x === "string"
            if let (Expr::Unary { op: unary, operand }, Expr::Str(kind)) = (left, right) {
                if unary == "typeof" {
                    if let Some(target) = typeof_target(kind) {
                        let check = format!("{} is {}", self.expr(operand, used), target);
                        return if inequality { format!("!({})", check) } else { check };
                    }
                }
            }
            match (right, equality) {
                (Expr::Bool(true), true) | (Expr::Bool(false), false) => {
                    return self.expr(left, used);
                }
                (Expr::Bool(false), true) | (Expr::Bool(true), false) => {
                    return format!("!{}", self.expr(left, used));
                }
                _ => {}
            }
        }

        match (op, left) {
            // "Key" in value
            ("in", Expr::Str(key)) => return format!("{} is {}", self.expr(right, used), key),
            ("instanceof", _) => {
                return format!("{} is {}", self.expr(left, used), self.expr(right, used));
            }
            _ => {}
        }

        format!(
            "{} {} {}",
            self.expr(left, used),
            map_operator(op),
            self.expr(right, used)
        )
    }

    fn member(
        &self,
        object: &Expr,
        property: &str,
        used: &mut Vec<&'static BuiltinMapping>,
    ) -> String {
        if let Some(path) = dotted_path(object) {
            if let Some(mapping) = self.registry.get(&format!("{}.{}", path, property)) {
                if mapping.kind != MappingKind::Type {
                    used.push(mapping);
                    return mapping.target.to_string();
                }
            }
        }

        let receiver = self.expr(object, used);
        if property == "length" {
            return self.builtin_call("list.length", vec![receiver], used);
        }
        format!("{}.{}", receiver, property)
    }

    fn call(&self, callee: &Expr, args: &[Expr], used: &mut Vec<&'static BuiltinMapping>) -> String {
        let rendered_args: Vec<String> = args.iter().map(|arg| self.expr(arg, used)).collect();

        if let Some(path) = dotted_path(callee) {
            if let Some(mapping) = self.registry.get(&path) {
                used.push(mapping);
                return format!("{}({})", mapping.target, rendered_args.join(", "));
            }
        }

        if let Expr::Member { object, property } = callee {
            if let Some(mapping) = self.registry.method(property) {
                used.push(mapping);
                let mut all = vec![self.expr(object, used)];
                all.extend(rendered_args);
                return format!("{}({})", mapping.target, all.join(", "));
            }
        }

        format!("{}({})", self.expr(callee, used), rendered_args.join(", "))
    }

    fn builtin_call(
        &self,
        key: &str,
        args: Vec<String>,
        used: &mut Vec<&'static BuiltinMapping>,
    ) -> String {
        match self.registry.get(key) {
            Some(mapping) => {
                used.push(mapping);
                format!("{}({})", mapping.target, args.join(", "))
            }
            None => format!("{}({})", key, args.join(", ")),
        }
    }

    fn block(&self, stmts: &[Stmt], used: &mut Vec<&'static BuiltinMapping>) -> Vec<String> {
        let mut lines = Vec::new();

        for (index, stmt) in stmts.iter().enumerate() {
            let rest = &stmts[index + 1..];
            match stmt {
                Stmt::Let { name, ty, value } => {
                    let name = binding_name(name);
                    let value = self.expr(value, used);
                    match ty {
                        Some(ty) => lines.push(format!(
                            "let {}: {} = {}",
                            name,
                            TypeMapper::to_target_type(ty),
                            value
                        )),
                        None => lines.push(format!("let {} = {}", name, value)),
                    }
                }
                Stmt::Return(Some(value)) => {
                    lines.push(self.expr(value, used));
                    return lines;
                }
                Stmt::Return(None) => {
                    lines.push("Void".to_string());
                    return lines;
                }
                Stmt::Throw(error) => {
                    lines.push(self.fail(error, used));
                    return lines;
                }
                Stmt::Expr(value) => lines.push(self.expr(value, used)),
                Stmt::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    let cond = self.expr(cond, used);
                    // statements reached from each branch, with the rest of the block folded in
                    let (then_path, else_path): (Vec<Stmt>, Vec<Stmt>) = match otherwise {
                        Some(otherwise) if rest.is_empty() || (terminates(then) && terminates(otherwise)) => {
                            (then.clone(), otherwise.clone())
                        }
                        Some(otherwise) => (
                            then.iter().chain(rest).cloned().collect(),
                            otherwise.iter().chain(rest).cloned().collect(),
                        ),
                        None if terminates(then) => (then.clone(), rest.to_vec()),
                        None => (then.iter().chain(rest).cloned().collect(), rest.to_vec()),
                    };
                    let branch_then = self.block(&then_path, used);
                    let branch_else = self.block(&else_path, used);
                    lines.extend(self.if_else(&cond, branch_then, branch_else, &else_path));
                    return lines;
                }
            }
        }

        lines
    }

    /// `if c { .. } else { .. }`, collapsing a lone nested `if` into `else if`.
    fn if_else(
        &self,
        cond: &str,
        then: Vec<String>,
        otherwise: Vec<String>,
        otherwise_stmts: &[Stmt],
    ) -> Vec<String> {
        let mut lines = vec![format!("if {} {{", cond)];
        lines.extend(indent(then));

        let chained = matches!(otherwise_stmts, [Stmt::If { .. }])
            && otherwise.first().is_some_and(|line| line.starts_with("if "));
        if chained {
            let mut rest = otherwise.into_iter();
            if let Some(first) = rest.next() {
                lines.push(format!("}} else {}", first));
            }
            lines.extend(rest);
        } else {
            lines.push("} else {".to_string());
            if otherwise.is_empty() {
                lines.push("  Void".to_string());
            } else {
                lines.extend(indent(otherwise));
            }
            lines.push("}".to_string());
        }
        lines
    }

    fn fail(&self, error: &Expr, used: &mut Vec<&'static BuiltinMapping>) -> String {
        match error {
            Expr::New { args, .. } | Expr::Call { args, .. } => match args.first() {
                Some(Expr::Str(message)) => format!("fail @\"{}\"", message),
                Some(other) => format!("fail {}", self.expr(other, used)),
                None => "fail".to_string(),
            },
            Expr::Str(message) => format!("fail @\"{}\"", message),
            _ => "fail".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    fn member(object: Expr, property: &str) -> Expr {
        Expr::Member {
            object: Box::new(object),
            property: property.to_string(),
        }
    }

    fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    fn binary(op: &str, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op: op.to_string(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn render(expr: &Expr) -> Rendered {
        let registry = BuiltinRegistry::new();
        ExpressionTransformer::new(&registry).to_target_expr(expr)
    }

    #[test]
    fn test_literals() {
        assert_eq!(render(&Expr::Bool(true)).code, "True");
        assert_eq!(render(&Expr::Bool(false)).code, "False");
        assert_eq!(render(&Expr::Number("42n".to_string())).code, "42");
        assert_eq!(render(&Expr::Null).code, "None");
        assert_eq!(render(&Expr::Str("abc".to_string())).code, "\"abc\"");
    }

    #[test]
    fn test_operator_table() {
        let expr = binary("===", ident("a"), ident("b"));
        assert_eq!(render(&expr).code, "a == b");
        let expr = binary("!==", ident("a"), ident("b"));
        assert_eq!(render(&expr).code, "a != b");
        let expr = binary("??", ident("a"), ident("b"));
        assert_eq!(render(&expr).code, "a ?? b");
    }

    #[test]
    fn test_boolean_comparisons_collapse() {
        assert_eq!(render(&binary("===", ident("ok"), Expr::Bool(true))).code, "ok");
        assert_eq!(render(&binary("===", ident("ok"), Expr::Bool(false))).code, "!ok");
    }

    #[test]
    fn test_typeof_check() {
        let expr = binary(
            "===",
            Expr::Unary {
                op: "typeof".to_string(),
                operand: Box::new(ident("x")),
            },
            Expr::Str("number".to_string()),
        );
        assert_eq!(render(&expr).code, "x is Int");
    }

    #[test]
    fn test_has_property_check() {
        let expr = binary("in", Expr::Str("Claim".to_string()), ident("action"));
        assert_eq!(render(&expr).code, "action is Claim");
    }

    #[test]
    fn test_transaction_binding_rewrite() {
        let expr = member(ident("tx"), "extra_signatories");
        assert_eq!(render(&expr).code, "transaction.extra_signatories");

        let arrow = Expr::Arrow {
            params: vec!["tx".to_string()],
            body: ArrowBody::Expr(Box::new(member(ident("tx"), "fee"))),
        };
        assert_eq!(render(&arrow).code, "fn(transaction) { transaction.fee }");

        let shorthand = Expr::Object(vec![("tx".to_string(), ident("tx"))]);
        assert_eq!(render(&shorthand).code, "{ tx: transaction }");
    }

    #[test]
    fn test_transaction_binding_in_let() {
        let stmts = vec![
            Stmt::Let {
                name: "tx".to_string(),
                ty: None,
                value: ident("context"),
            },
            Stmt::Return(Some(member(ident("tx"), "fee"))),
        ];
        let registry = BuiltinRegistry::new();
        let rendered = ExpressionTransformer::new(&registry).convert_statements(&stmts);
        assert_eq!(rendered.code, "let transaction = context\ntransaction.fee");
    }

    #[test]
    fn test_builtin_call_reports_usage() {
        let expr = call(ident("sha256"), vec![ident("data")]);
        let rendered = render(&expr);
        assert_eq!(rendered.code, "crypto.sha2_256(data)");
        assert_eq!(rendered.builtins.len(), 1);
        assert_eq!(rendered.builtins[0].import_group, Some("aiken/crypto"));

        let mut registry = BuiltinRegistry::new();
        rendered.mark_used(&mut registry);
        assert_eq!(registry.used_import_groups(), vec!["aiken/crypto"]);
    }

    #[test]
    fn test_dotted_builtin_call() {
        let expr = call(member(ident("Math"), "max"), vec![ident("a"), ident("b")]);
        assert_eq!(render(&expr).code, "math.max(a, b)");
    }

    #[test]
    fn test_method_call_prepends_receiver() {
        let signatories = member(ident("tx"), "extra_signatories");
        let expr = call(member(signatories, "includes"), vec![member(ident("datum"), "owner")]);
        assert_eq!(
            render(&expr).code,
            "list.has(transaction.extra_signatories, datum.owner)"
        );
    }

    #[test]
    fn test_unknown_call_passes_through() {
        let expr = call(ident("isSigned"), vec![ident("tx")]);
        let rendered = render(&expr);
        assert_eq!(rendered.code, "isSigned(transaction)");
        assert!(rendered.builtins.is_empty());
    }

    #[test]
    fn test_length_and_index() {
        assert_eq!(render(&member(ident("xs"), "length")).code, "list.length(xs)");
        let index = Expr::Index {
            object: Box::new(ident("xs")),
            index: Box::new(Expr::Number("0".to_string())),
        };
        assert_eq!(render(&index).code, "list.at(xs, 0)");
    }

    #[test]
    fn test_conditional_and_arrow() {
        let ternary = Expr::Conditional {
            cond: Box::new(ident("c")),
            then: Box::new(Expr::Number("1".to_string())),
            otherwise: Box::new(Expr::Number("2".to_string())),
        };
        assert_eq!(render(&ternary).code, "if c { 1 } else { 2 }");

        let arrow = Expr::Arrow {
            params: vec!["x".to_string()],
            body: ArrowBody::Expr(Box::new(binary("*", ident("x"), Expr::Number("2".to_string())))),
        };
        assert_eq!(render(&arrow).code, "fn(x) { x * 2 }");
    }

    #[test]
    fn test_statements_with_early_return() {
        let stmts = vec![
            Stmt::Let {
                name: "limit".to_string(),
                ty: None,
                value: Expr::Number("10".to_string()),
            },
            Stmt::If {
                cond: binary(">", ident("amount"), ident("limit")),
                then: vec![Stmt::Return(Some(Expr::Bool(false)))],
                otherwise: None,
            },
            Stmt::Return(Some(Expr::Bool(true))),
        ];
        let registry = BuiltinRegistry::new();
        let rendered = ExpressionTransformer::new(&registry).convert_statements(&stmts);
        assert_eq!(
            rendered.code,
            "let limit = 10\nif amount > limit {\n  False\n} else {\n  True\n}"
        );
    }

    #[test]
    fn test_else_if_chain() {
        let stmts = vec![Stmt::If {
            cond: ident("a"),
            then: vec![Stmt::Return(Some(Expr::Number("1".to_string())))],
            otherwise: Some(vec![Stmt::If {
                cond: ident("b"),
                then: vec![Stmt::Return(Some(Expr::Number("2".to_string())))],
                otherwise: Some(vec![Stmt::Return(Some(Expr::Number("3".to_string())))]),
            }]),
        }];
        let registry = BuiltinRegistry::new();
        let rendered = ExpressionTransformer::new(&registry).convert_statements(&stmts);
        assert_eq!(
            rendered.code,
            "if a {\n  1\n} else if b {\n  2\n} else {\n  3\n}"
        );
    }

    #[test]
    fn test_throw_becomes_fail() {
        let stmts = vec![Stmt::Throw(Expr::New {
            callee: Box::new(ident("Error")),
            args: vec![Expr::Str("not allowed".to_string())],
        })];
        let registry = BuiltinRegistry::new();
        let rendered = ExpressionTransformer::new(&registry).convert_statements(&stmts);
        assert_eq!(rendered.code, "fail @\"not allowed\"");
    }
}
