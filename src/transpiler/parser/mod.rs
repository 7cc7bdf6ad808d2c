pub mod markers;

use crate::contract::ast::{
    ArrowBody, BindingKind, Body, ClassDecl, ClassMember, Decorator, Expr, FieldDecl, FunctionDecl, Item,
    Param, SourceFile, Stmt, TypeNode,
};
use crate::contract::module::{Constant, Function, Import, Module, Parameter, TypeDef};
use crate::transpiler::errors::TranspileError;
use crate::transpiler::expressions::binding_name;
use crate::transpiler::types::TypeMapper;
use crate::transpiler::validator::Purpose;
use markers::{ExpectIndex, FunctionSpan};
use std::path::Path;
use tracing::debug;

/// Lines scanned above a function declaration for `@expect` markers.
pub const DEFAULT_EXPECT_LOOKBACK: usize = 10;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "default", "do", "else", "export",
    "extends", "false", "finally", "for", "function", "if", "implements", "import", "in",
    "instanceof", "interface", "let", "new", "null", "return", "switch", "this", "throw", "true",
    "try", "typeof", "undefined", "var", "void", "while",
];

enum Postfix {
    Member(String),
    Index(Expr),
    Call(Vec<Expr>),
    Skip,
}

fn apply_postfix(base: Expr, op: Postfix) -> Expr {
    match op {
        Postfix::Member(property) => Expr::Member {
            object: Box::new(base),
            property,
        },
        Postfix::Index(index) => Expr::Index {
            object: Box::new(base),
            index: Box::new(index),
        },
        Postfix::Call(args) => Expr::Call {
            callee: Box::new(base),
            args,
        },
        Postfix::Skip => base,
    }
}

fn binary(op: &str, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op: op.to_string(),
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn unary(op: &str, operand: Expr) -> Expr {
    Expr::Unary {
        op: op.to_string(),
        operand: Box::new(operand),
    }
}

/// `./lib/utils.ts` -> `lib/utils`
fn normalize_module(path: &str) -> String {
    let trimmed = path.trim_start_matches("./");
    trimmed
        .strip_suffix(".ts")
        .or_else(|| trimmed.strip_suffix(".js"))
        .unwrap_or(trimmed)
        .to_string()
}

// PEG grammar for the contract source language
peg::parser! {
    pub grammar contract_parser() for str {
        // Whitespace and comments; sub-DSL markers are recovered from raw bodies later
        rule ws_char() = [' ' | '\t' | '\n' | '\r']
        rule line_comment() = "//" [^'\n']*
        rule block_comment() = "/*" (!"*/" [_])* "*/"
        rule _() = quiet!{(ws_char() / line_comment() / block_comment())*}

        rule ident_start() = ['a'..='z' | 'A'..='Z' | '_' | '$']
        rule ident_char() = ['a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '$']

        rule word() -> String
            = n:$(ident_start() ident_char()*) { n.to_string() }

        rule identifier() -> String
            = quiet!{ n:$(ident_start() ident_char()*) {?
                if RESERVED.contains(&n) { Err("identifier") } else { Ok(n.to_string()) }
              } }
            / expected!("identifier")

        rule property_name() -> String
            = word() / string_lit()

        rule string_lit() -> String
            = "\"" s:$(("\\" [_] / [^'"' | '\\' | '\n'])*) "\"" { s.to_string() }
            / "'" s:$(("\\" [_] / [^'\'' | '\\' | '\n'])*) "'" { s.to_string() }

        rule template_lit() -> String
            = "`" s:$([^'`']*) "`" { s.to_string() }

        rule number() -> String
            = n:$("0x" ['0'..='9' | 'a'..='f' | 'A'..='F' | '_']+ "n"?) { n.to_string() }
            / n:$(['0'..='9'] ['0'..='9' | '_']* ("." ['0'..='9']+)? "n"?) { n.to_string() }

        // Raw, brace-balanced bodies
        rule raw_string()
            = "\"" ("\\" [_] / [^'"' | '\\'])* "\""
            / "'" ("\\" [_] / [^'\'' | '\\'])* "'"
            / "`" [^'`']* "`"

        rule balanced()
            = raw_string() / line_comment() / block_comment() / "{" balanced()* "}" / [^'{' | '}']

        rule block_body() -> Body
            = start:position!() raw:$("{" balanced()* "}") end:position!() {
                Body { raw: raw.to_string(), start, end }
            }

        // Types
        pub rule type_expr() -> TypeNode
            = ("|" _)? first:type_postfix() rest:(_ "|" _ t:type_postfix() { t })* {
                if rest.is_empty() {
                    first
                } else {
                    let mut members = vec![first];
                    members.extend(rest);
                    TypeNode::Union(members)
                }
            }

        rule type_postfix() -> TypeNode
            = t:type_primary() dims:(_ "[" _ "]" { () })* {
                dims.iter().fold(t, |acc, _| TypeNode::Array(Box::new(acc)))
            }

        rule type_primary() -> TypeNode
            = function_type()
            / "(" _ t:type_expr() _ ")" { t }
            / "[" _ items:(type_expr() ** (_ "," _)) _ "]" { TypeNode::Tuple(items) }
            / "{" _ fields:field_list() _ "}" { TypeNode::Object(fields) }
            / s:string_lit() { TypeNode::Literal(format!("\"{}\"", s)) }
            / n:number() { TypeNode::Literal(n) }
            / "readonly" !ident_char() _ t:type_postfix() { t }
            / name:type_name() args:(_ a:type_args() { a })? {
                TypeNode::Reference { name, args: args.unwrap_or_default() }
            }

        rule type_name() -> String
            = n:$(ident_start() ident_char()* ("." ident_start() ident_char()*)*) { n.to_string() }

        rule type_args() -> Vec<TypeNode>
            = "<" _ args:(type_expr() ** (_ "," _)) _ ">" { args }

        rule function_type() -> TypeNode
            = "(" _ params:(fn_type_param() ** (_ "," _)) _ ")" _ "=>" _ ret:type_expr() {
                TypeNode::Function { params, ret: Box::new(ret) }
            }

        rule fn_type_param() -> TypeNode
            = word() _ "?"? _ ":" _ t:type_expr() { t }

        rule field_sep() = _ [',' | ';']? _

        rule field_list() -> Vec<FieldDecl>
            = fields:(field_decl() ** field_sep()) field_sep() { fields }

        rule field_decl() -> FieldDecl
            = ("readonly" !ident_char() _)? name:property_name() _ optional:"?"? _ ":" _ ty:type_expr() {
                FieldDecl { name, ty, optional: optional.is_some() }
            }

        rule type_params() -> Vec<String>
            = params:("<" _ p:(type_param() ** (_ "," _)) _ ">" { p })? { params.unwrap_or_default() }

        rule type_param() -> String
            = n:word() (_ "extends" !ident_char() _ type_expr())? (_ "=" _ type_expr())? { n }

        // Decorators and parameters
        rule decorator() -> Decorator
            = "@" name:word() args:(_ "(" _ a:(expression() ** (_ "," _)) _ ")" { a })? {
                Decorator { name, args: args.unwrap_or_default() }
            }

        rule decorators() -> Vec<Decorator>
            = d:(decorator() ** _) _ { d }

        rule modifier() -> &'input str
            = m:$("public" / "private" / "protected" / "static" / "readonly" / "async" / "override" / "abstract")
              !ident_char() _ { m }

        rule param() -> Param
            = modifier()* name:identifier() _ optional:"?"? _ ty:(":" _ t:type_expr() { t })? (_ "=" _ expression())? {
                Param { name, ty, optional: optional.is_some() }
            }

        rule param_list() -> Vec<Param>
            = "(" _ params:(param() ** (_ "," _)) _ ","? _ ")" { params }

        rule return_type() -> TypeNode
            = ":" _ t:type_expr() { t }

        // Declarations
        rule import_name() -> String
            = ("type" !ident_char() _)? n:word() (_ "as" !ident_char() _ word())? { n }

        rule import_decl() -> Item
            = "import" !ident_char() _ ("type" !ident_char() _)?
              default:(n:identifier() _ ("," _)? { n })?
              namespace:("*" _ "as" !ident_char() _ n:identifier() _ { n })?
              names:("{" _ n:(import_name() ** (_ "," _)) _ ","? _ "}" _ { n })?
              ("from" !ident_char() _)? module:string_lit() _ ";"? {
                Item::Import { module: normalize_module(&module), default, namespace, names }
            }

        rule type_alias() -> Item
            = "type" !ident_char() _ name:identifier() _ type_params:type_params() _ "=" _ ty:type_expr() _ ";"? {
                Item::TypeAlias { name, type_params, ty, public: false, start: 0 }
            }

        rule interface_decl() -> Item
            = "interface" !ident_char() _ name:identifier() _ type_params:type_params() _
              ("extends" !ident_char() _ (type_expr() ** (_ "," _)) _)?
              "{" _ fields:field_list() _ "}" (_ ";")? {
                Item::Interface { name, type_params, fields, public: false, start: 0 }
            }

        rule binding_kind() -> BindingKind
            = "const" !ident_char() { BindingKind::Const }
            / "let" !ident_char() { BindingKind::Let }
            / "var" !ident_char() { BindingKind::Var }

        rule variable_decl() -> Item
            = kind:binding_kind() _ name:identifier() _ ty:(":" _ t:type_expr() _ { t })?
              "=" _ value:$(expression()) _ ";"? {
                Item::Variable { kind, name, ty, value: value.to_string(), public: false, start: 0 }
            }

        rule function_decl() -> Item
            = ("async" !ident_char() _)? "function" !ident_char() _ name:identifier() _
              type_params:type_params() _ params:param_list() _ ret:(r:return_type() _ { r })?
              body:block_body() {
                Item::Function(FunctionDecl {
                    name, type_params, params, ret, body,
                    decorators: Vec::new(), public: false, start: 0,
                })
            }

        rule class_member() -> ClassMember
            = start:position!() decorators:decorators() modifiers:modifier()* name:property_name() _
              type_params:type_params() _ params:param_list() _ ret:(r:return_type() _ { r })?
              body:block_body() {
                ClassMember::Method(FunctionDecl {
                    name, type_params, params, ret, body, decorators,
                    public: !modifiers.contains(&"private"),
                    start,
                })
            }
            / decorators() modifier()* name:property_name() _ "?"? _ ty:(":" _ t:type_expr() _ { t })?
              ("=" _ expression() _)? ";"? {
                ClassMember::Property { name, ty }
            }

        rule class_decl() -> Item
            = ("abstract" !ident_char() _)? "class" !ident_char() _ name:identifier() _ type_params() _
              ("extends" !ident_char() _ type_expr() _)?
              ("implements" !ident_char() _ (type_expr() ** (_ "," _)) _)?
              "{" _ members:(class_member() ** (_ (";" _)*)) _ "}" {
                Item::Class(ClassDecl {
                    name, decorators: Vec::new(), members, public: false, start: 0,
                })
            }

        rule export_kw() -> bool
            = e:("export" !ident_char() _ ("default" !ident_char() _)? { () })? { e.is_some() }

        rule declaration() -> Item
            = type_alias() / interface_decl() / variable_decl() / function_decl() / class_decl()

        rule item() -> Item
            = import_decl()
            / start:position!() decorators:decorators() exported:export_kw() item:declaration() {
                item.with_header(start, exported, decorators)
            }

        pub rule source_file() -> SourceFile
            = _ items:(item() ** (_ (";" _)*)) _ { SourceFile { items } }

        // Expressions
        pub rule expression() -> Expr
            = arrow_function() / conditional()

        rule arrow_function() -> Expr
            = ("async" !ident_char() _)? params:arrow_params() _ (":" _ type_expr() _)? "=>" _ body:arrow_body() {
                Expr::Arrow { params, body }
            }

        rule arrow_params() -> Vec<String>
            = "(" _ params:(param() ** (_ "," _)) _ ")" { params.into_iter().map(|p| p.name).collect() }
            / name:identifier() { vec![name] }

        rule arrow_body() -> ArrowBody
            = "{" _ stmts:statements() _ "}" { ArrowBody::Block(stmts) }
            / e:expression() { ArrowBody::Expr(Box::new(e)) }

        rule conditional() -> Expr
            = cond:binary_expr() tail:(_ "?" !['?' | '.'] _ t:expression() _ ":" _ e:expression() { (t, e) })? {
                match tail {
                    Some((then, otherwise)) => Expr::Conditional {
                        cond: Box::new(cond),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    },
                    None => cond,
                }
            }

        rule binary_expr() -> Expr = precedence!{
            x:(@) _ "??" _ y:@ { binary("??", x, y) }
            --
            x:(@) _ "||" _ y:@ { binary("||", x, y) }
            --
            x:(@) _ "&&" _ y:@ { binary("&&", x, y) }
            --
            x:(@) _ "===" _ y:@ { binary("===", x, y) }
            x:(@) _ "!==" _ y:@ { binary("!==", x, y) }
            x:(@) _ "==" _ y:@ { binary("==", x, y) }
            x:(@) _ "!=" _ y:@ { binary("!=", x, y) }
            --
            x:(@) _ "<=" _ y:@ { binary("<=", x, y) }
            x:(@) _ ">=" _ y:@ { binary(">=", x, y) }
            x:(@) _ "<" _ y:@ { binary("<", x, y) }
            x:(@) _ ">" _ y:@ { binary(">", x, y) }
            x:(@) _ "instanceof" !ident_char() _ y:@ { binary("instanceof", x, y) }
            x:(@) _ "in" !ident_char() _ y:@ { binary("in", x, y) }
            --
            x:(@) _ "+" _ y:@ { binary("+", x, y) }
            x:(@) _ "-" _ y:@ { binary("-", x, y) }
            --
            x:(@) _ "*" _ y:@ { binary("*", x, y) }
            x:(@) _ "/" _ y:@ { binary("/", x, y) }
            x:(@) _ "%" _ y:@ { binary("%", x, y) }
            --
            "!" _ x:@ { unary("!", x) }
            "-" _ x:@ { unary("-", x) }
            "typeof" !ident_char() _ x:@ { unary("typeof", x) }
            --
            e:postfix() { e }
        }

        rule postfix() -> Expr
            = base:primary() ops:postfix_op()* { ops.into_iter().fold(base, apply_postfix) }

        rule postfix_op() -> Postfix
            = _ "?." _ "[" _ index:expression() _ "]" { Postfix::Index(index) }
            / _ "?." _ "(" _ args:arguments() _ ")" { Postfix::Call(args) }
            / _ ("?." / "." !".") _ name:word() { Postfix::Member(name) }
            / "[" _ index:expression() _ "]" { Postfix::Index(index) }
            / "(" _ args:arguments() _ ")" { Postfix::Call(args) }
            / "!" !"=" { Postfix::Skip }
            / _ "as" !ident_char() _ type_expr() { Postfix::Skip }

        rule arguments() -> Vec<Expr>
            = args:(argument() ** (_ "," _)) _ ","? { args }

        rule argument() -> Expr
            = "..." _ e:expression() { Expr::Spread(Box::new(e)) }
            / expression()

        rule object_field() -> (String, Expr)
            = "..." _ e:expression() { (String::new(), Expr::Spread(Box::new(e))) }
            / key:property_name() _ ":" _ value:expression() { (key, value) }
            / name:identifier() { (name.clone(), Expr::Ident(name)) }

        rule primary() -> Expr
            = "(" _ e:expression() _ ")" { Expr::Paren(Box::new(e)) }
            / "[" _ items:(argument() ** (_ "," _)) _ ","? _ "]" { Expr::Array(items) }
            / "{" _ fields:(object_field() ** (_ "," _)) _ ","? _ "}" { Expr::Object(fields) }
            / "new" !ident_char() _ callee:identifier() _ type_args()? _ args:("(" _ a:arguments() _ ")" { a })? {
                Expr::New { callee: Box::new(Expr::Ident(callee)), args: args.unwrap_or_default() }
            }
            / n:number() { Expr::Number(n) }
            / s:string_lit() { Expr::Str(s) }
            / t:template_lit() { Expr::Str(t) }
            / "true" !ident_char() { Expr::Bool(true) }
            / "false" !ident_char() { Expr::Bool(false) }
            / "null" !ident_char() { Expr::Null }
            / "undefined" !ident_char() { Expr::Undefined }
            / "this" !ident_char() { Expr::Ident("this".to_string()) }
            / name:identifier() { Expr::Ident(name) }

        // Statement subset converted structurally
        pub rule statement_block() -> Vec<Stmt>
            = _ "{" _ stmts:statements() _ "}" _ { stmts }

        rule statements() -> Vec<Stmt>
            = stmts:(statement() ** _) { stmts.into_iter().flatten().collect() }

        rule statement() -> Option<Stmt>
            = ";" { None }
            / binding_kind() _ name:identifier() _ ty:(":" _ t:type_expr() _ { t })? "=" _ value:expression() _ ";"? {
                Some(Stmt::Let { name, ty, value })
            }
            / "return" !ident_char() value:(_ e:expression() { e })? _ ";"? { Some(Stmt::Return(value)) }
            / "if" !ident_char() _ "(" _ cond:expression() _ ")" _ then:branch()
              otherwise:(_ "else" !ident_char() _ e:branch() { e })? {
                Some(Stmt::If { cond, then, otherwise })
            }
            / "throw" !ident_char() _ e:expression() _ ";"? { Some(Stmt::Throw(e)) }
            / e:expression() _ ";"? { Some(Stmt::Expr(e)) }

        rule branch() -> Vec<Stmt>
            = "{" _ stmts:statements() _ "}" { stmts }
            / s:statement() { s.into_iter().collect() }
    }
}

/// Parses contract source files into [`Module`]s.
#[derive(Debug, Clone)]
pub struct ContractParser {
    file_name: String,
    expect_lookback: usize,
}

impl ContractParser {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            expect_lookback: DEFAULT_EXPECT_LOOKBACK,
        }
    }

    pub fn with_expect_lookback(mut self, lines: usize) -> Self {
        self.expect_lookback = lines;
        self
    }

    /// Module name derived from the file name, e.g. `validators/vesting.ts` -> `vesting`.
    pub fn module_name(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.file_name)
            .to_string()
    }

    /// Parse the host syntax only.
    pub fn parse_syntax(&self, source: &str) -> Result<SourceFile, TranspileError> {
        contract_parser::source_file(source).map_err(|err| {
            let snippet = source
                .lines()
                .nth(err.location.line.saturating_sub(1))
                .unwrap_or_default()
                .trim_end()
                .to_string();
            TranspileError::Parse {
                file: self.file_name.clone(),
                line: err.location.line,
                column: err.location.column,
                expected: err.expected.to_string(),
                snippet,
            }
        })
    }

    pub fn parse(&self, source: &str) -> Result<Module, TranspileError> {
        let file = self.parse_syntax(source)?;
        let module = self.build_module(source, &file);
        debug!(
            module = %module.name,
            types = module.types.len(),
            functions = module.functions.len(),
            tests = module.tests.len(),
            "parsed module"
        );
        Ok(module)
    }

    /// Read `path` and parse it.
    pub fn parse_file(&self, path: &Path) -> Result<Module, TranspileError> {
        let source = std::fs::read_to_string(path).map_err(|err| TranspileError::Unreadable {
            file: self.file_name.clone(),
            message: err.to_string(),
        })?;
        self.parse(&source)
    }

    fn build_module(&self, source: &str, file: &SourceFile) -> Module {
        let mut module = Module::new(&self.module_name());
        module.docs = markers::module_docs(source);

        let spans: Vec<FunctionSpan> = file
            .functions()
            .chain(file.classes().flat_map(|class| class.methods()))
            .map(FunctionSpan::of)
            .collect();
        let mut expects = ExpectIndex::build(source, &spans, self.expect_lookback);

        for item in &file.items {
            match item {
                Item::Import {
                    module: path,
                    default,
                    namespace,
                    names,
                } => module.imports.push(Import {
                    module: path.clone(),
                    alias: namespace.clone().or_else(|| default.clone()),
                    exposing: names.clone(),
                }),
                Item::TypeAlias {
                    name,
                    type_params,
                    ty,
                    public,
                    start,
                } => module.types.push(type_def(
                    source,
                    name,
                    type_params,
                    TypeMapper::to_target_type(ty),
                    *public,
                    *start,
                )),
                Item::Interface {
                    name,
                    type_params,
                    fields,
                    public,
                    start,
                } => module.types.push(type_def(
                    source,
                    name,
                    type_params,
                    TypeMapper::to_target_type(&TypeNode::Object(fields.clone())),
                    *public,
                    *start,
                )),
                Item::Variable {
                    kind: BindingKind::Const,
                    name,
                    ty,
                    value,
                    public,
                    start,
                } => module.constants.push(Constant {
                    name: name.clone(),
                    ty: ty.as_ref().map(TypeMapper::to_target_type),
                    value: value.clone(),
                    is_public: *public,
                    docs: markers::leading_docs(source, *start).lines,
                    value_expr: contract_parser::expression(value).ok(),
                }),
                Item::Variable { name, .. } => {
                    debug!(name = %name, "skipping mutable top-level binding");
                }
                Item::Function(decl) => {
                    let function = build_function(source, decl, None, None, &mut expects);
                    if is_test(decl) {
                        module.tests.push(function);
                    } else {
                        module.functions.push(function);
                    }
                }
                Item::Class(class) => self.add_class(source, class, &mut module, &mut expects),
            }
        }

        module
    }

    fn add_class(&self, source: &str, class: &ClassDecl, module: &mut Module, expects: &mut ExpectIndex) {
        for member in &class.members {
            let method = match member {
                ClassMember::Method(method) if method.name != "constructor" => method,
                _ => continue,
            };

            let purpose = method
                .decorator("validator")
                .and_then(Decorator::string_arg)
                .map(Purpose::parse);
            let function = build_function(source, method, Some(&class.name), purpose, expects);

            if function.purpose.is_none() && method.decorator("test").is_some() {
                module.tests.push(function);
            } else {
                module.functions.push(function);
            }
        }
    }
}

fn is_test(decl: &FunctionDecl) -> bool {
    decl.decorator("test").is_some() || decl.name.starts_with("test_")
}

fn type_def(
    source: &str,
    name: &str,
    type_params: &[String],
    definition: String,
    public: bool,
    start: usize,
) -> TypeDef {
    let docs = markers::leading_docs(source, start);
    TypeDef {
        name: name.to_string(),
        type_params: type_params.to_vec(),
        definition,
        is_opaque: docs.opaque,
        is_public: public,
        docs: docs.lines,
    }
}

fn parameter(param: &Param) -> Parameter {
    let ty = param
        .ty
        .as_ref()
        .map(TypeMapper::to_target_type)
        .unwrap_or_else(|| "Data".to_string());
    let ty = if param.optional {
        TypeMapper::wrap_in_option(&ty)
    } else {
        ty
    };
    Parameter::new(binding_name(&param.name), &ty)
}

fn build_function(
    source: &str,
    decl: &FunctionDecl,
    class_name: Option<&str>,
    purpose: Option<Purpose>,
    expects: &mut ExpectIndex,
) -> Function {
    let body = &decl.body.raw;
    Function {
        name: decl.name.clone(),
        type_params: decl.type_params.clone(),
        parameters: decl.params.iter().map(parameter).collect(),
        return_type: decl
            .ret
            .as_ref()
            .map(TypeMapper::to_target_type)
            .unwrap_or_default(),
        body: body.clone(),
        when_expressions: markers::when_expressions(body),
        pipe_expressions: markers::pipe_expressions(body),
        expect_expressions: expects.take(decl.start),
        is_public: decl.public,
        docs: markers::leading_docs(source, decl.start).lines,
        purpose,
        class_name: class_name.map(str::to_string),
        statements: contract_parser::statement_block(body).ok(),
        converted_body: None,
    }
}

/// Parse a source string into a module named `main`.
pub fn parse_source(source: &str) -> Result<Module, TranspileError> {
    ContractParser::new("main").parse(source)
}
