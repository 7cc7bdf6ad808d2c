use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A type annotation as written in the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeNode {
    Reference { name: String, args: Vec<TypeNode> },
    Literal(String),
    Union(Vec<TypeNode>),
    Array(Box<TypeNode>),
    Tuple(Vec<TypeNode>),
    Function { params: Vec<TypeNode>, ret: Box<TypeNode> },
    Object(Vec<FieldDecl>),
}

impl TypeNode {
    pub fn named(name: &str) -> Self {
        TypeNode::Reference {
            name: name.to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeNode,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Ident(String),
    Number(String),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Arrow {
        params: Vec<String>,
        body: ArrowBody,
    },
    Paren(Box<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Spread(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    Let {
        name: String,
        ty: Option<TypeNode>,
        value: Expr,
    },
    Return(Option<Expr>),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
    },
    Throw(Expr),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decorator {
    pub name: String,
    pub args: Vec<Expr>,
}

impl Decorator {
    /// First argument when it is a string literal, e.g. `@validator("spend")`.
    pub fn string_arg(&self) -> Option<&str> {
        match self.args.first() {
            Some(Expr::Str(value)) => Some(value.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeNode>,
    pub optional: bool,
}

/// Raw text of a brace-delimited body, including the braces, plus its byte span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Body {
    pub raw: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub ret: Option<TypeNode>,
    pub body: Body,
    pub decorators: Vec<Decorator>,
    pub public: bool,
    pub start: usize,
}

impl FunctionDecl {
    pub fn decorator(&self, name: &str) -> Option<&Decorator> {
        self.decorators.iter().find(|d| d.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClassMember {
    Property { name: String, ty: Option<TypeNode> },
    Method(FunctionDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub members: Vec<ClassMember>,
    pub public: bool,
    pub start: usize,
}

impl ClassDecl {
    pub fn methods(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.members.iter().filter_map(|member| match member {
            ClassMember::Method(method) => Some(method),
            ClassMember::Property { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindingKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Item {
    Import {
        module: String,
        default: Option<String>,
        namespace: Option<String>,
        names: Option<Vec<String>>,
    },
    TypeAlias {
        name: String,
        type_params: Vec<String>,
        ty: TypeNode,
        public: bool,
        start: usize,
    },
    Interface {
        name: String,
        type_params: Vec<String>,
        fields: Vec<FieldDecl>,
        public: bool,
        start: usize,
    },
    Variable {
        kind: BindingKind,
        name: String,
        ty: Option<TypeNode>,
        /// Initializer source text; parsed into an expression when the module is built.
        value: String,
        public: bool,
        start: usize,
    },
    Function(FunctionDecl),
    Class(ClassDecl),
}

impl Item {
    /// Apply the `export` flag, leading decorators and start offset parsed ahead of the item.
    pub(crate) fn with_header(mut self, at: usize, exported: bool, decs: Vec<Decorator>) -> Self {
        match &mut self {
            Item::Import { .. } => {}
            Item::TypeAlias { public, start, .. }
            | Item::Interface { public, start, .. }
            | Item::Variable { public, start, .. } => {
                *public = exported;
                *start = at;
            }
            Item::Function(decl) => {
                decl.public = exported;
                decl.start = at;
                decl.decorators = decs;
            }
            Item::Class(decl) => {
                decl.public = exported;
                decl.start = at;
                decl.decorators = decs;
            }
        }
        self
    }

    fn label(&self) -> String {
        match self {
            Item::Import { module, .. } => format!("Import (\"{}\")", module),
            Item::TypeAlias { name, .. } => format!("TypeAlias (\"{}\")", name),
            Item::Interface { name, .. } => format!("Interface (\"{}\")", name),
            Item::Variable { name, kind, .. } => format!("{:?} (\"{}\")", kind, name),
            Item::Function(decl) => format!("Function (\"{}\")", decl.name),
            Item::Class(decl) => format!("Class (\"{}\")", decl.name),
        }
    }

    fn child_labels(&self) -> Vec<String> {
        match self {
            Item::Interface { fields, .. } => fields
                .iter()
                .map(|f| format!("Field (\"{}\")", f.name))
                .collect(),
            Item::Function(decl) => decl
                .params
                .iter()
                .map(|p| format!("Param (\"{}\")", p.name))
                .collect(),
            Item::Class(decl) => decl
                .members
                .iter()
                .map(|member| match member {
                    ClassMember::Property { name, .. } => format!("Property (\"{}\")", name),
                    ClassMember::Method(method) => match method.decorator("validator") {
                        Some(dec) => format!(
                            "Validator (\"{}\", {})",
                            method.name,
                            dec.string_arg().unwrap_or("?")
                        ),
                        None => format!("Method (\"{}\")", method.name),
                    },
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Parsed host syntax for one source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceFile {
    pub items: Vec<Item>,
}

impl SourceFile {
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(decl) => Some(decl),
            _ => None,
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Class(decl) => Some(decl),
            _ => None,
        })
    }

    /// Get a formatted outline of the file
    pub fn to_tree_string(&self) -> String {
        format!("{}", self)
    }
}

impl Display for SourceFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "SourceFile")?;
        let count = self.items.len();
        for (index, item) in self.items.iter().enumerate() {
            let is_last = index + 1 == count;
            let connector = if is_last { "└── " } else { "├── " };
            writeln!(f, "{}{}", connector, item.label())?;

            let extension = if is_last { "    " } else { "│   " };
            let children = item.child_labels();
            let child_count = children.len();
            for (child_index, child) in children.iter().enumerate() {
                let child_connector = if child_index + 1 == child_count {
                    "└── "
                } else {
                    "├── "
                };
                writeln!(f, "{}{}{}", extension, child_connector, child)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(raw: &str) -> Body {
        Body {
            raw: raw.to_string(),
            start: 0,
            end: raw.len(),
        }
    }

    #[test]
    fn test_tree_display() {
        let method = FunctionDecl {
            name: "spend".to_string(),
            type_params: Vec::new(),
            params: Vec::new(),
            ret: None,
            body: body("{}"),
            decorators: vec![Decorator {
                name: "validator".to_string(),
                args: vec![Expr::Str("spend".to_string())],
            }],
            public: false,
            start: 0,
        };
        let file = SourceFile {
            items: vec![
                Item::Interface {
                    name: "Datum".to_string(),
                    type_params: Vec::new(),
                    fields: vec![FieldDecl {
                        name: "owner".to_string(),
                        ty: TypeNode::named("PubKeyHash"),
                        optional: false,
                    }],
                    public: true,
                    start: 0,
                },
                Item::Class(ClassDecl {
                    name: "Vesting".to_string(),
                    decorators: Vec::new(),
                    members: vec![ClassMember::Method(method)],
                    public: false,
                    start: 0,
                }),
            ],
        };

        let tree = file.to_tree_string();
        assert!(tree.contains("├── Interface (\"Datum\")"));
        assert!(tree.contains("│   └── Field (\"owner\")"));
        assert!(tree.contains("└── Class (\"Vesting\")"));
        assert!(tree.contains("Validator (\"spend\", spend)"));
    }

    #[test]
    fn test_decorator_string_arg() {
        let dec = Decorator {
            name: "validator".to_string(),
            args: vec![Expr::Number("1".to_string())],
        };
        assert_eq!(dec.string_arg(), None);
    }
}
