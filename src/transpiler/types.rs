use crate::contract::ast::{FieldDecl, TypeNode};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

/// Source type names with a fixed target spelling. Anything else passes through unchanged.
static TYPE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // primitives
        ("boolean", "Bool"),
        ("number", "Int"),
        ("bigint", "Int"),
        ("string", "String"),
        ("Uint8Array", "ByteArray"),
        ("Buffer", "ByteArray"),
        ("bytes", "ByteArray"),
        ("ByteString", "ByteArray"),
        ("void", "Void"),
        ("undefined", "Void"),
        ("null", "Void"),
        ("unknown", "Data"),
        ("any", "Data"),
        ("object", "Data"),
        // containers
        ("Array", "List"),
        ("ReadonlyArray", "List"),
        ("Map", "Dict"),
        ("Record", "Dict"),
        // ledger domain
        ("PubKeyHash", "VerificationKeyHash"),
        ("KeyHash", "VerificationKeyHash"),
        ("TokenName", "AssetName"),
        ("AssetName", "AssetName"),
        ("CurrencySymbol", "PolicyId"),
        ("PolicyId", "PolicyId"),
        ("POSIXTime", "Int"),
        ("Time", "Int"),
        ("Timestamp", "Int"),
        ("Lovelace", "Int"),
        ("Context", "ScriptContext"),
        ("ScriptContext", "ScriptContext"),
        ("Tx", "Transaction"),
        ("TxInfo", "Transaction"),
        ("TxOutRef", "OutputReference"),
        ("OutputRef", "OutputReference"),
        ("Address", "Address"),
    ])
});

static TYPE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid type word regex"));

const UNIT: &str = "Void";

pub struct TypeMapper;

impl TypeMapper {
    /// Render a source type node as a target type string.
    pub fn to_target_type(node: &TypeNode) -> String {
        match node {
            TypeNode::Literal(text) => text.clone(),
            TypeNode::Reference { name, args } => {
                let base = Self::map_name(name);
                if args.is_empty() {
                    base
                } else {
                    let rendered: Vec<String> = args.iter().map(Self::to_target_type).collect();
                    format!("{}<{}>", base, rendered.join(", "))
                }
            }
            TypeNode::Union(members) => Self::union_type(members),
            TypeNode::Array(inner) => format!("List<{}>", Self::to_target_type(inner)),
            TypeNode::Tuple(items) => {
                let rendered: Vec<String> = items.iter().map(Self::to_target_type).collect();
                format!("({})", rendered.join(", "))
            }
            TypeNode::Function { params, ret } => {
                let rendered: Vec<String> = params.iter().map(Self::to_target_type).collect();
                format!("({}) -> {}", rendered.join(", "), Self::to_target_type(ret))
            }
            TypeNode::Object(fields) => Self::object_type(fields),
        }
    }

    /// Look up a single source type name.
    pub fn map_name(name: &str) -> String {
        TYPE_ALIASES
            .get(name)
            .map(|target| target.to_string())
            .unwrap_or_else(|| name.to_string())
    }

    /// Re-map every type name inside an already rendered type string.
    ///
    /// Target names are never alias keys, so applying this to mapped output is a no-op.
    pub fn map_type_str(rendered: &str) -> String {
        TYPE_WORD
            .replace_all(rendered, |caps: &Captures| Self::map_name(&caps[0]))
            .into_owned()
    }

    pub fn is_unit(ty: &str) -> bool {
        let trimmed = ty.trim();
        trimmed.is_empty() || trimmed == UNIT || trimmed == "()"
    }

    pub fn is_optional(ty: &str) -> bool {
        ty.trim_start().starts_with("Option<")
    }

    pub fn wrap_in_option(ty: &str) -> String {
        if Self::is_optional(ty) || Self::is_unit(ty) {
            ty.trim().to_string()
        } else {
            format!("Option<{}>", ty.trim())
        }
    }

    fn union_type(members: &[TypeNode]) -> String {
        let (nullish, concrete): (Vec<&TypeNode>, Vec<&TypeNode>) = members
            .iter()
            .partition(|member| Self::is_unit(&Self::to_target_type(member)));

        // `T | undefined` reads as an optional value
        if !nullish.is_empty() && concrete.len() == 1 {
            return Self::wrap_in_option(&Self::to_target_type(concrete[0]));
        }

        members
            .iter()
            .map(Self::to_target_type)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn object_type(fields: &[FieldDecl]) -> String {
        if fields.is_empty() {
            return "{}".to_string();
        }
        let rendered: Vec<String> = fields.iter().map(Self::field).collect();
        format!("{{ {} }}", rendered.join(", "))
    }

    /// `name: Type`, wrapping optional fields.
    pub fn field(field: &FieldDecl) -> String {
        let ty = Self::to_target_type(&field.ty);
        let ty = if field.optional {
            Self::wrap_in_option(&ty)
        } else {
            ty
        };
        format!("{}: {}", field.name, ty)
    }
}
