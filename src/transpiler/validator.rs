use crate::contract::module::Parameter;
use crate::transpiler::types::TypeMapper;
use serde::{Serialize, Serializer};
use std::fmt;

/// Role tag of a validator handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Purpose {
    Spend,
    Mint,
    Withdraw,
    Publish,
    Other(String),
}

impl Purpose {
    pub fn parse(tag: &str) -> Self {
        match tag.trim() {
            "spend" => Purpose::Spend,
            "mint" => Purpose::Mint,
            "withdraw" => Purpose::Withdraw,
            "publish" => Purpose::Publish,
            other => Purpose::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Purpose::Spend => "spend",
            Purpose::Mint => "mint",
            Purpose::Withdraw => "withdraw",
            Purpose::Publish => "publish",
            Purpose::Other(tag) => tag,
        }
    }

    /// Whether the handler receives a datum as its first argument.
    pub fn has_datum(&self) -> bool {
        matches!(self, Purpose::Spend | Purpose::Other(_))
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Purpose {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum Leading {
    /// `(datum, redeemer)`; `fill` inserts defaults when the source omits them.
    DatumAndRedeemer { fill: bool },
    Redeemer,
    Nothing,
}

/// Parameter template for one purpose.
#[derive(Debug, Clone, Copy)]
struct Shape {
    leading: Leading,
    trailing: &'static [(&'static str, &'static str)],
    keep_rest: bool,
}

const SPEND: Shape = Shape {
    leading: Leading::DatumAndRedeemer { fill: true },
    trailing: &[("output_reference", "OutputReference"), ("transaction", "Transaction")],
    keep_rest: false,
};

const MINT: Shape = Shape {
    leading: Leading::Redeemer,
    trailing: &[("policy_id", "PolicyId"), ("transaction", "Transaction")],
    keep_rest: false,
};

const WITHDRAW: Shape = Shape {
    leading: Leading::Redeemer,
    trailing: &[("credential", "Credential"), ("transaction", "Transaction")],
    keep_rest: false,
};

const PUBLISH: Shape = Shape {
    leading: Leading::Nothing,
    trailing: &[],
    keep_rest: false,
};

const FALLBACK: Shape = Shape {
    leading: Leading::DatumAndRedeemer { fill: false },
    trailing: &[],
    keep_rest: true,
};

fn shape_for(purpose: &Purpose) -> Shape {
    match purpose {
        Purpose::Spend => SPEND,
        Purpose::Mint => MINT,
        Purpose::Withdraw => WITHDRAW,
        Purpose::Publish => PUBLISH,
        Purpose::Other(_) => FALLBACK,
    }
}

const OPAQUE_DATA: &str = "Data";

fn datum_param(source: Option<&Parameter>) -> Parameter {
    match source {
        Some(param) => Parameter::new(&param.name, &TypeMapper::wrap_in_option(&param.ty)),
        None => Parameter::new("datum", &TypeMapper::wrap_in_option(OPAQUE_DATA)),
    }
}

fn redeemer_param(source: Option<&Parameter>) -> Parameter {
    match source {
        Some(param) if TypeMapper::is_unit(&param.ty) => Parameter::new(&param.name, OPAQUE_DATA),
        Some(param) => param.clone(),
        None => Parameter::new("redeemer", OPAQUE_DATA),
    }
}

/// Reshape a validator's parameters to the arity and types its purpose requires.
pub fn adjust(purpose: &Purpose, parameters: &[Parameter]) -> Vec<Parameter> {
    let shape = shape_for(purpose);
    let mut input = parameters.iter();
    let mut adjusted = Vec::new();

    match shape.leading {
        Leading::Nothing => return adjusted,
        Leading::DatumAndRedeemer { fill } => {
            let datum = input.next();
            if datum.is_some() || fill {
                adjusted.push(datum_param(datum));
            }
            let redeemer = input.next();
            if redeemer.is_some() || fill {
                adjusted.push(redeemer_param(redeemer));
            }
        }
        Leading::Redeemer => adjusted.push(redeemer_param(input.next())),
    }

    for &(name, ty) in shape.trailing {
        let param_name = input.next().map(|p| p.name.as_str()).unwrap_or(name);
        adjusted.push(Parameter::new(param_name, ty));
    }

    if shape.keep_rest {
        adjusted.extend(input.cloned());
    }

    adjusted
}

/// Ledger types a purpose's signature refers to.
pub fn required_types(purpose: &Purpose) -> Vec<&'static str> {
    shape_for(purpose).trailing.iter().map(|(_, ty)| *ty).collect()
}

/// `purpose(name: Type, ...)` line opening a handler inside a validator block.
pub fn handler_signature(purpose: &Purpose, parameters: &[Parameter]) -> String {
    let rendered: Vec<String> = parameters
        .iter()
        .map(|p| format!("{}: {}", p.name, p.ty))
        .collect();
    format!("{}({})", purpose, rendered.join(", "))
}

/// Validator block name: `unlockFunds` becomes `unlock_funds`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}
