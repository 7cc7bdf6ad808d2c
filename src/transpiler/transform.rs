//! Parsed module -> generation-ready module.
//!
//! Validators are reshaped to their purpose's signature and pre-rendered as
//! complete `validator` blocks; everything else gets its body converted and its
//! builtin usage recorded.

use crate::contract::module::{Contract, Datum, Function, Module, Parameter, Validator};
use crate::transpiler::builtins::BuiltinRegistry;
use crate::transpiler::codegen::dsl::indent;
use crate::transpiler::codegen::{function_body_or, VALIDATOR_TOKEN};
use crate::transpiler::errors::TranspileError;
use crate::transpiler::expressions::ExpressionTransformer;
use crate::transpiler::types::TypeMapper;
use crate::transpiler::validator::{adjust, handler_signature, required_types, snake_case, Purpose};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

static TYPE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][A-Za-z0-9_]*\b").expect("valid type word regex"));

pub struct Transformer<'r> {
    registry: &'r mut BuiltinRegistry,
}

impl<'r> Transformer<'r> {
    pub fn new(registry: &'r mut BuiltinRegistry) -> Self {
        Self { registry }
    }

    pub fn transform(&mut self, mut module: Module) -> Result<Module, TranspileError> {
        validate_unique_types(&module)?;
        validate_unique_functions(&module)?;
        for validator in module.validators() {
            validate_return_type(&module.name, validator)?;
        }

        self.mark_ledger_types(&module);

        for constant in &mut module.constants {
            if let Some(expr) = &constant.value_expr {
                let rendered = ExpressionTransformer::new(self.registry).to_target_expr(expr);
                rendered.mark_used(self.registry);
                constant.value = rendered.code;
            } else {
                constant.value = constant.value.trim().to_string();
            }
        }

        let name = module.name.clone();
        for function in module.functions.iter_mut().chain(module.tests.iter_mut()) {
            self.convert_statements(function);
            if let Some(purpose) = function.purpose.clone() {
                self.build_validator(&name, function, &purpose);
            }
        }

        debug!(
            module = %module.name,
            validators = module.validators().count(),
            "transformed module"
        );
        Ok(module)
    }

    /// Legacy whole-class view: the class's validators plus the record types their
    /// parameters refer to.
    pub fn contract_view(&mut self, module: &Module, class: &str) -> Result<Contract, TranspileError> {
        let functions: Vec<&Function> = module
            .validators()
            .filter(|f| f.class_name.as_deref() == Some(class))
            .collect();
        if functions.is_empty() {
            return Err(TranspileError::transform(
                &module.name,
                class,
                "class has no validator methods",
            ));
        }

        let mut validators = Vec::new();
        let mut datums: Vec<Datum> = Vec::new();

        for function in functions {
            let Some(purpose) = function.purpose.clone() else {
                continue;
            };
            validate_return_type(&module.name, function)?;

            for param in &function.parameters {
                let name = strip_option(&param.ty);
                if datums.iter().any(|d| d.name == name) {
                    continue;
                }
                let fields = module.find_type(name).and_then(|t| t.record_fields());
                if let Some(fields) = fields {
                    datums.push(Datum {
                        name: name.to_string(),
                        fields: fields
                            .iter()
                            .map(|(field, ty)| Parameter::new(field, ty))
                            .collect(),
                    });
                }
            }

            let parameters = adjust(&purpose, &function.parameters);
            let body = match &function.converted_body {
                Some(body) if function.body.starts_with(VALIDATOR_TOKEN) => body.clone(),
                _ => {
                    let mut function = function.clone();
                    self.convert_statements(&mut function);
                    handler_body(&function, &purpose, self.registry)
                }
            };
            for ty in required_types(&purpose) {
                self.registry.mark_used(ty);
            }

            validators.push(Validator {
                name: function.name.clone(),
                purpose,
                parameters,
                return_type: "Bool".to_string(),
                body,
            });
        }

        Ok(Contract {
            name: class.to_string(),
            datums,
            validators,
        })
    }

    fn convert_statements(&mut self, function: &mut Function) {
        if let Some(statements) = &function.statements {
            let rendered = ExpressionTransformer::new(self.registry).convert_statements(statements);
            rendered.mark_used(self.registry);
            function.converted_body = Some(rendered.code);
        }
    }

    fn build_validator(&mut self, module: &str, function: &mut Function, purpose: &Purpose) {
        let parameters = adjust(purpose, &function.parameters);
        for ty in required_types(purpose) {
            self.registry.mark_used(ty);
        }

        let body = handler_body(function, purpose, self.registry);

        let block = format!(
            "{}{} {{\n  {} {{\n{}\n  }}\n}}",
            VALIDATOR_TOKEN,
            snake_case(&function.name),
            handler_signature(purpose, &parameters),
            indent(&body, 4)
        );
        debug!(module, validator = %function.name, %purpose, "built validator block");

        function.parameters = parameters;
        function.converted_body = Some(body);
        function.body = block;
    }

    /// Records imports for ledger types referenced by signatures and type bodies.
    fn mark_ledger_types(&mut self, module: &Module) {
        let mut texts: Vec<&str> = module.types.iter().map(|t| t.definition.as_str()).collect();
        for function in module.functions.iter().chain(module.tests.iter()) {
            texts.extend(function.parameters.iter().map(|p| p.ty.as_str()));
            texts.push(function.return_type.as_str());
        }
        texts.extend(module.constants.iter().filter_map(|c| c.ty.as_deref()));

        let local: HashSet<&str> = module.types.iter().map(|t| t.name.as_str()).collect();
        for text in texts {
            for word in TYPE_WORD.find_iter(text) {
                let word = word.as_str();
                if !local.contains(word) && self.registry.is_type(word) {
                    self.registry.mark_used(word);
                }
            }
        }
    }
}

/// Handler body for a validator, unwrapping a datum that was made optional.
fn handler_body(function: &Function, purpose: &Purpose, registry: &mut BuiltinRegistry) -> String {
    // a handler has to evaluate to Bool
    let body = function_body_or(function, registry, "True");
    let datum = function
        .parameters
        .first()
        .filter(|_| purpose.has_datum())
        .filter(|param| !TypeMapper::is_optional(&param.ty) && !TypeMapper::is_unit(&param.ty));
    match datum {
        Some(param) => format!("expect Some({0}) = {0}\n{1}", param.name, body),
        None => body,
    }
}

fn strip_option(ty: &str) -> &str {
    let ty = ty.trim();
    ty.strip_prefix("Option<")
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(ty)
}

fn validate_unique_types(module: &Module) -> Result<(), TranspileError> {
    let mut seen = HashSet::new();
    for type_def in &module.types {
        if !seen.insert(type_def.name.as_str()) {
            return Err(TranspileError::transform(
                &module.name,
                &type_def.name,
                "duplicate type name",
            ));
        }
    }
    Ok(())
}

/// Functions and validator blocks share one namespace; tests have their own.
fn validate_unique_functions(module: &Module) -> Result<(), TranspileError> {
    let mut seen = HashSet::new();
    for function in &module.functions {
        let emitted = if function.purpose.is_some() {
            snake_case(&function.name)
        } else {
            function.name.clone()
        };
        if !seen.insert(emitted.clone()) {
            return Err(TranspileError::transform(
                &module.name,
                &emitted,
                "duplicate function name",
            ));
        }
    }

    let mut tests = HashSet::new();
    for test in &module.tests {
        if !tests.insert(test.name.as_str()) {
            return Err(TranspileError::transform(
                &module.name,
                &test.name,
                "duplicate test name",
            ));
        }
    }
    Ok(())
}

fn validate_return_type(module: &str, function: &Function) -> Result<(), TranspileError> {
    let mapped = TypeMapper::map_type_str(&function.return_type);
    if mapped.trim() == "Bool" || TypeMapper::is_unit(&mapped) {
        Ok(())
    } else {
        Err(TranspileError::transform(
            module,
            &function.name,
            format!("validator must return Bool, found {}", mapped.trim()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::parser::parse_source;

    fn transform(source: &str) -> (Result<Module, TranspileError>, BuiltinRegistry) {
        let mut registry = BuiltinRegistry::new();
        let module = parse_source(source).expect("source parses");
        let result = Transformer::new(&mut registry).transform(module);
        (result, registry)
    }

    const SPEND: &str = r#"
interface Datum { owner: PubKeyHash }

class Escrow {
  @validator("spend")
  unlockFunds(datum: Datum, redeemer: void): boolean {
    return tx.extra_signatories.includes(datum.owner);
  }
}
"#;

    #[test]
    fn test_spend_validator_block() {
        let (module, registry) = transform(SPEND);
        let module = module.unwrap();
        let validator = module.validators().next().unwrap();

        assert_eq!(
            validator.body,
            "validator unlock_funds {\n  spend(datum: Option<Datum>, redeemer: Data, output_reference: OutputReference, transaction: Transaction) {\n    expect Some(datum) = datum\n    list.has(transaction.extra_signatories, datum.owner)\n  }\n}"
        );
        assert_eq!(validator.parameters.len(), 4);
        assert_eq!(
            registry.used_import_groups(),
            vec!["aiken/collection/list", "aiken/crypto", "cardano/transaction"]
        );
        assert_eq!(
            registry.used_types_in("cardano/transaction"),
            vec!["OutputReference", "Transaction"]
        );
    }

    #[test]
    fn test_explicit_transaction_parameter_stays_bound() {
        let source = r#"
interface D { owner: PubKeyHash }

class Escrow {
  @validator("spend")
  unlock(datum: D, redeemer: void, oref: Data, tx: Data): boolean {
    return tx.extra_signatories.includes(datum.owner);
  }
}

function signedBy(tx: Transaction, key: PubKeyHash): boolean {
  return tx.extra_signatories.includes(key);
}
"#;
        let (module, _) = transform(source);
        let module = module.unwrap();
        let validator = module.validators().next().unwrap();
        assert!(validator.body.contains(
            "spend(datum: Option<D>, redeemer: Data, oref: OutputReference, transaction: Transaction) {"
        ));
        assert!(validator
            .body
            .contains("list.has(transaction.extra_signatories, datum.owner)"));

        let helper = module.functions.iter().find(|f| f.name == "signedBy").unwrap();
        assert_eq!(helper.parameters[0].name, "transaction");
        assert_eq!(
            helper.converted_body.as_deref(),
            Some("list.has(transaction.extra_signatories, key)")
        );
    }

    #[test]
    fn test_mint_validator_without_datum_unwrap() {
        let source = r#"
class Token {
  @validator("mint")
  mintToken(redeemer: void): boolean {
    return true;
  }
}
"#;
        let (module, registry) = transform(source);
        let module = module.unwrap();
        let validator = module.validators().next().unwrap();
        assert!(validator.body.starts_with("validator mint_token {\n  mint(redeemer: Data, policy_id: PolicyId, transaction: Transaction) {"));
        assert!(!validator.body.contains("expect Some"));
        assert_eq!(validator.converted_body.as_deref(), Some("True"));
        assert_eq!(registry.used_types_in("cardano/assets"), vec!["PolicyId"]);
    }

    #[test]
    fn test_empty_handler_accepts() {
        let source = r#"
class Registry {
  @validator("publish")
  register(): boolean {
  }

  @validator("spend")
  release(datum: Data, redeemer: void): boolean {
  }
}
"#;
        let (module, _) = transform(source);
        let module = module.unwrap();
        let blocks: Vec<&str> = module.validators().map(|v| v.body.as_str()).collect();
        assert_eq!(blocks[0], "validator register {\n  publish() {\n    True\n  }\n}");
        assert!(blocks[1].contains("    expect Some(datum) = datum\n    True\n  }"));
    }

    #[test]
    fn test_rejects_non_bool_validator() {
        let source = r#"
class Bad {
  @validator("spend")
  check(d: Data, r: void): number { return 1; }
}
"#;
        let (result, _) = transform(source);
        let err = result.unwrap_err();
        assert_eq!(err.stage(), "transform");
        assert!(err.to_string().contains("must return Bool"));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let (result, _) = transform("type A = number;\ntype A = string;\n");
        assert!(result.unwrap_err().to_string().contains("duplicate type name"));

        let source = "function f(): number { return 1; }\nfunction f(): number { return 2; }\n";
        let (result, _) = transform(source);
        assert!(result.unwrap_err().to_string().contains("duplicate function name"));
    }

    #[test]
    fn test_constants_are_converted_structurally() {
        let (module, _) = transform("const ENABLED: boolean = true;\nconst LIMIT = 10n;\n");
        let module = module.unwrap();
        assert_eq!(module.constants[0].value, "True");
        assert_eq!(module.constants[1].value, "10");
    }

    #[test]
    fn test_local_types_shadow_ledger_types() {
        let source = r#"
type Transaction = { id: string };
function id(t: Transaction): string { return t.id; }
"#;
        let (module, registry) = transform(source);
        module.unwrap();
        assert!(registry.used_import_groups().is_empty());
    }

    #[test]
    fn test_contract_view() {
        let mut registry = BuiltinRegistry::new();
        let module = parse_source(SPEND).unwrap();
        let contract = Transformer::new(&mut registry)
            .contract_view(&module, "Escrow")
            .unwrap();

        assert_eq!(contract.name, "Escrow");
        assert_eq!(contract.datums.len(), 1);
        assert_eq!(contract.datums[0].name, "Datum");
        assert_eq!(
            contract.datums[0].fields,
            vec![Parameter::new("owner", "VerificationKeyHash")]
        );
        assert_eq!(contract.validators[0].purpose, Purpose::Spend);
        assert_eq!(contract.validators[0].parameters.len(), 4);

        let missing = Transformer::new(&mut registry).contract_view(&module, "Nope");
        assert!(missing.is_err());
    }
}
