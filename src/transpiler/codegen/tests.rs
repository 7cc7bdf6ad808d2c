#[cfg(test)]
mod tests {
    use crate::contract::module::{
        Contract, Datum, Function, Module, Parameter, TypeDef, Validator,
    };
    use crate::transpiler::builtins::BuiltinRegistry;
    use crate::transpiler::codegen::AikenCodeGenerator;
    use crate::transpiler::parser::parse_source;
    use crate::transpiler::transform::Transformer;
    use crate::transpiler::validator::Purpose;

    fn generate(source: &str) -> String {
        let mut registry = BuiltinRegistry::new();
        let module = parse_source(source).expect("source parses");
        let module = Transformer::new(&mut registry)
            .transform(module)
            .expect("module transforms");
        AikenCodeGenerator::new(&mut registry)
            .generate(&module)
            .expect("module generates")
    }

    fn type_def(name: &str, definition: &str) -> TypeDef {
        TypeDef {
            name: name.to_string(),
            type_params: vec![],
            definition: definition.to_string(),
            is_opaque: false,
            is_public: true,
            docs: vec![],
        }
    }

    #[test]
    fn test_record_fields_keep_order() {
        let mut module = Module::new("pairs");
        module.types.push(type_def("Pair", "{ a: Int, b: Bool }"));

        let mut registry = BuiltinRegistry::new();
        let code = AikenCodeGenerator::new(&mut registry).generate(&module).unwrap();
        assert_eq!(code, "pub type Pair {\n  a: Int,\n  b: Bool,\n}\n");
    }

    #[test]
    fn test_alias_sum_and_opaque_types() {
        let mut module = Module::new("kinds");
        module.types.push(type_def("Amount", "Int"));
        module.types.push(type_def("Action", "\"claim\" | \"Cancel\""));
        let mut opaque = type_def("Secret", "{ value: ByteArray }");
        opaque.is_opaque = true;
        opaque.docs = vec!["Hidden bytes.".to_string()];
        module.types.push(opaque);

        let mut registry = BuiltinRegistry::new();
        let code = AikenCodeGenerator::new(&mut registry).generate(&module).unwrap();
        assert!(code.contains("pub type Amount = Int"));
        assert!(code.contains("pub type Action {\n  Claim\n  Cancel\n}"));
        assert!(code.contains("/// Hidden bytes.\npub opaque type Secret {\n  value: ByteArray,\n}"));
    }

    #[test]
    fn test_object_union_is_rejected() {
        let mut module = Module::new("actions");
        module.types.push(type_def("Action", "{ a: Int } | { b: Bool }"));

        let mut registry = BuiltinRegistry::new();
        let err = AikenCodeGenerator::new(&mut registry).generate(&module).unwrap_err();
        assert_eq!(err.stage(), "generate");
        assert!(err.to_string().contains("union of object types"));
    }

    #[test]
    fn test_union_inside_type_arguments_is_an_alias() {
        let mut module = Module::new("maybe");
        module.types.push(type_def("Choice", "Option<Int | Bool>"));

        let mut registry = BuiltinRegistry::new();
        let code = AikenCodeGenerator::new(&mut registry).generate(&module).unwrap();
        assert_eq!(code, "pub type Choice = Option<Int | Bool>\n");
    }

    #[test]
    fn test_spend_validator_end_to_end() {
        let code = generate(
            r#"
interface Datum {
  owner: PubKeyHash;
}

class Escrow {
  @validator("spend")
  unlock(datum: Datum, redeemer: void): boolean {
    return tx.extra_signatories.includes(datum.owner);
  }
}
"#,
        );

        assert!(code.starts_with(
            "use aiken/collection/list\nuse aiken/crypto.{VerificationKeyHash}\nuse cardano/transaction.{OutputReference, Transaction}\n\n"
        ));
        assert!(code.contains("type Datum {\n  owner: VerificationKeyHash,\n}"));
        assert!(code.contains(
            "validator unlock {\n  spend(datum: Option<Datum>, redeemer: Data, output_reference: OutputReference, transaction: Transaction) {\n    expect Some(datum) = datum\n    list.has(transaction.extra_signatories, datum.owner)\n  }\n}"
        ));
    }

    #[test]
    fn test_conditional_pipeline_has_single_braces() {
        let code = generate(
            r#"
function route(x: number, big: boolean): number {
  if (big) {
    // @pipe x |> double |> addOne
    return addOne(double(x));
  } else {
    // @pipe x |> half
    return half(x);
  }
}
"#,
        );
        assert_eq!(
            code,
            "fn route(x: Int, big: Bool) -> Int {\n  if big {\n    addOne(double(x))\n  } else {\n    half(x)\n  }\n}\n"
        );
        assert!(!code.contains("{\n  {"));
    }

    #[test]
    fn test_single_pipeline_body() {
        let code = generate(
            r#"
export function compute(x: number): number {
  // @pipe x |> double |> addOne
  return addOne(double(x));
}
"#,
        );
        assert_eq!(
            code,
            "pub fn compute(x: Int) -> Int {\n  addOne(double(x))\n}\n"
        );
    }

    #[test]
    fn test_when_block_body() {
        let code = generate(
            r#"
function route(action: number, x: number): number {
  // @when action
  if (action === 1) { return x; }
  else { return 0; }
}
"#,
        );
        assert!(code.contains(
            "fn route(action: Int, x: Int) -> Int {\n  when action is {\n    1 => x,\n    _ => 0,\n  }\n}"
        ));
    }

    #[test]
    fn test_expect_assertions_lead_the_body() {
        let code = generate(
            r#"
// @expect datum.owner, "owner required"
function check(datum: Data): boolean {
  return true;
}
"#,
        );
        assert!(code.contains(
            "fn check(datum: Data) -> Bool {\n  assert(datum.owner, \"owner required\")\n  True\n}"
        ));
    }

    #[test]
    fn test_tests_and_constants() {
        let code = generate(
            r#"
export const LIMIT: number = 100;

function test_limit_positive() {
  return LIMIT > 0;
}
"#,
        );
        assert!(code.contains("pub const LIMIT: Int = 100"));
        assert!(code.contains("test test_limit_positive() {\n  LIMIT > 0\n}"));
    }

    #[test]
    fn test_explicit_imports() {
        let code = generate(
            r#"
import { PubKeyHash, Helper } from "./types.ts";
import * as list from "aiken/collection/list";

export function has(xs: number[], y: number): boolean {
  return xs.includes(y);
}
"#,
        );
        assert!(code.starts_with("use types.{Helper}\nuse aiken/collection/list as list\n\n"));
        assert_eq!(code.matches("use aiken/collection/list").count(), 1);
        assert!(code.contains("pub fn has(xs: List<Int>, y: Int) -> Bool {\n  list.has(xs, y)\n}"));
    }

    #[test]
    fn test_module_docs() {
        let code = generate("/**\n * @module demo\n * Demo module.\n */\nconst A = 1;\n");
        assert!(code.starts_with("//// Demo module.\n\n"));
    }

    #[test]
    fn test_untransformed_validator_is_an_error() {
        let mut module = Module::new("raw");
        module.functions.push(Function {
            name: "unlock".to_string(),
            body: "{ return true; }".to_string(),
            purpose: Some(Purpose::Spend),
            ..Function::default()
        });

        let mut registry = BuiltinRegistry::new();
        let err = AikenCodeGenerator::new(&mut registry)
            .generate(&module)
            .unwrap_err();
        assert_eq!(err.stage(), "generate");
    }

    #[test]
    fn test_generate_contract() {
        let contract = Contract {
            name: "TokenVault".to_string(),
            datums: vec![Datum {
                name: "VaultDatum".to_string(),
                fields: vec![Parameter::new("owner", "VerificationKeyHash")],
            }],
            validators: vec![
                Validator {
                    name: "unlock".to_string(),
                    purpose: Purpose::Spend,
                    parameters: vec![
                        Parameter::new("datum", "Option<VaultDatum>"),
                        Parameter::new("redeemer", "Data"),
                        Parameter::new("output_reference", "OutputReference"),
                        Parameter::new("transaction", "Transaction"),
                    ],
                    return_type: "Bool".to_string(),
                    body: "True".to_string(),
                },
                Validator {
                    name: "mint".to_string(),
                    purpose: Purpose::Mint,
                    parameters: vec![
                        Parameter::new("redeemer", "Data"),
                        Parameter::new("policy_id", "PolicyId"),
                        Parameter::new("transaction", "Transaction"),
                    ],
                    return_type: "Bool".to_string(),
                    body: String::new(),
                },
            ],
        };

        let mut registry = BuiltinRegistry::new();
        let code = AikenCodeGenerator::new(&mut registry)
            .generate_contract(&contract)
            .unwrap();
        assert!(code.contains("pub type VaultDatum {\n  owner: VerificationKeyHash,\n}"));
        assert!(code.contains("validator token_vault {\n  spend(datum: Option<VaultDatum>, redeemer: Data, output_reference: OutputReference, transaction: Transaction) {\n    True\n  }\n\n  mint(redeemer: Data, policy_id: PolicyId, transaction: Transaction) {\n    True\n  }\n}"));

        let empty = Contract {
            name: "Empty".to_string(),
            datums: vec![],
            validators: vec![],
        };
        assert!(AikenCodeGenerator::new(&mut registry)
            .generate_contract(&empty)
            .is_err());
    }
}
