use anyhow::Result;
use tsaiken::transpiler::validator::Purpose;
use tsaiken::transpiler::{AikenCodeGenerator, BuiltinRegistry, ContractParser, Transformer};

const VAULT: &str = r#"
interface VaultDatum {
  owner: PubKeyHash;
}

class TokenVault {
  @validator("spend")
  unlock(datum: VaultDatum, redeemer: void): boolean {
    return tx.extra_signatories.includes(datum.owner);
  }

  @validator("mint")
  mintShares(redeemer: void): boolean {
    return true;
  }
}

// @expect amount > 0, "amount must be positive"
export function route(action: number, amount: number): number {
  // @when action
  if (action === 1) { return amount; }
  else { return 0; }
}

export function score(x: number): number {
  // @pipe x |> double |> addOne
  return addOne(double(x));
}
"#;

#[test]
fn test_library_pipeline_stage_by_stage() -> Result<()> {
    // 1. Parse: markers are recovered alongside the host syntax
    let module = ContractParser::new("contracts/token_vault.ts").parse(VAULT)?;
    assert_eq!(module.name, "token_vault");
    assert_eq!(module.validators().count(), 2);

    let route = module
        .functions
        .iter()
        .find(|f| f.name == "route")
        .expect("route is parsed");
    assert_eq!(route.when_expressions.len(), 1);
    assert_eq!(route.when_expressions[0].clauses.len(), 2);
    assert_eq!(route.expect_expressions.len(), 1);

    // 2. Transform: validators become pre-rendered blocks
    let mut registry = BuiltinRegistry::new();
    let module = Transformer::new(&mut registry).transform(module)?;
    let mint = module
        .validators()
        .find(|f| f.purpose == Some(Purpose::Mint))
        .expect("mint handler survives");
    assert!(mint.body.starts_with("validator mint_shares {\n  mint(redeemer: Data, policy_id: PolicyId, transaction: Transaction) {"));

    // 3. Generate with the same registry so recorded usage drives the imports
    let code = AikenCodeGenerator::new(&mut registry).generate(&module)?;

    assert!(code.starts_with("use aiken/collection/list\n"));
    assert!(code.contains("use cardano/assets.{PolicyId}"));
    assert!(code.contains("pub type VaultDatum {\n  owner: VerificationKeyHash,\n}"));
    assert!(code.contains("validator unlock {"));
    assert!(code.contains("validator mint_shares {"));
    assert!(code.contains(
        "pub fn route(action: Int, amount: Int) -> Int {\n  assert(amount > 0, \"amount must be positive\")\n  when action is {\n    1 => amount,\n    _ => 0,\n  }\n}"
    ));
    assert!(code.contains("pub fn score(x: Int) -> Int {\n  addOne(double(x))\n}"));

    Ok(())
}

#[test]
fn test_contract_view_generation() -> Result<()> {
    // 1. Setup: parsed but untransformed module
    let module = ContractParser::new("token_vault.ts").parse(VAULT)?;
    let mut registry = BuiltinRegistry::new();

    // 2. Execution: whole-class view, rendered as one multi-handler validator
    let contract = Transformer::new(&mut registry).contract_view(&module, "TokenVault")?;
    assert_eq!(contract.datums.len(), 1);
    assert_eq!(contract.validators.len(), 2);

    let code = AikenCodeGenerator::new(&mut registry).generate_contract(&contract)?;

    // 3. Verification
    assert!(code.contains("use cardano/transaction.{OutputReference, Transaction}"));
    assert!(code.contains("pub type VaultDatum {\n  owner: VerificationKeyHash,\n}"));
    assert!(code.contains(
        "validator token_vault {\n  spend(datum: Option<VaultDatum>, redeemer: Data, output_reference: OutputReference, transaction: Transaction) {\n    expect Some(datum) = datum\n    list.has(transaction.extra_signatories, datum.owner)\n  }\n\n  mint(redeemer: Data, policy_id: PolicyId, transaction: Transaction) {\n    True\n  }\n}"
    ));
    Ok(())
}

#[test]
fn test_parse_errors_locate_the_failure() {
    let err = ContractParser::new("bad.ts")
        .parse("export function f(x: number {\n  return x;\n}\n")
        .unwrap_err();
    assert_eq!(err.stage(), "parse");
    assert!(err.to_string().contains("bad.ts"));
}

#[test]
fn test_unreadable_file_is_a_parse_failure() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let missing = temp_dir.path().join("missing.ts");

    let err = ContractParser::new("missing.ts").parse_file(&missing).unwrap_err();
    assert_eq!(err.stage(), "parse");
    assert!(err.to_string().contains("missing.ts"));
    Ok(())
}
