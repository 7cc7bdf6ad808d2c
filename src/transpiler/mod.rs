pub mod builtins;
pub mod codegen;
pub mod errors;
pub mod expressions;
pub mod parser;
pub mod transform;
pub mod types;
pub mod validator;

pub use builtins::BuiltinRegistry;
pub use codegen::AikenCodeGenerator;
pub use errors::TranspileError;
pub use parser::{parse_source, ContractParser, DEFAULT_EXPECT_LOOKBACK};
pub use transform::Transformer;

use crate::contract::module::Module;
use crate::manifest::ValidatorInfo;
use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Source identity used in diagnostics and as the module name.
    pub file_name: String,
    pub expect_lookback: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            file_name: "main".to_string(),
            expect_lookback: DEFAULT_EXPECT_LOOKBACK,
        }
    }
}

/// Result record of one compilation. `generated_code` is empty on failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub success: bool,
    pub generated_code: String,
    pub errors: Vec<String>,
    pub validators: Vec<ValidatorInfo>,
}

impl CompileOutput {
    fn failed(options: &CompileOptions, err: &TranspileError) -> Self {
        let message = format!("[{}] {}: {}", err.stage(), options.file_name, err);
        warn!(file = %options.file_name, stage = err.stage(), "compilation failed");
        Self {
            success: false,
            errors: vec![message],
            ..Self::default()
        }
    }
}

/// Persists generated code. Implemented by the filesystem writer and by test doubles.
#[cfg_attr(test, mockall::automock)]
pub trait CodeWriter {
    fn write(&self, path: &Path, code: &str) -> Result<(), TranspileError>;
}

/// Writes to disk, creating parent directories as needed.
pub struct FsWriter;

impl CodeWriter for FsWriter {
    fn write(&self, path: &Path, code: &str) -> Result<(), TranspileError> {
        let io_error = |source| TranspileError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, code).map_err(io_error)
    }
}

/// Parse, transform and generate one source text.
///
/// Every call builds its own builtin registry, so import usage never leaks
/// between compilations.
pub fn compile(source: &str, options: &CompileOptions) -> CompileOutput {
    match run_pipeline(source, options) {
        Ok((generated_code, validators)) => CompileOutput {
            success: true,
            generated_code,
            errors: Vec::new(),
            validators,
        },
        Err(err) => CompileOutput::failed(options, &err),
    }
}

/// Compile and hand the result to `writer`; the writer is only called on success.
pub fn compile_to(
    source: &str,
    path: &Path,
    options: &CompileOptions,
    writer: &dyn CodeWriter,
) -> CompileOutput {
    let output = compile(source, options);
    if !output.success {
        return output;
    }
    match writer.write(path, &output.generated_code) {
        Ok(()) => {
            debug!(path = %path.display(), "wrote generated code");
            output
        }
        Err(err) => CompileOutput::failed(options, &err),
    }
}

fn run_pipeline(
    source: &str,
    options: &CompileOptions,
) -> Result<(String, Vec<ValidatorInfo>), TranspileError> {
    let mut registry = BuiltinRegistry::new();

    let module = ContractParser::new(&options.file_name)
        .with_expect_lookback(options.expect_lookback)
        .parse(source)?;
    let module = Transformer::new(&mut registry).transform(module)?;
    let validators = validator_infos(&module);
    let generated_code = AikenCodeGenerator::new(&mut registry).generate(&module)?;

    debug!(
        file = %options.file_name,
        validators = validators.len(),
        imports = registry.used_import_groups().len(),
        "compiled"
    );
    Ok((generated_code, validators))
}

/// Manifest payload for every validator of a transformed module.
pub fn validator_infos(module: &Module) -> Vec<ValidatorInfo> {
    module
        .validators()
        .filter_map(|function| {
            let purpose = function.purpose.clone()?;
            let mut params = function.parameters.iter().map(|p| strip_option(&p.ty));
            let datum = if purpose.has_datum() {
                params.next()
            } else {
                None
            };
            let redeemer = params.next();
            Some(ValidatorInfo {
                contract_name: function
                    .class_name
                    .clone()
                    .unwrap_or_else(|| module.name.clone()),
                validator_name: validator::snake_case(&function.name),
                purpose,
                datum,
                redeemer,
            })
        })
        .collect()
}

fn strip_option(ty: &str) -> String {
    let ty = ty.trim();
    ty.strip_prefix("Option<")
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(ty)
        .to_string()
}

/// Convenience function to transpile contract source directly into Aiken code.
pub fn transpile(source: &str) -> Result<String> {
    let mut registry = BuiltinRegistry::new();
    let module = parse_source(source)?;
    let module = Transformer::new(&mut registry).transform(module)?;
    let generated_code = AikenCodeGenerator::new(&mut registry).generate(&module)?;
    Ok(generated_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::validator::Purpose;
    use mockall::predicate::{always, function};

    const SOURCE: &str = r#"
interface Datum { owner: PubKeyHash }

class Vault {
  @validator("spend")
  unlock(datum: Datum, redeemer: void): boolean {
    return tx.extra_signatories.includes(datum.owner);
  }
}
"#;

    fn options(file: &str) -> CompileOptions {
        CompileOptions {
            file_name: file.to_string(),
            ..CompileOptions::default()
        }
    }

    #[test]
    fn test_compile_reports_validators() {
        let output = compile(SOURCE, &options("vault.ts"));
        assert!(output.success, "{:?}", output.errors);
        assert!(output.errors.is_empty());
        assert!(output.generated_code.contains("validator unlock {"));

        assert_eq!(output.validators.len(), 1);
        let info = &output.validators[0];
        assert_eq!(info.contract_name, "Vault");
        assert_eq!(info.validator_name, "unlock");
        assert_eq!(info.purpose, Purpose::Spend);
        assert_eq!(info.datum.as_deref(), Some("Datum"));
        assert_eq!(info.redeemer.as_deref(), Some("Data"));
    }

    #[test]
    fn test_compile_failure_carries_stage_and_file() {
        let output = compile("function broken( {", &options("broken.ts"));
        assert!(!output.success);
        assert!(output.generated_code.is_empty());
        assert_eq!(output.errors.len(), 1);
        assert!(output.errors[0].starts_with("[parse] broken.ts: "));

        let source = "class C {\n  @validator(\"mint\")\n  m(r: void): number { return 1; }\n}\n";
        let output = compile(source, &options("c.ts"));
        assert!(output.errors[0].starts_with("[transform] c.ts: "));
    }

    #[test]
    fn test_compile_rejects_object_union() {
        let source = "type Action = { a: number } | { b: boolean };\n";
        let output = compile(source, &options("actions.ts"));
        assert!(!output.success);
        assert!(output.generated_code.is_empty());
        assert!(output.errors[0].starts_with("[generate] actions.ts: "));
    }

    #[test]
    fn test_compile_to_writes_on_success() {
        let mut writer = MockCodeWriter::new();
        writer
            .expect_write()
            .with(
                function(|path: &Path| path == Path::new("out/vault.ak")),
                always(),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let output = compile_to(SOURCE, Path::new("out/vault.ak"), &options("vault.ts"), &writer);
        assert!(output.success);
    }

    #[test]
    fn test_compile_to_never_writes_on_failure() {
        let mut writer = MockCodeWriter::new();
        writer.expect_write().times(0);

        let output = compile_to("class {", Path::new("out.ak"), &options("bad.ts"), &writer);
        assert!(!output.success);
    }

    #[test]
    fn test_compile_to_reports_write_errors() {
        let mut writer = MockCodeWriter::new();
        writer.expect_write().returning(|path, _| {
            Err(TranspileError::Io {
                path: path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        });

        let output = compile_to(SOURCE, Path::new("ro/vault.ak"), &options("vault.ts"), &writer);
        assert!(!output.success);
        assert!(output.generated_code.is_empty());
        assert!(output.errors[0].starts_with("[write] vault.ts: "));
    }

    #[test]
    fn test_transpile_convenience() {
        let code = transpile(SOURCE).unwrap();
        assert!(code.contains("use cardano/transaction.{OutputReference, Transaction}"));
        assert!(transpile("function (").is_err());
    }
}
