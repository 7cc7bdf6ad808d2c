use crate::cli::args::{Cli, Commands};
use crate::cli::init_logging;
use crate::config::Config;
use crate::manifest::Manifest;
use crate::transpiler::validator::{snake_case, Purpose};
use crate::transpiler::{compile, compile_to, BuiltinRegistry, ContractParser, FsWriter, Transformer};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tera::Tera;
use tracing::{debug, info, warn};

const CONTRACT_TEMPLATE: &str = include_str!("templates/contract.ts.tera");
const SOURCE_EXTENSION: &str = "ts";
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "build", ".git"];

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.verbose {
        println!("tsaiken v{}", env!("CARGO_PKG_VERSION"));
    }

    let mut config = Config::from_env()?;
    if let Some(lines) = cli.expect_lookback {
        config.expect_lookback = lines;
    }

    match cli.command {
        Commands::Compile {
            input,
            output,
            stdout,
        } => compile_command(&config, &input, output.as_deref(), stdout, cli.verbose),
        Commands::Check {
            input,
            output_ast,
            tree,
        } => check_command(&config, &input, output_ast, tree),
        Commands::Build {
            dir,
            out_dir,
            manifest,
        } => {
            if let Some(out_dir) = out_dir {
                config.out_dir = out_dir;
            }
            if let Some(manifest) = manifest {
                config.manifest = manifest;
            }
            build_command(&config, &dir, cli.verbose)
        }
        Commands::Init {
            name,
            output,
            purpose,
        } => init_command(&name, output.as_deref(), &purpose, cli.verbose),
    }
}

fn read_source(input: &Path) -> Result<String> {
    fs::read_to_string(input).with_context(|| format!("Failed to read input file {}", input.display()))
}

fn compile_command(
    config: &Config,
    input: &Path,
    output: Option<&Path>,
    stdout: bool,
    verbose: bool,
) -> Result<()> {
    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output_path(input));
    if verbose {
        println!("🔧 Compiling {} -> {}", input.display(), output_path.display());
    }

    let source = read_source(input)?;
    let options = config.compile_options(input);
    let result = if stdout {
        compile(&source, &options)
    } else {
        compile_to(&source, &output_path, &options, &FsWriter)
    };

    if !result.success {
        for error in &result.errors {
            eprintln!("❌ {}", error);
        }
        bail!("compilation of {} failed", input.display());
    }

    if stdout {
        println!("{}", result.generated_code);
    } else {
        println!("✅ Generated {}", output_path.display());
        for validator in &result.validators {
            println!("🔐 Validator: {} ({})", validator.validator_name, validator.purpose);
        }
    }
    info!(file = %input.display(), validators = result.validators.len(), "compiled");
    Ok(())
}

fn check_command(config: &Config, input: &Path, output_ast: bool, tree: bool) -> Result<()> {
    let file_name = input.display().to_string();

    let parser = ContractParser::new(&file_name).with_expect_lookback(config.expect_lookback);
    let module = parser
        .parse_file(input)
        .map_err(|e| anyhow!("[{}] {}: {}", e.stage(), file_name, e))?;
    println!("✅ Successfully parsed {}", input.display());

    if tree {
        let syntax = parser
            .parse_syntax(&read_source(input)?)
            .map_err(|e| anyhow!("[{}] {}: {}", e.stage(), file_name, e))?;
        println!("\n--- Syntax Tree ---");
        print!("{}", syntax.to_tree_string());
    }

    if output_ast {
        println!("\n--- Module JSON ---");
        println!("{}", serde_json::to_string_pretty(&module)?);
    }

    println!("📋 Module: {}", module.name);
    println!("🧩 Types: {}", module.types.len());
    println!("📌 Constants: {}", module.constants.len());
    println!("🔧 Functions: {}", module.functions.len());
    println!("🔐 Validators: {}", module.validators().count());
    println!("🧪 Tests: {}", module.tests.len());

    let mut registry = BuiltinRegistry::new();
    Transformer::new(&mut registry)
        .transform(module)
        .map_err(|e| anyhow!("[{}] {}: {}", e.stage(), file_name, e))?;
    println!("🎉 All checks passed!");
    Ok(())
}

/// Outcome of a directory build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub compiled: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, Vec<String>)>,
    pub validators: usize,
}

/// Compile every contract below `dir` in path order and upsert the manifest.
///
/// One failing file does not stop the batch; its errors are collected in the report.
pub fn build_project(config: &Config, dir: &Path) -> Result<BuildReport> {
    let sources = discover_sources(dir)?;
    let mut manifest = Manifest::load(&config.manifest)?;
    let mut report = BuildReport::default();

    for source_path in sources {
        let source = read_source(&source_path)?;
        let output_path = config.output_path_in(dir, &source_path);
        let result = compile_to(
            &source,
            &output_path,
            &config.compile_options(&source_path),
            &FsWriter,
        );

        if !result.success {
            warn!(file = %source_path.display(), "skipping failed contract");
            report.failed.push((source_path, result.errors));
            continue;
        }

        let compiled_code = output_path.display().to_string();
        for validator in &result.validators {
            manifest.upsert(validator.to_entry(&compiled_code));
        }
        report.validators += result.validators.len();
        report.compiled.push(source_path);
    }

    manifest.save(&config.manifest)?;
    debug!(
        compiled = report.compiled.len(),
        failed = report.failed.len(),
        "build finished"
    );
    Ok(report)
}

fn build_command(config: &Config, dir: &Path, verbose: bool) -> Result<()> {
    if verbose {
        println!("🏗️ Building contracts in {}", dir.display());
    }

    let report = build_project(config, dir)?;
    for path in &report.compiled {
        println!("✅ {}", path.display());
    }
    for (path, errors) in &report.failed {
        println!("❌ {}", path.display());
        for error in errors {
            eprintln!("   {}", error);
        }
    }
    println!(
        "📦 {} contract(s), {} validator(s), manifest {}",
        report.compiled.len(),
        report.validators,
        config.manifest.display()
    );

    if !report.failed.is_empty() {
        bail!("{} contract(s) failed to compile", report.failed.len());
    }
    Ok(())
}

fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = fs::read_dir(&current)
            .with_context(|| format!("Failed to read directory {}", current.display()))?;
        for entry in entries {
            let path = entry?.path();
            let name = path.file_name().map(|n| n.to_string_lossy().to_string());
            if path.is_dir() {
                if !name.is_some_and(|n| SKIPPED_DIRS.contains(&n.as_str())) {
                    pending.push(path);
                }
            } else if path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
                && !name.is_some_and(|n| n.ends_with(".d.ts"))
            {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Render the starter contract for `name` and `purpose`.
pub fn render_contract_template(name: &str, purpose: &str) -> Result<String> {
    let purpose = Purpose::parse(purpose);
    let module = snake_case(&name.replace(['-', ' '], "_"));
    let method = match purpose {
        Purpose::Spend => "unlock",
        Purpose::Mint => "mintTokens",
        Purpose::Withdraw => "withdrawRewards",
        Purpose::Publish => "publishCertificate",
        Purpose::Other(_) => "handle",
    };

    let mut context = tera::Context::new();
    context.insert("module", &module);
    context.insert("class_name", &pascal_case(&module));
    context.insert("purpose", purpose.as_str());
    context.insert("method", method);

    Tera::one_off(CONTRACT_TEMPLATE, &context, false)
        .map_err(|e| anyhow!("Failed to render contract template: {}", e))
}

fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn init_command(name: &str, output: Option<&Path>, purpose: &str, verbose: bool) -> Result<()> {
    if verbose {
        println!("🏗️ Initializing new contract: {}", name);
    }

    let content = render_contract_template(name, purpose)?;
    let output_file = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| format!("{}.ts", snake_case(&name.replace(['-', ' '], "_"))).into());
    if output_file.exists() {
        bail!("{} already exists", output_file.display());
    }

    fs::write(&output_file, content)?;

    println!("✅ Created new contract: {}", output_file.display());
    println!("📝 Edit the file, then run `tsaiken compile {}`", output_file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::CompileOptions;

    #[test]
    fn test_templates_compile_for_every_purpose() {
        for purpose in ["spend", "mint", "withdraw", "publish"] {
            let source = render_contract_template("token-vault", purpose).unwrap();
            let output = compile(&source, &CompileOptions::default());
            assert!(output.success, "{} template: {:?}", purpose, output.errors);
            assert_eq!(output.validators.len(), 1);
            assert_eq!(output.validators[0].contract_name, "TokenVault");
        }
    }

    #[test]
    fn test_spend_template_content() {
        let source = render_contract_template("vesting", "spend").unwrap();
        assert!(source.contains("@module vesting"));
        assert!(source.contains("export interface VestingDatum {"));
        assert!(source.contains("unlock(datum: VestingDatum, redeemer: Action): boolean {"));
        assert!(source.contains("function test_vesting_starter()"));
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("token_vault"), "TokenVault");
        assert_eq!(pascal_case("vesting"), "Vesting");
    }
}
