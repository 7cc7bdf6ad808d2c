use crate::transpiler::parser::DEFAULT_EXPECT_LOOKBACK;
use crate::transpiler::CompileOptions;
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

pub const OUT_DIR_VAR: &str = "TSAIKEN_OUT_DIR";
pub const MANIFEST_VAR: &str = "TSAIKEN_MANIFEST";
pub const EXPECT_LOOKBACK_VAR: &str = "TSAIKEN_EXPECT_LOOKBACK";

/// Tool settings; environment first, CLI flags override.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub out_dir: PathBuf,
    pub manifest: PathBuf,
    pub expect_lookback: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("validators"),
            manifest: PathBuf::from("plutus.json"),
            expect_lookback: DEFAULT_EXPECT_LOOKBACK,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup(OUT_DIR_VAR) {
            config.out_dir = PathBuf::from(dir);
        }
        if let Some(manifest) = lookup(MANIFEST_VAR) {
            config.manifest = PathBuf::from(manifest);
        }
        if let Some(lookback) = lookup(EXPECT_LOOKBACK_VAR) {
            config.expect_lookback = lookback
                .trim()
                .parse()
                .with_context(|| format!("{} must be a line count, got {:?}", EXPECT_LOOKBACK_VAR, lookback))?;
        }
        Ok(config)
    }

    pub fn compile_options(&self, file: &Path) -> CompileOptions {
        CompileOptions {
            file_name: file.display().to_string(),
            expect_lookback: self.expect_lookback,
        }
    }

    /// Output path for a source file: `<out_dir>/<stem>.ak`.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "main".to_string());
        self.out_dir.join(format!("{}.ak", stem))
    }

    /// Output path for a source found under `root`, keeping its subdirectories:
    /// `<root>/a/vesting.ts` becomes `<out_dir>/a/vesting.ak`.
    pub fn output_path_in(&self, root: &Path, source: &Path) -> PathBuf {
        match source.strip_prefix(root).ok().and_then(Path::parent) {
            Some(relative) => self
                .output_path(source)
                .file_name()
                .map(|name| self.out_dir.join(relative).join(name))
                .unwrap_or_else(|| self.output_path(source)),
            None => self.output_path(source),
        }
    }
}
