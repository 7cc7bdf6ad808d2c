//! Validator manifest (`plutus.json`-style) maintenance.

use crate::transpiler::validator::Purpose;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

const DEFAULT_SCHEMA: &str = "Data";

/// Emitted validator, as reported by a successful compilation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorInfo {
    pub contract_name: String,
    pub validator_name: String,
    pub purpose: Purpose,
    /// Datum type name for purposes that carry one.
    pub datum: Option<String>,
    pub redeemer: Option<String>,
}

impl ValidatorInfo {
    pub fn title(&self) -> String {
        format!("{}.{}", self.contract_name, self.purpose)
    }

    pub fn to_entry(&self, compiled_code: &str) -> ManifestEntry {
        ManifestEntry {
            title: self.title(),
            datum: self
                .purpose
                .has_datum()
                .then(|| schema_ref(self.datum.as_deref())),
            redeemer: schema_ref(self.redeemer.as_deref()),
            compiled_code: compiled_code.to_string(),
            parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRef {
    #[serde(rename = "$ref")]
    pub reference: String,
}

fn schema_ref(name: Option<&str>) -> SchemaRef {
    SchemaRef {
        reference: format!("#/definitions/{}", name.unwrap_or(DEFAULT_SCHEMA)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum: Option<SchemaRef>,
    pub redeemer: SchemaRef,
    pub compiled_code: String,
    #[serde(default)]
    pub parameters: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub validators: Vec<ManifestEntry>,
}

impl Manifest {
    /// Read a manifest, or start an empty one when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write manifest {}", path.display()))
    }

    /// Replace the entry with the same title, or append a new one.
    pub fn upsert(&mut self, entry: ManifestEntry) {
        match self.validators.iter().position(|e| e.title == entry.title) {
            Some(index) => {
                debug!(title = %entry.title, "replacing manifest entry");
                self.validators[index] = entry;
            }
            None => {
                debug!(title = %entry.title, "adding manifest entry");
                self.validators.push(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn info(purpose: Purpose) -> ValidatorInfo {
        ValidatorInfo {
            contract_name: "vesting".to_string(),
            validator_name: "unlock".to_string(),
            purpose,
            datum: Some("VestingDatum".to_string()),
            redeemer: None,
        }
    }

    #[test]
    fn test_entry_shape() {
        let entry = info(Purpose::Spend).to_entry("validators/vesting.ak");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["title"], "vesting.spend");
        assert_eq!(json["datum"]["$ref"], "#/definitions/VestingDatum");
        assert_eq!(json["redeemer"]["$ref"], "#/definitions/Data");
        assert_eq!(json["compiledCode"], "validators/vesting.ak");
        assert_eq!(json["parameters"], serde_json::json!([]));
    }

    #[test]
    fn test_mint_entry_has_no_datum() {
        let entry = info(Purpose::Mint).to_entry("out.ak");
        assert!(entry.datum.is_none());
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("\"datum\""));
    }

    #[test]
    fn test_upsert_by_title() {
        let mut manifest = Manifest::default();
        manifest.upsert(info(Purpose::Spend).to_entry("a.ak"));
        manifest.upsert(info(Purpose::Mint).to_entry("a.ak"));
        manifest.upsert(info(Purpose::Spend).to_entry("b.ak"));

        assert_eq!(manifest.validators.len(), 2);
        assert_eq!(manifest.validators[0].compiled_code, "b.ak");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("plutus.json");

        assert_eq!(Manifest::load(&path).unwrap(), Manifest::default());

        let mut manifest = Manifest::default();
        manifest.upsert(info(Purpose::Spend).to_entry("vesting.ak"));
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }
}
