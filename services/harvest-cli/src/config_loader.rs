//! Configuration loader for the harvester
//!
//! Loads and resolves YAML definition files:
//! - Catalog definitions (catalogs/*.yaml)
//! - Indicator definitions (indicators/<name>.yaml)
//! - Collection definitions (collections/<name>.yaml)
//! - Engine settings (optional settings file)
//!
//! Supports environment variable substitution using ${VAR} syntax.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use harvester::{CatalogDefinition, CatalogEntry, CollectionDefinition, HarvestSettings};

// ============================================================================
// Catalog files (catalogs/*.yaml)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    endpoint: String,
    #[serde(default)]
    assets_endpoint: String,
    #[serde(default)]
    collections: Vec<String>,
}

/// Where definition files live.
#[derive(Debug, Clone)]
pub struct ConfigDirs {
    pub catalogs: PathBuf,
    pub collections: PathBuf,
    pub indicators: PathBuf,
}

// ============================================================================
// Loading Functions
// ============================================================================

/// Load engine settings, then apply Sentinel Hub identities from the environment.
pub fn load_settings(path: Option<&Path>) -> Result<HarvestSettings> {
    let mut settings = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {:?}", path))?;
            let expanded = expand_env_vars(&content)?;
            serde_yaml::from_str(&expanded)
                .with_context(|| format!("Failed to parse settings from {:?}", path))?
        }
        None => HarvestSettings::default(),
    };

    if let Some(instance_id) = non_empty_env("SH_INSTANCE_ID") {
        settings.sh_instance_id = Some(instance_id);
    }
    if let Some(client_id) = non_empty_env("SH_CLIENT_ID") {
        settings.sh_client_id = Some(client_id);
    }
    Ok(settings)
}

/// Load every catalog definition, optionally restricted to the given ids.
///
/// Catalog files are read in file-name order.
pub fn load_catalogs(dirs: &ConfigDirs, only: &[String]) -> Result<Vec<CatalogDefinition>> {
    let mut paths: Vec<PathBuf> = WalkDir::new(&dirs.catalogs)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| is_yaml(p))
        .collect();
    paths.sort();

    let mut definitions = Vec::new();
    for path in paths {
        let file: CatalogFile = load_yaml(&path)?;
        if !only.is_empty() && !only.contains(&file.id) {
            debug!(catalog = %file.id, "Skipping catalog not selected");
            continue;
        }

        let mut entries = Vec::with_capacity(file.collections.len());
        for name in &file.collections {
            let entry = resolve_entry(dirs, name)
                .with_context(|| format!("Failed to resolve '{}' in catalog {}", name, file.id))?;
            entries.push(entry);
        }

        definitions.push(CatalogDefinition {
            id: file.id,
            title: file.title,
            description: file.description,
            endpoint: file.endpoint,
            assets_endpoint: file.assets_endpoint,
            entries,
        });
    }

    for id in only {
        if !definitions.iter().any(|d| &d.id == id) {
            warn!(catalog = %id, "Requested catalog not found");
        }
    }
    Ok(definitions)
}

/// Resolve a catalog member: indicators first, then collections.
fn resolve_entry(dirs: &ConfigDirs, name: &str) -> Result<CatalogEntry> {
    if let Some(path) = definition_file(&dirs.indicators, name) {
        let definition = load_collection_file(dirs, &path, &mut vec![name.to_string()])?;
        if definition.collections.is_empty() {
            return Ok(CatalogEntry::Collection(definition));
        }
        let members = definition
            .collections
            .iter()
            .map(|member| load_collection(dirs, member, &mut Vec::new()))
            .collect::<Result<Vec<_>>>()?;
        return Ok(CatalogEntry::Indicator {
            definition,
            members,
        });
    }
    Ok(CatalogEntry::Collection(load_collection(
        dirs,
        name,
        &mut Vec::new(),
    )?))
}

/// Load `collections/<name>.yaml` with its subcollections resolved.
fn load_collection(
    dirs: &ConfigDirs,
    name: &str,
    stack: &mut Vec<String>,
) -> Result<CollectionDefinition> {
    anyhow::ensure!(
        !stack.iter().any(|n| n == name),
        "Subcollection cycle: {} -> {}",
        stack.join(" -> "),
        name
    );
    let path = definition_file(&dirs.collections, name)
        .with_context(|| format!("No definition file for collection '{}'", name))?;

    stack.push(name.to_string());
    let definition = load_collection_file(dirs, &path, stack);
    stack.pop();
    definition
}

fn load_collection_file(
    dirs: &ConfigDirs,
    path: &Path,
    stack: &mut Vec<String>,
) -> Result<CollectionDefinition> {
    let mut definition: CollectionDefinition = load_yaml(path)?;
    for sub in &mut definition.subcollections {
        let resolved = load_collection(dirs, &sub.collection, stack)?;
        sub.definition = Some(Box::new(resolved));
    }
    Ok(definition)
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let expanded = expand_env_vars(&content)?;
    serde_yaml::from_str(&expanded).with_context(|| format!("Failed to parse {:?}", path))
}

fn definition_file(dir: &Path, name: &str) -> Option<PathBuf> {
    ["yaml", "yml"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|p| p.is_file())
}

fn is_yaml(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        )
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ============================================================================
// Environment substitution
// ============================================================================

/// Expand ${VAR} and ${VAR:-default} references.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            let mut depth = 1;
            while depth > 0 {
                match chars.next() {
                    Some('{') => {
                        depth += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        depth -= 1;
                        if depth > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }
            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    match expr.split_once(":-") {
        Some((name, default)) => {
            Ok(non_empty_env(name.trim()).unwrap_or_else(|| default.to_string()))
        }
        None => std::env::var(expr.trim())
            .with_context(|| format!("Environment variable {} not set", expr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    fn layout() -> (TempDir, ConfigDirs) {
        let tmp = TempDir::new().unwrap();
        let dirs = ConfigDirs {
            catalogs: tmp.path().join("catalogs"),
            collections: tmp.path().join("collections"),
            indicators: tmp.path().join("indicators"),
        };
        (tmp, dirs)
    }

    #[test]
    fn test_expand_env_vars_default() {
        let expanded =
            expand_env_vars("url: ${HARVEST_TEST_SURELY_UNSET:-https://x.example.com}").unwrap();
        assert_eq!(expanded, "url: https://x.example.com");
    }

    #[test]
    fn test_expand_env_vars_missing_fails() {
        assert!(expand_env_vars("${HARVEST_TEST_SURELY_UNSET}").is_err());
        assert!(expand_env_vars("${UNCLOSED").is_err());
    }

    #[test]
    fn test_load_catalogs_resolves_indicators_first() {
        let (_tmp, dirs) = layout();
        write(
            &dirs.catalogs,
            "main.yaml",
            "id: main\ntitle: Main\nendpoint: https://catalogs.example.com/main\ncollections: [N1, plain]\n",
        );
        write(&dirs.indicators, "N1.yaml", "Name: N1\nCollections: [N1a]\n");
        write(
            &dirs.collections,
            "N1a.yaml",
            "Name: N1a\nResources:\n  - Name: Collection-only\n",
        );
        write(
            &dirs.collections,
            "plain.yaml",
            "Name: plain\nSubcollections:\n  - Collection: N1a\n",
        );

        let catalogs = load_catalogs(&dirs, &[]).unwrap();
        assert_eq!(catalogs.len(), 1);
        let entries = &catalogs[0].entries;
        assert_eq!(entries.len(), 2);

        match &entries[0] {
            CatalogEntry::Indicator { definition, members } => {
                assert_eq!(definition.name, "N1");
                assert_eq!(members[0].name, "N1a");
            }
            other => panic!("expected indicator, got {:?}", other),
        }
        match &entries[1] {
            CatalogEntry::Collection(def) => {
                let sub = def.subcollections[0].definition.as_ref().unwrap();
                assert_eq!(sub.name, "N1a");
            }
            other => panic!("expected collection, got {:?}", other),
        }
    }

    #[test]
    fn test_catalog_filter() {
        let (_tmp, dirs) = layout();
        write(&dirs.catalogs, "a.yaml", "id: a\ntitle: A\nendpoint: https://e/a\n");
        write(&dirs.catalogs, "b.yml", "id: b\ntitle: B\nendpoint: https://e/b\n");
        write(&dirs.catalogs, "notes.txt", "not a catalog");

        let all = load_catalogs(&dirs, &[]).unwrap();
        assert_eq!(all.len(), 2);

        let only_b = load_catalogs(&dirs, &["b".to_string()]).unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].id, "b");
    }

    #[test]
    fn test_unknown_endpoint_tag_names_the_file() {
        let (_tmp, dirs) = layout();
        write(
            &dirs.catalogs,
            "main.yaml",
            "id: main\ntitle: Main\nendpoint: https://e/main\ncollections: [bad]\n",
        );
        write(
            &dirs.collections,
            "bad.yaml",
            "Name: bad\nResources:\n  - Name: Carrier Pigeon\n",
        );

        let err = load_catalogs(&dirs, &[]).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("bad.yaml"));
        assert!(message.contains("'bad'"));
    }

    #[test]
    fn test_subcollection_cycle_is_rejected() {
        let (_tmp, dirs) = layout();
        write(&dirs.collections, "a.yaml", "Name: a\nSubcollections:\n  - Collection: b\n");
        write(&dirs.collections, "b.yaml", "Name: b\nSubcollections:\n  - Collection: a\n");

        let err = load_collection(&dirs, "a", &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}
