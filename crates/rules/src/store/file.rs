//! Directory-backed collection store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::schema::CollectionDefinition;

use super::error::{LoadResult, LoadStatus, Result, StoreError};
use super::CollectionStore;

/// Result of one directory scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Active definitions, one per id.
    pub definitions: Vec<CollectionDefinition>,
    /// Per-file outcome, in path order.
    pub results: Vec<LoadResult>,
}

impl ScanReport {
    pub fn failed(&self) -> impl Iterator<Item = &LoadResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
    }
}

/// Reads collection definitions from `*.yml`, `*.yaml` and `*.json` files.
///
/// The directory is scanned recursively on every fetch. Dotfiles and
/// unsupported extensions are skipped; a file that fails to parse is
/// reported but does not abort the scan. When two files declare the same
/// id, the one later in path order wins.
#[derive(Debug, Clone)]
pub struct FileCollectionStore {
    dir: PathBuf,
}

impl FileCollectionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Scan the directory tree synchronously.
    ///
    /// Fails only if the root directory itself cannot be read.
    pub fn scan(&self) -> Result<ScanReport> {
        let mut files = Vec::new();
        let mut report = ScanReport::default();
        fs::read_dir(&self.dir)?;
        collect_files(&self.dir, &mut files, &mut report.results)?;
        files.sort();

        let mut by_id: HashMap<String, usize> = HashMap::new();
        for path in files {
            match Self::load_file(&path) {
                Ok(def) if !def.is_active() => {
                    debug!(collection_id = %def.id, path = %path.display(), "skipping tombstoned collection");
                    report.results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "tombstoned".to_string(),
                        },
                    });
                }
                Ok(def) => {
                    let collection_id = def.id.clone();
                    match by_id.get(&collection_id) {
                        Some(&idx) => {
                            warn!(collection_id = %collection_id, path = %path.display(), "duplicate collection id, later file wins");
                            report.definitions[idx] = def;
                        }
                        None => {
                            by_id.insert(collection_id.clone(), report.definitions.len());
                            report.definitions.push(def);
                        }
                    }
                    report.results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { collection_id },
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load collection file");
                    report.results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(report)
    }

    /// Parse a single definition file. The format follows the extension.
    pub fn load_file(path: &Path) -> Result<CollectionDefinition> {
        let contents = fs::read_to_string(path)?;
        let def: CollectionDefinition = match extension(path) {
            Some("json") => serde_json::from_str(&contents)?,
            _ => serde_yaml::from_str(&contents)?,
        };

        if def.id.trim().is_empty() {
            return Err(StoreError::Validation(
                "collection id must not be empty".to_string(),
            ));
        }
        Ok(def)
    }
}

#[async_trait::async_trait]
impl CollectionStore for FileCollectionStore {
    async fn fetch_active(&self) -> Result<Vec<CollectionDefinition>> {
        let store = self.clone();
        let report = tokio::task::spawn_blocking(move || store.scan())
            .await
            .map_err(|e| StoreError::Unavailable(format!("scan task failed: {}", e)))??;
        info!(
            dir = %self.dir.display(),
            loaded = report.definitions.len(),
            failed = report.failed().count(),
            "scanned collection directory"
        );
        Ok(report.definitions)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Recursively gather candidate files, recording skipped ones.
fn collect_files(dir: &Path, files: &mut Vec<PathBuf>, results: &mut Vec<LoadResult>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to read directory");
            return Ok(());
        }
    };

    for entry in entries {
        let path = entry?.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }
        }

        if path.is_dir() {
            collect_files(&path, files, results)?;
            continue;
        }

        if matches!(extension(&path), Some("yml" | "yaml" | "json")) {
            files.push(path);
        } else {
            results.push(LoadResult {
                path,
                status: LoadStatus::Skipped {
                    reason: "unsupported extension".to_string(),
                },
            });
        }
    }

    Ok(())
}
