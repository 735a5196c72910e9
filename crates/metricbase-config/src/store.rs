use crate::error::{ConfigError, ConfigResult};
use crate::schema::{BlockConfig, CatalogConfig};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// In-memory collection of block and catalog configurations.
///
/// Entity and grain names are stored exactly as they appear on disk (for example `comunidade`
/// or `community`); callers decide which spellings to look up.
#[derive(Clone, Debug, Default)]
pub struct ConfigStore {
    block_configs: BTreeMap<(String, String, String), BlockConfig>,
    catalog_configs: BTreeMap<(String, String), CatalogConfig>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_block_config(
        &mut self,
        block: impl Into<String>,
        entity: impl Into<String>,
        grain: impl Into<String>,
        config: BlockConfig,
    ) -> Option<BlockConfig> {
        self.block_configs
            .insert((block.into(), entity.into(), grain.into()), config)
    }

    pub fn insert_catalog_config(
        &mut self,
        block: impl Into<String>,
        entity: impl Into<String>,
        config: CatalogConfig,
    ) -> Option<CatalogConfig> {
        self.catalog_configs
            .insert((block.into(), entity.into()), config)
    }

    pub fn block_config(&self, block: &str, entity: &str, grain: &str) -> Option<&BlockConfig> {
        self.block_configs
            .get(&(block.to_string(), entity.to_string(), grain.to_string()))
    }

    pub fn catalog_config(&self, block: &str, entity: &str) -> Option<&CatalogConfig> {
        self.catalog_configs
            .get(&(block.to_string(), entity.to_string()))
    }

    /// Every block name known to the store, sorted.
    pub fn blocks(&self) -> BTreeSet<&str> {
        self.block_configs
            .keys()
            .map(|(block, _, _)| block.as_str())
            .chain(self.catalog_configs.keys().map(|(block, _)| block.as_str()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.block_configs.is_empty() && self.catalog_configs.is_empty()
    }

    /// Load every configuration under `root`.
    ///
    /// Expected layout:
    /// - `<root>/<block>/<entity>/<grain>.json` for block-style configs
    /// - `<root>/<block>/<entity>.json` for catalog-style configs
    ///
    /// Files that do not end in `.json` are ignored.
    pub fn load_dir(root: impl AsRef<Path>) -> ConfigResult<Self> {
        let root = root.as_ref();
        let mut store = Self::new();

        for block_dir in sorted_entries(root)? {
            if !block_dir.is_dir() {
                continue;
            }
            let block = file_name(&block_dir)?;

            for entry in sorted_entries(&block_dir)? {
                if entry.is_dir() {
                    let entity = file_name(&entry)?;
                    for grain_file in sorted_entries(&entry)? {
                        let Some(grain) = json_stem(&grain_file)? else {
                            continue;
                        };
                        let config: BlockConfig = read_json(&grain_file)?;
                        log::debug!(
                            "loaded block config {block}/{entity}/{grain} ({} metrics)",
                            config.metrics.len()
                        );
                        store.insert_block_config(block.clone(), entity.clone(), grain, config);
                    }
                } else if let Some(entity) = json_stem(&entry)? {
                    let config: CatalogConfig = read_json(&entry)?;
                    log::debug!(
                        "loaded catalog config {block}/{entity} ({} metrics)",
                        config.metrics.len()
                    );
                    store.insert_catalog_config(block.clone(), entity, config);
                }
            }
        }

        Ok(store)
    }
}

fn sorted_entries(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    let io_err = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> ConfigResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Layout {
            path: path.to_path_buf(),
            reason: "name is not valid UTF-8".to_string(),
        })
}

fn json_stem(path: &Path) -> ConfigResult<Option<String>> {
    if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Ok(None);
    }
    path.file_stem()
        .and_then(|n| n.to_str())
        .map(|s| Some(s.to_string()))
        .ok_or_else(|| ConfigError::Layout {
            path: path.to_path_buf(),
            reason: "name is not valid UTF-8".to_string(),
        })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: Some(path.to_path_buf()),
        source,
    })
}
