use nested_blocks_engine::{
    BlockData, BlockId, BlockTypeDef, ChildBlocks, DEFAULT_NAMESPACE, DEFAULT_POLL_INTERVAL,
    GroupDef, HostCapabilities, InputSettings, Namespace, RawContent, WatchStrategy,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Block type {block_type:?} lists unknown child block type {child:?}")]
    UnknownChildBlockType { block_type: String, child: String },
}

/// A block to start the editor with. Fields are keyed by handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedBlock {
    pub id: BlockId,
    pub block_type: String,
    #[serde(default)]
    pub depth: usize,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl SeedBlock {
    /// Engine data with field handles turned into full input names under `namespace`
    pub fn to_block_data(&self, namespace: &Namespace) -> BlockData {
        let block_namespace = namespace.child(self.id);
        let content: RawContent = self
            .fields
            .iter()
            .map(|(handle, value)| {
                (block_namespace.field_name(&[handle.as_str()]), value.clone())
            })
            .collect();

        BlockData {
            enabled: self.enabled,
            collapsed: self.collapsed,
            content,
            ..BlockData::new(self.id, self.block_type.clone(), self.depth)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// 0 means unlimited
    #[serde(default)]
    pub max_blocks: usize,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_true")]
    pub mutation_observer: bool,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub block_types: Vec<BlockTypeDef>,
    #[serde(default)]
    pub groups: Vec<GroupDef>,
    #[serde(default)]
    pub blocks: Vec<SeedBlock>,
}

fn default_true() -> bool {
    true
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_log_file() -> PathBuf {
    PathBuf::from("~/.cache/nested-blocks/cli.log")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_blocks: 0,
            namespace: default_namespace(),
            poll_interval_ms: default_poll_interval_ms(),
            mutation_observer: true,
            log_file: default_log_file(),
            block_types: Vec::new(),
            groups: Vec::new(),
            blocks: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;
        config.validate()?;

        // Expand shell variables and tilde in the log path
        config.log_file = Self::expand_path(&config.log_file).unwrap_or(config.log_file);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/nested-blocks");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    pub fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }

    /// Every child block list may only name declared block types
    pub fn validate(&self) -> Result<(), ConfigError> {
        for block_type in &self.block_types {
            let ChildBlocks::Only(children) = block_type.child_blocks() else {
                continue;
            };
            for child in children {
                let declared = self.block_types.iter().any(|t| t.handle() == child);
                if !declared {
                    return Err(ConfigError::UnknownChildBlockType {
                        block_type: block_type.handle().to_string(),
                        child: child.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn watch_strategy(&self) -> WatchStrategy {
        WatchStrategy::for_host(
            HostCapabilities {
                mutation_observer: self.mutation_observer,
            },
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    /// Settings for building the engine's block input
    pub fn input_settings(&self) -> InputSettings {
        let namespace = Namespace::parse(&self.namespace);
        let blocks = self
            .blocks
            .iter()
            .map(|seed| seed.to_block_data(&namespace))
            .collect();

        InputSettings {
            namespace,
            block_types: self.block_types.clone(),
            groups: self.groups.clone(),
            blocks,
            max_blocks: self.max_blocks,
            watch: self.watch_strategy(),
        }
    }
}
