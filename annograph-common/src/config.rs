//! Configuration loading and root folder resolution

use crate::discourse::DiscourseData;
use crate::tier::{AnnotationType, NumberBehavior};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the storage root
pub const ROOT_ENV_VAR: &str = "ANNOGRAPH_ROOT";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Tier preset: segmentation and hierarchy settings for one tier name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    #[serde(default)]
    pub supertype: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub anchor: bool,
    #[serde(default)]
    pub token: bool,
    #[serde(default)]
    pub base: bool,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub digraphs: Vec<String>,
    #[serde(default)]
    pub morph_delimiters: Vec<String>,
    #[serde(default)]
    pub ignored_characters: String,
    #[serde(default)]
    pub number_behavior: Option<NumberBehavior>,
}

impl TierConfig {
    /// Build an empty tier from this preset
    pub fn to_annotation_type(&self) -> Result<AnnotationType> {
        let mut tier = AnnotationType::new(self.name.clone());
        if self.base {
            tier = tier.base();
        }
        if self.anchor {
            tier = tier.anchor();
        }
        if self.token {
            tier = tier.token();
        }
        if let Some(s) = &self.supertype {
            tier = tier.with_supertype(s.clone());
        }
        if let Some(s) = &self.subtype {
            tier = tier.with_subtype(s.clone());
        }
        if let Some(s) = &self.speaker {
            tier = tier.with_speaker(s.clone());
        }
        if let Some(d) = &self.delimiter {
            tier = tier.with_delimiter(d.clone());
        }
        tier = tier
            .with_digraphs(self.digraphs.iter().cloned())
            .with_morph_delimiters(self.morph_delimiters.iter().cloned())
            .with_ignored_characters(self.ignored_characters.chars());
        if let Some(b) = self.number_behavior {
            tier = tier.with_number_behavior(b);
        }
        tier.validate()?;
        Ok(tier)
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load from an explicit path, else the platform config file, else defaults.
    /// A missing file only warns.
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => load_config_file().ok(),
        };
        match path {
            Some(p) => match Self::load(&p) {
                Ok(config) => {
                    info!("Loaded configuration from {}", p.display());
                    config
                }
                Err(e) => {
                    warn!("{}; using defaults", e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    pub fn tier(&self, name: &str) -> Option<&TierConfig> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// Base-tier presets by name, used to segment text properties of the same name
    pub fn tokenizers(&self) -> Result<BTreeMap<String, AnnotationType>> {
        self.tiers
            .iter()
            .filter(|t| t.base)
            .map(|t| Ok((t.name.clone(), t.to_annotation_type()?)))
            .collect()
    }

    /// Replace the settings of every tier that has a preset, keeping its
    /// entries and speaker. Returns the number of tiers changed.
    pub fn apply_tier_presets(&self, data: &mut DiscourseData) -> Result<usize> {
        let mut applied = 0;
        let names: Vec<String> = data.names().map(str::to_string).collect();
        for name in names {
            let (Some(preset), Some(existing)) = (self.tier(&name), data.get(&name)) else {
                continue;
            };
            let mut tier = preset.to_annotation_type()?;
            if tier.speaker.is_none() {
                tier.speaker = existing.speaker.clone();
            }
            tier.add(existing.entries().to_vec(), true);
            data.insert(tier);
            applied += 1;
        }
        if applied > 0 {
            info!("Applied {} tier presets to discourse '{}'", applied, data.name);
        }
        Ok(applied)
    }
}

/// Root folder resolution priority:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config: Option<&TomlConfig>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root) = config.and_then(|c| c.root_folder.clone()) {
        return root;
    }

    // Priority 4: OS-dependent compiled default
    get_default_root_folder()
}

/// Get default configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/annograph/config.toml first, then /etc/annograph/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("annograph").join("config.toml"));
        let system_config = PathBuf::from("/etc/annograph/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let config_path = dirs::config_dir()
        .map(|d| d.join("annograph").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if config_path.exists() {
        Ok(config_path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", config_path)))
    }
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("annograph"))
        .unwrap_or_else(|| PathBuf::from("./annograph_data"))
}

/// On-disk layout of one corpus under the root folder
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusPaths {
    pub corpus_name: String,
    pub base_dir: PathBuf,
    pub log_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl CorpusPaths {
    pub fn new(root: &Path, corpus_name: &str) -> Self {
        let base_dir = root.join(corpus_name);
        Self {
            corpus_name: corpus_name.to_string(),
            log_dir: base_dir.join("logs"),
            temp_dir: base_dir.join("temp"),
            data_dir: base_dir.join("data"),
            base_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.log_dir, &self.temp_dir, &self.data_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// SQLite database holding the relational side-index
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.corpus_name))
    }

    /// Corpus state snapshot
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("variables.json")
    }
}
