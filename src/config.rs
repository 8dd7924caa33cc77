use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};
use toml::Value;
use log::{debug, info};

use crate::bridge::BridgeKind;
use crate::codec::Codec;
use crate::location::{default_root, SharedLocation};
use crate::store::DEFAULT_EXTENSION;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "GROUPCAST_CONFIG";

/// Application group used when none is configured
pub const DEFAULT_GROUP: &str = "group.groupcast.shared";

/// Object directory used when none is configured
pub const DEFAULT_DIRECTORY: &str = "objects";

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Everything needed to open a dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct GroupcastConfig {
    /// Where objects and signals live
    pub location: SharedLocation,

    /// File extension of stored objects
    pub extension: String,

    /// Payload format; must match on every side of the exchange
    pub codec: Codec,

    /// Notification bridge implementation
    pub bridge: BridgeKind,

    /// Poll the signal directory instead of using native file events
    pub poll_interval: Option<Duration>,
}

impl Default for GroupcastConfig {
    fn default() -> Self {
        Self {
            location: SharedLocation::resolve(DEFAULT_GROUP, DEFAULT_DIRECTORY),
            extension: DEFAULT_EXTENSION.to_string(),
            codec: Codec::default(),
            bridge: BridgeKind::default(),
            poll_interval: None,
        }
    }
}

impl GroupcastConfig {
    /// Check values that would otherwise fail late, inside the store or bridge
    pub fn validate(&self) -> Result<()> {
        if self.location.group().is_empty() {
            anyhow::bail!("Application group must not be empty");
        }
        if self.location.directory().is_empty() {
            anyhow::bail!("Directory name must not be empty");
        }
        if self.extension.is_empty()
            || !self.extension.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            anyhow::bail!(
                "Invalid extension '{}': use letters, digits, '_' or '-'",
                self.extension
            );
        }
        if self.poll_interval == Some(Duration::ZERO) {
            anyhow::bail!("Poll interval must be greater than zero");
        }
        Ok(())
    }
}

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    selected_section: Option<String>,
}

impl ConfigManager {
    /// Create a new ConfigManager from a Configuration (primarily for testing)
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            selected_section: None,
        }
    }

    /// Load configuration using discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load configuration from explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!("Loaded {} configuration sections from {}", config.len(), path.display());
        Ok(Self {
            config,
            selected_section: None,
        })
    }

    /// Get value from configuration with section fallback
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        // Priority: selected_section -> specified section -> base
        if let Some(selected) = &self.selected_section {
            if let Some(value) = self.config.get(selected).and_then(|s| s.get(key)) {
                return Some(value);
            }
        }

        if let Some(value) = self.config.get(section).and_then(|s| s.get(key)) {
            return Some(value);
        }

        self.config.get("base").and_then(|s| s.get(key))
    }

    /// Select configuration section for --config-name
    pub fn select_section(&mut self, section: String) {
        debug!("Selecting configuration section: {}", section);
        self.selected_section = Some(section);
    }

    /// Get unsigned integer value with type conversion
    pub fn get_u64(&self, section: &str, key: &str) -> Result<Option<u64>> {
        match self.get_value(section, key) {
            Some(value) => value
                .parse::<u64>()
                .map(Some)
                .with_context(|| format!("Invalid number for {}.{}: {}", section, key, value)),
            None => Ok(None),
        }
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    /// Get path value with type conversion
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Build the dispatcher configuration from the `[store]` and `[bridge]`
    /// sections, falling back to defaults for anything unset
    pub fn get_groupcast_config(&self) -> Result<GroupcastConfig> {
        let defaults = GroupcastConfig::default();

        let root = self.get_path("store", "root").unwrap_or_else(default_root);
        let group = self
            .get_value("store", "group")
            .cloned()
            .unwrap_or_else(|| defaults.location.group().to_string());
        let directory = self
            .get_value("store", "directory")
            .cloned()
            .unwrap_or_else(|| defaults.location.directory().to_string());

        let extension = self
            .get_value("store", "extension")
            .cloned()
            .unwrap_or(defaults.extension);

        let codec = match self.get_value("store", "codec") {
            Some(value) => value
                .parse::<Codec>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid codec in config")?,
            None => defaults.codec,
        };

        let bridge = match self.get_value("bridge", "kind") {
            Some(value) => value
                .parse::<BridgeKind>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid bridge kind in config")?,
            None => defaults.bridge,
        };

        let poll_interval = self
            .get_u64("bridge", "poll-interval-ms")?
            .map(Duration::from_millis);

        let config = GroupcastConfig {
            location: SharedLocation::new(root, group, directory),
            extension,
            codec,
            bridge,
            poll_interval,
        };

        config
            .validate()
            .context("Groupcast configuration validation failed")?;

        Ok(config)
    }
}

/// Discover configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Environment variable $GROUPCAST_CONFIG
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }

    // 2. XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("groupcast").join("config.toml"));
    }

    // 3. Home directory
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".groupcast.toml"));
    }

    // 4. Project local
    paths.push(PathBuf::from("./.groupcast.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content to string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let toml_value: Value = content.parse()
        .context("Failed to parse TOML content")?;

    let mut config = Configuration::new();

    if let Value::Table(table) = toml_value {
        flatten_toml_table(&table, String::new(), &mut config);
    }

    Ok(config)
}

/// Flatten nested tables into `section.subsection` names
fn flatten_toml_table(table: &toml::Table, prefix: String, config: &mut Configuration) {
    for (key, value) in table {
        let section_name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Table(subtable) => {
                let (leaves, nested): (Vec<_>, Vec<_>) = subtable
                    .iter()
                    .partition(|(_, v)| !matches!(v, Value::Table(_)));

                if !leaves.is_empty() {
                    let section = config.entry(section_name.clone()).or_default();
                    for (subkey, subvalue) in leaves {
                        section.insert(subkey.clone(), toml_value_to_string(subvalue));
                    }
                }

                for (subkey, subvalue) in nested {
                    if let Value::Table(inner) = subvalue {
                        let mut wrapper = toml::Table::new();
                        wrapper.insert(subkey.clone(), Value::Table(inner.clone()));
                        flatten_toml_table(&wrapper, section_name.clone(), config);
                    }
                }
            }
            // Top-level scalars belong to [base]
            _ => {
                config
                    .entry("base".to_string())
                    .or_default()
                    .insert(key.clone(), toml_value_to_string(value));
            }
        }
    }
}

fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
    }
}
