mod env_manager;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SetupError};

pub use env_manager::{EnvDefaults, AUTHTOKEN_VAR, BROKERID_VAR, TARGET_VAR};

/// Top-level keys of a saved configuration
///
/// Component sections share the namespace, so no component may use one of
/// these as its name.
pub const RESERVED_KEYS: [&str; 5] = ["target", "authtoken", "brokerid", "configfile", "alldefault"];

/// Per-component slot inside the run configuration
///
/// Holds the enablement flag and whatever answers or defaults the component
/// stored. Keys other than `enabled` are owned by the component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSettings {
    /// Whether the component takes part in this run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Component specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ComponentSettings {
    /// Returns a field as a string, rendering numbers and booleans
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Stores a field, replacing any previous value
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// Stores every entry of `defaults` whose key is not present yet
    pub fn merge_defaults(&mut self, defaults: Map<String, Value>) {
        for (key, value) in defaults {
            self.fields.entry(key).or_insert(value);
        }
    }
}

/// Operator inputs and component settings for a single run
///
/// One orchestrator owns one `RunConfig`. Parallel stages only ever see it
/// through a shared reference; mutation happens in serial code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Host or IP the broker reaches the agent on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// API token used to build the API client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authtoken: Option<String>,
    /// Broker the checks are placed on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brokerid: Option<i64>,
    /// Where this configuration is read from and written back to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configfile: Option<PathBuf>,
    /// Accept defaults instead of asking
    #[serde(default)]
    pub alldefault: bool,
    /// True when a prior config file was loaded for this run
    #[serde(skip)]
    pub configread: bool,
    /// Component sections keyed by component name
    #[serde(flatten)]
    pub components: BTreeMap<String, ComponentSettings>,
}

/// Serialization format for a config file, picked from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

impl RunConfig {
    /// Loads a configuration file
    ///
    /// `.toml` files are parsed as TOML, anything else as JSON. The returned
    /// configuration has `configread` set and `configfile` pointing at `path`.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SetupError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let mut config: RunConfig = match FileFormat::for_path(path) {
            FileFormat::Toml => toml::from_str(&content)?,
            FileFormat::Json => serde_json::from_str(&content)?,
        };
        config.configread = true;
        config.configfile = Some(path.to_path_buf());
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration to `configfile`, if one is set
    ///
    /// Returns the path written, or `None` when there is nowhere to save.
    pub async fn save(&self) -> Result<Option<PathBuf>> {
        match &self.configfile {
            Some(path) => {
                self.save_to(path).await?;
                Ok(Some(path.clone()))
            }
            None => Ok(None),
        }
    }

    /// Writes the configuration to an explicit path
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let content = match FileFormat::for_path(path) {
            FileFormat::Toml => toml::to_string_pretty(self)?,
            FileFormat::Json => serde_json::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Builds the run configuration from command line values
    ///
    /// When `cli.configfile` names an existing file it is loaded first and
    /// its values act as defaults; explicit command line values win. A
    /// missing file is not an error, it will be created when the run ends.
    /// Environment defaults fill whatever is still unset.
    pub async fn resolve(cli: RunConfig, env: EnvDefaults) -> Result<Self> {
        let mut config = match &cli.configfile {
            Some(path) if tokio::fs::try_exists(path).await? => Self::load(path).await?,
            Some(path) => {
                debug!("Config file {} does not exist yet", path.display());
                Self {
                    configfile: Some(path.clone()),
                    ..Self::default()
                }
            }
            None => Self::default(),
        };

        if cli.target.is_some() {
            config.target = cli.target;
        }
        if cli.authtoken.is_some() {
            config.authtoken = cli.authtoken;
        }
        if cli.brokerid.is_some() {
            config.brokerid = cli.brokerid;
        }
        config.alldefault |= cli.alldefault;

        config.target = config.target.or(env.target);
        config.authtoken = config.authtoken.or(env.authtoken);
        config.brokerid = config.brokerid.or(env.brokerid);

        Ok(config)
    }

    /// Returns a component's slot, creating it on first access
    pub fn component_config(&mut self, name: &str) -> &mut ComponentSettings {
        self.components.entry(name.to_string()).or_default()
    }

    /// Returns a component's slot if it exists
    pub fn component(&self, name: &str) -> Option<&ComponentSettings> {
        self.components.get(name)
    }

    /// Whether the named component is enabled for this run
    pub fn is_enabled(&self, name: &str) -> bool {
        self.component(name)
            .and_then(|c| c.enabled)
            .unwrap_or(false)
    }

    /// Validates the mandatory connection settings
    ///
    /// Must pass before any component talks to the API.
    pub fn ensure_basics(&self) -> Result<()> {
        match self.target.as_deref() {
            Some(t) if !t.trim().is_empty() => {}
            _ => return Err(SetupError::Validation("target is required".into())),
        }
        match self.authtoken.as_deref() {
            Some(t) if !t.trim().is_empty() => {}
            _ => return Err(SetupError::Validation("authtoken is required".into())),
        }
        if self.brokerid.is_none() {
            return Err(SetupError::Validation("brokerid is required".into()));
        }
        Ok(())
    }

    /// The validated target host
    pub fn target(&self) -> Result<&str> {
        self.target
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SetupError::Validation("target is required".into()))
    }

    /// The validated broker id
    pub fn brokerid(&self) -> Result<i64> {
        self.brokerid
            .ok_or_else(|| SetupError::Validation("brokerid is required".into()))
    }
}
