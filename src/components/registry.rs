use log::{debug, info};
use std::path::{Path, PathBuf};

use super::{Component, ComponentHandle, DescriptorComponent};
use crate::config::RESERVED_KEYS;
use crate::error::{Result, SetupError};

/// File extension of component descriptors
pub const DESCRIPTOR_EXTENSION: &str = "toml";

/// Ordered set of components for a run
///
/// Discovery order is significant: it is the order of the selection menu,
/// of the prompt stage, and of the graphs on the worksheet.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    handles: Vec<ComponentHandle>,
}

impl ComponentRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a component; names must be unique and not clash with a
    /// top-level configuration key
    pub fn register(&mut self, component: Box<dyn Component>) -> Result<()> {
        if RESERVED_KEYS.contains(&component.name()) {
            return Err(SetupError::Discovery {
                path: PathBuf::from(component.name()),
                reason: format!(
                    "'{}' is a reserved configuration key and cannot name a component",
                    component.name()
                ),
            });
        }
        if self.get(component.name()).is_some() {
            return Err(SetupError::Discovery {
                path: PathBuf::from(component.name()),
                reason: format!("component '{}' is already registered", component.name()),
            });
        }
        debug!("Registered component {}", component.name());
        self.handles.push(ComponentHandle::new(component));
        Ok(())
    }

    /// Loads every descriptor in `dir`
    ///
    /// Files are taken in file name order. Any unreadable or malformed
    /// descriptor fails the whole discovery.
    pub async fn discover(dir: &Path) -> Result<Self> {
        let discovery_error = |path: &Path, reason: String| SetupError::Discovery {
            path: path.to_path_buf(),
            reason,
        };

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| discovery_error(dir, e.to_string()))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| discovery_error(dir, e.to_string()))?
        {
            let path = entry.path();
            let is_descriptor = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case(DESCRIPTOR_EXTENSION));
            if is_descriptor && entry.file_type().await.map_or(false, |t| t.is_file()) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| discovery_error(&path, "file name is not valid UTF-8".into()))?
                .to_string();
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| discovery_error(&path, e.to_string()))?;
            let component = DescriptorComponent::parse(&name, &content)
                .map_err(|e| discovery_error(&path, e.to_string()))?;
            registry
                .register(Box::new(component))
                .map_err(|e| discovery_error(&path, e.to_string()))?;
        }

        info!("Discovered {} component(s) in {}", registry.len(), dir.display());
        Ok(registry)
    }

    /// Looks a component up by name
    pub fn get(&self, name: &str) -> Option<&ComponentHandle> {
        self.handles.iter().find(|h| h.name() == name)
    }

    /// Components in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &ComponentHandle> {
        self.handles.iter()
    }

    /// Components in discovery order, mutable
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ComponentHandle> {
        self.handles.iter_mut()
    }

    /// Component names in discovery order
    pub fn names(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.name().to_string()).collect()
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no components were found
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeComponent;
    use tempfile::TempDir;

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = ComponentRegistry::new();
        assert!(registry.register(Box::new(FakeComponent::new("system"))).is_ok());
        let result = registry.register(Box::new(FakeComponent::new("system")));
        assert!(matches!(result, Err(SetupError::Discovery { .. })));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_reserved_keys() {
        let mut registry = ComponentRegistry::new();
        for name in RESERVED_KEYS {
            let result = registry.register(Box::new(FakeComponent::new(name)));
            assert!(matches!(result, Err(SetupError::Discovery { .. })), "{} accepted", name);
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_discover_rejects_descriptor_named_like_config_key() -> Result<()> {
        let temp_dir = TempDir::new()?;
        tokio::fs::write(temp_dir.path().join("target.toml"), "default = true\n").await?;

        match ComponentRegistry::discover(temp_dir.path()).await {
            Err(SetupError::Discovery { path, reason }) => {
                assert!(path.ends_with("target.toml"));
                assert!(reason.contains("reserved"));
            }
            other => panic!("expected a discovery error, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_orders_by_file_name_and_filters_extension() -> Result<()> {
        let temp_dir = TempDir::new()?;
        tokio::fs::write(temp_dir.path().join("zeta.toml"), "description = \"Zeta\"\n").await?;
        tokio::fs::write(temp_dir.path().join("alpha.toml"), "default = true\n").await?;
        tokio::fs::write(temp_dir.path().join("notes.txt"), "not a component").await?;
        tokio::fs::create_dir(temp_dir.path().join("dir.toml")).await?;

        let registry = ComponentRegistry::discover(temp_dir.path()).await?;

        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
        let alpha = registry.get("alpha").map(|h| h.component().is_default());
        assert_eq!(alpha, Some(true));
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_fails_on_malformed_descriptor() -> Result<()> {
        let temp_dir = TempDir::new()?;
        tokio::fs::write(temp_dir.path().join("good.toml"), "default = true\n").await?;
        tokio::fs::write(temp_dir.path().join("bad.toml"), "default = [").await?;

        match ComponentRegistry::discover(temp_dir.path()).await {
            Err(SetupError::Discovery { path, .. }) => assert!(path.ends_with("bad.toml")),
            other => panic!("expected discovery error, got {:?}", other.map(|r| r.names())),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_discover_missing_directory() {
        let result = ComponentRegistry::discover(Path::new("/nonexistent/leo/components")).await;
        assert!(matches!(result, Err(SetupError::Discovery { .. })));
    }
}
