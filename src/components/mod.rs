//! Monitoring integrations
//!
//! A component describes one integration (system metrics, a database, ...).
//! Components are stateless: everything a run decides about them lives in
//! the component's slot of [`RunConfig`], and the graphs they create are
//! kept on the [`ComponentHandle`] that wraps them.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::{ComponentSettings, RunConfig};
use crate::error::Result;
use crate::prompts::Prompter;
use crate::remote::MonitoringApi;
use crate::stages::Stage;

/// Module for descriptor-file components
pub mod descriptor;
/// Module for component discovery and registration
pub mod registry;

pub use descriptor::DescriptorComponent;
pub use registry::{ComponentRegistry, DESCRIPTOR_EXTENSION};

/// What a parallel stage gets to see
///
/// The configuration is shared read-only; parallel operations report their
/// results back instead of writing them.
pub struct StageContext<'a> {
    /// The run configuration
    pub config: &'a RunConfig,
    /// Authenticated API client
    pub api: &'a dyn MonitoringApi,
    /// Name of the component being run
    pub name: &'a str,
}

impl<'a> StageContext<'a> {
    /// The component's slot, if anything was stored in it
    pub fn settings(&self) -> Option<&'a ComponentSettings> {
        self.config.component(self.name)
    }
}

/// What the serial prompt stage gets to see
pub struct PromptContext<'a> {
    /// The run configuration, writable
    pub config: &'a mut RunConfig,
    /// The operator's terminal
    pub prompter: &'a dyn Prompter,
    /// Authenticated API client, for questions whose options come from the API
    pub api: &'a dyn MonitoringApi,
    /// Name of the component being run
    pub name: &'a str,
}

impl<'a> PromptContext<'a> {
    /// The component's slot, created on first access
    pub fn settings(&mut self) -> &mut ComponentSettings {
        self.config.component_config(self.name)
    }
}

/// One monitoring integration
///
/// Every lifecycle operation is optional: [`Component::supports`] says which
/// ones exist and the orchestrator skips the rest.
#[async_trait]
pub trait Component: Send + Sync {
    /// Unique name, also the key of the component's configuration slot
    fn name(&self) -> &str;

    /// Human label shown when picking components
    fn description(&self) -> Option<&str> {
        None
    }

    /// Whether the component is picked when nobody chose otherwise
    fn is_default(&self) -> bool {
        false
    }

    /// Whether the component implements `stage`
    fn supports(&self, stage: Stage) -> bool;

    /// Local setup; returns default settings to seed the slot with
    async fn initialize(&self, _ctx: &StageContext<'_>) -> Result<Map<String, Value>> {
        Ok(Map::new())
    }

    /// Asks the operator for component specific settings
    async fn prompts(&self, _ctx: &mut PromptContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Creates or updates remote objects; returns the ids of the graphs it owns
    async fn api_calls(&self, _ctx: &StageContext<'_>) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Releases local resources
    async fn cleanup(&self, _ctx: &StageContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Label for menus: the description, or the name when there is none
    fn label(&self) -> String {
        self.description().unwrap_or_else(|| self.name()).to_string()
    }
}

/// A discovered component together with what it produced this run
pub struct ComponentHandle {
    component: Box<dyn Component>,
    /// Graph ids returned by `api_calls`, empty until then
    pub graph_ids: Vec<String>,
}

impl ComponentHandle {
    /// Wraps a component
    pub fn new(component: Box<dyn Component>) -> Self {
        Self {
            component,
            graph_ids: Vec::new(),
        }
    }

    /// The wrapped component
    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// Component name
    pub fn name(&self) -> &str {
        self.component.name()
    }
}

impl std::fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("name", &self.name())
            .field("graph_ids", &self.graph_ids)
            .finish()
    }
}
