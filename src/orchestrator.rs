//! The provisioning pipeline
//!
//! ```text
//! load config
//!   -> gather basics || discover components
//!   -> resolve enablement
//!   -> initialize (parallel) -> prompts (serial) -> apiCalls (parallel) -> worksheet
//!   -> cleanup (parallel) || save config
//! ```
//!
//! Any failing step ends the run; later steps do not start.

use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::components::{
    Component, ComponentHandle, ComponentRegistry, PromptContext, StageContext,
};
use crate::config::RunConfig;
use crate::error::{Result, SetupError};
use crate::parallel::ParallelProcessor;
use crate::prompts::{validate, Prompter, Question};
use crate::remote::{list_brokers, ApiConnector, MonitoringApi};
use crate::stages::{join_stage, Stage};
use crate::worksheet::{collect_graph_ids, reconcile, Reconciled};

/// What a successful run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Enabled components, in discovery order
    pub components: Vec<String>,
    /// Graphs placed on the worksheet, in order
    pub graph_ids: Vec<String>,
    /// Worksheet outcome; `None` when no component was enabled
    pub worksheet: Option<Reconciled>,
    /// Where the configuration was written, if anywhere
    pub saved_to: Option<PathBuf>,
    /// Final run configuration
    #[serde(skip)]
    pub config: RunConfig,
}

/// Drives the components of one run through their lifecycle
pub struct Orchestrator {
    prompter: Arc<dyn Prompter>,
    connector: Arc<dyn ApiConnector>,
    components_dir: Option<PathBuf>,
    builtins: Vec<Box<dyn Component>>,
}

impl Orchestrator {
    /// Creates an orchestrator with no component sources
    pub fn new(prompter: Arc<dyn Prompter>, connector: Arc<dyn ApiConnector>) -> Self {
        Self {
            prompter,
            connector,
            components_dir: None,
            builtins: Vec::new(),
        }
    }

    /// Discovers descriptor components in `dir`
    pub fn with_components_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.components_dir = Some(dir.into());
        self
    }

    /// Adds an in-code component after the discovered ones
    pub fn with_component(mut self, component: Box<dyn Component>) -> Self {
        self.builtins.push(component);
        self
    }

    async fn discover(&mut self) -> Result<ComponentRegistry> {
        let mut registry = match &self.components_dir {
            Some(dir) => ComponentRegistry::discover(dir).await?,
            None => ComponentRegistry::new(),
        };
        for component in self.builtins.drain(..) {
            registry.register(component)?;
        }
        Ok(registry)
    }

    /// Runs the whole pipeline once
    pub async fn run(mut self, mut config: RunConfig) -> Result<RunSummary> {
        let prompter = Arc::clone(&self.prompter);
        let connector = Arc::clone(&self.connector);

        let (api, mut registry) = tokio::try_join!(
            gather_basics(&mut config, prompter.as_ref(), connector.as_ref()),
            self.discover(),
        )?;
        config.ensure_basics()?;
        let api = api.as_ref();

        resolve_enablement(&registry, &mut config, prompter.as_ref()).await?;
        initialize_components(&registry, &mut config, api).await?;
        prompt_components(&registry, &mut config, prompter.as_ref(), api).await?;
        apply_components(&mut registry, &config, api).await?;

        let components: Vec<String> = registry
            .iter()
            .filter(|h| config.is_enabled(h.name()))
            .map(|h| h.name().to_string())
            .collect();
        let graph_ids = collect_graph_ids(&registry, &config);
        let worksheet = if components.is_empty() {
            info!("No components enabled, leaving worksheets alone");
            None
        } else {
            Some(reconcile(api, config.target()?, &graph_ids).await?)
        };

        let ((), saved_to) = tokio::try_join!(
            cleanup_components(&registry, &config, api),
            config.save(),
        )?;

        Ok(RunSummary {
            components,
            graph_ids,
            worksheet,
            saved_to,
            config,
        })
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Asks for the connection settings and connects to the API
///
/// In all-defaults mode only missing or blank values are asked for. The API
/// client is built from the token before the broker list is fetched from it.
pub async fn gather_basics(
    config: &mut RunConfig,
    prompter: &dyn Prompter,
    connector: &dyn ApiConnector,
) -> Result<Arc<dyn MonitoringApi>> {
    if !config.alldefault || is_blank(config.target.as_deref()) {
        let question = Question::new("Target host or IP, as reachable by the broker")
            .with_default(config.target.clone())
            .validate(validate::non_empty);
        config.target = Some(prompter.input(question).await?.trim().to_string());
    }

    if !config.alldefault || is_blank(config.authtoken.as_deref()) {
        let question = Question::new("API token")
            .with_default(config.authtoken.clone())
            .secret()
            .validate(validate::non_empty);
        config.authtoken = Some(prompter.input(question).await?.trim().to_string());
    }

    let authtoken = config
        .authtoken
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| SetupError::Validation("authtoken is required".into()))?;
    let api = connector.connect(authtoken)?;

    if !config.alldefault || config.brokerid.is_none() {
        config.brokerid = Some(choose_broker(api.as_ref(), prompter, config.brokerid).await?);
    }

    Ok(api)
}

async fn choose_broker(api: &dyn MonitoringApi, prompter: &dyn Prompter, current: Option<i64>) -> Result<i64> {
    let (brokers, unusable): (Vec<_>, Vec<_>) = list_brokers(api)
        .await?
        .into_iter()
        .partition(|b| b.id.is_some());
    for broker in &unusable {
        debug!("Ignoring broker {} with non-numeric id", broker.cid);
    }

    if brokers.is_empty() {
        let question = Question::new("Broker id")
            .with_default(current.map(|id| id.to_string()))
            .validate(validate::integer);
        let answer = prompter.input(question).await?;
        return answer
            .trim()
            .parse::<i64>()
            .map_err(|_| SetupError::Validation(format!("'{}' is not a broker id", answer)));
    }

    let items: Vec<String> = brokers
        .iter()
        .map(|b| format!("{} ({})", b.name, b.cid))
        .collect();
    let default = current
        .and_then(|id| brokers.iter().position(|b| b.id == Some(id)))
        .unwrap_or(0);
    let index = prompter.select("Broker", &items, default).await?;

    brokers
        .get(index)
        .and_then(|b| b.id)
        .ok_or_else(|| SetupError::Validation(format!("no broker at position {}", index)))
}

/// Decides which components take part in the run
///
/// All-defaults mode copies each component's default flag, unless a config
/// file was loaded: then the loaded flags stand and only components the file
/// did not mention get their default. Otherwise the operator picks from a
/// list pre-checked with the current flags.
pub async fn resolve_enablement(
    registry: &ComponentRegistry,
    config: &mut RunConfig,
    prompter: &dyn Prompter,
) -> Result<()> {
    if config.alldefault {
        let configread = config.configread;
        for handle in registry.iter() {
            let is_default = handle.component().is_default();
            let slot = config.component_config(handle.name());
            if !configread || slot.enabled.is_none() {
                slot.enabled = Some(is_default);
            }
        }
        return Ok(());
    }

    if registry.is_empty() {
        return Ok(());
    }

    let items: Vec<String> = registry.iter().map(|h| h.component().label()).collect();
    let checked: Vec<bool> = registry
        .iter()
        .map(|h| {
            config
                .component(h.name())
                .and_then(|c| c.enabled)
                .unwrap_or_else(|| h.component().is_default())
        })
        .collect();

    let selected = prompter
        .multi_select("Components to set up", &items, &checked)
        .await?;
    if selected.len() != registry.len() {
        return Err(SetupError::Prompt(format!(
            "expected {} selections, got {}",
            registry.len(),
            selected.len()
        )));
    }

    for (handle, enabled) in registry.iter().zip(selected) {
        config.component_config(handle.name()).enabled = Some(enabled);
    }
    Ok(())
}

/// Enabled components implementing `stage`, in discovery order
fn participants<'a>(registry: &'a ComponentRegistry, config: &RunConfig, stage: Stage) -> Vec<&'a ComponentHandle> {
    let handles: Vec<&ComponentHandle> = registry
        .iter()
        .filter(|handle| {
            if !config.is_enabled(handle.name()) {
                debug!("Skipping {} for {}: not enabled", stage, handle.name());
                false
            } else if !handle.component().supports(stage) {
                debug!("Skipping {} for {}: not implemented", stage, handle.name());
                false
            } else {
                true
            }
        })
        .collect();
    debug!(
        "{} stage: {} participant(s), {}",
        stage,
        handles.len(),
        if stage.is_parallel() { "concurrent" } else { "one at a time" }
    );
    handles
}

/// Runs `initialize` on every participant concurrently
///
/// Returned defaults are merged afterwards in discovery order, never
/// overwriting a value that is already set.
pub async fn initialize_components(
    registry: &ComponentRegistry,
    config: &mut RunConfig,
    api: &dyn MonitoringApi,
) -> Result<()> {
    let results = {
        let shared: &RunConfig = config;
        let tasks: Vec<_> = participants(registry, shared, Stage::Initialize)
            .into_iter()
            .map(|handle| async move {
                let ctx = StageContext { config: shared, api, name: handle.name() };
                (handle.name().to_string(), handle.component().initialize(&ctx).await)
            })
            .collect();
        info!("Initializing {} component(s)", tasks.len());
        ParallelProcessor::new(tasks.len()).process(tasks).await
    };

    for (name, defaults) in join_stage(Stage::Initialize, results)? {
        config.component_config(&name).merge_defaults(defaults);
    }
    Ok(())
}

/// Runs `prompts` one component at a time, in discovery order
pub async fn prompt_components(
    registry: &ComponentRegistry,
    config: &mut RunConfig,
    prompter: &dyn Prompter,
    api: &dyn MonitoringApi,
) -> Result<()> {
    for handle in participants(registry, config, Stage::Prompts) {
        debug!("Prompting for {}", handle.name());
        let mut ctx = PromptContext {
            config: &mut *config,
            prompter,
            api,
            name: handle.name(),
        };
        handle
            .component()
            .prompts(&mut ctx)
            .await
            .map_err(|e| e.in_stage(Stage::Prompts, handle.name()))?;
    }
    Ok(())
}

/// Runs `api_calls` on every participant concurrently and stores the graph ids
pub async fn apply_components(
    registry: &mut ComponentRegistry,
    config: &RunConfig,
    api: &dyn MonitoringApi,
) -> Result<()> {
    let results = {
        let tasks: Vec<_> = participants(registry, config, Stage::ApiCalls)
            .into_iter()
            .map(|handle| async move {
                let ctx = StageContext { config, api, name: handle.name() };
                (handle.name().to_string(), handle.component().api_calls(&ctx).await)
            })
            .collect();
        info!("Applying {} component(s)", tasks.len());
        ParallelProcessor::new(tasks.len()).process(tasks).await
    };

    let mut produced: HashMap<String, Vec<String>> =
        join_stage(Stage::ApiCalls, results)?.into_iter().collect();
    for handle in registry.iter_mut() {
        if let Some(graph_ids) = produced.remove(handle.name()) {
            debug!("{} produced {} graph(s)", handle.name(), graph_ids.len());
            handle.graph_ids = graph_ids;
        }
    }
    Ok(())
}

/// Runs `cleanup` on every participant concurrently
pub async fn cleanup_components(
    registry: &ComponentRegistry,
    config: &RunConfig,
    api: &dyn MonitoringApi,
) -> Result<()> {
    let tasks: Vec<_> = participants(registry, config, Stage::Cleanup)
        .into_iter()
        .map(|handle| async move {
            let ctx = StageContext { config, api, name: handle.name() };
            (handle.name().to_string(), handle.component().cleanup(&ctx).await)
        })
        .collect();
    let results = ParallelProcessor::new(tasks.len()).process(tasks).await;
    join_stage(Stage::Cleanup, results).map(|_| ())
}
