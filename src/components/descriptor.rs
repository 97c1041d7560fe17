//! Components defined by a descriptor file
//!
//! A descriptor is a TOML document:
//!
//! ```toml
//! description = "PostgreSQL statistics"
//! default = false
//!
//! [defaults]
//! port = 5432
//!
//! [[prompts]]
//! key = "port"
//! message = "PostgreSQL port"
//! kind = "integer"
//!
//! [check]
//! type = "postgres"
//! display_name = "{target} postgres"
//! metrics = ["connections"]
//!
//! [check.config]
//! dsn = "host={target} port={port}"
//!
//! [[graphs]]
//! title = "{target} postgres connections"
//! metrics = ["connections"]
//! ```
//!
//! `{name}` placeholders are filled from `target`, `brokerid` and the
//! component's own settings.

use async_trait::async_trait;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{Component, PromptContext, StageContext};
use crate::error::{Result, SetupError};
use crate::prompts::{validate, Question};
use crate::remote::{cid_id, upsert};
use crate::stages::Stage;
use crate::worksheet::WORKSHEET_TAG;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Variables every template may use
const BUILTIN_VARS: [&str; 2] = ["target", "brokerid"];

/// How a prompt is asked and how its answer is stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// Free text, stored as a string
    #[default]
    Text,
    /// Whole number, stored as a number
    Integer,
    /// Hidden text, stored as a string
    Secret,
    /// Yes/no, stored as a boolean
    Confirm,
}

/// One question a component asks
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptSpec {
    /// Settings key the answer is stored under
    pub key: String,
    /// Question text
    pub message: String,
    /// Answer offered when nothing is stored yet; a declared default also
    /// lets text and secret answers be left empty
    #[serde(default)]
    pub default: Option<Value>,
    /// Answer type
    #[serde(default)]
    pub kind: PromptKind,
}

/// The check bundle a component maintains
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckSpec {
    /// Check type, e.g. `json:nad`
    #[serde(rename = "type")]
    pub check_type: String,
    /// Display name template
    pub display_name: String,
    /// Target template
    #[serde(default = "default_check_target")]
    pub target: String,
    /// Collection period in seconds
    #[serde(default = "default_period")]
    pub period: u32,
    /// Collection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    /// Metric names collected by the check
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Check type specific configuration, values are templates
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_check_target() -> String {
    "{target}".to_string()
}

fn default_period() -> u32 {
    60
}

fn default_timeout() -> u32 {
    10
}

/// A graph over metrics of the component's check
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphSpec {
    /// Title template; also the graph's identity on the service
    pub title: String,
    /// Metrics plotted, one datapoint each
    pub metrics: Vec<String>,
}

/// Parsed descriptor file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Descriptor {
    /// Human label
    #[serde(default)]
    pub description: Option<String>,
    /// Selected unless the operator says otherwise
    #[serde(default)]
    pub default: bool,
    /// Settings seeded by the initialize stage
    #[serde(default)]
    pub defaults: Map<String, Value>,
    /// Questions asked by the prompts stage
    #[serde(default)]
    pub prompts: Vec<PromptSpec>,
    /// Check maintained by the apiCalls stage
    #[serde(default)]
    pub check: Option<CheckSpec>,
    /// Graphs maintained by the apiCalls stage
    #[serde(default)]
    pub graphs: Vec<GraphSpec>,
}

/// A component whose behavior comes from a [`Descriptor`]
#[derive(Debug, Clone)]
pub struct DescriptorComponent {
    name: String,
    descriptor: Descriptor,
}

impl DescriptorComponent {
    /// Parses and validates descriptor text for the component `name`
    pub fn parse(name: &str, content: &str) -> Result<Self> {
        let descriptor: Descriptor = toml::from_str(content)?;
        Self::new(name, descriptor)
    }

    /// Validates a descriptor
    ///
    /// Graphs need a check to plot, and every placeholder must name a
    /// builtin variable, a default or a prompt key.
    pub fn new(name: &str, descriptor: Descriptor) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(SetupError::Validation("component name is empty".into()));
        }
        if !descriptor.graphs.is_empty() && descriptor.check.is_none() {
            return Err(SetupError::Validation(format!(
                "component '{}' declares graphs but no check",
                name
            )));
        }

        let known: HashSet<&str> = BUILTIN_VARS
            .iter()
            .copied()
            .chain(descriptor.defaults.keys().map(String::as_str))
            .chain(descriptor.prompts.iter().map(|p| p.key.as_str()))
            .collect();

        for template in descriptor.templates() {
            for capture in PLACEHOLDER.captures_iter(template) {
                let var = &capture[1];
                if !known.contains(var) {
                    return Err(SetupError::Validation(format!(
                        "component '{}' uses unknown placeholder {{{}}}",
                        name, var
                    )));
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            descriptor,
        })
    }

    /// The parsed descriptor
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn vars(&self, ctx: &StageContext<'_>) -> Result<HashMap<String, String>> {
        let mut vars = HashMap::new();
        if let Some(settings) = ctx.settings() {
            for key in settings.fields.keys() {
                if let Some(value) = settings.get_str(key) {
                    vars.insert(key.clone(), value);
                }
            }
        }
        vars.insert("target".to_string(), ctx.config.target()?.to_string());
        vars.insert("brokerid".to_string(), ctx.config.brokerid()?.to_string());
        Ok(vars)
    }

    async fn upsert_check(&self, ctx: &StageContext<'_>, check: &CheckSpec, vars: &HashMap<String, String>) -> Result<Value> {
        let target = render(&check.target, vars)?;
        let config = check
            .config
            .iter()
            .map(|(k, v)| Ok((k.clone(), Value::String(render(v, vars)?))))
            .collect::<Result<Map<String, Value>>>()?;
        let metrics: Vec<Value> = check
            .metrics
            .iter()
            .map(|m| json!({"name": m, "type": "numeric", "status": "active"}))
            .collect();

        let payload = json!({
            "brokers": [format!("/broker/{}", ctx.config.brokerid()?)],
            "config": config,
            "display_name": render(&check.display_name, vars)?,
            "metrics": metrics,
            "notes": check.notes,
            "period": check.period,
            "tags": [WORKSHEET_TAG],
            "target": target,
            "timeout": check.timeout,
            "type": check.check_type,
        });

        let filters = [("f_target", target.as_str()), ("f_type", check.check_type.as_str())];
        let bundle = upsert(ctx.api, "check_bundle", &filters, &payload).await?;
        if !bundle.stale.is_empty() {
            warn!(
                "Component {}: several check bundles match target {}; updated {}, left {}",
                self.name,
                target,
                bundle.cid,
                bundle.stale.join(", ")
            );
        }
        debug!("Component {}: check bundle {}", self.name, bundle.cid);

        let check_cid = bundle
            .body
            .get("_checks")
            .and_then(|c| c.get(0))
            .and_then(Value::as_str)
            .ok_or_else(|| SetupError::Api {
                status: 200,
                message: format!("check bundle {} has no checks", bundle.cid),
            })?;
        let check_id = cid_id(check_cid);
        Ok(check_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(check_id.to_string())))
    }
}

impl Descriptor {
    fn templates(&self) -> Vec<&str> {
        let mut templates = Vec::new();
        if let Some(check) = &self.check {
            templates.push(check.display_name.as_str());
            templates.push(check.target.as_str());
            templates.extend(check.config.values().map(String::as_str));
        }
        templates.extend(self.graphs.iter().map(|g| g.title.as_str()));
        templates
    }
}

/// Replaces `{name}` placeholders with values from `vars`
pub fn render(template: &str, vars: &HashMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for capture in PLACEHOLDER.captures_iter(template) {
        let whole = capture.get(0).ok_or_else(|| SetupError::new("empty placeholder match"))?;
        let value = vars.get(&capture[1]).ok_or_else(|| {
            SetupError::Validation(format!("no value for placeholder {} in '{}'", &capture[0], template))
        })?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Component for DescriptorComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.descriptor.description.as_deref()
    }

    fn is_default(&self) -> bool {
        self.descriptor.default
    }

    fn supports(&self, stage: Stage) -> bool {
        match stage {
            Stage::Initialize => !self.descriptor.defaults.is_empty(),
            Stage::Prompts => !self.descriptor.prompts.is_empty(),
            Stage::ApiCalls => self.descriptor.check.is_some(),
            Stage::Cleanup => false,
        }
    }

    async fn initialize(&self, _ctx: &StageContext<'_>) -> Result<Map<String, Value>> {
        Ok(self.descriptor.defaults.clone())
    }

    async fn prompts(&self, ctx: &mut PromptContext<'_>) -> Result<()> {
        let alldefault = ctx.config.alldefault;

        for spec in &self.descriptor.prompts {
            let stored = ctx.settings().get_str(&spec.key);
            let offered = stored
                .clone()
                .or_else(|| spec.default.as_ref().and_then(value_to_string));

            if alldefault {
                if stored.is_some() {
                    continue;
                }
                if let Some(default) = &spec.default {
                    ctx.settings().set(&spec.key, default.clone());
                    continue;
                }
            }

            let answer = match spec.kind {
                PromptKind::Confirm => {
                    let default = offered.as_deref().map_or(false, |v| v == "true");
                    Value::Bool(ctx.prompter.confirm(&spec.message, default).await?)
                }
                PromptKind::Integer => {
                    let question = Question::new(spec.message.as_str())
                        .with_default(offered)
                        .validate(validate::integer);
                    let answer = ctx.prompter.input(question).await?;
                    let number = answer.trim().parse::<i64>().map_err(|_| {
                        SetupError::Validation(format!("'{}' is not a whole number", answer))
                    })?;
                    Value::from(number)
                }
                PromptKind::Secret | PromptKind::Text => {
                    let mut question = Question::new(spec.message.as_str()).with_default(offered);
                    if spec.kind == PromptKind::Secret {
                        question = question.secret();
                    }
                    // a declared default, even "", makes the value optional
                    if spec.default.is_some() {
                        question = question.allow_empty();
                    }
                    Value::String(ctx.prompter.input(question).await?)
                }
            };
            ctx.settings().set(&spec.key, answer);
        }
        Ok(())
    }

    async fn api_calls(&self, ctx: &StageContext<'_>) -> Result<Vec<String>> {
        let Some(check) = &self.descriptor.check else {
            return Ok(Vec::new());
        };
        let vars = self.vars(ctx)?;
        let check_id = self.upsert_check(ctx, check, &vars).await?;

        let mut graph_ids = Vec::with_capacity(self.descriptor.graphs.len());
        for graph in &self.descriptor.graphs {
            let title = render(&graph.title, &vars)?;
            let datapoints: Vec<Value> = graph
                .metrics
                .iter()
                .map(|metric| {
                    json!({
                        "axis": "l",
                        "check_id": check_id,
                        "color": null,
                        "derive": "gauge",
                        "hidden": false,
                        "metric_name": metric,
                        "metric_type": "numeric",
                        "name": metric,
                        "stack": null,
                    })
                })
                .collect();
            let payload = json!({
                "datapoints": datapoints,
                "style": "line",
                "tags": [WORKSHEET_TAG],
                "title": title,
            });

            let filters = [("f_title", title.as_str()), ("f_tags_has", WORKSHEET_TAG)];
            let result = upsert(ctx.api, "graph", &filters, &payload).await?;
            if !result.stale.is_empty() {
                warn!(
                    "Component {}: several graphs titled '{}'; updated {}, left {}",
                    self.name,
                    title,
                    result.cid,
                    result.stale.join(", ")
                );
            }
            graph_ids.push(result.cid);
        }
        Ok(graph_ids)
    }
}
