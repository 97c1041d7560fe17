//! One worksheet per host
//!
//! The worksheet for a target is the one titled after the target and tagged
//! with [`WORKSHEET_TAG`]. Reconciliation is last-writer-wins: there is no
//! locking, so two concurrent runs against one target can race.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::components::ComponentRegistry;
use crate::config::RunConfig;
use crate::error::Result;
use crate::remote::{upsert, MonitoringApi};

/// Tag marking objects created by this tool
pub const WORKSHEET_TAG: &str = "created-by:leo";

/// A graph reference on a worksheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetGraph {
    /// Graph identifier
    pub graph: String,
}

/// Worksheet payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worksheet {
    /// Worksheet title, the target host
    pub title: String,
    /// Tags, always including [`WORKSHEET_TAG`]
    pub tags: Vec<String>,
    /// Graphs in display order
    pub graphs: Vec<WorksheetGraph>,
}

impl Worksheet {
    /// Builds the worksheet for `target` showing `graph_ids` in order
    pub fn new(target: &str, graph_ids: &[String]) -> Self {
        Self {
            title: target.to_string(),
            tags: vec![WORKSHEET_TAG.to_string()],
            graphs: graph_ids
                .iter()
                .map(|id| WorksheetGraph { graph: id.clone() })
                .collect(),
        }
    }
}

/// What reconciliation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Reconciled {
    /// No worksheet existed; a new one was created
    Created {
        /// Identifier assigned by the service
        cid: String,
    },
    /// An existing worksheet was replaced
    Updated {
        /// Identifier of the updated worksheet
        cid: String,
        /// Other matching worksheets, left alone and likely stale
        stale: Vec<String>,
    },
}

/// Graph ids of every enabled component, in discovery order
///
/// Duplicates across components are kept.
pub fn collect_graph_ids(registry: &ComponentRegistry, config: &RunConfig) -> Vec<String> {
    registry
        .iter()
        .filter(|handle| config.is_enabled(handle.name()))
        .flat_map(|handle| handle.graph_ids.iter().cloned())
        .collect()
}

/// Operator message for a target with more than one matching worksheet
pub fn stale_warning(target: &str, updated: &str, stale: &[String]) -> String {
    let all: Vec<&str> = std::iter::once(updated)
        .chain(stale.iter().map(String::as_str))
        .collect();
    format!(
        "Found {} worksheets for {}: {}. Only {} was updated; the others are likely stale and should be removed manually",
        all.len(),
        target,
        all.join(", "),
        updated
    )
}

/// Creates or updates the worksheet for `target`
///
/// The first match (in the order the service lists them) is replaced,
/// graphs and tags included. Further matches only produce a warning.
pub async fn reconcile(api: &dyn MonitoringApi, target: &str, graph_ids: &[String]) -> Result<Reconciled> {
    let worksheet = Worksheet::new(target, graph_ids);
    let payload = serde_json::to_value(&worksheet)?;
    let filters = [("f_title", target), ("f_tags_has", WORKSHEET_TAG)];

    let result = upsert(api, "worksheet", &filters, &payload).await?;

    if result.created {
        info!("Created worksheet {} for {}", result.cid, target);
        return Ok(Reconciled::Created { cid: result.cid });
    }

    info!("Updated worksheet {} for {}", result.cid, target);
    if !result.stale.is_empty() {
        warn!("{}", stale_warning(target, &result.cid, &result.stale));
    }
    Ok(Reconciled::Updated {
        cid: result.cid,
        stale: result.stale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SetupError;
    use crate::testing::{FakeComponent, MockApi};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const LOOKUP: &str = "/worksheet?f_title=10.0.0.5&f_tags_has=created-by%3Aleo";

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_creates_when_missing() -> Result<()> {
        let api = MockApi::new()
            .on_get(LOOKUP, json!([]))
            .on_post("/worksheet", json!({"_cid": "/worksheet/new"}));

        let outcome = reconcile(&api, "10.0.0.5", &ids(&["g1", "g2"])).await?;

        assert_eq!(outcome, Reconciled::Created { cid: "/worksheet/new".into() });
        let posts = api.calls_to("POST");
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].body,
            json!({
                "title": "10.0.0.5",
                "tags": ["created-by:leo"],
                "graphs": [{"graph": "g1"}, {"graph": "g2"}]
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_updates_first_and_reports_stale() -> Result<()> {
        let api = MockApi::new()
            .on_get(
                LOOKUP,
                json!([
                    {"_cid": "/worksheet/a", "graphs": [{"graph": "old"}]},
                    {"_cid": "/worksheet/b"},
                    {"_cid": "/worksheet/c"}
                ]),
            )
            .on_put("/worksheet/a", json!({"_cid": "/worksheet/a"}));

        let outcome = reconcile(&api, "10.0.0.5", &ids(&["g1"])).await?;

        assert_eq!(
            outcome,
            Reconciled::Updated {
                cid: "/worksheet/a".into(),
                stale: ids(&["/worksheet/b", "/worksheet/c"]),
            }
        );
        let puts = api.calls_to("PUT");
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].body["graphs"], json!([{"graph": "g1"}]));
        assert!(api.calls_to("POST").is_empty());
        Ok(())
    }

    #[test]
    fn test_stale_warning_names_every_worksheet() {
        let message = stale_warning("10.0.0.5", "/worksheet/a", &ids(&["/worksheet/b", "/worksheet/c"]));

        assert!(message.starts_with("Found 3 worksheets for 10.0.0.5: /worksheet/a, /worksheet/b, /worksheet/c."));
        assert!(message.contains("Only /worksheet/a was updated"));
    }

    #[tokio::test]
    async fn test_failed_create_is_an_api_error() {
        let api = MockApi::new()
            .on_get(LOOKUP, json!([]))
            .fail("POST", "/worksheet", 500, "internal error");

        let result = reconcile(&api, "10.0.0.5", &ids(&["g1"])).await;

        assert!(matches!(result, Err(SetupError::Api { status: 500, .. })));
    }

    #[test]
    fn test_collect_graph_ids_keeps_order_and_duplicates() -> Result<()> {
        let mut registry = ComponentRegistry::new();
        registry.register(Box::new(FakeComponent::new("a")))?;
        registry.register(Box::new(FakeComponent::new("b")))?;
        registry.register(Box::new(FakeComponent::new("c")))?;
        for handle in registry.iter_mut() {
            handle.graph_ids = match handle.name() {
                "a" => ids(&["g1", "g2"]),
                "b" => ids(&["g9"]),
                _ => ids(&["g2"]),
            };
        }

        let mut config = RunConfig::default();
        config.component_config("a").enabled = Some(true);
        config.component_config("b").enabled = Some(false);
        config.component_config("c").enabled = Some(true);

        assert_eq!(collect_graph_ids(&registry, &config), ids(&["g1", "g2", "g2"]));
        Ok(())
    }
}
