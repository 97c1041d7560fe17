//! Monitoring API access
//!
//! Everything that talks to the remote service goes through [`MonitoringApi`].
//! The orchestrator never sees HTTP; it gets a client from an
//! [`ApiConnector`] once the operator has supplied an API token.

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Result, SetupError};

/// Module for the HTTP client implementation
pub mod client;

pub use client::{CirconusClient, CirconusConnector, DEFAULT_API_URL, DEFAULT_APP_NAME};

/// A decoded response from the monitoring API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded JSON body, `Null` when the body was empty
    pub body: Value,
}

/// Authenticated access to the monitoring API
///
/// Implementations return `SetupError::Api` for any non-2xx status and
/// `SetupError::Http` for transport failures, so a returned response is
/// always a success.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    /// Issues a GET request for `path` (relative to the API root, may carry a query)
    async fn get(&self, path: &str) -> Result<ApiResponse>;
    /// Issues a POST request with a JSON body
    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse>;
    /// Issues a PUT request with a JSON body
    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse>;
}

/// Builds an API client from an API token
pub trait ApiConnector: Send + Sync {
    /// Creates a client authenticated with `authtoken`
    fn connect(&self, authtoken: &str) -> Result<Arc<dyn MonitoringApi>>;
}

/// A broker record from `GET /broker`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Broker {
    /// Resource path such as `/broker/1234`
    pub cid: String,
    /// Display name
    pub name: String,
    /// Numeric id parsed from `cid`, if it is numeric
    pub id: Option<i64>,
}

/// Builds `/<collection>?k=v&...` with form-encoded filter values
pub fn query_path(collection: &str, filters: &[(&str, &str)]) -> String {
    if filters.is_empty() {
        return format!("/{}", collection);
    }
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(filters.iter())
        .finish();
    format!("/{}?{}", collection, query)
}

/// Extracts the trailing identifier of a resource path
///
/// `/worksheet/abc` yields `abc`; a bare identifier is returned unchanged.
pub fn cid_id(cid: &str) -> &str {
    cid.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(cid)
}

/// Reads the `_cid` field of an API object
pub fn object_cid(object: &Value) -> Result<String> {
    object
        .get("_cid")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SetupError::Api {
            status: 200,
            message: format!("response object has no _cid: {}", object),
        })
}

/// Outcome of a create-or-update call
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    /// Resource path of the created or updated object
    pub cid: String,
    /// Whether a new object was created
    pub created: bool,
    /// Other objects that matched the lookup and were left untouched
    pub stale: Vec<String>,
    /// Object as returned by the service
    pub body: Value,
}

/// Creates or updates the object of `collection` identified by `filters`
///
/// Looks the object up with a filtered GET. No match creates it with a POST;
/// otherwise the first match (in the order the service returned them) is
/// replaced with a PUT and the remaining matches are reported as stale.
pub async fn upsert(
    api: &dyn MonitoringApi,
    collection: &str,
    filters: &[(&str, &str)],
    payload: &Value,
) -> Result<Upserted> {
    let existing = api.get(&query_path(collection, filters)).await?;
    let matches = match existing.body {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(SetupError::Api {
                status: existing.status,
                message: format!("expected a list of {} objects, got {}", collection, other),
            })
        }
    };

    let cids = matches
        .iter()
        .map(object_cid)
        .collect::<Result<Vec<_>>>()?;

    match cids.split_first() {
        None => {
            debug!("No existing {} matches {:?}, creating", collection, filters);
            let response = api.post(&format!("/{}", collection), payload).await?;
            Ok(Upserted {
                cid: object_cid(&response.body)?,
                created: true,
                stale: Vec::new(),
                body: response.body,
            })
        }
        Some((first, rest)) => {
            debug!("Updating existing {} {}", collection, first);
            let path = format!("/{}/{}", collection, cid_id(first));
            let response = api.put(&path, payload).await?;
            let cid = object_cid(&response.body).unwrap_or_else(|_| first.clone());
            Ok(Upserted {
                cid,
                created: false,
                stale: rest.to_vec(),
                body: response.body,
            })
        }
    }
}

/// Fetches the brokers available to the account
pub async fn list_brokers(api: &dyn MonitoringApi) -> Result<Vec<Broker>> {
    let response = api.get("/broker").await?;
    let items = response.body.as_array().cloned().unwrap_or_default();

    items
        .iter()
        .map(|item| {
            let cid = object_cid(item)?;
            let name = item
                .get("_name")
                .and_then(Value::as_str)
                .unwrap_or_else(|| cid_id(&cid))
                .to_string();
            let id = cid_id(&cid).parse::<i64>().ok();
            Ok(Broker { cid, name, id })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;
    use serde_json::json;

    #[test]
    fn test_query_path_encodes_filters() {
        assert_eq!(query_path("broker", &[]), "/broker");
        assert_eq!(
            query_path("worksheet", &[("f_title", "10.0.0.5"), ("f_tags_has", "created-by:leo")]),
            "/worksheet?f_title=10.0.0.5&f_tags_has=created-by%3Aleo"
        );
    }

    #[test]
    fn test_cid_id() {
        assert_eq!(cid_id("/worksheet/abc"), "abc");
        assert_eq!(cid_id("/broker/42/"), "42");
        assert_eq!(cid_id("g1"), "g1");
    }

    #[tokio::test]
    async fn test_upsert_creates_when_nothing_matches() -> Result<()> {
        let api = MockApi::new()
            .on_get("/graph?f_title=cpu", json!([]))
            .on_post("/graph", json!({"_cid": "/graph/new"}));

        let result = upsert(&api, "graph", &[("f_title", "cpu")], &json!({"title": "cpu"})).await?;
        assert!(result.created);
        assert_eq!(result.cid, "/graph/new");
        assert_eq!(api.calls_to("POST").len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_updates_first_match() -> Result<()> {
        let api = MockApi::new()
            .on_get(
                "/graph?f_title=cpu",
                json!([{"_cid": "/graph/a"}, {"_cid": "/graph/b"}]),
            )
            .on_put("/graph/a", json!({"_cid": "/graph/a"}));

        let result = upsert(&api, "graph", &[("f_title", "cpu")], &json!({"title": "cpu"})).await?;
        assert!(!result.created);
        assert_eq!(result.cid, "/graph/a");
        assert_eq!(result.stale, vec!["/graph/b".to_string()]);
        assert!(api.calls_to("POST").is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_brokers() -> Result<()> {
        let api = MockApi::new().on_get(
            "/broker",
            json!([
                {"_cid": "/broker/1", "_name": "Ashburn"},
                {"_cid": "/broker/enterprise", "_name": "On-prem"}
            ]),
        );
        let brokers = list_brokers(&api).await?;
        assert_eq!(brokers.len(), 2);
        assert_eq!(brokers[0].id, Some(1));
        assert_eq!(brokers[0].name, "Ashburn");
        assert_eq!(brokers[1].id, None);
        Ok(())
    }
}
