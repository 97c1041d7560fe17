#![allow(dead_code)]

use leo_setup::testing::{MockApi, MockConnector, ScriptedPrompter};
use leo_setup::{Orchestrator, RunConfig};
use mockito::Server;
use std::path::PathBuf;
use std::sync::Arc;

pub mod test_helpers {
    use super::*;

    pub async fn setup_test_server() -> mockito::ServerGuard {
        Server::new_async().await
    }

    pub fn setup_test_logger() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    }

    /// Connection settings of the reference host, in all-defaults mode
    pub fn host_config() -> RunConfig {
        RunConfig {
            target: Some("10.0.0.5".into()),
            authtoken: Some("abc123".into()),
            brokerid: Some(42),
            alldefault: true,
            ..RunConfig::default()
        }
    }

    /// Path of the worksheet lookup for `10.0.0.5`
    pub const WORKSHEET_LOOKUP: &str = "/worksheet?f_title=10.0.0.5&f_tags_has=created-by%3Aleo";

    pub fn orchestrator(api: Arc<MockApi>, prompter: ScriptedPrompter) -> Orchestrator {
        Orchestrator::new(Arc::new(prompter), Arc::new(MockConnector::new(api)))
    }

    pub fn shipped_components_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("components")
    }
}
