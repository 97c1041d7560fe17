#![warn(missing_docs)]
#![warn(clippy::all)]

//! Leo setup - provisions host monitoring through the Circonus API
//!
//! The tool asks an operator for connection details, lets them pick
//! monitoring components (system metrics, databases, ...), and then creates
//! or updates each component's check and graphs before gathering every graph
//! onto a single worksheet named after the host.
//!
//! ## Pipeline
//! - Gather the target, API token and broker while discovering components
//! - Resolve which components are enabled
//! - Run the component lifecycle: initialize, prompts, apiCalls, cleanup
//! - Create or update the host's worksheet
//! - Save the answers for the next run
//!
//! ## Usage
//! ```rust,ignore
//! use leo_setup::{Orchestrator, RunConfig};
//! use leo_setup::remote::CirconusConnector;
//! use leo_setup::ui::TerminalPrompter;
//! use std::sync::Arc;
//!
//! async fn example(config: RunConfig) -> leo_setup::Result<()> {
//!     let summary = Orchestrator::new(
//!         Arc::new(TerminalPrompter::new()),
//!         Arc::new(CirconusConnector::default()),
//!     )
//!     .with_components_dir("components")
//!     .run(config)
//!     .await?;
//!     println!("worksheet: {:?}", summary.worksheet);
//!     Ok(())
//! }
//! ```

/// Monitoring components and their discovery
pub mod components;
/// Run configuration and its persistence
pub mod config;
/// Error handling types and utilities
pub mod error;
/// Logging configuration and utilities
pub mod logging;
/// The provisioning pipeline
pub mod orchestrator;
/// Concurrent execution of stage tasks
pub mod parallel;
/// Operator prompt interface
pub mod prompts;
/// Monitoring API client
pub mod remote;
/// Component lifecycle stages
pub mod stages;
/// Test doubles
pub mod testing;
/// Terminal prompts and output
pub mod ui;
/// Worksheet reconciliation
pub mod worksheet;

// Re-export common types
pub use components::{Component, ComponentRegistry};
pub use config::{ComponentSettings, RunConfig};
pub use error::{Result, SetupError};
pub use orchestrator::{Orchestrator, RunSummary};
pub use stages::Stage;
pub use worksheet::{Reconciled, Worksheet, WORKSHEET_TAG};
