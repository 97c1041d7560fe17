use anyhow::Context;
use clap::{error::ErrorKind, Parser};
use leo_setup::{
    config::EnvDefaults,
    logging,
    remote::{CirconusConnector, DEFAULT_API_URL},
    ui::{self, TerminalPrompter},
    Orchestrator, RunConfig, RunSummary, SetupError,
};
use log::trace;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "leo-setup", author, version, about = "Set up host monitoring checks, graphs and a worksheet", long_about = None)]
struct Cli {
    /// Host or IP of the monitored machine, as reachable by the broker
    #[arg(short, long)]
    target: Option<String>,

    /// API token; used to build the API client
    #[arg(short = 'k', long)]
    authtoken: Option<String>,

    /// Config file to read answers from and write them back to (.json or .toml)
    #[arg(short, long)]
    configfile: Option<PathBuf>,

    /// Broker the checks are placed on
    #[arg(short, long)]
    brokerid: Option<i64>,

    /// Accept defaults and only ask for what is missing
    #[arg(long)]
    alldefault: bool,

    /// Directory holding component descriptors
    #[arg(long, default_value = "components")]
    components: PathBuf,

    /// Monitoring API root
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            target: self.target.clone(),
            authtoken: self.authtoken.clone(),
            brokerid: self.brokerid,
            configfile: self.configfile.clone(),
            alldefault: self.alldefault,
            ..RunConfig::default()
        }
    }
}

/// Drives `future` on a single-threaded runtime
///
/// Prompts run on the blocking pool and a failed run can leave one waiting
/// for input; the runtime is shut down without joining them.
fn block_on_detached<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("[WARNING] {}", e);
    }

    let outcome = block_on_detached(run(cli))
        .context("Failed to start the async runtime")
        .and_then(|result| result);

    match outcome {
        Ok(summary) => {
            ui::print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            trace!("Run failed: {:?}", e);
            ui::print_error(&format!("{:#}", e));
            if e.downcast_ref::<SetupError>().map_or(false, SetupError::is_remote) {
                ui::print_error("Check the API token and --api-url");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let env = EnvDefaults::from_env().context("Failed to read environment defaults")?;
    let config = RunConfig::resolve(cli.run_config(), env)
        .await
        .context("Failed to load configuration")?;

    ui::print_banner();

    let orchestrator = Orchestrator::new(
        Arc::new(TerminalPrompter::new()),
        Arc::new(CirconusConnector::new(cli.api_url)),
    )
    .with_components_dir(cli.components);

    Ok(orchestrator.run(config).await?)
}
