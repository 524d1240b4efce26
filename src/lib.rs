pub mod config;
pub mod models;
pub mod db;
pub mod triage; // Classification worker + priority policy
pub mod notify;
pub mod report;
pub mod orchestrator;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use orchestrator::{Intent, IntentResponse, Orchestrator, OrchestratorError};

/// Command-line arguments for the intent loop.
#[derive(Parser, Debug)]
#[command(name = "pulmo")]
#[command(about = "Chest X-ray triage: one JSON intent per stdin line, one JSON response per stdout line")]
#[command(version)]
pub struct Cli {
    /// Insert the demo patients, diagnoses and history before reading intents
    #[arg(long)]
    pub seed: bool,

    /// Data root holding the database, reports and notification queues
    #[arg(long, env = "PULMO_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Classification model artifact (ONNX)
    #[arg(long, env = "PULMO_MODEL_PATH")]
    pub model_path: Option<PathBuf>,
}

impl Cli {
    /// Environment configuration with the command-line overrides applied.
    pub fn config(&self) -> config::TriageConfig {
        let mut config = match &self.data_dir {
            Some(dir) => config::TriageConfig::from_env_in(dir),
            None => config::TriageConfig::from_env(),
        };
        if let Some(path) = &self.model_path {
            config.model_path = path.clone();
        }
        config
    }
}

/// Install the global subscriber. Logs go to stderr; stdout carries responses.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Parse one input line into an intent and run it.
pub fn handle_line(orchestrator: &Orchestrator, line: &str) -> IntentResponse {
    match serde_json::from_str::<Intent>(line) {
        Ok(intent) => orchestrator.handle(intent),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed intent");
            IntentResponse::rejected(OrchestratorError::invalid_input(format!(
                "Malformed intent: {e}"
            )))
        }
    }
}

/// Line-oriented intent loop: one JSON intent per stdin line, one JSON
/// response per stdout line. `--seed` inserts the demo data first.
pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = cli.config();

    let orchestrator = match Orchestrator::from_config(&config) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(kind = %e.kind, message = %e.message, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    if !config.is_model_available() {
        tracing::warn!(
            model_path = %config.model_path.display(),
            "Model artifact not found; analyze_image will report ModelUnavailable"
        );
    }

    if cli.seed {
        if let Err(e) = orchestrator.store().seed_demo_data() {
            tracing::error!(error = %e, "Seeding demo data failed");
            return ExitCode::FAILURE;
        }
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                return ExitCode::FAILURE;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(&orchestrator, &line);
        let written = serde_json::to_string(&response)
            .map_err(std::io::Error::other)
            .and_then(|json| writeln!(stdout, "{json}"))
            .and_then(|_| stdout.flush());
        if let Err(e) = written {
            tracing::error!(error = %e, "stdout write failed");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
