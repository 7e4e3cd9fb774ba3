//! OpenPF2 Engine - scenario runner entry point.
//!
//! Usage: `openpf2-engine [scenario.json]`. Without a path the built-in skirmish runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use openpf2_engine::infrastructure::{clock::SystemClock, config::EngineConfig, ports::ClockPort};
use openpf2_engine::use_cases::encounter::Scenario;

fn main() -> anyhow::Result<()> {
    // Load environment from repo root; failures are logged once tracing is up.
    let dotenv_failures = load_dotenv_from_repo_root();

    let config = EngineConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    for (path, error) in dotenv_failures {
        tracing::warn!(path = %path.display(), error = %error, "Ignoring unreadable env file");
    }

    tracing::info!(
        rescale_factor = config.initiative_rescale_factor,
        default_level = config.default_character_level,
        "Starting OpenPF2 Engine"
    );

    let scenario = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read scenario file {}", path))?;
            Scenario::from_json(&json).with_context(|| format!("Failed to parse {}", path))?
        }
        None => {
            tracing::info!("No scenario given; running the built-in skirmish");
            Scenario::builtin()
        }
    };

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
    let report = scenario.run(&config, clock)?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!(
        rounds = report.encounter.round,
        turns = report.encounter.turns.len(),
        "Scenario finished"
    );
    Ok(())
}

fn load_dotenv_from_repo_root() -> Vec<(PathBuf, dotenvy::Error)> {
    load_dotenv_from(&Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(".."))
}

fn load_dotenv_from(repo_root: &Path) -> Vec<(PathBuf, dotenvy::Error)> {
    let mut failures = Vec::new();

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            if let Err(error) = dotenvy::from_path(&path) {
                failures.push((path, error));
            }
        }
    }

    failures
}
