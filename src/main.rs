use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use tapsight_lib::config::{self, AppConfig};
use tapsight_lib::device::adb::AdbDevice;
use tapsight_lib::device::types::CapturedFrame;
use tapsight_lib::engine::explorer::Explorer;
use tapsight_lib::engine::goal_runner::GoalRunner;
use tapsight_lib::engine::recovery::Recovery;
use tapsight_lib::errors::TapsightResult;
use tapsight_lib::executor::dispatcher::ActionExecutor;
use tapsight_lib::llm::registry::{ProviderRegistry, Role};
use tapsight_lib::report::{write_report, ExplorationReport, RunReport};
use tapsight_lib::vision::client::VisionClient;
use tapsight_lib::vision::observation::parse_observation;
use tapsight_lib::vision::prompt::ANALYZE_PROMPT;

/// Vision-guided goal runner and app explorer for mobile end-to-end tests
#[derive(Parser, Debug)]
#[command(
    name = "tapsight",
    version,
    after_help = "ENVIRONMENT VARIABLES:\n\
        TAPSIGHT_<PROVIDER>_API_KEY   API key for a configured provider\n\
        RUST_LOG                      Log filter (default: info)"
)]
struct Cli {
    /// Path to config.toml (default: next to the executable, then the working directory)
    #[arg(long, global = true, env = "TAPSIGHT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the app toward a natural-language goal
    Run {
        /// Goal in plain language, e.g. "log in as the demo user"
        #[arg(short, long)]
        goal: String,

        #[arg(long)]
        max_steps: Option<usize>,

        /// Directory for screenshots, journal and report
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Map the app's screens without a goal
    Explore {
        #[arg(long)]
        max_steps: Option<usize>,

        #[arg(long)]
        max_screens: Option<usize>,

        /// Extra avoid pattern (repeatable)
        #[arg(long)]
        avoid: Vec<String>,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Analyze a single screenshot and print the observation
    Analyze {
        image: PathBuf,

        #[arg(short, long)]
        prompt: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tapsight_lib::init_tracing("info");

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "tapsight failed");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> TapsightResult<ExitCode> {
    let mut cfg = load(cli.config.as_deref())?;
    let registry = ProviderRegistry::from_config(&cfg);

    match cli.command {
        Commands::Run { goal, max_steps, out } => {
            if let Some(n) = max_steps {
                cfg.runner.max_steps = n;
            }
            let run_dir = run_dir(&cfg, out, "run");
            let device = Arc::new(AdbDevice::new(&cfg.device, run_dir.join("screens")));
            let vision = VisionClient::for_role(&registry, Role::Vision)?;
            let recovery = Recovery::new(
                device.clone(),
                device.clone(),
                recovery_advisor(&registry),
                Duration::from_millis(cfg.runner.recovery_wait_ms),
            );
            let executor = ActionExecutor::new(device.clone(), cfg.device.scroll_distance_px, cfg.device.platform);
            let runner = GoalRunner::new(device, executor, vision, recovery, cfg.runner.clone())
                .with_journal_dir(run_dir.clone());

            let result = runner.run(&goal).await?;
            let path = write_report(&run_dir, "run-report", &RunReport::from(&result))?;
            println!(
                "{} after {} step(s), final state {}. Report: {}",
                if result.success { "Goal achieved" } else { "Goal not achieved" },
                result.steps.len(),
                result.final_state,
                path.display()
            );
            Ok(if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Explore {
            max_steps,
            max_screens,
            avoid,
            out,
        } => {
            if let Some(n) = max_steps {
                cfg.explorer.max_steps = n;
            }
            if let Some(n) = max_screens {
                cfg.explorer.max_screens = n;
            }
            cfg.explorer.avoid.extend(avoid);
            let run_dir = run_dir(&cfg, out, "explore");
            let device = Arc::new(AdbDevice::new(&cfg.device, run_dir.join("screens")));
            let vision = VisionClient::for_role(&registry, Role::Vision)?;
            let executor = ActionExecutor::new(device.clone(), cfg.device.scroll_distance_px, cfg.device.platform);
            let explorer = Explorer::new(device, executor, vision, cfg.explorer.clone()).with_journal_dir(run_dir.clone());

            let result = explorer.explore().await?;
            let path = write_report(&run_dir, "exploration-report", &ExplorationReport::from(&result))?;
            println!(
                "Explored {} screen(s), {} issue(s), coverage {}/100. Report: {}",
                result.screens.len(),
                result.issues.len(),
                result.coverage_score,
                path.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Analyze { image, prompt } => {
            let bytes = tokio::fs::read(&image).await?;
            let frame = CapturedFrame::from_image_bytes(bytes, Some(image.clone()))?;
            let vision = VisionClient::for_role(&registry, Role::Vision)?;
            let reply = vision
                .run_prompt(prompt.as_deref().unwrap_or(ANALYZE_PROMPT), Some(&frame))
                .await?;
            let observation = parse_observation(&reply);
            println!("{}", serde_json::to_string_pretty(&observation)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load(path: Option<&Path>) -> TapsightResult<AppConfig> {
    match path {
        Some(p) => config::load_config_from(p),
        None => config::load_config(),
    }
}

fn recovery_advisor(registry: &ProviderRegistry) -> Option<VisionClient> {
    match VisionClient::for_role(registry, Role::Recovery) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(error = %e, "no recovery advisor, recovery runs without advice");
            None
        }
    }
}

/// `<out or artifacts dir>/<kind>-<timestamp>`.
fn run_dir(cfg: &AppConfig, out: Option<PathBuf>, kind: &str) -> PathBuf {
    let base = out.unwrap_or_else(|| cfg.device.artifacts_dir.clone());
    base.join(format!("{kind}-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S")))
}
