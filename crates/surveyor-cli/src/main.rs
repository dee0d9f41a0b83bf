mod config;
mod run_cmd;
mod serve_cmd;
mod status_cmd;
mod wiring;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use config::SurveyorConfig;

#[derive(Parser)]
#[command(name = "surveyor", about = "Research mission orchestration engine")]
struct Cli {
    /// Snapshot directory (overrides SURVEYOR_SESSIONS_DIR env var)
    #[arg(long, global = true)]
    sessions_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default surveyor config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Serve the mission HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Run a research mission in the foreground
    Run {
        /// Research topic
        topic: String,
        /// Caller identity recorded with the mission
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Produce and validate a plan without running it
    Plan {
        /// Research topic
        topic: String,
    },
    /// Show the status of a mission
    Status {
        /// Mission ID
        mission_id: String,
    },
    /// Print a mission snapshot as JSON
    Show {
        /// Mission ID
        mission_id: String,
        /// Step to show, e.g. 01_plan (defaults to the latest)
        #[arg(long)]
        step: Option<String>,
    },
    /// List stored missions
    List,
}

/// Execute the `surveyor init` command: write config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::default();
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  planner.model = {}", cfg.planner.model);
    println!("  capture.browser = {}", cfg.capture.browser);
    println!(
        "  sessions dir = {} (default)",
        config::default_sessions_dir().display()
    );
    println!();
    println!("Set OPENROUTER_API_KEY and SERPER_API_KEY in the environment before running missions.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
        }
        Commands::Serve { bind, port } => {
            let resolved = SurveyorConfig::resolve(cli.sessions_dir.as_deref())?;
            let controller = Arc::new(wiring::build_controller(&resolved)?);
            serve_cmd::run_serve(controller, &bind, port).await?;
        }
        Commands::Run { topic, user_id } => {
            let resolved = SurveyorConfig::resolve(cli.sessions_dir.as_deref())?;
            let controller = wiring::build_controller(&resolved)?;
            run_cmd::run_mission(&controller, &topic, user_id).await?;
        }
        Commands::Plan { topic } => {
            let resolved = SurveyorConfig::resolve(cli.sessions_dir.as_deref())?;
            let producer = wiring::build_producer(&resolved)?;
            run_cmd::run_plan(&producer, &topic).await?;
        }
        Commands::Status { mission_id } => {
            let resolved = SurveyorConfig::resolve(cli.sessions_dir.as_deref())?;
            let store = wiring::build_store(&resolved);
            status_cmd::run_status(&*store, &mission_id).await?;
        }
        Commands::Show { mission_id, step } => {
            let resolved = SurveyorConfig::resolve(cli.sessions_dir.as_deref())?;
            let store = wiring::build_store(&resolved);
            status_cmd::run_show(&*store, &mission_id, step.as_deref()).await?;
        }
        Commands::List => {
            let resolved = SurveyorConfig::resolve(cli.sessions_dir.as_deref())?;
            let store = wiring::build_store(&resolved);
            status_cmd::run_list(&*store).await?;
        }
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands};

    #[test]
    fn parses_run_with_global_sessions_dir() {
        let cli = Cli::parse_from([
            "surveyor",
            "run",
            "artisanal coffee market",
            "--user-id",
            "u-7",
            "--sessions-dir",
            "/tmp/sessions",
        ]);
        assert_eq!(
            cli.sessions_dir.as_deref(),
            Some(std::path::Path::new("/tmp/sessions"))
        );
        match cli.command {
            Commands::Run { topic, user_id } => {
                assert_eq!(topic, "artisanal coffee market");
                assert_eq!(user_id.as_deref(), Some("u-7"));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::parse_from(["surveyor", "serve"]);
        match cli.command {
            Commands::Serve { bind, port } => {
                assert_eq!(bind, "127.0.0.1");
                assert_eq!(port, 8000);
            }
            _ => panic!("expected serve command"),
        }
    }
}
