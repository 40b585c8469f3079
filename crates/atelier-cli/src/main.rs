//! `atelier` binary: dry runs of the orchestration engine over the simulated roster.

mod config;

use atelier_core::{ContextMap, UnitKind};
use atelier_orchestrator::{default_roster, Orchestrator, RunRequest, Topology};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "atelier", about = "Atelier, a multi-unit media orchestration engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "atelier.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once and print the workflow result as JSON
    Run {
        /// Stage topology: sequential, parallel or hybrid
        #[arg(short, long, default_value = "hybrid")]
        topology: Topology,
        /// Free-text instruction for the units
        #[arg(short, long)]
        instruction: String,
        /// Run parameter as key=value; the value is parsed as JSON when possible
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,
        /// Publishing target (repeatable)
        #[arg(long = "target")]
        targets: Vec<String>,
    },
    /// List the unit roster
    Units,
}

fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            topology,
            instruction,
            params,
            targets,
        } => {
            let orchestrator = Orchestrator::with_units(
                config.orchestrator.clone(),
                default_roster(&config.simulation)?,
            );
            let parameters: ContextMap = params.into_iter().collect();
            let request = RunRequest::new(instruction, topology)
                .with_parameters(parameters)
                .with_targets(targets);

            info!(run_id = %request.id, %topology, "Starting dry run");
            let result = orchestrator.execute(request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Units => {
            let roster = default_roster(&config.simulation)?;
            println!("Unit roster:");
            for unit in &roster {
                let kind = unit.kind();
                let phase = format!("{:?}", kind.phase());
                println!(
                    "  {:<18} {:<16} phase={:<16} critical={:<5} concurrent={:<5} timeout={:?}",
                    kind.as_str(),
                    unit.display_name(),
                    phase,
                    kind.is_critical(),
                    unit.concurrency_safe(),
                    config.orchestrator.timeout_for(kind),
                );
            }
            println!("\nTotal: {} unit(s), terminal: {}", roster.len(), UnitKind::TERMINAL);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param_json_value() {
        assert_eq!(
            parse_param("duration=15").unwrap(),
            ("duration".to_string(), json!(15))
        );
        assert_eq!(
            parse_param("tags=[\"a\",\"b\"]").unwrap(),
            ("tags".to_string(), json!(["a", "b"]))
        );
    }

    #[test]
    fn test_parse_param_falls_back_to_string() {
        assert_eq!(
            parse_param("aspect=9:16").unwrap(),
            ("aspect".to_string(), json!("9:16"))
        );
        assert_eq!(
            parse_param("note=a=b").unwrap(),
            ("note".to_string(), json!("a=b"))
        );
    }

    #[test]
    fn test_parse_param_rejects_malformed() {
        assert!(parse_param("no-equals").is_err());
        assert!(parse_param("=value").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "atelier",
            "--log-format",
            "pretty",
            "run",
            "--topology",
            "parallel",
            "-i",
            "summer teaser",
            "-p",
            "aspect=9:16",
            "--target",
            "instagram",
            "--target",
            "tiktok",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Pretty);
        match cli.command {
            Commands::Run {
                topology,
                instruction,
                params,
                targets,
            } => {
                assert_eq!(topology, Topology::Parallel);
                assert_eq!(instruction, "summer teaser");
                assert_eq!(params.len(), 1);
                assert_eq!(targets, vec!["instagram", "tiktok"]);
            }
            Commands::Units => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_topology() {
        assert!(Cli::try_parse_from(["atelier", "run", "-t", "mesh", "-i", "x"]).is_err());
    }
}
