//! minimal-agent entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI flags
//!   3. Load config and apply CLI overrides
//!   4. Resolve effective log level (CLI `-v` flags > env > config)
//!   5. Init logger once
//!   6. Build the protocol registry and start the agent
//!   7. Wait for Ctrl-C
//!   8. Close the agent (node first, then telemetry)

use tracing::info;

use minimal_agent::bootstrap::logger;
use minimal_agent::node::{ProtocolRegistry, StandbyRuntime};
use minimal_agent::{Agent, config, error};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = match parse_cli_args(std::env::args().skip(1)) {
        Ok(Cli::Run(args)) => args,
        Ok(Cli::Help) => {
            print!("{USAGE}");
            return Ok(());
        }
        Err(msg) => return Err(error::AppError::Config(msg)),
    };

    let mut config = config::load(args.config_path.as_deref())?;
    if let Some(chain) = args.chain {
        config.chain = chain;
    }
    if let Some(data_dir) = args.data_dir.as_deref() {
        config.data_dir = config::expand_home(data_dir);
    }
    if args.seal {
        config.seal = true;
    }

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        chain = %config.chain,
        data_dir = %config.data_dir.display(),
        prometheus_port = config.telemetry.prometheus_port,
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let protocols = ProtocolRegistry::with_defaults();
    let mut agent = Agent::new(config, Box::new(StandbyRuntime::new()), protocols);

    if let Err(e) = agent.start().await {
        agent.close().await.ok();
        return Err(e);
    }

    if let Some(addr) = agent.telemetry_addr() {
        info!("metrics available at http://{addr}/metrics");
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| error::AppError::io("failed to listen for ctrl-c", e))?;
    info!("ctrl-c received, shutting down");

    agent.close().await
}

const USAGE: &str = "\
Usage: minimal-agent [OPTIONS]

Options:
  -h, --help                 Print help
  -f, --config <PATH>        Path to configuration file (default: config/default.toml)
      --chain <NAME|PATH>    Chain to run (well-known name or chain file)
      --data-dir <PATH>      Data directory
      --seal                 Participate in block sealing
  -v, -vv, -vvv, -vvvv       Increase logging verbosity
";

#[derive(Debug, PartialEq)]
enum Cli {
    Help,
    Run(CliArgs),
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    chain: Option<String>,
    data_dir: Option<String>,
    seal: bool,
}

fn parse_cli_args(args: impl IntoIterator<Item = String>) -> Result<Cli, String> {
    let mut parsed = CliArgs::default();
    let mut verbosity = 0u8;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str| iter.next().ok_or_else(|| format!("{flag} requires an argument"));
        match arg.as_str() {
            "--" => break,
            "-h" | "--help" => return Ok(Cli::Help),
            "-f" | "--config" => parsed.config_path = Some(value_for("-f/--config")?),
            "--chain" => parsed.chain = Some(value_for("--chain")?),
            "--data-dir" => parsed.data_dir = Some(value_for("--data-dir")?),
            "--seal" => parsed.seal = true,
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.len() > 1 && a.starts_with('-') && a[1..].chars().all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            other => return Err(format!("unknown argument '{other}' (see --help)")),
        }
    }

    // -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    parsed.log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    Ok(Cli::Run(parsed))
}
