//! coin-rl
//!
//! Drives the coin game as an RL environment:
//! - `run`: random agent over a number of episodes
//! - `serve`: JSON-lines environment server on stdio
//! - `spaces`: print the observation and action spaces as JSON

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use coin_bridge::EndpointConnector;
use coin_rl_core::{ACTION_COUNT, EnvConfig, TransportKind};
use coin_rl_env::{EpisodeController, serve};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "coin-rl", about = "Coin game RL environment", version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    /// JSON config file; COIN_RL_* variables and flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Game host
    #[arg(long, global = true)]
    host: Option<String>,
    /// Game port
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Full endpoint URL, overrides host and port
    #[arg(long, global = true)]
    url: Option<String>,
    #[arg(long, value_enum, global = true)]
    transport: Option<TransportArg>,
    /// Milliseconds to wait for the game after each action
    #[arg(long, global = true)]
    step_timeout_ms: Option<u64>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TransportArg {
    Websocket,
    Tcp,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Websocket => TransportKind::WebSocket,
            TransportArg::Tcp => TransportKind::Tcp,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play random actions against the game
    Run {
        #[arg(long, default_value_t = 1)]
        episodes: u64,
        /// Seed for the agent; episode i resets the game with seed + i
        #[arg(long)]
        seed: Option<u64>,
        /// Truncate episodes after this many steps
        #[arg(long)]
        max_steps: Option<u64>,
    },
    /// Serve reset/step requests as JSON lines on stdin/stdout
    Serve,
    /// Print observation and action spaces
    Spaces,
}

impl ConnectionArgs {
    fn load(&self) -> Result<EnvConfig> {
        let config = match &self.config {
            Some(path) => EnvConfig::from_json_file(path)?,
            None => EnvConfig::default(),
        };
        let mut config = config.apply_env()?;

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(url) = &self.url {
            config.url = Some(url.clone());
        }
        if let Some(transport) = self.transport {
            config.transport = transport.into();
        }
        if let Some(ms) = self.step_timeout_ms {
            config.per_step_timeout_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}

async fn run_random_agent(config: EnvConfig, episodes: u64, seed: Option<u64>) -> Result<()> {
    let connector = EndpointConnector::new(config.clone());
    let mut env = EpisodeController::new(connector, &config)?;
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or_else(rand::random));

    for episode in 0..episodes {
        env.reset(seed.map(|s| s.wrapping_add(episode)), None).await?;
        let mut stale = 0u64;

        loop {
            let action = rng.random_range(0..ACTION_COUNT as i64);
            let outcome = env.step(action).await?;
            if outcome.info.stale {
                stale += 1;
            }
            if outcome.terminated || outcome.truncated {
                info!(
                    "Episode {} done: steps={} reward={} terminated={} truncated={} stale_steps={}",
                    episode,
                    outcome.info.step,
                    outcome.info.episode_reward,
                    outcome.terminated,
                    outcome.truncated,
                    stale
                );
                if let Some(fault) = outcome.info.fault {
                    info!("Episode {} ended on fault: {}", episode, fault);
                }
                break;
            }
        }
    }

    env.close().await;
    Ok(())
}

async fn run_server(config: EnvConfig) -> Result<()> {
    let connector = EndpointConnector::new(config.clone());
    let mut env = EpisodeController::new(connector, &config)?;
    serve::run(
        &mut env,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries protocol output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = cli.connection.load()?;

    match cli.command {
        Command::Run {
            episodes,
            seed,
            max_steps,
        } => {
            if max_steps.is_some() {
                config.max_episode_steps = max_steps;
            }
            info!(
                "Running {} random episode(s) against {}",
                episodes,
                config.endpoint()
            );
            run_random_agent(config, episodes, seed).await?;
        }
        Command::Serve => {
            info!("Serving environment for {} on stdio", config.endpoint());
            run_server(config).await?;
        }
        Command::Spaces => {
            let env = EpisodeController::new(EndpointConnector::new(config.clone()), &config)?;
            let spaces = serde_json::json!({
                "observation_space": env.observation_space(),
                "action_space": env.action_space(),
            });
            println!("{}", serde_json::to_string_pretty(&spaces)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "coin-rl",
            "run",
            "--episodes",
            "3",
            "--host",
            "10.0.0.2",
            "--port",
            "7000",
            "--transport",
            "tcp",
            "--step-timeout-ms",
            "50",
        ])
        .unwrap();

        let config = cli.connection.load().unwrap();
        assert_eq!(config.endpoint(), "10.0.0.2:7000");
        assert_eq!(config.per_step_timeout_ms, 50);
        assert!(matches!(cli.command, Command::Run { episodes: 3, .. }));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let cli = Cli::try_parse_from(["coin-rl", "spaces", "--step-timeout-ms", "0"]).unwrap();
        assert!(cli.connection.load().is_err());
    }
}
