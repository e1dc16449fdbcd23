use alkahest_testenv::{NoClients, TestEnvConfig, setup_test_environment_with};
use alloy::primitives::{U256, hex};
use clap::Parser;
use eyre::Context;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Spin up a local anvil with every Alkahest contract deployed and keep it
/// running until Ctrl-C.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file with the environment settings. Flags override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    anvil_binary: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long)]
    chain_id: Option<u64>,

    /// Directory of the forge build output.
    #[arg(long, env = "ALKAHEST_ARTIFACTS_DIR")]
    artifacts_dir: Option<PathBuf>,

    /// Seconds to wait for anvil to answer.
    #[arg(long)]
    startup_timeout: Option<u64>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    request_timeout: Option<u64>,

    /// Native balance given to the deployer and both parties, in wei.
    #[arg(long)]
    funding_wei: Option<U256>,

    /// Skip the initial state snapshot.
    #[arg(long)]
    no_snapshot: bool,

    /// On shutdown also kill every process named like the anvil binary.
    #[arg(long)]
    kill_by_name: bool,

    /// Forward anvil's own output.
    #[arg(long)]
    anvil_logs: bool,

    /// Print the environment as JSON.
    #[arg(long)]
    json: bool,

    /// Write the initial state snapshot, hex encoded, to this file.
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> eyre::Result<TestEnvConfig> {
        let mut config = match &self.config {
            Some(path) => TestEnvConfig::load(path)
                .wrap_err_with(|| format!("failed to load {}", path.display()))?,
            None => TestEnvConfig::from_env(),
        };

        if let Some(binary) = &self.anvil_binary {
            config.anvil_binary = binary.clone();
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if self.port.is_some() {
            config.port = self.port;
        }
        if let Some(chain_id) = self.chain_id {
            config.chain_id = chain_id;
        }
        if let Some(dir) = &self.artifacts_dir {
            config.artifacts_dir = dir.clone();
        }
        if let Some(secs) = self.startup_timeout {
            config.startup_timeout_secs = secs;
        }
        if let Some(secs) = self.request_timeout {
            config.request_timeout_secs = secs;
        }
        if let Some(amount) = self.funding_wei {
            config.funding_wei = amount;
        }
        config.capture_snapshot &= !self.no_snapshot;
        config.kill_by_name |= self.kill_by_name;
        config.anvil_logs |= self.anvil_logs;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.config()?;

    let mut env = setup_test_environment_with(config, &NoClients)
        .await
        .wrap_err("failed to provision environment")?;

    if let Some(path) = &args.snapshot_out {
        match &env.init_state {
            Some(snapshot) => {
                std::fs::write(path, hex::encode_prefixed(snapshot.state()))
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "snapshot written");
            }
            None => tracing::warn!("no snapshot captured, nothing written"),
        }
    }

    let summary = env.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("http:      {}", summary.http_url);
        println!("ws:        {}", summary.ws_url);
        println!("chain id:  {}", summary.chain_id);
        println!("deployer:  {} ({})", summary.deployer.address, summary.deployer.private_key);
        println!("alice:     {} ({})", summary.alice.address, summary.alice.private_key);
        println!("bob:       {} ({})", summary.bob.address, summary.bob.private_key);
        println!();
        for (key, address) in summary.addresses.iter() {
            println!("{key:<34} {address}");
        }
        for (key, address) in summary.mock_addresses.iter() {
            println!("{key:<34} {address}");
        }
    }

    info!("devnet running, press Ctrl-C to stop");
    signal::ctrl_c().await?;

    env.teardown();
    Ok(())
}
