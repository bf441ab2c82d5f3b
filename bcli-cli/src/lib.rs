// bcli-cli/src/lib.rs

//! Command-line interface for exercising a [`bcli::BcliDriver`] by hand
//! against a real (or regtest) `bitcoin-cli`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bcli::{Anchor, BcliDriver, EstimateMode};

/// Drive an external `bitcoin-cli` through the serialized RPC driver.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a config file. If omitted, the built-in defaults are used
    /// (regtest, `bitcoin-cli` on `PATH`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the configured `bitcoin-cli` binary path.
    #[arg(long)]
    pub cli_binary: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the current chain height.
    GetBlockCount,
    /// Print the block hash at a height, or "missing" if there is none yet.
    GetBlockHash { height: u32 },
    /// Estimate the feerate (sat/kw) to confirm within each of the given
    /// block targets.
    EstimateFees {
        #[arg(required = true)]
        targets: Vec<u32>,
    },
    /// Broadcast a raw transaction, printing its exit code and output.
    SendRawTx { hex_tx: String },
    /// Look up a still-unspent output by (height, tx index, vout).
    GetOutput {
        height: u32,
        tx_index: usize,
        vout: u32,
    },
}

/// Parse argv, load configuration, start the driver, and run one command
/// to completion.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => bcli_config::Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => bcli_config::Config::default(),
    };
    if let Some(binary) = cli.cli_binary {
        config.chain.cli_binary = binary;
    }

    bcli_logging::init_with_level(if cli.verbose { "debug" } else { "info" });

    if let Some(addr) = config
        .metrics
        .prometheus
        .then(|| config.metrics.listen_addr.clone())
        .flatten()
    {
        let addr = addr
            .parse()
            .with_context(|| format!("invalid metrics listen address {addr}"))?;
        bcli_metrics::install_prometheus(addr)?;
    }

    let driver = BcliDriver::start(config).await?;
    let anchor = Anchor::new();

    match cli.command {
        Command::GetBlockCount => {
            let height = driver.get_block_count(anchor).await?;
            println!("{height}");
        }
        Command::GetBlockHash { height } => match driver.get_block_hash(anchor, height).await? {
            Some(hash) => println!("{hash:?}"),
            None => println!("missing"),
        },
        Command::EstimateFees { targets } => {
            let modes = vec![EstimateMode::Unset; targets.len()];
            let rates = driver.estimate_fees(anchor, &targets, &modes).await?;
            for (target, rate) in targets.iter().zip(rates.iter()) {
                println!("{target} blocks -> {rate} sat/kw");
            }
        }
        Command::SendRawTx { hex_tx } => {
            let outcome = driver.send_rawtx(anchor, hex_tx).await?;
            println!("exit code: {}", outcome.exit_code);
            println!("{}", outcome.output);
        }
        Command::GetOutput {
            height,
            tx_index,
            vout,
        } => match driver.get_output(anchor, height, tx_index, vout).await? {
            Some(out) => println!(
                "value: {} sat, scriptPubKey: {}",
                out.value_sat,
                hex::encode(&out.script_pubkey)
            ),
            None => println!("missing"),
        },
    }

    Ok(())
}
