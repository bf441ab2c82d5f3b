// bcli-cli/tests/basic.rs

use anyhow::Result;
use bcli_cli::{Cli, Command};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn parses_get_block_count() -> Result<()> {
    let cli = Cli::try_parse_from(["bcli-cli", "get-block-count"])?;
    assert!(!cli.verbose);
    assert!(matches!(cli.command, Command::GetBlockCount));
    Ok(())
}

#[test]
fn parses_global_flags_and_estimate_fees() -> Result<()> {
    let cli = Cli::try_parse_from([
        "bcli-cli",
        "--cli-binary",
        "/usr/local/bin/bitcoin-cli",
        "--verbose",
        "estimate-fees",
        "6",
        "12",
    ])?;
    assert_eq!(cli.cli_binary, Some(PathBuf::from("/usr/local/bin/bitcoin-cli")));
    assert!(cli.verbose);
    match cli.command {
        Command::EstimateFees { targets } => assert_eq!(targets, vec![6, 12]),
        other => panic!("unexpected command: {other:?}"),
    }
    Ok(())
}

#[test]
fn parses_get_output_positional_args() -> Result<()> {
    let cli = Cli::try_parse_from(["bcli-cli", "get-output", "100", "0", "0"])?;
    match cli.command {
        Command::GetOutput {
            height,
            tx_index,
            vout,
        } => {
            assert_eq!(height, 100);
            assert_eq!(tx_index, 0);
            assert_eq!(vout, 0);
        }
        other => panic!("unexpected command: {other:?}"),
    }
    Ok(())
}

#[test]
fn estimate_fees_requires_at_least_one_target() {
    let result = Cli::try_parse_from(["bcli-cli", "estimate-fees"]);
    assert!(result.is_err());
}
