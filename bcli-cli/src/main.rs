// bcli-cli/src/main.rs

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    bcli_cli::run().await
}
