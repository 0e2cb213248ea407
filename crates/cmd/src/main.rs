use anyhow::Result;
use clap::Parser;
use cmd::{Cli, run_command};

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();

    let cli = Cli::parse();
    let config = cli.pipeline_config();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_command(&config, &mut out).await
}
