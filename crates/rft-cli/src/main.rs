use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = rft_cli::Args::parse();
    rft_cli::run(args)
}
