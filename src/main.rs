mod browse;
mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

// Not a tokio main: the inference client is blocking and may not be built or
// dropped inside an async context. `browse` starts its own runtime.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    cli::run(cli::Cli::parse())
}
