mod cli;
mod paths;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    run::run(cli).inspect_err(|err| tracing::error!("{err:#}"))
}
