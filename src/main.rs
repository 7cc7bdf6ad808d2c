use anyhow::Result;
use tsaiken::cli;

fn main() -> Result<()> {
    cli::run()
}
