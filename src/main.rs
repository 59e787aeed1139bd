//! jsonlog - JSON構造化ロギングファサードのCLI

mod cli;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
