mod args;

use args::{Args, Parser};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    service::process::spawn_service(&config).await;
    Ok(())
}
