use anyhow::Result;
use iris_core::{init_tracing, load_config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("inference-gateway")?;
    let cfg = load_config("inference-gateway")?;
    info!(target: "inference-gateway", bind = %cfg.bind_addr, "Starting inference-gateway service");
    inference_gateway::serve(cfg).await?;
    info!("shutdown");
    Ok(())
}
