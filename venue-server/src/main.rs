use venue_server::core::{Config, server};
use venue_server::utils::logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logger::init_logger();

    let config = Config::from_env();
    tracing::info!(?config, "Starting venue server");

    server::run(config).await
}
