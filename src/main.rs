use tracing::info;
use wikidb::bus::EventBus;
use wikidb::config::WikiDbConfig;
use wikidb::logger::init_tracing;
use wikidb::services::WikiDbService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // determine environment variables
    dotenv::dotenv().ok();

    init_tracing()?;

    // load centralized config
    let config = WikiDbConfig::from_env();

    let bus = EventBus::new();

    // load queries, open the pool, create the schema, start listening
    let service = WikiDbService::start(&config, &bus).await?;

    info!(
        address = service.address(),
        "Listening for wiki database requests, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;

    service.shutdown().await;

    Ok(())
}
