#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;

    use contract_progress::{AppConfig, ScheduleStore, config, http_api};

    config::init_logging();
    let config = AppConfig::load()?;

    #[cfg(feature = "sqlite")]
    let store: Arc<dyn ScheduleStore> = Arc::new(contract_progress::SqliteScheduleStore::new(
        &config.database_path,
    )?);
    #[cfg(not(feature = "sqlite"))]
    let store: Arc<dyn ScheduleStore> = {
        log::warn!("built without `sqlite`; contracts are kept in memory only");
        Arc::new(contract_progress::MemoryScheduleStore::new())
    };

    let state = http_api::AppState::new(store, config.locale);
    http_api::serve(config.http_addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
