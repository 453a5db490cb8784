use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use std::sync::Arc;
use tracing::{info, instrument};
use user_registry::application::user_store::UserStore;
use user_registry::data::file::FileDocumentBackend;
use user_registry::infrastructure::config::AppConfig;
use user_registry::infrastructure::logging::init_logging;
use user_registry::presentation::handlers::AppState;
use user_registry::presentation::middleware::RequestLogging;
use user_registry::presentation::routes::{ROUTES, configure};

#[actix_web::main]
#[instrument]
async fn main() -> anyhow::Result<()> {
    init_logging();
    info!("Logging initialized successfully");

    let config = AppConfig::from_env()?;
    info!(
        host = %config.host,
        port = config.port,
        "Configuration loaded"
    );

    let backend = FileDocumentBackend::new(config.users_file.clone()).await?;
    info!(path = %backend.path().display(), "Using user store file");
    let store = UserStore::new(Arc::new(backend));
    // Creates, repairs and de-duplicates the document before serving anything.
    let document = store.load().await?;
    info!(users = document.users.len(), "User store ready");

    let state = web::Data::new(AppState { store });

    let server = HttpServer::new(move || {
        tracing::trace!("Creating new application instance");
        App::new()
            .app_data(state.clone())
            .wrap(RequestLogging)
            .wrap(Cors::permissive())
            .configure(configure)
    });

    let bind_addr = config.bind_addr();
    info!(address = %bind_addr, "Binding server to address");
    let server = server.bind((config.host.as_str(), config.port))?;

    info!(address = %bind_addr, routes = %ROUTES, "Starting HTTP server");
    server.run().await?;
    Ok(())
}
