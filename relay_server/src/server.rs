use std::time::Duration;

use actix_web::{http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use meli_tools::MeliApi;
use relay_engine::{RelayLedger, SqliteLedger};

use crate::{
    config::{PipelineOptions, ServerConfig},
    errors::ServerError,
    forwarder::HttpForwarder,
    retention_worker::start_retention_worker,
    routes::{head_index, health, index, sales},
    webhook_routes::WebhookNotificationRoute,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    SqliteLedger::create_database_if_missing(&config.database_url)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let ledger = SqliteLedger::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    ledger.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Relay ledger ready at {}", ledger.url());
    let _retention_handle = start_retention_worker(ledger.clone(), config.delivery_retention);
    let srv = create_server_instance(config, ledger)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, ledger: SqliteLedger) -> Result<actix_web::dev::Server, ServerError> {
    let meli_api = MeliApi::new(config.meli.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let forwarder = HttpForwarder::new(config.forward.clone())?;
    let options = PipelineOptions::from_config(&config);
    let srv = HttpServer::new(move || {
        let ledger_api = relay_engine::LedgerApi::new(ledger.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("msr::access_log"))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(meli_api.clone()))
            .app_data(web::Data::new(forwarder.clone()))
            .app_data(web::Data::new(options.clone()))
            .service(health)
            .service(index)
            .service(head_index)
            .service(sales)
            .service(WebhookNotificationRoute::<SqliteLedger, MeliApi, HttpForwarder>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
