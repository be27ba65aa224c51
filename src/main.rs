use crate::{
    backend::BookingBackend, configuration::Configuration, configuration_handler::ConfigurationHandler,
    database_interface::DatabaseInterface, example_data::insert_example_data, http::create_app,
    local_store::LocalStore,
};
use tokio::time::sleep;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod backend;
mod booking;
mod configuration;
mod configuration_handler;
mod database_interface;
mod error;
mod example_data;
mod http;
mod local_store;
mod schema;
mod sessions;
#[cfg(test)]
mod testutils;
mod types;

fn seed<T: BookingBackend, C: Configuration>(backend: &T, configuration: &C) {
    if configuration.example_data() {
        if let Err(err) = insert_example_data(backend) {
            error!(?err, "Failed to insert example data");
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("####################");
    println!("# Training Booking #");
    println!("####################");

    let configuration = ConfigurationHandler::parse_arguments();

    let address = format!("0.0.0.0:{}", configuration.port());
    println!("Accessable at:\n{}", address.clone());
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(?err, "Failed to bind {address}");
            return;
        }
    };

    let app = if let Some(database_url) = configuration.database_url() {
        let backend = loop {
            match DatabaseInterface::new(&database_url) {
                Ok(backend) => {
                    info!("Successfully connected to database");
                    break backend;
                }
                Err(err) => {
                    error!(?err, "Failed to establish database connection: {database_url}. Retry in {:?}. You may want to restart it with database disabled (impersistent bookings).", configuration.database_retry_interval());
                    sleep(configuration.database_retry_interval()).await;
                }
            }
        };
        seed(&backend, &configuration);
        create_app(backend)
    } else {
        let backend = LocalStore::default();
        seed(&backend, &configuration);
        create_app(backend)
    };

    if let Err(err) = axum::serve(listener, app).await {
        error!(?err, "Server stopped");
    }
}
