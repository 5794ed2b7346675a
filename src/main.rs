use std::net::TcpListener;

use env_logger::Env;
use magnet::{
    configuration::get_configuration, services::orchestrator::SearchOrchestrator,
    services::run_control::RunRegistry, startup::run,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    if configuration.api_keys.apify().is_none() {
        log::warn!("No job platform token configured; searches will fail at setup");
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address)?;
    let orchestrator = SearchOrchestrator::from_settings(&configuration);

    run(listener, orchestrator, RunRegistry::default())?.await
}
