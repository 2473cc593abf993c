use taskboard::configuration::get_configuration;
use taskboard::startup::Application;
use taskboard::telemetry::{init_telemetry, DEFAULT_FILTER};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry(DEFAULT_FILTER)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let application = Application::build(configuration).await?;
    tracing::info!(port = application.port(), "Server started successfully");

    application.run_until_stopped().await
}
