use admin_service::{config::AdminConfig, init_service, init_tracing};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/admin.yaml".to_string());

    let config = match AdminConfig::from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            eprintln!("Usage: admin-service [config_file]");
            process::exit(1);
        }
    };

    init_tracing(config.logging.json);

    if let Err(e) = init_service(config).await {
        eprintln!("Admin service error: {}", e);
        process::exit(1);
    }
}
