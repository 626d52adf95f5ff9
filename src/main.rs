use actix_web::{web, App, HttpServer};
use clap::Parser;
use log::info;

use chess_arena::config::ServerConfig;
use chess_arena::models::AppState;
use chess_arena::routes::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::parse();
    info!(
        "Starting chess server at http://{} (K-factor {})",
        config.bind_address, config.k_factor
    );

    // Create shared application state
    let app_state = web::Data::new(AppState::new(config.k_factor));

    // Start HTTP server
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(configure_routes)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }
    server.bind(&config.bind_address)?.run().await
}
