use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;
use tokio::sync::watch;

use scratch_chain::api::{self, AppState};
use scratch_chain::config::NodeConfig;
use scratch_chain::node::Node;
use scratch_chain::node::scheduler::{run_mining_loop, run_sync_loop};
use scratch_chain::p2p::HttpTransport;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env();
    let (host, port) = (config.host.clone(), config.port);

    let node = Arc::new(Node::new(config.clone()));
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).map_err(std::io::Error::other)?);

    println!("⛓️ Starting node at http://{host}:{port}");
    info!(
        "NODE - miner address {} (public {}, {} core peers)",
        node.wallet().address(),
        config.public_addr,
        config.core_peers.len()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if config.mining_enabled {
        actix_web::rt::spawn(run_mining_loop(
            Arc::clone(&node),
            Arc::clone(&transport),
            shutdown_rx.clone(),
        ));
    }
    actix_web::rt::spawn(run_sync_loop(
        Arc::clone(&node),
        Arc::clone(&transport),
        config.sync_interval,
        shutdown_rx,
    ));

    let state = web::Data::new(AppState::new(node, transport));

    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await;

    let _ = shutdown_tx.send(true);
    result
}
