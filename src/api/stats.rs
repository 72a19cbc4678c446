use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let node = &state.node;
    let (height, difficulty, mining_speed, pool_size) = {
        let bc = node.blockchain();
        (bc.len(), bc.difficulty(), bc.mining_speed(), bc.pool().len())
    };

    HttpResponse::Ok().json(StatsResponse {
        height,
        difficulty,
        mining_speed,
        pool_size,
        miner_address: node.wallet().address().to_string(),
        core_nodes: node.core_nodes().snapshot(),
        edge_nodes: node.edge_nodes().snapshot(),
    })
}
