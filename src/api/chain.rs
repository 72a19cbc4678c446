use actix_web::{HttpResponse, Responder, get, post, web};
use log::{info, warn};

use super::models::{
    AppState, ChainResponse, ConsensusResponse, DifficultyResponse, ErrorResponse, MineResponse,
    ValidateResponse,
};
use crate::error::MiningError;

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.node.blockchain();
    HttpResponse::Ok().json(ChainResponse {
        length: bc.len(),
        difficulty: bc.difficulty(),
        chain: &bc.chain,
    })
}

/// Validate the whole local chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.node.blockchain();
    HttpResponse::Ok().json(ValidateResponse {
        valid: bc.is_valid(),
        length: bc.len(),
    })
}

/// Current difficulty and mining-speed estimate.
#[get("/difficulty/")]
pub async fn get_difficulty(state: web::Data<AppState>) -> impl Responder {
    let bc = state.node.blockchain();
    HttpResponse::Ok().json(DifficultyResponse {
        difficulty: bc.difficulty(),
        mining_speed: bc.mining_speed(),
    })
}

/// Run one mining round now, unless one is already in flight.
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>) -> impl Responder {
    match state.node.start_mining(state.transport.as_ref()).await {
        Ok(delivered) => {
            let bc = state.node.blockchain();
            let tip = bc.last_block();
            HttpResponse::Ok().json(MineResponse {
                length: bc.len(),
                hash: tip.hash(),
                nonce: tip.nonce,
                difficulty: tip.difficulty,
                delivered,
            })
        }
        Err(MiningError::Busy) => HttpResponse::Conflict().json(ErrorResponse {
            error: MiningError::Busy.to_string(),
        }),
        Err(e @ MiningError::Pow(_)) => {
            warn!("POST /mine/ - {}", e);
            HttpResponse::ServiceUnavailable().json(ErrorResponse {
                error: e.to_string(),
            })
        }
        Err(e) => {
            warn!("POST /mine/ - {}", e);
            HttpResponse::Conflict().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

/// Pull every core node's chain and adopt the longest valid one.
#[post("/consensus/")]
pub async fn run_consensus(state: web::Data<AppState>) -> impl Responder {
    let before = state.node.blockchain().last_hash();
    let delivered = state.node.pull_chains(state.transport.as_ref()).await;
    let (after, length) = {
        let bc = state.node.blockchain();
        (bc.last_hash(), bc.len())
    };
    let replaced = before != after;
    info!("POST /consensus/ - replaced={} length={}", replaced, length);
    HttpResponse::Ok().json(ConsensusResponse {
        replaced,
        length,
        delivered,
    })
}
