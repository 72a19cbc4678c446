use actix_web::{HttpResponse, Responder, delete, get, post, web};
use log::{debug, warn};

use super::models::{AppState, ErrorResponse, PoolResponse, RenewResponse};
use crate::p2p::message::{Message, MessageType, NodeRole, Outgoing};
use crate::transaction::Transaction;

/// Admit a signed transaction and forward it to the core nodes.
pub(super) fn submit(state: &AppState, tx: Transaction) -> HttpResponse {
    let result = state.node.blockchain().add_transaction(tx.clone());
    match result {
        Ok(()) => {
            let msg = Message::with_body(
                MessageType::NewTransaction,
                state.node.public_addr(),
                NodeRole::Core,
                &tx,
            );
            state.spawn_delivery(vec![Outgoing::Broadcast(msg)]);
            HttpResponse::Created().json(tx)
        }
        Err(e) => {
            warn!("POST /transactions/ - rejected: {}", e);
            HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

/// Submit a signed transaction into the pool.
#[post("/transactions/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<Transaction>,
) -> impl Responder {
    debug!(
        "POST /transactions/ - {} -> {} value={}",
        body.sender_blockchain_address, body.recipient_blockchain_address, body.value
    );
    submit(&state, body.into_inner())
}

/// List pending transactions.
#[get("/transactions/")]
pub async fn get_pool(state: web::Data<AppState>) -> impl Responder {
    let bc = state.node.blockchain();
    HttpResponse::Ok().json(PoolResponse {
        size: bc.pool().len(),
        transactions: bc.pool().iter().collect(),
    })
}

/// Drop pending transactions that are already in the chain.
#[delete("/transactions/")]
pub async fn renew_pool(state: web::Data<AppState>) -> impl Responder {
    let mut bc = state.node.blockchain();
    let removed = bc.renew_transaction_pool();
    HttpResponse::Ok().json(RenewResponse {
        removed,
        size: bc.pool().len(),
    })
}
