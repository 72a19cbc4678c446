use actix_web::{HttpResponse, Responder, post, web};
use log::warn;

use super::models::{AppState, ErrorResponse, NewWalletResponse, SignTxRequest};
use super::tx::submit;
use crate::wallet::{Wallet, generate_keypair_hex};

/// Generate a fresh key pair and address.
#[post("/wallet/new/")]
pub async fn create_wallet(state: web::Data<AppState>) -> impl Responder {
    let (sk, pk, addr) = generate_keypair_hex(state.node.config().consensus.network);
    HttpResponse::Ok().json(NewWalletResponse {
        private_key: sk,
        public_key: pk,
        blockchain_address: addr,
    })
}

/// Sign a transfer with the supplied private key and submit it.
#[post("/wallet/transaction/")]
pub async fn create_transaction(
    state: web::Data<AppState>,
    body: web::Json<SignTxRequest>,
) -> impl Responder {
    let network = state.node.config().consensus.network;
    let signed = Wallet::from_private_key_hex(&body.sender_private_key, network).and_then(|w| {
        w.create_transaction(&body.recipient_blockchain_address, body.value)
    });
    match signed {
        Ok(tx) => submit(&state, tx),
        Err(e) => {
            warn!("POST /wallet/transaction/ - cannot sign: {}", e);
            HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}
