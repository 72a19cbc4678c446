mod balance;
mod chain;
mod health;
mod message;
pub mod models;
mod stats;
mod tx;
mod wallet;

use actix_web::web::{self, ServiceConfig};

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::get_difficulty)
            .service(chain::mine_block)
            .service(chain::run_consensus)
            .service(tx::post_transaction)
            .service(tx::get_pool)
            .service(tx::renew_pool)
            .service(balance::get_balance)
            .service(stats::get_stats)
            .service(wallet::create_wallet)
            .service(wallet::create_transaction)
            .service(message::post_message),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{App, http::StatusCode, test, web};
    use serde_json::{Value, json};

    use super::*;
    use crate::config::{ConsensusParams, NodeConfig};
    use crate::node::Node;
    use crate::p2p::message::{Message, MessageType, NodeRole};
    use crate::p2p::transport::HttpTransport;

    fn state() -> web::Data<AppState> {
        let config = NodeConfig {
            public_addr: "127.0.0.1:1".into(),
            consensus: ConsensusParams {
                baseline_difficulty: 1,
                pow_timeout: Duration::from_secs(30),
                ..ConsensusParams::default()
            },
            ..NodeConfig::default()
        };
        let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
        web::Data::new(AppState::new(
            Arc::new(Node::new(config)),
            Arc::new(transport),
        ))
    }

    #[actix_web::test]
    async fn chain_starts_at_genesis() {
        let app = test::init_service(App::new().app_data(state()).configure(init_routes)).await;
        let req = test::TestRequest::get().uri("/api/v1/chain/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["length"], 1);
        assert_eq!(body["difficulty"], 1);

        let req = test::TestRequest::get().uri("/api/v1/validate/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["valid"], true);
    }

    #[actix_web::test]
    async fn mine_then_spend_through_the_wallet_endpoint() {
        let data = state();
        let miner_key = data.node.wallet().private_key_hex();
        let miner_address = data.node.wallet().address().to_string();
        let app = test::init_service(App::new().app_data(data.clone()).configure(init_routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/mine/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["length"], 2);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/balance/{miner_address}/"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["amount"], 1.0);

        let req = test::TestRequest::post()
            .uri("/api/v1/wallet/transaction/")
            .set_json(json!({
                "sender_private_key": miner_key,
                "recipient_blockchain_address": "bob",
                "value": 0.25,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/api/v1/transactions/").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["size"], 1);
    }

    #[actix_web::test]
    async fn overspend_is_a_bad_request() {
        let app = test::init_service(App::new().app_data(state()).configure(init_routes)).await;
        let req = test::TestRequest::post().uri("/api/v1/wallet/new/").to_request();
        let wallet: Value = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/wallet/transaction/")
            .set_json(json!({
                "sender_private_key": wallet["private_key"],
                "recipient_blockchain_address": "bob",
                "value": 2.0,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn mining_sender_cannot_be_submitted() {
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(init_routes)).await;
        let forged = crate::transaction::Transaction::reward("attacker", 1e6);
        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/")
            .set_json(&forged)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(data.node.blockchain().pool().is_empty());
    }

    #[actix_web::test]
    async fn message_endpoint_returns_replies() {
        let data = state();
        let app = test::init_service(App::new().app_data(data.clone()).configure(init_routes)).await;
        let msg = Message::new(MessageType::RequestKeyInfo, "10.0.0.9:5000", NodeRole::Edge, None);
        let req = test::TestRequest::post()
            .uri("/api/v1/message/")
            .set_json(&msg)
            .to_request();
        let replies: Vec<Message> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].msg_type, MessageType::KeyInfo);
        assert!(data.node.edge_nodes().contains("10.0.0.9:5000"));

        let mut bad = msg.clone();
        bad.protocol = "other".into();
        let req = test::TestRequest::post()
            .uri("/api/v1/message/")
            .set_json(&bad)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
