use actix_web::{HttpResponse, Responder, post, web};
use log::warn;

use super::models::{AppState, ErrorResponse};
use crate::p2p::message::{Message, Outgoing};

/// Peer ingress. Direct replies come back in the response body; broadcasts
/// are sent in the background.
#[post("/message/")]
pub async fn post_message(state: web::Data<AppState>, body: web::Json<Message>) -> impl Responder {
    let msg = body.into_inner();
    let sender = msg.sender.clone();
    match state.node.receive(msg) {
        Ok(outgoing) => {
            let (replies, broadcasts): (Vec<_>, Vec<_>) = outgoing
                .into_iter()
                .partition(|o| matches!(o, Outgoing::Reply(_)));
            state.spawn_delivery(broadcasts);
            let replies: Vec<Message> = replies
                .into_iter()
                .filter_map(|o| match o {
                    Outgoing::Reply(m) => Some(m),
                    Outgoing::Broadcast(_) => None,
                })
                .collect();
            HttpResponse::Ok().json(replies)
        }
        Err(e) => {
            warn!("POST /message/ - from {}: {}", sender, e);
            HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}
