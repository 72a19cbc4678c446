use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use super::message::{Message, Outgoing};
use crate::error::TransportError;
use crate::node::Node;

/// Upper bound on sends triggered by one [`deliver`] call, replies included.
const MAX_SENDS_PER_DELIVERY: usize = 64;

/// Sends one message to one peer and returns the peer's direct replies.
pub trait Transport {
    fn send(
        &self,
        peer: &str,
        message: &Message,
    ) -> impl Future<Output = Result<Vec<Message>, TransportError>> + Send;
}

/// JSON over HTTP: POST to the peer's `/api/v1/message/` endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, peer: &str, message: &Message) -> Result<Vec<Message>, TransportError> {
        let url = format!("http://{peer}/api/v1/message/");
        let resp = self.client.post(url).json(message).send().await?;
        if !resp.status().is_success() {
            return Err(TransportError::Rejected {
                peer: peer.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.json::<Vec<Message>>().await?)
    }
}

/// Send `outgoing` and keep going with whatever the replies make the node
/// want to send next. Broadcasts go to every core node; a reply goes back to
/// the peer whose message produced it. Peers that fail are dropped from the
/// core list. Returns the number of successful sends.
pub async fn deliver<T: Transport + ?Sized>(
    node: &Node,
    transport: &T,
    outgoing: Vec<Outgoing>,
) -> usize {
    let mut queue: VecDeque<(Option<String>, Outgoing)> =
        outgoing.into_iter().map(|o| (None, o)).collect();
    let mut attempts = 0;
    let mut delivered = 0;

    while let Some((reply_to, item)) = queue.pop_front() {
        let (targets, message) = match item {
            Outgoing::Broadcast(message) => (node.core_nodes().snapshot(), message),
            Outgoing::Reply(message) => match reply_to {
                Some(peer) => (vec![peer], message),
                None => {
                    debug!(
                        "P2P - dropping {} reply with no peer to answer",
                        message.msg_type.as_str()
                    );
                    continue;
                }
            },
        };

        for peer in targets {
            if attempts >= MAX_SENDS_PER_DELIVERY {
                warn!("P2P - send budget exhausted, {} items left", queue.len());
                return delivered;
            }
            attempts += 1;
            match transport.send(&peer, &message).await {
                Ok(replies) => {
                    delivered += 1;
                    debug!(
                        "P2P - sent {} to {} ({} replies)",
                        message.msg_type.as_str(),
                        peer,
                        replies.len()
                    );
                    for reply in replies {
                        match node.receive(reply) {
                            Ok(next) => {
                                queue.extend(next.into_iter().map(|o| (Some(peer.clone()), o)))
                            }
                            Err(e) => warn!("P2P - bad reply from {}: {}", peer, e),
                        }
                    }
                }
                Err(e) => {
                    warn!("P2P - send {} to {} failed: {}", message.msg_type.as_str(), peer, e);
                    node.core_nodes().remove(&peer);
                }
            }
        }
    }
    delivered
}
