use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::MessageError;

pub const PROTOCOL_NAME: &str = "scratch_chain";
pub const PROTOCOL_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    RequestFullChain,
    RspFullChain,
    NewTransaction,
    NewBlock,
    DeleteTransaction,
    RequestKeyInfo,
    KeyInfo,
    CoreList,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::RequestFullChain => "request_full_chain",
            MessageType::RspFullChain => "rsp_full_chain",
            MessageType::NewTransaction => "new_transaction",
            MessageType::NewBlock => "new_block",
            MessageType::DeleteTransaction => "delete_transaction",
            MessageType::RequestKeyInfo => "request_key_info",
            MessageType::KeyInfo => "key_info",
            MessageType::CoreList => "core_list",
        }
    }
}

/// Whether the sender takes part in consensus (core) or only submits
/// transactions and reads state (edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Core,
    Edge,
}

/// Envelope exchanged between nodes. `payload` is itself JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub protocol: String,
    pub version: String,
    pub msg_type: MessageType,
    /// `host:port` the sender can be reached at.
    pub sender: String,
    pub role: NodeRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Message {
    pub fn new(
        msg_type: MessageType,
        sender: impl Into<String>,
        role: NodeRole,
        payload: Option<String>,
    ) -> Self {
        Self {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            msg_type,
            sender: sender.into(),
            role,
            payload,
        }
    }

    /// Build a message whose payload is `body` encoded as JSON.
    pub fn with_body<T: Serialize + ?Sized>(
        msg_type: MessageType,
        sender: impl Into<String>,
        role: NodeRole,
        body: &T,
    ) -> Self {
        let payload = serde_json::to_string(body).expect("serialize message payload");
        Self::new(msg_type, sender, role, Some(payload))
    }

    pub fn check_protocol(&self) -> Result<(), MessageError> {
        if self.protocol != PROTOCOL_NAME || self.version != PROTOCOL_VERSION {
            return Err(MessageError::Incompatible {
                protocol: self.protocol.clone(),
                version: self.version.clone(),
            });
        }
        Ok(())
    }
}

/// Decode a required JSON payload.
pub fn decode_payload<T: DeserializeOwned>(
    msg_type: MessageType,
    payload: Option<&str>,
) -> Result<T, MessageError> {
    let raw = payload.ok_or(MessageError::MissingPayload(msg_type.as_str()))?;
    Ok(serde_json::from_str(raw)?)
}

/// Public half of the miner's wallet, as answered to `request_key_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub public_key: String,
    pub blockchain_address: String,
}

/// Something the node wants sent after handling a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Back to whoever sent the message being handled.
    Reply(Message),
    /// To every known core node.
    Broadcast(Message),
}
