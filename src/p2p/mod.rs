pub mod message;
pub mod peers;
pub mod transport;

pub use message::{Message, MessageType, NodeRole, Outgoing};
pub use peers::PeerList;
pub use transport::{HttpTransport, Transport, deliver};
