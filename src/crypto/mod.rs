pub mod field;
pub mod keys;
pub mod point;
pub mod s256;

pub use field::FieldElement;
pub use keys::{PrivateKey, Signature};
pub use point::{Coordinate, Point};
pub use s256::{G, N, Network, P, S256Point, message_hash};
