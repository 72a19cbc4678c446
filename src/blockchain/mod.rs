pub mod block;
pub mod consensus;
pub mod model;
pub mod pow;

pub use block::Block;
pub use consensus::{Resolution, valid_chain};
pub use model::Blockchain;
pub use pow::{DifficultyController, proof_of_work, valid_proof};
