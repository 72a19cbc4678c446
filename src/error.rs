use thiserror::Error;

/// Failures of the field/curve layer: bad construction or incompatible operands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CryptoError {
    #[error("{value} not in field range 0..{modulus}")]
    OutOfRange { value: String, modulus: String },

    #[error("cannot {op} elements of different fields")]
    FieldMismatch { op: &'static str },

    #[error("points are not on the same curve")]
    CurveMismatch,

    #[error("({x}, {y}) is not on the curve")]
    NotOnCurve { x: String, y: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("secret must be in [1, N-1]")]
    InvalidSecret,

    #[error("invalid SEC encoding: {0}")]
    InvalidSec(&'static str),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Reasons a transaction is declined by the ledger. Declines are normal outcomes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionError {
    #[error("missing sender public key or signature")]
    MissingCredentials,

    #[error("malformed sender public key: {0}")]
    MalformedKey(CryptoError),

    #[error("sender address does not match public key")]
    AddressMismatch,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("insufficient balance: has {balance}, needs {value}")]
    InsufficientBalance { balance: f64, value: f64 },

    #[error("transaction already pending")]
    Duplicate,

    #[error("transaction already recorded in the chain")]
    AlreadyConfirmed,

    #[error("only the node itself may pay from the mining sender")]
    ReservedSender,

    #[error("value must be a finite, non-negative amount, got {value}")]
    InvalidValue { value: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("block does not satisfy proof of work at difficulty {difficulty}")]
    InvalidProof { difficulty: u32 },

    #[error("previous hash {previous_hash} does not match the chain tip")]
    StaleParent { previous_hash: String },

    #[error("block contains a transaction already recorded in the chain")]
    DuplicateTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowError {
    #[error("proof of work timed out at difficulty {difficulty}")]
    Timeout { difficulty: u32 },
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("incompatible protocol {protocol} {version}")]
    Incompatible { protocol: String, version: String },

    #[error("message {0} requires a payload")]
    MissingPayload(&'static str),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("peer {peer} answered {status}")]
    Rejected { peer: String, status: u16 },
}

/// Anything that can stop a single mining attempt.
#[derive(Debug, Error)]
pub enum MiningError {
    #[error("mining already in progress")]
    Busy,

    #[error(transparent)]
    Pow(#[from] PowError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error("mining worker failed: {0}")]
    Worker(String),
}
