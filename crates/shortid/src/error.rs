use jiff::Timestamp;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by alphabet construction, encoding and id generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("alphabet must contain {expected} characters, found {found}")]
    InvalidAlphabetLength { expected: usize, found: usize },
    #[error("alphabet must contain unique characters only, {symbol:?} is repeated")]
    DuplicateSymbol { symbol: char },
    #[error("seed must be positive")]
    InvalidSeed,
    #[error("invalid worker {worker}; expected 0..={max_worker}")]
    InvalidWorker { worker: u8, max_worker: u8 },
    #[error("allowed digits range [4,6], found {digits}")]
    InvalidDigits { digits: u32 },
    #[error("index {index} out of range for an alphabet of {len} symbols")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot accommodate data, need {required} symbols, got {provided}")]
    InsufficientWidth { required: usize, provided: usize },
    #[error("symbol {symbol:?} is not part of the alphabet")]
    UnknownSymbol { symbol: char },
    #[error("decoded value does not fit into 64 bits")]
    DecodeOverflow,
    #[error("malformed id {id:?}: {reason}")]
    MalformedId { id: String, reason: &'static str },
    #[error("epoch is ahead of current clock time: epoch={epoch}, now={now}")]
    EpochAhead { epoch: Timestamp, now: Timestamp },
    #[error("clock exhausted: {elapsed_ms}ms since epoch exceeds the limit of {max_ms}ms")]
    ClockExhausted { elapsed_ms: u64, max_ms: u64 },
    #[error("same-bucket counter exhausted")]
    CounterExhausted,
    #[error("generator state lock is poisoned")]
    StatePoisoned,
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed alphabet, seed, worker or digit width. Fix the configuration.
    Config,
    /// An explicit width too small for the value, or input that cannot be decoded.
    Capacity,
    /// The generator ran out of time buckets or counter values.
    Exhaustion,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAlphabetLength { .. }
            | Error::DuplicateSymbol { .. }
            | Error::InvalidSeed
            | Error::InvalidWorker { .. }
            | Error::InvalidDigits { .. }
            | Error::EpochAhead { .. } => ErrorKind::Config,
            Error::IndexOutOfRange { .. }
            | Error::InsufficientWidth { .. }
            | Error::UnknownSymbol { .. }
            | Error::DecodeOverflow
            | Error::MalformedId { .. } => ErrorKind::Capacity,
            Error::ClockExhausted { .. } | Error::CounterExhausted => ErrorKind::Exhaustion,
            Error::StatePoisoned => ErrorKind::Internal,
        }
    }
}
