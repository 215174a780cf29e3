//! Short, URL-friendly, unique ids.
//!
//! Ids are built from a seed-shuffled 64 symbol alphabet, the milliseconds
//! elapsed since an epoch, a worker number and, for bursts within a single
//! millisecond, a counter. They are 9 symbols long for ~34 years from the
//! epoch as long as requests land in distinct milliseconds.

pub mod abc;
mod clock;
pub mod error;
mod shared;
mod shortid;

pub use abc::{Abc, ABC_LEN, DEFAULT_ABC};
pub use clock::{Clock, SystemClock};
pub use error::{Error, ErrorKind, Result};
pub use shared::SharedShortid;
pub use shortid::{
    IdParts, Shortid, ShortidSettings, BASE_LEN, DEFAULT_EPOCH, MAX_BUCKET, MAX_WORKER,
};
