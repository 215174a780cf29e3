use crate::{
    abc::{Abc, DEFAULT_ABC},
    clock::{Clock, SystemClock},
    error::{Error, Result},
};
use jiff::{SignedDuration, Timestamp};
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

/// Highest worker number; the worker block holds 5 payload bits.
pub const MAX_WORKER: u8 = 31;

const BUCKET_SYMBOLS: usize = 8;
const BUCKET_DIGITS: u32 = 5;
const WORKER_SYMBOLS: usize = 1;
const WORKER_DIGITS: u32 = 5;
const COUNTER_DIGITS: u32 = 6;

/// Length of an id issued in a fresh millisecond.
pub const BASE_LEN: usize = BUCKET_SYMBOLS + WORKER_SYMBOLS;

/// Highest millisecond offset from the epoch the bucket block can hold (~34.8 years).
pub const MAX_BUCKET: u64 = (1 << (BUCKET_SYMBOLS as u32 * BUCKET_DIGITS)) - 1;

/// 2016-01-01T00:00:00Z
pub const DEFAULT_EPOCH: Timestamp = Timestamp::constant(1_451_606_400, 0);

/// Configures a [`Shortid`] generator instance.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortidSettings {
    /// Worker number in the range `[0, 31]`. Processes generating ids into the
    /// same data space must use distinct workers.
    #[builder]
    pub worker: u8,
    /// 64 unique symbols. Must be identical across cooperating processes.
    #[builder(default = DEFAULT_ABC.to_owned(), setter(into))]
    pub alphabet: String,
    /// Seed used to shuffle the alphabet. Must be identical across cooperating
    /// processes.
    #[builder(default = 1)]
    pub seed: u64,
    /// Zero point of the millisecond buckets.
    #[builder(default = DEFAULT_EPOCH)]
    pub epoch: Timestamp,
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_bucket: Option<u64>,
    counter: u64,
}

/// Short id generator.
///
/// An id is the concatenation of three blocks rendered with the shuffled
/// alphabet:
///
/// 1. 8 symbols of milliseconds since the epoch, 5 payload bits per symbol;
/// 2. 1 symbol for the worker, 5 payload bits;
/// 3. only when more than one id is issued within the same millisecond, the
///    same-millisecond counter with 6 payload bits per symbol and no randomness.
///
/// Ids are 9 symbols long while requests land in distinct milliseconds, 10 for
/// up to 64 requests within one millisecond and 11 for up to 4096.
pub struct Shortid<C: Clock = SystemClock> {
    abc: Abc,
    worker: u8,
    epoch: Timestamp,
    clock: C,
    state: Mutex<GeneratorState>,
}

impl Shortid<SystemClock> {
    /// Creates a generator backed by the system clock with the default epoch.
    pub fn new(worker: u8, alphabet: &str, seed: u64) -> Result<Self> {
        let settings = ShortidSettings::builder()
            .worker(worker)
            .alphabet(alphabet)
            .seed(seed)
            .build();
        Self::from_settings(settings)
    }

    /// Creates a generator backed by the system clock.
    pub fn from_settings(settings: ShortidSettings) -> Result<Self> {
        Self::with_clock(settings, SystemClock)
    }
}

impl Default for Shortid<SystemClock> {
    /// Worker 0, the default alphabet and seed 1.
    fn default() -> Self {
        Self::new(0, DEFAULT_ABC, 1).expect("default generator settings are valid")
    }
}

impl<C: Clock> Shortid<C> {
    /// Creates a generator reading time from `clock`.
    pub fn with_clock(settings: ShortidSettings, clock: C) -> Result<Self> {
        if settings.worker > MAX_WORKER {
            return Err(Error::InvalidWorker {
                worker: settings.worker,
                max_worker: MAX_WORKER,
            });
        }

        let abc = Abc::new(&settings.alphabet, settings.seed)?;

        let now = clock.now();
        if settings.epoch > now {
            return Err(Error::EpochAhead {
                epoch: settings.epoch,
                now,
            });
        }

        debug!(
            worker = settings.worker,
            epoch = %settings.epoch,
            alphabet = %abc.alphabet(),
            "created shortid generator"
        );

        Ok(Self {
            abc,
            worker: settings.worker,
            epoch: settings.epoch,
            clock,
            state: Mutex::new(GeneratorState::default()),
        })
    }

    /// Generates a new short id at the current clock time.
    pub fn generate(&self) -> Result<String> {
        self.generate_at(self.clock.now())
    }

    /// Generates a new short id as if the clock read `now`.
    ///
    /// The same-millisecond counter is shared with [`Shortid::generate`], so
    /// ids stay unique when both are mixed on one instance.
    pub fn generate_at(&self, now: Timestamp) -> Result<String> {
        let bucket = self.bucket_of(now)?;
        let (bucket, counter) = self.next_slot(bucket)?;

        let mut id = String::with_capacity(BASE_LEN + 2);
        id.extend(self.abc.encode(bucket, BUCKET_SYMBOLS, BUCKET_DIGITS)?);
        id.extend(
            self.abc
                .encode(u64::from(self.worker), WORKER_SYMBOLS, WORKER_DIGITS)?,
        );
        if counter > 0 {
            // only extend if really needed
            id.extend(self.abc.encode(counter, 0, COUNTER_DIGITS)?);
        }
        Ok(id)
    }

    /// Splits an id produced by a generator sharing this alphabet and seed
    /// back into its blocks.
    pub fn decode(&self, id: &str) -> Result<IdParts> {
        let symbols: Vec<char> = id.chars().collect();
        if symbols.len() < BASE_LEN {
            return Err(Error::MalformedId {
                id: id.to_owned(),
                reason: "shorter than 9 symbols",
            });
        }
        let (bucket, rest) = symbols.split_at(BUCKET_SYMBOLS);
        let (worker, counter) = rest.split_at(WORKER_SYMBOLS);

        let elapsed_ms = self.abc.decode(bucket, BUCKET_DIGITS)?;
        let worker = self.abc.decode(worker, WORKER_DIGITS)? as u8;
        let counter = match counter {
            [] => 0,
            counter => self.abc.decode(counter, COUNTER_DIGITS)?,
        };
        Ok(IdParts {
            elapsed_ms,
            worker,
            counter,
        })
    }

    /// The shuffled alphabet ids are rendered with.
    pub fn abc(&self) -> &Abc {
        &self.abc
    }

    /// The zero point of the millisecond buckets.
    pub fn epoch(&self) -> Timestamp {
        self.epoch
    }

    /// The worker number embedded in every id.
    pub fn worker(&self) -> u8 {
        self.worker
    }

    fn bucket_of(&self, now: Timestamp) -> Result<u64> {
        let elapsed = now.duration_since(self.epoch);
        if elapsed.is_negative() {
            return Err(Error::EpochAhead {
                epoch: self.epoch,
                now,
            });
        }
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if elapsed_ms > MAX_BUCKET {
            return Err(Error::ClockExhausted {
                elapsed_ms,
                max_ms: MAX_BUCKET,
            });
        }
        Ok(elapsed_ms)
    }

    /// Claims the next `(bucket, counter)` pair.
    ///
    /// A bucket at or before the last one continues the last bucket's counter,
    /// so a clock stepping backwards never reissues a pair.
    fn next_slot(&self, bucket: u64) -> Result<(u64, u64)> {
        let slot = {
            let mut state = self.state.lock().map_err(|_| Error::StatePoisoned)?;
            match state.last_bucket {
                Some(last) if bucket <= last => {
                    state.counter = state
                        .counter
                        .checked_add(1)
                        .ok_or(Error::CounterExhausted)?;
                    (last, state.counter)
                }
                _ => {
                    state.last_bucket = Some(bucket);
                    state.counter = 0;
                    (bucket, 0)
                }
            }
        };
        trace!(bucket = slot.0, counter = slot.1, "claimed slot");
        Ok(slot)
    }
}

impl<C: Clock> fmt::Display for Shortid<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Shortid(worker={}, epoch={}, abc={})",
            self.worker, self.epoch, self.abc
        )
    }
}

impl<C: Clock> fmt::Debug for Shortid<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shortid")
            .field("worker", &self.worker)
            .field("epoch", &self.epoch)
            .field("abc", &self.abc)
            .finish_non_exhaustive()
    }
}

/// The payload recovered from an id by [`Shortid::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdParts {
    /// Milliseconds since the generator's epoch.
    pub elapsed_ms: u64,
    pub worker: u8,
    /// Position within the millisecond, 0 for the first id.
    pub counter: u64,
}

impl IdParts {
    /// The issue time, given the epoch of the generator that produced the id.
    pub fn timestamp(&self, epoch: Timestamp) -> Option<Timestamp> {
        let elapsed = i64::try_from(self.elapsed_ms).ok()?;
        epoch
            .checked_add(SignedDuration::from_millis(elapsed))
            .ok()
    }
}
