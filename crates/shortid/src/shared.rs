use crate::{
    clock::{Clock, SystemClock},
    error::{Error, Result},
    shortid::Shortid,
};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A replaceable handle to a generator, shared by everything holding a clone.
///
/// Replacing the generator is visible to every clone for subsequent calls;
/// calls already in flight finish on the generator they started with.
pub struct SharedShortid<C: Clock = SystemClock> {
    inner: Arc<RwLock<Arc<Shortid<C>>>>,
}

impl<C: Clock> SharedShortid<C> {
    pub fn new(sid: Shortid<C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(sid))),
        }
    }

    /// Returns the current generator.
    pub fn get(&self) -> Result<Arc<Shortid<C>>> {
        let current = self.inner.read().map_err(|_| Error::StatePoisoned)?;
        Ok(Arc::clone(&current))
    }

    /// Swaps in `sid` and returns the generator it replaced.
    pub fn replace(&self, sid: Shortid<C>) -> Result<Arc<Shortid<C>>> {
        debug!(generator = %sid, "replacing shared shortid generator");
        let mut current = self.inner.write().map_err(|_| Error::StatePoisoned)?;
        Ok(std::mem::replace(&mut *current, Arc::new(sid)))
    }

    /// Generates an id with the current generator.
    pub fn generate(&self) -> Result<String> {
        self.get()?.generate()
    }
}

impl Default for SharedShortid<SystemClock> {
    /// Worker 0, the default alphabet and seed 1.
    fn default() -> Self {
        Self::new(Shortid::default())
    }
}

impl<C: Clock> Clone for SharedShortid<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
