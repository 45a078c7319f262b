use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Produces new identifiers on demand.
///
/// Values are expected to be unique with overwhelming probability, but
/// callers must still tolerate the occasional collision with an id that is
/// already in use.
pub trait IdGenerator: Debug + Send + Sync {
    fn next_id(&self) -> u64;
}

/// Draws identifiers uniformly from the non-zero `u64` range.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> u64 {
        rand::thread_rng().gen_range(1..=u64::MAX)
    }
}

/// Hands out increasing identifiers starting from a given value.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}
