//! # Identity Source
//!
//! [`IdGenerator`] produces the stream of unique identifiers used for
//! `unique_id` attribute defaults. The producer is pluggable; the default
//! draws 128-bit random values (v4 UUIDs), for which the collision
//! probability is negligible.
//!
//! The generator keeps one value of read-ahead so that [`peek`] can report
//! the next identifier without consuming it.
//!
//! [`peek`]: IdGenerator::peek

use crate::types::UniqueId;
use std::fmt;
use uuid::Uuid;

/// A stateful source of unique identifiers.
pub struct IdGenerator {
    read: Box<dyn FnMut() -> UniqueId>,
    current: UniqueId,
}

impl IdGenerator {
    /// A generator backed by 128-bit random values.
    #[must_use]
    pub fn random() -> Self {
        Self::with_source(|| UniqueId(Uuid::new_v4().as_u128()))
    }

    /// A generator backed by an arbitrary zero-argument producer.
    ///
    /// The producer is called once per consumed identifier; it must never
    /// repeat a value. Tests typically install a sequential counter here.
    pub fn with_source(mut read: impl FnMut() -> UniqueId + 'static) -> Self {
        let current = read();
        Self {
            read: Box::new(read),
            current,
        }
    }

    /// A deterministic generator counting up from zero.
    #[must_use]
    pub fn sequential() -> Self {
        let mut counter: u128 = 0;
        Self::with_source(move || {
            let id = UniqueId(counter);
            counter += 1;
            id
        })
    }

    /// The next identifier, without consuming it. Idempotent.
    #[must_use]
    pub fn peek(&self) -> UniqueId {
        self.current
    }

    /// Consume and return the next identifier.
    pub fn next_id(&mut self) -> UniqueId {
        let id = self.current;
        self.current = (self.read)();
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::random()
    }
}

impl Iterator for IdGenerator {
    type Item = UniqueId;

    fn next(&mut self) -> Option<UniqueId> {
        Some(self.next_id())
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("current", &self.current)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
