//! # Tally Store
//!
//! Persistence seam for per-country counters. The only primitive the vote
//! path needs is an atomic upsert-increment: create the country's record on
//! first vote, otherwise add one to the chosen counter. Implementations must
//! never read-then-write from the caller's side.
use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    error::PersistenceError,
    models::{CountryTally, Mood},
};

#[async_trait]
pub trait TallyStore: Send + Sync {
    /// Increments `mood` for `country` and returns the record as it stands
    /// right after this increment.
    async fn increment(&self, country: &str, mood: Mood) -> Result<CountryTally, PersistenceError>;

    /// Every stored record, in no particular order.
    async fn all(&self) -> Result<Vec<CountryTally>, PersistenceError>;
}

/// In-process store. Counters live for the lifetime of the process.
#[derive(Default)]
pub struct MemoryTallyStore {
    tallies: Mutex<BTreeMap<String, CountryTally>>,
}

impl MemoryTallyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TallyStore for MemoryTallyStore {
    async fn increment(&self, country: &str, mood: Mood) -> Result<CountryTally, PersistenceError> {
        let mut tallies = self.tallies.lock().map_err(|_| PersistenceError::Poisoned)?;

        let tally = tallies
            .entry(country.to_string())
            .or_insert_with(|| CountryTally::new(country));
        tally.bump(mood);

        Ok(tally.clone())
    }

    async fn all(&self) -> Result<Vec<CountryTally>, PersistenceError> {
        let tallies = self.tallies.lock().map_err(|_| PersistenceError::Poisoned)?;

        Ok(tallies.values().cloned().collect())
    }
}
