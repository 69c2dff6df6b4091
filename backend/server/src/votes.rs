use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::timeout;

use crate::{
    error::{PersistenceError, ValidationError, VoteError},
    models::{CountryTally, Mood},
    store::TallyStore,
};

/// Validates moods and applies them to the tally store. Holds no counters of
/// its own.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn TallyStore>,
    store_timeout: Duration,
}

impl Aggregator {
    pub fn new(store: Arc<dyn TallyStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, PersistenceError>>,
    ) -> Result<T, PersistenceError> {
        timeout(self.store_timeout, call)
            .await
            .map_err(|_| PersistenceError::Timeout(self.store_timeout))?
    }

    /// Counts one vote for `country`. Invalid moods are rejected before the
    /// store is touched.
    pub async fn submit_vote(
        &self,
        mood_raw: Option<&str>,
        country: &str,
    ) -> Result<(Mood, CountryTally), VoteError> {
        let mood: Mood = mood_raw.ok_or(ValidationError)?.parse()?;

        let tally = self.bounded(self.store.increment(country, mood)).await?;

        Ok((mood, tally))
    }

    /// All tallies, most votes first.
    pub async fn all_tallies(&self) -> Result<Vec<CountryTally>, PersistenceError> {
        let mut tallies = self.bounded(self.store.all()).await?;

        tallies.sort_by(|a, b| b.total().cmp(&a.total()));

        Ok(tallies)
    }
}
