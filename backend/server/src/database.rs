//! # Redis
//!
//! RAM database.
//!
//! Core purpose is to store per-country mood counters. Also, used for atomic increments.
//!
//! ## Requirements
//!
//! - Fast lookups
//! - Tiny dataset, at most ~250 country codes
//! - Increments from many instances at once must never be lost
//!
//! ## Implementation
//!
//! - Redis hash per counter: `mood:good` and `mood:bad`, field = country code
//! - `HINCRBY` creates the field at 0 before adding, so the first vote for a country is an upsert
//! - Increment and read-back run inside one `MULTI`/`EXEC`, Redis loads operations into a queue
//! - Stats read both hashes in one transaction so good and bad come from the same snapshot
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{
    Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::info;

use crate::{
    error::PersistenceError,
    models::{CountryTally, Mood},
    store::TallyStore,
};

pub const GOOD_KEY: &str = "mood:good";
pub const BAD_KEY: &str = "mood:bad";

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    info!("Connected to Redis");

    Ok(connection_manager)
}

fn counter_key(mood: Mood) -> &'static str {
    match mood {
        Mood::Good => GOOD_KEY,
        Mood::Bad => BAD_KEY,
    }
}

fn merge_counters(good: HashMap<String, u64>, mut bad: HashMap<String, u64>) -> Vec<CountryTally> {
    let mut tallies: Vec<CountryTally> = good
        .into_iter()
        .map(|(country, good)| {
            let bad = bad.remove(&country).unwrap_or(0);
            CountryTally { country, good, bad }
        })
        .collect();

    tallies.extend(
        bad.into_iter()
            .map(|(country, bad)| CountryTally { country, good: 0, bad }),
    );

    // hash iteration order is random
    tallies.sort_by(|a, b| a.country.cmp(&b.country));
    tallies
}

/// Tally store backed by two Redis hashes. The connection manager is created
/// once and cloned per call.
#[derive(Clone)]
pub struct RedisTallyStore {
    connection: ConnectionManager,
}

impl RedisTallyStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, RedisError> {
        Ok(Self::new(init_redis(redis_url).await?))
    }
}

#[async_trait]
impl TallyStore for RedisTallyStore {
    async fn increment(&self, country: &str, mood: Mood) -> Result<CountryTally, PersistenceError> {
        let mut connection = self.connection.clone();

        let (good, bad): (Option<u64>, Option<u64>) = redis::pipe()
            .atomic()
            .hincr(counter_key(mood), country, 1)
            .ignore()
            .hget(GOOD_KEY, country)
            .hget(BAD_KEY, country)
            .query_async(&mut connection)
            .await?;

        Ok(CountryTally {
            country: country.to_string(),
            good: good.unwrap_or(0),
            bad: bad.unwrap_or(0),
        })
    }

    async fn all(&self) -> Result<Vec<CountryTally>, PersistenceError> {
        let mut connection = self.connection.clone();

        let (good, bad): (HashMap<String, u64>, HashMap<String, u64>) = redis::pipe()
            .atomic()
            .hgetall(GOOD_KEY)
            .hgetall(BAD_KEY)
            .query_async(&mut connection)
            .await?;

        Ok(merge_counters(good, bad))
    }
}
