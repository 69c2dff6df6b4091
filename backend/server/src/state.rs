use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{
    config::{Config, TallyBackend},
    database::RedisTallyStore,
    geo::GeoTable,
    live::LiveFeed,
    resolver::CountryResolver,
    store::{MemoryTallyStore, TallyStore},
    votes::Aggregator,
};

pub struct State {
    pub config: Config,
    pub resolver: CountryResolver,
    pub aggregator: Aggregator,
    pub live: LiveFeed,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let store: Arc<dyn TallyStore> = match config.backend {
            TallyBackend::Redis => Arc::new(
                RedisTallyStore::connect(&config.redis_url)
                    .await
                    .context("Failed to connect to Redis")?,
            ),
            TallyBackend::Memory => {
                warn!("Using in-memory tally store, votes are lost on restart");
                Arc::new(MemoryTallyStore::new())
            }
        };

        let geo = match &config.geoip_table {
            Some(path) => GeoTable::load(path)
                .with_context(|| format!("Failed to load GeoIP table {}", path.display()))?,
            None => {
                info!("GEOIP_TABLE not set, IP lookup disabled");
                GeoTable::empty()
            }
        };

        Ok(Self::with_parts(config, store, geo))
    }

    pub fn with_parts(config: Config, store: Arc<dyn TallyStore>, geo: GeoTable) -> Arc<Self> {
        let resolver = CountryResolver::new(
            config.resolution_order.clone(),
            config.default_country.clone(),
            geo,
        );
        let aggregator = Aggregator::new(store, config.store_timeout);
        let live = LiveFeed::new(config.live_capacity);

        Arc::new(Self {
            config,
            resolver,
            aggregator,
            live,
        })
    }
}
