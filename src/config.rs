use std::time::Duration;

use mongodb::{error::Error as DbError, options::ClientOptions, Client as MongoClient, Database};
use rocket::futures::TryFutureExt;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::{ensure_indexes_exist, ensure_review_counter_exists, Coll};
use crate::store::Stores;

/// Where the API keeps its data.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// A MongoDB database named by `db_uri` and `db_name`.
    #[default]
    Mongo,
    /// Process memory; everything is lost on shutdown.
    Memory,
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mongo => "mongo",
            Self::Memory => "memory",
        }
    }
}

/// Application configuration, derived from `Rocket.toml`, `ROCKET_*`
/// environment variables, and the `PORT` / `MONGO_URL` overrides. This struct
/// becomes managed state and can be inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    store_backend: StoreBackend,
    // secrets
    db_uri: Option<String>,
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    #[serde(default = "default_store_timeout_ms")]
    store_timeout_ms: u64,
}

fn default_db_name() -> String {
    "portfolio".to_string()
}

fn default_store_timeout_ms() -> u64 {
    5000
}

impl Config {
    /// Which storage backend to build at ignite.
    pub fn store_backend(&self) -> StoreBackend {
        self.store_backend
    }

    /// Connection string for MongoDB, if one was given.
    pub fn db_uri(&self) -> Option<&str> {
        self.db_uri.as_deref()
    }

    /// Name of the MongoDB database holding the collections.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Upper bound on any single storage call.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                for err in e {
                    error!("{err}");
                }
                return Err(rocket);
            }
        };
        if config.store_timeout_ms == 0 {
            error!("`store_timeout_ms` must be greater than zero");
            return Err(rocket);
        }

        Ok(rocket.manage(config))
    }
}

/// A fairing that builds the configured storage backend and places the
/// resulting [`Stores`] into managed state. For MongoDB this connects, ensures
/// the indexes and the review counter exist, and also manages the `Client` and
/// `Database`.
///
/// Must be attached after [`ConfigFairing`].
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.state::<Config>() {
            Some(config) => config.clone(),
            None => {
                error!("Storage was configured before the application config was loaded");
                return Err(rocket);
            }
        };

        if config.store_backend() == StoreBackend::Memory {
            warn!("Using in-memory storage, nothing will survive a restart");
            return Ok(Stores::memory().manage(rocket));
        }

        let db_uri = match config.db_uri() {
            Some(uri) => uri.to_string(),
            None => {
                error!("`db_uri` (or `MONGO_URL`) must be set for the mongo backend");
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let timeout = config.store_timeout();
        let client = match connect(&db_uri, timeout).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(config.db_name());

        if let Err(e) = prepare_database(&db).await {
            error!("Failed to prepare database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        let stores = Stores::mongo(&db, timeout);
        Ok(stores.manage(rocket.manage(client).manage(db)))
    }
}

/// Build a MongoDB client whose server selection and connection attempts give
/// up after `timeout`.
pub async fn connect(uri: &str, timeout: Duration) -> Result<MongoClient, DbError> {
    let mut options = ClientOptions::parse(uri).await?;
    options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);
    MongoClient::with_options(options)
}

/// Create the indexes and counters the stores rely on. Safe to repeat.
pub async fn prepare_database(db: &Database) -> Result<(), DbError> {
    let counters = Coll::from_db(db);
    ensure_indexes_exist(db)
        .and_then(|_| ensure_review_counter_exists(&counters))
        .await
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    fn extract(figment: Figment) -> Config {
        figment.extract().unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = extract(Figment::new());
        assert_eq!(config.store_backend(), StoreBackend::Mongo);
        assert_eq!(config.db_uri(), None);
        assert_eq!(config.db_name(), "portfolio");
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn values_override_defaults() {
        let config = extract(
            Figment::new()
                .merge(Serialized::default("store_backend", "memory"))
                .merge(Serialized::default("db_uri", "mongodb://db:27017"))
                .merge(Serialized::default("store_timeout_ms", 250)),
        );
        assert_eq!(config.store_backend(), StoreBackend::Memory);
        assert_eq!(config.db_uri(), Some("mongodb://db:27017"));
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result = Figment::new()
            .merge(Serialized::default("store_backend", "postgres"))
            .extract::<Config>();
        assert!(result.is_err());
    }

    #[rocket::async_test]
    async fn memory_backend_ignites_without_a_database() {
        let figment = Figment::from(rocket::Config::default()).merge(("store_backend", "memory"));
        let rocket = rocket::custom(figment)
            .attach(ConfigFairing)
            .attach(StoreFairing)
            .ignite()
            .await
            .unwrap();
        assert!(rocket.state::<crate::store::Favorites>().is_some());
        assert!(rocket.state::<MongoClient>().is_none());
    }

    #[rocket::async_test]
    async fn mongo_backend_needs_a_uri() {
        let figment = Figment::from(rocket::Config::default()).merge(("store_backend", "mongo"));
        let result = rocket::custom(figment)
            .attach(ConfigFairing)
            .attach(StoreFairing)
            .ignite()
            .await;
        match result {
            Err(e) => assert!(matches!(
                e.kind(),
                rocket::error::ErrorKind::FailedFairings(_)
            )),
            Ok(_) => panic!("ignite should fail without `db_uri`"),
        }
    }
}
