#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{
    figment::{providers::Env, Figment},
    Build, Rocket,
};

pub mod api;
pub mod config;
pub mod cors;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

pub use config::Config;

use config::{ConfigFairing, StoreFairing};
use cors::CorsFairing;
use logging::LoggerFairing;
use store::Stores;

/// The server as configured by `Rocket.toml` and the environment, with its
/// storage backend built at ignite.
pub fn build() -> Rocket<Build> {
    with_routes(rocket::custom(figment()))
        .attach(ConfigFairing)
        .attach(StoreFairing)
}

/// Rocket's usual figment, plus the plain `PORT` and `MONGO_URL` variables
/// most hosting platforms set.
pub fn figment() -> Figment {
    rocket::Config::figment()
        .merge(Env::raw().only(&["PORT"]).global())
        .merge(
            Env::raw()
                .only(&["MONGO_URL"])
                .map(|_| "db_uri".into())
                .global(),
        )
}

/// The server over an already-built set of stores.
pub fn rocket_for_stores(stores: Stores) -> Rocket<Build> {
    stores.manage(with_routes(rocket::custom(figment())))
}

fn with_routes(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(CorsFairing)
        .attach(LoggerFairing)
}

/// A client over fresh in-memory stores.
#[cfg(test)]
async fn memory_client() -> rocket::local::asynchronous::Client {
    rocket::local::asynchronous::Client::tracked(rocket_for_stores(Stores::memory()))
        .await
        .unwrap()
}

/// A throwaway database with a random name on the server at `ROCKET_DB_URI`.
#[cfg(test)]
async fn mongo_database() -> mongodb::Database {
    let uri =
        std::env::var("ROCKET_DB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = config::connect(&uri, std::time::Duration::from_secs(5))
        .await
        .unwrap();
    let random: u32 = rand::random();
    let name = format!("test{random}");
    info!("Using database {name}");
    client.database(&name)
}

/// A client over MongoDB stores in `db`.
#[cfg(test)]
async fn mongo_client(db: &mongodb::Database) -> rocket::local::asynchronous::Client {
    config::prepare_database(db).await.unwrap();
    let stores = Stores::mongo(db, std::time::Duration::from_secs(5));
    rocket::local::asynchronous::Client::tracked(rocket_for_stores(stores))
        .await
        .unwrap()
}
