//!
//! #  EcoRide server
//!
//! Loads `ecoride.toml`, connects to MongoDB and MySQL and serves the
//! marketplace over HTTP.
//!

use std::sync::Arc;

use anyhow::Context;
use log::{error, warn};

use ecoride::config;
use ecoride::ledger::MySqlLedger;
use ecoride::marketplace::{MarketSettings, Marketplace, Stores};
use ecoride::notify::LogNotifier;
use ecoride::odm::{self, MongoStore};
use ecoride::routes;

/// The main functions, runs w/ cargo run
#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let config = config::init().await.context("CONFIG failed to launch")?;
    config::setup_logger(&config)
        .await
        .context("logger failed to start")?;

    let db = odm::odm::init(&config)
        .await
        .context("MongoDB is unreachable")?;
    let ledger = MySqlLedger::connect(&config)
        .await
        .context("MySQL is unreachable")?;

    let stores = Stores::new(
        Arc::new(MongoStore::new(db)),
        Arc::new(ledger),
        Arc::new(LogNotifier::new()),
    );
    let market = Marketplace::new(stores, MarketSettings::from(&config));
    warn!("ECORIDE IS LAUNCHING");

    let lift = routes::build_rocket(market).launch().await;

    warn!("ECORIDE OVER");
    if let Err(value) = lift {
        error!("Rocket could not run, error {}", value);
        anyhow::bail!("Rocket stopped with an error: {}", value);
    }
    Ok(())
}
