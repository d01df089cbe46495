//!
//! Documentation of the routes module.
//! A thin JSON layer over the marketplace. Identity comes from the
//! authentication layer in front of the service as trusted headers.
//!

pub mod get_routes;
pub mod post_routes;
pub mod routes_utils;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::{Build, Rocket, Route, State};

pub use routes_utils::*;

use crate::marketplace::Marketplace;
use get_routes::get_routes;
use post_routes::post_routes;

pub fn routes() -> Vec<Route> {
    let mut routes = get_routes();
    routes.append(&mut post_routes());
    routes
}

/// The Rocket instance serving `market`, ready to launch
pub fn build_rocket(market: Marketplace) -> Rocket<Build> {
    rocket::build()
        .mount("/", routes())
        .register("/", catchers![unauthorized, not_found, unprocessable])
        .manage(MarketState { market })
}
