use super::*;

use log::info;

use crate::ledger::{AccountType, ReviewSummary, UserId, Vehicle};
use crate::marketplace::RideListing;
use crate::odm::{Booking, Review, Ride};

///
///Ride details route
///
///INPUT:  ride ID
///OUTPUT: the ride, its driver card and its vehicle
///
#[get("/rides/<id>")]
async fn get_ride(id: &str, state: &State<MarketState>) -> ApiResult<Json<RideListing>> {
    Ok(Json(state.market.ride_details(id).await?))
}

///
///Bookings of a ride, for its driver
///
///INPUT:  user verification, ride ID
///OUTPUT: every booking of the ride
///
#[get("/rides/<id>/bookings")]
async fn ride_bookings(id: &str, user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<Vec<Booking>>> {
    Ok(Json(state.market.bookings_for_ride(user.id, id).await?))
}

///
///Rides published by the caller
///
#[get("/driver-rides")]
async fn driver_rides(user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<Vec<Ride>>> {
    Ok(Json(state.market.rides_by_driver(user.id).await?))
}

///
///Ride search
///
///INPUT:  the search criteria as query parameters
///OUTPUT: matching forthcoming rides, soonest first
///
#[get("/search-rides?<query..>")]
async fn search_rides(query: SearchParams, state: &State<MarketState>, route: &Route) -> ApiResult<Json<Vec<RideListing>>> {
    let search = query.into_search()?;
    let listings = state.market.search_rides(&search).await?;
    info!("Server>>Client:\tSending {} ride(s) for {}", listings.len(), route);
    Ok(Json(listings))
}

///
///Booking details, for its passenger and its driver
///
#[get("/bookings/<id>")]
async fn get_booking(id: &str, user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<Booking>> {
    Ok(Json(state.market.get_booking(user.id, id).await?))
}

///
///Bookings of the caller
///
#[get("/passenger-bookings")]
async fn passenger_bookings(user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<Vec<Booking>>> {
    Ok(Json(state.market.bookings_for_passenger(user.id).await?))
}

///
///Reviews of a driver
///
///INPUT:  driver ID, optional user verification
///OUTPUT: published reviews, or every review for webmasters and the driver
///
#[get("/drivers/<id>/reviews")]
async fn driver_reviews(id: UserId, user: Option<AuthUser>, state: &State<MarketState>) -> ApiResult<Json<Vec<Review>>> {
    let sees_all = user.map_or(false, |user| {
        user.account_type == AccountType::Webmaster || user.id == id
    });
    let reviews = state
        .market
        .reviews_by_driver(id)
        .await?
        .into_iter()
        .filter(|review| sees_all || review.published)
        .collect();
    Ok(Json(reviews))
}

///
///Rating summary of a driver
///
#[get("/drivers/<id>/summary")]
async fn driver_summary(id: UserId, state: &State<MarketState>) -> ApiResult<Json<ReviewSummary>> {
    Ok(Json(state.market.review_summary(id).await?))
}

///
///Vehicle details route
///
#[get("/vehicles/<id>")]
async fn get_vehicle(id: i64, state: &State<MarketState>) -> ApiResult<Json<Vehicle>> {
    Ok(Json(state.market.get_vehicle(id).await?))
}

///
///Vehicles of a driver
///
///INPUT:  user verification, driver ID
///OUTPUT: every vehicle the driver registered
///
#[get("/drivers/<id>/vehicles")]
async fn driver_vehicles(id: UserId, _user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<Vec<Vehicle>>> {
    Ok(Json(state.market.vehicles_by_driver(id).await?))
}

///
///Credit balance of the caller
///
#[get("/balance")]
async fn balance(user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<BalanceBody>> {
    let credits = state.market.balance(user.id).await?;
    Ok(Json(BalanceBody {
        user_id: user.id,
        credits,
    }))
}

pub fn get_routes() -> Vec<Route> {
    routes![
        get_ride, ride_bookings, driver_rides, search_rides, get_booking,
        passenger_bookings, driver_reviews, driver_summary, get_vehicle, driver_vehicles,
        balance]
}
