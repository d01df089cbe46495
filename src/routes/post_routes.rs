use super::*;

use log::info;

use crate::ledger::{DriverProfile, NewVehicle, Vehicle, VehicleUpdate};
use crate::marketplace::RideStatusChange;
use crate::odm::{Booking, NewRide, Review, ReviewInput, Ride, RideUpdate};

///
///Publish a ride
///
///INPUT:  user verification, the ride details
///OUTPUT: the stored ride
///
#[post("/rides", data = "<ride>")]
async fn create_ride(ride: Json<NewRide>, user: AuthUser, state: &State<MarketState>, route: &Route) -> ApiResult<(Status, Json<Ride>)> {
    let ride = state.market.create_ride(user.id, ride.into_inner()).await?;
    info!("Server>>Client:\tApproving action {} for {}", route, user.id);
    Ok((Status::Created, Json(ride)))
}

///
///Edit a forthcoming ride
///
///INPUT:  user verification, ride ID, the fields to change
///OUTPUT: the edited ride
///
#[patch("/rides/<id>", data = "<update>")]
async fn update_ride(id: &str, update: Json<RideUpdate>, user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<Ride>> {
    Ok(Json(state.market.update_ride(user.id, id, update.into_inner()).await?))
}

///
///Delete a ride nobody booked
///
#[delete("/rides/<id>")]
async fn delete_ride(id: &str, user: AuthUser, state: &State<MarketState>, route: &Route) -> ApiResult<Status> {
    state.market.delete_ride(user.id, id).await?;
    info!("Server>>Client:\tApproving action {} for {}", route, user.id);
    Ok(Status::NoContent)
}

///
///Start, finish or cancel a ride
///
///INPUT:  user verification, ride ID, the new status
///OUTPUT: the ride and what happened to its bookings
///
#[post("/rides/<id>/status", data = "<change>")]
async fn change_ride_status(id: &str, change: Json<StatusRequest>, user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<RideStatusChange>> {
    Ok(Json(state.market.change_ride_status(user.id, id, change.status).await?))
}

///
///Retry the bookings a status change left behind
///
#[post("/rides/<id>/cascade")]
async fn resume_cascade(id: &str, user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<RideStatusChange>> {
    Ok(Json(state.market.resume_cascade(user.id, id).await?))
}

///
///Book seats on a ride
///
///INPUT:  user verification, ride ID, seat count
///OUTPUT: the booking
///
#[post("/rides/<id>/bookings", data = "<request>")]
async fn book_ride(id: &str, request: Json<BookingRequest>, user: AuthUser, state: &State<MarketState>, route: &Route) -> ApiResult<(Status, Json<Booking>)> {
    let booking = state.market.create_booking(user.id, id, request.seats).await?;
    info!("Server>>Client:\tApproving action {} for {}", route, user.id);
    Ok((Status::Created, Json(booking)))
}

///
///Cancel a booking and get the credits back
///
#[post("/bookings/<id>/cancel")]
async fn cancel_booking(id: &str, user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<Booking>> {
    Ok(Json(state.market.cancel_booking(user.id, id).await?))
}

///
///Review a completed booking
///
///INPUT:  user verification, booking ID, the review
///OUTPUT: the stored review
///
#[post("/bookings/<id>/review", data = "<review>")]
async fn review_booking(id: &str, review: Json<ReviewInput>, user: AuthUser, state: &State<MarketState>, route: &Route) -> ApiResult<(Status, Json<Review>)> {
    let review = state.market.submit_review(user.id, id, review.into_inner()).await?;
    info!("Server>>Client:\tApproving action {} for {}", route, user.id);
    Ok((Status::Created, Json(review)))
}

///
///Publish or hide a review, webmasters only
///
#[post("/reviews/<id>/publish", data = "<request>")]
async fn publish_review(id: &str, request: Json<PublishRequest>, user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<Review>> {
    Ok(Json(state.market.set_review_published(user.id, id, request.published).await?))
}

///
///Become a driver
///
#[post("/drivers", data = "<request>")]
async fn become_driver(request: Json<DriverRequest>, user: AuthUser, state: &State<MarketState>) -> ApiResult<(Status, Json<DriverProfile>)> {
    let profile = state
        .market
        .become_driver(user.id, request.smoking_allowed, request.animals_allowed)
        .await?;
    Ok((Status::Created, Json(profile)))
}

///
///Register a vehicle
///
#[post("/vehicles", data = "<vehicle>")]
async fn add_vehicle(vehicle: Json<NewVehicle>, user: AuthUser, state: &State<MarketState>) -> ApiResult<(Status, Json<Vehicle>)> {
    let vehicle = state.market.add_vehicle(user.id, vehicle.into_inner()).await?;
    Ok((Status::Created, Json(vehicle)))
}

///
///Edit a vehicle
///
///INPUT:  user verification, vehicle ID, the fields to change
///OUTPUT: the edited vehicle
///
#[patch("/vehicles/<id>", data = "<update>")]
async fn update_vehicle(id: i64, update: Json<VehicleUpdate>, user: AuthUser, state: &State<MarketState>) -> ApiResult<Json<Vehicle>> {
    Ok(Json(state.market.update_vehicle(user.id, id, update.into_inner()).await?))
}

///
///Remove a vehicle no active ride uses
///
#[delete("/vehicles/<id>")]
async fn delete_vehicle(id: i64, user: AuthUser, state: &State<MarketState>, route: &Route) -> ApiResult<Status> {
    state.market.delete_vehicle(user.id, id).await?;
    info!("Server>>Client:\tApproving action {} for {}", route, user.id);
    Ok(Status::NoContent)
}

pub fn post_routes() -> Vec<Route> {
    routes![
        create_ride, update_ride, delete_ride, change_ride_status, resume_cascade,
        book_ride, cancel_booking, review_booking, publish_review, become_driver,
        add_vehicle, update_vehicle, delete_vehicle]
}
