//!
//! Documentation of the ODM module.
//! The document side of the marketplace: rides, bookings and reviews, with a
//! MongoDB implementation and an in-memory one.
//!

pub mod memory;
pub mod models;
pub mod odm;
pub mod odm_utils;

pub use memory::InMemoryDocumentStore;
pub use models::*;
pub use odm::MongoStore;

use crate::error::MarketResult;
use crate::ledger::UserId;

/// Ride documents. Every method is atomic on a single document.
#[rocket::async_trait]
pub trait RideStore: Send + Sync {
    /// Store a new forthcoming ride with all its seats free
    async fn insert_ride(&self, driver_id: UserId, ride: NewRide) -> MarketResult<Ride>;

    async fn get_ride(&self, id: &str) -> MarketResult<Option<Ride>>;

    /// Add `delta` to the remaining seats, only if the result stays in
    /// `[0, totalSeats]`. Returns whether the adjustment happened.
    async fn try_seat_adjust(&self, id: &str, delta: i32) -> MarketResult<bool>;

    /// Take `seats` seats, only while the ride is forthcoming and has them free
    async fn reserve_seats(&self, id: &str, seats: i32) -> MarketResult<bool>;

    async fn append_booking(&self, ride_id: &str, booking_id: &str) -> MarketResult<()>;

    async fn remove_booking(&self, ride_id: &str, booking_id: &str) -> MarketResult<()>;

    /// Compare-and-set of the ride status. Returns whether `from` was replaced.
    async fn set_status(&self, id: &str, from: RideStatus, to: RideStatus) -> MarketResult<bool>;

    /// Apply detail edits to a forthcoming ride, `None` when no such ride
    async fn update_details(&self, id: &str, update: RideUpdate) -> MarketResult<Option<Ride>>;

    /// Forthcoming rides matching `filter`, ascending departure time
    async fn find_rides(&self, filter: &RideFilter) -> MarketResult<Vec<Ride>>;

    async fn rides_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Ride>>;

    /// Remove a ride that carries no booking. Returns whether it was removed.
    async fn delete_ride(&self, id: &str) -> MarketResult<bool>;
}

#[rocket::async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, booking: NewBooking) -> MarketResult<Booking>;

    async fn get_booking(&self, id: &str) -> MarketResult<Option<Booking>>;

    /// Move to `to` only from one of `from`. Returns the updated booking when
    /// this call made the transition, `None` otherwise.
    async fn transition_status(
        &self,
        id: &str,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> MarketResult<Option<Booking>>;

    async fn bookings_for_ride(&self, ride_id: &str) -> MarketResult<Vec<Booking>>;

    async fn bookings_for_passenger(&self, passenger_id: UserId) -> MarketResult<Vec<Booking>>;

    async fn delete_booking(&self, id: &str) -> MarketResult<bool>;
}

#[rocket::async_trait]
pub trait ReviewStore: Send + Sync {
    async fn insert_review(&self, review: NewReview) -> MarketResult<Review>;

    async fn reviews_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Review>>;

    async fn set_published(&self, id: &str, published: bool) -> MarketResult<Option<Review>>;

    async fn delete_review(&self, id: &str) -> MarketResult<bool>;
}
