//!
//! In-memory document store, used by the tests and by local runs without MongoDB.
//!

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use bson::oid::ObjectId;

use super::models::*;
use super::odm_utils::{apply_ride_update, doc_to_ride, new_ride_document, ride_matches};
use super::{BookingStore, ReviewStore, RideStore};
use crate::error::{MarketError, MarketResult};
use crate::ledger::UserId;

/// One mutex per collection, so every call is atomic on its documents.
/// Keys are ObjectId hex strings, which sort in creation order.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    rides: Mutex<BTreeMap<String, Ride>>,
    bookings: Mutex<BTreeMap<String, Booking>>,
    reviews: Mutex<BTreeMap<String, Review>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MarketResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| MarketError::StoreUnavailable("document lock poisoned".to_string()))
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl RideStore for InMemoryDocumentStore {
    async fn insert_ride(&self, driver_id: UserId, ride: NewRide) -> MarketResult<Ride> {
        let mut document = new_ride_document(driver_id, ride);
        document.id = Some(ObjectId::new());
        let ride = doc_to_ride(&document);
        lock(&self.rides)?.insert(ride.id.clone(), ride.clone());
        Ok(ride)
    }

    async fn get_ride(&self, id: &str) -> MarketResult<Option<Ride>> {
        Ok(lock(&self.rides)?.get(id).cloned())
    }

    async fn try_seat_adjust(&self, id: &str, delta: i32) -> MarketResult<bool> {
        let mut rides = lock(&self.rides)?;
        let Some(ride) = rides.get_mut(id) else {
            return Ok(false);
        };
        let remaining = ride.remaining_seats + delta;
        if remaining < 0 || remaining > ride.total_seats {
            return Ok(false);
        }
        ride.remaining_seats = remaining;
        Ok(true)
    }

    async fn reserve_seats(&self, id: &str, seats: i32) -> MarketResult<bool> {
        let mut rides = lock(&self.rides)?;
        let Some(ride) = rides.get_mut(id) else {
            return Ok(false);
        };
        if ride.status != RideStatus::Forthcoming || ride.remaining_seats < seats {
            return Ok(false);
        }
        ride.remaining_seats -= seats;
        Ok(true)
    }

    async fn append_booking(&self, ride_id: &str, booking_id: &str) -> MarketResult<()> {
        let mut rides = lock(&self.rides)?;
        let ride = rides.get_mut(ride_id).ok_or(MarketError::RideNotFound)?;
        if !ride.booking_ids.iter().any(|id| id == booking_id) {
            ride.booking_ids.push(booking_id.to_string());
        }
        Ok(())
    }

    async fn remove_booking(&self, ride_id: &str, booking_id: &str) -> MarketResult<()> {
        if let Some(ride) = lock(&self.rides)?.get_mut(ride_id) {
            ride.booking_ids.retain(|id| id != booking_id);
        }
        Ok(())
    }

    async fn set_status(&self, id: &str, from: RideStatus, to: RideStatus) -> MarketResult<bool> {
        let mut rides = lock(&self.rides)?;
        match rides.get_mut(id) {
            Some(ride) if ride.status == from => {
                ride.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_details(&self, id: &str, update: RideUpdate) -> MarketResult<Option<Ride>> {
        let mut rides = lock(&self.rides)?;
        match rides.get_mut(id) {
            Some(ride) if ride.status == RideStatus::Forthcoming => {
                apply_ride_update(ride, update);
                Ok(Some(ride.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_rides(&self, filter: &RideFilter) -> MarketResult<Vec<Ride>> {
        let mut rides: Vec<Ride> = lock(&self.rides)?
            .values()
            .filter(|ride| ride_matches(ride, filter))
            .cloned()
            .collect();
        rides.sort_by_key(|ride| ride.departure_date);
        Ok(rides)
    }

    async fn rides_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Ride>> {
        let mut rides: Vec<Ride> = lock(&self.rides)?
            .values()
            .filter(|ride| ride.driver_id == driver_id)
            .cloned()
            .collect();
        rides.sort_by_key(|ride| ride.departure_date);
        Ok(rides)
    }

    async fn delete_ride(&self, id: &str) -> MarketResult<bool> {
        let mut rides = lock(&self.rides)?;
        let unbooked = rides
            .get(id)
            .map_or(false, |ride| ride.booking_ids.is_empty());
        if unbooked {
            rides.remove(id);
        }
        Ok(unbooked)
    }
}

#[rocket::async_trait]
impl BookingStore for InMemoryDocumentStore {
    async fn insert_booking(&self, booking: NewBooking) -> MarketResult<Booking> {
        let booking = Booking {
            id: ObjectId::new().to_hex(),
            ride_id: booking.ride_id,
            passenger_id: booking.passenger_id,
            driver_id: booking.driver_id,
            seats: booking.seats,
            total_credits: booking.total_credits,
            status: BookingStatus::Forthcoming,
        };
        lock(&self.bookings)?.insert(booking.id.clone(), booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, id: &str) -> MarketResult<Option<Booking>> {
        Ok(lock(&self.bookings)?.get(id).cloned())
    }

    async fn transition_status(
        &self,
        id: &str,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> MarketResult<Option<Booking>> {
        let mut bookings = lock(&self.bookings)?;
        match bookings.get_mut(id) {
            Some(booking) if from.contains(&booking.status) => {
                booking.status = to;
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn bookings_for_ride(&self, ride_id: &str) -> MarketResult<Vec<Booking>> {
        Ok(lock(&self.bookings)?
            .values()
            .filter(|booking| booking.ride_id == ride_id)
            .cloned()
            .collect())
    }

    async fn bookings_for_passenger(&self, passenger_id: UserId) -> MarketResult<Vec<Booking>> {
        Ok(lock(&self.bookings)?
            .values()
            .filter(|booking| booking.passenger_id == passenger_id)
            .cloned()
            .collect())
    }

    async fn delete_booking(&self, id: &str) -> MarketResult<bool> {
        Ok(lock(&self.bookings)?.remove(id).is_some())
    }
}

#[rocket::async_trait]
impl ReviewStore for InMemoryDocumentStore {
    async fn insert_review(&self, review: NewReview) -> MarketResult<Review> {
        let review = Review {
            id: ObjectId::new().to_hex(),
            booking_id: review.booking_id,
            passenger_id: review.passenger_id,
            driver_id: review.driver_id,
            rating: review.rating,
            title: review.title,
            comment: review.comment,
            complaint: review.complaint,
            was_ride_ok: review.was_ride_ok,
            published: false,
        };
        lock(&self.reviews)?.insert(review.id.clone(), review.clone());
        Ok(review)
    }

    async fn reviews_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Review>> {
        Ok(lock(&self.reviews)?
            .values()
            .filter(|review| review.driver_id == driver_id)
            .cloned()
            .collect())
    }

    async fn set_published(&self, id: &str, published: bool) -> MarketResult<Option<Review>> {
        let mut reviews = lock(&self.reviews)?;
        Ok(reviews.get_mut(id).map(|review| {
            review.published = published;
            review.clone()
        }))
    }

    async fn delete_review(&self, id: &str) -> MarketResult<bool> {
        Ok(lock(&self.reviews)?.remove(id).is_some())
    }
}
