//!
//! Documentation of the booking flows.
//! Creating a booking debits the passenger, takes the seats, stores the booking
//! and links it to the ride. Canceling one walks the same steps backwards.
//!

use log::{error, info, warn};
use serde::Serialize;

use super::{with_retries, Marketplace};
use crate::error::{MarketError, MarketResult};
use crate::ledger::UserId;
use crate::odm::{Booking, BookingId, BookingStatus, NewBooking, RideStatus};

/// Outcome of pushing a ride status onto its bookings
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    /// Bookings moved by this cascade
    pub updated: Vec<BookingId>,
    /// Bookings left behind after their own saga failed, see the error log
    pub failed: Vec<BookingId>,
}

/// A passenger id that is unknown to the ledger is a missing passenger
fn as_passenger(error: MarketError) -> MarketError {
    match error {
        MarketError::UserNotFound => MarketError::PassengerNotFound,
        other => other,
    }
}

impl Marketplace {
    /// Book `seats` seats of a ride for a passenger.
    ///
    /// # Arguments
    ///
    /// * `passenger_id` - The passenger paying for the seats
    /// * `ride_id` - The ride to book
    /// * `seats` - How many seats to take, at least one
    ///
    /// # Steps
    ///
    /// Every step after the debit is undone in reverse order when a later one
    /// fails, so a failed call leaves balance, seats and bookings as they were.
    ///
    /// 1. Debit `seats * creditsPerSeat` from the passenger.
    /// 2. Reserve the seats, only while the ride is forthcoming.
    /// 3. Insert the booking with the price snapshot.
    /// 4. Link the booking to the ride.
    /// 5. Notify the passenger, in the background.
    ///
    /// # Log
    ///
    /// Logs every compensation at warn, and a compensation that failed at error.
    pub async fn create_booking(
        &self,
        passenger_id: UserId,
        ride_id: &str,
        seats: i32,
    ) -> MarketResult<Booking> {
        if seats < 1 {
            return Err(MarketError::Validation(
                "a booking needs at least one seat".to_string(),
            ));
        }

        let ride = self
            .stores
            .rides
            .get_ride(ride_id)
            .await?
            .ok_or(MarketError::RideNotFound)?;
        if ride.status != RideStatus::Forthcoming {
            return Err(MarketError::RideNotBookable);
        }
        if ride.driver_id == passenger_id {
            return Err(MarketError::Forbidden(
                "drivers can't book their own ride".to_string(),
            ));
        }
        let cost = ride
            .credits_per_seat
            .checked_mul(i64::from(seats))
            .ok_or_else(|| MarketError::Validation("booking price is out of range".to_string()))?;

        let available = self
            .stores
            .ledger
            .get_balance(passenger_id)
            .await
            .map_err(as_passenger)?;
        if available < cost {
            return Err(MarketError::InsufficientCredits {
                needed: cost,
                available,
            });
        }
        if ride.remaining_seats < seats {
            return Err(MarketError::InsufficientSeats {
                requested: seats,
                remaining: ride.remaining_seats,
            });
        }

        // The ledger refuses the debit if a concurrent spend got there first
        self.stores
            .ledger
            .adjust_balance(passenger_id, -cost)
            .await
            .map_err(as_passenger)?;

        match self.stores.rides.reserve_seats(ride_id, seats).await {
            Ok(true) => {}
            Ok(false) => {
                self.compensate_debit(passenger_id, cost, ride_id).await;
                return Err(self.reservation_refusal(ride_id, seats).await);
            }
            Err(error) => {
                self.compensate_debit(passenger_id, cost, ride_id).await;
                return Err(error);
            }
        }

        let new_booking = NewBooking {
            ride_id: ride_id.to_string(),
            passenger_id,
            driver_id: ride.driver_id,
            seats,
            total_credits: cost,
        };
        let booking = match self.stores.bookings.insert_booking(new_booking).await {
            Ok(booking) => booking,
            Err(error) => {
                self.compensate_seats(ride_id, seats).await;
                self.compensate_debit(passenger_id, cost, ride_id).await;
                return Err(error);
            }
        };

        if let Err(error) = self.stores.rides.append_booking(ride_id, &booking.id).await {
            self.abandon_booking(&booking).await;
            return Err(error);
        }

        info!(
            "Booking {} created: {} seat(s) on ride {} for passenger {} ({} credits)",
            booking.id, seats, ride_id, passenger_id, cost
        );

        // A status change between the reservation and the link may have missed
        // this booking, which must not stay live on a closed ride
        match self.stores.rides.get_ride(ride_id).await {
            Ok(Some(current)) if current.status != RideStatus::Forthcoming => {
                return self.settle_late_booking(&booking, current.status).await;
            }
            Ok(_) => {}
            Err(error) => warn!("Could not re-read ride {} after booking {}: {}", ride_id, booking.id, error),
        }

        self.notify_passenger(&booking);
        Ok(booking)
    }

    /// A booking linked after its ride left `forthcoming`.
    ///
    /// Kept when the status cascade already carried it along, canceled and
    /// refunded when the cascade missed it.
    async fn settle_late_booking(&self, booking: &Booking, ride_status: RideStatus) -> MarketResult<Booking> {
        let latest = self
            .stores
            .bookings
            .get_booking(&booking.id)
            .await?
            .unwrap_or_else(|| booking.clone());

        match latest.status {
            BookingStatus::Forthcoming => {
                warn!(
                    "Ride {} became {} while booking {} was created, canceling it",
                    latest.ride_id,
                    ride_status.as_str(),
                    latest.id
                );
                if self.release_booking(&latest).await?.is_none() {
                    self.unlink_settled(&latest).await;
                }
                Err(MarketError::RideNotBookable)
            }
            BookingStatus::Canceled => {
                // the cascade refunded it, maybe before the link existed
                self.unlink_settled(&latest).await;
                Err(MarketError::RideNotBookable)
            }
            _ => {
                info!(
                    "Booking {} followed ride {} to {}",
                    latest.id,
                    latest.ride_id,
                    latest.status.as_str()
                );
                Ok(latest)
            }
        }
    }

    /// Cancel a booking on behalf of its passenger and refund the snapshot.
    ///
    /// Canceling an already canceled booking changes nothing and returns it.
    pub async fn cancel_booking(&self, passenger_id: UserId, booking_id: &str) -> MarketResult<Booking> {
        let booking = self
            .stores
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(MarketError::BookingNotFound)?;
        if booking.passenger_id != passenger_id {
            return Err(MarketError::Forbidden(
                "only the passenger can cancel a booking".to_string(),
            ));
        }

        if let Some(canceled) = self.release_booking(&booking).await? {
            return Ok(canceled);
        }

        let current = self
            .stores
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(MarketError::BookingNotFound)?;
        if current.status == BookingStatus::Canceled {
            info!("Booking {} was already canceled", booking_id);
            return Ok(current);
        }
        Err(MarketError::PreconditionFailed(format!(
            "a {} booking can't be canceled",
            current.status.as_str()
        )))
    }

    /// A booking, visible to its passenger and to the driver of its ride
    pub async fn get_booking(&self, viewer: UserId, booking_id: &str) -> MarketResult<Booking> {
        let booking = self
            .stores
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(MarketError::BookingNotFound)?;
        if booking.passenger_id != viewer && booking.driver_id != viewer {
            return Err(MarketError::Forbidden("not your booking".to_string()));
        }
        Ok(booking)
    }

    pub async fn bookings_for_passenger(&self, passenger_id: UserId) -> MarketResult<Vec<Booking>> {
        self.stores.bookings.bookings_for_passenger(passenger_id).await
    }

    /// Move every active booking of a ride along with the ride's new status.
    ///
    /// A canceled ride cancels and refunds each booking. Bookings are handled
    /// one by one, and one failing does not stop the others.
    pub async fn cascade_ride_status(&self, ride_id: &str, status: RideStatus) -> MarketResult<CascadeReport> {
        let bookings = self.stores.bookings.bookings_for_ride(ride_id).await?;
        let mut report = CascadeReport::default();

        for booking in bookings.into_iter().filter(|booking| booking.status.is_active()) {
            match self.follow_ride_status(&booking, status).await {
                Ok(Some(updated)) => report.updated.push(updated.id),
                Ok(None) => {}
                Err(error) => {
                    error!(
                        "Booking {} did not follow ride {} to {}: {}",
                        booking.id,
                        ride_id,
                        status.as_str(),
                        error
                    );
                    report.failed.push(booking.id);
                }
            }
        }

        info!(
            "Ride {} is {}: {} booking(s) updated, {} failed",
            ride_id,
            status.as_str(),
            report.updated.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Bring one booking to the status matching its ride.
    /// Returns the booking when this call moved it.
    async fn follow_ride_status(&self, booking: &Booking, status: RideStatus) -> MarketResult<Option<Booking>> {
        match status {
            RideStatus::Forthcoming => Ok(None),
            RideStatus::Canceled => self.release_booking(booking).await,
            RideStatus::Ongoing | RideStatus::Completed => {
                let target = BookingStatus::from(status);
                let from: Vec<BookingStatus> = BookingStatus::ACTIVE
                    .into_iter()
                    .filter(|active| *active != target)
                    .collect();
                let moved = self
                    .stores
                    .bookings
                    .transition_status(&booking.id, &from, target)
                    .await?;
                if let Some(updated) = &moved {
                    self.notify_passenger(updated);
                }
                Ok(moved)
            }
        }
    }

    /// Cancel an active booking: give its seats back, unlink it from the ride
    /// and refund the passenger.
    ///
    /// Returns `None` when the booking was no longer active, so a booking is
    /// refunded at most once however many callers race on it.
    async fn release_booking(&self, booking: &Booking) -> MarketResult<Option<Booking>> {
        let Some(canceled) = self
            .stores
            .bookings
            .transition_status(&booking.id, &BookingStatus::ACTIVE, BookingStatus::Canceled)
            .await?
        else {
            return Ok(None);
        };
        let previous = if booking.status.is_active() {
            booking.status
        } else {
            BookingStatus::Forthcoming
        };

        let rides = &self.stores.rides;
        let ride_id = canceled.ride_id.as_str();
        let booking_id = canceled.id.as_str();
        let seats = canceled.seats;

        let released = match with_retries("Seat release", move || rides.try_seat_adjust(ride_id, seats)).await {
            Ok(released) => released,
            Err(error) => {
                error!("Seats of booking {} could not be released: {}", booking_id, error);
                self.revert_cancel(booking_id, previous).await;
                return Err(error);
            }
        };
        if !released {
            error!(
                "Ride {} refused {} returned seat(s) of booking {}",
                ride_id, seats, booking_id
            );
        }

        if let Err(error) = with_retries("Booking unlink", move || rides.remove_booking(ride_id, booking_id)).await {
            warn!("Booking {} stays listed on ride {}: {}", booking_id, ride_id, error);
        }

        let ledger = &self.stores.ledger;
        let passenger_id = canceled.passenger_id;
        let credits = canceled.total_credits;
        if let Err(error) = with_retries("Refund", move || ledger.adjust_balance(passenger_id, credits)).await {
            error!(
                "Refund of booking {} failed, rolling the cancellation back: {}",
                booking_id, error
            );
            if released {
                self.retake_seats(ride_id, seats).await;
            }
            if let Err(relink) = rides.append_booking(ride_id, booking_id).await {
                error!("Booking {} could not be relinked to ride {}: {}", booking_id, ride_id, relink);
            }
            self.revert_cancel(booking_id, previous).await;
            return Err(error);
        }

        info!(
            "Booking {} canceled, {} credits refunded to passenger {}",
            booking_id, credits, passenger_id
        );
        self.notify_passenger(&canceled);
        Ok(Some(canceled))
    }

    /// Explain why `reserve_seats` said no
    async fn reservation_refusal(&self, ride_id: &str, seats: i32) -> MarketError {
        match self.stores.rides.get_ride(ride_id).await {
            Ok(Some(ride)) if ride.status == RideStatus::Forthcoming => MarketError::InsufficientSeats {
                requested: seats,
                remaining: ride.remaining_seats,
            },
            Ok(Some(_)) => MarketError::RideNotBookable,
            Ok(None) => MarketError::RideNotFound,
            Err(error) => error,
        }
    }

    async fn compensate_debit(&self, passenger_id: UserId, credits: i64, ride_id: &str) {
        let ledger = &self.stores.ledger;
        match with_retries("Refund", move || ledger.adjust_balance(passenger_id, credits)).await {
            Ok(()) => warn!(
                "Refunded {} credits to passenger {} after a failed booking on ride {}",
                credits, passenger_id, ride_id
            ),
            Err(error) => error!(
                "Refund of {} credits to passenger {} (ride {}) failed: {}",
                credits, passenger_id, ride_id, error
            ),
        }
    }

    async fn compensate_seats(&self, ride_id: &str, seats: i32) {
        let rides = &self.stores.rides;
        match with_retries("Seat release", move || rides.try_seat_adjust(ride_id, seats)).await {
            Ok(true) => warn!("Released {} seat(s) of ride {} after a failed booking", seats, ride_id),
            Ok(false) => error!("Ride {} refused {} released seat(s)", ride_id, seats),
            Err(error) => error!("Seats of ride {} could not be released: {}", ride_id, error),
        }
    }

    /// Undo a booking that could not be linked to its ride.
    ///
    /// The booking is claimed through its status first: a concurrent ride
    /// cancel that already refunded it must not be refunded again.
    async fn abandon_booking(&self, booking: &Booking) {
        let bookings = &self.stores.bookings;
        let booking_id = booking.id.as_str();
        let claim = move || {
            bookings.transition_status(booking_id, &BookingStatus::ACTIVE, BookingStatus::Canceled)
        };
        match with_retries("Booking claim", claim).await {
            Ok(Some(_)) => {
                match with_retries("Booking removal", move || bookings.delete_booking(booking_id)).await {
                    Ok(_) => warn!("Removed unlinked booking {}", booking_id),
                    Err(error) => error!("Unlinked booking {} could not be removed: {}", booking_id, error),
                }
                self.compensate_seats(&booking.ride_id, booking.seats).await;
                self.compensate_debit(booking.passenger_id, booking.total_credits, &booking.ride_id)
                    .await;
            }
            Ok(None) => warn!(
                "Booking {} was settled by a ride update before its rollback",
                booking_id
            ),
            Err(error) => error!(
                "Booking {} could not be claimed for rollback, leaving it in place: {}",
                booking_id, error
            ),
        }
    }

    /// Drop the link of a booking somebody else canceled
    async fn unlink_settled(&self, booking: &Booking) {
        if let Err(error) = self.stores.rides.remove_booking(&booking.ride_id, &booking.id).await {
            warn!("Booking {} stays listed on ride {}: {}", booking.id, booking.ride_id, error);
        }
    }

    async fn retake_seats(&self, ride_id: &str, seats: i32) {
        match self.stores.rides.try_seat_adjust(ride_id, -seats).await {
            Ok(true) => {}
            Ok(false) => error!("Ride {} has no room left to retake {} seat(s)", ride_id, seats),
            Err(error) => error!("Seats of ride {} could not be retaken: {}", ride_id, error),
        }
    }

    async fn revert_cancel(&self, booking_id: &str, previous: BookingStatus) {
        match self
            .stores
            .bookings
            .transition_status(booking_id, &[BookingStatus::Canceled], previous)
            .await
        {
            Ok(Some(_)) => warn!("Booking {} is {} again", booking_id, previous.as_str()),
            Ok(None) => error!("Booking {} left its canceled status before the rollback", booking_id),
            Err(error) => error!("Booking {} could not be restored: {}", booking_id, error),
        }
    }
}
