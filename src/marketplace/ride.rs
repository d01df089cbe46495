//!
//! Documentation of the ride lifecycle.
//! Drivers publish, edit, start, finish, cancel and delete their rides.
//!

use chrono::Utc;
use log::{error, info};
use serde::Serialize;

use super::booking::CascadeReport;
use super::search::RideListing;
use super::Marketplace;
use crate::error::{MarketError, MarketResult};
use crate::ledger::{DriverProfile, UserId, Vehicle};
use crate::odm::{Address, Booking, NewRide, Ride, RideStatus, RideUpdate};

/// A ride after a status change, with what happened to its bookings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideStatusChange {
    pub ride: Ride,
    pub cascade: CascadeReport,
}

fn check_price(credits_per_seat: i64) -> MarketResult<()> {
    if credits_per_seat <= 0 {
        return Err(MarketError::Validation(
            "credits per seat must be positive".to_string(),
        ));
    }
    Ok(())
}

fn check_duration(minutes: i32) -> MarketResult<()> {
    if minutes <= 0 {
        return Err(MarketError::Validation("duration must be positive".to_string()));
    }
    Ok(())
}

fn check_departure(departure: chrono::DateTime<Utc>) -> MarketResult<()> {
    if departure <= Utc::now() {
        return Err(MarketError::Validation(
            "departure date must be in the future".to_string(),
        ));
    }
    Ok(())
}

fn check_address(address: &Address, which: &str) -> MarketResult<()> {
    if address.city.trim().is_empty() {
        return Err(MarketError::Validation(format!("{} city is required", which)));
    }
    Ok(())
}

impl Marketplace {
    /// Publish a ride. The vehicle must belong to the driver and carry the
    /// offered seats.
    ///
    /// # Arguments
    ///
    /// * `driver_id` - The driver publishing the ride
    /// * `ride` - The ride details
    ///
    /// # Log
    ///
    /// Logs the new ride at info.
    pub async fn create_ride(&self, driver_id: UserId, ride: NewRide) -> MarketResult<Ride> {
        self.require_driver(driver_id).await?;
        let vehicle = self.owned_vehicle(driver_id, ride.vehicle_id).await?;

        if ride.total_seats < 1 || ride.total_seats > vehicle.seats {
            return Err(MarketError::Validation(format!(
                "a ride in this vehicle offers between 1 and {} seats",
                vehicle.seats
            )));
        }
        check_price(ride.credits_per_seat)?;
        check_duration(ride.duration_minutes)?;
        check_departure(ride.departure_date)?;
        check_address(&ride.origin, "departure")?;
        check_address(&ride.destination, "destination")?;

        let ride = self.stores.rides.insert_ride(driver_id, ride).await?;
        info!(
            "Ride {} published by driver {}: {} -> {}, {} seat(s) at {} credits",
            ride.id,
            driver_id,
            ride.origin.city,
            ride.destination.city,
            ride.total_seats,
            ride.credits_per_seat
        );
        Ok(ride)
    }

    pub async fn get_ride(&self, ride_id: &str) -> MarketResult<Ride> {
        self.stores
            .rides
            .get_ride(ride_id)
            .await?
            .ok_or(MarketError::RideNotFound)
    }

    /// A ride with its driver card and vehicle
    pub async fn ride_details(&self, ride_id: &str) -> MarketResult<RideListing> {
        let ride = self.get_ride(ride_id).await?;
        self.listing(ride).await
    }

    pub async fn rides_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Ride>> {
        self.stores.rides.rides_by_driver(driver_id).await
    }

    /// Bookings of a ride, for its driver only
    pub async fn bookings_for_ride(&self, driver_id: UserId, ride_id: &str) -> MarketResult<Vec<Booking>> {
        self.owned_ride(driver_id, ride_id).await?;
        self.stores.bookings.bookings_for_ride(ride_id).await
    }

    /// Edit the details of a forthcoming ride. Seat counts can't be edited.
    pub async fn update_ride(&self, driver_id: UserId, ride_id: &str, update: RideUpdate) -> MarketResult<Ride> {
        if update.is_empty() {
            return Err(MarketError::Validation("nothing to update".to_string()));
        }
        let ride = self.owned_ride(driver_id, ride_id).await?;
        if ride.status != RideStatus::Forthcoming {
            return Err(MarketError::PreconditionFailed(
                "only forthcoming rides can be edited".to_string(),
            ));
        }

        if let Some(vehicle_id) = update.vehicle_id {
            let vehicle = self.owned_vehicle(driver_id, vehicle_id).await?;
            if vehicle.seats < ride.total_seats {
                return Err(MarketError::Validation(format!(
                    "this vehicle has {} seats, the ride offers {}",
                    vehicle.seats, ride.total_seats
                )));
            }
        }
        if let Some(credits) = update.credits_per_seat {
            check_price(credits)?;
        }
        if let Some(minutes) = update.duration_minutes {
            check_duration(minutes)?;
        }
        if let Some(departure) = update.departure_date {
            check_departure(departure)?;
        }
        if let Some(origin) = &update.origin {
            check_address(origin, "departure")?;
        }
        if let Some(destination) = &update.destination {
            check_address(destination, "destination")?;
        }

        let updated = self
            .stores
            .rides
            .update_details(ride_id, update)
            .await?
            .ok_or_else(|| MarketError::PreconditionFailed("ride is no longer forthcoming".to_string()))?;
        info!("Ride {} edited by driver {}", ride_id, driver_id);
        Ok(updated)
    }

    /// Start, finish or cancel a ride, then move its bookings along.
    ///
    /// The status is changed by compare-and-set, so of two concurrent calls
    /// only one wins and cascades.
    pub async fn change_ride_status(
        &self,
        driver_id: UserId,
        ride_id: &str,
        status: RideStatus,
    ) -> MarketResult<RideStatusChange> {
        let ride = self.owned_ride(driver_id, ride_id).await?;
        if !ride.status.can_become(status) {
            return Err(MarketError::PreconditionFailed(format!(
                "a {} ride can't become {}",
                ride.status.as_str(),
                status.as_str()
            )));
        }
        if !self.stores.rides.set_status(ride_id, ride.status, status).await? {
            return Err(MarketError::PreconditionFailed(
                "ride status changed concurrently".to_string(),
            ));
        }
        info!(
            "Ride {} went from {} to {}",
            ride_id,
            ride.status.as_str(),
            status.as_str()
        );

        let cascade = self.cascade_ride_status(ride_id, status).await.map_err(|error| {
            error!("Bookings of ride {} were not updated: {}", ride_id, error);
            error
        })?;
        let ride = self.get_ride(ride_id).await?;
        Ok(RideStatusChange { ride, cascade })
    }

    /// Run the cascade of the ride's current status again, for bookings a
    /// previous cascade left behind
    pub async fn resume_cascade(&self, driver_id: UserId, ride_id: &str) -> MarketResult<RideStatusChange> {
        let ride = self.owned_ride(driver_id, ride_id).await?;
        let cascade = self.cascade_ride_status(ride_id, ride.status).await?;
        let ride = self.get_ride(ride_id).await?;
        Ok(RideStatusChange { ride, cascade })
    }

    /// Delete a ride nobody booked. Booked rides have to be canceled instead.
    pub async fn delete_ride(&self, driver_id: UserId, ride_id: &str) -> MarketResult<()> {
        let ride = self.owned_ride(driver_id, ride_id).await?;
        if !ride.booking_ids.is_empty() {
            return Err(MarketError::PreconditionFailed(
                "a booked ride can't be deleted, cancel it instead".to_string(),
            ));
        }
        if !self.stores.rides.delete_ride(ride_id).await? {
            return Err(MarketError::PreconditionFailed(
                "the ride was booked in the meantime".to_string(),
            ));
        }
        info!("Ride {} deleted by driver {}", ride_id, driver_id);
        Ok(())
    }

    async fn owned_ride(&self, driver_id: UserId, ride_id: &str) -> MarketResult<Ride> {
        let ride = self.get_ride(ride_id).await?;
        if ride.driver_id != driver_id {
            return Err(MarketError::Forbidden("not your ride".to_string()));
        }
        Ok(ride)
    }

    pub(super) async fn require_driver(&self, user_id: UserId) -> MarketResult<DriverProfile> {
        self.stores
            .accounts
            .get_driver(user_id)
            .await?
            .ok_or_else(|| MarketError::Forbidden("you need to be a driver".to_string()))
    }

    pub(super) async fn owned_vehicle(&self, driver_id: UserId, vehicle_id: i64) -> MarketResult<Vehicle> {
        let vehicle = self
            .stores
            .accounts
            .get_vehicle(vehicle_id)
            .await?
            .ok_or(MarketError::VehicleNotFound)?;
        if vehicle.driver_id != driver_id {
            return Err(MarketError::Forbidden("not your vehicle".to_string()));
        }
        Ok(vehicle)
    }
}
