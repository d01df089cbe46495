//! Driver capability, vehicles and balances

use log::info;

use super::Marketplace;
use crate::error::{MarketError, MarketResult};
use crate::ledger::{DriverProfile, NewVehicle, ReviewSummary, UserId, Vehicle, VehicleUpdate};
use crate::odm::{Ride, RideStatus};

fn check_vehicle_seats(seats: i32) -> MarketResult<()> {
    if seats < 1 {
        return Err(MarketError::Validation(
            "a vehicle needs at least one passenger seat".to_string(),
        ));
    }
    Ok(())
}

fn check_plate(plate: &str) -> MarketResult<()> {
    if plate.trim().is_empty() {
        return Err(MarketError::Validation("license plate is required".to_string()));
    }
    Ok(())
}

impl Marketplace {
    /// Make a user a driver, with an empty rating summary
    pub async fn become_driver(
        &self,
        user_id: UserId,
        smoking_allowed: bool,
        animals_allowed: bool,
    ) -> MarketResult<DriverProfile> {
        let profile = self
            .stores
            .accounts
            .create_driver(DriverProfile {
                user_id,
                smoking_allowed,
                animals_allowed,
            })
            .await?;
        if self.stores.accounts.get_summary(user_id).await?.is_none() {
            self.stores
                .accounts
                .upsert_summary(&ReviewSummary::empty(user_id))
                .await?;
        }
        info!("User {} is now a driver", user_id);
        Ok(profile)
    }

    pub async fn add_vehicle(&self, driver_id: UserId, vehicle: NewVehicle) -> MarketResult<Vehicle> {
        self.require_driver(driver_id).await?;
        check_vehicle_seats(vehicle.seats)?;
        check_plate(&vehicle.license_plate)?;
        let vehicle = self.stores.accounts.add_vehicle(driver_id, vehicle).await?;
        info!(
            "Vehicle {} ({} {}) added for driver {}",
            vehicle.id, vehicle.brand, vehicle.model, driver_id
        );
        Ok(vehicle)
    }

    pub async fn get_vehicle(&self, vehicle_id: i64) -> MarketResult<Vehicle> {
        self.stores
            .accounts
            .get_vehicle(vehicle_id)
            .await?
            .ok_or(MarketError::VehicleNotFound)
    }

    /// Vehicles registered by a driver
    ///
    /// # Errors
    ///
    /// * `DriverNotFound` - `driver_id` has no driver capability
    pub async fn vehicles_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Vehicle>> {
        if self.stores.accounts.get_driver(driver_id).await?.is_none() {
            return Err(MarketError::DriverNotFound);
        }
        self.stores.accounts.vehicles_by_driver(driver_id).await
    }

    /// Edit a vehicle of the caller.
    ///
    /// The seat count can't drop below what a forthcoming ride in this
    /// vehicle already offers.
    pub async fn update_vehicle(
        &self,
        driver_id: UserId,
        vehicle_id: i64,
        update: VehicleUpdate,
    ) -> MarketResult<Vehicle> {
        if update.is_empty() {
            return Err(MarketError::Validation("nothing to update".to_string()));
        }
        self.owned_vehicle(driver_id, vehicle_id).await?;
        if let Some(plate) = &update.license_plate {
            check_plate(plate)?;
        }
        if let Some(seats) = update.seats {
            check_vehicle_seats(seats)?;
            let offered = self
                .rides_in_vehicle(driver_id, vehicle_id, &[RideStatus::Forthcoming])
                .await?
                .iter()
                .map(|ride| ride.total_seats)
                .max();
            if let Some(offered) = offered.filter(|offered| *offered > seats) {
                return Err(MarketError::PreconditionFailed(format!(
                    "a forthcoming ride in this vehicle offers {} seats",
                    offered
                )));
            }
        }

        let vehicle = self
            .stores
            .accounts
            .update_vehicle(vehicle_id, &update)
            .await?
            .ok_or(MarketError::VehicleNotFound)?;
        info!("Vehicle {} updated by driver {}", vehicle_id, driver_id);
        Ok(vehicle)
    }

    /// Remove a vehicle of the caller that no active ride uses
    pub async fn delete_vehicle(&self, driver_id: UserId, vehicle_id: i64) -> MarketResult<()> {
        self.owned_vehicle(driver_id, vehicle_id).await?;
        let active = [RideStatus::Forthcoming, RideStatus::Ongoing];
        if !self.rides_in_vehicle(driver_id, vehicle_id, &active).await?.is_empty() {
            return Err(MarketError::PreconditionFailed(
                "the vehicle is used by an active ride".to_string(),
            ));
        }
        if !self.stores.accounts.delete_vehicle(vehicle_id).await? {
            return Err(MarketError::VehicleNotFound);
        }
        info!("Vehicle {} removed by driver {}", vehicle_id, driver_id);
        Ok(())
    }

    async fn rides_in_vehicle(
        &self,
        driver_id: UserId,
        vehicle_id: i64,
        statuses: &[RideStatus],
    ) -> MarketResult<Vec<Ride>> {
        let rides = self.stores.rides.rides_by_driver(driver_id).await?;
        Ok(rides
            .into_iter()
            .filter(|ride| ride.vehicle_id == vehicle_id && statuses.contains(&ride.status))
            .collect())
    }

    pub async fn balance(&self, user_id: UserId) -> MarketResult<i64> {
        self.stores.ledger.get_balance(user_id).await
    }
}
