//!
//! In-memory ledger, used by the tests and by local runs without MySQL.
//!

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::debug;

use super::{
    Account, AccountStatus, AccountStore, AccountType, DriverProfile, Gender, LedgerStore,
    NewVehicle, ReviewSummary, UserId, UserProfile, Vehicle, VehicleUpdate,
};
use crate::error::{MarketError, MarketResult};

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<UserId, Account>,
    users: HashMap<UserId, UserProfile>,
    drivers: HashMap<UserId, DriverProfile>,
    vehicles: HashMap<i64, Vehicle>,
    summaries: HashMap<UserId, ReviewSummary>,
    next_vehicle_id: i64,
}

/// Every table behind one mutex, so each call is a single atomic step
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MarketResult<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| MarketError::StoreUnavailable("ledger lock poisoned".to_string()))
    }

    /// Register an active account with its user profile
    pub fn insert_user(
        &self,
        id: UserId,
        username: &str,
        gender: Gender,
        credits: i64,
    ) -> MarketResult<UserProfile> {
        let mut state = self.state()?;
        state.accounts.insert(
            id,
            Account {
                id,
                email: format!("{}@ecoride.test", username),
                password_hash: String::new(),
                account_type: AccountType::User,
                status: AccountStatus::Active,
            },
        );
        let profile = UserProfile {
            account_id: id,
            username: username.to_string(),
            credit_balance: credits,
            gender,
            is_driver: false,
        };
        state.users.insert(id, profile.clone());
        Ok(profile)
    }

    /// Register a staff account without a user profile
    pub fn insert_webmaster(&self, id: UserId, email: &str) -> MarketResult<Account> {
        let account = Account {
            id,
            email: email.to_string(),
            password_hash: String::new(),
            account_type: AccountType::Webmaster,
            status: AccountStatus::Active,
        };
        self.state()?.accounts.insert(id, account.clone());
        Ok(account)
    }
}

#[rocket::async_trait]
impl LedgerStore for InMemoryLedger {
    async fn get_balance(&self, user_id: UserId) -> MarketResult<i64> {
        self.state()?
            .users
            .get(&user_id)
            .map(|user| user.credit_balance)
            .ok_or(MarketError::UserNotFound)
    }

    async fn adjust_balance(&self, user_id: UserId, delta: i64) -> MarketResult<()> {
        let mut state = self.state()?;
        let user = state.users.get_mut(&user_id).ok_or(MarketError::UserNotFound)?;
        if user.credit_balance + delta < 0 {
            return Err(MarketError::InsufficientCredits {
                needed: -delta,
                available: user.credit_balance,
            });
        }
        user.credit_balance += delta;
        debug!("Balance of {} adjusted by {} to {}", user_id, delta, user.credit_balance);
        Ok(())
    }
}

#[rocket::async_trait]
impl AccountStore for InMemoryLedger {
    async fn get_account(&self, id: UserId) -> MarketResult<Option<Account>> {
        Ok(self.state()?.accounts.get(&id).cloned())
    }

    async fn get_user(&self, id: UserId) -> MarketResult<Option<UserProfile>> {
        Ok(self.state()?.users.get(&id).cloned())
    }

    async fn get_driver(&self, id: UserId) -> MarketResult<Option<DriverProfile>> {
        Ok(self.state()?.drivers.get(&id).cloned())
    }

    async fn create_driver(&self, profile: DriverProfile) -> MarketResult<DriverProfile> {
        let mut state = self.state()?;
        if state.drivers.contains_key(&profile.user_id) {
            return Err(MarketError::PreconditionFailed(
                "user is already a driver".to_string(),
            ));
        }
        let user = state
            .users
            .get_mut(&profile.user_id)
            .ok_or(MarketError::UserNotFound)?;
        user.is_driver = true;
        state.drivers.insert(profile.user_id, profile.clone());
        Ok(profile)
    }

    async fn get_vehicle(&self, id: i64) -> MarketResult<Option<Vehicle>> {
        Ok(self.state()?.vehicles.get(&id).cloned())
    }

    async fn add_vehicle(&self, driver_id: UserId, vehicle: NewVehicle) -> MarketResult<Vehicle> {
        let mut state = self.state()?;
        state.next_vehicle_id += 1;
        let vehicle = Vehicle {
            id: state.next_vehicle_id,
            driver_id,
            brand: vehicle.brand,
            model: vehicle.model,
            license_plate: vehicle.license_plate,
            energy: vehicle.energy,
            seats: vehicle.seats,
        };
        state.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn vehicles_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Vehicle>> {
        let mut vehicles: Vec<Vehicle> = self
            .state()?
            .vehicles
            .values()
            .filter(|vehicle| vehicle.driver_id == driver_id)
            .cloned()
            .collect();
        vehicles.sort_by_key(|vehicle| vehicle.id);
        Ok(vehicles)
    }

    async fn update_vehicle(&self, id: i64, update: &VehicleUpdate) -> MarketResult<Option<Vehicle>> {
        let mut state = self.state()?;
        let Some(vehicle) = state.vehicles.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(brand) = &update.brand {
            vehicle.brand = brand.clone();
        }
        if let Some(model) = &update.model {
            vehicle.model = model.clone();
        }
        if let Some(plate) = &update.license_plate {
            vehicle.license_plate = plate.clone();
        }
        if let Some(energy) = update.energy {
            vehicle.energy = energy;
        }
        if let Some(seats) = update.seats {
            vehicle.seats = seats;
        }
        Ok(Some(vehicle.clone()))
    }

    async fn delete_vehicle(&self, id: i64) -> MarketResult<bool> {
        let removed = self.state()?.vehicles.remove(&id).is_some();
        debug!("Vehicle {} removed: {}", id, removed);
        Ok(removed)
    }

    async fn get_summary(&self, driver_id: UserId) -> MarketResult<Option<ReviewSummary>> {
        Ok(self.state()?.summaries.get(&driver_id).cloned())
    }

    async fn upsert_summary(&self, summary: &ReviewSummary) -> MarketResult<()> {
        self.state()?
            .summaries
            .insert(summary.driver_id, summary.clone());
        Ok(())
    }
}
