//!
//! Documentation of the ledger module.
//! The relational side of the marketplace: accounts, credit balances,
//! driver capabilities, vehicles and review summaries.
//!

pub mod memory;
pub mod models;
pub mod mysql;

pub use memory::InMemoryLedger;
pub use models::*;
pub use mysql::MySqlLedger;

use crate::error::MarketResult;

/// Credit balances. One row per user, strongly consistent.
#[rocket::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance of a user
    ///
    /// # Errors
    ///
    /// * `UserNotFound` - the user has no profile
    async fn get_balance(&self, user_id: UserId) -> MarketResult<i64>;

    /// Atomic relative adjustment, `credits = credits + delta`.
    ///
    /// A debit that would take the balance below zero is refused as a whole.
    ///
    /// # Errors
    ///
    /// * `UserNotFound` - the user has no profile
    /// * `InsufficientCredits` - `delta` is negative and larger than the balance
    async fn adjust_balance(&self, user_id: UserId, delta: i64) -> MarketResult<()>;
}

/// Identity and capability records
#[rocket::async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, id: UserId) -> MarketResult<Option<Account>>;

    async fn get_user(&self, id: UserId) -> MarketResult<Option<UserProfile>>;

    async fn get_driver(&self, id: UserId) -> MarketResult<Option<DriverProfile>>;

    /// Attach a driver capability to an existing user
    ///
    /// # Errors
    ///
    /// * `UserNotFound` - no user profile for `profile.user_id`
    /// * `PreconditionFailed` - the user already is a driver
    async fn create_driver(&self, profile: DriverProfile) -> MarketResult<DriverProfile>;

    async fn get_vehicle(&self, id: i64) -> MarketResult<Option<Vehicle>>;

    async fn add_vehicle(&self, driver_id: UserId, vehicle: NewVehicle) -> MarketResult<Vehicle>;

    async fn vehicles_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Vehicle>>;

    /// Apply the given fields, `None` when the vehicle does not exist
    async fn update_vehicle(&self, id: i64, update: &VehicleUpdate) -> MarketResult<Option<Vehicle>>;

    async fn delete_vehicle(&self, id: i64) -> MarketResult<bool>;

    async fn get_summary(&self, driver_id: UserId) -> MarketResult<Option<ReviewSummary>>;

    /// Insert or replace the summary of `summary.driver_id`
    async fn upsert_summary(&self, summary: &ReviewSummary) -> MarketResult<()>;

    /// Email and username of a passenger, `None` when either record is missing
    async fn passenger_contact(&self, id: UserId) -> MarketResult<Option<PassengerContact>> {
        let account = self.get_account(id).await?;
        let user = self.get_user(id).await?;
        match (account, user) {
            (Some(account), Some(user)) => Ok(Some(PassengerContact {
                passenger_id: id,
                email: account.email,
                username: user.username,
            })),
            _ => Ok(None),
        }
    }
}
