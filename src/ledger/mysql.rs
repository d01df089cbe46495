//!
//! Documentation of the MySQL ledger.
//! Used to connect to the relational half of the Ecoride database.
//!

use std::time::Duration;

use log::{error, info, warn};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;

use super::{
    Account, AccountStatus, AccountStore, AccountType, DriverProfile, Energy, Gender, LedgerStore,
    NewVehicle, ReviewSummary, UserId, UserProfile, Vehicle, VehicleUpdate,
};
use crate::config::EcorideConfig;
use crate::error::{MarketError, MarketResult};

/// Tables are created when missing, in dependency order
const SCHEMA: [&str; 5] = [
    r"
    CREATE TABLE IF NOT EXISTS accounts (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        email VARCHAR(255) NOT NULL UNIQUE,
        password VARCHAR(255) NOT NULL,
        account_type VARCHAR(16) NOT NULL DEFAULT 'user',
        account_status VARCHAR(16) NOT NULL DEFAULT 'pending'
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS users (
        account_id BIGINT PRIMARY KEY,
        username VARCHAR(64) NOT NULL,
        credits BIGINT NOT NULL DEFAULT 20,
        gender VARCHAR(16) NOT NULL DEFAULT 'other',
        is_driver BOOLEAN NOT NULL DEFAULT FALSE,
        CONSTRAINT credits_not_negative CHECK (credits >= 0),
        FOREIGN KEY (account_id) REFERENCES accounts(id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS drivers (
        user_id BIGINT PRIMARY KEY,
        accept_smoking BOOLEAN NOT NULL DEFAULT FALSE,
        accept_animals BOOLEAN NOT NULL DEFAULT FALSE,
        FOREIGN KEY (user_id) REFERENCES users(account_id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS cars (
        id BIGINT PRIMARY KEY AUTO_INCREMENT,
        driver_id BIGINT NOT NULL,
        brand VARCHAR(64) NOT NULL,
        model VARCHAR(64) NOT NULL,
        license_plate VARCHAR(32) NOT NULL,
        energy VARCHAR(16) NOT NULL,
        seats INT NOT NULL,
        FOREIGN KEY (driver_id) REFERENCES drivers(user_id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS reviews_summaries (
        driver_id BIGINT PRIMARY KEY,
        average_rating DOUBLE NOT NULL DEFAULT 0,
        total_reviews BIGINT NOT NULL DEFAULT 0
    )
    ",
];

/// MySQL-backed ledger and account store
pub struct MySqlLedger {
    pool: MySqlPool,
}

impl MySqlLedger {
    ///
    /// Open the pool and create missing tables
    ///
    /// # Arguments
    ///
    /// * `config` - A config object containing 'mysql_url', 'timeout' and 'max_pool_connections'
    ///
    /// # Log
    ///
    /// * `info` - "MySQL Connected!", indicating success
    /// * `error` - "Could not connect to MySQL {error}", indicating error
    ///
    pub async fn connect(config: &EcorideConfig) -> MarketResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_pool_connections)
            .acquire_timeout(Duration::from_secs(config.timeout))
            .connect(&config.mysql_url)
            .await;

        let pool = match pool {
            Ok(value) => {
                info!("MySQL Connected!");
                value
            }
            Err(value) => {
                error!("Could not connect to MySQL {}", value);
                return Err(value.into());
            }
        };

        let ledger = Self::from_pool(pool);
        ledger.migrate().await?;
        Ok(ledger)
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn migrate(&self) -> MarketResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn row_to_account(row: &MySqlRow) -> MarketResult<Account> {
        let account_type: String = row.try_get("account_type")?;
        let status: String = row.try_get("account_status")?;
        Ok(Account {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password")?,
            account_type: AccountType::parse(&account_type).ok_or_else(|| {
                MarketError::StoreUnavailable(format!("unknown account type {}", account_type))
            })?,
            status: AccountStatus::parse(&status).ok_or_else(|| {
                MarketError::StoreUnavailable(format!("unknown account status {}", status))
            })?,
        })
    }

    fn row_to_user(row: &MySqlRow) -> MarketResult<UserProfile> {
        let gender: String = row.try_get("gender")?;
        Ok(UserProfile {
            account_id: row.try_get("account_id")?,
            username: row.try_get("username")?,
            credit_balance: row.try_get("credits")?,
            gender: Gender::parse(&gender).unwrap_or(Gender::Other),
            is_driver: row.try_get("is_driver")?,
        })
    }

    fn row_to_vehicle(row: &MySqlRow) -> MarketResult<Vehicle> {
        let energy: String = row.try_get("energy")?;
        Ok(Vehicle {
            id: row.try_get("id")?,
            driver_id: row.try_get("driver_id")?,
            brand: row.try_get("brand")?,
            model: row.try_get("model")?,
            license_plate: row.try_get("license_plate")?,
            energy: Energy::parse(&energy).ok_or_else(|| {
                MarketError::StoreUnavailable(format!("unknown energy {}", energy))
            })?,
            seats: row.try_get("seats")?,
        })
    }
}

#[rocket::async_trait]
impl LedgerStore for MySqlLedger {
    async fn get_balance(&self, user_id: UserId) -> MarketResult<i64> {
        let row = sqlx::query("SELECT credits FROM users WHERE account_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("credits")?),
            None => Err(MarketError::UserNotFound),
        }
    }

    async fn adjust_balance(&self, user_id: UserId, delta: i64) -> MarketResult<()> {
        if delta == 0 {
            return self.get_balance(user_id).await.map(|_| ());
        }

        // relative and guarded in one statement, never read-then-write
        let result = sqlx::query(
            "UPDATE users SET credits = credits + ? WHERE account_id = ? AND credits + ? >= 0",
        )
        .bind(delta)
        .bind(user_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let available = self.get_balance(user_id).await?;
        warn!(
            "Refused balance adjustment of {} for user {} (balance {})",
            delta, user_id, available
        );
        Err(MarketError::InsufficientCredits {
            needed: -delta,
            available,
        })
    }
}

#[rocket::async_trait]
impl AccountStore for MySqlLedger {
    async fn get_account(&self, id: UserId) -> MarketResult<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, email, password, account_type, account_status FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    async fn get_user(&self, id: UserId) -> MarketResult<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT account_id, username, credits, gender, is_driver FROM users WHERE account_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn get_driver(&self, id: UserId) -> MarketResult<Option<DriverProfile>> {
        let row = sqlx::query(
            "SELECT user_id, accept_smoking, accept_animals FROM drivers WHERE user_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(DriverProfile {
                user_id: row.try_get("user_id")?,
                smoking_allowed: row.try_get("accept_smoking")?,
                animals_allowed: row.try_get("accept_animals")?,
            })),
        }
    }

    async fn create_driver(&self, profile: DriverProfile) -> MarketResult<DriverProfile> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query("SELECT is_driver FROM users WHERE account_id = ? FOR UPDATE")
            .bind(profile.user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let is_driver: bool = match user {
            None => return Err(MarketError::UserNotFound),
            Some(row) => row.try_get("is_driver")?,
        };
        if is_driver {
            return Err(MarketError::PreconditionFailed(
                "user is already a driver".to_string(),
            ));
        }

        sqlx::query("INSERT INTO drivers (user_id, accept_smoking, accept_animals) VALUES (?, ?, ?)")
            .bind(profile.user_id)
            .bind(profile.smoking_allowed)
            .bind(profile.animals_allowed)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET is_driver = TRUE WHERE account_id = ?")
            .bind(profile.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("User {} is now a driver", profile.user_id);
        Ok(profile)
    }

    async fn get_vehicle(&self, id: i64) -> MarketResult<Option<Vehicle>> {
        let row = sqlx::query(
            "SELECT id, driver_id, brand, model, license_plate, energy, seats FROM cars WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_vehicle).transpose()
    }

    async fn add_vehicle(&self, driver_id: UserId, vehicle: NewVehicle) -> MarketResult<Vehicle> {
        let result = sqlx::query(
            "INSERT INTO cars (driver_id, brand, model, license_plate, energy, seats) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(driver_id)
        .bind(&vehicle.brand)
        .bind(&vehicle.model)
        .bind(&vehicle.license_plate)
        .bind(vehicle.energy.as_str())
        .bind(vehicle.seats)
        .execute(&self.pool)
        .await?;

        let id = i64::try_from(result.last_insert_id())
            .map_err(|_| MarketError::StoreUnavailable("vehicle id overflow".to_string()))?;

        Ok(Vehicle {
            id,
            driver_id,
            brand: vehicle.brand,
            model: vehicle.model,
            license_plate: vehicle.license_plate,
            energy: vehicle.energy,
            seats: vehicle.seats,
        })
    }

    async fn vehicles_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Vehicle>> {
        let rows = sqlx::query(
            "SELECT id, driver_id, brand, model, license_plate, energy, seats FROM cars WHERE driver_id = ? ORDER BY id",
        )
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_vehicle).collect()
    }

    async fn update_vehicle(&self, id: i64, update: &VehicleUpdate) -> MarketResult<Option<Vehicle>> {
        // matched rows are not reported when nothing changed, so existence is read back
        sqlx::query(
            "UPDATE cars SET brand = COALESCE(?, brand), model = COALESCE(?, model), \
             license_plate = COALESCE(?, license_plate), energy = COALESCE(?, energy), \
             seats = COALESCE(?, seats) WHERE id = ?",
        )
        .bind(update.brand.as_deref())
        .bind(update.model.as_deref())
        .bind(update.license_plate.as_deref())
        .bind(update.energy.map(|energy| energy.as_str()))
        .bind(update.seats)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_vehicle(id).await
    }

    async fn delete_vehicle(&self, id: i64) -> MarketResult<bool> {
        let result = sqlx::query("DELETE FROM cars WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_summary(&self, driver_id: UserId) -> MarketResult<Option<ReviewSummary>> {
        let row = sqlx::query(
            "SELECT average_rating, total_reviews FROM reviews_summaries WHERE driver_id = ?",
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(ReviewSummary {
                driver_id,
                average_rating: row.try_get("average_rating")?,
                total_reviews: row.try_get("total_reviews")?,
            })),
        }
    }

    async fn upsert_summary(&self, summary: &ReviewSummary) -> MarketResult<()> {
        sqlx::query(
            r"
            INSERT INTO reviews_summaries (driver_id, average_rating, total_reviews)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE
                average_rating = VALUES(average_rating),
                total_reviews = VALUES(total_reviews)
            ",
        )
        .bind(summary.driver_id)
        .bind(summary.average_rating)
        .bind(summary.total_reviews)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
