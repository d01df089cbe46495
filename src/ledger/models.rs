//!
//! Documentation of the ledger Models module.
//! Accounts and the capability records hanging off them.
//!

use serde::{Deserialize, Serialize};

/// Account id, shared by the user, driver and staff records of one person
pub type UserId = i64;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    User,
    Webmaster,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::User => "user",
            AccountType::Webmaster => "webmaster",
        }
    }

    pub fn parse(value: &str) -> Option<AccountType> {
        match value {
            "user" => Some(AccountType::User),
            "webmaster" => Some(AccountType::Webmaster),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
    Deleted,
}

impl AccountStatus {
    pub fn parse(value: &str) -> Option<AccountStatus> {
        match value {
            "pending" => Some(AccountStatus::Pending),
            "active" => Some(AccountStatus::Active),
            "deleted" => Some(AccountStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Gender> {
        match value {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Energy {
    Electric,
    Hybrid,
    Petrol,
    Diesel,
}

impl Energy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Energy::Electric => "electric",
            Energy::Hybrid => "hybrid",
            Energy::Petrol => "petrol",
            Energy::Diesel => "diesel",
        }
    }

    pub fn parse(value: &str) -> Option<Energy> {
        match value {
            "electric" => Some(Energy::Electric),
            "hybrid" => Some(Energy::Hybrid),
            "petrol" => Some(Energy::Petrol),
            "diesel" => Some(Energy::Diesel),
            _ => None,
        }
    }
}

/// The base identity record
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub account_type: AccountType,
    pub status: AccountStatus,
}

/// Passenger capability, holds the credit balance
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub account_id: UserId,
    pub username: String,
    pub credit_balance: i64,
    pub gender: Gender,
    pub is_driver: bool,
}

/// Driver capability, keyed by the same id as the user profile
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub user_id: UserId,
    pub smoking_allowed: bool,
    pub animals_allowed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: i64,
    pub driver_id: UserId,
    pub brand: String,
    pub model: String,
    pub license_plate: String,
    pub energy: Energy,
    pub seats: i32,
}

impl Vehicle {
    pub fn is_electric(&self) -> bool {
        self.energy == Energy::Electric
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    pub brand: String,
    pub model: String,
    pub license_plate: String,
    pub energy: Energy,
    pub seats: i32,
}

/// Vehicle fields a driver may change, `None` keeps the stored value
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpdate {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub license_plate: Option<String>,
    pub energy: Option<Energy>,
    pub seats: Option<i32>,
}

impl VehicleUpdate {
    pub fn is_empty(&self) -> bool {
        self.brand.is_none()
            && self.model.is_none()
            && self.license_plate.is_none()
            && self.energy.is_none()
            && self.seats.is_none()
    }
}

/// Cached rating aggregate, always rebuilt from the review documents
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub driver_id: UserId,
    pub average_rating: f64,
    pub total_reviews: i64,
}

impl ReviewSummary {
    pub fn empty(driver_id: UserId) -> Self {
        ReviewSummary {
            driver_id,
            average_rating: 0.0,
            total_reviews: 0,
        }
    }
}

/// What the notification collaborator needs to reach a passenger
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PassengerContact {
    pub passenger_id: UserId,
    pub email: String,
    pub username: String,
}
