//!
//! Documentation of the error module.
//! Every failure the marketplace reports to a caller.
//!

use thiserror::Error;

/// Result type for marketplace and store operations
pub type MarketResult<T> = Result<T, MarketError>;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Ride not found")]
    RideNotFound,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Review not found")]
    ReviewNotFound,

    #[error("Passenger not found")]
    PassengerNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Driver not found")]
    DriverNotFound,

    #[error("Vehicle not found")]
    VehicleNotFound,

    #[error("Ride is not open for booking")]
    RideNotBookable,

    #[error("Insufficient number of credits (needed {needed}, available {available})")]
    InsufficientCredits { needed: i64, available: i64 },

    #[error("Not enough remaining seats (requested {requested}, remaining {remaining})")]
    InsufficientSeats { requested: i32, remaining: i32 },

    #[error("Booking has already been reviewed")]
    AlreadyReviewed,

    #[error("Booking can't be reviewed before the ride is completed")]
    BookingNotEligibleForReview,

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

/// The coarse taxonomy callers act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PreconditionFailed,
    InsufficientCredits,
    InsufficientSeats,
    AlreadyReviewed,
    Forbidden,
    Invalid,
    StoreUnavailable,
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::RideNotFound
            | MarketError::BookingNotFound
            | MarketError::ReviewNotFound
            | MarketError::PassengerNotFound
            | MarketError::UserNotFound
            | MarketError::DriverNotFound
            | MarketError::VehicleNotFound => ErrorKind::NotFound,
            MarketError::RideNotBookable
            | MarketError::BookingNotEligibleForReview
            | MarketError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            MarketError::InsufficientCredits { .. } => ErrorKind::InsufficientCredits,
            MarketError::InsufficientSeats { .. } => ErrorKind::InsufficientSeats,
            MarketError::AlreadyReviewed => ErrorKind::AlreadyReviewed,
            MarketError::Forbidden(_) => ErrorKind::Forbidden,
            MarketError::Validation(_) => ErrorKind::Invalid,
            MarketError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// Transient infrastructure failures, the only ones worth retrying
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::StoreUnavailable
    }
}

impl From<mongodb::error::Error> for MarketError {
    fn from(error: mongodb::error::Error) -> Self {
        MarketError::StoreUnavailable(format!("MongoDB: {}", error))
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(error: sqlx::Error) -> Self {
        MarketError::StoreUnavailable(format!("MySQL: {}", error))
    }
}

impl From<bson::ser::Error> for MarketError {
    fn from(error: bson::ser::Error) -> Self {
        MarketError::StoreUnavailable(format!("BSON encoding: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_errors_are_not_transient() {
        let terminal = [
            MarketError::RideNotFound,
            MarketError::RideNotBookable,
            MarketError::InsufficientCredits { needed: 20, available: 5 },
            MarketError::InsufficientSeats { requested: 2, remaining: 1 },
            MarketError::AlreadyReviewed,
        ];
        for error in terminal {
            assert!(!error.is_transient(), "{} should be terminal", error);
        }
        assert!(MarketError::StoreUnavailable("down".into()).is_transient());
    }

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(MarketError::PassengerNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(
            MarketError::BookingNotEligibleForReview.kind(),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(MarketError::Validation("seats".into()).kind(), ErrorKind::Invalid);
    }
}
