//!
//! Documentation of the notify module.
//! Passenger notifications on booking status changes.
//!

pub mod log_notifier;

pub use log_notifier::LogNotifier;

use crate::ledger::PassengerContact;
use crate::odm::BookingStatus;

/// Sends a passenger the news about one of their bookings.
///
/// Delivery is best effort: the marketplace logs a failure and carries on.
#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        passenger: &PassengerContact,
        ride_id: &str,
        status: BookingStatus,
        booking_id: &str,
    ) -> Result<(), String>;
}

/// The subject line a passenger receives for a booking status
pub fn subject_for(status: BookingStatus) -> Option<&'static str> {
    match status {
        BookingStatus::Forthcoming => Some("Your ride is booked"),
        BookingStatus::Ongoing => Some("Your ride has started"),
        BookingStatus::Completed => Some("Please validate your ride"),
        BookingStatus::Canceled => Some("Your ride has been canceled"),
        BookingStatus::Reviewed => None,
    }
}
