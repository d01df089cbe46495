//! Log-backed notifier for development

use log::info;

use super::{subject_for, Notifier};
use crate::ledger::PassengerContact;
use crate::odm::BookingStatus;

/// Notifier that writes every message to the log instead of mailing it
#[derive(Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[rocket::async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        passenger: &PassengerContact,
        ride_id: &str,
        status: BookingStatus,
        booking_id: &str,
    ) -> Result<(), String> {
        let Some(subject) = subject_for(status) else {
            return Ok(());
        };
        info!(
            "Mail to {} <{}>: \"{}\" (ride {}, booking {})",
            passenger.username, passenger.email, subject, ride_id, booking_id
        );
        Ok(())
    }
}
