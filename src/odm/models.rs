//!
//! Documentation of the Models module.
//! Contains the ride, booking and review models, both as the API sees them and
//! as they are stored in MongoDB.
//!

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::UserId;

/// Hex form of a MongoDB ObjectId
pub type RideId = String;
pub type BookingId = String;
pub type ReviewId = String;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Forthcoming,
    Ongoing,
    Completed,
    Canceled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Forthcoming => "forthcoming",
            RideStatus::Ongoing => "ongoing",
            RideStatus::Completed => "completed",
            RideStatus::Canceled => "canceled",
        }
    }

    /// Whether a driver may move a ride from `self` to `next`
    pub fn can_become(&self, next: RideStatus) -> bool {
        matches!(
            (self, next),
            (RideStatus::Forthcoming, RideStatus::Ongoing)
                | (RideStatus::Forthcoming, RideStatus::Canceled)
                | (RideStatus::Ongoing, RideStatus::Completed)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Forthcoming,
    Ongoing,
    Completed,
    Canceled,
    Reviewed,
}

impl BookingStatus {
    /// Statuses from which a booking can still be canceled or follow its ride
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Forthcoming, BookingStatus::Ongoing];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Forthcoming => "forthcoming",
            BookingStatus::Ongoing => "ongoing",
            BookingStatus::Completed => "completed",
            BookingStatus::Canceled => "canceled",
            BookingStatus::Reviewed => "reviewed",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl From<RideStatus> for BookingStatus {
    fn from(status: RideStatus) -> Self {
        match status {
            RideStatus::Forthcoming => BookingStatus::Forthcoming,
            RideStatus::Ongoing => BookingStatus::Ongoing,
            RideStatus::Completed => BookingStatus::Completed,
            RideStatus::Canceled => BookingStatus::Canceled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub street: String,
    pub city: String,
    /// Lowercase city without diacritics, filled in by the store layer
    #[serde(default)]
    pub normalized_city: String,
    #[serde(default)]
    pub zip: String,
}

/*
Models for the API
*/

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: RideId,
    pub driver_id: UserId,
    pub vehicle_id: i64,
    pub departure_date: DateTime<Utc>,
    pub origin: Address,
    pub destination: Address,
    pub duration_minutes: i32,
    pub total_seats: i32,
    pub remaining_seats: i32,
    pub credits_per_seat: i64,
    pub description: String,
    pub status: RideStatus,
    pub booking_ids: Vec<BookingId>,
}

/// A ride as submitted by its driver
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewRide {
    pub vehicle_id: i64,
    pub departure_date: DateTime<Utc>,
    pub origin: Address,
    pub destination: Address,
    pub duration_minutes: i32,
    pub total_seats: i32,
    pub credits_per_seat: i64,
    #[serde(default)]
    pub description: String,
}

/// Editable ride details. Seat counts are owned by the booking flow.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RideUpdate {
    pub vehicle_id: Option<i64>,
    pub departure_date: Option<DateTime<Utc>>,
    pub origin: Option<Address>,
    pub destination: Option<Address>,
    pub duration_minutes: Option<i32>,
    pub credits_per_seat: Option<i64>,
    pub description: Option<String>,
}

impl RideUpdate {
    pub fn is_empty(&self) -> bool {
        self.vehicle_id.is_none()
            && self.departure_date.is_none()
            && self.origin.is_none()
            && self.destination.is_none()
            && self.duration_minutes.is_none()
            && self.credits_per_seat.is_none()
            && self.description.is_none()
    }
}

/// First-phase search criteria, everything the ride documents can answer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideFilter {
    /// Normalized substring of the origin city
    pub departure_city: Option<String>,
    /// Normalized substring of the destination city
    pub destination_city: Option<String>,
    pub min_seats: Option<i32>,
    pub departs_after: Option<DateTime<Utc>>,
    pub departs_before: Option<DateTime<Utc>>,
    pub max_credits_per_seat: Option<i64>,
    pub max_duration_minutes: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub ride_id: RideId,
    pub passenger_id: UserId,
    pub driver_id: UserId,
    pub seats: i32,
    /// Price snapshot taken at creation, used verbatim for refunds and payouts
    pub total_credits: i64,
    pub status: BookingStatus,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub ride_id: RideId,
    pub passenger_id: UserId,
    pub driver_id: UserId,
    pub seats: i32,
    pub total_credits: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub booking_id: BookingId,
    pub passenger_id: UserId,
    pub driver_id: UserId,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub complaint: Option<String>,
    pub was_ride_ok: bool,
    pub published: bool,
}

/// Review content as submitted by the passenger
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub rating: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comment: String,
    pub complaint: Option<String>,
    pub was_ride_ok: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub booking_id: BookingId,
    pub passenger_id: UserId,
    pub driver_id: UserId,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub complaint: Option<String>,
    pub was_ride_ok: bool,
}

/*
Models for the MongoDB operations
*/

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RideDocument {
    /// The ID of the model.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub driver_id: i64,
    pub vehicle_id: i64,
    pub departure_date: bson::DateTime,
    pub departure_address: Address,
    pub destination_address: Address,
    pub duration: i32,
    pub total_seats: i32,
    pub remaining_seats: i32,
    pub credits_per_passenger: i64,
    #[serde(default)]
    pub description: String,
    pub ride_status: RideStatus,
    #[serde(default)]
    pub bookings: Vec<ObjectId>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingDocument {
    /// The ID of the model.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub ride: ObjectId,
    pub passenger_id: i64,
    pub driver_id: i64,
    pub seats: i32,
    pub total_credits: i64,
    pub booking_status: BookingStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDocument {
    /// The ID of the model.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub booking: ObjectId,
    pub passenger_id: i64,
    pub driver_id: i64,
    pub note: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comment: String,
    pub complain: Option<String>,
    pub was_ride_ok: bool,
    #[serde(default)]
    pub is_published: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ride_lifecycle_transitions() {
        assert!(RideStatus::Forthcoming.can_become(RideStatus::Ongoing));
        assert!(RideStatus::Forthcoming.can_become(RideStatus::Canceled));
        assert!(RideStatus::Ongoing.can_become(RideStatus::Completed));

        assert!(!RideStatus::Ongoing.can_become(RideStatus::Canceled));
        assert!(!RideStatus::Completed.can_become(RideStatus::Forthcoming));
        assert!(!RideStatus::Canceled.can_become(RideStatus::Ongoing));
        assert!(!RideStatus::Forthcoming.can_become(RideStatus::Forthcoming));
    }

    #[test]
    fn only_forthcoming_and_ongoing_bookings_are_active() {
        assert!(BookingStatus::Forthcoming.is_active());
        assert!(BookingStatus::Ongoing.is_active());
        assert!(!BookingStatus::Completed.is_active());
        assert!(!BookingStatus::Canceled.is_active());
        assert!(!BookingStatus::Reviewed.is_active());
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Reviewed).unwrap(),
            "\"reviewed\""
        );
        let status: RideStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(status, RideStatus::Canceled);
        assert_eq!(status.as_str(), "canceled");
    }
}
