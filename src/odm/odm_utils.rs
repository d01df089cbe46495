//!
//! Documentation of the Database Utilities module.
//! Document conversions and query building shared by both document stores.
//!

use bson::oid::ObjectId;
use bson::{doc, Document};
use unicode_normalization::UnicodeNormalization;

use super::models::*;
use crate::error::MarketResult;

/// Strips diacritical marks and lowercases, so "Léon" and "leon" compare equal
pub fn normalize_city(city: &str) -> String {
    city.trim()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect::<String>()
        .to_lowercase()
}

/// Fills in the normalized city of an address
pub fn normalize_address(mut address: Address) -> Address {
    address.normalized_city = normalize_city(&address.city);
    address
}

/// Parses a hex id, `None` when it isn't an ObjectId (so it can't exist)
pub fn parse_oid(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

/// Converts a RideDocument to Ride
pub fn doc_to_ride(document: &RideDocument) -> Ride {
    Ride {
        id: document.id.unwrap_or_default().to_hex(),
        driver_id: document.driver_id,
        vehicle_id: document.vehicle_id,
        departure_date: document.departure_date.to_chrono(),
        origin: document.departure_address.clone(),
        destination: document.destination_address.clone(),
        duration_minutes: document.duration,
        total_seats: document.total_seats,
        remaining_seats: document.remaining_seats,
        credits_per_seat: document.credits_per_passenger,
        description: document.description.clone(),
        status: document.ride_status,
        booking_ids: document.bookings.iter().map(|id| id.to_hex()).collect(),
    }
}

/// Converts a BookingDocument to Booking
pub fn doc_to_booking(document: &BookingDocument) -> Booking {
    Booking {
        id: document.id.unwrap_or_default().to_hex(),
        ride_id: document.ride.to_hex(),
        passenger_id: document.passenger_id,
        driver_id: document.driver_id,
        seats: document.seats,
        total_credits: document.total_credits,
        status: document.booking_status,
    }
}

/// Converts a ReviewDocument to Review
pub fn doc_to_review(document: &ReviewDocument) -> Review {
    Review {
        id: document.id.unwrap_or_default().to_hex(),
        booking_id: document.booking.to_hex(),
        passenger_id: document.passenger_id,
        driver_id: document.driver_id,
        rating: document.note,
        title: document.title.clone(),
        comment: document.comment.clone(),
        complaint: document.complain.clone(),
        was_ride_ok: document.was_ride_ok,
        published: document.is_published,
    }
}

/// Builds the document of a fresh ride: forthcoming, every seat free, no bookings
pub fn new_ride_document(driver_id: i64, ride: NewRide) -> RideDocument {
    RideDocument {
        id: None,
        driver_id,
        vehicle_id: ride.vehicle_id,
        departure_date: bson::DateTime::from_chrono(ride.departure_date),
        departure_address: normalize_address(ride.origin),
        destination_address: normalize_address(ride.destination),
        duration: ride.duration_minutes,
        total_seats: ride.total_seats,
        remaining_seats: ride.total_seats,
        credits_per_passenger: ride.credits_per_seat,
        description: ride.description,
        ride_status: RideStatus::Forthcoming,
        bookings: vec![],
    }
}

/// The `$set` document of a ride edit. Addresses get their normalized city.
pub fn ride_update_doc(update: &RideUpdate) -> MarketResult<Document> {
    let mut set = Document::new();
    if let Some(vehicle_id) = update.vehicle_id {
        set.insert("vehicleId", vehicle_id);
    }
    if let Some(date) = update.departure_date {
        set.insert("departureDate", bson::DateTime::from_chrono(date));
    }
    if let Some(origin) = &update.origin {
        set.insert("departureAddress", bson::to_bson(&normalize_address(origin.clone()))?);
    }
    if let Some(destination) = &update.destination {
        set.insert(
            "destinationAddress",
            bson::to_bson(&normalize_address(destination.clone()))?,
        );
    }
    if let Some(duration) = update.duration_minutes {
        set.insert("duration", duration);
    }
    if let Some(credits) = update.credits_per_seat {
        set.insert("creditsPerPassenger", credits);
    }
    if let Some(description) = &update.description {
        set.insert("description", description.clone());
    }
    Ok(set)
}

/// Applies a ride edit to an in-memory ride, mirroring `ride_update_doc`
pub fn apply_ride_update(ride: &mut Ride, update: RideUpdate) {
    if let Some(vehicle_id) = update.vehicle_id {
        ride.vehicle_id = vehicle_id;
    }
    if let Some(date) = update.departure_date {
        ride.departure_date = date;
    }
    if let Some(origin) = update.origin {
        ride.origin = normalize_address(origin);
    }
    if let Some(destination) = update.destination {
        ride.destination = normalize_address(destination);
    }
    if let Some(duration) = update.duration_minutes {
        ride.duration_minutes = duration;
    }
    if let Some(credits) = update.credits_per_seat {
        ride.credits_per_seat = credits;
    }
    if let Some(description) = update.description {
        ride.description = description;
    }
}

/// Case-insensitive substring match on a normalized city field
fn city_regex(city: &str) -> Document {
    doc! { "$exists": true, "$regex": regex::escape(&normalize_city(city)), "$options": "i" }
}

/// The MongoDB query of the first search phase
pub fn ride_filter_doc(filter: &RideFilter) -> Document {
    let mut query = doc! { "rideStatus": RideStatus::Forthcoming.as_str() };

    if let Some(city) = &filter.departure_city {
        query.insert("departureAddress.normalizedCity", city_regex(city));
    }
    if let Some(city) = &filter.destination_city {
        query.insert("destinationAddress.normalizedCity", city_regex(city));
    }
    if let Some(seats) = filter.min_seats {
        query.insert("remainingSeats", doc! { "$gte": seats });
    }

    let mut departure = Document::new();
    if let Some(after) = filter.departs_after {
        departure.insert("$gte", bson::DateTime::from_chrono(after));
    }
    if let Some(before) = filter.departs_before {
        departure.insert("$lt", bson::DateTime::from_chrono(before));
    }
    if !departure.is_empty() {
        query.insert("departureDate", departure);
    }

    if let Some(credits) = filter.max_credits_per_seat {
        query.insert("creditsPerPassenger", doc! { "$lte": credits });
    }
    if let Some(duration) = filter.max_duration_minutes {
        query.insert("duration", doc! { "$lte": duration });
    }
    query
}

/// In-memory evaluation of `ride_filter_doc`
pub fn ride_matches(ride: &Ride, filter: &RideFilter) -> bool {
    if ride.status != RideStatus::Forthcoming {
        return false;
    }
    if let Some(city) = &filter.departure_city {
        if !ride.origin.normalized_city.contains(&normalize_city(city)) {
            return false;
        }
    }
    if let Some(city) = &filter.destination_city {
        if !ride.destination.normalized_city.contains(&normalize_city(city)) {
            return false;
        }
    }
    if filter.min_seats.map_or(false, |seats| ride.remaining_seats < seats) {
        return false;
    }
    if filter.departs_after.map_or(false, |after| ride.departure_date < after) {
        return false;
    }
    if filter.departs_before.map_or(false, |before| ride.departure_date >= before) {
        return false;
    }
    if filter
        .max_credits_per_seat
        .map_or(false, |credits| ride.credits_per_seat > credits)
    {
        return false;
    }
    if filter
        .max_duration_minutes
        .map_or(false, |duration| ride.duration_minutes > duration)
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn address(city: &str) -> Address {
        normalize_address(Address {
            street: String::new(),
            city: city.to_string(),
            normalized_city: String::new(),
            zip: String::new(),
        })
    }

    fn ride() -> Ride {
        Ride {
            id: ObjectId::new().to_hex(),
            driver_id: 1,
            vehicle_id: 1,
            departure_date: Utc.with_ymd_and_hms(2030, 5, 4, 9, 30, 0).unwrap(),
            origin: address("Saint-Étienne"),
            destination: address("Lyon"),
            duration_minutes: 70,
            total_seats: 3,
            remaining_seats: 2,
            credits_per_seat: 10,
            description: String::new(),
            status: RideStatus::Forthcoming,
            booking_ids: vec![],
        }
    }

    #[test]
    fn city_normalization_drops_diacritics() {
        assert_eq!(normalize_city("Léon"), "leon");
        assert_eq!(normalize_city(" Saint-Étienne "), "saint-etienne");
        assert_eq!(normalize_city("Besançon"), "besancon");
        assert_eq!(normalize_city("leon"), normalize_city("LÉON"));
    }

    #[test]
    fn city_regex_is_escaped() {
        let query = ride_filter_doc(&RideFilter {
            departure_city: Some("St. (Malo)".to_string()),
            ..RideFilter::default()
        });
        let city = query.get_document("departureAddress.normalizedCity").unwrap();
        assert_eq!(city.get_str("$regex").unwrap(), r"st\. \(malo\)");
        assert_eq!(city.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn filter_doc_always_restricts_to_forthcoming() {
        let query = ride_filter_doc(&RideFilter::default());
        assert_eq!(query.get_str("rideStatus").unwrap(), "forthcoming");
        assert!(!query.contains_key("departureDate"));
    }

    #[test]
    fn in_memory_filter_matches_substrings_without_accents() {
        let ride = ride();
        let filter = RideFilter {
            departure_city: Some("etienne".to_string()),
            destination_city: Some("LYÖN".to_string()),
            ..RideFilter::default()
        };
        assert!(ride_matches(&ride, &filter));

        let filter = RideFilter {
            departure_city: Some("lyon".to_string()),
            ..RideFilter::default()
        };
        assert!(!ride_matches(&ride, &filter));
    }

    #[test]
    fn in_memory_filter_bounds() {
        let ride = ride();
        let tight = RideFilter {
            min_seats: Some(3),
            ..RideFilter::default()
        };
        assert!(!ride_matches(&ride, &tight));

        let window = RideFilter {
            departs_after: Some(Utc.with_ymd_and_hms(2030, 5, 4, 0, 0, 0).unwrap()),
            departs_before: Some(Utc.with_ymd_and_hms(2030, 5, 5, 0, 0, 0).unwrap()),
            max_credits_per_seat: Some(10),
            max_duration_minutes: Some(70),
            ..RideFilter::default()
        };
        assert!(ride_matches(&ride, &window));

        let cheaper = RideFilter {
            max_credits_per_seat: Some(9),
            ..RideFilter::default()
        };
        assert!(!ride_matches(&ride, &cheaper));
    }

    #[test]
    fn update_doc_renormalizes_addresses() {
        let update = RideUpdate {
            destination: Some(Address {
                street: "1 rue Neuve".to_string(),
                city: "Orléans".to_string(),
                normalized_city: String::new(),
                zip: "45000".to_string(),
            }),
            credits_per_seat: Some(12),
            ..RideUpdate::default()
        };
        let set = ride_update_doc(&update).unwrap();
        let destination = set.get_document("destinationAddress").unwrap();
        assert_eq!(destination.get_str("normalizedCity").unwrap(), "orleans");
        assert_eq!(set.get_i64("creditsPerPassenger").unwrap(), 12);
        assert!(!set.contains_key("remainingSeats"));
    }

    #[test]
    fn ride_document_exposes_booking_ids_as_hex() {
        let source = ride();
        let new_ride = NewRide {
            vehicle_id: source.vehicle_id,
            departure_date: source.departure_date,
            origin: source.origin.clone(),
            destination: source.destination.clone(),
            duration_minutes: source.duration_minutes,
            total_seats: source.total_seats,
            credits_per_seat: source.credits_per_seat,
            description: String::new(),
        };
        let mut document = new_ride_document(source.driver_id, new_ride);
        let booking = ObjectId::new();
        document.bookings.push(booking);

        let ride = doc_to_ride(&document);
        assert_eq!(ride.booking_ids, vec![booking.to_hex()]);
        assert_eq!(ride.remaining_seats, 3);
    }
}
