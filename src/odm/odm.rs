//!
//! Documentation of the odm module.
//! Used to connect to the Ecoride MongoDB database.
//!

use std::time::Duration;

use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use futures::stream::TryStreamExt;
use log::{debug, error, info};
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, FindOptions, ListDatabasesOptions, ReturnDocument,
};
use mongodb::{Client, Collection, Database};

use super::models::*;
use super::odm_utils::*;
use super::{BookingStore, ReviewStore, RideStore};
use crate::config::EcorideConfig;
use crate::error::{MarketError, MarketResult};
use crate::ledger::UserId;

const RIDES: &str = "rides";
const BOOKINGS: &str = "bookings";
const REVIEWS: &str = "reviews";

///
/// Initiate DB connection
///
///
/// # Arguments
///
/// * `config` - A config object containing 'database', 'database_ip' and 'timeout'
///
///
/// # Log
///
/// * `info` - "MongoDB Connected!", indicating success
/// * `error` - "Could not connect to MongoDB {error}", indicating error
///
pub async fn init(config: &EcorideConfig) -> mongodb::error::Result<Database> {
    connect(config).await
}

/// basic connection, isn't available out of the "odm.rs" module
async fn connect(config: &EcorideConfig) -> mongodb::error::Result<Database> {
    let mut client_options = ClientOptions::parse(&config.database_ip).await?;
    client_options.connect_timeout = Some(Duration::from_secs(config.timeout));
    client_options.heartbeat_freq = Some(Duration::from_secs(config.timeout));
    client_options.server_selection_timeout = Some(Duration::from_secs(config.timeout));
    let client = Client::with_options(client_options)?;

    match client
        .list_database_names(Document::new(), ListDatabasesOptions::builder().build())
        .await
    {
        Ok(_) => {
            info!("MongoDB Connected!");
        }
        Err(value) => {
            error!("Could not connect to MongoDB {}", value);
            return Err(value);
        }
    }

    Ok(client.database(&config.database))
}

/// Rides, bookings and reviews in one MongoDB database
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn rides(&self) -> Collection<RideDocument> {
        self.db.collection::<RideDocument>(RIDES)
    }

    fn bookings(&self) -> Collection<BookingDocument> {
        self.db.collection::<BookingDocument>(BOOKINGS)
    }

    fn reviews(&self) -> Collection<ReviewDocument> {
        self.db.collection::<ReviewDocument>(REVIEWS)
    }

    fn return_after() -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build()
    }

    fn inserted_oid(inserted: &Bson) -> MarketResult<ObjectId> {
        inserted.as_object_id().ok_or_else(|| {
            MarketError::StoreUnavailable(format!("unexpected inserted id {}", inserted))
        })
    }

    async fn collect_rides(&self, filter: Document) -> MarketResult<Vec<Ride>> {
        let find_options = FindOptions::builder()
            .sort(doc! { "departureDate": 1 })
            .build();
        let mut cursor = self.rides().find(filter, find_options).await?;

        let mut rides: Vec<Ride> = vec![];
        while let Some(result) = cursor.try_next().await? {
            rides.push(doc_to_ride(&result));
        }
        Ok(rides)
    }

    async fn collect_bookings(&self, filter: Document) -> MarketResult<Vec<Booking>> {
        let mut cursor = self.bookings().find(filter, None).await?;

        let mut bookings: Vec<Booking> = vec![];
        while let Some(result) = cursor.try_next().await? {
            bookings.push(doc_to_booking(&result));
        }
        Ok(bookings)
    }
}

//
// RIDE actions
//

#[rocket::async_trait]
impl RideStore for MongoStore {
    async fn insert_ride(&self, driver_id: UserId, ride: NewRide) -> MarketResult<Ride> {
        let mut document = new_ride_document(driver_id, ride);
        let inserted = self.rides().insert_one(&document, None).await?;
        document.id = Some(Self::inserted_oid(&inserted.inserted_id)?);
        Ok(doc_to_ride(&document))
    }

    async fn get_ride(&self, id: &str) -> MarketResult<Option<Ride>> {
        let Some(oid) = parse_oid(id) else {
            return Ok(None);
        };
        let ride_doc = self.rides().find_one(doc! { "_id": oid }, None).await?;
        Ok(ride_doc.as_ref().map(doc_to_ride))
    }

    async fn try_seat_adjust(&self, id: &str, delta: i32) -> MarketResult<bool> {
        let Some(oid) = parse_oid(id) else {
            return Ok(false);
        };
        // the bounds are checked by the server against the stored counts
        let filter = doc! {
            "_id": oid,
            "$expr": {
                "$and": [
                    { "$gte": [ { "$add": [ "$remainingSeats", delta ] }, 0 ] },
                    { "$lte": [ { "$add": [ "$remainingSeats", delta ] }, "$totalSeats" ] },
                ]
            },
        };
        let result = self
            .rides()
            .update_one(filter, doc! { "$inc": { "remainingSeats": delta } }, None)
            .await?;
        debug!("Seat adjustment {} on ride {}: {} modified", delta, id, result.modified_count);
        Ok(result.modified_count == 1)
    }

    async fn reserve_seats(&self, id: &str, seats: i32) -> MarketResult<bool> {
        let Some(oid) = parse_oid(id) else {
            return Ok(false);
        };
        let filter = doc! {
            "_id": oid,
            "rideStatus": RideStatus::Forthcoming.as_str(),
            "remainingSeats": { "$gte": seats },
        };
        let taken = -seats;
        let result = self
            .rides()
            .update_one(filter, doc! { "$inc": { "remainingSeats": taken } }, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn append_booking(&self, ride_id: &str, booking_id: &str) -> MarketResult<()> {
        let (Some(ride_oid), Some(booking_oid)) = (parse_oid(ride_id), parse_oid(booking_id)) else {
            return Err(MarketError::RideNotFound);
        };
        let result = self
            .rides()
            .update_one(
                doc! { "_id": ride_oid },
                doc! { "$addToSet": { "bookings": booking_oid } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(MarketError::RideNotFound);
        }
        Ok(())
    }

    async fn remove_booking(&self, ride_id: &str, booking_id: &str) -> MarketResult<()> {
        let (Some(ride_oid), Some(booking_oid)) = (parse_oid(ride_id), parse_oid(booking_id)) else {
            return Ok(());
        };
        self.rides()
            .update_one(
                doc! { "_id": ride_oid },
                doc! { "$pull": { "bookings": booking_oid } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn set_status(&self, id: &str, from: RideStatus, to: RideStatus) -> MarketResult<bool> {
        let Some(oid) = parse_oid(id) else {
            return Ok(false);
        };
        let result = self
            .rides()
            .update_one(
                doc! { "_id": oid, "rideStatus": from.as_str() },
                doc! { "$set": { "rideStatus": to.as_str() } },
                None,
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn update_details(&self, id: &str, update: RideUpdate) -> MarketResult<Option<Ride>> {
        let Some(oid) = parse_oid(id) else {
            return Ok(None);
        };
        let set = ride_update_doc(&update)?;
        if set.is_empty() {
            return self.get_ride(id).await;
        }
        let ride_doc = self
            .rides()
            .find_one_and_update(
                doc! { "_id": oid, "rideStatus": RideStatus::Forthcoming.as_str() },
                doc! { "$set": set },
                Self::return_after(),
            )
            .await?;
        Ok(ride_doc.as_ref().map(doc_to_ride))
    }

    async fn find_rides(&self, filter: &RideFilter) -> MarketResult<Vec<Ride>> {
        let query = ride_filter_doc(filter);
        debug!("Ride search filter {}", query);
        self.collect_rides(query).await
    }

    async fn rides_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Ride>> {
        self.collect_rides(doc! { "driverId": driver_id }).await
    }

    async fn delete_ride(&self, id: &str) -> MarketResult<bool> {
        let Some(oid) = parse_oid(id) else {
            return Ok(false);
        };
        let result = self
            .rides()
            .delete_one(doc! { "_id": oid, "bookings": { "$size": 0 } }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }
}

//
// BOOKING actions
//

#[rocket::async_trait]
impl BookingStore for MongoStore {
    async fn insert_booking(&self, booking: NewBooking) -> MarketResult<Booking> {
        let ride = parse_oid(&booking.ride_id).ok_or(MarketError::RideNotFound)?;
        let mut document = BookingDocument {
            id: None,
            ride,
            passenger_id: booking.passenger_id,
            driver_id: booking.driver_id,
            seats: booking.seats,
            total_credits: booking.total_credits,
            booking_status: BookingStatus::Forthcoming,
        };
        let inserted = self.bookings().insert_one(&document, None).await?;
        document.id = Some(Self::inserted_oid(&inserted.inserted_id)?);
        Ok(doc_to_booking(&document))
    }

    async fn get_booking(&self, id: &str) -> MarketResult<Option<Booking>> {
        let Some(oid) = parse_oid(id) else {
            return Ok(None);
        };
        let booking_doc = self.bookings().find_one(doc! { "_id": oid }, None).await?;
        Ok(booking_doc.as_ref().map(doc_to_booking))
    }

    async fn transition_status(
        &self,
        id: &str,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> MarketResult<Option<Booking>> {
        let Some(oid) = parse_oid(id) else {
            return Ok(None);
        };
        let from: Vec<&str> = from.iter().map(BookingStatus::as_str).collect();
        let booking_doc = self
            .bookings()
            .find_one_and_update(
                doc! { "_id": oid, "bookingStatus": { "$in": from } },
                doc! { "$set": { "bookingStatus": to.as_str() } },
                Self::return_after(),
            )
            .await?;
        Ok(booking_doc.as_ref().map(doc_to_booking))
    }

    async fn bookings_for_ride(&self, ride_id: &str) -> MarketResult<Vec<Booking>> {
        let Some(oid) = parse_oid(ride_id) else {
            return Ok(vec![]);
        };
        self.collect_bookings(doc! { "ride": oid }).await
    }

    async fn bookings_for_passenger(&self, passenger_id: UserId) -> MarketResult<Vec<Booking>> {
        self.collect_bookings(doc! { "passengerId": passenger_id }).await
    }

    async fn delete_booking(&self, id: &str) -> MarketResult<bool> {
        let Some(oid) = parse_oid(id) else {
            return Ok(false);
        };
        let result = self.bookings().delete_one(doc! { "_id": oid }, None).await?;
        Ok(result.deleted_count == 1)
    }
}

//
// REVIEW actions
//

#[rocket::async_trait]
impl ReviewStore for MongoStore {
    async fn insert_review(&self, review: NewReview) -> MarketResult<Review> {
        let booking = parse_oid(&review.booking_id).ok_or(MarketError::BookingNotFound)?;
        let mut document = ReviewDocument {
            id: None,
            booking,
            passenger_id: review.passenger_id,
            driver_id: review.driver_id,
            note: review.rating,
            title: review.title,
            comment: review.comment,
            complain: review.complaint,
            was_ride_ok: review.was_ride_ok,
            is_published: false,
        };
        let inserted = self.reviews().insert_one(&document, None).await?;
        document.id = Some(Self::inserted_oid(&inserted.inserted_id)?);
        Ok(doc_to_review(&document))
    }

    async fn reviews_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Review>> {
        let mut cursor = self
            .reviews()
            .find(doc! { "driverId": driver_id }, None)
            .await?;

        let mut reviews: Vec<Review> = vec![];
        while let Some(result) = cursor.try_next().await? {
            reviews.push(doc_to_review(&result));
        }
        Ok(reviews)
    }

    async fn set_published(&self, id: &str, published: bool) -> MarketResult<Option<Review>> {
        let Some(oid) = parse_oid(id) else {
            return Ok(None);
        };
        let review_doc = self
            .reviews()
            .find_one_and_update(
                doc! { "_id": oid },
                doc! { "$set": { "isPublished": published } },
                Self::return_after(),
            )
            .await?;
        Ok(review_doc.as_ref().map(doc_to_review))
    }

    async fn delete_review(&self, id: &str) -> MarketResult<bool> {
        let Some(oid) = parse_oid(id) else {
            return Ok(false);
        };
        let result = self.reviews().delete_one(doc! { "_id": oid }, None).await?;
        Ok(result.deleted_count == 1)
    }
}
