//!
//! Documentation of the ride search.
//! The document store answers the ride criteria, then the driver and vehicle
//! criteria are checked against the ledger, keeping the departure order.
//!

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use futures::future::try_join_all;
use log::debug;
use serde::Serialize;

use super::Marketplace;
use crate::error::MarketResult;
use crate::ledger::{Gender, UserId, Vehicle};
use crate::odm::{Ride, RideFilter};

/// Everything a passenger can search rides by
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideSearch {
    pub departure_city: Option<String>,
    pub destination_city: Option<String>,
    pub min_seats: Option<i32>,
    /// Departure day, in local time
    pub date: Option<NaiveDate>,
    /// Widen the day to the configured forward window
    pub fuzzy: bool,
    pub max_credits_per_seat: Option<i64>,
    pub max_duration_minutes: Option<i32>,
    pub gender: Option<Gender>,
    pub min_rating: Option<f64>,
    pub smoking_allowed: Option<bool>,
    pub animals_allowed: Option<bool>,
    pub electric_only: bool,
}

/// The public face of a driver on a ride listing
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverCard {
    pub user_id: UserId,
    pub username: String,
    pub gender: Gender,
    pub smoking_allowed: bool,
    pub animals_allowed: bool,
    pub average_rating: f64,
    pub total_reviews: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RideListing {
    #[serde(flatten)]
    pub ride: Ride,
    pub driver: Option<DriverCard>,
    pub vehicle: Option<Vehicle>,
}

/// Whether a passenger asking for `requested` rides with a `driver` driver.
/// "other" drivers match every request.
pub fn gender_accepts(requested: Gender, driver: Gender) -> bool {
    match requested {
        Gender::Other => true,
        _ => driver == requested || driver == Gender::Other,
    }
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&midnight),
    }
}

/// Departure bounds `[after, before)` of a search.
///
/// A day covers its local midnight to the next one, widened by `extra_days`
/// for fuzzy searches. Nothing before `now` is ever searched.
pub fn departure_window<Tz: TimeZone>(
    tz: &Tz,
    date: Option<NaiveDate>,
    extra_days: u32,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
    let Some(date) = date else {
        return (now, None);
    };
    let start = local_midnight(tz, date);
    let end = date
        .checked_add_days(Days::new(u64::from(extra_days) + 1))
        .map(|last| local_midnight(tz, last));
    (start.max(now), end)
}

fn non_blank(city: &Option<String>) -> Option<String> {
    city.as_ref()
        .map(|city| city.trim().to_string())
        .filter(|city| !city.is_empty())
}

impl RideSearch {
    fn wants_driver(&self) -> bool {
        self.gender.is_some()
            || self.min_rating.is_some()
            || self.smoking_allowed.is_some()
            || self.animals_allowed.is_some()
    }

    /// Second phase: the driver and vehicle criteria
    pub fn accepts(&self, listing: &RideListing) -> bool {
        if self.electric_only && !listing.vehicle.as_ref().map_or(false, Vehicle::is_electric) {
            return false;
        }
        if !self.wants_driver() {
            return true;
        }
        let Some(driver) = &listing.driver else {
            return false;
        };
        if let Some(gender) = self.gender {
            if !gender_accepts(gender, driver.gender) {
                return false;
            }
        }
        if self.min_rating.map_or(false, |min| driver.average_rating < min) {
            return false;
        }
        if self.smoking_allowed.map_or(false, |smoking| driver.smoking_allowed != smoking) {
            return false;
        }
        if self.animals_allowed.map_or(false, |animals| driver.animals_allowed != animals) {
            return false;
        }
        true
    }
}

impl Marketplace {
    /// Forthcoming rides matching `search`, ascending departure time
    pub async fn search_rides(&self, search: &RideSearch) -> MarketResult<Vec<RideListing>> {
        let extra_days = if search.fuzzy {
            self.settings.fuzzy_search_days
        } else {
            0
        };
        let (after, before) = departure_window(&Local, search.date, extra_days, Utc::now());

        let filter = RideFilter {
            departure_city: non_blank(&search.departure_city),
            destination_city: non_blank(&search.destination_city),
            min_seats: search.min_seats,
            departs_after: Some(after),
            departs_before: before,
            max_credits_per_seat: search.max_credits_per_seat,
            max_duration_minutes: search.max_duration_minutes,
        };
        let rides = self.stores.rides.find_rides(&filter).await?;
        let candidates = rides.len();

        // try_join_all keeps the input order
        let listings = try_join_all(rides.into_iter().map(|ride| self.listing(ride))).await?;
        let listings: Vec<RideListing> = listings
            .into_iter()
            .filter(|listing| search.accepts(listing))
            .collect();

        debug!(
            "Ride search kept {} of {} candidate(s)",
            listings.len(),
            candidates
        );
        Ok(listings)
    }

    pub(super) async fn listing(&self, ride: Ride) -> MarketResult<RideListing> {
        let driver = self.driver_card(ride.driver_id).await?;
        let vehicle = self.stores.accounts.get_vehicle(ride.vehicle_id).await?;
        Ok(RideListing {
            ride,
            driver,
            vehicle,
        })
    }

    async fn driver_card(&self, driver_id: UserId) -> MarketResult<Option<DriverCard>> {
        let driver = self.stores.accounts.get_driver(driver_id).await?;
        let user = self.stores.accounts.get_user(driver_id).await?;
        let (Some(driver), Some(user)) = (driver, user) else {
            return Ok(None);
        };
        let summary = self.review_summary(driver_id).await?;
        Ok(Some(DriverCard {
            user_id: driver_id,
            username: user.username,
            gender: user.gender,
            smoking_allowed: driver.smoking_allowed,
            animals_allowed: driver.animals_allowed,
            average_rating: summary.average_rating,
            total_reviews: summary.total_reviews,
        }))
    }
}
