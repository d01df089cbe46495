//!
//! Documentation of the review flow.
//! A passenger reviews a completed booking, which pays the driver and refreshes
//! the driver's rating summary.
//!

use log::{error, info, warn};

use super::{with_retries, Marketplace};
use crate::error::{MarketError, MarketResult};
use crate::ledger::{AccountType, ReviewSummary, UserId};
use crate::odm::{Booking, BookingStatus, NewReview, Review, ReviewInput, RideStatus};

/// Average of the ratings, rounded to two decimals
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|rating| i64::from(*rating)).sum();
    let average = sum as f64 / ratings.len() as f64;
    (average * 100.0).round() / 100.0
}

impl Marketplace {
    /// What the driver earns for a booking: the price snapshot minus the
    /// platform commission on every seat
    pub fn driver_payout(&self, booking: &Booking) -> i64 {
        let commission = self.settings.platform_commission * i64::from(booking.seats);
        (booking.total_credits - commission).max(0)
    }

    /// Review a booking and settle the driver's payout.
    ///
    /// # Arguments
    ///
    /// * `passenger_id` - The reviewing passenger, who must own the booking
    /// * `booking_id` - The booking under review
    /// * `input` - Rating, texts and whether the ride went well
    ///
    /// # Steps
    ///
    /// The booking is claimed first by moving it to `reviewed`, so two
    /// concurrent reviews can't both pay out. Then the review is stored, the
    /// driver is credited when the ride went well and the summary is rebuilt.
    /// A failed store or payout puts the booking back to `completed`.
    pub async fn submit_review(
        &self,
        passenger_id: UserId,
        booking_id: &str,
        input: ReviewInput,
    ) -> MarketResult<Review> {
        let was_ride_ok = input
            .was_ride_ok
            .ok_or_else(|| MarketError::Validation("wasRideOk is required".to_string()))?;
        if !(1..=5).contains(&input.rating) {
            return Err(MarketError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        let booking = self
            .stores
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(MarketError::BookingNotFound)?;
        if booking.passenger_id != passenger_id {
            return Err(MarketError::Forbidden(
                "only the passenger can review a booking".to_string(),
            ));
        }
        if booking.status == BookingStatus::Reviewed {
            return Err(MarketError::AlreadyReviewed);
        }

        // A completed ride makes its still active bookings reviewable too, in
        // case the completion cascade missed them
        let ride = self.stores.rides.get_ride(&booking.ride_id).await?;
        let ride_completed = ride.map_or(false, |ride| ride.status == RideStatus::Completed);
        let mut reviewable = vec![BookingStatus::Completed];
        if ride_completed {
            reviewable.extend(BookingStatus::ACTIVE);
        }
        if !reviewable.contains(&booking.status) {
            return Err(MarketError::BookingNotEligibleForReview);
        }

        let Some(claimed) = self
            .stores
            .bookings
            .transition_status(booking_id, &reviewable, BookingStatus::Reviewed)
            .await?
        else {
            let current = self.stores.bookings.get_booking(booking_id).await?;
            return Err(match current {
                Some(current) if current.status == BookingStatus::Reviewed => MarketError::AlreadyReviewed,
                Some(_) => MarketError::BookingNotEligibleForReview,
                None => MarketError::BookingNotFound,
            });
        };

        let new_review = NewReview {
            booking_id: claimed.id.clone(),
            passenger_id: claimed.passenger_id,
            driver_id: claimed.driver_id,
            rating: input.rating,
            title: input.title,
            comment: input.comment,
            complaint: input.complaint,
            was_ride_ok,
        };
        let review = match self.stores.reviews.insert_review(new_review).await {
            Ok(review) => review,
            Err(error) => {
                self.unclaim_review(booking_id, booking.status).await;
                return Err(error);
            }
        };

        if was_ride_ok {
            let payout = self.driver_payout(&claimed);
            let ledger = &self.stores.ledger;
            let driver_id = claimed.driver_id;
            if let Err(error) = with_retries("Payout", move || ledger.adjust_balance(driver_id, payout)).await {
                error!(
                    "Payout of booking {} failed, withdrawing review {}: {}",
                    booking_id, review.id, error
                );
                self.withdraw_review(&review.id).await;
                self.unclaim_review(booking_id, booking.status).await;
                return Err(error);
            }
            info!(
                "Driver {} credited {} credits for booking {}",
                driver_id, payout, booking_id
            );
        } else {
            warn!(
                "Booking {} reported as not ok by passenger {}, no payout",
                booking_id, passenger_id
            );
        }

        if let Err(error) = self.refresh_summary(claimed.driver_id).await {
            warn!("Review summary of driver {} is stale: {}", claimed.driver_id, error);
        }
        Ok(review)
    }

    /// Rebuild a driver's summary from every review they received
    pub async fn refresh_summary(&self, driver_id: UserId) -> MarketResult<ReviewSummary> {
        let ratings: Vec<i32> = self
            .stores
            .reviews
            .reviews_by_driver(driver_id)
            .await?
            .iter()
            .map(|review| review.rating)
            .collect();
        let summary = ReviewSummary {
            driver_id,
            average_rating: average_rating(&ratings),
            total_reviews: ratings.len() as i64,
        };
        self.stores.accounts.upsert_summary(&summary).await?;
        Ok(summary)
    }

    pub async fn reviews_by_driver(&self, driver_id: UserId) -> MarketResult<Vec<Review>> {
        self.stores.reviews.reviews_by_driver(driver_id).await
    }

    pub async fn review_summary(&self, driver_id: UserId) -> MarketResult<ReviewSummary> {
        Ok(self
            .stores
            .accounts
            .get_summary(driver_id)
            .await?
            .unwrap_or_else(|| ReviewSummary::empty(driver_id)))
    }

    /// Publish or hide a review. Webmasters only.
    pub async fn set_review_published(
        &self,
        moderator_id: UserId,
        review_id: &str,
        published: bool,
    ) -> MarketResult<Review> {
        let moderator = self.stores.accounts.get_account(moderator_id).await?;
        if moderator.map(|account| account.account_type) != Some(AccountType::Webmaster) {
            return Err(MarketError::Forbidden(
                "only webmasters moderate reviews".to_string(),
            ));
        }
        let review = self
            .stores
            .reviews
            .set_published(review_id, published)
            .await?
            .ok_or(MarketError::ReviewNotFound)?;
        info!(
            "Review {} {} by webmaster {}",
            review_id,
            if published { "published" } else { "hidden" },
            moderator_id
        );
        Ok(review)
    }

    async fn unclaim_review(&self, booking_id: &str, previous: BookingStatus) {
        match self
            .stores
            .bookings
            .transition_status(booking_id, &[BookingStatus::Reviewed], previous)
            .await
        {
            Ok(Some(_)) => warn!("Booking {} is {} again", booking_id, previous.as_str()),
            Ok(None) => error!("Booking {} left its reviewed status before the rollback", booking_id),
            Err(error) => error!("Booking {} could not be restored: {}", booking_id, error),
        }
    }

    async fn withdraw_review(&self, review_id: &str) {
        let reviews = &self.stores.reviews;
        match with_retries("Review removal", move || reviews.delete_review(review_id)).await {
            Ok(_) => warn!("Review {} withdrawn", review_id),
            Err(error) => error!("Review {} could not be withdrawn: {}", review_id, error),
        }
    }
}
