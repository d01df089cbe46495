//!
//! Documentation of the marketplace module.
//! The booking and payout flows, coordinated across the document store (rides,
//! bookings, reviews) and the ledger (credit balances). The two stores share no
//! transaction, so every multi-step flow is a saga: each step is guarded on the
//! store side and undone by an explicit compensation when a later step fails.
//!

pub mod accounts;
pub mod booking;
pub mod review;
pub mod ride;
pub mod search;


use std::future::Future;
use std::sync::Arc;

use log::warn;

use crate::config::EcorideConfig;
use crate::error::MarketResult;
use crate::ledger::{AccountStore, LedgerStore};
use crate::notify::Notifier;
use crate::odm::{Booking, BookingStore, ReviewStore, RideStore};

pub use booking::CascadeReport;
pub use ride::RideStatusChange;
pub use search::{DriverCard, RideListing, RideSearch};

/// Attempts made for a step that must not be abandoned (refunds, seat returns)
const STEP_ATTEMPTS: u32 = 3;

/// Handles on every store the marketplace touches
#[derive(Clone)]
pub struct Stores {
    pub rides: Arc<dyn RideStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl Stores {
    /// Wire one document store and one ledger into every slot
    pub fn new<D, L>(documents: Arc<D>, ledger: Arc<L>, notifier: Arc<dyn Notifier>) -> Self
    where
        D: RideStore + BookingStore + ReviewStore + 'static,
        L: LedgerStore + AccountStore + 'static,
    {
        Stores {
            rides: documents.clone(),
            bookings: documents.clone(),
            reviews: documents,
            ledger: ledger.clone(),
            accounts: ledger,
            notifier,
        }
    }
}

/// Business rules that come from configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSettings {
    /// Credits the platform keeps per booked seat
    pub platform_commission: i64,
    /// Forward window of a fuzzy date search, in days
    pub fuzzy_search_days: u32,
}

impl Default for MarketSettings {
    fn default() -> Self {
        MarketSettings {
            platform_commission: 2,
            fuzzy_search_days: 3,
        }
    }
}

impl From<&EcorideConfig> for MarketSettings {
    fn from(config: &EcorideConfig) -> Self {
        MarketSettings {
            platform_commission: config.platform_commission,
            fuzzy_search_days: config.fuzzy_search_days,
        }
    }
}

#[derive(Clone)]
pub struct Marketplace {
    stores: Stores,
    settings: MarketSettings,
}

impl Marketplace {
    pub fn new(stores: Stores, settings: MarketSettings) -> Self {
        Marketplace { stores, settings }
    }

    pub fn settings(&self) -> MarketSettings {
        self.settings
    }

    /// Tell the passenger about the current status of a booking.
    ///
    /// Runs in the background so a slow mail relay never holds a request.
    /// Failures are logged and never reach the caller.
    fn notify_passenger(&self, booking: &Booking) {
        let accounts = self.stores.accounts.clone();
        let notifier = self.stores.notifier.clone();
        let booking = booking.clone();

        rocket::tokio::spawn(async move {
            let contact = match accounts.passenger_contact(booking.passenger_id).await {
                Ok(Some(contact)) => contact,
                Ok(None) => {
                    warn!("Missing passenger data for booking {}", booking.id);
                    return;
                }
                Err(error) => {
                    warn!("Could not load passenger of booking {}: {}", booking.id, error);
                    return;
                }
            };

            if let Err(error) = notifier
                .notify(&contact, &booking.ride_id, booking.status, &booking.id)
                .await
            {
                warn!(
                    "Notification to {} for booking {} failed: {}",
                    contact.email, booking.id, error
                );
            }
        });
    }
}

/// Run `step` again while it fails transiently, up to `STEP_ATTEMPTS` times
async fn with_retries<T, F, Fut>(what: &str, mut step: F) -> MarketResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MarketResult<T>>,
{
    let mut attempt = 1;
    loop {
        match step().await {
            Err(error) if error.is_transient() && attempt < STEP_ATTEMPTS => {
                warn!("{} failed (attempt {}): {}", what, attempt, error);
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}
