use super::*;

use log::{error, info, warn};

use chrono::NaiveDate;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::{self, Responder};

use crate::error::{ErrorKind, MarketError};
use crate::ledger::{AccountType, Gender, UserId};
use crate::marketplace::{Marketplace, RideSearch};
use crate::odm::RideStatus;

/// Header carrying the authenticated account id
pub const USER_HEADER: &str = "X-User-Id";
/// Header carrying the authenticated account type
pub const ACCOUNT_TYPE_HEADER: &str = "X-Account-Type";

// Utils struct for rocket::manage
pub struct MarketState {
    pub market: Marketplace,
}

/// The caller, as vouched for by the authentication layer in front of us
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthUser {
    pub id: UserId,
    pub account_type: AccountType,
}

// Checking that the identity headers are there
#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<AuthUser, ()> {
        let route = match request.route() {
            None => "Unknown Route".to_string(),
            Some(value) => format!("{}", value),
        };

        let id = request
            .headers()
            .get_one(USER_HEADER)
            .and_then(|value| value.trim().parse::<UserId>().ok());
        let account_type = request
            .headers()
            .get_one(ACCOUNT_TYPE_HEADER)
            .map_or(Some(AccountType::User), |value| AccountType::parse(value.trim()));

        match (id, account_type) {
            (Some(id), Some(account_type)) => {
                info!(
                    "Client>>Server:\t{} is trying to access route: {} as {}",
                    id,
                    route,
                    request.method()
                );
                Outcome::Success(AuthUser { id, account_type })
            }
            _ => {
                warn!("Client>>Server:\tanonymous call to {}", route);
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

/// Body of every error response
#[derive(Serialize, Deserialize, Debug)]
#[serde(crate = "rocket::serde")]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    fn new(message: impl Into<String>) -> Json<ErrorBody> {
        Json(ErrorBody {
            message: message.into(),
        })
    }
}

pub fn status_for(error: &MarketError) -> Status {
    match error.kind() {
        ErrorKind::NotFound => Status::NotFound,
        ErrorKind::PreconditionFailed | ErrorKind::AlreadyReviewed => Status::Conflict,
        ErrorKind::InsufficientCredits | ErrorKind::InsufficientSeats => Status::UnprocessableEntity,
        ErrorKind::Forbidden => Status::Forbidden,
        ErrorKind::Invalid => Status::BadRequest,
        ErrorKind::StoreUnavailable => Status::InternalServerError,
    }
}

/// A marketplace error on its way out as JSON
#[derive(Debug)]
pub struct ApiError(pub MarketError);

impl From<MarketError> for ApiError {
    fn from(error: MarketError) -> Self {
        ApiError(error)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = status_for(&self.0);
        let message = if self.0.kind() == ErrorKind::StoreUnavailable {
            error!("Server>>Client:\t{} {} failed: {}", request.method(), request.uri(), self.0);
            "Internal server error".to_string()
        } else {
            info!("Server>>Client:\tRefusing {} {}: {}", request.method(), request.uri(), self.0);
            self.0.to_string()
        };
        (status, ErrorBody::new(message)).respond_to(request)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[catch(401)]
pub fn unauthorized() -> Json<ErrorBody> {
    ErrorBody::new("Missing or invalid identity headers")
}

#[catch(404)]
pub fn not_found() -> Json<ErrorBody> {
    ErrorBody::new("Not found")
}

#[catch(422)]
pub fn unprocessable() -> Json<ErrorBody> {
    ErrorBody::new("Malformed request body")
}

// Models for Input Check

#[derive(Deserialize, Debug)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct BookingRequest {
    pub seats: i32,
}

#[derive(Deserialize, Debug)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: RideStatus,
}

#[derive(Deserialize, Debug)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct PublishRequest {
    pub published: bool,
}

#[derive(Deserialize, Debug)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct DriverRequest {
    #[serde(default)]
    pub smoking_allowed: bool,
    #[serde(default)]
    pub animals_allowed: bool,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct BalanceBody {
    pub user_id: UserId,
    pub credits: i64,
}

/// Query string of `GET /search-rides`
#[derive(FromForm, Debug, Default)]
pub struct SearchParams {
    #[field(name = "departureCity")]
    pub departure_city: Option<String>,
    #[field(name = "destinationCity")]
    pub destination_city: Option<String>,
    #[field(name = "minSeats")]
    pub min_seats: Option<i32>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    pub fuzzy: Option<bool>,
    #[field(name = "maxCredits")]
    pub max_credits: Option<i64>,
    #[field(name = "maxDuration")]
    pub max_duration: Option<i32>,
    pub gender: Option<String>,
    #[field(name = "minRating")]
    pub min_rating: Option<f64>,
    pub smoking: Option<bool>,
    pub animals: Option<bool>,
    #[field(name = "electricOnly")]
    pub electric_only: Option<bool>,
}

impl SearchParams {
    pub fn into_search(self) -> Result<RideSearch, MarketError> {
        let date = match self.date.as_deref().map(str::trim).filter(|date| !date.is_empty()) {
            None => None,
            Some(date) => Some(NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                MarketError::Validation(format!("date '{}' is not YYYY-MM-DD", date))
            })?),
        };
        let gender = match self.gender.as_deref().map(str::trim).filter(|gender| !gender.is_empty()) {
            None => None,
            Some(gender) => Some(Gender::parse(&gender.to_lowercase()).ok_or_else(|| {
                MarketError::Validation(format!("unknown gender '{}'", gender))
            })?),
        };

        Ok(RideSearch {
            departure_city: self.departure_city,
            destination_city: self.destination_city,
            min_seats: self.min_seats,
            date,
            fuzzy: self.fuzzy.unwrap_or(false),
            max_credits_per_seat: self.max_credits,
            max_duration_minutes: self.max_duration,
            gender,
            min_rating: self.min_rating,
            smoking_allowed: self.smoking,
            animals_allowed: self.animals,
            electric_only: self.electric_only.unwrap_or(false),
        })
    }
}
