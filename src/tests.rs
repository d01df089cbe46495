use std::sync::Arc;

use chrono::{Duration, Utc};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use rocket::serde::json::{json, Value};
use rocket::{Build, Rocket};

use super::*;
use ledger::{Energy, Gender, InMemoryLedger, LedgerStore, NewVehicle};
use marketplace::{MarketSettings, Marketplace, Stores};
use notify::LogNotifier;
use odm::InMemoryDocumentStore;
use routes::{ACCOUNT_TYPE_HEADER, USER_HEADER};

const DRIVER: i64 = 1;
const PASSENGER: i64 = 2;
const WEBMASTER: i64 = 99;

async fn redo_main() -> (Rocket<Build>, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.insert_user(DRIVER, "marc", Gender::Male, 0).unwrap();
    ledger.insert_user(PASSENGER, "lea", Gender::Female, 50).unwrap();
    ledger.insert_webmaster(WEBMASTER, "staff@ecoride.test").unwrap();

    let stores = Stores::new(
        Arc::new(InMemoryDocumentStore::new()),
        ledger.clone(),
        Arc::new(LogNotifier::new()),
    );
    let market = Marketplace::new(stores, MarketSettings::default());
    (routes::build_rocket(market), ledger)
}

fn as_user(id: i64) -> Header<'static> {
    Header::new(USER_HEADER, id.to_string())
}

fn as_webmaster() -> Header<'static> {
    Header::new(ACCOUNT_TYPE_HEADER, "webmaster")
}

async fn body(response: LocalResponse<'_>) -> Value {
    response.into_json::<Value>().await.unwrap()
}

async fn post(client: &Client, uri: String, user: i64, payload: Value) -> LocalResponse<'_> {
    client
        .post(uri)
        .header(ContentType::JSON)
        .header(as_user(user))
        .body(payload.to_string())
        .dispatch()
        .await
}

/// Driver with a four seat car and one published ride, returns the ride id
async fn publish_ride(client: &Client, seats: i32, credits: i64) -> String {
    let response = post(client, "/drivers".into(), DRIVER, json!({ "animalsAllowed": true })).await;
    assert_eq!(response.status(), Status::Created);

    let vehicle = NewVehicle {
        brand: "Peugeot".to_string(),
        model: "e-208".to_string(),
        license_plate: "EV-208-FR".to_string(),
        energy: Energy::Electric,
        seats: 4,
    };
    let response = post(client, "/vehicles".into(), DRIVER, json!(vehicle)).await;
    assert_eq!(response.status(), Status::Created);
    let vehicle_id = body(response).await["id"].as_i64().unwrap();

    let departure = Utc::now() + Duration::days(2);
    let ride = json!({
        "vehicleId": vehicle_id,
        "departureDate": departure,
        "origin": { "city": "Montélimar" },
        "destination": { "city": "Valence" },
        "durationMinutes": 45,
        "totalSeats": seats,
        "creditsPerSeat": credits,
    });
    let response = post(client, "/rides".into(), DRIVER, ride).await;
    assert_eq!(response.status(), Status::Created);
    body(response).await["id"].as_str().unwrap().to_string()
}

#[rocket::async_test]
async fn test_identity_is_required() {
    let (rocket, _) = redo_main().await;
    let client = Client::tracked(rocket).await.unwrap();

    let response = client.get("/balance").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);

    let response = client.get("/balance").header(as_user(PASSENGER)).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response).await["credits"], 50);
}

#[rocket::async_test]
async fn test_booking_flow() {
    let (rocket, ledger) = redo_main().await;
    let client = Client::tracked(rocket).await.unwrap();
    let ride_id = publish_ride(&client, 3, 10).await;

    let response = post(&client, format!("/rides/{}/bookings", ride_id), PASSENGER, json!({ "seats": 2 })).await;
    assert_eq!(response.status(), Status::Created);
    let booking = body(response).await;
    assert_eq!(booking["status"], "forthcoming");
    assert_eq!(booking["totalCredits"], 20);
    assert_eq!(ledger.get_balance(PASSENGER).await.unwrap(), 30);

    let response = client.get(format!("/rides/{}", ride_id)).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let ride = body(response).await;
    assert_eq!(ride["remainingSeats"], 1);
    assert_eq!(ride["driver"]["username"], "marc");

    let booking_id = booking["id"].as_str().unwrap();
    let response = post(&client, format!("/bookings/{}/cancel", booking_id), PASSENGER, json!({})).await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response).await["status"], "canceled");
    assert_eq!(ledger.get_balance(PASSENGER).await.unwrap(), 50);
}

#[rocket::async_test]
async fn test_booking_errors_map_to_statuses() {
    let (rocket, _) = redo_main().await;
    let client = Client::tracked(rocket).await.unwrap();
    let ride_id = publish_ride(&client, 3, 30).await;

    let response = post(&client, format!("/rides/{}/bookings", ride_id), PASSENGER, json!({ "seats": 2 })).await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let message = body(response).await["message"].as_str().unwrap().to_string();
    assert!(message.contains("credits"));

    let response = post(&client, "/rides/000000000000000000000000/bookings".into(), PASSENGER, json!({ "seats": 1 })).await;
    assert_eq!(response.status(), Status::NotFound);

    let response = post(&client, format!("/rides/{}/bookings", ride_id), PASSENGER, json!({ "seats": 0 })).await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn test_review_flow() {
    let (rocket, ledger) = redo_main().await;
    let client = Client::tracked(rocket).await.unwrap();
    let ride_id = publish_ride(&client, 3, 10).await;

    let response = post(&client, format!("/rides/{}/bookings", ride_id), PASSENGER, json!({ "seats": 2 })).await;
    let booking_id = body(response).await["id"].as_str().unwrap().to_string();

    for status in ["ongoing", "completed"] {
        let response = post(&client, format!("/rides/{}/status", ride_id), DRIVER, json!({ "status": status })).await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body(response).await["cascade"]["updated"].as_array().unwrap().len(), 1);
    }

    let review = json!({ "rating": 5, "title": "Great", "comment": "Smooth ride", "wasRideOk": true });
    let response = post(&client, format!("/bookings/{}/review", booking_id), PASSENGER, review.clone()).await;
    assert_eq!(response.status(), Status::Created);
    let review_id = body(response).await["id"].as_str().unwrap().to_string();
    assert_eq!(ledger.get_balance(DRIVER).await.unwrap(), 16);

    let response = post(&client, format!("/bookings/{}/review", booking_id), PASSENGER, review).await;
    assert_eq!(response.status(), Status::Conflict);

    let response = client.get(format!("/drivers/{}/summary", DRIVER)).dispatch().await;
    let summary = body(response).await;
    assert_eq!(summary["averageRating"], 5.0);
    assert_eq!(summary["totalReviews"], 1);

    // unpublished reviews are hidden from the public
    let response = client.get(format!("/drivers/{}/reviews", DRIVER)).dispatch().await;
    assert!(body(response).await.as_array().unwrap().is_empty());

    let response = post(&client, format!("/reviews/{}/publish", review_id), DRIVER, json!({ "published": true })).await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .post(format!("/reviews/{}/publish", review_id))
        .header(ContentType::JSON)
        .header(as_user(WEBMASTER))
        .header(as_webmaster())
        .body(json!({ "published": true }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let response = client.get(format!("/drivers/{}/reviews", DRIVER)).dispatch().await;
    assert_eq!(body(response).await.as_array().unwrap().len(), 1);
}

#[rocket::async_test]
async fn test_search_route() {
    let (rocket, _) = redo_main().await;
    let client = Client::tracked(rocket).await.unwrap();
    let ride_id = publish_ride(&client, 3, 10).await;

    let response = client
        .get("/search-rides?departureCity=montelimar&electricOnly=true&gender=male")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let found = body(response).await;
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], ride_id.as_str());
    assert_eq!(found[0]["vehicle"]["energy"], "electric");

    let response = client
        .get("/search-rides?departureCity=montelimar&gender=female")
        .dispatch()
        .await;
    assert!(body(response).await.as_array().unwrap().is_empty());

    let response = client.get("/search-rides?date=tomorrow").dispatch().await;
    assert_eq!(response.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn test_only_the_owner_manages_a_ride() {
    let (rocket, _) = redo_main().await;
    let client = Client::tracked(rocket).await.unwrap();
    let ride_id = publish_ride(&client, 3, 10).await;

    let response = post(&client, format!("/rides/{}/status", ride_id), PASSENGER, json!({ "status": "canceled" })).await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .delete(format!("/rides/{}", ride_id))
        .header(as_user(DRIVER))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NoContent);

    let response = client.get(format!("/rides/{}", ride_id)).dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
}

#[rocket::async_test]
async fn test_vehicle_management() {
    let (rocket, _) = redo_main().await;
    let client = Client::tracked(rocket).await.unwrap();
    publish_ride(&client, 3, 10).await;

    let response = client
        .get(format!("/drivers/{}/vehicles", DRIVER))
        .header(as_user(PASSENGER))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let vehicle_id = body(response).await[0]["id"].as_i64().unwrap();

    let response = client
        .get(format!("/drivers/{}/vehicles", PASSENGER))
        .header(as_user(PASSENGER))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    let patch = |payload: Value| {
        client
            .patch(format!("/vehicles/{}", vehicle_id))
            .header(ContentType::JSON)
            .header(as_user(DRIVER))
            .body(payload.to_string())
            .dispatch()
    };
    assert_eq!(patch(json!({ "seats": 2 })).await.status(), Status::Conflict);
    let response = patch(json!({ "brand": "Renault", "model": "Megane E-Tech" })).await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response).await["seats"], 4);

    let response = client.get(format!("/vehicles/{}", vehicle_id)).dispatch().await;
    assert_eq!(body(response).await["brand"], "Renault");

    let response = client
        .delete(format!("/vehicles/{}", vehicle_id))
        .header(as_user(DRIVER))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);
}
