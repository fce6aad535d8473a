//! Recording sales against owned restaurants.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, names, TestApp};
use rust_decimal::Decimal;
use serde_json::json;

#[tokio::test]
async fn sale_before_opening_is_rejected() {
    let app = TestApp::new().await;
    let owner = app.signup("owner").await;
    let id = app
        .create_restaurant(&owner, "Late Starter", "OT", "2024-03-10")
        .await;

    let (status, body) = app
        .add_sale(&owner, id, "500.00", "2024-03-09T23:00:00Z")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("before"));

    // The opening day itself is fine.
    let (status, _) = app
        .add_sale(&owner, id, "500.00", "2024-03-10T08:00:00Z")
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn identical_sale_is_returned_not_duplicated() {
    let app = TestApp::new().await;
    let owner = app.signup("owner").await;
    let id = app
        .create_restaurant(&owner, "Steady Diner", "FF", "2023-01-01")
        .await;

    let (status, first) = app
        .add_sale(&owner, id, "1200.00", "2024-01-15T12:00:00Z")
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, second) = app
        .add_sale(&owner, id, "1200.00", "2024-01-15T12:00:00Z")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["id"], first["data"]["id"]);

    // A different amount on the same day is a new sale.
    let (status, _) = app
        .add_sale(&owner, id, "1300.00", "2024-01-15T12:00:00Z")
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, sales) = app.get("/api/sales", Some(&owner)).await;
    assert_eq!(sales["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn sale_amounts_are_checked() {
    let app = TestApp::new().await;
    let owner = app.signup("owner").await;
    let id = app
        .create_restaurant(&owner, "Careful Cafe", "DR", "2023-01-01")
        .await;

    let (status, _) = app.add_sale(&owner, id, "0", "2024-01-15T12:00:00Z").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &format!("/api/v1/sales/{}", id),
            json!({ "income": "10.00", "expenditure": "-1", "date": "2024-01-15T12:00:00Z" }),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn amounts_the_column_cannot_hold_are_rejected() {
    let app = TestApp::new().await;
    let owner = app.signup("owner").await;
    let id = app
        .create_restaurant(&owner, "Exact Books", "OT", "2023-01-01")
        .await;

    for income in ["1234.5678901234567", "79228162514264337593543950335"] {
        for _ in 0..2 {
            let (status, body) = app
                .add_sale(&owner, id, income, "2024-01-15T12:00:00Z")
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}: {}", income, body);
        }
    }

    let (status, _) = app
        .post(
            &format!("/api/v1/sales/{}", id),
            json!({ "income": "10.00", "expenditure": "0.125", "date": "2024-01-15T12:00:00Z" }),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, sales) = app.get("/api/sales", Some(&owner)).await;
    assert!(sales["data"].as_array().unwrap().is_empty());

    // Two decimal places still round-trip into get-or-create.
    let (status, _) = app
        .add_sale(&owner, id, "1234.56", "2024-01-15T12:00:00Z")
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .add_sale(&owner, id, "1234.56", "2024-01-15T12:00:00Z")
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn sales_page_lists_owned_restaurants_with_totals() {
    let app = TestApp::new().await;
    let owner = app.signup("owner").await;
    let rival = app.signup("rival").await;
    let mine = app
        .create_restaurant(&owner, "Noodle Bar", "OT", "2023-01-01")
        .await;
    app.create_restaurant(&rival, "Noodle Palace", "OT", "2023-01-01")
        .await;

    app.add_sale(&owner, mine, "800.00", "2024-02-01T10:00:00Z")
        .await;
    app.post(
        &format!("/api/v1/sales/{}", mine),
        json!({ "income": "200.00", "date": "2024-02-02T10:00:00Z" }),
        Some(&owner),
    )
    .await;

    let (status, body) = app.get("/api/v1/sales?q=noodle", Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body["data"]), vec!["Noodle Bar"]);

    let bar = &body["data"][0];
    assert_eq!(bar["sales"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&bar["total_sales_income"]), Decimal::from(1000));
    // Only the first sale has an expenditure.
    assert_eq!(decimal(&bar["total_expenditure"]), Decimal::from(100));
    assert_eq!(decimal(&bar["total_profit"]), Decimal::from(900));
    assert_eq!(decimal(&bar["sales"][1]["profit"]), Decimal::from(200));
}

#[tokio::test]
async fn cannot_record_sales_for_someone_elses_restaurant() {
    let app = TestApp::new().await;
    let owner = app.signup("owner").await;
    let intruder = app.signup("intruder").await;
    let id = app
        .create_restaurant(&owner, "Private Kitchen", "OT", "2023-01-01")
        .await;

    let (status, _) = app
        .add_sale(&intruder, id, "100.00", "2024-01-01T00:00:00Z")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_restaurant_removes_its_sales_and_ratings() {
    let app = TestApp::new().await;
    let owner = app.signup("owner").await;
    let critic = app.signup("critic").await;
    let id = app
        .create_restaurant(&owner, "Short Lived", "FF", "2023-01-01")
        .await;
    app.add_sale(&owner, id, "100.00", "2024-01-01T00:00:00Z")
        .await;
    app.rate(&critic, id, 3).await;

    let uri = format!("/api/v1/restaurants/{}", id);
    let (status, _) = app.request(Method::DELETE, &uri, None, Some(&critic)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request(Method::DELETE, &uri, None, Some(&owner)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, sales) = app.get("/api/sales", Some(&owner)).await;
    assert!(sales["data"].as_array().unwrap().is_empty());
    let (_, ratings) = app.get("/api/ratings", Some(&owner)).await;
    assert!(ratings["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn opening_date_cannot_move_past_recorded_sales() {
    let app = TestApp::new().await;
    let owner = app.signup("owner").await;
    let id = app
        .create_restaurant(&owner, "Time Traveller", "OT", "2023-01-01")
        .await;
    app.add_sale(&owner, id, "100.00", "2023-06-01T12:00:00Z")
        .await;

    let uri = format!("/api/v1/restaurants/{}", id);
    let (status, _) = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "opened_at": "2023-07-01" })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "opened_at": "2023-05-01", "name": "Time Traveller II" })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Time Traveller II");
    assert_eq!(body["data"]["opened_at"], "2023-05-01");
}
