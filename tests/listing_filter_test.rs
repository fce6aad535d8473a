//! Home listing: filter composition, de-duplication and derived metrics.

mod common;

use std::collections::BTreeSet;

use axum::http::StatusCode;
use common::{decimal, names, TestApp};
use rust_decimal::Decimal;
use serde_json::Value;

/// alice owns three restaurants; bob and carol rate and alice records sales.
///
/// | restaurant   | type | ratings      | sale incomes     |
/// |--------------|------|--------------|------------------|
/// | Trattoria    | IT   | 5 (bob), 4   | 2000.00, 2500.00 |
/// | Burger Hut   | FF   | 2 (bob)      | 4000.00          |
/// | Cairo Nights | EG   | none         | 6500.00          |
struct Fixture {
    app: TestApp,
    token: String,
}

async fn fixture() -> Fixture {
    let app = TestApp::new().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let carol = app.signup("carol").await;

    let trattoria = app
        .create_restaurant(&alice, "Trattoria", "IT", "2020-01-01")
        .await;
    let burger = app
        .create_restaurant(&alice, "Burger Hut", "FF", "2020-01-01")
        .await;
    let cairo = app
        .create_restaurant(&alice, "Cairo Nights", "EG", "2020-01-01")
        .await;

    assert_eq!(app.rate(&bob, trattoria, 5).await.0, StatusCode::OK);
    assert_eq!(app.rate(&carol, trattoria, 4).await.0, StatusCode::OK);
    assert_eq!(app.rate(&bob, burger, 2).await.0, StatusCode::OK);

    for (id, income, date) in [
        (trattoria, "2000.00", "2024-03-01T12:00:00Z"),
        (trattoria, "2500.00", "2024-03-02T12:00:00Z"),
        (burger, "4000.00", "2024-03-01T12:00:00Z"),
        (cairo, "6500.00", "2024-03-01T12:00:00Z"),
    ] {
        assert_eq!(
            app.add_sale(&alice, id, income, date).await.0,
            StatusCode::CREATED
        );
    }

    Fixture { app, token: alice }
}

impl Fixture {
    async fn listing(&self, query: &str) -> Value {
        let uri = if query.is_empty() {
            "/api/v1/restaurants".to_string()
        } else {
            format!("/api/v1/restaurants?{}", query)
        };
        let (status, body) = self.app.get(&uri, Some(&self.token)).await;
        assert_eq!(status, StatusCode::OK, "{}: {}", uri, body);
        body["data"].clone()
    }

    async fn names(&self, query: &str) -> Vec<String> {
        names(&self.listing(query).await["restaurants"])
    }
}

fn restaurant<'a>(listing: &'a Value, name: &str) -> &'a Value {
    listing["restaurants"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == name)
        .unwrap_or_else(|| panic!("{} missing from listing", name))
}

#[tokio::test]
async fn unfiltered_listing_returns_everything_once() {
    let f = fixture().await;
    assert_eq!(
        f.names("").await,
        vec!["Burger Hut", "Cairo Nights", "Trattoria"]
    );
}

#[tokio::test]
async fn rating_bucket_and_type_combine() {
    let f = fixture().await;
    // Trattoria has two ratings in the bucket and must still appear once.
    assert_eq!(
        f.names("rating_filter=4-5&type_filter=Italian").await,
        vec!["Trattoria"]
    );
    assert!(f
        .names("rating_filter=4-5&type_filter=Fast+Food")
        .await
        .is_empty());
}

#[tokio::test]
async fn repeated_type_filter_is_a_union() {
    let f = fixture().await;
    assert_eq!(
        f.names("type_filter=Italian&type_filter=Egyptian").await,
        vec!["Cairo Nights", "Trattoria"]
    );
    // Legacy misspelling is accepted.
    assert_eq!(f.names("type_filter=Egyption").await, vec!["Cairo Nights"]);
}

#[tokio::test]
async fn income_range_bounds_are_inclusive() {
    let f = fixture().await;
    assert_eq!(
        f.names("sales_filter=2000to4000").await,
        vec!["Burger Hut", "Trattoria"]
    );
    assert_eq!(
        f.names("sales_filter=4000to6000").await,
        vec!["Burger Hut"]
    );
    assert_eq!(f.names("sales_filter=%3E6000").await, vec!["Cairo Nights"]);
    assert!(f.names("sales_filter=%3C2000").await.is_empty());
}

#[tokio::test]
async fn other_rating_buckets() {
    let f = fixture().await;
    assert_eq!(f.names("rating_filter=1-3").await, vec!["Burger Hut"]);
    assert_eq!(f.names("rating_filter=%3E%3D3").await, vec!["Trattoria"]);
    assert!(f.names("rating_filter=1star").await.is_empty());
}

#[tokio::test]
async fn unknown_values() {
    let f = fixture().await;
    // An unknown bucket leaves that dimension unfiltered.
    assert_eq!(f.names("rating_filter=9-10").await.len(), 3);
    assert_eq!(f.names("sales_filter=lots").await.len(), 3);
    // A type selection made only of unknown labels matches nothing.
    assert!(f.names("type_filter=Mexican").await.is_empty());
}

#[tokio::test]
async fn combined_filters_narrow_every_single_filter() {
    let f = fixture().await;
    let singles = [
        "rating_filter=%3E%3D3",
        "type_filter=Italian&type_filter=Fast+Food",
        "sales_filter=2000to4000",
    ];

    let combined: BTreeSet<String> = f
        .names(&singles.join("&"))
        .await
        .into_iter()
        .collect();
    assert_eq!(combined, BTreeSet::from(["Trattoria".to_string()]));

    for single in singles {
        let alone: BTreeSet<String> = f.names(single).await.into_iter().collect();
        assert!(combined.is_subset(&alone), "{} lost rows", single);
    }
}

#[tokio::test]
async fn search_term_matches_name_type_and_owner() {
    let f = fixture().await;
    assert_eq!(f.names("q=cairo").await, vec!["Cairo Nights"]);
    assert_eq!(f.names("q=ALICE").await.len(), 3);
    assert_eq!(f.names("q=ff").await, vec!["Burger Hut"]);
    assert!(f.names("q=nobody").await.is_empty());
    // Wildcards are literal.
    assert!(f.names("q=%25").await.is_empty());
}

#[tokio::test]
async fn listing_carries_metrics() {
    let f = fixture().await;
    let listing = f.listing("").await;

    let trattoria = restaurant(&listing, "Trattoria");
    assert_eq!(trattoria["average_rating"].as_f64(), Some(4.5));
    assert_eq!(trattoria["restaurant_type"], "IT");
    assert_eq!(trattoria["restaurant_type_label"], "Italian");
    assert_eq!(
        decimal(&trattoria["total_sales_income"]),
        Decimal::from(4500)
    );
    assert_eq!(decimal(&trattoria["total_expenditure"]), Decimal::from(200));
    assert_eq!(decimal(&trattoria["total_profit"]), Decimal::from(4300));
}

#[tokio::test]
async fn restaurant_without_ratings_averages_zero() {
    let f = fixture().await;
    let listing = f.listing("").await;
    assert_eq!(
        restaurant(&listing, "Cairo Nights")["average_rating"].as_f64(),
        Some(0.0)
    );
}

#[tokio::test]
async fn listing_includes_ratings_and_types_in_use() {
    let f = fixture().await;
    let listing = f.listing("type_filter=Italian").await;

    let ratings = listing["ratings"].as_array().unwrap();
    assert_eq!(ratings.len(), 2);
    let raters: BTreeSet<&str> = ratings
        .iter()
        .map(|r| r["username"].as_str().unwrap())
        .collect();
    assert_eq!(raters, BTreeSet::from(["bob", "carol"]));
    assert!(ratings.iter().all(|r| r["restaurant_name"] == "Trattoria"));

    let types: BTreeSet<&str> = listing["restaurant_types"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert_eq!(types, BTreeSet::from(["Egyptian", "Fast Food", "Italian"]));
}

#[tokio::test]
async fn listing_requires_authentication() {
    let f = fixture().await;
    let (status, body) = f.app.get("/api/v1/restaurants", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_MISSING");
}
