use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::common::{created_response, success_response, Enveloped, SearchParams};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::{
        restaurants::{OwnedRestaurantView, SaleView},
        sales::NewSale,
    },
    AppState,
};

/// `GET /api/v1/sales`: the caller's restaurants with sales and totals.
pub async fn restaurant_sales(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Enveloped<Vec<OwnedRestaurantView>>, ServiceError> {
    let restaurants = state
        .services
        .sales
        .restaurant_sales(user.user_id, params.term())
        .await?;
    Ok(success_response(restaurants))
}

/// `POST /api/v1/sales/:id`. Answers 201 for a new sale and 200 when an
/// identical one was already recorded.
pub async fn add_sale(
    State(state): State<AppState>,
    Path(restaurant_id): Path<i32>,
    user: AuthUser,
    Json(request): Json<NewSale>,
) -> Result<Enveloped<SaleView>, ServiceError> {
    let recorded = state
        .services
        .sales
        .add_sale(user.user_id, restaurant_id, request)
        .await?;

    let view = SaleView::from(&recorded.sale);
    if recorded.created {
        Ok(created_response(view))
    } else {
        Ok(success_response(view))
    }
}
