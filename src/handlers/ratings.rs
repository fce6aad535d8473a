use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::common::{success_response, validate_input, Enveloped, SearchParams};
use crate::{
    auth::AuthUser,
    entities::rating,
    errors::ServiceError,
    services::ratings::{RateableRestaurant, ScoreInput},
    AppState,
};

/// `GET /api/v1/rate`: every restaurant with its current average.
pub async fn restaurants_to_rate(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Enveloped<Vec<RateableRestaurant>>, ServiceError> {
    let restaurants = state
        .services
        .ratings
        .restaurants_to_rate(params.term())
        .await?;
    Ok(success_response(restaurants))
}

/// `POST /api/v1/rate/:id`: insert or overwrite the caller's score.
pub async fn rate_restaurant(
    State(state): State<AppState>,
    Path(restaurant_id): Path<i32>,
    user: AuthUser,
    Json(request): Json<ScoreInput>,
) -> Result<Enveloped<rating::Model>, ServiceError> {
    if let Err(rejected) = validate_input(&request) {
        return Ok(rejected);
    }
    let stored = state
        .services
        .ratings
        .rate(user.user_id, restaurant_id, request.score)
        .await?;
    Ok(success_response(stored))
}
