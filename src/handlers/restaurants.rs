use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use super::common::{
    created_response, no_content_response, success_response, validate_input, Enveloped,
};
use crate::{
    auth::AuthUser,
    entities::restaurant,
    errors::ServiceError,
    queries::RestaurantFilter,
    services::restaurants::{HomeListing, NewRestaurant, RestaurantChanges},
    AppState,
};

/// `GET /api/v1/restaurants`: filtered listing with metrics and ratings.
///
/// The raw query string is parsed by hand because `type_filter` repeats.
#[instrument(skip(state, _user))]
pub async fn home_listing(
    State(state): State<AppState>,
    _user: AuthUser,
    RawQuery(query): RawQuery,
) -> Result<Enveloped<HomeListing>, ServiceError> {
    let filter = RestaurantFilter::from_query_string(query.as_deref());
    let listing = state.services.restaurants.home_listing(filter).await?;
    Ok(success_response(listing))
}

pub async fn create_restaurant(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<NewRestaurant>,
) -> Result<Enveloped<restaurant::Model>, ServiceError> {
    if let Err(rejected) = validate_input(&request) {
        return Ok(rejected);
    }
    let created = state
        .services
        .restaurants
        .create(user.user_id, request)
        .await?;
    Ok(created_response(created))
}

pub async fn update_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(request): Json<RestaurantChanges>,
) -> Result<Enveloped<restaurant::Model>, ServiceError> {
    if let Err(rejected) = validate_input(&request) {
        return Ok(rejected);
    }
    let updated = state
        .services
        .restaurants
        .update(user.user_id, id, request)
        .await?;
    Ok(success_response(updated))
}

pub async fn delete_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.restaurants.delete(user.user_id, id).await?;
    Ok(no_content_response())
}
