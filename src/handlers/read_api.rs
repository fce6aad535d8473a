//! JSON read API under `/api`. Restaurant and sales endpoints only ever see
//! the caller's own rows; `all-restaurants` is public and reduced.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::common::{
    created_response, no_content_response, success_response, validate_input, Enveloped,
};
use crate::{
    auth::AuthUser,
    entities::{rating, restaurant},
    errors::ServiceError,
    services::{
        ratings::ScoreInput,
        restaurants::{NewRestaurant, OwnedRestaurantView, PublicRestaurantView, SaleView},
    },
    AppState,
};

pub async fn list_my_restaurants(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Enveloped<Vec<OwnedRestaurantView>>, ServiceError> {
    let restaurants = state
        .services
        .restaurants
        .owned_views(user.user_id, None)
        .await?;
    Ok(success_response(restaurants))
}

pub async fn create_my_restaurant(
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

pub async fn get_my_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<Enveloped<OwnedRestaurantView>, ServiceError> {
    let view = state
        .services
        .restaurants
        .owned_view(user.user_id, id)
        .await?;
    Ok(success_response(view))
}

pub async fn list_all_restaurants(
    State(state): State<AppState>,
) -> Result<Enveloped<Vec<PublicRestaurantView>>, ServiceError> {
    let restaurants = state.services.restaurants.public_views().await?;
    Ok(success_response(restaurants))
}

pub async fn list_ratings(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Enveloped<Vec<rating::Model>>, ServiceError> {
    Ok(success_response(state.services.ratings.list().await?))
}

pub async fn get_rating(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _user: AuthUser,
) -> Result<Enveloped<rating::Model>, ServiceError> {
    Ok(success_response(state.services.ratings.get(id).await?))
}

pub async fn update_rating(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(request): Json<ScoreInput>,
) -> Result<Enveloped<rating::Model>, ServiceError> {
    if let Err(rejected) = validate_input(&request) {
        return Ok(rejected);
    }
    let updated = state
        .services
        .ratings
        .update_score(user.user_id, id, request.score)
        .await?;
    Ok(success_response(updated))
}

pub async fn delete_rating(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.ratings.delete(user.user_id, id).await?;
    Ok(no_content_response())
}

pub async fn list_my_sales(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Enveloped<Vec<SaleView>>, ServiceError> {
    Ok(success_response(
        state.services.sales.owned_sales(user.user_id).await?,
    ))
}
