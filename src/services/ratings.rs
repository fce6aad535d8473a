use std::sync::Arc;

use metrics::counter;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use super::aggregates::RelatedRows;
use crate::{
    entities::{
        rating::{self, MAX_SCORE, MIN_SCORE},
        Rating, Restaurant, RestaurantType,
    },
    errors::ServiceError,
    queries::{Query, SearchRestaurantsByNameQuery},
};

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct ScoreInput {
    #[validate(range(min = 1, max = 5))]
    pub score: i32,
}

/// Entry on the "restaurants to rate" page.
#[derive(Debug, Clone, Serialize)]
pub struct RateableRestaurant {
    pub id: i32,
    pub name: String,
    pub restaurant_type: RestaurantType,
    pub restaurant_type_label: &'static str,
    pub average_rating: f64,
}

fn check_score(score: i32) -> Result<(), ServiceError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "Score must be between {} and {}, got {}",
            MIN_SCORE, MAX_SCORE, score
        )))
    }
}

#[derive(Clone)]
pub struct RatingService {
    db: Arc<DatabaseConnection>,
}

impl RatingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn restaurants_to_rate(
        &self,
        name_contains: Option<String>,
    ) -> Result<Vec<RateableRestaurant>, ServiceError> {
        let restaurants = SearchRestaurantsByNameQuery {
            owner_id: None,
            name_contains,
        }
        .execute(&self.db)
        .await?;
        let rows = RelatedRows::load(&*self.db, &restaurants).await?;

        Ok(restaurants
            .into_iter()
            .map(|r| RateableRestaurant {
                average_rating: rows.metrics(r.id).average_rating,
                restaurant_type_label: r.restaurant_type.label(),
                restaurant_type: r.restaurant_type,
                id: r.id,
                name: r.name,
            })
            .collect())
    }

    /// Inserts the caller's rating or overwrites their previous score in a
    /// single statement keyed on `(user_id, restaurant_id)`.
    #[instrument(skip(self))]
    pub async fn rate(
        &self,
        user_id: i32,
        restaurant_id: i32,
        score: i32,
    ) -> Result<rating::Model, ServiceError> {
        check_score(score)?;

        if Restaurant::find_by_id(restaurant_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!(
                "Restaurant {} not found",
                restaurant_id
            )));
        }

        let model = rating::ActiveModel {
            user_id: Set(user_id),
            restaurant_id: Set(restaurant_id),
            score: Set(score),
            ..Default::default()
        };
        Rating::insert(model)
            .on_conflict(
                OnConflict::columns([rating::Column::UserId, rating::Column::RestaurantId])
                    .update_column(rating::Column::Score)
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        let stored = Rating::find()
            .filter(rating::Column::UserId.eq(user_id))
            .filter(rating::Column::RestaurantId.eq(restaurant_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError("Rating missing after upsert".to_string())
            })?;

        counter!("restaurant_manager.ratings.written", 1);
        info!(rating_id = stored.id, user_id, restaurant_id, score, "Rating stored");
        Ok(stored)
    }

    pub async fn list(&self) -> Result<Vec<rating::Model>, ServiceError> {
        Ok(Rating::find()
            .order_by_asc(rating::Column::Id)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, rating_id: i32) -> Result<rating::Model, ServiceError> {
        Rating::find_by_id(rating_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Rating {} not found", rating_id)))
    }

    async fn get_authored(&self, user_id: i32, rating_id: i32) -> Result<rating::Model, ServiceError> {
        let existing = self.get(rating_id).await?;
        if existing.user_id != user_id {
            warn!(rating_id, user_id, "Attempt to modify another user's rating");
            return Err(ServiceError::Forbidden(
                "Only the author may modify this rating".to_string(),
            ));
        }
        Ok(existing)
    }

    #[instrument(skip(self))]
    pub async fn update_score(
        &self,
        user_id: i32,
        rating_id: i32,
        score: i32,
    ) -> Result<rating::Model, ServiceError> {
        check_score(score)?;
        let existing = self.get_authored(user_id, rating_id).await?;

        let mut model = existing.into_active_model();
        model.score = Set(score);
        let updated = model.update(&*self.db).await?;

        info!(rating_id, score, "Rating updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: i32, rating_id: i32) -> Result<(), ServiceError> {
        let existing = self.get_authored(user_id, rating_id).await?;
        Rating::delete_by_id(existing.id).exec(&*self.db).await?;
        info!(rating_id, "Rating deleted");
        Ok(())
    }
}
