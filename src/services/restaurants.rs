use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError};

use super::aggregates::{RelatedRows, RestaurantMetrics};
use crate::{
    auth::user,
    entities::{rating, restaurant, sale, Rating, Restaurant, RestaurantType, Sale},
    errors::ServiceError,
    queries::{
        ListRestaurantsQuery, Query, RestaurantFilter, RestaurantTypesInUseQuery,
        SearchRestaurantsByNameQuery,
    },
};

const MAX_LATITUDE: f64 = 90.0;
const MAX_LONGITUDE: f64 = 180.0;

/// Input for creating a restaurant. The owner comes from the caller.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_coordinates"))]
pub struct NewRestaurant {
    #[validate(length(min = 1, max = 100), custom = "not_blank")]
    pub name: String,
    #[validate(custom = "blank_or_url")]
    pub website: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    pub restaurant_type: RestaurantType,
    pub opened_at: NaiveDate,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_updated_coordinates"))]
pub struct RestaurantChanges {
    #[validate(length(min = 1, max = 100), custom = "not_blank")]
    pub name: Option<String>,
    /// An empty string clears the stored website.
    #[validate(custom = "blank_or_url")]
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub restaurant_type: Option<RestaurantType>,
    pub opened_at: Option<NaiveDate>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

fn blank_or_url(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || validator::validate_url(value.trim()) {
        return Ok(());
    }
    let mut err = ValidationError::new("url");
    err.message = Some("must be a valid URL".into());
    Err(err)
}

/// Blank websites are stored as NULL.
fn normalize_website(website: Option<String>) -> Option<String> {
    website
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
}

fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), ValidationError> {
    if let Some(lat) = latitude {
        if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&lat) {
            let mut err = ValidationError::new("latitude");
            err.message = Some("latitude must be between -90 and 90".into());
            return Err(err);
        }
    }
    if let Some(lon) = longitude {
        if !(-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&lon) {
            let mut err = ValidationError::new("longitude");
            err.message = Some("longitude must be between -180 and 180".into());
            return Err(err);
        }
    }
    Ok(())
}

fn validate_new_coordinates(input: &NewRestaurant) -> Result<(), ValidationError> {
    check_coordinates(Some(input.latitude), Some(input.longitude))
}

fn validate_updated_coordinates(input: &RestaurantChanges) -> Result<(), ValidationError> {
    check_coordinates(input.latitude, input.longitude)
}

/// A sale as shown on owner views, with its derived profit.
#[derive(Debug, Clone, Serialize)]
pub struct SaleView {
    pub id: i32,
    pub restaurant_id: i32,
    pub income: Decimal,
    pub expenditure: Option<Decimal>,
    pub profit: Decimal,
    pub date: chrono::DateTime<chrono::Utc>,
}

impl From<&sale::Model> for SaleView {
    fn from(model: &sale::Model) -> Self {
        Self {
            id: model.id,
            restaurant_id: model.restaurant_id,
            income: model.income,
            expenditure: model.expenditure,
            profit: model.profit(),
            date: model.date,
        }
    }
}

/// Home listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct RestaurantSummary {
    #[serde(flatten)]
    pub restaurant: restaurant::Model,
    pub restaurant_type_label: &'static str,
    #[serde(flatten)]
    pub metrics: RestaurantMetrics,
}

/// One rating flattened for display next to the listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRow {
    pub id: i32,
    pub score: i32,
    pub restaurant_name: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeListing {
    pub restaurants: Vec<RestaurantSummary>,
    pub ratings: Vec<RatingRow>,
    pub restaurant_types: Vec<&'static str>,
}

/// Full view of a restaurant for its owner.
#[derive(Debug, Clone, Serialize)]
pub struct OwnedRestaurantView {
    pub id: i32,
    pub name: String,
    pub user_id: i32,
    pub website: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub restaurant_type: RestaurantType,
    pub opened_at: NaiveDate,
    pub sales: Vec<SaleView>,
    #[serde(flatten)]
    pub metrics: RestaurantMetrics,
}

impl OwnedRestaurantView {
    pub(crate) fn build(model: restaurant::Model, rows: &RelatedRows) -> Self {
        let metrics = rows.metrics(model.id);
        let sales = rows.sales(model.id).iter().map(SaleView::from).collect();
        Self {
            id: model.id,
            name: model.name,
            user_id: model.user_id,
            website: model.website,
            latitude: model.latitude,
            longitude: model.longitude,
            restaurant_type: model.restaurant_type,
            opened_at: model.opened_at,
            sales,
            metrics,
        }
    }
}

/// Public view: no ownership or sales data.
#[derive(Debug, Clone, Serialize)]
pub struct PublicRestaurantView {
    pub name: String,
    pub restaurant_type: RestaurantType,
    pub average_rating: f64,
    pub opened_at: NaiveDate,
}

/// Restaurant reads and owner-scoped writes.
#[derive(Clone)]
pub struct RestaurantService {
    db: Arc<DatabaseConnection>,
}

impl RestaurantService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Runs the filter, then batch-loads ratings, sales and rater names for
    /// the matched restaurants.
    #[instrument(skip(self))]
    pub async fn home_listing(&self, filter: RestaurantFilter) -> Result<HomeListing, ServiceError> {
        let restaurants = ListRestaurantsQuery { filter }.execute(&self.db).await?;
        let rows = RelatedRows::load(&*self.db, &restaurants).await?;

        let mut user_ids: Vec<i32> = Vec::new();
        for r in &restaurants {
            for rating in rows.ratings(r.id) {
                if !user_ids.contains(&rating.user_id) {
                    user_ids.push(rating.user_id);
                }
            }
        }
        let usernames: HashMap<i32, String> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            user::Entity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|u| (u.id, u.username))
                .collect()
        };

        let mut ratings = Vec::new();
        for r in &restaurants {
            for rating in rows.ratings(r.id) {
                ratings.push(RatingRow {
                    id: rating.id,
                    score: rating.score,
                    restaurant_name: r.name.clone(),
                    username: usernames.get(&rating.user_id).cloned().unwrap_or_default(),
                });
            }
        }

        let restaurant_types = RestaurantTypesInUseQuery
            .execute(&self.db)
            .await?
            .into_iter()
            .map(RestaurantType::label)
            .collect();

        let restaurants = restaurants
            .into_iter()
            .map(|r| {
                let metrics = rows.metrics(r.id);
                RestaurantSummary {
                    restaurant_type_label: r.restaurant_type.label(),
                    restaurant: r,
                    metrics,
                }
            })
            .collect();

        Ok(HomeListing {
            restaurants,
            ratings,
            restaurant_types,
        })
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        owner_id: i32,
        input: NewRestaurant,
    ) -> Result<restaurant::Model, ServiceError> {
        input.validate()?;

        let model = restaurant::ActiveModel {
            name: Set(input.name.trim().to_string()),
            user_id: Set(owner_id),
            website: Set(normalize_website(input.website)),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            restaurant_type: Set(input.restaurant_type),
            opened_at: Set(input.opened_at),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        counter!("restaurant_manager.restaurants.created", 1);
        info!(restaurant_id = model.id, owner_id, "Restaurant created");
        Ok(model)
    }

    #[instrument(skip(self, changes))]
    pub async fn update(
        &self,
        owner_id: i32,
        restaurant_id: i32,
        changes: RestaurantChanges,
    ) -> Result<restaurant::Model, ServiceError> {
        changes.validate()?;

        let existing = self.find_owned(owner_id, restaurant_id).await?;

        if let Some(opened_at) = changes.opened_at {
            let sales = Sale::find()
                .filter(sale::Column::RestaurantId.eq(restaurant_id))
                .all(&*self.db)
                .await?;
            if let Some(earliest) = sales.iter().map(|s| s.date.date_naive()).min() {
                if opened_at > earliest {
                    warn!(restaurant_id, %opened_at, %earliest, "Opening date after first sale");
                    return Err(ServiceError::ValidationError(format!(
                        "Opening date {} is after the first recorded sale on {}",
                        opened_at, earliest
                    )));
                }
            }
        }

        let mut model = existing.into_active_model();
        if let Some(name) = changes.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(website) = changes.website {
            model.website = Set(normalize_website(Some(website)));
        }
        if let Some(latitude) = changes.latitude {
            model.latitude = Set(latitude);
        }
        if let Some(longitude) = changes.longitude {
            model.longitude = Set(longitude);
        }
        if let Some(restaurant_type) = changes.restaurant_type {
            model.restaurant_type = Set(restaurant_type);
        }
        if let Some(opened_at) = changes.opened_at {
            model.opened_at = Set(opened_at);
        }

        let updated = model.update(&*self.db).await?;
        info!(restaurant_id, "Restaurant updated");
        Ok(updated)
    }

    /// Removes the restaurant together with its ratings and sales.
    #[instrument(skip(self))]
    pub async fn delete(&self, owner_id: i32, restaurant_id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let existing = Restaurant::find_by_id(restaurant_id)
            .filter(restaurant::Column::UserId.eq(owner_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Restaurant {} not found", restaurant_id))
            })?;

        let ratings = Rating::delete_many()
            .filter(rating::Column::RestaurantId.eq(existing.id))
            .exec(&txn)
            .await?;
        let sales = Sale::delete_many()
            .filter(sale::Column::RestaurantId.eq(existing.id))
            .exec(&txn)
            .await?;
        Restaurant::delete_by_id(existing.id).exec(&txn).await?;

        txn.commit().await?;

        counter!("restaurant_manager.restaurants.deleted", 1);
        info!(
            restaurant_id,
            ratings_removed = ratings.rows_affected,
            sales_removed = sales.rows_affected,
            "Restaurant deleted"
        );
        Ok(())
    }

    /// Restaurant owned by `owner_id`. Foreign restaurants read as missing.
    pub async fn find_owned(
        &self,
        owner_id: i32,
        restaurant_id: i32,
    ) -> Result<restaurant::Model, ServiceError> {
        Restaurant::find_by_id(restaurant_id)
            .filter(restaurant::Column::UserId.eq(owner_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Restaurant {} not found", restaurant_id)))
    }

    #[instrument(skip(self))]
    pub async fn owned_view(
        &self,
        owner_id: i32,
        restaurant_id: i32,
    ) -> Result<OwnedRestaurantView, ServiceError> {
        let model = self.find_owned(owner_id, restaurant_id).await?;
        let rows = RelatedRows::load(&*self.db, std::slice::from_ref(&model)).await?;
        Ok(OwnedRestaurantView::build(model, &rows))
    }

    /// The caller's restaurants, optionally narrowed by name.
    #[instrument(skip(self))]
    pub async fn owned_views(
        &self,
        owner_id: i32,
        name_contains: Option<String>,
    ) -> Result<Vec<OwnedRestaurantView>, ServiceError> {
        let restaurants = SearchRestaurantsByNameQuery {
            owner_id: Some(owner_id),
            name_contains,
        }
        .execute(&self.db)
        .await?;
        let rows = RelatedRows::load(&*self.db, &restaurants).await?;
        Ok(restaurants
            .into_iter()
            .map(|r| OwnedRestaurantView::build(r, &rows))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn public_views(&self) -> Result<Vec<PublicRestaurantView>, ServiceError> {
        let restaurants = SearchRestaurantsByNameQuery::default()
            .execute(&self.db)
            .await?;
        let rows = RelatedRows::load(&*self.db, &restaurants).await?;
        Ok(restaurants
            .into_iter()
            .map(|r| PublicRestaurantView {
                average_rating: rows.metrics(r.id).average_rating,
                name: r.name,
                restaurant_type: r.restaurant_type,
                opened_at: r.opened_at,
            })
            .collect())
    }
}
