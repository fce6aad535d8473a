use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::errors::ServiceError;

pub mod restaurant_queries;

pub use restaurant_queries::{
    IncomeRange, ListRestaurantsQuery, RatingBucket, RestaurantFilter, RestaurantTypesInUseQuery,
    SearchRestaurantsByNameQuery,
};

/// Trait representing a read-only query against the store.
#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError>;
}
