use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use tracing::debug;

use crate::{
    entities::{rating, restaurant, sale, Rating, Sale},
    errors::ServiceError,
};

/// Derived per-restaurant figures. Computed from the related rows on every
/// read and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestaurantMetrics {
    pub average_rating: f64,
    pub total_sales_income: Decimal,
    pub total_profit: Decimal,
    pub total_expenditure: Decimal,
}

impl Default for RestaurantMetrics {
    fn default() -> Self {
        Self {
            average_rating: 0.0,
            total_sales_income: Decimal::ZERO,
            total_profit: Decimal::ZERO,
            total_expenditure: Decimal::ZERO,
        }
    }
}

impl RestaurantMetrics {
    pub fn from_rows(ratings: &[rating::Model], sales: &[sale::Model]) -> Self {
        let average_rating = if ratings.is_empty() {
            0.0
        } else {
            let total: i64 = ratings.iter().map(|r| i64::from(r.score)).sum();
            total as f64 / ratings.len() as f64
        };

        let mut metrics = Self {
            average_rating,
            ..Self::default()
        };
        for s in sales {
            metrics.total_sales_income += s.income;
            metrics.total_profit += s.profit();
            if let Some(expenditure) = s.expenditure {
                metrics.total_expenditure += expenditure;
            }
        }
        metrics
    }
}

/// Ratings and sales for a batch of restaurants, loaded with one query per
/// relation.
#[derive(Debug, Default)]
pub struct RelatedRows {
    ratings: HashMap<i32, Vec<rating::Model>>,
    sales: HashMap<i32, Vec<sale::Model>>,
}

impl RelatedRows {
    pub async fn load<C>(db: &C, restaurants: &[restaurant::Model]) -> Result<Self, ServiceError>
    where
        C: ConnectionTrait,
    {
        if restaurants.is_empty() {
            return Ok(Self::default());
        }
        let ids: Vec<i32> = restaurants.iter().map(|r| r.id).collect();

        let ratings = Rating::find()
            .filter(rating::Column::RestaurantId.is_in(ids.clone()))
            .order_by_asc(rating::Column::Id)
            .all(db)
            .await?;
        let sales = Sale::find()
            .filter(sale::Column::RestaurantId.is_in(ids))
            .order_by_asc(sale::Column::Id)
            .all(db)
            .await?;
        debug!(
            restaurants = restaurants.len(),
            ratings = ratings.len(),
            sales = sales.len(),
            "Loaded related rows"
        );

        let mut rows = Self::default();
        for r in ratings {
            rows.ratings.entry(r.restaurant_id).or_default().push(r);
        }
        for s in sales {
            rows.sales.entry(s.restaurant_id).or_default().push(s);
        }
        Ok(rows)
    }

    pub fn ratings(&self, restaurant_id: i32) -> &[rating::Model] {
        self.ratings
            .get(&restaurant_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sales(&self, restaurant_id: i32) -> &[sale::Model] {
        self.sales
            .get(&restaurant_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn metrics(&self, restaurant_id: i32) -> RestaurantMetrics {
        RestaurantMetrics::from_rows(self.ratings(restaurant_id), self.sales(restaurant_id))
    }
}
