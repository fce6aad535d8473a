use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Query as SelectQuery, ActiveModelTrait, ColumnTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::restaurants::{OwnedRestaurantView, RestaurantService, SaleView};
use crate::{
    entities::{restaurant, sale, Restaurant, Sale},
    errors::ServiceError,
};

/// Amounts are stored as `DECIMAL(12, 2)`.
const AMOUNT_SCALE: u32 = 2;
const AMOUNT_LIMIT: i64 = 10_000_000_000;

/// Rejects amounts the column would round or could not hold.
fn check_amount(field: &str, amount: Decimal) -> Result<(), ServiceError> {
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(ServiceError::ValidationError(format!(
            "{} must have at most {} decimal places",
            field, AMOUNT_SCALE
        )));
    }
    if amount.abs() >= Decimal::from(AMOUNT_LIMIT) {
        return Err(ServiceError::ValidationError(format!(
            "{} must be below {}",
            field, AMOUNT_LIMIT
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSale {
    pub income: Decimal,
    #[serde(default)]
    pub expenditure: Option<Decimal>,
    pub date: DateTime<Utc>,
}

impl NewSale {
    /// Amount checks plus the rule that a sale cannot predate the opening.
    pub fn check_against(&self, restaurant: &restaurant::Model) -> Result<(), ServiceError> {
        check_amount("Income", self.income)?;
        if let Some(expenditure) = self.expenditure {
            check_amount("Expenditure", expenditure)?;
        }
        if self.income <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Income must be greater than zero".to_string(),
            ));
        }
        if let Some(expenditure) = self.expenditure {
            if expenditure < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Expenditure cannot be negative".to_string(),
                ));
            }
        }
        if self.date.date_naive() < restaurant.opened_at {
            return Err(ServiceError::ValidationError(format!(
                "Sale date {} is before the restaurant opened on {}",
                self.date.date_naive(),
                restaurant.opened_at
            )));
        }
        Ok(())
    }

    fn matches(&self, existing: &sale::Model) -> bool {
        existing.income == self.income
            && existing.expenditure == self.expenditure
            && existing.date == self.date
    }
}

/// Outcome of an add-sale request.
#[derive(Debug, Clone)]
pub struct RecordedSale {
    pub sale: sale::Model,
    pub created: bool,
}

#[derive(Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
    restaurants: RestaurantService,
}

impl SaleService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            restaurants: RestaurantService::new(db.clone()),
            db,
        }
    }

    /// The caller's restaurants with their sales and metrics.
    pub async fn restaurant_sales(
        &self,
        owner_id: i32,
        name_contains: Option<String>,
    ) -> Result<Vec<OwnedRestaurantView>, ServiceError> {
        self.restaurants.owned_views(owner_id, name_contains).await
    }

    /// Records a sale for an owned restaurant. An identical sale already on
    /// file is returned instead of inserting a second copy.
    #[instrument(skip(self, input), fields(income = %input.income, date = %input.date))]
    pub async fn add_sale(
        &self,
        owner_id: i32,
        restaurant_id: i32,
        input: NewSale,
    ) -> Result<RecordedSale, ServiceError> {
        let txn = self.db.begin().await?;

        let restaurant = Restaurant::find_by_id(restaurant_id)
            .filter(restaurant::Column::UserId.eq(owner_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Restaurant {} not found", restaurant_id))
            })?;

        input.check_against(&restaurant)?;

        let recorded = Sale::find()
            .filter(sale::Column::RestaurantId.eq(restaurant.id))
            .order_by_asc(sale::Column::Id)
            .all(&txn)
            .await?;

        if let Some(existing) = recorded.into_iter().find(|s| input.matches(s)) {
            txn.commit().await?;
            debug!(sale_id = existing.id, "Identical sale already recorded");
            return Ok(RecordedSale {
                sale: existing,
                created: false,
            });
        }

        let created = sale::ActiveModel {
            restaurant_id: Set(restaurant.id),
            income: Set(input.income),
            expenditure: Set(input.expenditure),
            date: Set(input.date),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        counter!("restaurant_manager.sales.recorded", 1);
        info!(sale_id = created.id, restaurant_id, "Sale recorded");
        Ok(RecordedSale {
            sale: created,
            created: true,
        })
    }

    /// Every sale on a restaurant owned by `owner_id`.
    pub async fn owned_sales(&self, owner_id: i32) -> Result<Vec<SaleView>, ServiceError> {
        let sales = Sale::find()
            .filter(
                sale::Column::RestaurantId.in_subquery(
                    SelectQuery::select()
                        .column(restaurant::Column::Id)
                        .from(restaurant::Entity)
                        .and_where(restaurant::Column::UserId.eq(owner_id))
                        .to_owned(),
                ),
            )
            .order_by_asc(sale::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(sales.iter().map(SaleView::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rstest::rstest;

    fn restaurant() -> restaurant::Model {
        restaurant::Model {
            id: 1,
            name: "Koshary Corner".to_string(),
            user_id: 1,
            website: None,
            latitude: 0.0,
            longitude: 0.0,
            restaurant_type: crate::entities::RestaurantType::Egyptian,
            opened_at: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
        }
    }

    fn sale_on(day: u32, income: i64, expenditure: Option<i64>) -> NewSale {
        NewSale {
            income: Decimal::from(income),
            expenditure: expenditure.map(Decimal::from),
            date: Utc.with_ymd_and_hms(2024, 2, day, 9, 0, 0).unwrap(),
        }
    }

    fn priced(income: Decimal, expenditure: Option<Decimal>) -> NewSale {
        NewSale {
            income,
            expenditure,
            ..sale_on(12, 1, None)
        }
    }

    #[rstest]
    #[case(sale_on(10, 100, None), true)]
    #[case(sale_on(11, 100, Some(0)), true)]
    #[case(sale_on(9, 100, None), false)]
    #[case(sale_on(12, 0, None), false)]
    #[case(sale_on(12, 100, Some(-1)), false)]
    #[case(priced(Decimal::new(12345678, 4), None), false)]
    #[case(priced(Decimal::new(1250, 1), Some(Decimal::new(1001, 3))), false)]
    #[case(priced(Decimal::new(125_000, 3), Some(Decimal::new(1000, 3))), true)]
    #[case(priced(Decimal::new(10_000_000_000, 0), None), false)]
    #[case(priced(Decimal::new(100, 0), Some(Decimal::new(10_000_000_000, 0))), false)]
    #[case(priced(Decimal::new(999_999_999_999, 2), Some(Decimal::new(1050, 2))), true)]
    fn sale_checks(#[case] input: NewSale, #[case] ok: bool) {
        assert_eq!(input.check_against(&restaurant()).is_ok(), ok);
    }

    #[test]
    fn identical_sales_match() {
        let input = sale_on(12, 2500, Some(400));
        let existing = sale::Model {
            id: 9,
            restaurant_id: 1,
            income: Decimal::new(250000, 2),
            expenditure: Some(Decimal::from(400)),
            date: input.date,
        };
        assert!(input.matches(&existing));
        assert!(!sale_on(12, 2500, None).matches(&existing));
    }
}
