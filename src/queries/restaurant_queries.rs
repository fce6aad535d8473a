use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr, Query as SelectQuery, SimpleExpr},
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Select,
};
use serde::Serialize;
use tracing::{debug, instrument};

use super::Query;
use crate::{
    auth::user,
    entities::{rating, restaurant, sale, Restaurant, RestaurantType},
    errors::ServiceError,
};

/// Score buckets accepted by `rating_filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RatingBucket {
    /// `1-3`: score <= 3
    UpToThree,
    /// `4-5`: score is 4 or 5
    FourOrFive,
    /// `>=3`: score >= 3
    AtLeastThree,
    /// `1star`: score == 1
    OneStar,
}

impl RatingBucket {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1-3" => Some(Self::UpToThree),
            "4-5" => Some(Self::FourOrFive),
            ">=3" => Some(Self::AtLeastThree),
            "1star" => Some(Self::OneStar),
            _ => None,
        }
    }

    fn predicate(self) -> SimpleExpr {
        let score = rating::Column::Score;
        match self {
            Self::UpToThree => score.lte(3),
            Self::FourOrFive => score.is_in([4, 5]),
            Self::AtLeastThree => score.gte(3),
            Self::OneStar => score.eq(1),
        }
    }
}

/// Sale income ranges accepted by `sales_filter`. Bounds are inclusive
/// except for the upper bound of `<2000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IncomeRange {
    Below2000,
    From2000To4000,
    From4000To6000,
    From6000,
}

impl IncomeRange {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "<2000" => Some(Self::Below2000),
            "2000to4000" => Some(Self::From2000To4000),
            "4000to6000" => Some(Self::From4000To6000),
            ">6000" => Some(Self::From6000),
            _ => None,
        }
    }

    fn predicate(self) -> SimpleExpr {
        let income = sale::Column::Income;
        match self {
            Self::Below2000 => income.lt(Decimal::from(2000)),
            Self::From2000To4000 => income.between(Decimal::from(2000), Decimal::from(4000)),
            Self::From4000To6000 => income.between(Decimal::from(4000), Decimal::from(6000)),
            Self::From6000 => income.gte(Decimal::from(6000)),
        }
    }
}

/// Listing filter built from the query string. Every dimension is optional
/// and the dimensions combine conjunctively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestaurantFilter {
    pub rating: Option<RatingBucket>,
    /// `None` when no type was selected. `Some(vec![])` when every selected
    /// label was unknown, which matches nothing.
    pub types: Option<Vec<RestaurantType>>,
    pub income: Option<IncomeRange>,
    pub query: Option<String>,
}

impl RestaurantFilter {
    /// Builds a filter from decoded `key=value` pairs. `type_filter` may repeat.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::default();
        let mut labels: Vec<String> = Vec::new();

        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "rating_filter" => filter.rating = RatingBucket::parse(value),
                "type_filter" => labels.push(value.to_string()),
                "sales_filter" => filter.income = IncomeRange::parse(value),
                "q" => filter.query = Some(value.to_string()),
                _ => {}
            }
        }

        if !labels.is_empty() {
            let mut types: Vec<RestaurantType> = Vec::new();
            for t in labels.iter().filter_map(|label| RestaurantType::from_label(label)) {
                if !types.contains(&t) {
                    types.push(t);
                }
            }
            filter.types = Some(types);
        }

        filter
    }

    /// Parses a raw (still percent-encoded) query string.
    pub fn from_query_string(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => Self::from_pairs(url::form_urlencoded::parse(raw.as_bytes())),
            None => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.types.is_none() && self.income.is_none() && self.query.is_none()
    }

    /// The conjunction of one predicate per selected dimension. Related-row
    /// predicates are `id IN (subquery)` so the base query never fans out.
    pub fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(types) = &self.types {
            condition = condition.add(
                restaurant::Column::RestaurantType.is_in(types.iter().map(|t| t.code())),
            );
        }

        if let Some(bucket) = self.rating {
            condition = condition.add(
                restaurant::Column::Id.in_subquery(
                    SelectQuery::select()
                        .column(rating::Column::RestaurantId)
                        .from(rating::Entity)
                        .and_where(bucket.predicate())
                        .to_owned(),
                ),
            );
        }

        if let Some(range) = self.income {
            condition = condition.add(
                restaurant::Column::Id.in_subquery(
                    SelectQuery::select()
                        .column(sale::Column::RestaurantId)
                        .from(sale::Entity)
                        .and_where(range.predicate())
                        .to_owned(),
                ),
            );
        }

        if let Some(query) = &self.query {
            condition = condition.add(text_search(query));
        }

        condition
    }

    /// Adds [`Self::condition`] to `select` unless no dimension is set.
    pub fn apply(&self, select: Select<Restaurant>) -> Select<Restaurant> {
        if self.is_empty() {
            select
        } else {
            select.filter(self.condition())
        }
    }
}

/// Escapes LIKE wildcards so user input is matched literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn lower_like(column: Expr, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(column)).like(LikeExpr::new(pattern).escape('\\'))
}

fn name_search(term: &str) -> SimpleExpr {
    lower_like(
        Expr::col((restaurant::Entity, restaurant::Column::Name)),
        &like_pattern(term),
    )
}

/// Case-insensitive substring match on name, type code or owner username.
fn text_search(term: &str) -> Condition {
    let pattern = like_pattern(term);
    Condition::any()
        .add(lower_like(
            Expr::col((restaurant::Entity, restaurant::Column::Name)),
            &pattern,
        ))
        .add(lower_like(
            Expr::col((restaurant::Entity, restaurant::Column::RestaurantType)),
            &pattern,
        ))
        .add(
            restaurant::Column::UserId.in_subquery(
                SelectQuery::select()
                    .column(user::Column::Id)
                    .from(user::Entity)
                    .and_where(lower_like(
                        Expr::col((user::Entity, user::Column::Username)),
                        &pattern,
                    ))
                    .to_owned(),
            ),
        )
}

/// Home listing: restaurants matching a [`RestaurantFilter`], each once,
/// ordered by id.
#[derive(Debug, Clone)]
pub struct ListRestaurantsQuery {
    pub filter: RestaurantFilter,
}

#[async_trait]
impl Query for ListRestaurantsQuery {
    type Result = Vec<restaurant::Model>;

    #[instrument(skip(self, db), fields(filter = ?self.filter))]
    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        debug!("Executing ListRestaurantsQuery");
        self.filter
            .apply(Restaurant::find())
            .order_by_asc(restaurant::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

/// Restaurants whose name contains `name_contains`, optionally limited to
/// one owner. Backs the rating and sales pages.
#[derive(Debug, Clone, Default)]
pub struct SearchRestaurantsByNameQuery {
    pub owner_id: Option<i32>,
    pub name_contains: Option<String>,
}

#[async_trait]
impl Query for SearchRestaurantsByNameQuery {
    type Result = Vec<restaurant::Model>;

    #[instrument(skip(self, db))]
    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut condition = Condition::all();
        if let Some(owner_id) = self.owner_id {
            condition = condition.add(restaurant::Column::UserId.eq(owner_id));
        }
        if let Some(term) = self
            .name_contains
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            condition = condition.add(name_search(term));
        }

        Restaurant::find()
            .filter(condition)
            .order_by_asc(restaurant::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

/// Distinct restaurant types present in the table, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RestaurantTypesInUseQuery;

#[async_trait]
impl Query for RestaurantTypesInUseQuery {
    type Result = Vec<RestaurantType>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let codes: Vec<String> = Restaurant::find()
            .select_only()
            .column(restaurant::Column::RestaurantType)
            .distinct()
            .into_tuple()
            .all(db)
            .await?;

        Ok(RestaurantType::ALL
            .into_iter()
            .filter(|t| codes.iter().any(|code| code == t.code()))
            .collect())
    }
}
