pub mod common;
pub mod ratings;
pub mod read_api;
pub mod restaurants;
pub mod sales;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::services::{RatingService, RestaurantService, SaleService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub restaurants: Arc<RestaurantService>,
    pub ratings: Arc<RatingService>,
    pub sales: Arc<SaleService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            restaurants: Arc::new(RestaurantService::new(db.clone())),
            ratings: Arc::new(RatingService::new(db.clone())),
            sales: Arc::new(SaleService::new(db)),
        }
    }
}
