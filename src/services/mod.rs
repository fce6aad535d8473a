// Derived figures shared by the listing services
pub mod aggregates;

// Domain services
pub mod ratings;
pub mod restaurants;
pub mod sales;

pub use aggregates::{RelatedRows, RestaurantMetrics};
pub use ratings::RatingService;
pub use restaurants::RestaurantService;
pub use sales::SaleService;
