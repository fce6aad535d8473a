pub mod rating;
pub mod restaurant;
pub mod sale;

pub use rating::Entity as Rating;
pub use restaurant::{Entity as Restaurant, RestaurantType};
pub use sale::Entity as Sale;
