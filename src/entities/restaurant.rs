use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Restaurant entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "restaurants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    /// Owning user
    pub user_id: i32,

    pub website: Option<String>,

    pub latitude: f64,

    pub longitude: f64,

    pub restaurant_type: RestaurantType,

    pub opened_at: NaiveDate,
}

/// Fixed restaurant categories. The database stores the two-letter code;
/// the UI shows the label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(2))")]
pub enum RestaurantType {
    #[sea_orm(string_value = "FF")]
    #[serde(rename = "FF", alias = "Fast Food")]
    FastFood,
    #[sea_orm(string_value = "IT")]
    #[serde(rename = "IT", alias = "Italian")]
    Italian,
    #[sea_orm(string_value = "EG")]
    #[serde(rename = "EG", alias = "Egyptian")]
    Egyptian,
    #[sea_orm(string_value = "DR")]
    #[serde(rename = "DR", alias = "Drinks")]
    Drinks,
    #[sea_orm(string_value = "AR")]
    #[serde(rename = "AR", alias = "Arabian")]
    Arabian,
    #[sea_orm(string_value = "OT")]
    #[serde(rename = "OT", alias = "Other")]
    Other,
}

impl RestaurantType {
    pub const ALL: [RestaurantType; 6] = [
        RestaurantType::FastFood,
        RestaurantType::Italian,
        RestaurantType::Egyptian,
        RestaurantType::Drinks,
        RestaurantType::Arabian,
        RestaurantType::Other,
    ];

    /// Storage code, e.g. `"IT"`.
    pub fn code(self) -> &'static str {
        match self {
            RestaurantType::FastFood => "FF",
            RestaurantType::Italian => "IT",
            RestaurantType::Egyptian => "EG",
            RestaurantType::Drinks => "DR",
            RestaurantType::Arabian => "AR",
            RestaurantType::Other => "OT",
        }
    }

    /// Display label, e.g. `"Italian"`.
    pub fn label(self) -> &'static str {
        match self {
            RestaurantType::FastFood => "Fast Food",
            RestaurantType::Italian => "Italian",
            RestaurantType::Egyptian => "Egyptian",
            RestaurantType::Drinks => "Drinks",
            RestaurantType::Arabian => "Arabian",
            RestaurantType::Other => "Other",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Label lookup is exact apart from surrounding whitespace. The legacy
    /// misspelling "Egyption" still resolves.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label == "Egyption" {
            return Some(RestaurantType::Egyptian);
        }
        Self::ALL.into_iter().find(|t| t.label() == label)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::auth::user::Entity",
        from = "Column::UserId",
        to = "crate::auth::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::rating::Entity")]
    Rating,
    #[sea_orm(has_many = "super::sale::Entity")]
    Sale,
}

impl Related<crate::auth::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::rating::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rating.def()
    }
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sale.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
