use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_restaurants_table::Migration),
            Box::new(m20240101_000003_create_ratings_table::Migration),
            Box::new(m20240101_000004_create_sales_table::Migration),
        ]
    }
}

mod m20240101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(150)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RefreshTokens::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RefreshTokens::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(RefreshTokens::UserId).integer().not_null())
                        .col(
                            ColumnDef::new(RefreshTokens::TokenId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RefreshTokens::Revoked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_refresh_tokens_user_id")
                                .from(RefreshTokens::Table, RefreshTokens::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RefreshTokens::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Users {
        Table,
        Id,
        Username,
        PasswordHash,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RefreshTokens {
        Table,
        Id,
        UserId,
        TokenId,
        CreatedAt,
        ExpiresAt,
        Revoked,
    }
}

mod m20240101_000002_create_restaurants_table {
    use super::m20240101_000001_create_users_table::Users;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_restaurants_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Restaurants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Restaurants::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Restaurants::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Restaurants::UserId).integer().not_null())
                        .col(ColumnDef::new(Restaurants::Website).string().null())
                        .col(
                            ColumnDef::new(Restaurants::Latitude)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(Restaurants::Longitude)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(Restaurants::RestaurantType)
                                .string_len(2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Restaurants::OpenedAt).date().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_restaurants_user_id")
                                .from(Restaurants::Table, Restaurants::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_restaurants_user_id")
                        .table(Restaurants::Table)
                        .col(Restaurants::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_restaurants_type")
                        .table(Restaurants::Table)
                        .col(Restaurants::RestaurantType)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Restaurants::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Restaurants {
        Table,
        Id,
        Name,
        UserId,
        Website,
        Latitude,
        Longitude,
        RestaurantType,
        OpenedAt,
    }
}

mod m20240101_000003_create_ratings_table {
    use super::m20240101_000001_create_users_table::Users;
    use super::m20240101_000002_create_restaurants_table::Restaurants;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_ratings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Ratings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Ratings::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Ratings::UserId).integer().not_null())
                        .col(ColumnDef::new(Ratings::RestaurantId).integer().not_null())
                        .col(
                            ColumnDef::new(Ratings::Score)
                                .integer()
                                .not_null()
                                .check(Expr::col(Ratings::Score).between(1, 5)),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_ratings_user_id")
                                .from(Ratings::Table, Ratings::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_ratings_restaurant_id")
                                .from(Ratings::Table, Ratings::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Backs the ON CONFLICT target of the rating upsert.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ratings_user_restaurant")
                        .table(Ratings::Table)
                        .col(Ratings::UserId)
                        .col(Ratings::RestaurantId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ratings_restaurant_id")
                        .table(Ratings::Table)
                        .col(Ratings::RestaurantId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Ratings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Ratings {
        Table,
        Id,
        UserId,
        RestaurantId,
        Score,
    }
}

mod m20240101_000004_create_sales_table {
    use super::m20240101_000002_create_restaurants_table::Restaurants;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_sales_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Sales::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Sales::RestaurantId).integer().not_null())
                        .col(ColumnDef::new(Sales::Income).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Sales::Expenditure).decimal_len(12, 2).null())
                        .col(
                            ColumnDef::new(Sales::Date)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_restaurant_id")
                                .from(Sales::Table, Sales::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sales_restaurant_id")
                        .table(Sales::Table)
                        .col(Sales::RestaurantId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        RestaurantId,
        Income,
        Expenditure,
        Date,
    }
}
