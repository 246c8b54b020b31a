use sea_orm_migration::prelude::*;

use super::m20251016_000001_create_catalog_and_cart::{Foods, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Carts {
    Table,
    UserId,
    IsActive,
}

#[derive(DeriveIden)]
enum SavedCarts {
    Table,
    Id,
    UserId,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SavedCartItems {
    Table,
    Id,
    SavedCartId,
    FoodId,
    Quantity,
    PriceSnapshot,
    SelectedVariant,
    SelectedAddons,
    Notes,
    CreatedAt,
}

const OLD_ACTIVE_CART_INDEX: &str = "uq_carts_user_active";
const ACTIVE_CART_INDEX: &str = "uq_carts_user_active_only";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One active cart per user; any number of inactive ones.
        manager
            .drop_index(
                Index::drop()
                    .name(OLD_ACTIVE_CART_INDEX)
                    .table(Carts::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name(ACTIVE_CART_INDEX)
                    .table(Carts::Table)
                    .col(Carts::UserId)
                    .unique()
                    .and_where(Expr::col(Carts::IsActive).eq(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SavedCarts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SavedCarts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SavedCarts::UserId).uuid().not_null())
                    .col(ColumnDef::new(SavedCarts::Name).string_len(200).not_null())
                    .col(
                        ColumnDef::new(SavedCarts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SavedCarts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_saved_carts_user")
                            .from(SavedCarts::Table, SavedCarts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_saved_carts_user_created")
                    .table(SavedCarts::Table)
                    .col(SavedCarts::UserId)
                    .col(SavedCarts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SavedCartItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SavedCartItems::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SavedCartItems::SavedCartId).uuid().not_null())
                    .col(ColumnDef::new(SavedCartItems::FoodId).uuid())
                    .col(ColumnDef::new(SavedCartItems::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(SavedCartItems::PriceSnapshot)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SavedCartItems::SelectedVariant).string_len(100))
                    .col(
                        ColumnDef::new(SavedCartItems::SelectedAddons)
                            .json()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SavedCartItems::Notes).text())
                    .col(
                        ColumnDef::new(SavedCartItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_saved_cart_items_saved_cart")
                            .from(SavedCartItems::Table, SavedCartItems::SavedCartId)
                            .to(SavedCarts::Table, SavedCarts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_saved_cart_items_food")
                            .from(SavedCartItems::Table, SavedCartItems::FoodId)
                            .to(Foods::Table, Foods::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SavedCartItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SavedCarts::Table).to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name(ACTIVE_CART_INDEX)
                    .table(Carts::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name(OLD_ACTIVE_CART_INDEX)
                    .table(Carts::Table)
                    .col(Carts::UserId)
                    .col(Carts::IsActive)
                    .unique()
                    .to_owned(),
            )
            .await
    }
}
