use sea_orm_migration::prelude::*;

mod m20251016_000001_create_catalog_and_cart;
mod m20251016_000002_create_orders_and_payments;
mod m20251016_000003_saved_carts_and_active_cart_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251016_000001_create_catalog_and_cart::Migration),
            Box::new(m20251016_000002_create_orders_and_payments::Migration),
            Box::new(m20251016_000003_saved_carts_and_active_cart_index::Migration),
        ]
    }
}
