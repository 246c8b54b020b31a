use sea_orm::entity::prelude::*;

/// Copy of a cart line. `food_id` goes to `NULL` if the food is deleted, and
/// such lines are skipped when the saved cart is loaded.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "saved_cart_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub saved_cart_id: Uuid,
    pub food_id: Option<Uuid>,
    pub quantity: i32,
    /// Price at the time of saving; loading re-prices from the menu.
    pub price_snapshot: i64,
    pub selected_variant: Option<String>,
    pub selected_addons: Json,
    pub notes: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::saved_carts::Entity",
        from = "Column::SavedCartId",
        to = "super::saved_carts::Column::Id"
    )]
    SavedCarts,
    #[sea_orm(
        belongs_to = "super::foods::Entity",
        from = "Column::FoodId",
        to = "super::foods::Column::Id"
    )]
    Foods,
}

impl Related<super::saved_carts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SavedCarts.def()
    }
}

impl Related<super::foods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Foods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
