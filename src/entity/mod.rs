pub mod cart_items;
pub mod carts;
pub mod foods;
pub mod order_items;
pub mod order_status_history;
pub mod orders;
pub mod payments;
pub mod saved_cart_items;
pub mod saved_carts;
pub mod users;

pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use foods::Entity as Foods;
pub use order_items::Entity as OrderItems;
pub use order_status_history::Entity as OrderStatusHistory;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use saved_cart_items::Entity as SavedCartItems;
pub use saved_carts::Entity as SavedCarts;
pub use users::Entity as Users;
