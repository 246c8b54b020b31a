mod common;

use chrono::Utc;
use common::{add_to_cart, create_food, create_user, setup};
use food_order_api::{
    dto::cart::{DEFAULT_SAVED_CART_NAME, SaveCartRequest},
    entity::{
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts},
        foods::ActiveModel as FoodActive,
    },
    error::AppError,
    identifiers,
    services::{cart_service, saved_cart_service},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, Set,
};
use uuid::Uuid;

fn named(name: &str) -> SaveCartRequest {
    SaveCartRequest {
        name: Some(name.to_string()),
    }
}

fn cart_row(user_id: Uuid, is_active: bool) -> CartActive {
    let now = Utc::now();
    CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        is_active: Set(is_active),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
}

#[tokio::test]
async fn saving_requires_a_cart_with_lines() -> anyhow::Result<()> {
    let (state, _) = setup().await?;
    let user = create_user(&state, "user").await?;

    let err = saved_cart_service::save_cart(&state, &user, named("Lunch"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoActiveCart));

    let rice = create_food(&state, "Jollof Rice", 500).await?;
    add_to_cart(&state, &user, &rice, 1).await?;
    cart_service::clear_cart(&state, &user).await?;
    let err = saved_cart_service::save_cart(&state, &user, named("Lunch"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));
    Ok(())
}

#[tokio::test]
async fn saved_cart_is_a_copy_of_the_active_cart() -> anyhow::Result<()> {
    let (state, _) = setup().await?;
    let user = create_user(&state, "user").await?;
    let rice = create_food(&state, "Jollof Rice", 500).await?;
    let suya = create_food(&state, "Chicken Suya", 1200).await?;
    add_to_cart(&state, &user, &rice, 2).await?;
    add_to_cart(&state, &user, &suya, 1).await?;

    let saved = saved_cart_service::save_cart(&state, &user, SaveCartRequest { name: None })
        .await?
        .data
        .expect("saved cart");
    assert_eq!(saved.name, DEFAULT_SAVED_CART_NAME);
    assert_eq!(saved.items.len(), 2);

    cart_service::clear_cart(&state, &user).await?;

    let fetched = saved_cart_service::get_saved_cart(&state, &user, saved.id)
        .await?
        .data
        .expect("saved cart");
    assert_eq!(fetched.items.len(), 2);
    let rice_line = fetched
        .items
        .iter()
        .find(|item| item.food_id == Some(rice.id))
        .expect("rice line");
    assert_eq!(rice_line.quantity, 2);
    assert_eq!(rice_line.price_snapshot, 500);
    Ok(())
}

#[tokio::test]
async fn saved_carts_are_listed_newest_first_and_private() -> anyhow::Result<()> {
    let (state, _) = setup().await?;
    let user = create_user(&state, "user").await?;
    let stranger = create_user(&state, "user").await?;
    let rice = create_food(&state, "Jollof Rice", 500).await?;
    add_to_cart(&state, &user, &rice, 1).await?;

    let first = saved_cart_service::save_cart(&state, &user, named("Lunch"))
        .await?
        .data
        .expect("saved cart");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = saved_cart_service::save_cart(&state, &user, named("Dinner"))
        .await?
        .data
        .expect("saved cart");

    let listed = saved_cart_service::list_saved_carts(&state, &user)
        .await?
        .data
        .expect("saved carts");
    let ids: Vec<Uuid> = listed.items.iter().map(|cart| cart.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(listed.items.iter().all(|cart| cart.items.len() == 1));

    let theirs = saved_cart_service::list_saved_carts(&state, &stranger)
        .await?
        .data
        .expect("saved carts");
    assert!(theirs.items.is_empty());

    let err = saved_cart_service::get_saved_cart(&state, &stranger, first.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let err = saved_cart_service::delete_saved_cart(&state, &stranger, first.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let err = saved_cart_service::load_saved_cart(&state, &stranger, first.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    saved_cart_service::delete_saved_cart(&state, &user, first.id).await?;
    let err = saved_cart_service::get_saved_cart(&state, &user, first.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let listed = saved_cart_service::list_saved_carts(&state, &user)
        .await?
        .data
        .expect("saved carts");
    assert_eq!(listed.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn loading_reprices_and_skips_unavailable_foods() -> anyhow::Result<()> {
    let (state, _) = setup().await?;
    let user = create_user(&state, "user").await?;
    let rice = create_food(&state, "Jollof Rice", 500).await?;
    let suya = create_food(&state, "Chicken Suya", 1200).await?;
    let plantain = create_food(&state, "Dodo", 300).await?;
    add_to_cart(&state, &user, &rice, 2).await?;
    add_to_cart(&state, &user, &suya, 1).await?;

    let saved = saved_cart_service::save_cart(&state, &user, named("Friday"))
        .await?
        .data
        .expect("saved cart");

    let mut discounted = rice.clone().into_active_model();
    discounted.discount_price = Set(Some(450));
    discounted.update(&state.orm).await?;
    let mut sold_out: FoodActive = suya.clone().into_active_model();
    sold_out.is_available = Set(false);
    sold_out.update(&state.orm).await?;

    cart_service::clear_cart(&state, &user).await?;
    add_to_cart(&state, &user, &plantain, 3).await?;

    let resp = saved_cart_service::load_saved_cart(&state, &user, saved.id).await?;
    assert_eq!(resp.message, "Saved cart \"Friday\" loaded successfully");
    let loaded = resp.data.expect("loaded cart");
    assert_eq!(loaded.items_added, 1);
    assert_eq!(loaded.cart.items.len(), 1);
    assert_eq!(loaded.cart.items[0].food_id, rice.id);
    assert_eq!(loaded.cart.items[0].price_snapshot, 450);
    assert_eq!(loaded.cart.subtotal, 900);
    Ok(())
}

#[tokio::test]
async fn only_one_active_cart_per_user() -> anyhow::Result<()> {
    let (state, _) = setup().await?;
    let user = create_user(&state, "user").await?;

    cart_row(user.user_id, false).insert(&state.orm).await?;
    cart_row(user.user_id, false).insert(&state.orm).await?;
    cart_row(user.user_id, true).insert(&state.orm).await?;

    let err = cart_row(user.user_id, true)
        .insert(&state.orm)
        .await
        .unwrap_err();
    assert!(identifiers::is_unique_violation(&err));

    let carts = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .count(&state.orm)
        .await?;
    assert_eq!(carts, 3);
    Ok(())
}
