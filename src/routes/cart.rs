use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{
        AddToCartRequest, CartView, LoadedCart, SaveCartRequest, SavedCartList,
        UpdateCartItemRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::SavedCart,
    response::ApiResponse,
    services::{cart_service, saved_cart_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(view_cart).delete(clear_cart))
        .route("/items", post(add_to_cart))
        .route("/items/{id}", patch(update_cart_item).delete(remove_from_cart))
        .route("/save", post(save_cart))
        .route("/saved", get(list_saved_carts))
        .route("/saved/{id}", get(get_saved_cart).delete(delete_saved_cart))
        .route("/saved/{id}/load", post(load_saved_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Active cart with subtotal and item count", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn view_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::view_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add a food or increase its quantity", body = ApiResponse<CartView>),
        (status = 400, description = "Food not found or unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::add_item(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/items/{id}",
    params(
        ("id" = Uuid, Path, description = "Cart item ID")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Cart item updated", body = ApiResponse<CartView>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::update_item(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{id}",
    params(
        ("id" = Uuid, Path, description = "Cart item ID")
    ),
    responses(
        (status = 200, description = "Removed from cart", body = ApiResponse<CartView>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::remove_item(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "All items removed from the active cart", body = ApiResponse<CartView>),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::clear_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/save",
    request_body = SaveCartRequest,
    responses(
        (status = 201, description = "Active cart copied into a saved cart", body = ApiResponse<SavedCart>),
        (status = 400, description = "Cart empty or missing"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn save_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SaveCartRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<SavedCart>>)> {
    let resp = saved_cart_service::save_cart(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/cart/saved",
    responses(
        (status = 200, description = "Saved carts of the current user, newest first", body = ApiResponse<SavedCartList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn list_saved_carts(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SavedCartList>>> {
    let resp = saved_cart_service::list_saved_carts(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/cart/saved/{id}",
    params(
        ("id" = Uuid, Path, description = "Saved cart ID")
    ),
    responses(
        (status = 200, description = "Saved cart with its lines", body = ApiResponse<SavedCart>),
        (status = 404, description = "Saved cart not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_saved_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SavedCart>>> {
    let resp = saved_cart_service::get_saved_cart(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/saved/{id}",
    params(
        ("id" = Uuid, Path, description = "Saved cart ID")
    ),
    responses(
        (status = 200, description = "Saved cart deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Saved cart not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn delete_saved_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = saved_cart_service::delete_saved_cart(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/saved/{id}/load",
    params(
        ("id" = Uuid, Path, description = "Saved cart ID")
    ),
    responses(
        (status = 200, description = "Active cart replaced with the saved lines at current prices", body = ApiResponse<LoadedCart>),
        (status = 404, description = "Saved cart not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn load_saved_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LoadedCart>>> {
    let resp = saved_cart_service::load_saved_cart(&state, &user, id).await?;
    Ok(Json(resp))
}
