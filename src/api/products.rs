// src/api/products.rs

use actix_web::{HttpResponse, get, web};
use uuid::Uuid;

use crate::error::ApiError;
use crate::{AppState, db};

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "catalog",
    responses((status = 200, description = "Active products, newest first"))
)]
#[get("/products")]
pub async fn list_products(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let products = db::list_active_products(&state.pool).await?;
    Ok(HttpResponse::Ok().json(products))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product"),
        (status = 404, description = "Product not found or inactive")
    )
)]
#[get("/products/{id}")]
pub async fn get_product(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let id = Uuid::parse_str(path.into_inner().trim())
        .map_err(|_| ApiError::BadRequest("invalid product id".into()))?;

    let product = db::get_active_product(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;

    Ok(HttpResponse::Ok().json(product))
}

#[utoipa::path(
    get,
    path = "/api/social-links",
    tag = "catalog",
    responses((status = 200, description = "Configured social links, possibly empty"))
)]
#[get("/social-links")]
pub async fn social_links(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let links = db::list_social_links(&state.pool).await?;
    Ok(HttpResponse::Ok().json(links))
}
