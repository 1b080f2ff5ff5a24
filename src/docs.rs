use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::products::list_products,
        crate::api::products::get_product,
        crate::api::products::social_links,
        crate::api::checkout::create_checkout_session,
        crate::api::downloads::redeem_download,
        crate::api::downloads::free_download
    ),
    components(
        schemas(
            crate::models::Product,
            crate::models::Purchase,
            crate::models::SocialMediaLink,
            crate::api::checkout::CreateCheckoutRequest,
            crate::api::checkout::CreateCheckoutResponse,
            crate::api::downloads::DownloadResponse,
            crate::api::downloads::FreeDownloadRequest,
            crate::api::downloads::FreeDownloadResponse
        )
    ),
    tags(
        (name = "catalog", description = "Product catalog"),
        (name = "checkout", description = "Payment session creation"),
        (name = "downloads", description = "Purchase redemption and free downloads")
    )
)]
pub struct ApiDoc;
