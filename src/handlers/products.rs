//! Product catalog handlers (list, create, delete).

use bytes::Bytes;
use futures::stream;
use lambda_http::tracing::{info, warn};
use lambda_http::{Body, Request, Response};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth::{caller_from_event, require_admin};
use crate::error::ApiError;
use crate::handlers::{now_timestamp, to_json};
use crate::http::{decode_inline_image, header_value, image_extension, json_response, optional_str, parse_json_body};
use crate::models::{Category, Product};
use crate::state::AppState;

/// Image bytes sent with a product, with their content type
struct InlineImage {
    bytes: Vec<u8>,
    content_type: String,
}

/// Text fields of a create request plus an optional inline image
struct ProductForm {
    fields: Value,
    image: Option<InlineImage>,
}

/// Lists the catalog.
///
/// A storage failure is logged and answered with the built-in sample
/// catalog so the storefront still renders.
pub async fn handle_list_products(state: &AppState) -> Result<Response<Body>, ApiError> {
    let products = match state.products.list().await {
        Ok(products) => products,
        Err(e) => {
            warn!("Failed to fetch products, serving sample catalog: {}", e);
            sample_products()
        }
    };
    Ok(json_response(200, &to_json(&products, "products")?))
}

/// Creates a product from a JSON or `multipart/form-data` body.
///
/// Inline images are stored at `products/{id}/image.{ext}`. The owner is the
/// verified caller when there is one, otherwise the `userId` field.
pub async fn handle_create_product(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let caller = caller_from_event(event, state.verifier.as_ref()).await?;
    let form = read_product_form(event).await?;
    let fields = &form.fields;

    let name = optional_str(fields, "name").ok_or_else(|| ApiError::bad_request("name is required"))?;
    let price = parse_price(fields)?;
    let category = optional_str(fields, "category")
        .and_then(|c| c.parse::<Category>().ok())
        .unwrap_or_default();

    let id = Uuid::new_v4().to_string();
    let image = match form.image {
        Some(inline) => {
            let key = format!("products/{}/image.{}", id, image_extension(Some(&inline.content_type)));
            state
                .objects
                .put(&key, inline.bytes, &inline.content_type)
                .await
                .map_err(|e| ApiError::upstream("Failed to add product", e))?;
            state.objects.public_url(&key)
        }
        None => optional_str(fields, "imageUrl").unwrap_or_default(),
    };

    let user_id = caller
        .map(|c| c.sub)
        .or_else(|| optional_str(fields, "userId"))
        .unwrap_or_default();

    let product = Product {
        id: id.clone(),
        name,
        description: optional_str(fields, "description").unwrap_or_default(),
        price,
        category,
        image,
        user_id,
        created_at: now_timestamp(),
    };

    state
        .products
        .append(product.clone())
        .await
        .map_err(|e| ApiError::upstream("Failed to add product", e))?;
    info!("Product {} created by '{}'", product.id, product.user_id);

    Ok(json_response(
        201,
        &json!({
            "id": id,
            "message": "Product added successfully",
            "product": to_json(&product, "product")?,
        }),
    ))
}

/// Removes a product (admin only).
pub async fn handle_delete_product(event: &Request, product_id: &str, state: &AppState) -> Result<Response<Body>, ApiError> {
    let caller = caller_from_event(event, state.verifier.as_ref()).await?;
    require_admin(caller.as_ref(), &state.config.admin_emails)?;

    let removed = state
        .products
        .remove_where(&|p: &Product| p.id == product_id)
        .await
        .map_err(|e| ApiError::upstream("Failed to delete product", e))?;
    if removed == 0 {
        return Err(ApiError::not_found("Product not found"));
    }
    info!("Product {} deleted", product_id);

    Ok(json_response(200, &json!({ "message": "Product deleted successfully", "id": product_id })))
}

async fn read_product_form(event: &Request) -> Result<ProductForm, ApiError> {
    let content_type = header_value(event, "Content-Type").unwrap_or_default();
    if content_type.to_ascii_lowercase().starts_with("multipart/form-data") {
        return read_multipart_form(content_type, event.body()).await;
    }

    let mut fields = parse_json_body(event.body())?;
    if !fields.is_object() {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    }

    // `image` may carry inline data or an already uploaded URL
    let image = match optional_str(&fields, "image") {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            if optional_str(&fields, "imageUrl").is_none() {
                fields["imageUrl"] = Value::String(url);
            }
            None
        }
        Some(data) => {
            let (bytes, content_type) = decode_inline_image(&data)?;
            Some(InlineImage {
                bytes,
                content_type: content_type.unwrap_or_else(|| "image/jpeg".to_string()),
            })
        }
        None => None,
    };

    Ok(ProductForm { fields, image })
}

async fn read_multipart_form(content_type: &str, body: &Body) -> Result<ProductForm, ApiError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| ApiError::bad_request("Missing multipart boundary"))?;
    let bytes = Bytes::copy_from_slice(body.as_ref());
    let body_stream = stream::once(async move { Ok::<Bytes, std::io::Error>(bytes) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    let mut fields = Map::new();
    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let content_type = field
                .content_type()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "image/jpeg".to_string());
            let data = field.bytes().await.map_err(invalid_multipart)?;
            if !data.is_empty() {
                image = Some(InlineImage { bytes: data.to_vec(), content_type });
            }
        } else {
            let text = field.text().await.map_err(invalid_multipart)?;
            fields.insert(name, Value::String(text));
        }
    }

    Ok(ProductForm { fields: Value::Object(fields), image })
}

fn invalid_multipart(e: multer::Error) -> ApiError {
    ApiError::bad_request(format!("Could not parse multipart body: {}", e))
}

/// Accepts a JSON number or a numeric string; must be finite and non-negative.
fn parse_price(fields: &Value) -> Result<f64, ApiError> {
    let price = match fields.get("price") {
        None | Some(Value::Null) => return Err(ApiError::bad_request("price is required")),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    price
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or_else(|| ApiError::bad_request("price is not a valid value"))
}

fn sample_products() -> Vec<Product> {
    let sample = |id: &str, name: &str, description: &str, price: f64, category: Category, label: &str, color: &str| Product {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        price,
        category,
        image: format!("https://via.placeholder.com/300x300/{}/white?text={}", color, label),
        user_id: String::new(),
        created_at: String::new(),
    };

    vec![
        sample("demo-001", "Sample T-Shirt", "Comfortable cotton t-shirt", 19.99, Category::Clothing, "T-Shirt", "1976d2"),
        sample("demo-002", "Coffee Mug", "Ceramic coffee mug", 12.99, Category::Kitchen, "Mug", "2e7d32"),
        sample("demo-003", "Tech Book", "Learn programming basics", 29.99, Category::Books, "Book", "f57c00"),
        sample("demo-004", "Wireless Headphones", "High-quality wireless headphones", 89.99, Category::Electronics, "Headphones", "9c27b0"),
        sample("demo-005", "Smart Watch", "Feature-rich smartwatch", 199.99, Category::Electronics, "Watch", "e91e63"),
        sample("demo-006", "Running Shoes", "Comfortable running shoes", 79.99, Category::Sports, "Shoes", "3f51b5"),
    ]
}
