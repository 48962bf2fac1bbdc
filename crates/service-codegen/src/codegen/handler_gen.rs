//! Handler generation - the endpoint handler, health route and `main`

use super::type_gen::{model_ident, to_snake_case};
use anyhow::{bail, Result};
use architect_common::{HttpMethod, ServiceSpec};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// Path the generated service answers health checks on
pub const HEALTH_PATH: &str = "/healthz";

/// `use` items needed by the generated file
pub fn generate_imports(method: HttpMethod) -> TokenStream {
    let extractor = if method.has_body() {
        quote! { Json }
    } else {
        quote! { Query }
    };

    let routing = match method {
        HttpMethod::Get => quote! { get },
        HttpMethod::Post => quote! { get, post },
        HttpMethod::Put => quote! { get, put },
        HttpMethod::Delete => quote! { delete, get },
    };

    let json_import = if method.has_body() {
        quote! {}
    } else {
        quote! { use axum::Json; }
    };

    quote! {
        use axum::extract::#extractor;
        use axum::http::StatusCode;
        use axum::routing::{#routing};
        use axum::Router;
        #json_import
        use serde::{Deserialize, Serialize};
        use serde_json::{json, Value};
    }
}

/// Generate the endpoint handler
pub fn generate_handler(spec: &ServiceSpec) -> Result<TokenStream> {
    let endpoint = &spec.endpoint;
    let model = model_ident(&endpoint.model_name)?;
    let handler = handler_ident(&endpoint.model_name);
    let received = format!("Received {} {}", endpoint.method, endpoint.path);

    let extractor = if endpoint.method.has_body() {
        quote! { Json(payload): Json<#model> }
    } else {
        quote! { Query(payload): Query<#model> }
    };

    Ok(quote! {
        async fn #handler(#extractor) -> (StatusCode, Json<Value>) {
            match payload.validate() {
                Ok(()) => (
                    StatusCode::OK,
                    Json(json!({
                        "status": "success",
                        "message": #received,
                        "data": payload,
                    })),
                ),
                Err(message) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "status": "error",
                        "message": message,
                    })),
                ),
            }
        }
    })
}

/// Generate the health handler and `main`
pub fn generate_main(spec: &ServiceSpec) -> Result<TokenStream> {
    let endpoint = &spec.endpoint;
    validate_route_path(&endpoint.path)?;

    let handler = handler_ident(&endpoint.model_name);
    let route_fn = match endpoint.method {
        HttpMethod::Get => quote! { get },
        HttpMethod::Post => quote! { post },
        HttpMethod::Put => quote! { put },
        HttpMethod::Delete => quote! { delete },
    };
    let path = &endpoint.path;
    let service_name = &spec.service_name;

    Ok(quote! {
        async fn health() -> Json<Value> {
            Json(json!({ "status": "ok", "service": #service_name }))
        }

        #[tokio::main]
        async fn main() {
            let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());

            let app = Router::new()
                .route(#HEALTH_PATH, get(health))
                .route(#path, #route_fn(#handler));

            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
                .await
                .expect("failed to bind listener");

            axum::serve(listener, app).await.expect("server error");
        }
    })
}

fn handler_ident(model_name: &str) -> proc_macro2::Ident {
    format_ident!("handle_{}", to_snake_case(model_name))
}

/// Only static paths are supported by the generated router
fn validate_route_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        bail!("endpoint path '{}' must start with '/'", path);
    }

    if path == HEALTH_PATH {
        bail!("endpoint path '{}' is reserved for health checks", path);
    }

    if let Some(c) = path
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.')))
    {
        bail!("endpoint path '{}' contains unsupported character '{}'", path, c);
    }

    Ok(())
}
