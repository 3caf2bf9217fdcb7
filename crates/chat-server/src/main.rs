mod relay;
mod rooms;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use chat_platform::llm::OpenAiClient;
use chat_types::config::ServerConfig;

use relay::{ws_handler, RelayService, SharedRelay};

#[derive(serde::Serialize)]
struct Health {
    status: String,
    message: String,
}

async fn health() -> axum::Json<Health> {
    axum::Json(Health {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring unparseable origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chat_server=debug".into()),
        )
        .with_target(false)
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("startup failed: {e}");
            std::process::exit(1);
        }
    };

    let mut upstream = OpenAiClient::new(&config.api_key).with_model(&config.model);
    if let Some(base) = &config.api_base {
        upstream = upstream.with_base_url(base);
    }

    let relay: SharedRelay = Arc::new(RelayService::new(Arc::new(upstream)));

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(cors_layer(&config.allowed_origins))
        .with_state(relay);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!("chat relay listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .expect("server exited with an error");
}
