/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use rentloop_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::from_config(pool, config)?;
/// let app = rentloop_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use rentloop_shared::{
    auth::middleware::{authenticate_bearer, AuthError},
    catalog::{CatalogClient, HttpCatalogClient},
    payments::processor::{PaymentProcessor, StripeProcessor},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Item reads for rentals and payments
    pub catalog: Arc<dyn CatalogClient>,

    /// Payment processor API
    pub processor: Arc<dyn PaymentProcessor>,
}

impl AppState {
    /// Creates state from explicit collaborators
    pub fn new(
        db: PgPool,
        config: Config,
        catalog: Arc<dyn CatalogClient>,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            catalog,
            processor,
        }
    }

    /// Creates state with the HTTP catalog and Stripe clients from `config`
    pub fn from_config(db: PgPool, config: Config) -> anyhow::Result<Self> {
        let catalog = HttpCatalogClient::new(config.catalog.api_base.clone(), config.catalog_timeout())?;
        let processor = StripeProcessor::new(
            config.payments.api_base.clone(),
            config.payments.secret_key.clone(),
            config.processor_timeout(),
        )?;

        Ok(Self::new(db, config, Arc::new(catalog), Arc::new(processor)))
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// ├── /uploads/{filename}              # Stored images (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /signup
///     │   ├── POST /token              # form: username, password
///     │   ├── GET  /me, /users/me
///     │   ├── POST /password/forgot
///     │   └── POST /password/reset
///     ├── /categories/                 # GET list, POST create, GET /:id
///     ├── /items/                      # CRUD, GET /me, PUT /:id/availability
///     ├── /rentals/                    # POST, GET /me, POST /:id/return,
///     │                                # GET /item/:item_id/availability
///     ├── /payments/                   # POST /intents, GET /:id
///     ├── /webhooks/processor          # signed processor events
///     └── /uploads                     # POST multipart image
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Bearer authentication (soft: anonymous requests pass, handlers that
///    need a user take [`AuthContext`](rentloop_shared::auth::middleware::AuthContext))
/// 2. Logging (tower-http TraceLayer)
/// 3. CORS (tower-http CorsLayer)
/// 4. Security headers
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/token", post(routes::auth::token))
        .route("/me", get(routes::auth::me))
        .route("/users/me", get(routes::auth::me))
        .route("/password/forgot", post(routes::auth::forgot_password))
        .route("/password/reset", post(routes::auth::reset_password));

    let category_routes = Router::new()
        .route(
            "/",
            get(routes::categories::list_categories).post(routes::categories::create_category),
        )
        .route("/:id", get(routes::categories::get_category));

    let item_routes = Router::new()
        .route(
            "/",
            get(routes::items::list_items).post(routes::items::create_item),
        )
        .route("/me", get(routes::items::my_items))
        .route(
            "/:id",
            get(routes::items::get_item)
                .patch(routes::items::patch_item)
                .put(routes::items::replace_item)
                .delete(routes::items::delete_item),
        )
        .route("/:id/availability", put(routes::items::set_availability));

    let rental_routes = Router::new()
        .route("/", post(routes::rentals::create_rental))
        .route("/me", get(routes::rentals::my_rentals))
        .route("/:id/return", post(routes::rentals::return_rental))
        .route(
            "/item/:item_id/availability",
            get(routes::rentals::item_availability),
        );

    let payment_routes = Router::new()
        .route("/intents", post(routes::payments::create_intent))
        .route("/:id", get(routes::payments::get_payment));

    let upload_routes = Router::new()
        .route("/", post(routes::uploads::upload_image))
        .layer(DefaultBodyLimit::max(state.config.uploads.max_bytes));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/categories", category_routes)
        .nest("/items", item_routes)
        .nest("/rentals", rental_routes)
        .nest("/payments", payment_routes)
        .route("/webhooks/processor", post(routes::webhooks::processor_webhook))
        .nest("/uploads", upload_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let cors = if state.config.cors_allows_any() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers([
                header::LINK,
                header::HeaderName::from_static("x-total-count"),
            ])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.uploads.dir))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Bearer authentication layer
///
/// Requests without an `Authorization` header pass through anonymously.
/// A header that is present must carry a valid access token, otherwise the
/// request is rejected with 401 and `WWW-Authenticate: Bearer` before
/// reaching the handler.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(auth_context) = authenticate_bearer(req.headers(), state.jwt_secret())? {
        req.extensions_mut().insert(auth_context);
    }

    Ok(next.run(req).await)
}
