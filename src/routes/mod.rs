use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{AdminUser, AuthenticatedUser},
    state::AppState,
};

pub mod areas;
pub mod auth;
pub mod dashboard;
pub mod employees;
pub mod health;
pub mod managers;
pub mod privileged;
pub mod requests;
pub mod users;

const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed_origin {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = %value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let employees_routes = Router::new()
        .route(
            "/",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route("/options", get(employees::employee_options))
        .route("/export", get(employees::export_employees))
        .route("/import", post(employees::import_employees))
        .route(
            "/:id",
            get(employees::get_employee)
                .patch(employees::update_employee)
                .delete(employees::delete_employee),
        );

    let requests_routes = Router::new()
        .route(
            "/",
            get(requests::list_requests).post(requests::create_request),
        )
        .route("/:id", get(requests::get_request))
        .route("/:id/status", patch(requests::update_status))
        .route("/:id/document", post(requests::upload_document));

    let protected_routes = Router::new()
        .nest("/api/employees", employees_routes)
        .nest("/api/requests", requests_routes)
        .route("/api/dashboard", get(dashboard::dashboard))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(state.clone()));

    let admin_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/:id/roles", put(users::set_roles))
        .route("/areas", get(areas::list_areas).post(areas::create_area))
        .route(
            "/areas/:id",
            patch(areas::update_area).delete(areas::delete_area),
        )
        .route("/managers", get(managers::list_managers))
        .route("/managers/:area_id", put(managers::assign_manager))
        .layer(middleware::from_extractor_with_state::<AdminUser, _>(state.clone()));

    // Method is checked before the bearer token on these routes.
    let privileged_routes = Router::new()
        .route(
            "/create-user",
            post(privileged::create_user).fallback(privileged::method_not_allowed),
        )
        .route(
            "/delete-user",
            post(privileged::delete_user).fallback(privileged::method_not_allowed),
        );

    Router::new()
        .merge(protected_routes)
        .nest("/api/admin", admin_routes.merge(privileged_routes))
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}
