use askama::Template;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};

use super::templates::{
    ApiInfoTemplate, ApplicationDetailTemplate, ApplicationsTemplate, ErrorTemplate,
    HomeTemplate, LoadingTemplate, NavContext, NotFoundTemplate, ProfileTemplate,
    UserDetailTemplate, UsersTemplate,
};
use super::views::Route;
use crate::bootstrap::Verdict;
use crate::AppState;

/// Liveness probe - always returns OK if the process is running
pub async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe - ready once the bootstrap verdict leaves the loading state
pub async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.verdict() {
        Verdict::ShowLoading => {
            tracing::warn!("Readiness check failed: bootstrap still loading");
            (StatusCode::SERVICE_UNAVAILABLE, "not ready: bootstrap in progress")
        }
        // An error verdict is a conclusively started app; it can serve the
        // error view, so it counts as ready
        _ => (StatusCode::OK, "ready"),
    }
}

fn render_html<T: Template>(template: T, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response(),
    }
}

/// Single entry point for every view path
///
/// The bootstrap verdict short-circuits all route rendering: no partial UI
/// is shown alongside the loading or error states.
pub async fn view_handler(State(state): State<AppState>, uri: Uri) -> Response {
    match state.verdict() {
        Verdict::ShowLoading => render_html(LoadingTemplate, StatusCode::OK),
        Verdict::ShowError(message) => render_html(ErrorTemplate { message }, StatusCode::OK),
        Verdict::ShowApp => render_view(&state, Route::resolve(uri.path())),
    }
}

fn render_view(state: &AppState, route: Route) -> Response {
    let nav = NavContext::from_access(state.access_map().as_ref());

    match route {
        Route::Home => render_html(HomeTemplate { nav }, StatusCode::OK),
        Route::Profile => render_html(ProfileTemplate { nav }, StatusCode::OK),
        Route::ApiInfo => render_html(
            ApiInfoTemplate {
                nav,
                api_origin: state.config.api_origin.clone(),
            },
            StatusCode::OK,
        ),
        Route::Users => render_html(UsersTemplate { nav }, StatusCode::OK),
        Route::UserDetail { id } => render_html(UserDetailTemplate { nav, id }, StatusCode::OK),
        Route::Applications => render_html(ApplicationsTemplate { nav }, StatusCode::OK),
        Route::ApplicationDetail { id } => {
            render_html(ApplicationDetailTemplate { nav, id }, StatusCode::OK)
        }
        Route::NotFound => render_html(NotFoundTemplate { nav }, StatusCode::NOT_FOUND),
    }
}
