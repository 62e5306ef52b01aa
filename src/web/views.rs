//! View selection: pure mapping from a URL path to a view
//!
//! Exact matches for the list/info paths, prefix matches for the two detail
//! paths (anything after the id segment is the detail view's business), and
//! an explicit `NotFound` instead of undefined fallthrough. First match wins.

/// The routed views the shell can render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Profile,
    ApiInfo,
    Users,
    UserDetail { id: String },
    Applications,
    ApplicationDetail { id: String },
    NotFound,
}

impl Route {
    /// Resolve a request path to a route
    ///
    /// Trailing slashes and repeated separators are ignored; matching is on
    /// non-empty path segments only.
    pub fn resolve(path: &str) -> Route {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Home,
            ["profile"] => Route::Profile,
            ["api"] => Route::ApiInfo,
            ["users"] => Route::Users,
            ["users", id, ..] => Route::UserDetail {
                id: (*id).to_string(),
            },
            ["applications"] => Route::Applications,
            ["applications", id, ..] => Route::ApplicationDetail {
                id: (*id).to_string(),
            },
            _ => Route::NotFound,
        }
    }
}
