use askama::Template;

use crate::access::AccessMap;

/// Navigation links whose presence is gated by the access map
///
/// Fail-safe: with no map loaded (unauthenticated sessions, or before the
/// map settles) the gated links are hidden.
#[derive(Debug, Clone, Default)]
pub struct NavContext {
    pub users_visible: bool,
    pub applications_visible: bool,
}

impl NavContext {
    pub fn from_access(map: Option<&AccessMap>) -> Self {
        match map {
            Some(map) => Self {
                users_visible: map.visible("GET", "/api/users"),
                applications_visible: map.visible("GET", "/api/applications"),
            },
            None => Self::default(),
        }
    }
}

#[derive(Template)]
#[template(path = "loading.html")]
pub struct LoadingTemplate;

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav: NavContext,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub nav: NavContext,
}

#[derive(Template)]
#[template(path = "api.html")]
pub struct ApiInfoTemplate {
    pub nav: NavContext,
    pub api_origin: String,
}

#[derive(Template)]
#[template(path = "users.html")]
pub struct UsersTemplate {
    pub nav: NavContext,
}

#[derive(Template)]
#[template(path = "user.html")]
pub struct UserDetailTemplate {
    pub nav: NavContext,
    pub id: String,
}

#[derive(Template)]
#[template(path = "applications.html")]
pub struct ApplicationsTemplate {
    pub nav: NavContext,
}

#[derive(Template)]
#[template(path = "application.html")]
pub struct ApplicationDetailTemplate {
    pub nav: NavContext,
    pub id: String,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub nav: NavContext,
}
