//! Web layer
//!
//! - `views`: pure path-to-route resolution (the view selector)
//! - `templates`: askama templates for the rendered output states
//! - `handlers`: HTTP handlers gating every view on the bootstrap verdict
//! - `routes`: router construction

pub mod handlers;
pub mod routes;
pub mod templates;
pub mod views;

pub use routes::create_router;
