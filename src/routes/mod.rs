//! Routers: common health/version routes and per-resource routes.

mod common;
mod resource;
pub use common::{common_routes, common_routes_with_ready};
pub use resource::{resource_routes, resource_routes_with_body_limit, DEFAULT_BODY_LIMIT};
