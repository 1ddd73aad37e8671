//! Middleware for the HTTP API.

pub mod auth;
pub mod cors;

pub use auth::{jwt_auth, AdminUser, AuthUser, JwtClaims, JwtState, OptionalAuthUser, ADMIN_ROLE};
pub use cors::create_cors_layer;
