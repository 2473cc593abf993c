/// Middleware module
///
/// Bearer-token authorization for protected scopes.

mod auth_middleware;

pub use auth_middleware::AuthMiddleware;
