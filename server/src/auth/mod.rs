//! Authentication for the HTTP surface.

mod middleware;

pub use middleware::AuthUser;
