/// Router Module Index
///
/// Splits the routing table by access level. Protection is applied per module through
/// Axum layers, so a protected endpoint cannot be mounted without its verification stage.

/// Routes accessible without a token: service info and health.
pub mod public;

/// The `/api/admin` namespace. Everything except `/login` sits behind `require_auth`;
/// write operations additionally pass through their validation stage.
pub mod admin;
