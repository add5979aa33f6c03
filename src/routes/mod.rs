/// Router Module Index
///
/// Routes are split by access level. The split is enforced with a router layer in
/// `create_router`, so a handler cannot end up public by accident.

/// Read-only pages and the login/logout endpoints. No session needed.
pub mod public;

/// Post creation, editing and deletion. Wrapped in the `require_login` middleware.
pub mod authenticated;
