/// Router Module Index
///
/// Routing is split by access level so that each group's protection is
/// applied once, at the module boundary.

/// Routes open to anonymous visitors. Visibility is decided per request.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware.
pub mod authenticated;

/// Routes restricted to the 'admin' role, nested under `/admin`.
pub mod admin;
