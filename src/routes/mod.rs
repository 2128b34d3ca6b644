/// Router Module Index
///
/// Routes are split by the identity they require. Visibility rules are applied by the
/// handlers through the policy module, never by the router.

/// Routes open to anonymous viewers. An authenticated viewer is still resolved, so owners
/// see their own hidden posts.
pub mod public;

/// Routes behind the `AuthUser` middleware. Anonymous requests are redirected to login.
pub mod authenticated;

/// Category and location management for users with the 'admin' role.
pub mod admin;
