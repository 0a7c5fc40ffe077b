//! Authentication state trait and macro.

use crate::session::SessionManager;

/// Trait for state types that give the request gate access to sessions.
pub trait HasAuthBackend {
    fn sessions(&self) -> &SessionManager;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard field.
///
/// The struct must have a `sessions: SessionManager` field.
///
/// # Example
/// ```ignore
/// use lunch_menu::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub sessions: SessionManager,
///     // ... other fields
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn sessions(&self) -> &$crate::session::SessionManager {
                &self.sessions
            }
        }
    };
}
