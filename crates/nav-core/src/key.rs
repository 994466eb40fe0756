//! Navigation key contract
//!
//! A navigation key describes a destination. Host applications implement
//! [`NavigationKey`] on a sealed enum of routes; the engine treats keys as
//! opaque payloads compared by equality and dispatches on variants by
//! pattern matching, never by reflection.

use std::fmt;

/// The destination descriptor understood by the navigation engine.
///
/// Implement this on the application's route enum. A key that expects a
/// completion result must return `true` from [`expects_result`]; completing
/// such a key without a payload (or a plain key with one) is a contract
/// violation caught at operation construction.
///
/// [`expects_result`]: NavigationKey::expects_result
pub trait NavigationKey: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Whether completing this key requires a result payload.
    fn expects_result(&self) -> bool {
        false
    }

    /// Short label for this key, used in logs and panic messages.
    fn describe(&self) -> String {
        format!("{self:?}")
    }
}
