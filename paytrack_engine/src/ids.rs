//! Record identity.

use uuid::Uuid;

/// Returns a fresh identifier.  Random v4 UUIDs never collide within
/// one call, so a single allocation can create many payments on the
/// same timestamp.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
