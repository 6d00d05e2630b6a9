/*!
 * Serde Helper Functions
 * Skip-serializing predicates and serde_with re-exports used across the crate
 */

// Re-exported serde_with adapters (single import point for event/policy types)
pub use serde_with::{serde_as, skip_serializing_none, DurationMilliSecondsWithFrac, TimestampSeconds};

/// Skip serializing if value is default
#[inline]
pub fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    value == &T::default()
}

/// Skip serializing if bool is false
#[inline]
pub const fn is_false(value: &bool) -> bool {
    !*value
}

/// Skip serializing if slice is empty
#[inline]
pub fn is_empty_slice<T>(value: &[T]) -> bool {
    value.is_empty()
}
