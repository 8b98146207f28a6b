#![forbid(unsafe_code)]

//! Tagged union describing the state of an asynchronous producer.

use std::fmt;
use std::rc::Rc;

/// A cheaply clonable error captured from an async producer.
///
/// Carries the rendered message only, so it is `Clone + PartialEq` and the
/// signal dedup contract applies to error states like any other value.
#[derive(Clone, PartialEq, Eq)]
pub struct AsyncError {
    message: Rc<str>,
}

impl AsyncError {
    /// Capture `error` by rendering its display form.
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            message: error.to_string().into(),
        }
    }

    /// The rendered error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AsyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for AsyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AsyncError").field(&self.message).finish()
    }
}

impl std::error::Error for AsyncError {}

/// Loading / Data / Error state of an asynchronous producer.
///
/// `Data(None)` is the initial "not yet fetched" payload. No transition
/// constraints are enforced here; the producer decides.
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncValue<T> {
    /// The producer is running.
    Loading,
    /// A produced value, or `None` before the first production.
    Data(Option<T>),
    /// The producer failed.
    Error(AsyncError),
}

impl<T> AsyncValue<T> {
    /// The pre-fetch state: `Data(None)`.
    #[must_use]
    pub const fn initial() -> Self {
        Self::Data(None)
    }

    /// Whether the producer is currently running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Whether the last production failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The produced value, if any.
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Data(value) => value.as_ref(),
            _ => None,
        }
    }

    /// The captured error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&AsyncError> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Map the data payload, preserving Loading/Error states.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AsyncValue<U> {
        match self {
            Self::Loading => AsyncValue::Loading,
            Self::Data(value) => AsyncValue::Data(value.map(f)),
            Self::Error(error) => AsyncValue::Error(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_is_empty_data() {
        let value: AsyncValue<i32> = AsyncValue::initial();
        assert_eq!(value, AsyncValue::Data(None));
        assert!(!value.is_loading());
        assert!(value.data().is_none());
    }

    #[test]
    fn accessors_match_variant() {
        assert!(AsyncValue::<i32>::Loading.is_loading());
        assert_eq!(AsyncValue::Data(Some(3)).data(), Some(&3));

        let failed: AsyncValue<i32> = AsyncValue::Error(AsyncError::new("boom"));
        assert!(failed.is_error());
        assert_eq!(failed.error().map(AsyncError::message), Some("boom"));
    }

    #[test]
    fn map_preserves_non_data_states() {
        let loading: AsyncValue<i32> = AsyncValue::Loading;
        assert_eq!(loading.map(|v| v * 2), AsyncValue::Loading);

        let data = AsyncValue::Data(Some(4)).map(|v| v * 2);
        assert_eq!(data, AsyncValue::Data(Some(8)));

        let error: AsyncValue<i32> = AsyncValue::Error(AsyncError::new("x"));
        assert_eq!(error.map(|v| v * 2), AsyncValue::Error(AsyncError::new("x")));
    }

    #[test]
    fn errors_compare_by_message() {
        assert_eq!(AsyncError::new("same"), AsyncError::new("same"));
        assert_ne!(AsyncError::new("a"), AsyncError::new("b"));
    }
}
