//! Map custom errors to ResolveError in hand-written constructors without writing .map_err(|e| ResolveError::Construct(e.to_string())).

use crate::resolver::ResolveError;

/// Convert any error to ResolveError. Use in `Injectable::construct`: `.map_err(IntoResolveError::into_resolve_error)`.
pub trait IntoResolveError {
    fn into_resolve_error(self) -> ResolveError;
}

impl<E: std::error::Error + Send + Sync + 'static> IntoResolveError for E {
    fn into_resolve_error(self) -> ResolveError {
        ResolveError::Construct(self.to_string())
    }
}
