//! Callable identity used to find hook callbacks again on removal.

use std::any::type_name;
use std::sync::Arc;

/// Identity of a callable: its name when it has one, otherwise the address of its shared allocation.
pub fn hash_callable<F: ?Sized>(callable: &Arc<F>, name: Option<&str>) -> String {
    match name {
        Some(name) => name.to_string(),
        None => format!("{:p}", Arc::as_ptr(callable)),
    }
}

/// Identity of an associated function: `Type::method`.
pub fn hash_method<T: ?Sized>(method: &str) -> String {
    format!("{}::{}", type_name::<T>(), method)
}
