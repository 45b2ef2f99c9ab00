//! Ezra core: dependency container, autowiring resolver, action/filter hooks and small utilities.

pub mod container;
pub mod develop;
pub mod hasher;
pub mod hook;
pub mod into_resolve_error;
pub mod resolver;
pub mod util;

pub use container::{Container, ContainerError, Instance, Lifetime};
pub use hasher::{hash_callable, hash_method};
pub use hook::{
    ActionCallback, ActionFn, Callback, FilterCallback, FilterFn, Hook, HookCallback, HookItem, HookKind,
    DEFAULT_PRIORITY,
};
pub use into_resolve_error::IntoResolveError;
pub use resolver::{Arg, Args, Callable, FromResolver, Injectable, ResolveError, Resolver};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
