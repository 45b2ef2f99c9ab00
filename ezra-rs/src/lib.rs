//! Ezra Rust facade: Platform, WebPlatform and Config on ezra-core, plus `#[derive(Injectable)]`.

pub mod config;
pub mod logging;
pub mod platform;

pub use crate::config::{Config, ConfigError, LoggingConfig};
pub use ezra_core::{
    dd, util, ActionCallback, Arg, Args, Container, ContainerError, CoreError, FilterCallback, Hook,
    HookCallback, HookKind, Injectable, IntoResolveError, Lifetime, ResolveError, Resolver, DEFAULT_PRIORITY,
};
pub use ezra_rs_macros::Injectable;
pub use logging::init_logging;
pub use platform::{Platform, PlatformError, WebPlatform, BOOT_ACTION, RUN_ACTION};
