//! Platform: project root, environment and configuration; WebPlatform: the wired container, resolver and hooks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ezra_core::util::{Constants, Stopwatch};
use ezra_core::{Args, Container, CoreError, Hook, Injectable, Resolver};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};

/// Config file read from the root by [`Platform::load_config`], when present.
pub const CONFIG_FILE: &str = "config.json";

/// Action fired first by [`WebPlatform::run`], with the root path as the only argument.
pub const BOOT_ACTION: &str = "platform.boot";
/// Action fired after boot by [`WebPlatform::run`].
pub const RUN_ACTION: &str = "platform.run";

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("platform root {path} is not accessible: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load {path}: {source}")]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Project root with its `.env` loaded into the process environment.
#[derive(Debug)]
pub struct Platform {
    root: PathBuf,
    stopwatch: Stopwatch,
}

impl Platform {
    /// Canonicalize `root` (it must exist) and load `<root>/.env` if there is one.
    /// Variables already set in the environment are kept.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PlatformError> {
        let stopwatch = Stopwatch::start();
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|source| PlatformError::Root {
            path: root.to_path_buf(),
            source,
        })?;

        let dotenv = root.join(".env");
        if dotenv.is_file() {
            dotenvy::from_path(&dotenv).map_err(|source| PlatformError::Dotenv {
                path: dotenv.clone(),
                source,
            })?;
            debug!(path = %dotenv.display(), "environment file loaded");
        }

        Ok(Self { root, stopwatch })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/config.json` (or an empty config) with `EZRA__*` environment overrides applied.
    pub fn load_config(&self) -> Result<Config, PlatformError> {
        Ok(Config::load_with_env(self.root.join(CONFIG_FILE))?)
    }

    pub fn time_spent(&self, milliseconds: bool) -> u128 {
        self.stopwatch.time_spent(milliseconds)
    }

    /// Load the configuration and wire a [`WebPlatform`] with an empty container and no hooks.
    pub fn into_web(self) -> Result<WebPlatform, PlatformError> {
        let config = self.load_config()?;
        let mut web = WebPlatform::new(
            self.root,
            config,
            Arc::new(Container::new()),
            Resolver::new(),
            Hook::new(),
        )?;
        web.stopwatch = self.stopwatch;
        Ok(web)
    }
}

/// Web platform: configuration, container, resolver and hooks for one application.
#[derive(Debug)]
pub struct WebPlatform {
    root: PathBuf,
    config: Config,
    container: Arc<Container>,
    resolver: Resolver,
    hook: Hook,
    constants: Constants,
    stopwatch: Stopwatch,
}

impl WebPlatform {
    /// Bind `resolver` to `container` and make the configuration resolvable as `Config` / `@config`.
    /// A `Config` already held by `container` wins over `config`, so both views agree.
    pub fn new(
        root: PathBuf,
        config: Config,
        container: Arc<Container>,
        mut resolver: Resolver,
        hook: Hook,
    ) -> Result<Self, PlatformError> {
        resolver.set_container(Arc::clone(&container));
        let config = if container.register_instance(config.clone(), Some("config")) {
            config
        } else {
            warn!("container already holds a Config, using it instead");
            container.alias::<Config>("config");
            container.resolve::<Config>().map_err(CoreError::from)?.as_ref().clone()
        };

        let mut constants = Constants::new();
        constants.define("EZRA_ROOT", json!(root.display().to_string()));
        constants.define("EZRA_VERSION", json!(env!("CARGO_PKG_VERSION")));

        Ok(Self {
            root,
            config,
            container,
            resolver,
            hook,
            constants,
            stopwatch: Stopwatch::start(),
        })
    }

    /// Fire [`BOOT_ACTION`] then [`RUN_ACTION`]. Request handling is left to the hooked application.
    pub fn run(&self) -> Result<(), PlatformError> {
        let args = [Value::String(self.root.display().to_string())];
        info!(root = %self.root.display(), "platform starting");
        self.hook.call_action(BOOT_ACTION, &args);
        self.hook.call_action(RUN_ACTION, &args);
        info!(elapsed_ms = self.time_spent(true) as u64, "platform ran");
        Ok(())
    }

    /// Construct (or fetch from the container) an injectable service.
    pub fn make<T: Injectable>(&self, args: Option<Args>) -> Result<Arc<T>, PlatformError> {
        Ok(self.resolver.make(args).map_err(CoreError::from)?)
    }

    /// Fetch a registered service from the container.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, PlatformError> {
        Ok(self.container.resolve().map_err(CoreError::from)?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn hook(&self) -> &Hook {
        &self.hook
    }

    pub fn hook_mut(&mut self) -> &mut Hook {
        &mut self.hook
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn constants_mut(&mut self) -> &mut Constants {
        &mut self.constants
    }

    pub fn time_spent(&self, milliseconds: bool) -> u128 {
        self.stopwatch.time_spent(milliseconds)
    }
}
