//! DI container: register factories by type (and optional alias), resolve lazily.
//!
//! Every registration is reachable by its type, by its type name
//! (`std::any::type_name::<T>()`) and, when given, by `@alias`. Singleton
//! registrations run their factory once and hand out the cached instance
//! through all of those keys.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("no registration for {0}")]
    NotFound(String),
    #[error("{id} is registered as {registered}, not {expected}")]
    TypeMismatch {
        id: String,
        registered: &'static str,
        expected: &'static str,
    },
    #[error("dependency cycle while resolving {0}")]
    Cycle(&'static str),
}

/// Instance as stored in the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

type FactoryFn = Box<dyn Fn(&Container) -> Result<Instance, ContainerError> + Send + Sync>;

/// How often a registration's factory runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifetime {
    /// New instance on every resolve.
    #[default]
    Transient,
    /// Built on first resolve, then cached.
    Singleton,
}

struct Registration {
    type_name: &'static str,
    lifetime: Lifetime,
    factory: Option<FactoryFn>,
    instance: OnceLock<Instance>,
    /// Held while a singleton's factory runs so it runs at most once.
    init: Mutex<()>,
}

impl Registration {
    fn instance(&self, container: &Container) -> Result<Instance, ContainerError> {
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| ContainerError::NotFound(self.type_name.to_string()))?;

        let _guard = ResolvingGuard::enter(self as *const Registration as usize, self.type_name)?;
        match self.lifetime {
            Lifetime::Transient => factory(container),
            Lifetime::Singleton => {
                let _init = self.init.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(instance) = self.instance.get() {
                    return Ok(Arc::clone(instance));
                }
                let instance = factory(container)?;
                Ok(Arc::clone(self.instance.get_or_init(|| instance)))
            }
        }
    }
}

thread_local! {
    static RESOLVING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a registration as being built on this thread; re-entering it is a cycle.
struct ResolvingGuard(usize);

impl ResolvingGuard {
    fn enter(key: usize, type_name: &'static str) -> Result<Self, ContainerError> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&key) {
                return Err(ContainerError::Cycle(type_name));
            }
            stack.push(key);
            Ok(ResolvingGuard(key))
        })
    }
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|key| *key == self.0) {
                stack.remove(pos);
            }
        });
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn alias_key(alias: &str) -> String {
    if alias.starts_with('@') {
        alias.to_string()
    } else {
        format!("@{}", alias)
    }
}

/// Inversion of control container. Shareable through `Arc`; registration takes `&self`.
#[derive(Default)]
pub struct Container {
    by_type: RwLock<HashMap<TypeId, Arc<Registration>>>,
    by_id: RwLock<HashMap<String, Arc<Registration>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `T`. Returns false (and keeps the existing entry) if `T` is already registered.
    pub fn register<T, F>(&self, factory: F, lifetime: Lifetime, alias: Option<&str>) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> T + Send + Sync + 'static,
    {
        self.register_with(move |c| Ok(factory(c)), lifetime, alias)
    }

    /// Register a fallible factory for `T`. Factories may resolve their own dependencies with `?`.
    pub fn register_with<T, F>(&self, factory: F, lifetime: Lifetime, alias: Option<&str>) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let factory: FactoryFn =
            Box::new(move |c: &Container| factory(c).map(|value| Arc::new(value) as Instance));
        self.insert::<T>(
            Registration {
                type_name: type_name::<T>(),
                lifetime,
                factory: Some(factory),
                instance: OnceLock::new(),
                init: Mutex::new(()),
            },
            alias,
        )
    }

    /// Register a ready-made instance as a singleton.
    pub fn register_instance<T: Send + Sync + 'static>(&self, value: T, alias: Option<&str>) -> bool {
        self.insert::<T>(
            Registration {
                type_name: type_name::<T>(),
                lifetime: Lifetime::Singleton,
                factory: None,
                instance: OnceLock::from(Arc::new(value) as Instance),
                init: Mutex::new(()),
            },
            alias,
        )
    }

    fn insert<T: 'static>(&self, registration: Registration, alias: Option<&str>) -> bool {
        let lifetime = registration.lifetime;
        let registration = Arc::new(registration);
        {
            let mut by_type = write(&self.by_type);
            if by_type.contains_key(&TypeId::of::<T>()) {
                debug!(type_name = type_name::<T>(), "already registered, keeping existing entry");
                return false;
            }
            by_type.insert(TypeId::of::<T>(), Arc::clone(&registration));
        }

        let mut by_id = write(&self.by_id);
        by_id.insert(type_name::<T>().to_string(), Arc::clone(&registration));
        if let Some(alias) = alias {
            let key = alias_key(alias);
            if let Some(previous) = by_id.insert(key.clone(), registration) {
                warn!(alias = %key, previous = previous.type_name, now = type_name::<T>(), "alias re-pointed");
            }
        }
        debug!(type_name = type_name::<T>(), ?lifetime, alias, "registered");
        true
    }

    /// Point `alias` at the existing registration of `T`. Returns false if `T` is not registered.
    pub fn alias<T: 'static>(&self, alias: &str) -> bool {
        let Some(registration) = read(&self.by_type).get(&TypeId::of::<T>()).cloned() else {
            return false;
        };
        let key = alias_key(alias);
        if let Some(previous) = write(&self.by_id).insert(key.clone(), registration) {
            if previous.type_name != type_name::<T>() {
                warn!(alias = %key, previous = previous.type_name, now = type_name::<T>(), "alias re-pointed");
            }
        }
        true
    }

    /// Resolve an instance by type.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        let registration = read(&self.by_type)
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| ContainerError::NotFound(type_name::<T>().to_string()))?;
        let instance = registration.instance(self)?;
        downcast(type_name::<T>(), &registration, instance)
    }

    /// Resolve by string id: a registered type name or `@alias`.
    pub fn resolve_id(&self, id: &str) -> Result<Instance, ContainerError> {
        let registration = read(&self.by_id)
            .get(id)
            .cloned()
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        registration.instance(self)
    }

    /// Resolve by alias (with or without the leading `@`), checking the registered type.
    pub fn resolve_alias<T: Send + Sync + 'static>(&self, alias: &str) -> Result<Arc<T>, ContainerError> {
        let key = alias_key(alias);
        let registration = read(&self.by_id)
            .get(&key)
            .cloned()
            .ok_or_else(|| ContainerError::NotFound(key.clone()))?;
        let instance = registration.instance(self)?;
        downcast(&key, &registration, instance)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        read(&self.by_type).contains_key(&TypeId::of::<T>())
    }

    /// Whether `id` (type name or `@alias`) is registered.
    pub fn has(&self, id: &str) -> bool {
        read(&self.by_id).contains_key(id)
    }

    /// Number of registered types (aliases not counted).
    pub fn len(&self) -> usize {
        read(&self.by_type).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn downcast<T: Send + Sync + 'static>(
    id: &str,
    registration: &Registration,
    instance: Instance,
) -> Result<Arc<T>, ContainerError> {
    instance.downcast::<T>().map_err(|_| ContainerError::TypeMismatch {
        id: id.to_string(),
        registered: registration.type_name,
        expected: type_name::<T>(),
    })
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<String> = read(&self.by_id).keys().cloned().collect();
        ids.sort();
        f.debug_struct("Container").field("ids", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    struct Database {
        dsn: String,
    }

    struct Repository {
        db: Arc<Database>,
    }

    #[test]
    fn transient_builds_every_time() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let c = Container::new();
        assert!(c.register(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Database { dsn: "sqlite::memory:".into() }
            },
            Lifetime::Transient,
            None,
        ));
        let a = c.resolve::<Database>().unwrap();
        let b = c.resolve::<Database>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(a.dsn, "sqlite::memory:");
    }

    #[test]
    fn singleton_is_shared_with_alias() {
        let c = Container::new();
        c.register(|_| Database { dsn: "pg".into() }, Lifetime::Singleton, Some("db"));
        let by_type = c.resolve::<Database>().unwrap();
        let by_alias = c.resolve_alias::<Database>("@db").unwrap();
        let by_bare_alias = c.resolve_alias::<Database>("db").unwrap();
        assert!(Arc::ptr_eq(&by_type, &by_alias));
        assert!(Arc::ptr_eq(&by_type, &by_bare_alias));
        assert!(c.has("@db"));
        assert!(c.has(type_name::<Database>()));
    }

    #[test]
    fn second_registration_is_rejected() {
        let c = Container::new();
        assert!(c.register_instance(Database { dsn: "first".into() }, None));
        assert!(!c.register(|_| Database { dsn: "second".into() }, Lifetime::Singleton, None));
        assert_eq!(c.resolve::<Database>().unwrap().dsn, "first");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn missing_and_mismatched() {
        let c = Container::new();
        assert!(matches!(c.resolve::<Database>(), Err(ContainerError::NotFound(_))));
        c.register_instance(5u32, Some("answer"));
        match c.resolve_alias::<Database>("answer") {
            Err(ContainerError::TypeMismatch { registered, .. }) => assert_eq!(registered, "u32"),
            _ => panic!("expected TypeMismatch"),
        }
        let raw = c.resolve_id("u32").unwrap();
        assert_eq!(raw.downcast_ref::<u32>(), Some(&5));
    }

    #[test]
    fn factory_resolves_dependencies() {
        let c = Container::new();
        c.register(|_| Database { dsn: "pg".into() }, Lifetime::Singleton, None);
        c.register_with(
            |c| Ok(Repository { db: c.resolve::<Database>()? }),
            Lifetime::Transient,
            Some("repo"),
        );
        let repo = c.resolve_alias::<Repository>("repo").unwrap();
        assert!(Arc::ptr_eq(&repo.db, &c.resolve::<Database>().unwrap()));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let c = Container::new();
        c.register_with(
            |c| Ok(Repository { db: Arc::new(Database { dsn: c.resolve::<Repository>()?.db.dsn.clone() }) }),
            Lifetime::Singleton,
            None,
        );
        assert!(matches!(c.resolve::<Repository>(), Err(ContainerError::Cycle(_))));
        // The failed attempt leaves no stale state behind.
        assert!(matches!(c.resolve::<Repository>(), Err(ContainerError::Cycle(_))));
    }

    #[test]
    fn alias_is_repointed_to_latest_registration() {
        let c = Container::new();
        c.register_instance(Database { dsn: "pg".into() }, Some("store"));
        assert!(c.register_with(
            |c| Ok(Repository { db: c.resolve::<Database>()? }),
            Lifetime::Singleton,
            Some("@store"),
        ));
        let repo = c.resolve_alias::<Repository>("store").unwrap();
        assert_eq!(repo.db.dsn, "pg");
        assert!(matches!(
            c.resolve_alias::<Database>("store"),
            Err(ContainerError::TypeMismatch { .. })
        ));
        // The type keys are untouched.
        assert_eq!(c.resolve::<Database>().unwrap().dsn, "pg");
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn resolve_id_by_alias() {
        let c = Container::new();
        c.register(|_| Database { dsn: "mysql".into() }, Lifetime::Singleton, Some("db"));
        let raw = c.resolve_id("@db").unwrap();
        let db = raw.downcast::<Database>().ok().unwrap();
        assert_eq!(db.dsn, "mysql");
        assert!(Arc::ptr_eq(&db, &c.resolve::<Database>().unwrap()));
        assert!(matches!(c.resolve_id("db"), Err(ContainerError::NotFound(_))));
    }

    #[test]
    fn concurrent_first_resolve_runs_singleton_factory_once() {
        const THREADS: usize = 8;
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let c = Container::new();
        c.register(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                Database { dsn: "shared".into() }
            },
            Lifetime::Singleton,
            None,
        );

        let barrier = Barrier::new(THREADS);
        let resolved: Vec<Arc<Database>> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        c.resolve::<Database>().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(resolved.iter().all(|db| Arc::ptr_eq(db, &resolved[0])));
    }

    #[test]
    fn alias_added_to_existing_registration() {
        let c = Container::new();
        assert!(!c.alias::<Database>("db"));
        c.register(|_| Database { dsn: "pg".into() }, Lifetime::Singleton, None);
        assert!(c.alias::<Database>("db"));
        assert!(Arc::ptr_eq(
            &c.resolve_alias::<Database>("@db").unwrap(),
            &c.resolve::<Database>().unwrap()
        ));
    }
}
