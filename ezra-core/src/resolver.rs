//! Autowiring resolver: constructs `Injectable` types and calls functions, filling
//! dependencies from the container (or by constructing them) and values from call arguments.

use std::any::{type_name, Any};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::container::{Container, ContainerError};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("resolver failed because there is no default value for the parameter: {parameter}")]
    NoDefault { parameter: String },
    #[error("argument for parameter {parameter} is not a {expected}")]
    ArgumentType {
        parameter: String,
        expected: &'static str,
    },
    #[error("construction failed: {0}")]
    Construct(String),
    #[error(transparent)]
    Container(#[from] ContainerError),
}

type ArgValue = Box<dyn Any + Send>;

/// Call arguments: looked up by parameter name first, then taken positionally in order.
#[derive(Default)]
pub struct Args {
    named: HashMap<String, ArgValue>,
    positional: VecDeque<ArgValue>,
    consumed: usize,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named argument.
    pub fn with<V: Any + Send>(mut self, name: impl Into<String>, value: V) -> Self {
        self.named.insert(name.into(), Box::new(value));
        self
    }

    /// Append a positional argument.
    pub fn push<V: Any + Send>(mut self, value: V) -> Self {
        self.positional.push_back(Box::new(value));
        self
    }

    pub fn len(&self) -> usize {
        self.named.len() + self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Named argument `name` if present, otherwise the next positional one.
    pub fn take(&mut self, name: &str) -> Option<ArgValue> {
        self.named.remove(name).or_else(|| self.take_positional())
    }

    pub fn take_positional(&mut self) -> Option<ArgValue> {
        let value = self.positional.pop_front()?;
        self.consumed += 1;
        Some(value)
    }

    /// Label for the next positional parameter, used in errors.
    fn next_label(&self) -> String {
        format!("#{}", self.consumed)
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.named.keys().collect();
        names.sort();
        f.debug_struct("Args")
            .field("named", &names)
            .field("positional", &self.positional.len())
            .finish()
    }
}

/// A type the resolver can construct. Usually derived with `#[derive(Injectable)]`.
pub trait Injectable: Sized + Send + Sync + 'static {
    fn construct(resolver: &Resolver, args: &mut Args) -> Result<Self, ResolveError>;
}

/// Positional value parameter for functions called through [`Resolver::call`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arg<V>(pub V);

/// One parameter of a function called through [`Resolver::call`].
pub trait FromResolver: Sized {
    fn from_resolver(resolver: &Resolver, args: &mut Args) -> Result<Self, ResolveError>;
}

impl<T: Injectable> FromResolver for Arc<T> {
    fn from_resolver(resolver: &Resolver, args: &mut Args) -> Result<Self, ResolveError> {
        let label = args.next_label();
        let supplied = args.take_positional();
        resolver.supplied_or_resolved(&label, supplied)
    }
}

impl<V: Any> FromResolver for Arg<V> {
    fn from_resolver(_resolver: &Resolver, args: &mut Args) -> Result<Self, ResolveError> {
        let label = args.next_label();
        match args.take_positional() {
            Some(value) => downcast_value(value, &label).map(Arg),
            None => Err(ResolveError::NoDefault { parameter: label }),
        }
    }
}

impl<V: Any> FromResolver for Option<Arg<V>> {
    fn from_resolver(_resolver: &Resolver, args: &mut Args) -> Result<Self, ResolveError> {
        let label = args.next_label();
        args.take_positional()
            .map(|value| downcast_value(value, &label).map(Arg))
            .transpose()
    }
}

/// A function whose parameters can all be produced by the resolver.
pub trait Callable<P> {
    type Output;

    fn invoke(self, resolver: &Resolver, args: &mut Args) -> Result<Self::Output, ResolveError>;
}

macro_rules! impl_callable {
    ($($param:ident),*) => {
        impl<Func, Out, $($param,)*> Callable<($($param,)*)> for Func
        where
            Func: FnOnce($($param),*) -> Out,
            $($param: FromResolver,)*
        {
            type Output = Out;

            #[allow(non_snake_case, unused_variables)]
            fn invoke(self, resolver: &Resolver, args: &mut Args) -> Result<Out, ResolveError> {
                $(let $param = $param::from_resolver(resolver, args)?;)*
                Ok(self($($param),*))
            }
        }
    };
}

impl_callable!();
impl_callable!(P1);
impl_callable!(P1, P2);
impl_callable!(P1, P2, P3);
impl_callable!(P1, P2, P3, P4);
impl_callable!(P1, P2, P3, P4, P5);
impl_callable!(P1, P2, P3, P4, P5, P6);

fn downcast_value<V: Any>(value: ArgValue, parameter: &str) -> Result<V, ResolveError> {
    value
        .downcast::<V>()
        .map(|v| *v)
        .map_err(|_| ResolveError::ArgumentType {
            parameter: parameter.to_string(),
            expected: type_name::<V>(),
        })
}

/// Reflection-free resolver. Bind a container to let registered types take precedence over construction.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    container: Option<Arc<Container>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(container: Arc<Container>) -> Self {
        Self {
            container: Some(container),
        }
    }

    pub fn set_container(&mut self, container: Arc<Container>) {
        self.container = Some(container);
    }

    pub fn container(&self) -> Option<&Arc<Container>> {
        self.container.as_ref()
    }

    /// Container instance of `T` if registered, otherwise a freshly constructed `T`.
    pub fn make<T: Injectable>(&self, args: Option<Args>) -> Result<Arc<T>, ResolveError> {
        if let Some(container) = &self.container {
            if container.contains::<T>() {
                debug!(type_name = type_name::<T>(), "resolved from container");
                return Ok(container.resolve::<T>()?);
            }
        }
        let mut args = args.unwrap_or_default();
        debug!(type_name = type_name::<T>(), args = args.len(), "constructing");
        T::construct(self, &mut args).map(Arc::new)
    }

    /// Call `f`, producing each parameter with [`FromResolver`].
    pub fn call<P, F: Callable<P>>(&self, f: F, args: Option<Args>) -> Result<F::Output, ResolveError> {
        let mut args = args.unwrap_or_default();
        f.invoke(self, &mut args)
    }

    /// Dependency parameter: a supplied `Arc<T>` or `T` is used as-is; anything else is
    /// discarded and `T` is resolved with [`Resolver::make`].
    pub fn dependency<T: Injectable>(&self, args: &mut Args, name: &str) -> Result<Arc<T>, ResolveError> {
        let supplied = args.take(name);
        self.supplied_or_resolved(name, supplied)
    }

    /// Value parameter without a default.
    pub fn value<V: Any>(&self, args: &mut Args, name: &str) -> Result<V, ResolveError> {
        match args.take(name) {
            Some(value) => downcast_value(value, name),
            None => Err(ResolveError::NoDefault {
                parameter: name.to_string(),
            }),
        }
    }

    /// Value parameter falling back to `default` when no argument is supplied.
    pub fn value_or_else<V: Any, F: FnOnce() -> V>(
        &self,
        args: &mut Args,
        name: &str,
        default: F,
    ) -> Result<V, ResolveError> {
        match args.take(name) {
            Some(value) => downcast_value(value, name),
            None => Ok(default()),
        }
    }

    fn supplied_or_resolved<T: Injectable>(
        &self,
        parameter: &str,
        supplied: Option<ArgValue>,
    ) -> Result<Arc<T>, ResolveError> {
        if let Some(value) = supplied {
            match value.downcast::<Arc<T>>() {
                Ok(dep) => return Ok(*dep),
                Err(value) => {
                    if let Ok(dep) = value.downcast::<T>() {
                        return Ok(Arc::new(*dep));
                    }
                }
            }
            debug!(parameter, expected = type_name::<T>(), "supplied argument discarded");
        }
        self.make::<T>(None)
    }
}
