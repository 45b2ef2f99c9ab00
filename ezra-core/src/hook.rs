//! Action/filter hooks: callbacks keyed by hook name and numeric priority.
//!
//! Callbacks run in ascending priority; callbacks sharing a priority run in the
//! order they were added. Each callback receives the call arguments truncated
//! to the number it declared.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::hasher::{hash_callable, hash_method};

/// Priority used when callers have no preference.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Action callback: receives the (truncated) arguments.
pub type ActionFn = dyn Fn(&[Value]) + Send + Sync;

/// Filter callback: receives the value being filtered plus the (truncated) arguments, returns the new value.
pub type FilterFn = dyn Fn(Value, &[Value]) -> Value + Send + Sync;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    Action,
    Filter,
}

/// A shared callback and the identity used to remove it.
pub struct Callback<F: ?Sized> {
    hash: String,
    func: Arc<F>,
}

impl<F: ?Sized> Callback<F> {
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl<F: ?Sized> Clone for Callback<F> {
    fn clone(&self) -> Self {
        Self {
            hash: self.hash.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Callback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback").field(&self.hash).finish()
    }
}

pub type ActionCallback = Callback<ActionFn>;
pub type FilterCallback = Callback<FilterFn>;

impl Callback<ActionFn> {
    /// Anonymous action; only this value (or a clone) can remove it.
    pub fn new(f: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        let func: Arc<ActionFn> = Arc::new(f);
        Self {
            hash: hash_callable(&func, None),
            func,
        }
    }

    /// Named action; any callback with the same name removes it.
    pub fn named(name: &str, f: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        let func: Arc<ActionFn> = Arc::new(f);
        Self {
            hash: hash_callable(&func, Some(name)),
            func,
        }
    }

    /// Action identified as `T::method`.
    pub fn method<T: ?Sized>(method: &str, f: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        Self {
            hash: hash_method::<T>(method),
            func: Arc::new(f),
        }
    }
}

impl Callback<FilterFn> {
    pub fn new(f: impl Fn(Value, &[Value]) -> Value + Send + Sync + 'static) -> Self {
        let func: Arc<FilterFn> = Arc::new(f);
        Self {
            hash: hash_callable(&func, None),
            func,
        }
    }

    pub fn named(name: &str, f: impl Fn(Value, &[Value]) -> Value + Send + Sync + 'static) -> Self {
        let func: Arc<FilterFn> = Arc::new(f);
        Self {
            hash: hash_callable(&func, Some(name)),
            func,
        }
    }

    pub fn method<T: ?Sized>(
        method: &str,
        f: impl Fn(Value, &[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            hash: hash_method::<T>(method),
            func: Arc::new(f),
        }
    }
}

/// Either kind of callback; its kind selects the table it is added to.
#[derive(Clone, Debug)]
pub enum HookCallback {
    Action(ActionCallback),
    Filter(FilterCallback),
}

impl HookCallback {
    pub fn kind(&self) -> HookKind {
        match self {
            HookCallback::Action(_) => HookKind::Action,
            HookCallback::Filter(_) => HookKind::Filter,
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            HookCallback::Action(c) => c.hash(),
            HookCallback::Filter(c) => c.hash(),
        }
    }
}

impl From<ActionCallback> for HookCallback {
    fn from(c: ActionCallback) -> Self {
        HookCallback::Action(c)
    }
}

impl From<FilterCallback> for HookCallback {
    fn from(c: FilterCallback) -> Self {
        HookCallback::Filter(c)
    }
}

/// Registered callback entry.
pub struct HookItem<F: ?Sized> {
    pub hash: String,
    /// How many call arguments the callback takes; `None` passes all of them.
    pub num_args: Option<usize>,
    pub callable: Arc<F>,
}

impl<F: ?Sized> HookItem<F> {
    fn args<'a>(&self, args: &'a [Value]) -> &'a [Value] {
        match self.num_args {
            Some(n) => &args[..n.min(args.len())],
            None => args,
        }
    }
}

/// hook name -> priority -> items in insertion order.
struct HookTable<F: ?Sized> {
    hooks: HashMap<String, BTreeMap<i32, Vec<HookItem<F>>>>,
}

impl<F: ?Sized> Default for HookTable<F> {
    fn default() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }
}

impl<F: ?Sized> HookTable<F> {
    fn contains(&self, hook: &str) -> bool {
        self.hooks.contains_key(hook)
    }

    fn add(&mut self, hook: &str, callback: Callback<F>, priority: i32, num_args: Option<usize>) {
        self.hooks
            .entry(hook.to_string())
            .or_default()
            .entry(priority)
            .or_default()
            .push(HookItem {
                hash: callback.hash,
                num_args,
                callable: callback.func,
            });
    }

    /// Drops every item at `priority` with `hash`. True when the priority bucket exists,
    /// matched or not; the hook and its buckets stay registered even once empty.
    fn remove(&mut self, hook: &str, hash: &str, priority: i32) -> bool {
        let Some(items) = self
            .hooks
            .get_mut(hook)
            .and_then(|priorities| priorities.get_mut(&priority))
        else {
            return false;
        };
        items.retain(|item| item.hash != hash);
        true
    }

    fn items<'a>(&'a self, hook: &str) -> impl Iterator<Item = &'a HookItem<F>> + 'a {
        self.hooks
            .get(hook)
            .into_iter()
            .flat_map(|priorities| priorities.values().flatten())
    }

    fn count(&self, hook: &str) -> usize {
        self.items(hook).count()
    }
}

/// Hook dispatcher holding one action table and one filter table.
#[derive(Default)]
pub struct Hook {
    actions: HookTable<ActionFn>,
    filters: HookTable<FilterFn>,
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, kind: HookKind, hook: &str) -> bool {
        match kind {
            HookKind::Action => self.actions.contains(hook),
            HookKind::Filter => self.filters.contains(hook),
        }
    }

    pub fn has_action(&self, hook: &str) -> bool {
        self.has(HookKind::Action, hook)
    }

    pub fn has_filter(&self, hook: &str) -> bool {
        self.has(HookKind::Filter, hook)
    }

    /// Number of callbacks registered on `hook`.
    pub fn count(&self, kind: HookKind, hook: &str) -> usize {
        match kind {
            HookKind::Action => self.actions.count(hook),
            HookKind::Filter => self.filters.count(hook),
        }
    }

    /// Add a callback; lower priorities run earlier.
    pub fn add(
        &mut self,
        hook: &str,
        callback: impl Into<HookCallback>,
        priority: i32,
        num_args: Option<usize>,
    ) -> &mut Self {
        let callback = callback.into();
        debug!(hook, kind = ?callback.kind(), hash = callback.hash(), priority, ?num_args, "hook added");
        match callback {
            HookCallback::Action(c) => self.actions.add(hook, c, priority, num_args),
            HookCallback::Filter(c) => self.filters.add(hook, c, priority, num_args),
        }
        self
    }

    pub fn add_action(
        &mut self,
        hook: &str,
        callback: ActionCallback,
        priority: i32,
        num_args: Option<usize>,
    ) -> &mut Self {
        self.add(hook, callback, priority, num_args)
    }

    pub fn add_filter(
        &mut self,
        hook: &str,
        callback: FilterCallback,
        priority: i32,
        num_args: Option<usize>,
    ) -> &mut Self {
        self.add(hook, callback, priority, num_args)
    }

    /// Run every action on `hook`. Returns false when nothing is registered under that name.
    pub fn call_action(&self, hook: &str, args: &[Value]) -> bool {
        if !self.actions.contains(hook) {
            return false;
        }
        for item in self.actions.items(hook) {
            trace!(hook, hash = %item.hash, "action");
            (item.callable)(item.args(args));
        }
        true
    }

    /// Thread `value` through every filter on `hook`. Unknown hooks return `value` unchanged.
    pub fn call_filter(&self, hook: &str, value: Value, args: &[Value]) -> Value {
        let mut value = value;
        for item in self.filters.items(hook) {
            trace!(hook, hash = %item.hash, "filter");
            value = (item.callable)(value, item.args(args));
        }
        value
    }

    /// Remove callbacks matching `callback`'s identity at `priority`.
    /// Returns false only when nothing was ever added to `hook` at `priority`.
    pub fn remove(&mut self, hook: &str, callback: &HookCallback, priority: i32) -> bool {
        let found = match callback.kind() {
            HookKind::Action => self.actions.remove(hook, callback.hash(), priority),
            HookKind::Filter => self.filters.remove(hook, callback.hash(), priority),
        };
        debug!(hook, hash = callback.hash(), priority, found, "hook removed");
        found
    }

    pub fn remove_action(&mut self, hook: &str, callback: &ActionCallback, priority: i32) -> bool {
        self.remove(hook, &HookCallback::Action(callback.clone()), priority)
    }

    pub fn remove_filter(&mut self, hook: &str, callback: &FilterCallback, priority: i32) -> bool {
        self.remove(hook, &HookCallback::Filter(callback.clone()), priority)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&String> = self.actions.hooks.keys().collect();
        let mut filters: Vec<&String> = self.filters.hooks.keys().collect();
        actions.sort();
        filters.sort();
        f.debug_struct("Hook")
            .field("actions", &actions)
            .field("filters", &filters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> ActionCallback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::clone(&log);
        let make = move |tag: &str| {
            let log = Arc::clone(&shared);
            let tag = tag.to_string();
            ActionCallback::new(move |args: &[Value]| {
                log.lock().unwrap().push(format!("{}:{}", tag, args.len()));
            })
        };
        (log, make)
    }

    #[test]
    fn actions_run_by_priority_then_insertion() {
        let (log, make) = recorder();
        let mut hook = Hook::new();
        hook.add_action("init", make("late"), 20, None)
            .add_action("init", make("first"), DEFAULT_PRIORITY, None)
            .add_action("init", make("second"), DEFAULT_PRIORITY, Some(1))
            .add_action("init", make("early"), -5, Some(0));

        assert!(hook.call_action("init", &[json!(1), json!(2)]));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["early:0", "first:2", "second:1", "late:2"]
        );
        assert!(!hook.call_action("missing", &[]));
    }

    #[test]
    fn filters_thread_value() {
        let mut hook = Hook::new();
        hook.add_filter(
            "title",
            FilterCallback::new(|v, _| json!(format!("{}!", v.as_str().unwrap_or_default()))),
            DEFAULT_PRIORITY,
            None,
        )
        .add_filter(
            "title",
            FilterCallback::new(|v, args| {
                let prefix = args.first().and_then(Value::as_str).unwrap_or("");
                json!(format!("{}{}", prefix, v.as_str().unwrap_or_default()))
            }),
            1,
            None,
        );

        let out = hook.call_filter("title", json!("hello"), &[json!("> ")]);
        assert_eq!(out, json!("> hello!"));
        assert_eq!(hook.call_filter("other", json!(3), &[]), json!(3));
    }

    #[test]
    fn num_args_truncates_and_never_pads() {
        let mut hook = Hook::new();
        hook.add_filter(
            "count",
            FilterCallback::new(|_, args| json!(args.len())),
            DEFAULT_PRIORITY,
            Some(5),
        );
        assert_eq!(hook.call_filter("count", Value::Null, &[json!(1), json!(2)]), json!(2));
    }

    #[test]
    fn remove_by_identity_and_priority() {
        let (log, make) = recorder();
        let keep = make("keep");
        let drop = make("drop");
        let mut hook = Hook::new();
        hook.add_action("save", keep.clone(), DEFAULT_PRIORITY, None)
            .add_action("save", drop.clone(), DEFAULT_PRIORITY, None);

        assert!(!hook.remove_action("save", &drop, 99));
        assert!(!hook.remove_action("other", &drop, DEFAULT_PRIORITY));
        assert!(hook.remove_action("save", &drop, DEFAULT_PRIORITY));
        hook.call_action("save", &[]);
        assert_eq!(*log.lock().unwrap(), vec!["keep:0"]);

        // The bucket exists, so an unmatched callback still reports true.
        let stranger = make("stranger");
        assert!(hook.remove_action("save", &stranger, DEFAULT_PRIORITY));
        assert_eq!(hook.count(HookKind::Action, "save"), 1);

        // Emptied hooks stay registered.
        assert!(hook.remove_action("save", &keep, DEFAULT_PRIORITY));
        assert!(hook.has_action("save"));
        assert_eq!(hook.count(HookKind::Action, "save"), 0);
        assert!(hook.call_action("save", &[]));
        assert!(hook.remove_action("save", &keep, DEFAULT_PRIORITY));
        assert_eq!(*log.lock().unwrap(), vec!["keep:0"]);
    }

    #[test]
    fn named_callbacks_match_by_name() {
        struct Seo;

        let mut hook = Hook::new();
        hook.add(
            "title",
            FilterCallback::named("upper", |v, _| json!(v.as_str().unwrap_or_default().to_uppercase())),
            DEFAULT_PRIORITY,
            None,
        )
        .add(
            "title",
            FilterCallback::method::<Seo>("suffix", |v, _| json!(format!("{} | site", v.as_str().unwrap_or_default()))),
            DEFAULT_PRIORITY,
            None,
        );
        assert!(hook.has(HookKind::Filter, "title"));
        assert!(!hook.has(HookKind::Action, "title"));

        let other_upper = FilterCallback::named("upper", |v, _| v);
        assert!(hook.remove_filter("title", &other_upper, DEFAULT_PRIORITY));
        let other_suffix = FilterCallback::method::<Seo>("suffix", |v, _| v);
        assert_eq!(hook.count(HookKind::Filter, "title"), 1);
        assert!(hook.remove_filter("title", &other_suffix, DEFAULT_PRIORITY));
        assert_eq!(hook.count(HookKind::Filter, "title"), 0);
        assert_eq!(hook.call_filter("title", json!("kept"), &[]), json!("kept"));
    }
}
