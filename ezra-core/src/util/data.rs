//! Dot-notation access over JSON values, flattening, partitioning and blank checks.

use serde_json::Value;

/// A lookup path: `"a.b.0"` or an explicit list of segments.
pub trait Needle {
    fn segments(&self) -> Vec<String>;
}

impl Needle for str {
    fn segments(&self) -> Vec<String> {
        if self.is_empty() {
            Vec::new()
        } else {
            self.split('.').map(str::to_string).collect()
        }
    }
}

impl Needle for String {
    fn segments(&self) -> Vec<String> {
        self.as_str().segments()
    }
}

impl Needle for [&str] {
    fn segments(&self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl Needle for [String] {
    fn segments(&self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> Needle for [&str; N] {
    fn segments(&self) -> Vec<String> {
        self[..].segments()
    }
}

impl Needle for Vec<String> {
    fn segments(&self) -> Vec<String> {
        self.clone()
    }
}

/// Array index for `key`, only in canonical decimal form (`"+1"` and `"01"` are not indexes).
fn index(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    canonical.then(|| key.parse().ok()).flatten()
}

/// One step down; nulls count as missing.
fn step<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let next = match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => index(key).and_then(|i| items.get(i)),
        _ => None,
    };
    next.filter(|v| !v.is_null())
}

/// Strict dot-notation lookup (no wildcards). Missing or null values yield `default`.
pub fn array_get<'a, N: Needle + ?Sized>(needle: &N, haystack: &'a Value, default: &'a Value) -> &'a Value {
    let mut current = haystack;
    for segment in needle.segments() {
        match step(current, &segment) {
            Some(next) => current = next,
            None => return default,
        }
    }
    if current.is_null() {
        default
    } else {
        current
    }
}

/// Dot-notation lookup where `*` maps the rest of the path over every element of an array
/// (or every value of an object), collecting the results into an array.
pub fn data_get<N: Needle + ?Sized>(needle: &N, haystack: &Value, default: &Value) -> Value {
    data_get_path(&needle.segments(), haystack, default)
}

fn data_get_path(path: &[String], haystack: &Value, default: &Value) -> Value {
    let mut current = haystack;
    for (i, segment) in path.iter().enumerate() {
        if segment == "*" {
            let rest = &path[i + 1..];
            return match current {
                Value::Array(items) => items
                    .iter()
                    .map(|item| data_get_path(rest, item, default))
                    .collect(),
                Value::Object(map) => map
                    .values()
                    .map(|item| data_get_path(rest, item, default))
                    .collect(),
                _ => default.clone(),
            };
        }
        match step(current, segment) {
            Some(next) => current = next,
            None => return default.clone(),
        }
    }
    if current.is_null() {
        default.clone()
    } else {
        current.clone()
    }
}

/// Flatten nested objects/arrays into `("key.child.0", leaf)` pairs, in traversal order.
/// Empty containers have no leaves and disappear.
pub fn array_dot(value: &Value) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten(value, &mut Vec::new(), &mut out);
    out
}

fn flatten(value: &Value, prefix: &mut Vec<String>, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                prefix.push(key.clone());
                flatten(child, prefix, out);
                prefix.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                prefix.push(i.to_string());
                flatten(child, prefix, out);
                prefix.pop();
            }
        }
        leaf => {
            if !prefix.is_empty() {
                out.push((prefix.join("."), leaf.clone()));
            }
        }
    }
}

/// Spread `items` over `groups` groups as evenly as possible; earlier groups take the remainder.
/// Zero groups yields no groups.
pub fn array_partition<T: Clone>(items: &[T], groups: usize) -> Vec<Vec<T>> {
    if groups == 0 {
        return Vec::new();
    }
    let size = items.len() / groups;
    let remainder = items.len() % groups;
    let mut partition = Vec::with_capacity(groups);
    let mut mark = 0;
    for index in 0..groups {
        let take = if index < remainder { size + 1 } else { size };
        partition.push(items[mark..mark + take].to_vec());
        mark += take;
    }
    partition
}

/// `null`, whitespace-only strings and empty arrays/objects are blank; numbers and booleans never are.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Number(_) | Value::Bool(_) => false,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

pub fn is_filled(value: &Value) -> bool {
    !is_blank(value)
}

/// Whether the value can be indexed by key (array or object).
pub fn is_array_access(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}
