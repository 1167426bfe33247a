//! Ordered associative arrays over JSON values
//!
//! Configuration values contributed by manifests behave like ordered maps
//! whose keys are either integers or strings. A JSON list is the map
//! `0 => a, 1 => b, ...`; an object key that spells a canonical integer
//! (`"100"`, `"-2"`, but not `"007"`) is an integer key. Converting back, a
//! map whose keys are exactly `0..n` in order becomes a JSON list.
//!
//! The combine operations mirror the array functions manifests were written
//! against: [`Assoc::merge`], [`Assoc::merge_recursive`],
//! [`Assoc::replace_recursive`], [`Assoc::plus`] and [`Assoc::plus_2d`].

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde_json::{Map, Value};

/// Key of an [`Assoc`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(i64),
    Name(String),
}

impl Key {
    fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(i) if i.to_string() == raw => Key::Index(i),
            _ => Key::Name(raw.to_string()),
        }
    }

    fn into_string(self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(s) => s,
        }
    }
}

/// An ordered map with integer and string keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assoc {
    entries: IndexMap<Key, Value>,
}

/// Whether `value` is a list or an object.
pub fn is_array(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// Whether `value` is a list or object with no entries.
pub fn is_empty_array(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl Assoc {
    pub fn new() -> Self {
        Self::default()
    }

    /// View a JSON list or object as an associative array.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Self {
                entries: items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (Key::Index(i as i64), v))
                    .collect(),
            }),
            Value::Object(map) => Some(Self {
                entries: map.into_iter().map(|(k, v)| (Key::parse(&k), v)).collect(),
            }),
            _ => None,
        }
    }

    /// Convert back to JSON: a list when keys are exactly `0..n`, otherwise
    /// an object.
    pub fn into_value(self) -> Value {
        let is_list = self
            .entries
            .keys()
            .enumerate()
            .all(|(i, k)| *k == Key::Index(i as i64));
        if is_list {
            Value::Array(self.entries.into_values().collect())
        } else {
            Value::Object(
                self.entries
                    .into_iter()
                    .map(|(k, v)| (k.into_string(), v))
                    .collect::<Map<String, Value>>(),
            )
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&Key::parse(key))
    }

    /// Insert or overwrite; numeric strings become integer keys.
    pub fn insert(&mut self, key: &str, value: Value) {
        self.entries.insert(Key::parse(key), value);
    }

    /// Mutable slot for `key`, created as an empty list when absent.
    pub fn slot(&mut self, key: &str) -> &mut Value {
        self.entries
            .entry(Key::parse(key))
            .or_insert_with(|| Value::Array(Vec::new()))
    }

    /// Append with the next free integer key.
    pub fn push(&mut self, value: Value) {
        let next = self
            .entries
            .keys()
            .filter_map(|k| match k {
                Key::Index(i) => Some(*i + 1),
                Key::Name(_) => None,
            })
            .max()
            .unwrap_or(0)
            .max(0);
        self.entries.insert(Key::Index(next), value);
    }

    /// Shallow merge: integer keys of both sides are renumbered and
    /// appended, string keys of `other` overwrite in place.
    pub fn merge(self, other: Assoc) -> Assoc {
        let mut out = Assoc::new();
        let mut next = 0;
        for (key, value) in self.entries.into_iter().chain(other.entries) {
            match key {
                Key::Index(_) => {
                    out.entries.insert(Key::Index(next), value);
                    next += 1;
                }
                name => {
                    out.entries.insert(name, value);
                }
            }
        }
        out
    }

    /// Prepend-merge: `self` entries come first and win on string-key
    /// collisions; keys only present in `other` are kept after them.
    pub fn prepend(self, other: Assoc) -> Assoc {
        let mut out = Assoc::new();
        let mut next = 0;
        for (key, value) in self.entries.into_iter().chain(other.entries) {
            match key {
                Key::Index(_) => {
                    out.entries.insert(Key::Index(next), value);
                    next += 1;
                }
                name => {
                    out.entries.entry(name).or_insert(value);
                }
            }
        }
        out
    }

    /// Recursive merge: integer keys are appended; colliding string keys
    /// are merged recursively, wrapping scalars into single-entry lists.
    pub fn merge_recursive(self, other: Assoc) -> Assoc {
        let mut out = Assoc::new();
        let mut next = 0;
        for (key, value) in self.entries.into_iter().chain(other.entries) {
            match key {
                Key::Index(_) => {
                    out.entries.insert(Key::Index(next), value);
                    next += 1;
                }
                name => match out.entries.entry(name) {
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                    Entry::Occupied(mut slot) => {
                        let existing = slot.get_mut().take();
                        let merged = Self::wrap(existing).merge_recursive(Self::wrap(value));
                        *slot.get_mut() = merged.into_value();
                    }
                },
            }
        }
        out
    }

    // Scalars take part in a recursive merge as one-element lists.
    fn wrap(value: Value) -> Assoc {
        if is_array(&value) {
            Assoc::from_value(value).unwrap_or_default()
        } else {
            let mut assoc = Assoc::new();
            assoc.push(value);
            assoc
        }
    }

    /// Recursive replace: values of `other` replace those of `self` key by
    /// key; when both sides hold arrays the replacement recurses.
    pub fn replace_recursive(mut self, other: Assoc) -> Assoc {
        for (key, value) in other.entries {
            match self.entries.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => {
                    let current = slot.get_mut();
                    if is_array(current) && is_array(&value) {
                        let base = Assoc::from_value(current.take()).unwrap_or_default();
                        let over = Assoc::from_value(value).unwrap_or_default();
                        *current = base.replace_recursive(over).into_value();
                    } else {
                        *current = value;
                    }
                }
            }
        }
        self
    }

    /// Union: keys of `other` are added only when absent from `self`.
    pub fn plus(mut self, other: Assoc) -> Assoc {
        for (key, value) in other.entries {
            self.entries.entry(key).or_insert(value);
        }
        self
    }

    /// Two-level union: second-level maps present on both sides are unioned
    /// with [`Assoc::plus`], then missing first-level keys are added.
    pub fn plus_2d(mut self, other: Assoc) -> Assoc {
        for (key, value) in self.entries.iter_mut() {
            let Some(extra) = other.entries.get(key) else {
                continue;
            };
            if is_array(value) && is_array(extra) {
                let base = Assoc::from_value(value.take()).unwrap_or_default();
                let add = Assoc::from_value(extra.clone()).unwrap_or_default();
                *value = base.plus(add).into_value();
            }
        }
        self.plus(other)
    }
}

/// Edit `slot` in place as an associative array. A scalar slot is replaced
/// by an empty array first.
pub fn update<R>(slot: &mut Value, f: impl FnOnce(&mut Assoc) -> R) -> R {
    let mut assoc = Assoc::from_value(slot.take()).unwrap_or_default();
    let out = f(&mut assoc);
    *slot = assoc.into_value();
    out
}

impl From<Assoc> for Value {
    fn from(assoc: Assoc) -> Self {
        assoc.into_value()
    }
}
