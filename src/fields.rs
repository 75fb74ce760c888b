//! # Field Collection
//!
//! The set of typed fields making up one entity's state, keyed by name,
//! with aggregate views:
//!
//! | View | Contents |
//! |------|----------|
//! | `data()` | every field's value |
//! | `full_data()` | `data()` passed through every registered expander |
//! | `changed()` | tracked fields whose value differs from their baseline |
//! | `unchanged()` | tracked fields still at their baseline |
//! | `removed()` | tracked fields dropped from the collection |
//!
//! All views are sorted by name. Representation is held by the collection
//! and pushed into each field before it is read.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::field::{Field, FieldInput, SetOutcome};
use crate::model::{FieldData, PropertyMap, Representation, Value};
use crate::{Error, Result};

/// Name under which the built-in per-field expander is registered.
pub const BUILTIN_EXPANDER: &str = "fields";

/// An expander takes the accumulated data and returns it, possibly with
/// extra keys. Returning anything but `Value::Map` is a configuration error.
pub type ExpanderFn = dyn Fn(PropertyMap) -> Value + Send + Sync;

#[derive(Clone)]
enum ExpanderBody {
    Builtin,
    Custom(Arc<ExpanderFn>),
}

#[derive(Clone)]
struct Expander {
    name: String,
    body: ExpanderBody,
}

struct FieldsState {
    representation: Representation,
    slots: HashMap<String, Field>,
    removed: BTreeSet<String>,
}

/// Name → [`Field`] collection with change views and data expanders.
///
/// Safe to share between threads: slot state and expander registration are
/// each behind a `parking_lot::RwLock`. Expanders and the closures given to
/// [`Fields::with_field`] and [`Fields::update`] run without any lock held, so
/// they may use the collection they are attached to.
pub struct Fields {
    state: RwLock<FieldsState>,
    expanders: RwLock<Vec<Expander>>,
}

impl Fields {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FieldsState {
                representation: Representation::Native,
                slots: HashMap::new(),
                removed: BTreeSet::new(),
            }),
            expanders: RwLock::new(vec![Expander {
                name: BUILTIN_EXPANDER.to_string(),
                body: ExpanderBody::Builtin,
            }]),
        }
    }

    pub fn with_fields<K: Into<String>>(fields: impl IntoIterator<Item = (K, Field)>) -> Self {
        let collection = Self::new();
        collection.extend(fields);
        collection
    }

    // ========================================================================
    // Slot access
    // ========================================================================

    /// Install a field, replacing any previous one under `name`.
    pub fn set(&self, name: impl Into<String>, mut field: Field) -> Option<Field> {
        let name = name.into();
        let mut state = self.state.write();
        field.set_representation(state.representation);
        state.removed.remove(&name);
        state.slots.insert(name, field)
    }

    pub fn extend<K: Into<String>>(&self, fields: impl IntoIterator<Item = (K, Field)>) {
        for (name, field) in fields {
            self.set(name, field);
        }
    }

    /// Snapshot of the field under `name`.
    pub fn get(&self, name: &str) -> Option<Field> {
        self.state.read().slots.get(name).cloned()
    }

    /// Run `f` on a snapshot of the field. No lock is held while `f` runs,
    /// so it may use the collection.
    pub fn with_field<R>(&self, name: &str, f: impl FnOnce(&Field) -> R) -> Option<R> {
        let field = self.get(name)?;
        Some(f(&field))
    }

    /// Run `f` on a copy of the field, then store the copy back.
    ///
    /// No lock is held while `f` runs, so it may use the collection. The
    /// copy replaces whatever is stored under `name` when `f` returns; if the
    /// field was removed meanwhile, the result is discarded.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut Field) -> R) -> Option<R> {
        let mut field = {
            let state = self.state.read();
            let mut field = state.slots.get(name)?.clone();
            field.set_representation(state.representation);
            field
        };

        let result = f(&mut field);

        let mut state = self.state.write();
        field.set_representation(state.representation);
        if let Some(slot) = state.slots.get_mut(name) {
            *slot = field;
        }
        Some(result)
    }

    /// Assign to an existing field. `None` when there is no such field.
    /// Atomic with respect to other writers.
    pub fn assign(&self, name: &str, input: impl Into<FieldInput>) -> Option<SetOutcome> {
        // producers run before the lock is taken
        let value = input.into().resolve();
        let mut state = self.state.write();
        state.slots.get_mut(name).map(|field| field.set(value))
    }

    /// Current value of one field in the collection's representation.
    pub fn value(&self, name: &str) -> Option<Value> {
        let state = self.state.read();
        let representation = state.representation;
        state.slots.get(name).map(|f| f.value_as(representation))
    }

    /// Drop a field. Tracked fields are remembered in [`Fields::removed`].
    pub fn remove(&self, name: &str) -> Option<Field> {
        let mut state = self.state.write();
        let field = state.slots.remove(name)?;
        if field.track_changes() {
            state.removed.insert(name.to_string());
        }
        Some(field)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.read().slots.contains_key(name)
    }

    /// Field names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().slots.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.state.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Representation
    // ========================================================================

    pub fn representation(&self) -> Representation {
        self.state.read().representation
    }

    /// Switch representation for the collection and every field in it.
    pub fn set_representation(&self, representation: Representation) {
        let mut state = self.state.write();
        state.representation = representation;
        for field in state.slots.values_mut() {
            field.set_representation(representation);
        }
        trace!(%representation, fields = state.slots.len(), "representation propagated");
    }

    // ========================================================================
    // Expanders
    // ========================================================================

    /// Register an expander under `name`. Registering a name twice is a
    /// no-op; returns whether the expander was added.
    pub fn add_expander<F>(&self, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(PropertyMap) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        let mut expanders = self.expanders.write();
        if expanders.iter().any(|e| e.name == name) {
            return false;
        }
        debug!(expander = %name, "data expander registered");
        expanders.push(Expander { name, body: ExpanderBody::Custom(Arc::new(callback)) });
        true
    }

    /// Registered expander names in run order, the built-in one first.
    pub fn expanders(&self) -> Vec<String> {
        self.expanders.read().iter().map(|e| e.name.clone()).collect()
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// `{name: value}` for every field.
    pub fn data(&self) -> FieldData {
        self.expand_fields(PropertyMap::new()).into_iter().collect()
    }

    /// `full_data()` when `full`, otherwise `data()`.
    pub fn get_data(&self, full: bool) -> Result<FieldData> {
        if full {
            self.full_data()
        } else {
            Ok(self.data())
        }
    }

    /// Run every expander in registration order over an empty accumulator.
    pub fn full_data(&self) -> Result<FieldData> {
        let expanders = self.expanders.read().clone();
        let mut data = PropertyMap::new();

        for expander in &expanders {
            data = match &expander.body {
                ExpanderBody::Builtin => self.expand_fields(data),
                ExpanderBody::Custom(callback) => match callback(data) {
                    Value::Map(map) => map,
                    other => {
                        return Err(Error::Configuration(format!(
                            "expander '{}' must return a map, returned {}",
                            expander.name,
                            other.type_name()
                        )));
                    }
                },
            };
        }

        Ok(data.into_iter().collect())
    }

    pub fn changed(&self) -> FieldData {
        self.tracked(true)
    }

    pub fn unchanged(&self) -> FieldData {
        self.tracked(false)
    }

    /// Names of tracked fields removed from the collection and not
    /// installed again since.
    pub fn removed(&self) -> BTreeSet<String> {
        self.state.read().removed.clone()
    }

    fn expand_fields(&self, mut data: PropertyMap) -> PropertyMap {
        let mut state = self.state.write();
        let representation = state.representation;
        for (name, field) in state.slots.iter_mut() {
            field.set_representation(representation);
            data.insert(name.clone(), field.value());
        }
        data
    }

    fn tracked(&self, changed: bool) -> FieldData {
        let mut state = self.state.write();
        let representation = state.representation;
        state
            .slots
            .iter_mut()
            .filter(|(_, field)| field.track_changes() && field.changed() == changed)
            .map(|(name, field)| {
                field.set_representation(representation);
                (name.clone(), field.value())
            })
            .collect()
    }
}

impl Default for Fields {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Fields {
    fn clone(&self) -> Self {
        let state = self.state.read();
        Self {
            state: RwLock::new(FieldsState {
                representation: state.representation,
                slots: state.slots.clone(),
                removed: state.removed.clone(),
            }),
            expanders: RwLock::new(self.expanders.read().clone()),
        }
    }
}

impl fmt::Debug for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expanders = self.expanders();
        let state = self.state.read();
        let mut names: Vec<&String> = state.slots.keys().collect();
        names.sort();
        f.debug_struct("Fields")
            .field("representation", &state.representation)
            .field("fields", &names)
            .field("removed", &state.removed)
            .field("expanders", &expanders)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldOptions;
    use pretty_assertions::assert_eq;

    fn sample() -> Fields {
        Fields::with_fields([
            ("a", Field::string("x", FieldOptions::default())),
            ("b", Field::integer(3, FieldOptions::default())),
        ])
    }

    #[test]
    fn test_data_is_sorted_snapshot() {
        let fields = sample();
        let data: Vec<_> = fields.data().into_iter().collect();
        assert_eq!(
            data,
            vec![("a".to_string(), Value::from("x")), ("b".to_string(), Value::Int(3))]
        );
    }

    #[test]
    fn test_changed_and_unchanged_partition() {
        let fields = sample();
        assert_eq!(fields.assign("b", 4), Some(SetOutcome::Accepted));

        assert_eq!(fields.changed().keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(fields.unchanged().keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_untracked_fields_excluded_from_change_views() {
        let fields = sample();
        fields.set("c", Field::string("z", FieldOptions::default().untracked()));
        assert!(!fields.changed().contains_key("c"));
        assert!(!fields.unchanged().contains_key("c"));
        assert!(fields.data().contains_key("c"));
    }

    #[test]
    fn test_assign_unknown_field() {
        assert_eq!(sample().assign("nope", 1), None);
    }

    #[test]
    fn test_representation_propagates() {
        let fields = Fields::new();
        fields.set("flag", Field::boolean(true, FieldOptions::default()));
        fields.set_representation(Representation::Transport);
        assert_eq!(fields.value("flag"), Some(Value::from("true")));

        // fields installed later follow the collection
        fields.set("other", Field::boolean(Value::Null, FieldOptions::default()));
        assert_eq!(fields.get("other").unwrap().representation(), Representation::Transport);
        assert_eq!(fields.data().get("other"), Some(&Value::from("false")));
    }

    #[test]
    fn test_full_data_includes_expanders() {
        let fields = sample();
        fields.add_expander("upper", |mut data: PropertyMap| {
            let upper = data.get("a").and_then(Value::as_str).map(str::to_uppercase);
            data.insert("a_upper".into(), Value::from(upper));
            Value::Map(data)
        });

        let full = fields.get_data(true).unwrap();
        assert_eq!(full.get("a_upper"), Some(&Value::from("X")));
        assert!(!fields.get_data(false).unwrap().contains_key("a_upper"));
    }

    #[test]
    fn test_expanders_registered_once() {
        let fields = Fields::new();
        assert!(fields.add_expander("extra", Value::Map));
        assert!(!fields.add_expander("extra", |_| Value::Null));
        assert!(!fields.add_expander(BUILTIN_EXPANDER, Value::Map));
        assert_eq!(fields.expanders(), vec!["fields", "extra"]);
        // the first registration is the one that runs
        assert!(fields.full_data().is_ok());
    }

    #[test]
    fn test_expander_returning_non_map_fails() {
        let fields = sample();
        fields.add_expander("broken", |_| Value::Int(1));
        let err = fields.full_data().unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("broken")));
    }

    #[test]
    fn test_expander_can_read_collection() {
        let fields = Arc::new(sample());
        let handle = Arc::downgrade(&fields);
        fields.add_expander("count", move |mut data: PropertyMap| {
            let count = handle.upgrade().map_or(0, |fields| fields.len() as i64);
            data.insert("_count".into(), Value::Int(count));
            Value::Map(data)
        });
        assert_eq!(fields.full_data().unwrap().get("_count"), Some(&Value::Int(2)));

        // the expander holds no strong reference back to its collection
        assert_eq!(Arc::strong_count(&fields), 1);
        let weak = Arc::downgrade(&fields);
        drop(fields);
        assert!(weak.upgrade().is_none());
    }

    /// Runs `f` on a worker thread and fails instead of hanging if it
    /// does not finish.
    fn finishes_in_time<R: Send + 'static>(f: impl FnOnce() -> R + Send + 'static) -> R {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(f());
        });
        rx.recv_timeout(std::time::Duration::from_secs(3))
            .expect("closure using the collection did not finish")
    }

    #[test]
    fn test_update_closure_may_read_collection() {
        let fields = Arc::new(sample());
        let inner = Arc::clone(&fields);
        let seen = finishes_in_time(move || {
            let seen = inner.update("a", |field| {
                let b = inner.value("b");
                let _ = field.set("y");
                b
            });
            (seen, inner.value("a"))
        });
        assert_eq!(seen, (Some(Some(Value::Int(3))), Some(Value::from("y"))));
        assert_eq!(fields.get("a").unwrap().set_count(), 1);
    }

    #[test]
    fn test_with_field_closure_may_write_collection() {
        let fields = Arc::new(sample());
        let inner = Arc::clone(&fields);
        let kind = finishes_in_time(move || {
            inner.with_field("a", |field| {
                let _ = inner.assign("b", 9);
                field.kind().name()
            })
        });
        assert_eq!(kind, Some("String"));
        assert_eq!(fields.value("b"), Some(Value::Int(9)));
    }

    #[test]
    fn test_update_of_removed_field_is_discarded() {
        let fields = sample();
        let result = fields.update("a", |field| {
            fields.remove("a");
            field.set("gone")
        });
        assert_eq!(result, Some(SetOutcome::Accepted));
        assert!(!fields.contains("a"));
    }

    #[test]
    fn test_removed_tracks_dropped_fields() {
        let fields = sample();
        assert!(fields.removed().is_empty());

        fields.remove("a");
        assert_eq!(fields.removed().into_iter().collect::<Vec<_>>(), vec!["a"]);
        assert!(!fields.data().contains_key("a"));

        fields.set("a", Field::string("y", FieldOptions::default()));
        assert!(fields.removed().is_empty());
    }
}
