//! # Typed Field
//!
//! One named, typed, change-tracked value slot. A field stores a single raw
//! value and renders it as either its native or its transport form on every
//! read, so switching representation takes effect immediately.
//!
//! Assignments are best-effort: an attempt past `set_max`, or an enum value
//! outside the allowed set, is reported as [`SetOutcome::Rejected`] and
//! leaves the field untouched apart from the attempt counter.

pub mod kind;

use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::model::{PropertyMap, Representation, Value};
use crate::Result;

pub use kind::{current_date_time, Allowed, FieldKind};

// ============================================================================
// Inputs and outcomes
// ============================================================================

/// A value to assign, or a producer invoked at write time to obtain it.
pub enum FieldInput {
    Value(Value),
    Producer(Box<dyn FnOnce() -> Value>),
}

impl FieldInput {
    pub fn producer(f: impl FnOnce() -> Value + 'static) -> Self {
        FieldInput::Producer(Box::new(f))
    }

    /// Run the producer, if any.
    pub fn resolve(self) -> Value {
        match self {
            FieldInput::Value(v) => v,
            FieldInput::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for FieldInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldInput::Value(v) => f.debug_tuple("Value").field(v).finish(),
            FieldInput::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

macro_rules! field_input_from {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldInput {
            fn from(v: $t) -> Self { FieldInput::Value(v.into()) }
        })*
    };
}

field_input_from!(Value, bool, i32, i64, f64, String, &str, PropertyMap, Vec<Value>, Option<Value>);

/// Why an assignment was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// More attempts than `set_max` allows.
    SetLimit,
    /// Not a member of the enum's allowed set.
    NotAllowed,
    /// The owning entity declares the name immutable.
    Immutable,
    /// Unknown name on an entity that forbids undefined fields.
    Undefined,
}

/// Result of an assignment attempt. Rejection is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SetOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl SetOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SetOutcome::Accepted)
    }
}

// ============================================================================
// Options
// ============================================================================

/// Construction options shared by every field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOptions {
    pub representation: Representation,
    /// Maximum number of assignment attempts; `None` is unlimited.
    pub set_max: Option<u32>,
    pub track_changes: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            representation: Representation::Native,
            set_max: None,
            track_changes: true,
        }
    }
}

impl FieldOptions {
    pub fn with_representation(mut self, representation: Representation) -> Self {
        self.representation = representation;
        self
    }

    pub fn with_set_max(mut self, set_max: u32) -> Self {
        self.set_max = Some(set_max);
        self
    }

    pub fn untracked(mut self) -> Self {
        self.track_changes = false;
        self
    }
}

// ============================================================================
// Field
// ============================================================================

/// A typed, change-tracked value slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    kind: FieldKind,
    stored: Value,
    initial: Value,
    /// Every distinct value assigned, starting with the initial one.
    changes: SmallVec<[Value; 4]>,
    set_count: u32,
    set_max: Option<u32>,
    representation: Representation,
    track_changes: bool,
}

impl Field {
    /// Build a field. A falsy initial value (null, empty, zero, false)
    /// resolves to the kind's default. Construction is not an attempt.
    pub fn new(kind: FieldKind, initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        let resolved = initial.into().resolve();
        let initial = match &kind {
            FieldKind::Enum(allowed) if !allowed.contains(&resolved) => {
                if !resolved.is_null() {
                    warn!(value = %resolved, "enum initial value not allowed, using default");
                }
                kind.default_value()
            }
            _ if !resolved.is_truthy() => kind.default_value(),
            _ => resolved,
        };

        let mut changes = SmallVec::new();
        changes.push(initial.clone());

        Self {
            kind,
            stored: initial.clone(),
            initial,
            changes,
            set_count: 0,
            set_max: opts.set_max,
            representation: opts.representation,
            track_changes: opts.track_changes,
        }
    }

    pub fn string(initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        Self::new(FieldKind::String, initial, opts)
    }

    pub fn integer(initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        Self::new(FieldKind::Integer, initial, opts)
    }

    pub fn increment(initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        Self::new(FieldKind::Increment, initial, opts)
    }

    pub fn float(initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        Self::new(FieldKind::Float, initial, opts)
    }

    pub fn boolean(initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        Self::new(FieldKind::Boolean, initial, opts)
    }

    pub fn map(initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        Self::new(FieldKind::Map, initial, opts)
    }

    pub fn list(initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        Self::new(FieldKind::List, initial, opts)
    }

    pub fn date_time(initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        Self::new(FieldKind::DateTime, initial, opts)
    }

    pub fn time_stamp(initial: impl Into<FieldInput>, opts: FieldOptions) -> Self {
        Self::new(FieldKind::TimeStamp, initial, opts)
    }

    /// Fails when `allowed` is empty.
    pub fn enumeration<I, V>(
        allowed: I,
        initial: impl Into<FieldInput>,
        opts: FieldOptions,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let allowed = Allowed::new(allowed)?;
        Ok(Self::new(FieldKind::Enum(allowed), initial, opts))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The stored value rendered in this field's current representation.
    ///
    /// Never fails: if the stored value cannot be coerced, the raw value is
    /// returned unchanged. Use [`Field::try_value`] to observe the failure.
    pub fn value(&self) -> Value {
        self.value_as(self.representation)
    }

    pub fn value_as(&self, representation: Representation) -> Value {
        match self.try_value_as(representation) {
            Ok(v) => v,
            Err(err) => {
                warn!(kind = self.kind.name(), %err, "coercion failed, returning raw value");
                self.stored.clone()
            }
        }
    }

    pub fn try_value(&self) -> Result<Value> {
        self.try_value_as(self.representation)
    }

    pub fn try_value_as(&self, representation: Representation) -> Result<Value> {
        match representation {
            Representation::Native => self.kind.to_native(&self.stored),
            Representation::Transport => self.kind.to_transport(&self.stored),
        }
    }

    /// True when the stored raw value differs from the construction-time
    /// baseline.
    pub fn changed(&self) -> bool {
        self.stored != self.initial
    }

    pub fn raw(&self) -> &Value { &self.stored }
    pub fn initial(&self) -> &Value { &self.initial }
    pub fn changes(&self) -> &[Value] { &self.changes }
    pub fn set_count(&self) -> u32 { self.set_count }
    pub fn set_max(&self) -> Option<u32> { self.set_max }
    pub fn track_changes(&self) -> bool { self.track_changes }
    pub fn kind(&self) -> &FieldKind { &self.kind }
    pub fn representation(&self) -> Representation { self.representation }

    pub fn set_representation(&mut self, representation: Representation) {
        self.representation = representation;
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Attempt an assignment. Every attempt counts toward `set_max`,
    /// including rejected ones.
    pub fn set(&mut self, input: impl Into<FieldInput>) -> SetOutcome {
        let value = input.into().resolve();
        self.set_count = self.set_count.saturating_add(1);

        if let Some(max) = self.set_max {
            if self.set_count > max {
                debug!(kind = self.kind.name(), attempt = self.set_count, max, "assignment over set limit");
                return SetOutcome::Rejected(RejectReason::SetLimit);
            }
        }

        if let FieldKind::Enum(allowed) = &self.kind {
            if !allowed.contains(&value) {
                debug!(value = %value, "enum assignment outside allowed set");
                return SetOutcome::Rejected(RejectReason::NotAllowed);
            }
        }

        if value != self.stored {
            self.changes.push(value.clone());
        }
        self.stored = value;
        SetOutcome::Accepted
    }

    /// Overwrite the raw value without counting an attempt or logging a
    /// change. Entities use this to force identity fields from loaded data.
    pub fn reset_raw(&mut self, value: impl Into<Value>) {
        self.stored = value.into();
    }
}
