//! Vertices and edges built on a [`Fields`] collection.
//!
//! Every entity carries the same built-in fields (model name, creation and
//! modification time, node type and id); edges add a label and remember
//! their endpoints. Names in the immutable set can only be forced from the
//! data an entity is loaded with, never assigned afterwards.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::field::{current_date_time, Field, FieldInput, FieldKind, FieldOptions, RejectReason, SetOutcome};
use crate::fields::Fields;
use crate::model::{FieldData, PropertyMap, Representation, Value};
use crate::Result;

// ============================================================================
// Built-in names
// ============================================================================

pub const MODEL: &str = "_model";
pub const CREATED: &str = "_date_created";
pub const MODIFIED: &str = "_date_modified";
pub const NODE_TYPE: &str = "_node_type";
pub const ID: &str = "_id";
pub const TYPE: &str = "_type";
pub const LABEL: &str = "_label";
pub const OUT_V: &str = "_outV";
pub const IN_V: &str = "_inV";

pub const GENERIC_VERTEX: &str = "generic_vertex";
pub const GENERIC_EDGE: &str = "generic_edge";

const VERTEX_IMMUTABLE: &[&str] = &[ID, TYPE];
const EDGE_IMMUTABLE: &[&str] = &[ID, TYPE, OUT_V, IN_V, LABEL];

/// Vertex or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Vertex,
    Edge,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Vertex => "vertex",
            EntityKind::Edge => "edge",
        }
    }

    /// Short prefix used when referring to an element, `v` or `e`.
    pub fn rep_prefix(&self) -> &'static str {
        match self {
            EntityKind::Vertex => "v",
            EntityKind::Edge => "e",
        }
    }

    fn immutable(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Vertex => VERTEX_IMMUTABLE,
            EntityKind::Edge => EDGE_IMMUTABLE,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Per-model entity settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Stored in `_model`; also the registry key.
    pub model: String,
    /// Stored in `_node_type`.
    pub node_type: String,
    /// Accept names with no declared field, creating one on first use.
    #[serde(default)]
    pub allow_undefined: bool,
    #[serde(default)]
    pub representation: Representation,
}

impl EntityConfig {
    pub fn new(model: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            node_type: node_type.into(),
            allow_undefined: false,
            representation: Representation::Native,
        }
    }

    pub fn allow_undefined(mut self) -> Self {
        self.allow_undefined = true;
        self
    }

    pub fn with_representation(mut self, representation: Representation) -> Self {
        self.representation = representation;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A vertex or edge and its field collection.
#[derive(Debug)]
pub struct Entity {
    kind: EntityKind,
    allow_undefined: bool,
    immutable: BTreeSet<String>,
    fields: Fields,
    /// Names created on first use rather than declared up front. Reads can
    /// create fields too, so this sits behind a lock like the fields do.
    undefined: RwLock<BTreeSet<String>>,
    out_v: Option<Value>,
    in_v: Option<Value>,
}

impl Clone for Entity {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            allow_undefined: self.allow_undefined,
            immutable: self.immutable.clone(),
            fields: self.fields.clone(),
            undefined: RwLock::new(self.undefined.read().clone()),
            out_v: self.out_v.clone(),
            in_v: self.in_v.clone(),
        }
    }
}

impl Entity {
    pub fn vertex(config: &EntityConfig, data: Option<PropertyMap>) -> Self {
        let mut entity = Self::base(EntityKind::Vertex, config);
        let data = data.unwrap_or_default();
        entity.load(&data);
        entity
    }

    /// Build an edge. Endpoint keys (`out_v`/`_outV`, `in_v`/`_inV`) are
    /// taken out of `data` rather than stored as fields.
    pub fn edge(config: &EntityConfig, label: Option<&str>, data: Option<PropertyMap>) -> Self {
        let mut entity = Self::base(EntityKind::Edge, config);
        let mut data = data.unwrap_or_default();

        entity.out_v = data.remove("out_v").or_else(|| data.remove(OUT_V));
        entity.in_v = data.remove("in_v").or_else(|| data.remove(IN_V));

        let opts = FieldOptions::default().with_representation(config.representation);
        entity.fields.set(LABEL, Field::string(Value::from(label.map(str::to_string)), opts));
        if let Some(label) = data.get(LABEL) {
            entity.fields.update(LABEL, |f| f.reset_raw(label.clone()));
        }

        entity.load(&data);
        entity
    }

    pub fn generic_vertex(data: Option<PropertyMap>) -> Self {
        Self::vertex(&EntityConfig::new(GENERIC_VERTEX, GENERIC_VERTEX).allow_undefined(), data)
    }

    pub fn generic_edge(label: Option<&str>, data: Option<PropertyMap>) -> Self {
        Self::edge(&EntityConfig::new(GENERIC_EDGE, GENERIC_EDGE).allow_undefined(), label, data)
    }

    fn base(kind: EntityKind, config: &EntityConfig) -> Self {
        let opts = FieldOptions::default().with_representation(config.representation);
        let fields = Fields::with_fields([
            (MODEL, Field::string(config.model.as_str(), opts)),
            (CREATED, Field::date_time(FieldInput::producer(current_date_time), opts.with_set_max(1))),
            (MODIFIED, Field::date_time(FieldInput::producer(current_date_time), opts)),
            (NODE_TYPE, Field::string(config.node_type.as_str(), opts)),
            (ID, Field::string(Value::Null, opts)),
        ]);
        fields.set_representation(config.representation);

        Self {
            kind,
            allow_undefined: config.allow_undefined,
            immutable: kind.immutable().iter().map(|s| s.to_string()).collect(),
            fields,
            undefined: RwLock::new(BTreeSet::new()),
            out_v: None,
            in_v: None,
        }
    }

    /// Hydrate, then force `_id` from the data: it is immutable to `set`.
    fn load(&mut self, data: &PropertyMap) {
        self.hydrate(data.clone());
        if let Some(id) = data.get(ID) {
            self.fields.update(ID, |f| f.reset_raw(id.clone()));
        }
    }

    /// Assign every entry of `data`, ignoring rejections.
    pub fn hydrate(&mut self, data: PropertyMap) -> &mut Self {
        let mut entries: Vec<_> = data.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in entries {
            let _ = self.set(&name, value);
        }
        self
    }

    /// Assign to a field by name.
    ///
    /// Immutable names are rejected. Unknown names either create a field
    /// (when undefined fields are allowed) or are rejected.
    pub fn set(&mut self, name: &str, input: impl Into<FieldInput>) -> SetOutcome {
        if self.immutable.contains(name) {
            debug!(field = name, "assignment to immutable field");
            return SetOutcome::Rejected(RejectReason::Immutable);
        }
        let value = input.into().resolve();
        if let Some(outcome) = self.fields.assign(name, value.clone()) {
            return outcome;
        }
        if self.allow_undefined {
            self.add_undefined_field(name, value);
            SetOutcome::Accepted
        } else {
            debug!(field = name, "assignment to undefined field");
            SetOutcome::Rejected(RejectReason::Undefined)
        }
    }

    /// Value of a field in the current representation.
    ///
    /// Reading an unknown name on an entity that allows undefined fields
    /// installs an empty string field under that name.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.fields.value(name) {
            return Some(value);
        }
        if !self.allow_undefined {
            return None;
        }
        let field = Field::string(Value::Null, FieldOptions::default());
        let value = field.value_as(self.fields.representation());
        debug!(field = name, "undefined field created on read");
        self.fields.set(name, field);
        self.undefined.write().insert(name.to_string());
        Some(value)
    }

    /// Pick the field kind from the value's variant.
    fn add_undefined_field(&mut self, name: &str, value: Value) {
        let kind = match &value {
            Value::Map(_) => FieldKind::Map,
            Value::List(_) => FieldKind::List,
            Value::Bool(_) => FieldKind::Boolean,
            Value::Int(_) => FieldKind::Integer,
            Value::Float(_) => FieldKind::Float,
            Value::Null | Value::String(_) => FieldKind::String,
        };
        debug!(field = name, kind = kind.name(), "undefined field created");
        self.fields.set(name, Field::new(kind, value, FieldOptions::default()));
        self.undefined.write().insert(name.to_string());
    }

    // ========================================================================
    // Accessors and views
    // ========================================================================

    pub fn kind(&self) -> EntityKind { self.kind }
    pub fn fields(&self) -> &Fields { &self.fields }
    pub fn out_v(&self) -> Option<&Value> { self.out_v.as_ref() }
    pub fn in_v(&self) -> Option<&Value> { self.in_v.as_ref() }
    pub fn allows_undefined(&self) -> bool { self.allow_undefined }

    pub fn is_immutable(&self, name: &str) -> bool {
        self.immutable.contains(name)
    }

    /// Names of fields created from undeclared keys.
    pub fn undefined_fields(&self) -> BTreeSet<String> {
        self.undefined.read().clone()
    }

    pub fn representation(&self) -> Representation {
        self.fields.representation()
    }

    pub fn set_representation(&self, representation: Representation) {
        self.fields.set_representation(representation);
    }

    pub fn data(&self) -> FieldData { self.fields.data() }
    pub fn full_data(&self) -> Result<FieldData> { self.fields.full_data() }
    pub fn changed(&self) -> FieldData { self.fields.changed() }
    pub fn unchanged(&self) -> FieldData { self.fields.unchanged() }
    pub fn removed(&self) -> BTreeSet<String> { self.fields.removed() }

    /// `("v" | "e", id)`
    pub fn rep(&self) -> (&'static str, Value) {
        (self.kind.rep_prefix(), self.get(ID).unwrap_or_default())
    }
}
