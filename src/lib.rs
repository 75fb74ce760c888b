//! # gizmo-rs — Typed Property Bags for Graph Elements
//!
//! Vertices and edges as structured entities whose fields hold one raw value
//! and render it in either of two representations: the native,
//! application-facing form or the transport form a Rexster-style graph
//! property protocol expects. Fields know whether they changed since load
//! and how many more assignments they accept.
//!
//! ## Design Principles
//!
//! 1. **Store once, render twice**: coercion happens on every read, never on write
//! 2. **Best-effort writes**: rejected assignments are outcomes, not errors
//! 3. **Closed kinds**: field types and entity models are explicit enums and tables
//!
//! ## Quick Start
//!
//! ```rust
//! use gizmo::{Field, FieldOptions, Fields, Representation, Value};
//!
//! let fields = Fields::with_fields([
//!     ("name", Field::string("Ada", FieldOptions::default())),
//!     ("active", Field::boolean(true, FieldOptions::default())),
//! ]);
//!
//! let _ = fields.assign("name", "Grace");
//! assert_eq!(fields.changed().get("name"), Some(&Value::from("Grace")));
//!
//! fields.set_representation(Representation::Transport);
//! assert_eq!(fields.data().get("active"), Some(&Value::from("true")));
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `model` | `Value`, `PropertyMap`, `FieldData`, `Representation` |
//! | `field` | One typed, change-tracked slot and its coercions |
//! | `fields` | Named field collection with data views and expanders |
//! | `entity` | Vertices and edges over a field collection |
//! | `registry` | Model name → entity constructor table |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod field;
pub mod fields;
pub mod entity;
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{FieldData, PropertyMap, Representation, Value};
pub use field::{Field, FieldInput, FieldKind, FieldOptions, RejectReason, SetOutcome};
pub use fields::Fields;
pub use entity::{Entity, EntityConfig, EntityKind};
pub use registry::EntityRegistry;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Integrator mistake: bad expander, empty enum, unknown representation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot coerce {kind} value: {message}")]
    Coercion { kind: &'static str, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
