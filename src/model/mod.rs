//! # Property Model
//!
//! Plain value types shared by fields, collections and entities.
//!
//! Design rule: pure data — no I/O, no locks, no field logic.

pub mod value;
pub mod property_map;
pub mod representation;

pub use value::Value;
pub use property_map::{props, FieldData, PropertyMap};
pub use representation::Representation;
