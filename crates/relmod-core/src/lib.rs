//! # relmod-core
//!
//! An in-memory object-relational store for executable-model instances.
//!
//! The engine holds typed records ("instances") of dynamically defined
//! classes, links them through bidirectional, cardinality-typed
//! associations, and lets callers traverse those associations via a
//! chainable navigation evaluator. Join results are memoized per class and
//! conservatively invalidated: any write to an instance of a class, and any
//! construction of an instance of a class, clears that class's cache.
//!
//! ## Architectural Constraints
//!
//! - Single-threaded and synchronous: every operation runs to completion;
//!   the registry owns all state and mutation goes through `&mut`.
//! - Deterministic: `BTreeMap` only, insertion-ordered result sets.
//! - Embeddable: no CLI, no wire protocol, no persistence layer of its own.
//!   Model loaders, code generators and interpreters sit outside and call
//!   in through [`MetaModel`].
//!
//! ## Example
//!
//! ```
//! use relmod_core::{MetaModel, Value};
//!
//! let mut model = MetaModel::new();
//! model.define_class("Person", &[("Name", "string"), ("Age", "integer")])?;
//!
//! let alice = model
//!     .new_with("Person", vec![Value::from("Alice"), Value::Integer(30)], Vec::new())?
//!     .ok_or("no instance")?;
//!
//! // Attribute identity is case-insensitive.
//! assert_eq!(model.attr(alice, "age")?, &Value::Integer(30));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod idgen;
pub mod metamodel;
pub mod nav;
pub mod ordered_set;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    Cardinality, ClassId, DataType, InstanceHandle, ModelError, RelId, UniqueId, Value,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use idgen::IdGenerator;
pub use metamodel::{AssociationEnd, ClassDef, MetaModel};
pub use nav::{NavChain, NavSource, Selected};
pub use ordered_set::{OrderedSet, QuerySet};
