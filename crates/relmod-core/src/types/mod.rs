//! # Core Type Definitions
//!
//! This module contains all value-level types for the relmod engine:
//! - Identifiers (`UniqueId`, `ClassId`, `InstanceHandle`, `RelId`)
//! - The metamodel type system (`DataType`, `Value`)
//! - Association cardinalities (`Cardinality`)
//! - Error types (`ModelError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module implement `Ord` so they can key `BTreeMap`s.
//! `Value` carries a manual total order (reals compare via `f64::total_cmp`)
//! because attribute values participate in join-cache keys.

use crate::ordered_set::QuerySet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// An opaque 128-bit unique identifier produced by an [`IdGenerator`].
///
/// [`IdGenerator`]: crate::idgen::IdGenerator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UniqueId(pub u128);

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Index of a class in the registry's class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassId(pub u32);

/// Arena handle addressing one instance: the class it belongs to plus its
/// slot in that class's instance table.
///
/// Handles are plain integers; the registry owns the instances themselves,
/// so association graphs with cycles never create ownership cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceHandle {
    /// The class this instance belongs to.
    pub class: ClassId,
    /// The slot in the class's instance table.
    pub slot: u32,
}

/// A normalized relationship identifier, e.g. `R5`.
///
/// Relationships may be named by number or by string; both forms normalize
/// to the same key:
///
/// ```
/// use relmod_core::RelId;
///
/// assert_eq!(RelId::from(5), RelId::from("R5"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelId(String);

impl RelId {
    /// The normalized textual form of the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u32> for RelId {
    fn from(num: u32) -> Self {
        Self(format!("R{num}"))
    }
}

impl From<i32> for RelId {
    fn from(num: i32) -> Self {
        Self(format!("R{num}"))
    }
}

impl From<&str> for RelId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RelId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// DATA TYPES
// =============================================================================

/// The seven attribute types of the metamodel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Integer,
    Real,
    String,
    UniqueId,
    InstRef,
    InstRefSet,
}

impl DataType {
    /// Parse a metamodel type name, e.g. `"boolean"` or `"unique_id"`.
    pub fn parse(name: &str) -> Result<Self, ModelError> {
        match name {
            "boolean" => Ok(Self::Boolean),
            "integer" => Ok(Self::Integer),
            "real" => Ok(Self::Real),
            "string" => Ok(Self::String),
            "unique_id" => Ok(Self::UniqueId),
            "inst_ref" => Ok(Self::InstRef),
            "inst_ref_set" => Ok(Self::InstRefSet),
            other => Err(ModelError::UnknownType(other.to_string())),
        }
    }

    /// The metamodel name of this type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::String => "string",
            Self::UniqueId => "unique_id",
            Self::InstRef => "inst_ref",
            Self::InstRefSet => "inst_ref_set",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// CARDINALITY
// =============================================================================

/// Cardinality of one association end: `1`, `1C`, `M` or `MC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Exactly one (`1`).
    One,
    /// Zero or one (`1C`).
    OneConditional,
    /// One or more (`M`).
    Many,
    /// Zero or more (`MC`).
    ManyConditional,
}

impl Cardinality {
    /// Parse a cardinality code, case-insensitively.
    pub fn parse(code: &str) -> Result<Self, ModelError> {
        match code.to_ascii_uppercase().as_str() {
            "1" => Ok(Self::One),
            "1C" => Ok(Self::OneConditional),
            "M" => Ok(Self::Many),
            "MC" => Ok(Self::ManyConditional),
            other => Err(ModelError::UnknownCardinality(other.to_string())),
        }
    }

    /// The textual code of this cardinality.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::One => "1",
            Self::OneConditional => "1C",
            Self::Many => "M",
            Self::ManyConditional => "MC",
        }
    }

    /// Whether this end may bind more than one instance.
    #[must_use]
    pub const fn is_many(self) -> bool {
        matches!(self, Self::Many | Self::ManyConditional)
    }

    /// Whether this end may bind zero instances.
    #[must_use]
    pub const fn is_conditional(self) -> bool {
        matches!(self, Self::OneConditional | Self::ManyConditional)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// A dynamically typed attribute value, one variant per [`DataType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    UniqueId(UniqueId),
    InstRef(Option<InstanceHandle>),
    InstRefSet(QuerySet),
}

impl Value {
    /// Classify this value, e.g. `Value::Boolean(_)` is a `boolean`.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Integer(_) => DataType::Integer,
            Self::Real(_) => DataType::Real,
            Self::String(_) => DataType::String,
            Self::UniqueId(_) => DataType::UniqueId,
            Self::InstRef(_) => DataType::InstRef,
            Self::InstRefSet(_) => DataType::InstRefSet,
        }
    }

    /// Coerce this value into `ty`.
    ///
    /// A value already of the declared type passes through unchanged.
    /// Conversions: integer↔real, boolean↔integer, string→scalar by
    /// parsing (booleans accept `true`/`false` case-insensitively), and
    /// scalar→string by rendering. Everything else fails with
    /// [`ModelError::CoercionFailed`].
    pub fn coerce(self, ty: DataType) -> Result<Self, ModelError> {
        if self.data_type() == ty {
            return Ok(self);
        }

        let failed = |from: &Self| ModelError::CoercionFailed {
            from: from.data_type().name(),
            to: ty.name(),
        };

        match (self, ty) {
            (Self::Integer(n), DataType::Real) => Ok(Self::Real(n as f64)),
            (Self::Real(x), DataType::Integer) => Ok(Self::Integer(x as i64)),
            (Self::Boolean(b), DataType::Integer) => Ok(Self::Integer(i64::from(b))),
            (Self::Integer(n), DataType::Boolean) => Ok(Self::Boolean(n != 0)),
            (Self::String(s), DataType::Integer) => match s.trim().parse() {
                Ok(n) => Ok(Self::Integer(n)),
                Err(_) => Err(failed(&Self::String(s))),
            },
            (Self::String(s), DataType::Real) => match s.trim().parse() {
                Ok(x) => Ok(Self::Real(x)),
                Err(_) => Err(failed(&Self::String(s))),
            },
            (Self::String(s), DataType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Self::Boolean(true)),
                "false" => Ok(Self::Boolean(false)),
                _ => Err(failed(&Self::String(s))),
            },
            (value @ (Self::Boolean(_) | Self::Integer(_) | Self::Real(_) | Self::UniqueId(_)), DataType::String) => {
                Ok(Self::String(value.to_string()))
            }
            (value, _) => Err(failed(&value)),
        }
    }

    #[must_use]
    pub const fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(x) => Some(*x),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_unique_id(&self) -> Option<UniqueId> {
        match self {
            Self::UniqueId(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_inst_ref(&self) -> Option<Option<InstanceHandle>> {
        match self {
            Self::InstRef(handle) => Some(*handle),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_inst_ref_set(&self) -> Option<&QuerySet> {
        match self {
            Self::InstRefSet(set) => Some(set),
            _ => None,
        }
    }

    /// Ordering rank across variants, used when comparing mixed types.
    const fn rank(&self) -> u8 {
        match self {
            Self::Boolean(_) => 0,
            Self::Integer(_) => 1,
            Self::Real(_) => 2,
            Self::String(_) => 3,
            Self::UniqueId(_) => 4,
            Self::InstRef(_) => 5,
            Self::InstRefSet(_) => 6,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::UniqueId(a), Self::UniqueId(b)) => a.cmp(b),
            (Self::InstRef(a), Self::InstRef(b)) => a.cmp(b),
            (Self::InstRefSet(a), Self::InstRefSet(b)) => a.iter().cmp(b.iter()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Real(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::UniqueId(id) => write!(f, "{id}"),
            Self::InstRef(Some(h)) => write!(f, "inst_ref({}/{})", h.class.0, h.slot),
            Self::InstRef(None) => f.write_str("inst_ref(none)"),
            Self::InstRefSet(set) => write!(f, "inst_ref_set(len={})", set.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Real(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<UniqueId> for Value {
    fn from(id: UniqueId) -> Self {
        Self::UniqueId(id)
    }
}

impl From<InstanceHandle> for Value {
    fn from(handle: InstanceHandle) -> Self {
        Self::InstRef(Some(handle))
    }
}

impl From<QuerySet> for Value {
    fn from(set: QuerySet) -> Self {
        Self::InstRefSet(set)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by the model engine.
///
/// All failures are local and synchronous: an error aborts the operation
/// that raised it and leaves arenas and caches in their pre-operation state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// An operation referenced a class name that was never defined.
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    /// `define_class` was called twice for the same name.
    #[error("class '{0}' is already defined")]
    DuplicateClass(String),

    /// An unrecognized metamodel type name.
    #[error("unknown type named '{0}'")]
    UnknownType(String),

    /// Reading an attribute that is not declared on the class.
    #[error("unknown attribute '{attribute}' on class '{class}'")]
    UnknownAttribute { class: String, attribute: String },

    /// An unrecognized cardinality code.
    #[error("unknown cardinality code '{0}'")]
    UnknownCardinality(String),

    /// A navigation hop over a relationship that was never defined
    /// between the two classes.
    #[error("undefined relationship {rel} from '{class}' to '{peer}'")]
    UnknownAssociation {
        rel: RelId,
        class: String,
        peer: String,
    },

    /// A constructor argument could not be coerced into the declared type.
    #[error("cannot coerce {from} value into {to}")]
    CoercionFailed {
        from: &'static str,
        to: &'static str,
    },

    /// A navigation chain was started from a value that is neither none,
    /// a single instance, nor a query set.
    #[error("unable to navigate instances of '{0}'")]
    InvalidNavigationSource(&'static str),

    /// `pop` on an empty ordered container.
    #[error("container is empty")]
    EmptyContainer,

    /// An instance handle that does not address a live instance.
    #[error("invalid instance handle class={0} slot={1}")]
    InvalidHandle(u32, u32),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel_id_normalizes_numeric_form() {
        assert_eq!(RelId::from(5), RelId::from("R5"));
        assert_eq!(RelId::from(5).as_str(), "R5");
        assert_ne!(RelId::from(5), RelId::from("R6"));
    }

    #[test]
    fn data_type_parse_roundtrip() {
        for name in [
            "boolean",
            "integer",
            "real",
            "string",
            "unique_id",
            "inst_ref",
            "inst_ref_set",
        ] {
            let ty = DataType::parse(name).expect("parse");
            assert_eq!(ty.name(), name);
        }
    }

    #[test]
    fn data_type_parse_rejects_unknown_names() {
        let result = DataType::parse("quaternion");
        assert!(matches!(result, Err(ModelError::UnknownType(_))));
    }

    #[test]
    fn cardinality_codes() {
        assert_eq!(Cardinality::parse("1").expect("parse"), Cardinality::One);
        assert_eq!(
            Cardinality::parse("mc").expect("parse"),
            Cardinality::ManyConditional
        );
        assert!(Cardinality::Many.is_many());
        assert!(!Cardinality::Many.is_conditional());
        assert!(Cardinality::OneConditional.is_conditional());
        assert!(!Cardinality::OneConditional.is_many());
        assert!(matches!(
            Cardinality::parse("2"),
            Err(ModelError::UnknownCardinality(_))
        ));
    }

    #[test]
    fn value_equality_is_type_aware() {
        assert_eq!(Value::Integer(1), Value::Integer(1));
        assert_ne!(Value::Integer(1), Value::Real(1.0));
        assert_ne!(Value::Boolean(true), Value::Integer(1));
    }

    #[test]
    fn real_values_order_totally() {
        let mut values = vec![Value::Real(2.5), Value::Real(-1.0), Value::Real(0.0)];
        values.sort();
        assert_eq!(
            values,
            vec![Value::Real(-1.0), Value::Real(0.0), Value::Real(2.5)]
        );
    }

    #[test]
    fn coerce_passes_through_matching_type() {
        let v = Value::from("hello").coerce(DataType::String).expect("coerce");
        assert_eq!(v, Value::from("hello"));
    }

    #[test]
    fn coerce_between_numeric_types() {
        assert_eq!(
            Value::Integer(3).coerce(DataType::Real).expect("coerce"),
            Value::Real(3.0)
        );
        assert_eq!(
            Value::Real(3.9).coerce(DataType::Integer).expect("coerce"),
            Value::Integer(3)
        );
    }

    #[test]
    fn coerce_parses_strings() {
        assert_eq!(
            Value::from(" 42 ").coerce(DataType::Integer).expect("coerce"),
            Value::Integer(42)
        );
        assert_eq!(
            Value::from("TRUE").coerce(DataType::Boolean).expect("coerce"),
            Value::Boolean(true)
        );
        assert!(Value::from("forty-two").coerce(DataType::Integer).is_err());
    }

    #[test]
    fn coerce_renders_scalars_to_string() {
        assert_eq!(
            Value::Integer(7).coerce(DataType::String).expect("coerce"),
            Value::from("7")
        );
        assert_eq!(
            Value::Boolean(false).coerce(DataType::String).expect("coerce"),
            Value::from("false")
        );
    }

    #[test]
    fn coerce_rejects_ref_conversions() {
        let result = Value::InstRef(None).coerce(DataType::Integer);
        assert!(matches!(result, Err(ModelError::CoercionFailed { .. })));
    }
}
