//! # Class Registry
//!
//! [`MetaModel`] owns the whole model: class schemas, per-class instance
//! arenas, the association link index, the memoized join cache, and the
//! identity source. All state lives here and all mutation goes through
//! `&mut MetaModel`, which is what sequences cache invalidation before any
//! subsequent read.
//!
//! ## Caching contract
//!
//! The join cache is conservative: any attribute write on an instance of
//! class C, and any construction of an instance of C, clears C's entire
//! cache. Caches of different classes are independent.

use crate::idgen::IdGenerator;
use crate::nav::{NavChain, NavSource, Selected};
use crate::ordered_set::QuerySet;
use crate::types::{
    Cardinality, ClassId, DataType, InstanceHandle, ModelError, RelId, UniqueId, Value,
};
use std::collections::BTreeMap;
use tracing::{debug, trace};

// =============================================================================
// CLASS DESCRIPTOR
// =============================================================================

/// An immutable class schema: the class name and its ordered attribute list.
#[derive(Debug, Clone)]
pub struct ClassDef {
    name: String,
    attributes: Vec<(String, DataType)>,
}

impl ClassDef {
    /// The class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered `(canonical attribute name, type)` schema.
    #[must_use]
    pub fn attributes(&self) -> &[(String, DataType)] {
        &self.attributes
    }

    /// Resolve an attribute name case-insensitively to its slot index.
    fn resolve(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|(attr, _)| attr.eq_ignore_ascii_case(name))
    }
}

// =============================================================================
// ASSOCIATION ENDS
// =============================================================================

/// One end of an association: the class it names, the cardinality with
/// which that class participates, the join attributes, and an optional
/// phrase disambiguating multiple relationships between the same pair.
#[derive(Debug, Clone)]
pub struct AssociationEnd {
    class: String,
    cardinality: Cardinality,
    attrs: Vec<String>,
    phrase: String,
}

impl AssociationEnd {
    /// An end with an explicit cardinality.
    #[must_use]
    pub fn new(class: &str, cardinality: Cardinality, attrs: &[&str]) -> Self {
        Self {
            class: class.to_string(),
            cardinality,
            attrs: attrs.iter().map(|a| a.to_string()).collect(),
            phrase: String::new(),
        }
    }

    /// An end bound exactly once (`1`).
    #[must_use]
    pub fn one(class: &str, attrs: &[&str]) -> Self {
        Self::new(class, Cardinality::One, attrs)
    }

    /// An end bound at most once (`1C`).
    #[must_use]
    pub fn one_conditional(class: &str, attrs: &[&str]) -> Self {
        Self::new(class, Cardinality::OneConditional, attrs)
    }

    /// An end bound one or more times (`M`).
    #[must_use]
    pub fn many(class: &str, attrs: &[&str]) -> Self {
        Self::new(class, Cardinality::Many, attrs)
    }

    /// An end bound zero or more times (`MC`).
    #[must_use]
    pub fn many_conditional(class: &str, attrs: &[&str]) -> Self {
        Self::new(class, Cardinality::ManyConditional, attrs)
    }

    /// Attach a disambiguating phrase to this end.
    #[must_use]
    pub fn with_phrase(mut self, phrase: &str) -> Self {
        self.phrase = phrase.to_string();
        self
    }

    /// The class this end names.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The cardinality of this end.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
}

/// One navigable direction of an association, stored on the class it
/// navigates *from*, keyed by `(peer class, relationship, phrase)`.
#[derive(Debug, Clone)]
struct LinkSpec {
    /// Canonical attribute names read on the navigating instance.
    source_attrs: Vec<String>,
    /// Canonical attribute names matched on the peer class.
    target_attrs: Vec<String>,
    /// Cardinality of the peer end; non-many lookups stop at the first hit.
    cardinality: Cardinality,
}

// =============================================================================
// STORAGE
// =============================================================================

/// Join-key: name-sorted `(canonical attribute, value)` pairs.
type JoinKey = Vec<(String, Value)>;

#[derive(Debug, Clone)]
struct Instance {
    values: Vec<Value>,
}

#[derive(Debug)]
struct ClassData {
    def: ClassDef,
    instances: Vec<Instance>,
    links: BTreeMap<(ClassId, RelId, String), LinkSpec>,
    cache: BTreeMap<JoinKey, QuerySet>,
}

// =============================================================================
// META MODEL
// =============================================================================

/// The class registry: the single owner of every class, instance,
/// association and cached join result.
#[derive(Debug)]
pub struct MetaModel {
    classes: Vec<ClassData>,
    class_index: BTreeMap<String, ClassId>,
    id_generator: IdGenerator,
    /// When set, [`new`](Self::new_instance) on an unknown class returns
    /// `Ok(None)` instead of failing. Default `false`.
    pub ignore_undefined_classes: bool,
}

impl Default for MetaModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaModel {
    /// A registry with a random identity source.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id_generator(IdGenerator::random())
    }

    /// A registry with a caller-supplied identity source.
    #[must_use]
    pub fn with_id_generator(id_generator: IdGenerator) -> Self {
        Self {
            classes: Vec::new(),
            class_index: BTreeMap::new(),
            id_generator,
            ignore_undefined_classes: false,
        }
    }

    /// The registry's identity source.
    #[must_use]
    pub fn id_generator(&self) -> &IdGenerator {
        &self.id_generator
    }

    /// Consume and return the next unique identifier.
    pub fn next_unique_id(&mut self) -> UniqueId {
        self.id_generator.next_id()
    }

    // =========================================================================
    // SCHEMA DEFINITION
    // =========================================================================

    /// Register a class with an ordered `(attribute, type name)` schema.
    ///
    /// Redefining an existing class fails with
    /// [`ModelError::DuplicateClass`]; silent schema replacement would
    /// corrupt instances already stored under the old schema.
    pub fn define_class(
        &mut self,
        kind: &str,
        attributes: &[(&str, &str)],
    ) -> Result<ClassId, ModelError> {
        if self.class_index.contains_key(kind) {
            return Err(ModelError::DuplicateClass(kind.to_string()));
        }

        let mut schema = Vec::with_capacity(attributes.len());
        for (name, ty_name) in attributes {
            schema.push((name.to_string(), DataType::parse(ty_name)?));
        }

        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassData {
            def: ClassDef {
                name: kind.to_string(),
                attributes: schema,
            },
            instances: Vec::new(),
            links: BTreeMap::new(),
            cache: BTreeMap::new(),
        });
        self.class_index.insert(kind.to_string(), id);

        debug!(class = kind, attributes = attributes.len(), "defined class");
        Ok(id)
    }

    /// Look up a class by name.
    #[must_use]
    pub fn class_id(&self, kind: &str) -> Option<ClassId> {
        self.class_index.get(kind).copied()
    }

    /// The schema of a class.
    #[must_use]
    pub fn class_def(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id.0 as usize).map(|data| &data.def)
    }

    /// Define a bidirectional association between `source` and `target`:
    /// both directions become navigable under `rel`.
    ///
    /// Join attributes must be declared on their respective classes; a
    /// misspelled attribute fails here rather than producing empty joins
    /// at navigation time.
    pub fn define_association(
        &mut self,
        rel: impl Into<RelId>,
        source: &AssociationEnd,
        target: &AssociationEnd,
    ) -> Result<(), ModelError> {
        let rel = rel.into();
        let source_id = self.require_class(&source.class)?;
        let target_id = self.require_class(&target.class)?;

        let source_attrs = self.canonical_attrs(source_id, &source.attrs)?;
        let target_attrs = self.canonical_attrs(target_id, &target.attrs)?;

        self.classes[source_id.0 as usize].links.insert(
            (target_id, rel.clone(), target.phrase.clone()),
            LinkSpec {
                source_attrs: source_attrs.clone(),
                target_attrs: target_attrs.clone(),
                cardinality: target.cardinality,
            },
        );
        self.classes[target_id.0 as usize].links.insert(
            (source_id, rel.clone(), source.phrase.clone()),
            LinkSpec {
                source_attrs: target_attrs,
                target_attrs: source_attrs,
                cardinality: source.cardinality,
            },
        );

        debug!(
            rel = %rel,
            source = source.class.as_str(),
            target = target.class.as_str(),
            "defined association"
        );
        Ok(())
    }

    /// Alias of [`define_association`](Self::define_association).
    pub fn define_relation(
        &mut self,
        rel: impl Into<RelId>,
        source: &AssociationEnd,
        target: &AssociationEnd,
    ) -> Result<(), ModelError> {
        self.define_association(rel, source, target)
    }

    // =========================================================================
    // INSTANCE CONSTRUCTION
    // =========================================================================

    /// The default value for a metamodel type.
    ///
    /// Reference types (`inst_ref`, `inst_ref_set`) have no default: a class
    /// declaring one cannot be instantiated through [`new_instance`].
    ///
    /// [`new_instance`]: Self::new_instance
    pub fn default_value(&mut self, ty: DataType) -> Result<Value, ModelError> {
        match ty {
            DataType::Boolean => Ok(Value::Boolean(false)),
            DataType::Integer => Ok(Value::Integer(0)),
            DataType::Real => Ok(Value::Real(0.0)),
            DataType::String => Ok(Value::String(String::new())),
            DataType::UniqueId => Ok(Value::UniqueId(self.id_generator.next_id())),
            DataType::InstRef | DataType::InstRefSet => {
                Err(ModelError::UnknownType(ty.name().to_string()))
            }
        }
    }

    /// Create an instance of `kind` with every attribute at its type
    /// default.
    pub fn new_instance(&mut self, kind: &str) -> Result<Option<InstanceHandle>, ModelError> {
        self.new_with(kind, Vec::new(), Vec::new())
    }

    /// Create an instance of `kind`.
    ///
    /// Every declared attribute is first filled with its type default.
    /// `positional` values then overwrite attributes in declaration order,
    /// each coerced into the declared type; a failed coercion aborts before
    /// the instance is stored. `named` values overwrite case-insensitively
    /// and are **not** coerced; names matching no attribute are silently
    /// dropped.
    ///
    /// Unknown classes fail with [`ModelError::UnknownClass`] unless
    /// [`ignore_undefined_classes`](Self::ignore_undefined_classes) is set,
    /// in which case `Ok(None)` is returned.
    pub fn new_with(
        &mut self,
        kind: &str,
        positional: Vec<Value>,
        named: Vec<(String, Value)>,
    ) -> Result<Option<InstanceHandle>, ModelError> {
        let Some(&class) = self.class_index.get(kind) else {
            if self.ignore_undefined_classes {
                trace!(class = kind, "ignored construction of undefined class");
                return Ok(None);
            }
            return Err(ModelError::UnknownClass(kind.to_string()));
        };

        let schema: Vec<DataType> = self.classes[class.0 as usize]
            .def
            .attributes
            .iter()
            .map(|(_, ty)| *ty)
            .collect();

        let mut values = Vec::with_capacity(schema.len());
        for ty in &schema {
            values.push(self.default_value(*ty)?);
        }

        // Positional arguments coerce; surplus ones are ignored.
        for (idx, value) in positional.into_iter().enumerate() {
            if idx >= schema.len() {
                break;
            }
            values[idx] = value.coerce(schema[idx])?;
        }

        // Named arguments overwrite verbatim, without coercion.
        let data = &mut self.classes[class.0 as usize];
        for (name, value) in named {
            if let Some(idx) = data.def.resolve(&name) {
                values[idx] = value;
            }
        }

        let slot = data.instances.len() as u32;
        data.instances.push(Instance { values });
        // A new instance can change the result of a previously empty join.
        data.cache.clear();

        trace!(class = kind, slot, "created instance");
        Ok(Some(InstanceHandle { class, slot }))
    }

    // =========================================================================
    // ATTRIBUTE ACCESS
    // =========================================================================

    /// Read an attribute case-insensitively.
    pub fn attr(&self, handle: InstanceHandle, name: &str) -> Result<&Value, ModelError> {
        let data = self.class_data(handle)?;
        let idx = data.def.resolve(name).ok_or_else(|| ModelError::UnknownAttribute {
            class: data.def.name.clone(),
            attribute: name.to_string(),
        })?;
        Ok(&data.instances[handle.slot as usize].values[idx])
    }

    /// Write an attribute case-insensitively.
    ///
    /// A name matching no declared attribute is a silent no-op; nothing is
    /// stored and no error is raised. A successful write clears the class's
    /// join cache before returning.
    pub fn set_attr(
        &mut self,
        handle: InstanceHandle,
        name: &str,
        value: Value,
    ) -> Result<(), ModelError> {
        let data = self.class_data_mut(handle)?;
        let Some(idx) = data.def.resolve(name) else {
            trace!(
                class = data.def.name.as_str(),
                attribute = name,
                "dropped write to undeclared attribute"
            );
            return Ok(());
        };
        data.instances[handle.slot as usize].values[idx] = value;
        data.cache.clear();
        trace!(class = data.def.name.as_str(), attribute = name, "attribute written, cache cleared");
        Ok(())
    }

    /// All attributes of an instance as `(canonical name, value)` pairs in
    /// declaration order.
    pub fn attrs(
        &self,
        handle: InstanceHandle,
    ) -> Result<impl Iterator<Item = (&str, &Value)>, ModelError> {
        let data = self.class_data(handle)?;
        let instance = &data.instances[handle.slot as usize];
        Ok(data
            .def
            .attributes
            .iter()
            .map(|(name, _)| name.as_str())
            .zip(instance.values.iter()))
    }

    /// The class name of an instance.
    pub fn class_of(&self, handle: InstanceHandle) -> Result<&str, ModelError> {
        Ok(self.class_data(handle)?.def.name())
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// The first instance of `kind`, or `None` for unknown or empty classes.
    #[must_use]
    pub fn select_any(&self, kind: &str) -> Option<InstanceHandle> {
        self.select_any_where(kind, |_, _| true)
    }

    /// The first instance of `kind` satisfying `pred`.
    pub fn select_any_where<P>(&self, kind: &str, pred: P) -> Option<InstanceHandle>
    where
        P: Fn(&Self, InstanceHandle) -> bool,
    {
        let class = self.class_id(kind)?;
        let count = self.classes[class.0 as usize].instances.len();
        (0..count)
            .map(|slot| InstanceHandle {
                class,
                slot: slot as u32,
            })
            .find(|&handle| pred(self, handle))
    }

    /// Alias of [`select_any`](Self::select_any).
    #[must_use]
    pub fn select_one(&self, kind: &str) -> Option<InstanceHandle> {
        self.select_any(kind)
    }

    /// Alias of [`select_any_where`](Self::select_any_where).
    pub fn select_one_where<P>(&self, kind: &str, pred: P) -> Option<InstanceHandle>
    where
        P: Fn(&Self, InstanceHandle) -> bool,
    {
        self.select_any_where(kind, pred)
    }

    /// All instances of `kind` in creation order; empty for unknown classes.
    #[must_use]
    pub fn select_many(&self, kind: &str) -> QuerySet {
        self.select_many_where(kind, |_, _| true)
    }

    /// All instances of `kind` satisfying `pred`, in creation order.
    pub fn select_many_where<P>(&self, kind: &str, pred: P) -> QuerySet
    where
        P: Fn(&Self, InstanceHandle) -> bool,
    {
        let Some(class) = self.class_id(kind) else {
            return QuerySet::new();
        };
        let count = self.classes[class.0 as usize].instances.len();
        (0..count)
            .map(|slot| InstanceHandle {
                class,
                slot: slot as u32,
            })
            .filter(|&handle| pred(self, handle))
            .collect()
    }

    // =========================================================================
    // NAVIGATION ENTRY POINTS
    // =========================================================================

    /// Start a navigation chain that yields a single instance (or none).
    pub fn navigate_one(&mut self, source: impl Into<NavSource>) -> NavChain<'_> {
        NavChain::start(self, source.into(), false)
    }

    /// Alias of [`navigate_one`](Self::navigate_one).
    pub fn navigate_any(&mut self, source: impl Into<NavSource>) -> NavChain<'_> {
        NavChain::start(self, source.into(), false)
    }

    /// Start a navigation chain that yields a query set.
    pub fn navigate_many(&mut self, source: impl Into<NavSource>) -> NavChain<'_> {
        NavChain::start(self, source.into(), true)
    }

    /// Start a chain from an attribute value.
    ///
    /// Only none-valued or instance-valued references and reference sets
    /// are navigable; anything else fails with
    /// [`ModelError::InvalidNavigationSource`].
    pub fn navigate_value(
        &mut self,
        value: &Value,
        is_many: bool,
    ) -> Result<NavChain<'_>, ModelError> {
        let source = match value {
            Value::InstRef(Some(handle)) => NavSource::Instance(*handle),
            Value::InstRef(None) => NavSource::None,
            Value::InstRefSet(set) => NavSource::Set(set.clone()),
            other => return Err(ModelError::InvalidNavigationSource(other.data_type().name())),
        };
        Ok(NavChain::start(self, source, is_many))
    }

    // =========================================================================
    // JOIN EVALUATION
    // =========================================================================

    /// Compute the peer instances of `peer` reachable from `inst` across
    /// `(rel, phrase)`, with optional extra equality filters.
    ///
    /// The join-key is probed against the peer class's cache; on a miss the
    /// peer arena is scanned in insertion order, stopping at the first match
    /// for non-many links, and the result is memoized under the join-key.
    pub(crate) fn select_endpoint(
        &mut self,
        inst: InstanceHandle,
        peer: &str,
        rel: &RelId,
        phrase: &str,
        extra: &[(String, Value)],
    ) -> Result<QuerySet, ModelError> {
        let peer_id = self.require_class(peer)?;
        let src = self.class_data(inst)?;
        let spec = src
            .links
            .get(&(peer_id, rel.clone(), phrase.to_string()))
            .cloned()
            .ok_or_else(|| ModelError::UnknownAssociation {
                rel: rel.clone(),
                class: src.def.name.clone(),
                peer: peer.to_string(),
            })?;

        // Join-key: peer attributes paired with the source instance's
        // values, overlaid with the extra filters (later pairs win).
        let source_instance = &src.instances[inst.slot as usize];
        let mut join: BTreeMap<String, Value> = BTreeMap::new();
        for (target_attr, source_attr) in spec.target_attrs.iter().zip(&spec.source_attrs) {
            let idx = src.def.resolve(source_attr).ok_or_else(|| {
                ModelError::UnknownAttribute {
                    class: src.def.name.clone(),
                    attribute: source_attr.clone(),
                }
            })?;
            join.insert(target_attr.clone(), source_instance.values[idx].clone());
        }

        let peer_data = &self.classes[peer_id.0 as usize];
        for (name, value) in extra {
            let idx = peer_data.def.resolve(name).ok_or_else(|| {
                ModelError::UnknownAttribute {
                    class: peer_data.def.name.clone(),
                    attribute: name.clone(),
                }
            })?;
            join.insert(peer_data.def.attributes[idx].0.clone(), value.clone());
        }
        let join_key: JoinKey = join.into_iter().collect();

        if let Some(hit) = peer_data.cache.get(&join_key) {
            trace!(class = peer_data.def.name.as_str(), "join cache hit");
            return Ok(hit.clone());
        }

        let mut pairs = Vec::with_capacity(join_key.len());
        for (name, value) in &join_key {
            let idx = peer_data.def.resolve(name).ok_or_else(|| {
                ModelError::UnknownAttribute {
                    class: peer_data.def.name.clone(),
                    attribute: name.clone(),
                }
            })?;
            pairs.push((idx, value));
        }

        let many = spec.cardinality.is_many();
        let mut result = QuerySet::new();
        for (slot, instance) in peer_data.instances.iter().enumerate() {
            if pairs.iter().all(|&(idx, value)| instance.values[idx] == *value) {
                result.add(InstanceHandle {
                    class: peer_id,
                    slot: slot as u32,
                });
                if !many {
                    break;
                }
            }
        }

        self.classes[peer_id.0 as usize]
            .cache
            .insert(join_key, result.clone());
        Ok(result)
    }

    // =========================================================================
    // GENERIC RESULT HELPERS
    // =========================================================================

    /// Whether a result is none or an empty set.
    #[must_use]
    pub fn empty(arg: &Selected) -> bool {
        match arg {
            Selected::None => true,
            Selected::Set(set) => set.is_empty(),
            Selected::Instance(_) => false,
        }
    }

    /// Whether a result holds at least one instance.
    #[must_use]
    pub fn not_empty(arg: &Selected) -> bool {
        !Self::empty(arg)
    }

    /// 0 for none, the length for a set, 1 for an instance.
    #[must_use]
    pub fn cardinality(arg: &Selected) -> usize {
        match arg {
            Selected::None => 0,
            Selected::Set(set) => set.len(),
            Selected::Instance(_) => 1,
        }
    }

    /// Whether a result is a query set.
    #[must_use]
    pub fn is_set(arg: &Selected) -> bool {
        matches!(arg, Selected::Set(_))
    }

    /// Whether a result is a single instance.
    #[must_use]
    pub fn is_instance(arg: &Selected) -> bool {
        matches!(arg, Selected::Instance(_))
    }

    /// Whether `handle` is the first element of `set`.
    #[must_use]
    pub fn first(handle: InstanceHandle, set: &QuerySet) -> bool {
        set.first() == Some(handle)
    }

    /// Whether `handle` is not the first element of `set`.
    #[must_use]
    pub fn not_first(handle: InstanceHandle, set: &QuerySet) -> bool {
        !Self::first(handle, set)
    }

    /// Whether `handle` is the last element of `set`.
    #[must_use]
    pub fn last(handle: InstanceHandle, set: &QuerySet) -> bool {
        set.last() == Some(handle)
    }

    /// Whether `handle` is not the last element of `set`.
    #[must_use]
    pub fn not_last(handle: InstanceHandle, set: &QuerySet) -> bool {
        !Self::last(handle, set)
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    fn require_class(&self, kind: &str) -> Result<ClassId, ModelError> {
        self.class_id(kind)
            .ok_or_else(|| ModelError::UnknownClass(kind.to_string()))
    }

    fn canonical_attrs(&self, class: ClassId, attrs: &[String]) -> Result<Vec<String>, ModelError> {
        let def = &self.classes[class.0 as usize].def;
        attrs
            .iter()
            .map(|name| {
                def.resolve(name)
                    .map(|idx| def.attributes[idx].0.clone())
                    .ok_or_else(|| ModelError::UnknownAttribute {
                        class: def.name.clone(),
                        attribute: name.clone(),
                    })
            })
            .collect()
    }

    fn class_data(&self, handle: InstanceHandle) -> Result<&ClassData, ModelError> {
        self.classes
            .get(handle.class.0 as usize)
            .filter(|data| (handle.slot as usize) < data.instances.len())
            .ok_or(ModelError::InvalidHandle(handle.class.0, handle.slot))
    }

    fn class_data_mut(&mut self, handle: InstanceHandle) -> Result<&mut ClassData, ModelError> {
        self.classes
            .get_mut(handle.class.0 as usize)
            .filter(|data| (handle.slot as usize) < data.instances.len())
            .ok_or(ModelError::InvalidHandle(handle.class.0, handle.slot))
    }
}

// =============================================================================
// TESTS
// =============================================================================
