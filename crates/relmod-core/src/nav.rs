//! # Navigation Chain
//!
//! [`NavChain`] is the fluent evaluator for walking association hops from a
//! starting instance (or set of instances). A chain is started through the
//! registry ([`MetaModel::navigate_one`], [`MetaModel::navigate_many`]) with
//! a one/many intent that is fixed for the whole chain; each hop names the
//! peer class and the relationship, fans out over the bound set, and unions
//! the per-instance join results in binding-then-scan order.
//!
//! ```
//! use relmod_core::{AssociationEnd, MetaModel, Selected, Value};
//!
//! let mut model = MetaModel::new();
//! model.define_class("Order", &[("Number", "integer")])?;
//! model.define_class("Item", &[("Order_Number", "integer")])?;
//! model.define_association(
//!     1,
//!     &AssociationEnd::one("Order", &["Number"]),
//!     &AssociationEnd::many("Item", &["Order_Number"]),
//! )?;
//!
//! let order = model
//!     .new_with("Order", vec![Value::Integer(1)], Vec::new())?
//!     .ok_or("no instance")?;
//! model.new_with("Item", vec![Value::Integer(1)], Vec::new())?;
//!
//! let items = model.navigate_many(order).to("Item", 1)?.select();
//! assert_eq!(MetaModel::cardinality(&items), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::metamodel::MetaModel;
use crate::ordered_set::QuerySet;
use crate::types::{InstanceHandle, ModelError, RelId, Value};

// =============================================================================
// NAVIGATION SOURCE
// =============================================================================

/// What a navigation chain starts from: nothing, one instance, or a query
/// set.
#[derive(Debug, Clone)]
pub enum NavSource {
    None,
    Instance(InstanceHandle),
    Set(QuerySet),
}

impl From<InstanceHandle> for NavSource {
    fn from(handle: InstanceHandle) -> Self {
        Self::Instance(handle)
    }
}

impl From<Option<InstanceHandle>> for NavSource {
    fn from(handle: Option<InstanceHandle>) -> Self {
        match handle {
            Some(handle) => Self::Instance(handle),
            None => Self::None,
        }
    }
}

impl From<QuerySet> for NavSource {
    fn from(set: QuerySet) -> Self {
        Self::Set(set)
    }
}

impl From<Selected> for NavSource {
    fn from(selected: Selected) -> Self {
        match selected {
            Selected::None => Self::None,
            Selected::Instance(handle) => Self::Instance(handle),
            Selected::Set(set) => Self::Set(set),
        }
    }
}

// =============================================================================
// TERMINAL RESULT SHAPE
// =============================================================================

/// The shaped result of a terminal selection or navigation: none, a single
/// instance, or a query set. Which shape a chain produces is decided by its
/// one/many intent, not by how many instances happened to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    None,
    Instance(InstanceHandle),
    Set(QuerySet),
}

impl Selected {
    /// The instance, for single-shaped results.
    #[must_use]
    pub const fn instance(&self) -> Option<InstanceHandle> {
        match self {
            Self::Instance(handle) => Some(*handle),
            _ => None,
        }
    }

    /// The query set, for set-shaped results.
    #[must_use]
    pub const fn set(&self) -> Option<&QuerySet> {
        match self {
            Self::Set(set) => Some(set),
            _ => None,
        }
    }
}

// =============================================================================
// NAVIGATION CHAIN
// =============================================================================

/// A chain of association hops bound to a set of instances.
///
/// Hops borrow the registry mutably because a hop may populate the join
/// cache; the borrow also guarantees nothing mutates the model while a
/// chain is in flight.
pub struct NavChain<'a> {
    model: &'a mut MetaModel,
    handle: QuerySet,
    is_many: bool,
}

impl<'a> NavChain<'a> {
    pub(crate) fn start(model: &'a mut MetaModel, source: NavSource, is_many: bool) -> Self {
        let handle = match source {
            NavSource::None => QuerySet::new(),
            NavSource::Instance(h) => {
                let mut set = QuerySet::new();
                set.add(h);
                set
            }
            NavSource::Set(set) => set,
        };
        Self {
            model,
            handle,
            is_many,
        }
    }

    /// Hop to `kind` across relationship `rel` (no phrase).
    pub fn to(self, kind: &str, rel: impl Into<RelId>) -> Result<Self, ModelError> {
        self.hop(kind, rel.into(), "", &[])
    }

    /// Hop to `kind` across relationship `rel` under `phrase`.
    pub fn to_phrase(
        self,
        kind: &str,
        rel: impl Into<RelId>,
        phrase: &str,
    ) -> Result<Self, ModelError> {
        self.hop(kind, rel.into(), phrase, &[])
    }

    /// Hop with extra attribute equality filters applied on the peer side.
    pub fn to_where(
        self,
        kind: &str,
        rel: impl Into<RelId>,
        phrase: &str,
        extra: &[(String, Value)],
    ) -> Result<Self, ModelError> {
        self.hop(kind, rel.into(), phrase, extra)
    }

    fn hop(
        mut self,
        kind: &str,
        rel: RelId,
        phrase: &str,
        extra: &[(String, Value)],
    ) -> Result<Self, ModelError> {
        let mut result = QuerySet::new();
        for inst in &self.handle {
            let peers = self.model.select_endpoint(inst, kind, &rel, phrase, extra)?;
            result |= &peers;
        }
        self.handle = result;
        Ok(self)
    }

    /// Evaluate the chain.
    ///
    /// A one-intent chain yields its first bound instance (or
    /// [`Selected::None`]); a many-intent chain yields the full bound set.
    #[must_use]
    pub fn select(self) -> Selected {
        self.select_where(|_, _| true)
    }

    /// Evaluate the chain with a filter predicate over the bound set.
    ///
    /// The bound set is a snapshot: the predicate runs over instances as
    /// bound at the last hop.
    pub fn select_where<P>(self, pred: P) -> Selected
    where
        P: Fn(&MetaModel, InstanceHandle) -> bool,
    {
        let model: &MetaModel = self.model;
        if self.is_many {
            Selected::Set(self.handle.iter().filter(|&h| pred(model, h)).collect())
        } else {
            match self.handle.iter().find(|&h| pred(model, h)) {
                Some(handle) => Selected::Instance(handle),
                None => Selected::None,
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::AssociationEnd;
    use crate::types::Value;

    /// Order 1 --- M Item, joined on Order.Number = Item.Order_Number.
    fn order_item_model() -> (MetaModel, InstanceHandle, Vec<InstanceHandle>) {
        let mut model = MetaModel::new();
        model
            .define_class("Order", &[("Number", "integer")])
            .expect("define");
        model
            .define_class("Item", &[("Order_Number", "integer"), ("Sku", "string")])
            .expect("define");
        model
            .define_association(
                1,
                &AssociationEnd::one("Order", &["Number"]),
                &AssociationEnd::many("Item", &["Order_Number"]),
            )
            .expect("associate");

        let order = model
            .new_with("Order", vec![Value::Integer(7)], Vec::new())
            .expect("new")
            .expect("instance");
        let items: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|sku| {
                model
                    .new_with(
                        "Item",
                        vec![Value::Integer(7), Value::from(*sku)],
                        Vec::new(),
                    )
                    .expect("new")
                    .expect("instance")
            })
            .collect();
        (model, order, items)
    }

    #[test]
    fn many_navigation_returns_matches_in_creation_order() {
        let (mut model, order, items) = order_item_model();
        let result = model
            .navigate_many(order)
            .to("Item", 1)
            .expect("hop")
            .select();
        let set = result.set().expect("set");
        let order_of: Vec<_> = set.iter().collect();
        assert_eq!(order_of, items);
    }

    #[test]
    fn one_navigation_returns_single_instance() {
        let (mut model, order, items) = order_item_model();
        let result = model
            .navigate_one(items[1])
            .to("Order", 1)
            .expect("hop")
            .select();
        assert_eq!(result, Selected::Instance(order));
    }

    #[test]
    fn chain_from_none_is_empty() {
        let (mut model, _, _) = order_item_model();
        let result = model
            .navigate_many(NavSource::None)
            .to("Item", 1)
            .expect("hop")
            .select();
        assert_eq!(result.set().map(QuerySet::len), Some(0));

        let one = model
            .navigate_one(NavSource::None)
            .to("Item", 1)
            .expect("hop")
            .select();
        assert_eq!(one, Selected::None);
    }

    #[test]
    fn chain_fans_out_over_a_set() {
        let (mut model, _, items) = order_item_model();
        let two: QuerySet = items[..2].iter().copied().collect();
        // Both items reach the same order; the union collapses duplicates.
        let result = model
            .navigate_many(two)
            .to("Order", 1)
            .expect("hop")
            .select();
        assert_eq!(result.set().map(QuerySet::len), Some(1));
    }

    #[test]
    fn filter_predicate_applies_at_terminal() {
        let (mut model, order, _) = order_item_model();
        let result = model
            .navigate_many(order)
            .to("Item", 1)
            .expect("hop")
            .select_where(|m, h| {
                m.attr(h, "Sku")
                    .map(|v| v == &Value::from("b"))
                    .unwrap_or(false)
            });
        assert_eq!(result.set().map(QuerySet::len), Some(1));
    }

    #[test]
    fn hop_filter_constrains_peers() {
        let (mut model, order, items) = order_item_model();
        let result = model
            .navigate_many(order)
            .to_where("Item", 1, "", &[("Sku".to_string(), Value::from("c"))])
            .expect("hop")
            .select();
        let set = result.set().expect("set");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![items[2]]);
    }

    #[test]
    fn undefined_relationship_fails() {
        let (mut model, order, _) = order_item_model();
        let result = model.navigate_many(order).to("Item", 99);
        assert!(matches!(result, Err(ModelError::UnknownAssociation { .. })));
    }

    #[test]
    fn navigate_value_accepts_only_references() {
        let (mut model, order, _) = order_item_model();

        let chain = model
            .navigate_value(&Value::InstRef(Some(order)), true)
            .expect("chain");
        let result = chain.to("Item", 1).expect("hop").select();
        assert_eq!(result.set().map(QuerySet::len), Some(3));

        let err = model.navigate_value(&Value::Integer(5), true);
        assert!(matches!(
            err,
            Err(ModelError::InvalidNavigationSource("integer"))
        ));
    }
}
