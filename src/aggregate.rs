//! Aggregates: attributes that reduce a dynamic item set.
//!
//! An aggregate depends on every one of its items. The item list and the
//! dependency edges are kept in step: adding an item links it, removing an
//! item (from either side) unlinks it.

use crate::error::AttrError;
use crate::name::AttrName;
use crate::node::{AggregateState, AttrKind, AttrType, Link, Node, NodeId, Pin};
use crate::numeric::StatValue;
use crate::sheet::Sheet;

/// How an aggregate folds its item values.
///
/// # Examples
///
/// ```rust
/// use statsheet::Reducer;
///
/// let values = [Some(2.0), Some(5.0), Some(3.0)];
/// assert_eq!(Reducer::Sum.reduce(values), Some(10.0));
/// assert_eq!(Reducer::Max.reduce(values), Some(5.0));
/// assert_eq!(Reducer::Min.reduce(values), Some(2.0));
///
/// // nothing to compare
/// let empty: [Option<f64>; 0] = [];
/// assert_eq!(Reducer::Max.reduce(empty), None);
/// assert_eq!(Reducer::Sum.reduce(empty), Some(0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reducer {
    /// Arithmetic sum; an empty set sums to zero.
    Sum,
    /// Largest item value; an empty set has no value.
    Max,
    /// Smallest item value; an empty set has no value.
    Min,
}

impl Reducer {
    /// Fold item values. Items without a value are skipped.
    pub fn reduce<I>(self, values: I) -> Option<StatValue>
    where
        I: IntoIterator<Item = Option<StatValue>>,
    {
        let defined = values.into_iter().flatten();
        match self {
            Reducer::Sum => Some(defined.sum()),
            Reducer::Max => defined.reduce(StatValue::max),
            Reducer::Min => defined.reduce(StatValue::min),
        }
    }

    pub(crate) fn attr_type(self) -> AttrType {
        match self {
            Reducer::Sum => AttrType::Sum,
            Reducer::Max => AttrType::Max,
            Reducer::Min => AttrType::Min,
        }
    }
}

impl Sheet {
    /// Create an aggregate over `items`.
    ///
    /// Duplicate handles in `items` are added once. The aggregate does not
    /// own the items.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statsheet::{Reducer, Sheet};
    ///
    /// let mut sheet = Sheet::new();
    /// let fort = sheet.create_scalar("Fortitude", 9.0);
    /// let reflex = sheet.create_scalar("Reflex", 12.0);
    /// let will = sheet.create_scalar("Will", 7.0);
    ///
    /// let best = sheet
    ///     .create_aggregate("Best save", Reducer::Max, &[fort, reflex, will])
    ///     .unwrap();
    /// assert_eq!(sheet.value(best).unwrap(), 12.0);
    /// ```
    pub fn create_aggregate(
        &mut self,
        name: impl Into<AttrName>,
        reducer: Reducer,
        items: &[NodeId],
    ) -> Result<NodeId, AttrError> {
        for &item in items {
            self.node(item)?;
        }
        let aggregate = self.insert(Node::new(
            name.into(),
            AttrKind::Aggregate(AggregateState {
                pin: Pin::default(),
                reducer,
                items: Vec::new(),
            }),
        ));
        for &item in items {
            self.attach_item(aggregate, Link::borrowed(item))?;
        }
        self.refresh(aggregate);
        Ok(aggregate)
    }

    /// Create a sum over `items`.
    pub fn create_sum(&mut self, name: impl Into<AttrName>, items: &[NodeId]) -> Result<NodeId, AttrError> {
        self.create_aggregate(name, Reducer::Sum, items)
    }

    /// Create a maximum over `items`.
    pub fn create_max(&mut self, name: impl Into<AttrName>, items: &[NodeId]) -> Result<NodeId, AttrError> {
        self.create_aggregate(name, Reducer::Max, items)
    }

    /// Create a minimum over `items`.
    pub fn create_min(&mut self, name: impl Into<AttrName>, items: &[NodeId]) -> Result<NodeId, AttrError> {
        self.create_aggregate(name, Reducer::Min, items)
    }

    /// The reducer of an aggregate.
    pub fn reducer(&self, aggregate: NodeId) -> Result<Reducer, AttrError> {
        Ok(self.aggregate_state(aggregate)?.reducer)
    }

    /// Items of an aggregate, in insertion order.
    pub fn items(&self, aggregate: NodeId) -> Result<Vec<NodeId>, AttrError> {
        Ok(self
            .aggregate_state(aggregate)?
            .items
            .iter()
            .map(|link| link.id)
            .collect())
    }

    /// Whether `item` is in the aggregate's item set.
    pub fn has_item(&self, aggregate: NodeId, item: NodeId) -> Result<bool, AttrError> {
        Ok(self
            .aggregate_state(aggregate)?
            .items
            .iter()
            .any(|link| link.id == item))
    }

    /// Add `item` to the aggregate.
    ///
    /// Returns `false` if it was already present. Fails with
    /// `CircularDependency` if the item (transitively) depends on the
    /// aggregate.
    pub fn add_item(&mut self, aggregate: NodeId, item: NodeId) -> Result<bool, AttrError> {
        self.insert_item(aggregate, Link::borrowed(item))
    }

    /// Add `item` to the aggregate and hand ownership of it over.
    ///
    /// An owned item is destroyed when it is removed from the aggregate or
    /// when the aggregate is destroyed. Adopting an item that is already
    /// present marks it owned and returns `false`.
    pub fn adopt_item(&mut self, aggregate: NodeId, item: NodeId) -> Result<bool, AttrError> {
        self.insert_item(aggregate, Link::owned(item))
    }

    /// Remove `item` from the aggregate.
    ///
    /// Returns `false` if it was not present. Owned items are destroyed.
    pub fn remove_item(&mut self, aggregate: NodeId, item: NodeId) -> Result<bool, AttrError> {
        let link = match self
            .aggregate_state(aggregate)?
            .items
            .iter()
            .find(|link| link.id == item)
        {
            Some(link) => *link,
            None => return Ok(false),
        };
        if link.owned {
            // destruction detaches it from every aggregate, this one included
            self.remove(item)?;
            return Ok(true);
        }
        self.aggregate_state_mut(aggregate)?
            .items
            .retain(|l| l.id != item);
        self.graph.unlink(aggregate, item);
        self.update(aggregate)?;
        Ok(true)
    }

    fn insert_item(&mut self, aggregate: NodeId, link: Link) -> Result<bool, AttrError> {
        self.node(link.id)?;
        let state = self.aggregate_state_mut(aggregate)?;
        if let Some(existing) = state.items.iter_mut().find(|l| l.id == link.id) {
            existing.owned |= link.owned;
            return Ok(false);
        }
        self.attach_item(aggregate, link)?;
        self.update(aggregate)?;
        Ok(true)
    }

    /// Link and record an item without recomputing.
    fn attach_item(&mut self, aggregate: NodeId, link: Link) -> Result<(), AttrError> {
        if self.has_item(aggregate, link.id)? {
            return Ok(());
        }
        self.link(aggregate, link.id)?;
        self.aggregate_state_mut(aggregate)?.items.push(link);
        Ok(())
    }

    pub(crate) fn aggregate_state(&self, id: NodeId) -> Result<&AggregateState, AttrError> {
        self.state(id, "an aggregate", AttrKind::as_aggregate)
    }

    pub(crate) fn aggregate_state_mut(&mut self, id: NodeId) -> Result<&mut AggregateState, AttrError> {
        self.state_mut(id, "an aggregate", AttrKind::as_aggregate_mut)
    }
}
