//! Sheet module.
//!
//! Provides the `Sheet` type, the main entry point of the engine. A sheet
//! owns every attribute, the dependency edges between them and the
//! subscribers watching them, and it runs change propagation.

use crate::error::AttrError;
use crate::graph::DependencyGraph;
use crate::name::AttrName;
use crate::node::{AttrKind, AttrType, Node, NodeId};
use crate::numeric::{format_value, StatValue};
use crate::subscriber::{ChangeEvent, Subscriber, SubscriberId};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// What an explicit update does at its origin.
///
/// Every node downstream of the origin always gets a full update; the
/// flags only shape what happens to the origin itself.
///
/// # Examples
///
/// ```rust
/// use statsheet::{Sheet, UpdateFlags};
///
/// let mut sheet = Sheet::new();
/// let hp = sheet.create_scalar("HP", 10.0);
///
/// // recompute quietly, without waking subscribers or dependents
/// let quiet = UpdateFlags { propagate: false, callbacks: false, ..UpdateFlags::default() };
/// sheet.update_with(hp, quiet).unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateFlags {
    /// Carry the update on to everything that depends on the origin.
    pub propagate: bool,
    /// Notify the origin's subscribers.
    pub callbacks: bool,
    /// Recompute the origin's cached value.
    pub recompute: bool,
}

impl Default for UpdateFlags {
    fn default() -> Self {
        Self {
            propagate: true,
            callbacks: true,
            recompute: true,
        }
    }
}

/// A character sheet: an arena of attributes wired into a dependency DAG.
///
/// Every mutation propagates inline: when a call returns, every attribute
/// that (transitively) depends on what changed has been recomputed, each
/// exactly once, dependencies before dependents.
///
/// # Examples
///
/// ```rust
/// use statsheet::Sheet;
///
/// let mut sheet = Sheet::new();
/// let base = sheet.create_scalar("Strength", 5.0);
/// let offset = sheet.create_scalar("Rage", 2.0);
/// let total = sheet.modifier("Strength modifier").base(base).offset(offset).build().unwrap();
///
/// assert_eq!(sheet.value(total).unwrap(), 7.0);
///
/// sheet.set_value(offset, 3.0).unwrap();
/// assert_eq!(sheet.value(total).unwrap(), 8.0);
/// ```
#[derive(Debug, Default)]
pub struct Sheet {
    pub(crate) graph: DependencyGraph,
    /// Nesting depth of open batches.
    batch_depth: u32,
    /// Update origins queued by the open batch.
    pending: Vec<NodeId>,
}

impl Sheet {
    /// Create an empty sheet.
    pub fn new() -> Self {
        Self {
            graph: DependencyGraph::new(),
            batch_depth: 0,
            pending: Vec::new(),
        }
    }

    /// Create a plain stored number.
    pub fn create_scalar(&mut self, name: impl Into<AttrName>, value: StatValue) -> NodeId {
        self.insert(Node::scalar(name, value))
    }

    /// Current value of an attribute.
    ///
    /// # Errors
    ///
    /// `NoItems` when the attribute has no value, which happens for an
    /// empty max/min and for anything computed from one.
    pub fn value(&self, id: NodeId) -> Result<StatValue, AttrError> {
        let node = self.node(id)?;
        node.cache.ok_or_else(|| AttrError::NoItems(node.name.clone()))
    }

    /// Assign a value.
    ///
    /// A scalar stores it. Every formula-driven kind pins it and becomes
    /// overridden. A unit proxy converts it and writes it to its source.
    pub fn set_value(&mut self, id: NodeId, value: StatValue) -> Result<(), AttrError> {
        if !value.is_finite() {
            return Err(AttrError::InvalidValue(format!(
                "{value} is not a finite number"
            )));
        }
        let forward = match &mut self.node_mut(id)?.kind {
            AttrKind::Scalar { value: stored } => {
                *stored = value;
                None
            }
            AttrKind::UnitProxy(proxy) => {
                Some((proxy.source.id, proxy.conversion.to_source(value)))
            }
            kind => {
                if let Some(pin) = kind.pin_mut() {
                    pin.value = value;
                    pin.overridden = true;
                }
                None
            }
        };
        match forward {
            Some((source, raw)) => self.set_value(source, raw),
            None => self.update(id),
        }
    }

    /// Whether the attribute is pinned to a manual value.
    ///
    /// Scalars and unit proxies are never overridden.
    pub fn overridden(&self, id: NodeId) -> Result<bool, AttrError> {
        Ok(self
            .node(id)?
            .kind
            .pin()
            .map(|pin| pin.overridden)
            .unwrap_or(false))
    }

    /// Pin or un-pin an attribute.
    ///
    /// Setting the flag it already has does nothing, not even an update.
    /// Un-pinning restores formula-driven behaviour.
    pub fn set_override(&mut self, id: NodeId, overridden: bool) -> Result<(), AttrError> {
        let node = self.node_mut(id)?;
        let (name, found) = (node.name.clone(), node.attr_type());
        let pin = node.kind.pin_mut().ok_or(AttrError::AttrTypeMismatch {
            name,
            expected: "an overridable attribute",
            found,
        })?;
        if pin.overridden == overridden {
            return Ok(());
        }
        pin.overridden = overridden;
        self.update(id)
    }

    /// Flip the override flag.
    pub fn toggle_override(&mut self, id: NodeId) -> Result<(), AttrError> {
        let current = self.overridden(id)?;
        self.set_override(id, !current)
    }

    /// Display label of an attribute.
    pub fn name(&self, id: NodeId) -> Result<&AttrName, AttrError> {
        Ok(&self.node(id)?.name)
    }

    /// Change an attribute's label. Labels are not unique keys.
    pub fn rename(&mut self, id: NodeId, name: impl Into<AttrName>) -> Result<(), AttrError> {
        self.node_mut(id)?.name = name.into();
        Ok(())
    }

    /// Kind tag of an attribute.
    pub fn attr_type(&self, id: NodeId) -> Result<AttrType, AttrError> {
        Ok(self.node(id)?.attr_type())
    }

    /// Human-readable form of an attribute.
    ///
    /// Modifiers render as `value,base,offset,flag`, the same form string
    /// assignment accepts; options render as their description; everything
    /// else renders its value.
    pub fn display(&self, id: NodeId) -> Result<String, AttrError> {
        match &self.node(id)?.kind {
            AttrKind::Modifier(_) => self.modifier_display(id),
            AttrKind::Option(option) => Ok(option.description.clone()),
            _ => self.value(id).map(format_value),
        }
    }

    /// First attribute carrying `name`, in creation order.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.graph
            .ids()
            .into_iter()
            .find(|&id| self.graph.get(id).map(|n| n.name.as_str() == name).unwrap_or(false))
    }

    /// Every live attribute, in creation order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.graph.ids()
    }

    /// Number of live attributes.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Whether the sheet holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.graph.len() == 0
    }

    /// Whether `id` refers to a live attribute.
    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains(id)
    }

    /// Record that `dependent` must recompute whenever `dependency` changes.
    ///
    /// Returns `false` without adding an edge if `dependent` already
    /// depends on `dependency`, directly or through a chain. Adding an edge
    /// does not run an update.
    ///
    /// # Errors
    ///
    /// `CircularDependency` if `dependency` already (transitively) depends
    /// on `dependent`, including the self edge. The graph is unchanged.
    pub fn add_dependency(&mut self, dependent: NodeId, dependency: NodeId) -> Result<bool, AttrError> {
        self.node(dependent)?;
        self.node(dependency)?;
        if self.graph.depends_on(dependent, dependency, true) {
            return Ok(false);
        }
        self.link(dependent, dependency)
    }

    /// Drop the edge between `dependent` and `dependency`.
    ///
    /// Returns `false` if there was no such edge. Cutting an aggregate off
    /// one of its items removes the item, the same as
    /// [`remove_item`](Sheet::remove_item).
    ///
    /// # Errors
    ///
    /// `StructuralDependency` if the edge is a modifier's base/offset or a
    /// unit proxy's source.
    pub fn remove_dependency(&mut self, dependent: NodeId, dependency: NodeId) -> Result<bool, AttrError> {
        self.node(dependency)?;
        let node = self.node(dependent)?;
        if !self.graph.has_edge(dependent, dependency) {
            return Ok(false);
        }
        if node.kind.is_built_on(dependency) {
            return Err(AttrError::StructuralDependency {
                dependent: node.name.clone(),
                dependency: self.graph_name(dependency),
            });
        }
        if let Some(aggregate) = node.kind.as_aggregate() {
            if aggregate.items.iter().any(|link| link.id == dependency) {
                return self.remove_item(dependent, dependency);
            }
        }
        self.graph.unlink(dependent, dependency);
        debug!(
            dependent = %self.graph_name(dependent),
            dependency = %self.graph_name(dependency),
            "dependency removed"
        );
        Ok(true)
    }

    /// Whether `dependent` depends on `dependency`, directly or, when
    /// `recursive`, through any chain.
    pub fn has_dependency(&self, dependent: NodeId, dependency: NodeId, recursive: bool) -> Result<bool, AttrError> {
        self.node(dependent)?;
        self.node(dependency)?;
        Ok(self.graph.depends_on(dependent, dependency, recursive))
    }

    /// Attributes `id` reads from.
    pub fn dependencies(&self, id: NodeId) -> Result<Vec<NodeId>, AttrError> {
        self.node(id)?;
        Ok(self.graph.dependencies(id))
    }

    /// Attributes that read from `id`.
    pub fn dependents(&self, id: NodeId) -> Result<Vec<NodeId>, AttrError> {
        self.node(id)?;
        Ok(self.graph.dependents(id))
    }

    /// Register a subscriber. Returns `false` if that subscriber handle is
    /// already registered on the attribute.
    pub fn add_callback(&mut self, id: NodeId, subscriber: Subscriber) -> Result<bool, AttrError> {
        let node = self.node_mut(id)?;
        if node.subscribers.iter().any(|s| s.id() == subscriber.id()) {
            return Ok(false);
        }
        node.subscribers.push(subscriber);
        Ok(true)
    }

    /// Unregister a subscriber. Returns `false` if it was not registered.
    pub fn remove_callback(&mut self, id: NodeId, subscriber: SubscriberId) -> Result<bool, AttrError> {
        let node = self.node_mut(id)?;
        let before = node.subscribers.len();
        node.subscribers.retain(|s| s.id() != subscriber);
        Ok(node.subscribers.len() != before)
    }

    /// Suppress updates of an attribute until a matching
    /// [`unpause`](Sheet::unpause). Pauses nest.
    pub fn pause(&mut self, id: NodeId) -> Result<(), AttrError> {
        self.node_mut(id)?.pause_depth += 1;
        Ok(())
    }

    /// Undo one [`pause`](Sheet::pause).
    ///
    /// When the last pause is lifted and an update was suppressed in the
    /// meantime, exactly one catch-up update runs.
    pub fn unpause(&mut self, id: NodeId) -> Result<(), AttrError> {
        let node = self.node_mut(id)?;
        if node.pause_depth == 0 {
            return Ok(());
        }
        node.pause_depth -= 1;
        if node.pause_depth > 0 || !node.suppressed {
            return Ok(());
        }
        node.suppressed = false;
        trace!(node = %node.name, "catching up after pause");
        self.update(id)
    }

    /// Whether at least one pause is in effect.
    pub fn is_paused(&self, id: NodeId) -> Result<bool, AttrError> {
        Ok(self.node(id)?.is_paused())
    }

    /// Recompute an attribute, notify its subscribers and propagate.
    pub fn update(&mut self, id: NodeId) -> Result<(), AttrError> {
        self.update_with(id, UpdateFlags::default())
    }

    /// Update with explicit control over the origin.
    ///
    /// A paused attribute defers the call to its unpause; a stored value
    /// (scalar, option, active pin) is still readable right away. Inside a [`batch`](Sheet::batch) only the origin is
    /// recomputed at once; notification and propagation are queued and run
    /// as a full update when the outermost batch closes.
    pub fn update_with(&mut self, id: NodeId, flags: UpdateFlags) -> Result<(), AttrError> {
        let node = self.node_mut(id)?;
        if node.is_paused() {
            node.suppressed = true;
            trace!(node = %node.name, "update suppressed while paused");
            // a stored value is readable at once; only the cascade waits
            if flags.recompute && node.kind.is_self_valued() {
                self.refresh(id);
            }
            return Ok(());
        }
        if self.batch_depth > 0 {
            if flags.recompute {
                self.refresh(id);
            }
            if !self.pending.contains(&id) {
                self.pending.push(id);
            }
            return Ok(());
        }
        self.run(&[id], Some((id, flags)));
        Ok(())
    }

    /// Run `f` with propagation deferred.
    ///
    /// Updates requested inside are collected; when the outermost batch
    /// returns, everything they affect is recomputed once, in dependency
    /// order, so dependents never observe a half-applied write.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statsheet::Sheet;
    ///
    /// let mut sheet = Sheet::new();
    /// let a = sheet.create_scalar("a", 1.0);
    /// let b = sheet.create_scalar("b", 2.0);
    /// let sum = sheet.create_sum("a + b", &[a, b]).unwrap();
    ///
    /// sheet
    ///     .batch(|sheet| {
    ///         sheet.set_value(a, 10.0)?;
    ///         sheet.set_value(b, 20.0)?;
    ///         // not recomputed yet
    ///         assert_eq!(sheet.value(sum)?, 3.0);
    ///         Ok::<_, statsheet::AttrError>(())
    ///     })
    ///     .unwrap();
    /// assert_eq!(sheet.value(sum).unwrap(), 30.0);
    /// ```
    pub fn batch<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.batch_depth += 1;
        let out = f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 && !self.pending.is_empty() {
            let origins = std::mem::take(&mut self.pending);
            debug!(origins = origins.len(), "flushing batch");
            self.run(&origins, None);
        }
        out
    }

    /// Destroy an attribute together with everything it owns.
    ///
    /// Aggregates holding a destroyed attribute as an item drop it and
    /// recompute.
    ///
    /// # Errors
    ///
    /// `InUse` if an attribute outside the destroyed set is built on one
    /// inside it (as a modifier's base/offset or a proxy's source).
    pub fn remove(&mut self, id: NodeId) -> Result<(), AttrError> {
        self.node(id)?;
        let doomed = self.owned_closure(id);
        self.check_unused(&doomed, None)?;

        let mut touched = BTreeSet::new();
        for &gone in &doomed {
            for dependent in self.graph.dependents(gone) {
                if doomed.contains(&dependent) {
                    continue;
                }
                if let Some(aggregate) = self
                    .graph
                    .get_mut(dependent)
                    .and_then(|node| node.kind.as_aggregate_mut())
                {
                    aggregate.items.retain(|link| link.id != gone);
                }
                touched.insert(dependent);
            }
        }

        for gone in doomed {
            if let Some(node) = self.graph.remove(gone) {
                debug!(node = %node.name, id = %gone, "attribute destroyed");
            }
        }
        self.pending.retain(|id| self.graph.contains(*id));

        self.batch(|sheet| -> Result<(), AttrError> {
            for dependent in touched {
                sheet.update(dependent)?;
            }
            Ok(())
        })
    }

    /// Fail with `InUse` unless `id` could be destroyed once `detaching`
    /// lets go of it.
    pub(crate) fn check_removable(&self, id: NodeId, detaching: NodeId) -> Result<(), AttrError> {
        self.node(id)?;
        self.check_unused(&self.owned_closure(id), Some(detaching))
    }

    fn check_unused(&self, doomed: &BTreeSet<NodeId>, detaching: Option<NodeId>) -> Result<(), AttrError> {
        for &gone in doomed {
            for dependent in self.graph.dependents(gone) {
                if doomed.contains(&dependent) || Some(dependent) == detaching {
                    continue;
                }
                if self.node(dependent)?.kind.is_built_on(gone) {
                    return Err(AttrError::InUse {
                        name: self.graph_name(gone),
                        by: self.graph_name(dependent),
                    });
                }
            }
        }
        Ok(())
    }

    /// `id` plus everything it owns, transitively.
    fn owned_closure(&self, id: NodeId) -> BTreeSet<NodeId> {
        let mut doomed = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if !doomed.insert(next) {
                continue;
            }
            if let Some(node) = self.graph.get(next) {
                stack.extend(
                    node.kind
                        .links()
                        .into_iter()
                        .filter(|link| link.owned)
                        .map(|link| link.id),
                );
            }
        }
        doomed
    }

    /// Recompute and notify everything affected by `origins`.
    fn run(&mut self, origins: &[NodeId], origin: Option<(NodeId, UpdateFlags)>) {
        let local = origin.filter(|(_, flags)| !flags.propagate).map(|(id, _)| id);
        let plan = match local {
            Some(id) => crate::graph::Propagation {
                order: vec![id],
                held: Vec::new(),
            },
            None => self.graph.plan(origins),
        };

        for &held in &plan.held {
            if let Some(node) = self.graph.get_mut(held) {
                node.suppressed = true;
            }
        }
        trace!(
            order = ?plan.order.iter().map(|&id| self.graph_name(id)).collect::<Vec<_>>(),
            "propagating"
        );

        for id in plan.order {
            let flags = match origin {
                Some((origin_id, flags)) if origin_id == id => flags,
                _ => UpdateFlags::default(),
            };
            if flags.recompute {
                self.refresh(id);
            }
            if flags.callbacks {
                self.notify(id);
            }
        }
    }

    /// Recompute the cached value of `id` from its inputs' caches.
    pub(crate) fn refresh(&mut self, id: NodeId) {
        let value = match self.graph.get(id) {
            Some(node) => node
                .kind
                .compute(|input| self.graph.get(input).and_then(|n| n.cache)),
            None => return,
        };
        if let Some(node) = self.graph.get_mut(id) {
            node.cache = value;
        }
    }

    fn notify(&self, id: NodeId) {
        let Some(node) = self.graph.get(id) else {
            return;
        };
        if node.subscribers.is_empty() {
            return;
        }
        let event = ChangeEvent {
            node: id,
            name: node.name.clone(),
            value: node.cache,
        };
        for subscriber in &node.subscribers {
            subscriber.notify(&event);
        }
    }

    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        let name = node.name.clone();
        let id = self.graph.insert(node);
        trace!(node = %name, id = %id, "attribute created");
        id
    }

    /// Add a dependency edge, naming the cycle on failure.
    pub(crate) fn link(&mut self, dependent: NodeId, dependency: NodeId) -> Result<bool, AttrError> {
        self.node(dependent)?;
        self.node(dependency)?;
        match self.graph.link(dependent, dependency) {
            Ok(added) => {
                if added {
                    debug!(
                        dependent = %self.graph_name(dependent),
                        dependency = %self.graph_name(dependency),
                        "dependency added"
                    );
                }
                Ok(added)
            }
            Err(cycle) => {
                let path: Vec<AttrName> = cycle.into_iter().map(|id| self.graph_name(id)).collect();
                debug!(path = ?path, "rejected circular dependency");
                Err(AttrError::CircularDependency { path })
            }
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node, AttrError> {
        self.graph.get(id).ok_or(AttrError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, AttrError> {
        self.graph.get_mut(id).ok_or(AttrError::UnknownNode(id))
    }

    /// Name for messages; falls back to the handle for dead nodes.
    pub(crate) fn graph_name(&self, id: NodeId) -> AttrName {
        match self.graph.get(id) {
            Some(node) => node.name.clone(),
            None => AttrName::from(id.to_string()),
        }
    }

    pub(crate) fn type_mismatch(&self, id: NodeId, expected: &'static str) -> AttrError {
        match self.graph.get(id) {
            Some(node) => AttrError::AttrTypeMismatch {
                name: node.name.clone(),
                expected,
                found: node.attr_type(),
            },
            None => AttrError::UnknownNode(id),
        }
    }

    /// Borrow the variant state of `id`, or fail with a type mismatch.
    pub(crate) fn state<T>(
        &self,
        id: NodeId,
        expected: &'static str,
        pick: fn(&AttrKind) -> Option<&T>,
    ) -> Result<&T, AttrError> {
        let node = self.node(id)?;
        pick(&node.kind).ok_or_else(|| self.type_mismatch(id, expected))
    }

    pub(crate) fn state_mut<T>(
        &mut self,
        id: NodeId,
        expected: &'static str,
        pick: fn(&mut AttrKind) -> Option<&mut T>,
    ) -> Result<&mut T, AttrError> {
        let node = self.node_mut(id)?;
        let (name, found) = (node.name.clone(), node.kind.attr_type());
        pick(&mut node.kind).ok_or(AttrError::AttrTypeMismatch {
            name,
            expected,
            found,
        })
    }
}
