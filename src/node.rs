//! Arena records for sheet attributes.
//!
//! Every attribute is one `Node` stored in the sheet's dependency graph.
//! The numeric policy of a node is one of a small closed set of variants
//! (`AttrKind`); policies compose by holding `Link`s to other nodes rather
//! than by layering.

use crate::aggregate::Reducer;
use crate::name::AttrName;
use crate::numeric::StatValue;
use crate::subscriber::Subscriber;
use crate::unit::UnitConversion;
use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Handle to an attribute living in a [`Sheet`](crate::Sheet).
///
/// Handles are cheap to copy. A handle outlives the attribute it names:
/// once the attribute is removed, operations on the handle fail with
/// [`AttrError::UnknownNode`](crate::AttrError::UnknownNode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) NodeIndex);

impl NodeId {
    /// Raw arena index, useful for logging and stable ordering.
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.0.index() as u32)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = u32::deserialize(deserializer)?;
        Ok(NodeId(NodeIndex::new(raw as usize)))
    }
}

/// The kind of an attribute, as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    /// A plain stored number.
    Scalar,
    /// `base + offset` unless overridden.
    Modifier,
    /// A modifier whose offset is the sum of toggleable options.
    ConditionalModifier,
    /// Sum of a dynamic item set.
    Sum,
    /// Maximum of a dynamic item set.
    Max,
    /// Minimum of a dynamic item set.
    Min,
    /// A labeled, toggleable contribution to a conditional modifier.
    Option,
    /// A unit-converting view of another attribute.
    UnitProxy,
}

impl std::fmt::Display for AttrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AttrType::Scalar => "scalar",
            AttrType::Modifier => "modifier",
            AttrType::ConditionalModifier => "conditional modifier",
            AttrType::Sum => "sum",
            AttrType::Max => "max",
            AttrType::Min => "min",
            AttrType::Option => "option",
            AttrType::UnitProxy => "unit proxy",
        };
        f.write_str(label)
    }
}

/// Override state shared by every formula-driven kind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Pin {
    pub(crate) overridden: bool,
    pub(crate) value: StatValue,
}

impl Pin {
    pub(crate) fn from_initial(pinned: Option<StatValue>) -> Self {
        match pinned {
            Some(value) => Self {
                overridden: true,
                value,
            },
            None => Self::default(),
        }
    }
}

/// A structural reference to another node, with ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) id: NodeId,
    pub(crate) owned: bool,
}

impl Link {
    pub(crate) fn owned(id: NodeId) -> Self {
        Self { id, owned: true }
    }

    pub(crate) fn borrowed(id: NodeId) -> Self {
        Self { id, owned: false }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ModifierState {
    pub(crate) pin: Pin,
    pub(crate) base: Link,
    pub(crate) offset: Link,
    /// The offset is an internal sum of options.
    pub(crate) conditional: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct AggregateState {
    pub(crate) pin: Pin,
    pub(crate) reducer: Reducer,
    pub(crate) items: Vec<Link>,
}

#[derive(Debug, Clone)]
pub(crate) struct OptionState {
    pub(crate) pin: Pin,
    pub(crate) amount: StatValue,
    pub(crate) description: String,
    pub(crate) selected: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ProxyState {
    pub(crate) source: Link,
    pub(crate) conversion: UnitConversion,
}

/// Numeric policy of a node.
#[derive(Debug, Clone)]
pub(crate) enum AttrKind {
    Scalar { value: StatValue },
    Modifier(ModifierState),
    Aggregate(AggregateState),
    Option(OptionState),
    UnitProxy(ProxyState),
}

impl AttrKind {
    pub(crate) fn attr_type(&self) -> AttrType {
        match self {
            AttrKind::Scalar { .. } => AttrType::Scalar,
            AttrKind::Modifier(m) if m.conditional => AttrType::ConditionalModifier,
            AttrKind::Modifier(_) => AttrType::Modifier,
            AttrKind::Aggregate(a) => a.reducer.attr_type(),
            AttrKind::Option(_) => AttrType::Option,
            AttrKind::UnitProxy(_) => AttrType::UnitProxy,
        }
    }

    pub(crate) fn pin(&self) -> Option<&Pin> {
        match self {
            AttrKind::Modifier(m) => Some(&m.pin),
            AttrKind::Aggregate(a) => Some(&a.pin),
            AttrKind::Option(o) => Some(&o.pin),
            AttrKind::Scalar { .. } | AttrKind::UnitProxy(_) => None,
        }
    }

    pub(crate) fn pin_mut(&mut self) -> Option<&mut Pin> {
        match self {
            AttrKind::Modifier(m) => Some(&mut m.pin),
            AttrKind::Aggregate(a) => Some(&mut a.pin),
            AttrKind::Option(o) => Some(&mut o.pin),
            AttrKind::Scalar { .. } | AttrKind::UnitProxy(_) => None,
        }
    }

    pub(crate) fn as_modifier(&self) -> Option<&ModifierState> {
        match self {
            AttrKind::Modifier(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn as_modifier_mut(&mut self) -> Option<&mut ModifierState> {
        match self {
            AttrKind::Modifier(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn as_aggregate(&self) -> Option<&AggregateState> {
        match self {
            AttrKind::Aggregate(a) => Some(a),
            _ => None,
        }
    }

    pub(crate) fn as_aggregate_mut(&mut self) -> Option<&mut AggregateState> {
        match self {
            AttrKind::Aggregate(a) => Some(a),
            _ => None,
        }
    }

    pub(crate) fn as_option(&self) -> Option<&OptionState> {
        match self {
            AttrKind::Option(o) => Some(o),
            _ => None,
        }
    }

    pub(crate) fn as_option_mut(&mut self) -> Option<&mut OptionState> {
        match self {
            AttrKind::Option(o) => Some(o),
            _ => None,
        }
    }

    pub(crate) fn as_proxy(&self) -> Option<&ProxyState> {
        match self {
            AttrKind::UnitProxy(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn as_proxy_mut(&mut self) -> Option<&mut ProxyState> {
        match self {
            AttrKind::UnitProxy(p) => Some(p),
            _ => None,
        }
    }

    /// Every node this one references structurally, items included.
    pub(crate) fn links(&self) -> Vec<Link> {
        match self {
            AttrKind::Scalar { .. } | AttrKind::Option(_) => Vec::new(),
            AttrKind::Modifier(m) => vec![m.base, m.offset],
            AttrKind::Aggregate(a) => a.items.clone(),
            AttrKind::UnitProxy(p) => vec![p.source],
        }
    }

    /// Whether `id` is a fixed part of this node (not a removable item).
    pub(crate) fn is_built_on(&self, id: NodeId) -> bool {
        match self {
            AttrKind::Modifier(m) => m.base.id == id || m.offset.id == id,
            AttrKind::UnitProxy(p) => p.source.id == id,
            _ => false,
        }
    }

    /// Whether the value is held by the node itself rather than computed
    /// from its inputs: a scalar, an option or an active pin.
    pub(crate) fn is_self_valued(&self) -> bool {
        match self {
            AttrKind::Scalar { .. } | AttrKind::Option(_) => true,
            kind => kind.pin().map(|pin| pin.overridden).unwrap_or(false),
        }
    }

    /// Evaluate the formula, reading inputs through `read`.
    ///
    /// `None` means the node has no value (an empty max/min upstream).
    pub(crate) fn compute<F>(&self, read: F) -> Option<StatValue>
    where
        F: Fn(NodeId) -> Option<StatValue>,
    {
        if let Some(pin) = self.pin() {
            if pin.overridden {
                return Some(pin.value);
            }
        }
        match self {
            AttrKind::Scalar { value } => Some(*value),
            AttrKind::Modifier(m) => Some(read(m.base.id)? + read(m.offset.id)?),
            AttrKind::Aggregate(a) => a.reducer.reduce(a.items.iter().map(|l| read(l.id))),
            AttrKind::Option(o) => Some(if o.selected { o.amount } else { 0.0 }),
            AttrKind::UnitProxy(p) => read(p.source.id).map(|v| p.conversion.from_source(v)),
        }
    }
}

/// One attribute in the arena.
pub(crate) struct Node {
    pub(crate) name: AttrName,
    pub(crate) kind: AttrKind,
    /// Value as of the last recompute.
    pub(crate) cache: Option<StatValue>,
    pub(crate) pause_depth: u32,
    /// An update arrived while paused.
    pub(crate) suppressed: bool,
    pub(crate) subscribers: Vec<Subscriber>,
}

impl Node {
    pub(crate) fn new(name: AttrName, kind: AttrKind) -> Self {
        let cache = match &kind {
            AttrKind::Scalar { value } => Some(*value),
            _ => None,
        };
        Self {
            name,
            kind,
            cache,
            pause_depth: 0,
            suppressed: false,
            subscribers: Vec::new(),
        }
    }

    pub(crate) fn scalar(name: impl Into<AttrName>, value: StatValue) -> Self {
        Self::new(name.into(), AttrKind::Scalar { value })
    }

    pub(crate) fn attr_type(&self) -> AttrType {
        self.kind.attr_type()
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.pause_depth > 0
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("cache", &self.cache)
            .field("pause_depth", &self.pause_depth)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> NodeId {
        NodeId(NodeIndex::new(i))
    }

    fn read_fixed(i: NodeId) -> Option<StatValue> {
        match i.index() {
            0 => Some(5.0),
            1 => Some(2.0),
            _ => None,
        }
    }

    #[test]
    fn test_modifier_formula() {
        let kind = AttrKind::Modifier(ModifierState {
            pin: Pin::default(),
            base: Link::borrowed(id(0)),
            offset: Link::borrowed(id(1)),
            conditional: false,
        });
        assert_eq!(kind.compute(read_fixed), Some(7.0));
        assert_eq!(kind.attr_type(), AttrType::Modifier);
    }

    #[test]
    fn test_pin_wins_over_formula() {
        let kind = AttrKind::Modifier(ModifierState {
            pin: Pin::from_initial(Some(99.0)),
            base: Link::borrowed(id(0)),
            offset: Link::borrowed(id(1)),
            conditional: true,
        });
        assert_eq!(kind.compute(read_fixed), Some(99.0));
        assert_eq!(kind.attr_type(), AttrType::ConditionalModifier);
    }

    #[test]
    fn test_missing_input_has_no_value() {
        let kind = AttrKind::Modifier(ModifierState {
            pin: Pin::default(),
            base: Link::borrowed(id(0)),
            offset: Link::borrowed(id(7)),
            conditional: false,
        });
        assert_eq!(kind.compute(read_fixed), None);
    }

    #[test]
    fn test_option_contributes_only_when_selected() {
        let mut kind = AttrKind::Option(OptionState {
            pin: Pin::default(),
            amount: -1.0,
            description: "penalty".into(),
            selected: false,
        });
        assert_eq!(kind.compute(read_fixed), Some(0.0));
        if let AttrKind::Option(o) = &mut kind {
            o.selected = true;
        }
        assert_eq!(kind.compute(read_fixed), Some(-1.0));
    }

    #[test]
    fn test_built_on() {
        let kind = AttrKind::UnitProxy(ProxyState {
            source: Link::owned(id(3)),
            conversion: UnitConversion::identity(),
        });
        assert!(kind.is_built_on(id(3)));
        assert!(!kind.is_built_on(id(4)));
        assert_eq!(kind.links(), vec![Link::owned(id(3))]);
    }

    #[test]
    fn test_self_valued_kinds() {
        assert!(AttrKind::Scalar { value: 1.0 }.is_self_valued());
        let mut kind = AttrKind::Modifier(ModifierState {
            pin: Pin::default(),
            base: Link::borrowed(id(0)),
            offset: Link::borrowed(id(1)),
            conditional: false,
        });
        assert!(!kind.is_self_valued());
        if let Some(pin) = kind.pin_mut() {
            pin.overridden = true;
        }
        assert!(kind.is_self_valued());
    }

    #[test]
    fn test_attr_type_display() {
        assert_eq!(AttrType::UnitProxy.to_string(), "unit proxy");
        assert_eq!(AttrType::Sum.to_string(), "sum");
    }
}
