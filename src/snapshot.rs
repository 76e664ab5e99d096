//! Read-layer snapshots.
//!
//! Contains the `AttrSnapshot` type, a detached copy of one attribute's
//! state with its edges, for display layers and debugging.

use crate::error::AttrError;
use crate::name::AttrName;
use crate::node::{AttrType, NodeId};
use crate::numeric::StatValue;
use crate::sheet::Sheet;
use serde::{Deserialize, Serialize};

/// A detached view of one attribute.
///
/// Read-only and serializable; holds no borrow of the sheet.
///
/// # Examples
///
/// ```rust
/// use statsheet::{AttrType, Sheet};
///
/// let mut sheet = Sheet::new();
/// let str_score = sheet.create_scalar("STR", 3.0);
/// let attack = sheet.modifier("Attack").base(str_score).build().unwrap();
///
/// let snap = sheet.snapshot(attack).unwrap();
/// assert_eq!(snap.attr_type, AttrType::Modifier);
/// assert_eq!(snap.value, Some(3.0));
/// assert!(snap.dependencies.contains(&str_score));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttrSnapshot {
    pub id: NodeId,
    pub name: AttrName,
    pub attr_type: AttrType,

    /// Current value, `None` when the attribute has no value.
    pub value: Option<StatValue>,

    /// Always `false` for kinds that cannot be pinned.
    pub overridden: bool,

    /// Attributes this one reads from.
    pub dependencies: Vec<NodeId>,

    /// Attributes reading from this one.
    pub dependents: Vec<NodeId>,

    /// Options of a conditional modifier, in order; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSnapshot>,
}

/// One option of a conditional modifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionSnapshot {
    pub id: NodeId,
    pub amount: StatValue,
    pub description: String,
    pub selected: bool,
}

impl Sheet {
    /// Take a snapshot of one attribute.
    pub fn snapshot(&self, id: NodeId) -> Result<AttrSnapshot, AttrError> {
        let node = self.node(id)?;
        let options = if node.attr_type() == AttrType::ConditionalModifier {
            self.options(id)?
                .into_iter()
                .map(|option| self.option_snapshot(option))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        Ok(AttrSnapshot {
            id,
            name: node.name.clone(),
            attr_type: node.attr_type(),
            value: node.cache,
            overridden: self.overridden(id)?,
            dependencies: self.dependencies(id)?,
            dependents: self.dependents(id)?,
            options,
        })
    }

    /// Snapshot every attribute, in creation order.
    pub fn snapshots(&self) -> Vec<AttrSnapshot> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.snapshot(id).ok())
            .collect()
    }

    /// Export the whole sheet as pretty-printed JSON.
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshots())
    }

    fn option_snapshot(&self, option: NodeId) -> Result<OptionSnapshot, AttrError> {
        let state = self.option_state(option)?;
        Ok(OptionSnapshot {
            id: option,
            amount: state.amount,
            description: state.description.clone(),
            selected: state.selected,
        })
    }
}
