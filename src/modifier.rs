//! Modifiers: `base + offset`, unless pinned.
//!
//! A modifier holds two structural links. Parts the caller does not supply
//! are created as owned zero-valued scalars and die with the modifier.

use crate::error::AttrError;
use crate::name::AttrName;
use crate::node::{AttrKind, Link, ModifierState, Node, NodeId, Pin};
use crate::numeric::{format_value, split_fields, StatValue};
use crate::sheet::Sheet;

/// Builder for modifiers.
///
/// Created by [`Sheet::modifier`].
///
/// # Examples
///
/// ```rust
/// use statsheet::Sheet;
///
/// let mut sheet = Sheet::new();
/// let level = sheet.create_scalar("Level", 3.0);
///
/// // own offset, shared base
/// let perception = sheet.modifier("Perception").base(level).build().unwrap();
/// sheet.set_offset(perception, 4.0).unwrap();
/// assert_eq!(sheet.value(perception).unwrap(), 7.0);
///
/// // starts pinned
/// let ac = sheet.modifier("AC").pinned(18.0).build().unwrap();
/// assert!(sheet.overridden(ac).unwrap());
/// assert_eq!(sheet.value(ac).unwrap(), 18.0);
/// ```
pub struct ModifierBuilder<'a> {
    sheet: &'a mut Sheet,
    name: AttrName,
    base: Option<NodeId>,
    offset: Option<NodeId>,
    pinned: Option<StatValue>,
}

impl<'a> ModifierBuilder<'a> {
    /// Read the base from an existing attribute instead of owning one.
    pub fn base(mut self, base: NodeId) -> Self {
        self.base = Some(base);
        self
    }

    /// Read the offset from an existing attribute instead of owning one.
    pub fn offset(mut self, offset: NodeId) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Start overridden at `value`.
    pub fn pinned(mut self, value: StatValue) -> Self {
        self.pinned = Some(value);
        self
    }

    pub fn build(self) -> Result<NodeId, AttrError> {
        let Self {
            sheet,
            name,
            base,
            offset,
            pinned,
        } = self;
        check_pinned(pinned)?;
        for given in [base, offset].into_iter().flatten() {
            sheet.node(given)?;
        }
        let base = sheet.part_link(&name, "base", base)?;
        let offset = sheet.part_link(&name, "offset", offset)?;
        sheet.insert_modifier(name, base, offset, Pin::from_initial(pinned), false)
    }
}

pub(crate) fn check_pinned(pinned: Option<StatValue>) -> Result<(), AttrError> {
    match pinned {
        Some(v) if !v.is_finite() => Err(AttrError::InvalidValue(format!(
            "{v} is not a finite number"
        ))),
        _ => Ok(()),
    }
}

/// Values read off a modifier in one go.
struct ModifierParts {
    value: StatValue,
    base: StatValue,
    offset: StatValue,
    overridden: bool,
}

impl Sheet {
    /// Start building a modifier named `name`.
    pub fn modifier(&mut self, name: impl Into<AttrName>) -> ModifierBuilder<'_> {
        ModifierBuilder {
            sheet: self,
            name: name.into(),
            base: None,
            offset: None,
            pinned: None,
        }
    }

    /// Value of the modifier's base.
    pub fn base(&self, modifier: NodeId) -> Result<StatValue, AttrError> {
        self.value(self.base_node(modifier)?)
    }

    /// Value of the modifier's offset.
    pub fn offset(&self, modifier: NodeId) -> Result<StatValue, AttrError> {
        self.value(self.offset_node(modifier)?)
    }

    /// The attribute serving as the modifier's base.
    pub fn base_node(&self, modifier: NodeId) -> Result<NodeId, AttrError> {
        Ok(self.modifier_state(modifier)?.base.id)
    }

    /// The attribute serving as the modifier's offset.
    pub fn offset_node(&self, modifier: NodeId) -> Result<NodeId, AttrError> {
        Ok(self.modifier_state(modifier)?.offset.id)
    }

    /// Write `value` through to the base, if it differs.
    pub fn set_base(&mut self, modifier: NodeId, value: StatValue) -> Result<(), AttrError> {
        let base = self.base_node(modifier)?;
        if self.value(base).ok() == Some(value) {
            return Ok(());
        }
        self.set_value(base, value)
    }

    /// Write `value` through to the offset, if it differs.
    ///
    /// # Errors
    ///
    /// `AttrTypeMismatch` for a conditional modifier, whose offset is the
    /// sum of its options.
    pub fn set_offset(&mut self, modifier: NodeId, value: StatValue) -> Result<(), AttrError> {
        let state = self.modifier_state(modifier)?;
        if state.conditional {
            return Err(self.type_mismatch(modifier, "a modifier with a plain offset"));
        }
        let offset = state.offset.id;
        if self.value(offset).ok() == Some(value) {
            return Ok(());
        }
        self.set_value(offset, value)
    }

    /// Copy base, offset, pinned value and override flag from `source`.
    ///
    /// The writes land in one batch, so dependents of `target` observe a
    /// single consistent change. A conditional target keeps its options;
    /// only its base, pin and flag are copied.
    pub fn assign_modifier(&mut self, target: NodeId, source: NodeId) -> Result<(), AttrError> {
        self.modifier_state(target)?;
        let parts = self.modifier_parts(source)?;
        self.apply_parts(target, Some(parts.base), Some(parts.offset), parts.value, parts.overridden)
    }

    /// Assign from the string form `value[,base[,offset[,flag]]]`.
    ///
    /// Fields beyond the fourth are ignored. Without a flag field the
    /// current override flag is kept. Every field is parsed before anything
    /// changes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statsheet::Sheet;
    ///
    /// let mut sheet = Sheet::new();
    /// let m = sheet.modifier("Attack").build().unwrap();
    ///
    /// sheet.assign_modifier_str(m, "7,5,2,0").unwrap();
    /// assert_eq!(sheet.value(m).unwrap(), 7.0);
    /// assert_eq!(sheet.display(m).unwrap(), "7,5,2,0");
    ///
    /// sheet.assign_modifier_str(m, "12,5,2,1").unwrap();
    /// assert_eq!(sheet.value(m).unwrap(), 12.0);
    ///
    /// assert!(sheet.assign_modifier_str(m, "x,1").is_err());
    /// ```
    pub fn assign_modifier_str(&mut self, modifier: NodeId, s: &str) -> Result<(), AttrError> {
        let overridden = self.overridden_modifier(modifier)?;
        let fields = split_fields(s)?;
        let value = fields[0];
        let base = fields.get(1).copied();
        let offset = fields.get(2).copied();
        let overridden = fields.get(3).map(|flag| *flag != 0.0).unwrap_or(overridden);
        self.apply_parts(modifier, base, offset, value, overridden)
    }

    /// Whether `s` is an acceptable modifier string form.
    pub fn validate_modifier_str(s: &str) -> bool {
        split_fields(s).is_ok()
    }

    /// `value,base,offset,flag` with flag `1` when overridden.
    pub(crate) fn modifier_display(&self, modifier: NodeId) -> Result<String, AttrError> {
        let parts = self.modifier_parts(modifier)?;
        Ok(format!(
            "{},{},{},{}",
            format_value(parts.value),
            format_value(parts.base),
            format_value(parts.offset),
            if parts.overridden { 1 } else { 0 }
        ))
    }

    fn modifier_parts(&self, modifier: NodeId) -> Result<ModifierParts, AttrError> {
        let state = self.modifier_state(modifier)?;
        Ok(ModifierParts {
            value: self.value(modifier)?,
            base: self.value(state.base.id)?,
            offset: self.value(state.offset.id)?,
            overridden: state.pin.overridden,
        })
    }

    fn overridden_modifier(&self, modifier: NodeId) -> Result<bool, AttrError> {
        Ok(self.modifier_state(modifier)?.pin.overridden)
    }

    /// Write modifier fields, least significant last, inside one batch.
    fn apply_parts(
        &mut self,
        modifier: NodeId,
        base: Option<StatValue>,
        offset: Option<StatValue>,
        value: StatValue,
        overridden: bool,
    ) -> Result<(), AttrError> {
        let conditional = self.modifier_state(modifier)?.conditional;
        self.batch(|sheet| {
            if let (Some(offset), false) = (offset, conditional) {
                sheet.set_offset(modifier, offset)?;
            }
            if let Some(base) = base {
                sheet.set_base(modifier, base)?;
            }
            let pin = &mut sheet.modifier_state_mut(modifier)?.pin;
            pin.value = value;
            pin.overridden = overridden;
            sheet.update(modifier)
        })
    }

    /// Link for a modifier part: the given node, or a fresh owned scalar.
    pub(crate) fn part_link(
        &mut self,
        owner: &AttrName,
        part: &str,
        given: Option<NodeId>,
    ) -> Result<Link, AttrError> {
        match given {
            Some(id) => {
                self.node(id)?;
                Ok(Link::borrowed(id))
            }
            None => Ok(Link::owned(self.create_scalar(owner.suffixed(part), 0.0))),
        }
    }

    pub(crate) fn insert_modifier(
        &mut self,
        name: AttrName,
        base: Link,
        offset: Link,
        pin: Pin,
        conditional: bool,
    ) -> Result<NodeId, AttrError> {
        let modifier = self.insert(Node::new(
            name,
            AttrKind::Modifier(ModifierState {
                pin,
                base,
                offset,
                conditional,
            }),
        ));
        self.link(modifier, base.id)?;
        self.link(modifier, offset.id)?;
        self.refresh(modifier);
        Ok(modifier)
    }

    pub(crate) fn modifier_state(&self, id: NodeId) -> Result<&ModifierState, AttrError> {
        self.state(id, "a modifier", AttrKind::as_modifier)
    }

    pub(crate) fn modifier_state_mut(&mut self, id: NodeId) -> Result<&mut ModifierState, AttrError> {
        self.state_mut(id, "a modifier", AttrKind::as_modifier_mut)
    }
}
