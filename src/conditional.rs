//! Conditional modifiers and their options.
//!
//! A conditional modifier is a modifier whose offset is an internal sum it
//! owns. The sum's items are the options: labeled amounts that contribute
//! only while selected. Selecting an option is a value change of the
//! option, so it reaches the modifier through the sum like any other
//! update.

use crate::error::AttrError;
use crate::modifier::check_pinned;
use crate::name::AttrName;
use crate::node::{AttrKind, Link, Node, NodeId, OptionState, Pin};
use crate::numeric::{parse_value, StatValue};
use crate::sheet::Sheet;

/// Builder for conditional modifiers.
///
/// Created by [`Sheet::conditional_modifier`].
///
/// # Examples
///
/// ```rust
/// use statsheet::Sheet;
///
/// let mut sheet = Sheet::new();
/// let save = sheet.create_scalar("Will save", 10.0);
/// let will = sheet.conditional_modifier("Will").base(save).build().unwrap();
///
/// let bonus = sheet.create_option(will, 2.0, "vs. fear", false).unwrap();
/// sheet.create_option(will, -1.0, "frightened", true).unwrap();
/// assert_eq!(sheet.value(will).unwrap(), 9.0);
///
/// let opt = sheet.option_at(will, bonus).unwrap().unwrap();
/// sheet.toggle_selected(opt).unwrap();
/// assert_eq!(sheet.value(will).unwrap(), 11.0);
/// ```
pub struct ConditionalModifierBuilder<'a> {
    sheet: &'a mut Sheet,
    name: AttrName,
    base: Option<NodeId>,
    pinned: Option<StatValue>,
}

impl<'a> ConditionalModifierBuilder<'a> {
    /// Read the base from an existing attribute instead of owning one.
    pub fn base(mut self, base: NodeId) -> Self {
        self.base = Some(base);
        self
    }

    /// Start overridden at `value`.
    pub fn pinned(mut self, value: StatValue) -> Self {
        self.pinned = Some(value);
        self
    }

    /// Create the modifier and its internal option sum.
    pub fn build(self) -> Result<NodeId, AttrError> {
        let Self {
            sheet,
            name,
            base,
            pinned,
        } = self;
        check_pinned(pinned)?;
        let base = sheet.part_link(&name, "base", base)?;
        let options = sheet.create_sum(name.suffixed("options"), &[])?;
        sheet.insert_modifier(
            name,
            base,
            Link::owned(options),
            Pin::from_initial(pinned),
            true,
        )
    }
}

impl Sheet {
    /// Start building a conditional modifier named `name`.
    pub fn conditional_modifier(&mut self, name: impl Into<AttrName>) -> ConditionalModifierBuilder<'_> {
        ConditionalModifierBuilder {
            sheet: self,
            name: name.into(),
            base: None,
            pinned: None,
        }
    }

    /// Create a free-standing option, named after its description.
    ///
    /// The option belongs to no modifier until it is added with
    /// [`add_option`](Sheet::add_option).
    pub fn new_option(
        &mut self,
        amount: StatValue,
        description: impl Into<String>,
        selected: bool,
    ) -> Result<NodeId, AttrError> {
        check_amount(amount)?;
        let description = description.into();
        Ok(self.insert(Node::new(
            AttrName::new(&description),
            AttrKind::Option(OptionState {
                pin: Pin::default(),
                amount,
                description,
                selected,
            }),
        )))
    }

    /// Create an option owned by `modifier` and return its index.
    pub fn create_option(
        &mut self,
        modifier: NodeId,
        amount: StatValue,
        description: impl Into<String>,
        selected: bool,
    ) -> Result<usize, AttrError> {
        self.options_sum(modifier)?;
        let option = self.new_option(amount, description, selected)?;
        self.add_option(modifier, option, true)
    }

    /// Add an existing option and return its index.
    ///
    /// Adding an option that is already present returns its index and
    /// changes nothing. With `take_ownership` the option is destroyed when
    /// it is removed or when the modifier is destroyed.
    pub fn add_option(&mut self, modifier: NodeId, option: NodeId, take_ownership: bool) -> Result<usize, AttrError> {
        let sum = self.options_sum(modifier)?;
        self.option_state(option)?;
        if let Some(index) = self.option_index(modifier, option)? {
            return Ok(index);
        }
        if take_ownership {
            self.adopt_item(sum, option)?;
        } else {
            self.add_item(sum, option)?;
        }
        Ok(self.option_count(modifier)? - 1)
    }

    /// Add an owned copy of `source` to `modifier` and return its index.
    ///
    /// The copy starts with the source's amount, description and selection
    /// and is independent of it afterwards.
    pub fn copy_option(&mut self, modifier: NodeId, source: NodeId) -> Result<usize, AttrError> {
        let state = self.option_state(source)?;
        let (amount, description, selected) = (state.amount, state.description.clone(), state.selected);
        self.create_option(modifier, amount, description, selected)
    }

    /// Give `target` owned copies of every option of `source`, appended in
    /// order. Dependents of `target` see a single update.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statsheet::Sheet;
    ///
    /// let mut sheet = Sheet::new();
    /// let will = sheet.conditional_modifier("Will").build().unwrap();
    /// sheet.create_option(will, 2.0, "vs. fear", true).unwrap();
    ///
    /// let copy = sheet.conditional_modifier("Will (copy)").build().unwrap();
    /// sheet.assign_modifier(copy, will).unwrap();
    /// sheet.copy_options(copy, will).unwrap();
    /// assert_eq!(sheet.value(copy).unwrap(), 2.0);
    /// assert_ne!(sheet.options(copy).unwrap(), sheet.options(will).unwrap());
    /// ```
    pub fn copy_options(&mut self, target: NodeId, source: NodeId) -> Result<(), AttrError> {
        self.options_sum(target)?;
        let options = self.options(source)?;
        self.batch(|sheet| -> Result<(), AttrError> {
            for option in options {
                sheet.copy_option(target, option)?;
            }
            Ok(())
        })
    }

    /// Copy amount, description and selection from `source` onto
    /// `target` in one update.
    pub fn assign_option(&mut self, target: NodeId, source: NodeId) -> Result<(), AttrError> {
        self.option_state(target)?;
        let state = self.option_state(source)?;
        let (amount, description, selected) = (state.amount, state.description.clone(), state.selected);
        self.batch(|sheet| -> Result<(), AttrError> {
            sheet.set_description(target, description)?;
            sheet.set_amount(target, amount)?;
            sheet.set_selected(target, selected)
        })
    }

    /// Remove an option. Returns `false` if it was not present; an owned
    /// option is destroyed.
    pub fn remove_option(&mut self, modifier: NodeId, option: NodeId) -> Result<bool, AttrError> {
        let sum = self.options_sum(modifier)?;
        self.remove_item(sum, option)
    }

    /// Remove the option at `index`. Out-of-range indices do nothing.
    pub fn remove_option_at(&mut self, modifier: NodeId, index: usize) -> Result<bool, AttrError> {
        match self.option_at(modifier, index)? {
            Some(option) => self.remove_option(modifier, option),
            None => Ok(false),
        }
    }

    /// Position of `option` among the modifier's options.
    pub fn option_index(&self, modifier: NodeId, option: NodeId) -> Result<Option<usize>, AttrError> {
        Ok(self.options(modifier)?.iter().position(|&o| o == option))
    }

    /// Option at `index`, if in range.
    pub fn option_at(&self, modifier: NodeId, index: usize) -> Result<Option<NodeId>, AttrError> {
        Ok(self.options(modifier)?.get(index).copied())
    }

    /// Options of a conditional modifier, in insertion order.
    pub fn options(&self, modifier: NodeId) -> Result<Vec<NodeId>, AttrError> {
        let sum = self.options_sum(modifier)?;
        self.items(sum)
    }

    /// Number of options.
    pub fn option_count(&self, modifier: NodeId) -> Result<usize, AttrError> {
        Ok(self.options(modifier)?.len())
    }

    /// The amount an option contributes while selected.
    pub fn option_amount(&self, option: NodeId) -> Result<StatValue, AttrError> {
        Ok(self.option_state(option)?.amount)
    }

    /// Label of an option.
    pub fn option_description(&self, option: NodeId) -> Result<&str, AttrError> {
        Ok(self.option_state(option)?.description.as_str())
    }

    /// Whether the option currently contributes.
    pub fn is_selected(&self, option: NodeId) -> Result<bool, AttrError> {
        Ok(self.option_state(option)?.selected)
    }

    /// Select or deselect an option. Setting the current state does nothing.
    pub fn set_selected(&mut self, option: NodeId, selected: bool) -> Result<(), AttrError> {
        let state = self.option_state_mut(option)?;
        if state.selected == selected {
            return Ok(());
        }
        state.selected = selected;
        self.update(option)
    }

    /// Flip the selection.
    pub fn toggle_selected(&mut self, option: NodeId) -> Result<(), AttrError> {
        let selected = self.is_selected(option)?;
        self.set_selected(option, !selected)
    }

    /// Change the amount contributed while selected.
    pub fn set_amount(&mut self, option: NodeId, amount: StatValue) -> Result<(), AttrError> {
        check_amount(amount)?;
        let state = self.option_state_mut(option)?;
        if state.amount == amount {
            return Ok(());
        }
        state.amount = amount;
        self.update(option)
    }

    /// Change the description. The option's name is left alone.
    pub fn set_description(&mut self, option: NodeId, description: impl Into<String>) -> Result<(), AttrError> {
        self.option_state_mut(option)?.description = description.into();
        Ok(())
    }

    /// Assign an option from text such as `"+2 vs. fear"`.
    ///
    /// A leading number becomes the amount and the rest the description.
    /// Text without a leading number replaces only the description.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statsheet::Sheet;
    ///
    /// let mut sheet = Sheet::new();
    /// let opt = sheet.new_option(1.0, "", true).unwrap();
    ///
    /// sheet.assign_option_str(opt, "+2 vs. fear").unwrap();
    /// assert_eq!(sheet.option_amount(opt).unwrap(), 2.0);
    /// assert_eq!(sheet.option_description(opt).unwrap(), "vs. fear");
    ///
    /// sheet.assign_option_str(opt, "while raging").unwrap();
    /// assert_eq!(sheet.option_amount(opt).unwrap(), 2.0);
    /// assert_eq!(sheet.option_description(opt).unwrap(), "while raging");
    /// ```
    pub fn assign_option_str(&mut self, option: NodeId, s: &str) -> Result<(), AttrError> {
        self.option_state(option)?;
        let trimmed = s.trim();
        let (head, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        match parse_value(head) {
            Ok(amount) => {
                self.set_description(option, rest.trim())?;
                self.set_amount(option, amount)
            }
            Err(_) => self.set_description(option, trimmed),
        }
    }

    /// The internal sum of a conditional modifier.
    fn options_sum(&self, modifier: NodeId) -> Result<NodeId, AttrError> {
        let state = self.modifier_state(modifier)?;
        if !state.conditional {
            return Err(self.type_mismatch(modifier, "a conditional modifier"));
        }
        Ok(state.offset.id)
    }

    pub(crate) fn option_state(&self, id: NodeId) -> Result<&OptionState, AttrError> {
        self.state(id, "an option", AttrKind::as_option)
    }

    fn option_state_mut(&mut self, id: NodeId) -> Result<&mut OptionState, AttrError> {
        self.state_mut(id, "an option", AttrKind::as_option_mut)
    }
}

fn check_amount(amount: StatValue) -> Result<(), AttrError> {
    if amount.is_finite() {
        Ok(())
    } else {
        Err(AttrError::InvalidValue(format!(
            "{amount} is not a finite number"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AttrType;

    fn will_save(sheet: &mut Sheet) -> (NodeId, NodeId, NodeId) {
        let base = sheet.create_scalar("Will base", 10.0);
        let cm = sheet.conditional_modifier("Will").base(base).build().unwrap();
        let bonus = sheet.create_option(cm, 2.0, "bonus", false).unwrap();
        let penalty = sheet.create_option(cm, -1.0, "penalty", true).unwrap();
        let bonus = sheet.option_at(cm, bonus).unwrap().unwrap();
        let penalty = sheet.option_at(cm, penalty).unwrap().unwrap();
        (cm, bonus, penalty)
    }

    #[test]
    fn test_conditional_scenario() {
        let mut sheet = Sheet::new();
        let (cm, bonus, _) = will_save(&mut sheet);
        assert_eq!(sheet.value(cm).unwrap(), 9.0);

        sheet.set_selected(bonus, true).unwrap();
        assert_eq!(sheet.value(cm).unwrap(), 11.0);
        assert_eq!(sheet.offset(cm).unwrap(), 1.0);
    }

    #[test]
    fn test_internal_sum_is_owned_offset() {
        let mut sheet = Sheet::new();
        let cm = sheet.conditional_modifier("Reflex").build().unwrap();
        let sum = sheet.offset_node(cm).unwrap();
        assert_eq!(sheet.name(sum).unwrap().as_str(), "Reflex options");
        assert_eq!(sheet.attr_type(sum).unwrap(), AttrType::Sum);
        assert_eq!(sheet.attr_type(cm).unwrap(), AttrType::ConditionalModifier);
        assert_eq!(sheet.value(cm).unwrap(), 0.0);
    }

    #[test]
    fn test_add_option_is_idempotent() {
        let mut sheet = Sheet::new();
        let cm = sheet.conditional_modifier("AC").build().unwrap();
        let opt = sheet.new_option(1.0, "shield", true).unwrap();
        assert_eq!(sheet.add_option(cm, opt, false).unwrap(), 0);
        assert_eq!(sheet.add_option(cm, opt, true).unwrap(), 0);
        assert_eq!(sheet.option_count(cm).unwrap(), 1);
        assert_eq!(sheet.option_index(cm, opt).unwrap(), Some(0));

        // still borrowed: removal keeps it alive
        assert!(sheet.remove_option(cm, opt).unwrap());
        assert!(sheet.contains(opt));
        assert_eq!(sheet.value(cm).unwrap(), 0.0);
    }

    #[test]
    fn test_remove_owned_option_destroys_it() {
        let mut sheet = Sheet::new();
        let (cm, bonus, penalty) = will_save(&mut sheet);

        assert!(sheet.remove_option_at(cm, 1).unwrap());
        assert!(!sheet.contains(penalty));
        assert_eq!(sheet.options(cm).unwrap(), vec![bonus]);
        assert_eq!(sheet.value(cm).unwrap(), 10.0);

        assert!(!sheet.remove_option_at(cm, 5).unwrap());
        assert_eq!(sheet.option_index(cm, penalty).unwrap(), None);
    }

    #[test]
    fn test_destroying_modifier_destroys_owned_options() {
        let mut sheet = Sheet::new();
        let (cm, bonus, penalty) = will_save(&mut sheet);
        let sum = sheet.offset_node(cm).unwrap();
        let shared = sheet.new_option(3.0, "shared", true).unwrap();
        sheet.add_option(cm, shared, false).unwrap();

        sheet.remove(cm).unwrap();
        assert!(!sheet.contains(sum));
        assert!(!sheet.contains(bonus));
        assert!(!sheet.contains(penalty));
        assert!(sheet.contains(shared));
        // the external base survives
        assert!(sheet.find("Will base").is_some());
    }

    #[test]
    fn test_option_accessors() {
        let mut sheet = Sheet::new();
        let (_, bonus, _) = will_save(&mut sheet);
        assert_eq!(sheet.option_amount(bonus).unwrap(), 2.0);
        assert_eq!(sheet.option_description(bonus).unwrap(), "bonus");
        assert!(!sheet.is_selected(bonus).unwrap());
        assert_eq!(sheet.value(bonus).unwrap(), 0.0);
        assert_eq!(sheet.display(bonus).unwrap(), "bonus");

        sheet.set_amount(bonus, 4.0).unwrap();
        sheet.toggle_selected(bonus).unwrap();
        assert_eq!(sheet.value(bonus).unwrap(), 4.0);
        assert!(sheet.set_amount(bonus, f64::INFINITY).is_err());
    }

    #[test]
    fn test_option_string_assignment() {
        let mut sheet = Sheet::new();
        let (cm, _, penalty) = will_save(&mut sheet);

        sheet.assign_option_str(penalty, "-3 sickened").unwrap();
        assert_eq!(sheet.option_amount(penalty).unwrap(), -3.0);
        assert_eq!(sheet.option_description(penalty).unwrap(), "sickened");
        assert_eq!(sheet.value(cm).unwrap(), 7.0);

        sheet.assign_option_str(penalty, "  fatigued  ").unwrap();
        assert_eq!(sheet.option_amount(penalty).unwrap(), -3.0);
        assert_eq!(sheet.option_description(penalty).unwrap(), "fatigued");

        sheet.assign_option_str(penalty, "5").unwrap();
        assert_eq!(sheet.option_amount(penalty).unwrap(), 5.0);
        assert_eq!(sheet.option_description(penalty).unwrap(), "");
    }

    #[test]
    fn test_copy_options_makes_independent_owned_copies() {
        let mut sheet = Sheet::new();
        let (cm, bonus, penalty) = will_save(&mut sheet);
        let copy = sheet.conditional_modifier("Will (copy)").build().unwrap();
        sheet.assign_modifier(copy, cm).unwrap();
        sheet.copy_options(copy, cm).unwrap();

        let copied = sheet.options(copy).unwrap();
        assert_eq!(copied.len(), 2);
        assert!(!copied.contains(&bonus) && !copied.contains(&penalty));
        assert_eq!(sheet.option_description(copied[0]).unwrap(), "bonus");
        assert_eq!(sheet.option_amount(copied[1]).unwrap(), -1.0);
        assert!(sheet.is_selected(copied[1]).unwrap());
        assert_eq!(sheet.value(copy).unwrap(), sheet.value(cm).unwrap());

        // the copies no longer track the originals
        sheet.set_selected(bonus, true).unwrap();
        assert_eq!(sheet.value(cm).unwrap(), 11.0);
        assert_eq!(sheet.value(copy).unwrap(), 9.0);

        // owned by the copy
        sheet.remove(copy).unwrap();
        assert!(!sheet.contains(copied[0]));
        assert!(sheet.contains(bonus));
    }

    #[test]
    fn test_assign_option_copies_fields() {
        let mut sheet = Sheet::new();
        let (cm, bonus, penalty) = will_save(&mut sheet);
        sheet.assign_option(bonus, penalty).unwrap();
        assert_eq!(sheet.option_amount(bonus).unwrap(), -1.0);
        assert_eq!(sheet.option_description(bonus).unwrap(), "penalty");
        assert!(sheet.is_selected(bonus).unwrap());
        assert_eq!(sheet.value(cm).unwrap(), 8.0);

        let index = sheet.copy_option(cm, penalty).unwrap();
        assert_eq!(index, 2);
        assert_eq!(sheet.value(cm).unwrap(), 7.0);
    }

    #[test]
    fn test_option_ops_reject_plain_modifier() {
        let mut sheet = Sheet::new();
        let m = sheet.modifier("plain").build().unwrap();
        assert!(matches!(
            sheet.create_option(m, 1.0, "x", true),
            Err(AttrError::AttrTypeMismatch { .. })
        ));
        let cm = sheet.conditional_modifier("cond").build().unwrap();
        assert!(matches!(
            sheet.set_offset(cm, 3.0),
            Err(AttrError::AttrTypeMismatch { .. })
        ));
        let scalar = sheet.create_scalar("s", 1.0);
        assert!(sheet.add_option(cm, scalar, false).is_err());
    }
}
