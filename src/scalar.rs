//! String-form and arithmetic assignment.
//!
//! Template loaders feed the sheet strings; these entry points route a
//! string to the form its attribute kind understands. The arithmetic
//! helpers are read-modify-write shorthands over [`Sheet::set_value`].

use crate::error::AttrError;
use crate::node::{AttrType, NodeId};
use crate::numeric::{parse_value, StatValue};
use crate::sheet::Sheet;

impl Sheet {
    /// Assign from text.
    ///
    /// Modifiers take their `value,base,offset,flag` form, options take
    /// `"<amount> <description>"`, everything else takes a single numeric
    /// literal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statsheet::Sheet;
    ///
    /// let mut sheet = Sheet::new();
    /// let hp = sheet.create_scalar("HP", 0.0);
    /// sheet.set_value_str(hp, " 42 ").unwrap();
    /// assert_eq!(sheet.value(hp).unwrap(), 42.0);
    ///
    /// assert!(sheet.set_value_str(hp, "lots").is_err());
    /// assert_eq!(sheet.value(hp).unwrap(), 42.0);
    /// ```
    pub fn set_value_str(&mut self, id: NodeId, s: &str) -> Result<(), AttrError> {
        match self.attr_type(id)? {
            AttrType::Modifier | AttrType::ConditionalModifier => self.assign_modifier_str(id, s),
            AttrType::Option => self.assign_option_str(id, s),
            _ => {
                let value = parse_value(s)?;
                self.set_value(id, value)
            }
        }
    }

    /// Whether [`set_value_str`](Sheet::set_value_str) would accept `s`.
    pub fn validate_str(&self, id: NodeId, s: &str) -> Result<bool, AttrError> {
        Ok(match self.attr_type(id)? {
            AttrType::Modifier | AttrType::ConditionalModifier => Sheet::validate_modifier_str(s),
            AttrType::Option => true,
            _ => parse_value(s).is_ok(),
        })
    }

    /// Copy `source` into `target`.
    ///
    /// Between two modifiers this copies every part, see
    /// [`assign_modifier`](Sheet::assign_modifier); otherwise the source's
    /// value is assigned.
    pub fn assign_from(&mut self, target: NodeId, source: NodeId) -> Result<(), AttrError> {
        let both_modifiers = self.node(target)?.kind.as_modifier().is_some()
            && self.node(source)?.kind.as_modifier().is_some();
        if both_modifiers {
            return self.assign_modifier(target, source);
        }
        let value = self.value(source)?;
        self.set_value(target, value)
    }

    /// `value += rhs`
    pub fn add_value(&mut self, id: NodeId, rhs: StatValue) -> Result<(), AttrError> {
        let current = self.value(id)?;
        self.set_value(id, current + rhs)
    }

    /// `value -= rhs`
    pub fn sub_value(&mut self, id: NodeId, rhs: StatValue) -> Result<(), AttrError> {
        let current = self.value(id)?;
        self.set_value(id, current - rhs)
    }

    /// `value *= rhs`
    pub fn mul_value(&mut self, id: NodeId, rhs: StatValue) -> Result<(), AttrError> {
        let current = self.value(id)?;
        self.set_value(id, current * rhs)
    }

    /// `value /= rhs`
    ///
    /// # Errors
    ///
    /// `InvalidValue` when `rhs` is zero.
    pub fn div_value(&mut self, id: NodeId, rhs: StatValue) -> Result<(), AttrError> {
        if rhs == 0.0 {
            return Err(AttrError::InvalidValue("division by zero".to_string()));
        }
        let current = self.value(id)?;
        self.set_value(id, current / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_str_routes_by_kind() {
        let mut sheet = Sheet::new();
        let m = sheet.modifier("Attack").build().unwrap();
        sheet.set_value_str(m, "6,4,2,0").unwrap();
        assert_eq!(sheet.base(m).unwrap(), 4.0);
        assert_eq!(sheet.value(m).unwrap(), 6.0);

        let opt = sheet.new_option(0.0, "", false).unwrap();
        sheet.set_value_str(opt, "3 flanking").unwrap();
        assert_eq!(sheet.option_amount(opt).unwrap(), 3.0);

        let sum = sheet.create_sum("sum", &[]).unwrap();
        sheet.set_value_str(sum, "12").unwrap();
        assert!(sheet.overridden(sum).unwrap());
        assert_eq!(sheet.value(sum).unwrap(), 12.0);
    }

    #[test]
    fn test_validate_str() {
        let mut sheet = Sheet::new();
        let hp = sheet.create_scalar("HP", 1.0);
        let m = sheet.modifier("M").build().unwrap();
        assert!(sheet.validate_str(hp, "3.5").unwrap());
        assert!(!sheet.validate_str(hp, "3,5").unwrap());
        assert!(sheet.validate_str(m, "3,5").unwrap());
        assert!(!sheet.validate_str(m, "a,5").unwrap());
    }

    #[test]
    fn test_arithmetic_assignment() {
        let mut sheet = Sheet::new();
        let gold = sheet.create_scalar("Gold", 10.0);
        sheet.add_value(gold, 5.0).unwrap();
        sheet.sub_value(gold, 3.0).unwrap();
        sheet.mul_value(gold, 2.0).unwrap();
        assert_eq!(sheet.value(gold).unwrap(), 24.0);

        sheet.div_value(gold, 4.0).unwrap();
        assert_eq!(sheet.value(gold).unwrap(), 6.0);
        assert!(matches!(
            sheet.div_value(gold, 0.0),
            Err(AttrError::InvalidValue(_))
        ));
        assert_eq!(sheet.value(gold).unwrap(), 6.0);
    }

    #[test]
    fn test_arithmetic_on_modifier_pins_it() {
        let mut sheet = Sheet::new();
        let m = sheet.modifier("M").build().unwrap();
        sheet.set_base(m, 3.0).unwrap();
        sheet.add_value(m, 1.0).unwrap();
        assert!(sheet.overridden(m).unwrap());
        assert_eq!(sheet.value(m).unwrap(), 4.0);
    }

    #[test]
    fn test_assign_from() {
        let mut sheet = Sheet::new();
        let a = sheet.create_scalar("a", 7.0);
        let b = sheet.create_scalar("b", 0.0);
        sheet.assign_from(b, a).unwrap();
        assert_eq!(sheet.value(b).unwrap(), 7.0);

        let source = sheet.modifier("source").pinned(20.0).build().unwrap();
        let target = sheet.modifier("target").build().unwrap();
        sheet.assign_from(target, source).unwrap();
        assert!(sheet.overridden(target).unwrap());
        assert_eq!(sheet.display(target).unwrap(), "20,0,0,1");
    }
}
