//! Numeric helpers for attribute values.
//!
//! All attribute values share one floating point domain so that integer,
//! unsigned and fractional attributes can feed each other freely. Template
//! loaders hand the engine strings, so this module also owns literal parsing.

use crate::error::AttrError;

/// Type alias for attribute values.
pub type StatValue = f64;

/// Delimiter between the fields of a modifier's string form.
pub const FIELD_DELIMITER: char = ',';

/// Parse a single numeric literal.
///
/// Surrounding whitespace is ignored and a leading `+` is accepted. Anything
/// that does not parse to a finite number is rejected.
///
/// # Examples
///
/// ```rust
/// use statsheet::numeric::parse_value;
///
/// assert_eq!(parse_value(" +2 ").unwrap(), 2.0);
/// assert_eq!(parse_value("-1.5").unwrap(), -1.5);
/// assert!(parse_value("two").is_err());
/// assert!(parse_value("inf").is_err());
/// ```
pub fn parse_value(s: &str) -> Result<StatValue, AttrError> {
    let trimmed = s.trim();
    match trimmed.parse::<StatValue>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AttrError::InvalidValue(format!(
            "'{}' is not a finite number",
            trimmed
        ))),
    }
}

/// Split a delimited field list into numbers.
///
/// Every field must parse; an empty string yields one empty field and is
/// therefore rejected.
///
/// # Examples
///
/// ```rust
/// use statsheet::numeric::split_fields;
///
/// assert_eq!(split_fields("7,5,2,0").unwrap(), vec![7.0, 5.0, 2.0, 0.0]);
/// assert!(split_fields("7,,2").is_err());
/// assert!(split_fields("").is_err());
/// ```
pub fn split_fields(s: &str) -> Result<Vec<StatValue>, AttrError> {
    s.split(FIELD_DELIMITER).map(parse_value).collect()
}

/// Render a value for display: integral values print without a fraction.
pub fn format_value(value: StatValue) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_accepts_signs_and_whitespace() {
        assert_eq!(parse_value("5").unwrap(), 5.0);
        assert_eq!(parse_value("\t-3 ").unwrap(), -3.0);
        assert_eq!(parse_value("+0.25").unwrap(), 0.25);
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        assert!(matches!(parse_value(""), Err(AttrError::InvalidValue(_))));
        assert!(matches!(parse_value("3d6"), Err(AttrError::InvalidValue(_))));
        assert!(matches!(parse_value("NaN"), Err(AttrError::InvalidValue(_))));
    }

    #[test]
    fn test_split_fields_partial_lists() {
        assert_eq!(split_fields("4").unwrap(), vec![4.0]);
        assert_eq!(split_fields("4, 2").unwrap(), vec![4.0, 2.0]);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(7.0), "7");
        assert_eq!(format_value(-2.5), "-2.5");
    }
}
