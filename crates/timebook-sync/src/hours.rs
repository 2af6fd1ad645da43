//! Parsing of hours typed into a cell.

use timebook_core::ValidationError;

/// Largest value a single cell accepts.
pub const MAX_CELL_HOURS: f64 = 8.9;

/// Parse cell text into hours.
///
/// Accepts `4`, `4.5`, `.5` and `0`, with surrounding whitespace. Values must
/// lie in `0..=8.9` and carry at most one decimal digit.
pub fn parse_hours(text: &str) -> Result<f64, ValidationError> {
    let text = text.trim();

    let well_formed = !text.is_empty()
        && text
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && c == '-'));
    if !well_formed {
        return Err(ValidationError::NotANumber(text.to_string()));
    }

    let value: f64 = text
        .parse()
        .map_err(|_| ValidationError::NotANumber(text.to_string()))?;

    if !(0.0..=MAX_CELL_HOURS).contains(&value) {
        return Err(ValidationError::OutOfRange {
            value,
            min: 0.0,
            max: MAX_CELL_HOURS,
        });
    }

    if let Some((_, fraction)) = text.split_once('.') {
        if fraction.len() > 1 {
            return Err(ValidationError::TooPrecise(text.to_string()));
        }
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_accepted_forms() {
        assert_eq!(parse_hours("4").unwrap(), 4.0);
        assert_eq!(parse_hours("4.5").unwrap(), 4.5);
        assert_eq!(parse_hours(".5").unwrap(), 0.5);
        assert_eq!(parse_hours(" 0 ").unwrap(), 0.0);
        assert_eq!(parse_hours("8.9").unwrap(), 8.9);
        assert_eq!(parse_hours("3.").unwrap(), 3.0);
    }

    #[test]
    fn test_rejects_garbage() {
        for text in ["", "  ", "abc", ".", "4h", "1e1", "NaN", "inf", "4,5", "1.2.3"] {
            assert!(
                matches!(parse_hours(text), Err(ValidationError::NotANumber(_))),
                "{:?} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(
            parse_hours("-1"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_hours("9"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_hours("24"),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_rejects_two_decimals() {
        assert_eq!(
            parse_hours("4.25"),
            Err(ValidationError::TooPrecise("4.25".into()))
        );
    }
}
