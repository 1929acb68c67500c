use crate::error::DmmError;
use log::debug;

/// SCPI line terminator used in both directions
pub const LINE_TERMINATOR: char = '\n';

/// Line-level SCPI response handling
pub struct Protocol;

impl Protocol {
    /// Trim terminators and whitespace, then strip one layer of surrounding
    /// double quotes. Interior text is not unescaped.
    pub fn normalize_response(line: &str) -> &str {
        let trimmed = line.trim();
        match trimmed
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            Some(inner) => inner,
            None => trimmed,
        }
    }

    pub fn parse_f64(line: &str) -> Result<f64, DmmError> {
        let text = Self::normalize_response(line);
        text.trim().parse::<f64>().map_err(|e| {
            debug!("Unparseable reading {:?}: {}", text, e);
            DmmError::Parse(format!("'{text}' is not a number"))
        })
    }

    /// Split a comma-delimited response and parse every field
    pub fn parse_f64_list(line: &str) -> Result<Vec<f64>, DmmError> {
        let text = Self::normalize_response(line);
        if text.is_empty() {
            return Err(DmmError::Parse("empty response".to_string()));
        }
        text.split(',')
            .enumerate()
            .map(|(i, field)| {
                field.trim().parse::<f64>().map_err(|_| {
                    DmmError::Parse(format!("field {i} '{}' is not a number", field.trim()))
                })
            })
            .collect()
    }

    /// Parse a count such as `+1`, `10` or `1.000000E+00`
    pub fn parse_count(line: &str) -> Result<u32, DmmError> {
        let text = Self::normalize_response(line);
        if let Ok(count) = text.parse::<u32>() {
            return Ok(count);
        }
        match text.parse::<f64>() {
            Ok(value)
                if value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) =>
            {
                Ok(value as u32)
            }
            _ => Err(DmmError::Parse(format!("'{text}' is not a sample count"))),
        }
    }

    /// Whether a raw command expects an answer
    pub fn is_query(command: &str) -> bool {
        command.contains('?')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scientific_reading() {
        let value = Protocol::parse_f64("-1.234560E-03\n").unwrap();
        assert!((value - -0.00123456).abs() < 1e-15);
        assert_eq!(Protocol::parse_f64("+9.90000000E+37\r\n").unwrap(), 9.9e37);
    }

    #[test]
    fn test_normalize_strips_quotes() {
        assert_eq!(Protocol::normalize_response("\"34460A\"\n"), "34460A");
        assert_eq!(Protocol::normalize_response("  \"VOLT +1.0E+01,+3.0E-06\"\r\n"), "VOLT +1.0E+01,+3.0E-06");
        // only one layer, no interior unescaping
        assert_eq!(Protocol::normalize_response("\"\"a\"\"\n"), "\"a\"");
        assert_eq!(Protocol::normalize_response("\"open"), "\"open");
        assert_eq!(Protocol::normalize_response("\""), "\"");
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            Protocol::parse_f64_list("1.0,2.0,3.0\n").unwrap(),
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(
            Protocol::parse_f64_list("+1.0E+00, -2.5E-01\n").unwrap(),
            vec![1.0, -0.25]
        );
    }

    #[test]
    fn test_parse_list_rejects_bad_field() {
        let err = Protocol::parse_f64_list("1.0,oops,3.0\n").unwrap_err();
        assert!(matches!(err, DmmError::Parse(msg) if msg.contains("oops")));
        assert!(Protocol::parse_f64_list("\n").is_err());
        assert!(Protocol::parse_f64_list("1.0,,2.0").is_err());
    }

    #[test]
    fn test_parse_f64_rejects_text() {
        assert!(matches!(
            Protocol::parse_f64("\"KEYSIGHT\"\n"),
            Err(DmmError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(Protocol::parse_count("+1\n").unwrap(), 1);
        assert_eq!(Protocol::parse_count("10").unwrap(), 10);
        assert_eq!(Protocol::parse_count("5.000000E+00").unwrap(), 5);
        assert!(Protocol::parse_count("1.5").is_err());
        assert!(Protocol::parse_count("-1").is_err());
    }

    #[test]
    fn test_is_query() {
        assert!(Protocol::is_query("MEAS:VOLT?"));
        assert!(Protocol::is_query("*IDN?"));
        assert!(!Protocol::is_query("*RST"));
    }
}
