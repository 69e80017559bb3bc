//! Wire format: newline-delimited text records.
//!
//! Each record is one pointer sample written by the companion client:
//!
//!   tool,action,x,y,pressure,\n
//!
//! `tool` and `action` are Android `MotionEvent` codes, `x`/`y` are view
//! coordinates and `pressure` is a normalized float. The trailing separator
//! is optional, as is a `\r` before the delimiter.

use virtual_pen_types::{AccessoryEvent, MotionAction, ToolType};

use crate::error::RecordError;

/// Record delimiter.
pub const DELIMITER: u8 = b'\n';

/// Field separator.
pub const SEPARATOR: char = ',';

/// Number of fields in a record.
pub const FIELD_COUNT: usize = 5;

/// Parse one record (without its delimiter).
pub fn parse_record(line: &[u8]) -> Result<AccessoryEvent, RecordError> {
    let line = std::str::from_utf8(line).map_err(|_| RecordError::Encoding)?;
    let line = line.strip_suffix('\r').unwrap_or(line);
    let line = line.strip_suffix(SEPARATOR).unwrap_or(line);

    let fields: Vec<&str> = line.split(SEPARATOR).map(str::trim).collect();
    if fields.len() != FIELD_COUNT {
        return Err(RecordError::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let tool_code: u8 = parse_int("tool", fields[0])?;
    let tool = ToolType::from_code(tool_code).ok_or_else(|| out_of_range("tool", fields[0]))?;

    let action_code: u16 = parse_int("action", fields[1])?;
    let action =
        MotionAction::from_code(action_code).ok_or_else(|| out_of_range("action", fields[1]))?;

    let x = parse_float("x", fields[2])?;
    let y = parse_float("y", fields[3])?;
    let pressure = parse_float("pressure", fields[4])?;
    if pressure < 0.0 {
        return Err(out_of_range("pressure", fields[4]));
    }

    Ok(AccessoryEvent::new(tool, action, x, y, pressure))
}

/// Encode an event in the client's record layout, delimiter included.
pub fn encode_record(event: &AccessoryEvent) -> String {
    format!(
        "{},{},{},{},{:.9},\n",
        event.tool.code(),
        event.action.code(),
        event.raw_x,
        event.raw_y,
        event.raw_pressure
    )
}

fn parse_int<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, RecordError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RecordError::NotNumeric {
            field,
            value: value.to_string(),
        });
    }
    // All digits: a parse failure can only be an overflow.
    value.parse().map_err(|_| out_of_range(field, value))
}

fn parse_float(field: &'static str, value: &str) -> Result<f64, RecordError> {
    let parsed: f64 = value.parse().map_err(|_| RecordError::NotNumeric {
        field,
        value: value.to_string(),
    })?;
    // "NaN" and "inf" parse, but are not coordinates.
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(out_of_range(field, value))
    }
}

fn out_of_range(field: &'static str, value: &str) -> RecordError {
    RecordError::OutOfRange {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_record() {
        let event = parse_record(b"2,0,540,1200,0.512345678,").unwrap();
        assert_eq!(event.tool, ToolType::Stylus);
        assert_eq!(event.action, MotionAction::Down);
        assert!((event.raw_x - 540.0).abs() < f64::EPSILON);
        assert!((event.raw_y - 1200.0).abs() < f64::EPSILON);
        assert!((event.raw_pressure - 0.512_345_678).abs() < 1e-12);
        assert!(event.contact);
    }

    #[test]
    fn trailing_separator_and_cr_are_optional() {
        let with = parse_record(b"4,2,1,2,0.5,\r").unwrap();
        let without = parse_record(b"4,2,1,2,0.5").unwrap();
        assert_eq!(with, without);
        assert_eq!(with.tool, ToolType::Eraser);
    }

    #[test]
    fn negative_coordinates_are_accepted() {
        // A pen dragged past the edge of the client view.
        let event = parse_record(b"2,2,-12,-0.5,0.3,").unwrap();
        assert!(event.raw_x < 0.0);
        assert!(event.raw_y < 0.0);
    }

    #[test]
    fn wrong_field_count() {
        assert_eq!(
            parse_record(b"2,0,540,1200,"),
            Err(RecordError::FieldCount {
                expected: 5,
                found: 4
            })
        );
        assert!(matches!(
            parse_record(b"2,0,540,1200,0.5,1,"),
            Err(RecordError::FieldCount { found: 6, .. })
        ));
        assert!(matches!(
            parse_record(b""),
            Err(RecordError::FieldCount { found: 1, .. })
        ));
    }

    #[test]
    fn non_numeric_fields() {
        assert!(matches!(
            parse_record(b"pen,0,1,2,0.5,"),
            Err(RecordError::NotNumeric { field: "tool", .. })
        ));
        assert!(matches!(
            parse_record(b"2,-1,1,2,0.5,"),
            Err(RecordError::NotNumeric {
                field: "action",
                ..
            })
        ));
        assert!(matches!(
            parse_record(b"2,0,abc,2,0.5,"),
            Err(RecordError::NotNumeric { field: "x", .. })
        ));
    }

    #[test]
    fn out_of_range_fields() {
        assert!(matches!(
            parse_record(b"3,0,1,2,0.5,"),
            Err(RecordError::OutOfRange { field: "tool", .. })
        ));
        assert!(matches!(
            parse_record(b"2,261,1,2,0.5,"),
            Err(RecordError::OutOfRange {
                field: "action",
                ..
            })
        ));
        assert!(matches!(
            parse_record(b"2,0,1,NaN,0.5,"),
            Err(RecordError::OutOfRange { field: "y", .. })
        ));
        assert!(matches!(
            parse_record(b"2,0,1,2,-0.1,"),
            Err(RecordError::OutOfRange {
                field: "pressure",
                ..
            })
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert_eq!(parse_record(b"2,0,\xff,2,0.5,"), Err(RecordError::Encoding));
    }

    #[test]
    fn encoded_record_parses_back() {
        let event = AccessoryEvent::new(ToolType::Finger, MotionAction::Up, 10.0, 20.5, 0.25);
        let encoded = encode_record(&event);
        assert_eq!(encoded, "1,1,10,20.5,0.250000000,\n");
        let line = encoded.strip_suffix('\n').unwrap();
        assert_eq!(parse_record(line.as_bytes()).unwrap(), event);
    }
}
