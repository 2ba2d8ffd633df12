//! APRS information field decoding (summary level)
//!
//! Only the data types a chat bridge needs to present are decoded:
//! uncompressed positions, messages (with ack/rej), status reports,
//! objects and telemetry. Anything else is kept as raw text.

use std::fmt::Write as _;

/// Maximum text length of an APRS message
pub const MAX_MESSAGE_LEN: usize = 67;

/// Maximum length of a status report or position comment
pub const MAX_STATUS_LEN: usize = 43;

/// Width of the addressee field in a message
pub const ADDRESSEE_LEN: usize = 9;

/// Decoded APRS data
#[derive(Debug, Clone, PartialEq)]
pub enum AprsData {
    /// Uncompressed position report
    Position {
        /// Latitude in decimal degrees (north positive)
        latitude: f64,
        /// Longitude in decimal degrees (east positive)
        longitude: f64,
        /// Symbol table identifier
        symbol_table: char,
        /// Symbol code
        symbol: char,
        /// Free-form comment
        comment: String,
    },
    /// Message to a station
    Message {
        /// Addressee, trimmed
        addressee: String,
        /// Message text
        text: String,
        /// Message number (if an acknowledgement is requested)
        id: Option<String>,
    },
    /// Acknowledgement of a message
    Ack {
        /// Station being acknowledged
        addressee: String,
        /// Message number
        id: String,
    },
    /// Rejection of a message
    Reject {
        /// Station being rejected
        addressee: String,
        /// Message number
        id: String,
    },
    /// Status report
    Status(String),
    /// Object report
    Object {
        /// Object name, trimmed
        name: String,
        /// Live (`*`) or killed (`_`)
        live: bool,
        /// Remainder of the report
        report: String,
    },
    /// Telemetry report
    Telemetry(String),
    /// Any other data type, kept verbatim
    Unknown(String),
}

impl AprsData {
    /// Decode an APRS information field
    pub fn parse(info: &str) -> Self {
        let info = info.trim_end_matches(['\r', '\n']);
        match info.chars().next() {
            Some('!') | Some('=') => parse_position(&info[1..]),
            Some('/') | Some('@') => info.get(8..).and_then(parse_position),
            Some(':') => parse_message(&info[1..]),
            Some('>') => Some(AprsData::Status(info[1..].to_string())),
            Some(';') => parse_object(&info[1..]),
            Some('T') if info.starts_with("T#") => {
                Some(AprsData::Telemetry(info[2..].to_string()))
            }
            _ => None,
        }
        .unwrap_or_else(|| AprsData::Unknown(info.to_string()))
    }

    /// One-line human-readable rendering
    pub fn summary(&self) -> String {
        match self {
            AprsData::Position {
                latitude,
                longitude,
                symbol_table,
                symbol,
                comment,
            } => {
                let mut out = format!(
                    "{:.4}{} {:.4}{} {}{}",
                    latitude.abs(),
                    if *latitude >= 0.0 { 'N' } else { 'S' },
                    longitude.abs(),
                    if *longitude >= 0.0 { 'E' } else { 'W' },
                    symbol_table,
                    symbol
                );
                if !comment.is_empty() {
                    let _ = write!(out, " {}", comment);
                }
                out
            }
            AprsData::Message {
                addressee, text, ..
            } => format!("@{}: {}", addressee, text),
            AprsData::Ack { addressee, id } => format!("ack {} to {}", id, addressee),
            AprsData::Reject { addressee, id } => format!("rej {} to {}", id, addressee),
            AprsData::Status(text) => text.clone(),
            AprsData::Object { name, live, report } => format!(
                "object {}{}: {}",
                name,
                if *live { "" } else { " (killed)" },
                report
            ),
            AprsData::Telemetry(text) => format!("telemetry {}", text),
            AprsData::Unknown(raw) => raw.clone(),
        }
    }
}

/// Check whether an info field looks like APRS rather than plain chat text
pub fn looks_like_aprs(info: &[u8]) -> bool {
    match info.first() {
        Some(b'!' | b'=' | b'/' | b'@' | b':' | b';' | b'>' | b')' | b'_' | b'\'' | b'`')
        | Some(b'{' | b'$') => true,
        Some(b'T') => info.starts_with(b"T#"),
        _ => false,
    }
}

/// Format an APRS message information field: `:ADDRESSEE:text{id`
///
/// The text is truncated to [`MAX_MESSAGE_LEN`] characters.
pub fn format_message(addressee: &str, text: &str, id: Option<&str>) -> String {
    let addressee: String = addressee.chars().take(ADDRESSEE_LEN).collect();
    let text: String = text
        .chars()
        .filter(|c| !matches!(c, '|' | '~' | '{'))
        .take(MAX_MESSAGE_LEN)
        .collect();
    match id {
        Some(id) => format!(":{:<9}:{}{{{}", addressee, text, id),
        None => format!(":{:<9}:{}", addressee, text),
    }
}

/// Format an APRS status report information field: `>text`
pub fn format_status(text: &str) -> String {
    let text: String = text.chars().take(MAX_STATUS_LEN).collect();
    format!(">{}", text)
}

fn parse_position(body: &str) -> Option<AprsData> {
    // DDMM.mmN T DDDMM.mmW S comment
    if body.len() < 19 || !body.as_bytes()[..19].is_ascii() {
        return None;
    }
    let latitude = parse_coordinate(&body[..8], 2, 'N', 'S')?;
    let symbol_table = body[8..9].chars().next()?;
    let longitude = parse_coordinate(&body[9..18], 3, 'E', 'W')?;
    let symbol = body[18..19].chars().next()?;
    Some(AprsData::Position {
        latitude,
        longitude,
        symbol_table,
        symbol,
        comment: body[19..].trim().to_string(),
    })
}

fn parse_coordinate(field: &str, degree_digits: usize, pos: char, neg: char) -> Option<f64> {
    let hemisphere = field.chars().last()?;
    let number = &field[..field.len() - 1];
    // Position ambiguity replaces trailing digits with spaces
    let number = number.replace(' ', "0");
    let degrees: f64 = number.get(..degree_digits)?.parse().ok()?;
    let minutes: f64 = number.get(degree_digits..)?.parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }
    let value = degrees + minutes / 60.0;
    match hemisphere {
        h if h == pos => Some(value),
        h if h == neg => Some(-value),
        _ => None,
    }
}

fn parse_message(body: &str) -> Option<AprsData> {
    if body.len() < ADDRESSEE_LEN + 1 || !body.is_char_boundary(ADDRESSEE_LEN) {
        return None;
    }
    if body.as_bytes()[ADDRESSEE_LEN] != b':' {
        return None;
    }
    let addressee = body[..ADDRESSEE_LEN].trim().to_string();
    let text = &body[ADDRESSEE_LEN + 1..];

    if let Some(id) = text.strip_prefix("ack") {
        return Some(AprsData::Ack {
            addressee,
            id: id.trim().to_string(),
        });
    }
    if let Some(id) = text.strip_prefix("rej") {
        return Some(AprsData::Reject {
            addressee,
            id: id.trim().to_string(),
        });
    }

    let (text, id) = match text.rsplit_once('{') {
        Some((text, id)) if !id.is_empty() && id.len() <= 5 => {
            // Reply-ack form "MM}AA" keeps only the message number
            let id = id.split('}').next().unwrap_or(id);
            (text, Some(id.to_string()))
        }
        _ => (text, None),
    };

    Some(AprsData::Message {
        addressee,
        text: text.to_string(),
        id,
    })
}

fn parse_object(body: &str) -> Option<AprsData> {
    // 9-char name, then '*' (live) or '_' (killed)
    if body.len() < 10 || !body.as_bytes()[..10].is_ascii() {
        return None;
    }
    let live = match body.as_bytes()[9] {
        b'*' => true,
        b'_' => false,
        _ => return None,
    };
    Some(AprsData::Object {
        name: body[..9].trim().to_string(),
        live,
        report: body[10..].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        let data = AprsData::parse("!4903.50N/07201.75W-Test 001234");
        match data {
            AprsData::Position {
                latitude,
                longitude,
                symbol_table,
                symbol,
                comment,
            } => {
                assert!((latitude - 49.058333).abs() < 1e-4);
                assert!((longitude + 72.029166).abs() < 1e-4);
                assert_eq!(symbol_table, '/');
                assert_eq!(symbol, '-');
                assert_eq!(comment, "Test 001234");
            }
            other => panic!("Expected Position, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_timestamped_position() {
        let data = AprsData::parse("@092345z4903.50N/07201.75W>");
        assert!(matches!(data, AprsData::Position { symbol: '>', .. }));
    }

    #[test]
    fn test_parse_message_with_id() {
        let data = AprsData::parse(":KB1ABC-2 :Hello there{42");
        assert_eq!(
            data,
            AprsData::Message {
                addressee: "KB1ABC-2".into(),
                text: "Hello there".into(),
                id: Some("42".into()),
            }
        );
    }

    #[test]
    fn test_parse_ack() {
        let data = AprsData::parse(":N0CALL   :ack42");
        assert_eq!(
            data,
            AprsData::Ack {
                addressee: "N0CALL".into(),
                id: "42".into()
            }
        );
    }

    #[test]
    fn test_parse_status_and_unknown() {
        assert_eq!(
            AprsData::parse(">On the air"),
            AprsData::Status("On the air".into())
        );
        assert_eq!(AprsData::parse("hello"), AprsData::Unknown("hello".into()));
    }

    #[test]
    fn test_malformed_position_falls_back() {
        let data = AprsData::parse("!garbage");
        assert_eq!(data, AprsData::Unknown("!garbage".into()));
    }

    #[test]
    fn test_format_message() {
        assert_eq!(
            format_message("N0CALL", "reply", Some("7")),
            ":N0CALL   :reply{7"
        );
        let long = "x".repeat(100);
        let formatted = format_message("N0CALL", &long, None);
        assert_eq!(formatted.len(), 1 + ADDRESSEE_LEN + 1 + MAX_MESSAGE_LEN);
    }

    #[test]
    fn test_summary() {
        let data = AprsData::parse("!4903.50N/07201.75W-Test");
        assert_eq!(data.summary(), "49.0583N 72.0292W /- Test");
        assert_eq!(AprsData::parse("hello").summary(), "hello");
    }

    #[test]
    fn test_looks_like_aprs() {
        assert!(looks_like_aprs(b"!4903.50N/07201.75W-"));
        assert!(looks_like_aprs(b"T#005,199,000"));
        assert!(!looks_like_aprs(b"Thanks for the contact"));
        assert!(!looks_like_aprs(b"hello"));
    }
}
