//! Submitted records and the closed token sets they are checked against

use serde::{Deserialize, Deserializer, Serialize};

/// One activity check submission
///
/// Fields are kept as the raw strings the caller sent. Missing or `null`
/// fields decode as empty and are rejected later by validation rather than
/// by the decoder.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default, deserialize_with = "null_as_default")]
    pub check_type: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub activity_type: String,

    /// Opaque caller session identifier, never validated
    #[serde(default, deserialize_with = "null_as_default")]
    pub check_session_key: String,

    /// Typed key-value payload, in submission order
    #[serde(default, deserialize_with = "null_as_default")]
    pub activity_data: Vec<KeyValueEntry>,
}

/// A single typed key-value pair inside a record
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueEntry {
    #[serde(rename = "kvpKey", default, deserialize_with = "null_as_default")]
    pub key: String,

    /// Raw value, interpreted according to `kind`
    #[serde(rename = "kvpValue", default, deserialize_with = "null_as_default")]
    pub value: String,

    /// Type tag such as `general.integer`
    #[serde(rename = "kvpType", default, deserialize_with = "null_as_default")]
    pub kind: String,
}

/// Treat an explicit `null` the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl KeyValueEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind: kind.into(),
        }
    }
}

/// Accepted `checkType` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckType {
    Device,
    Biometric,
    Combo,
}

impl CheckType {
    pub const ALL: [CheckType; 3] = [CheckType::Device, CheckType::Biometric, CheckType::Combo];

    pub fn as_str(self) -> &'static str {
        match self {
            CheckType::Device => "DEVICE",
            CheckType::Biometric => "BIOMETRIC",
            CheckType::Combo => "COMBO",
        }
    }

    /// Exact, case-sensitive lookup
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == token)
    }
}

/// Accepted `activityType` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Signup,
    Login,
    Payment,
    Confirmation,
}

impl ActivityType {
    pub const ALL: [ActivityType; 4] = [
        ActivityType::Signup,
        ActivityType::Login,
        ActivityType::Payment,
        ActivityType::Confirmation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Signup => "SIGNUP",
            ActivityType::Login => "LOGIN",
            ActivityType::Payment => "PAYMENT",
            ActivityType::Confirmation => "CONFIRMATION",
        }
    }

    /// Exact, case-sensitive lookup
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == token)
    }
}

/// Value kinds named by `kvpType`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Bool,
}

impl ValueKind {
    pub fn as_tag(self) -> &'static str {
        match self {
            ValueKind::String => "general.string",
            ValueKind::Integer => "general.integer",
            ValueKind::Float => "general.float",
            ValueKind::Bool => "general.bool",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "general.string" => Some(ValueKind::String),
            "general.integer" => Some(ValueKind::Integer),
            "general.float" => Some(ValueKind::Float),
            "general.bool" => Some(ValueKind::Bool),
            _ => None,
        }
    }

    /// Whether `raw` is a well-formed value of this kind
    pub fn accepts(self, raw: &str) -> bool {
        match self {
            ValueKind::String => true,
            ValueKind::Integer => raw.parse::<i64>().is_ok(),
            ValueKind::Float => parse_float(raw).is_some(),
            ValueKind::Bool => parse_bool(raw).is_some(),
        }
    }
}

/// Parse a 64-bit float in decimal or `0x` hexadecimal form, rejecting
/// finite literals that overflow to infinity
pub fn parse_float(raw: &str) -> Option<f64> {
    let value = match raw.parse::<f64>() {
        Ok(value) => value,
        Err(_) => parse_hex_float(raw)?,
    };
    if value.is_infinite() && !raw.to_ascii_lowercase().contains("inf") {
        return None;
    }
    Some(value)
}

/// Hexadecimal float such as `0x1.8p3`; the binary exponent is required
fn parse_hex_float(raw: &str) -> Option<f64> {
    let (negative, rest) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    let rest = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X"))?;
    let (mantissa, exponent) = rest.split_once(['p', 'P'])?;
    let exponent: i32 = exponent.parse().ok()?;

    let (int_digits, frac_digits) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }

    let mut value = 0f64;
    for c in int_digits.chars().chain(frac_digits.chars()) {
        value = value * 16.0 + f64::from(c.to_digit(16)?);
    }

    let frac_bits = i32::try_from(frac_digits.len()).ok()?.checked_mul(4)?;
    let value = value * 2f64.powi(exponent.checked_sub(frac_bits)?);
    Some(if negative { -value } else { value })
}

/// Parse a boolean using the conventional short and long spellings
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_record() {
        let json = r#"{
            "checkType": "DEVICE",
            "activityType": "SIGNUP",
            "checkSessionKey": "string",
            "activityData": [
                {"kvpKey": "ip.address", "kvpValue": "true", "kvpType": "general.bool"}
            ]
        }"#;

        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.check_type, "DEVICE");
        assert_eq!(record.activity_type, "SIGNUP");
        assert_eq!(record.check_session_key, "string");
        assert_eq!(
            record.activity_data,
            vec![KeyValueEntry::new("ip.address", "true", "general.bool")]
        );
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let record: Record = serde_json::from_str(r#"{"checkType": "COMBO"}"#).unwrap();
        assert_eq!(record.check_type, "COMBO");
        assert!(record.activity_type.is_empty());
        assert!(record.activity_data.is_empty());

        let entry: KeyValueEntry = serde_json::from_str(r#"{"kvpKey": "k"}"#).unwrap();
        assert_eq!(entry.kind, "");
    }

    #[test]
    fn test_null_fields_default_to_empty() {
        let records: Vec<Record> = serde_json::from_str(
            r#"[{"checkType":"DEVICE","activityType":"SIGNUP","checkSessionKey":null,"activityData":null}]"#,
        )
        .unwrap();
        assert_eq!(records[0].check_type, "DEVICE");
        assert!(records[0].check_session_key.is_empty());
        assert!(records[0].activity_data.is_empty());

        let record: Record =
            serde_json::from_str(r#"{"checkType":null,"activityType":null}"#).unwrap();
        assert!(record.check_type.is_empty());
        assert!(record.activity_type.is_empty());

        let entry: KeyValueEntry =
            serde_json::from_str(r#"{"kvpKey":null,"kvpValue":null,"kvpType":null}"#).unwrap();
        assert_eq!(entry, KeyValueEntry::default());
    }

    #[test]
    fn test_token_lookup_is_exact() {
        assert_eq!(CheckType::from_token("BIOMETRIC"), Some(CheckType::Biometric));
        assert_eq!(CheckType::from_token("biometric"), None);
        assert_eq!(CheckType::from_token("DEVICE1"), None);
        assert_eq!(ActivityType::from_token("CONFIRMATION"), Some(ActivityType::Confirmation));
        assert_eq!(ActivityType::from_token("LOGIN_2"), None);
    }

    #[test]
    fn test_value_kind_tags() {
        for kind in [ValueKind::String, ValueKind::Integer, ValueKind::Float, ValueKind::Bool] {
            assert_eq!(ValueKind::from_tag(kind.as_tag()), Some(kind));
        }
        assert_eq!(ValueKind::from_tag("general.non"), None);
        assert_eq!(ValueKind::from_tag(""), None);
    }

    #[test]
    fn test_integer_values() {
        assert!(ValueKind::Integer.accepts("1"));
        assert!(ValueKind::Integer.accepts("-42"));
        assert!(ValueKind::Integer.accepts("+7"));
        assert!(!ValueKind::Integer.accepts("2.5"));
        assert!(!ValueKind::Integer.accepts("food"));
        assert!(!ValueKind::Integer.accepts("9223372036854775808"));
        assert!(!ValueKind::Integer.accepts(""));
    }

    #[test]
    fn test_float_values() {
        assert!(ValueKind::Float.accepts("2.33"));
        assert!(ValueKind::Float.accepts("1e10"));
        assert!(ValueKind::Float.accepts("-0.5"));
        assert!(ValueKind::Float.accepts("inf"));
        assert!(ValueKind::Float.accepts("NaN"));
        assert!(!ValueKind::Float.accepts("1e400"));
        assert!(!ValueKind::Float.accepts("food"));
    }

    #[test]
    fn test_hex_float_values() {
        assert_eq!(parse_float("0x1p-2"), Some(0.25));
        assert_eq!(parse_float("0X1.8P3"), Some(12.0));
        assert_eq!(parse_float("-0x.8p1"), Some(-1.0));
        assert_eq!(parse_float("+0xAp0"), Some(10.0));
        assert!(ValueKind::Float.accepts("0x1p-2"));
        assert!(!ValueKind::Float.accepts("0x1"));
        assert!(!ValueKind::Float.accepts("0x1p"));
        assert!(!ValueKind::Float.accepts("0xp1"));
        assert!(!ValueKind::Float.accepts("0xg1p0"));
        assert!(!ValueKind::Float.accepts("0x1p2000"));
    }

    #[test]
    fn test_bool_values() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert!(!ValueKind::Bool.accepts("food"));
        assert!(!ValueKind::Bool.accepts("yes"));
        assert!(!ValueKind::Bool.accepts("tRUE"));
    }

    #[test]
    fn test_string_accepts_anything() {
        assert!(ValueKind::String.accepts(""));
        assert!(ValueKind::String.accepts("2"));
    }
}
