// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Data type codec.
//!
//! Maps OPC UA built-in type tags to their symbolic names and coerces string
//! input into typed values for writes and method arguments.
//!
//! Coercion is total: malformed input never produces an error. Integers that
//! fail to parse become `0` and are clamped to the target range, floats that
//! fail to parse become `0.0`, and an unparseable date becomes
//! [`DateTimeValue::Invalid`].

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

// =============================================================================
// DataType
// =============================================================================

/// OPC UA built-in data types, indexed by their wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataType {
    /// 0
    Null = 0,
    /// 1
    Boolean = 1,
    /// 2
    SByte = 2,
    /// 3
    Byte = 3,
    /// 4
    Int16 = 4,
    /// 5
    UInt16 = 5,
    /// 6
    Int32 = 6,
    /// 7
    UInt32 = 7,
    /// 8
    Int64 = 8,
    /// 9
    UInt64 = 9,
    /// 10
    Float = 10,
    /// 11
    Double = 11,
    /// 12
    String = 12,
    /// 13
    DateTime = 13,
    /// 14
    Guid = 14,
    /// 15
    ByteString = 15,
    /// 16
    XmlElement = 16,
    /// 17
    NodeId = 17,
    /// 18
    ExpandedNodeId = 18,
    /// 19
    StatusCode = 19,
    /// 20
    QualifiedName = 20,
    /// 21
    LocalizedText = 21,
    /// 22
    ExtensionObject = 22,
    /// 23
    DataValue = 23,
    /// 24
    Variant = 24,
    /// 25
    DiagnosticInfo = 25,
}

impl DataType {
    /// All built-in types in tag order.
    pub const ALL: [DataType; 26] = [
        Self::Null,
        Self::Boolean,
        Self::SByte,
        Self::Byte,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float,
        Self::Double,
        Self::String,
        Self::DateTime,
        Self::Guid,
        Self::ByteString,
        Self::XmlElement,
        Self::NodeId,
        Self::ExpandedNodeId,
        Self::StatusCode,
        Self::QualifiedName,
        Self::LocalizedText,
        Self::ExtensionObject,
        Self::DataValue,
        Self::Variant,
        Self::DiagnosticInfo,
    ];

    /// Returns the wire tag.
    #[inline]
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Looks up a type by wire tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Returns the symbolic name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::ByteString => "ByteString",
            Self::XmlElement => "XmlElement",
            Self::NodeId => "NodeId",
            Self::ExpandedNodeId => "ExpandedNodeId",
            Self::StatusCode => "StatusCode",
            Self::QualifiedName => "QualifiedName",
            Self::LocalizedText => "LocalizedText",
            Self::ExtensionObject => "ExtensionObject",
            Self::DataValue => "DataValue",
            Self::Variant => "Variant",
            Self::DiagnosticInfo => "DiagnosticInfo",
        }
    }

    /// Looks up one of the writable scalar types by its exact name.
    pub fn writable_from_name(name: &str) -> Option<Self> {
        let data_type = Self::ALL.iter().find(|t| t.name() == name).copied()?;
        data_type.is_writable().then_some(data_type)
    }

    /// Returns `true` for the scalar types accepted by writes and calls.
    pub const fn is_writable(&self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::SByte
                | Self::Byte
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float
                | Self::Double
                | Self::String
                | Self::DateTime
                | Self::Guid
                | Self::ByteString
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves a declared data type name to its wire tag.
///
/// Names outside the writable set resolve to the `String` tag.
pub fn tag_for_name(name: &str) -> u32 {
    DataType::writable_from_name(name)
        .unwrap_or(DataType::String)
        .tag()
}

/// Resolves a wire tag to its symbolic name, if the tag is known.
pub fn name_for_tag(tag: Option<u32>) -> Option<&'static str> {
    tag.and_then(DataType::from_tag).map(|t| t.name())
}

// =============================================================================
// DateTimeValue
// =============================================================================

/// A coerced date/time, which may be the invalid-date sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeValue {
    /// A parsed instant.
    Valid(DateTime<Utc>),
    /// The input could not be parsed. Serializes as `null`.
    Invalid,
}

impl DateTimeValue {
    /// Returns `true` for the invalid-date sentinel.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    /// Returns the instant, if valid.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Valid(dt) => Some(*dt),
            Self::Invalid => None,
        }
    }

    fn to_json(self) -> JsonValue {
        match self {
            Self::Valid(dt) => JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Invalid => JsonValue::Null,
        }
    }
}

impl fmt::Display for DateTimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Invalid => f.write_str("Invalid Date"),
        }
    }
}

// =============================================================================
// OpcUaValue
// =============================================================================

/// A typed OPC UA value.
#[derive(Debug, Clone, PartialEq)]
pub enum OpcUaValue {
    /// Boolean value.
    Boolean(bool),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(DateTimeValue),
    /// GUID in its text form.
    Guid(String),
    /// Raw bytes.
    ByteString(Vec<u8>),
    /// Array of values.
    Array(Vec<OpcUaValue>),
    /// Null / empty value.
    Null,
}

impl OpcUaValue {
    /// Returns the built-in data type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::SByte(_) => DataType::SByte,
            Self::Byte(_) => DataType::Byte,
            Self::Int16(_) => DataType::Int16,
            Self::UInt16(_) => DataType::UInt16,
            Self::Int32(_) => DataType::Int32,
            Self::UInt32(_) => DataType::UInt32,
            Self::Int64(_) => DataType::Int64,
            Self::UInt64(_) => DataType::UInt64,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
            Self::DateTime(_) => DataType::DateTime,
            Self::Guid(_) => DataType::Guid,
            Self::ByteString(_) => DataType::ByteString,
            Self::Array(items) => items.first().map_or(DataType::Variant, |v| v.data_type()),
            Self::Null => DataType::Null,
        }
    }

    /// Returns `true` if this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as f64, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::SByte(v) => Some(*v as f64),
            Self::Byte(v) => Some(*v as f64),
            Self::Int16(v) => Some(*v as f64),
            Self::UInt16(v) => Some(*v as f64),
            Self::Int32(v) => Some(*v as f64),
            Self::UInt32(v) => Some(*v as f64),
            Self::Int64(v) => Some(*v as f64),
            Self::UInt64(v) => Some(*v as f64),
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Guid(s) => Some(s),
            _ => None,
        }
    }

    /// Converts the value into its JSON form.
    ///
    /// Byte strings render as base64, invalid dates and non-finite floats as
    /// `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Boolean(v) => JsonValue::Bool(*v),
            Self::SByte(v) => JsonValue::from(*v),
            Self::Byte(v) => JsonValue::from(*v),
            Self::Int16(v) => JsonValue::from(*v),
            Self::UInt16(v) => JsonValue::from(*v),
            Self::Int32(v) => JsonValue::from(*v),
            Self::UInt32(v) => JsonValue::from(*v),
            Self::Int64(v) => JsonValue::from(*v),
            Self::UInt64(v) => JsonValue::from(*v),
            Self::Float(v) => float_json(*v as f64),
            Self::Double(v) => float_json(*v),
            Self::String(s) | Self::Guid(s) => JsonValue::String(s.clone()),
            Self::DateTime(dt) => dt.to_json(),
            Self::ByteString(bytes) => JsonValue::String(BASE64.encode(bytes)),
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Null => JsonValue::Null,
        }
    }
}

fn float_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
}

impl Serialize for OpcUaValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for OpcUaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::Guid(s) => f.write_str(s),
            Self::DateTime(dt) => write!(f, "{}", dt),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

// =============================================================================
// Coercion
// =============================================================================

/// Coerces string input to the declared data type.
///
/// Unknown type names pass the input through as a string.
pub fn coerce(input: &str, data_type: &str) -> OpcUaValue {
    match DataType::writable_from_name(data_type) {
        Some(data_type) => coerce_to(input, data_type),
        None => OpcUaValue::String(input.to_string()),
    }
}

/// Coerces string input to a known data type.
pub fn coerce_to(input: &str, data_type: DataType) -> OpcUaValue {
    match data_type {
        DataType::Boolean => {
            let lower = input.to_lowercase();
            OpcUaValue::Boolean(matches!(lower.as_str(), "true" | "1" | "on" | "yes"))
        }
        DataType::SByte => OpcUaValue::SByte(clamp_int(input, i8::MIN as i128, i8::MAX as i128) as i8),
        DataType::Byte => OpcUaValue::Byte(clamp_int(input, 0, u8::MAX as i128) as u8),
        DataType::Int16 => {
            OpcUaValue::Int16(clamp_int(input, i16::MIN as i128, i16::MAX as i128) as i16)
        }
        DataType::UInt16 => OpcUaValue::UInt16(clamp_int(input, 0, u16::MAX as i128) as u16),
        DataType::Int32 => {
            OpcUaValue::Int32(clamp_int(input, i32::MIN as i128, i32::MAX as i128) as i32)
        }
        DataType::UInt32 => OpcUaValue::UInt32(clamp_int(input, 0, u32::MAX as i128) as u32),
        // 64-bit integers are only bounded by their representation.
        DataType::Int64 => {
            OpcUaValue::Int64(clamp_int(input, i64::MIN as i128, i64::MAX as i128) as i64)
        }
        DataType::UInt64 => OpcUaValue::UInt64(clamp_int(input, 0, u64::MAX as i128) as u64),
        DataType::Float => OpcUaValue::Float(parse_float_or_zero(input) as f32),
        DataType::Double => OpcUaValue::Double(parse_float_or_zero(input)),
        DataType::DateTime => OpcUaValue::DateTime(parse_datetime(input)),
        DataType::Guid => OpcUaValue::Guid(input.to_string()),
        DataType::ByteString => OpcUaValue::ByteString(input.as_bytes().to_vec()),
        _ => OpcUaValue::String(input.to_string()),
    }
}

/// Coerces a JSON argument value to the declared data type.
///
/// Strings are coerced as-is; numbers and booleans through their text form;
/// `null` as the empty string.
pub fn coerce_json(value: &JsonValue, data_type: &str) -> OpcUaValue {
    match value {
        JsonValue::String(s) => coerce(s, data_type),
        JsonValue::Null => coerce("", data_type),
        other => coerce(&other.to_string(), data_type),
    }
}

fn clamp_int(input: &str, min: i128, max: i128) -> i128 {
    parse_int_prefix(input).unwrap_or(0).clamp(min, max)
}

fn parse_float_or_zero(input: &str) -> f64 {
    match parse_float_prefix(input) {
        Some(v) if v != 0.0 && !v.is_nan() => v,
        _ => 0.0,
    }
}

/// Parses the longest leading integer prefix.
///
/// Leading whitespace and a sign are accepted, as is a `0x` prefix for hex.
/// Returns `None` when no digit is found. Overlong input saturates.
pub fn parse_int_prefix(input: &str) -> Option<i128> {
    let s = input.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = match s.get(..2) {
        Some("0x") | Some("0X") => (16, &s[2..]),
        _ => (10, s),
    };

    let mut value: i128 = 0;
    let mut seen = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else { break };
        seen = true;
        value = value.saturating_mul(radix as i128).saturating_add(d as i128);
    }

    seen.then_some(if negative { -value } else { value })
}

/// Parses the longest leading decimal float prefix.
///
/// Accepts an optional sign, `Infinity`, digits with an optional fraction and
/// exponent. Returns `None` when no number is found.
pub fn parse_float_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    if s[end..].starts_with("Infinity") {
        let sign = if bytes.first() == Some(&b'-') { -1.0 } else { 1.0 };
        return Some(sign * f64::INFINITY);
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }

    if mantissa_digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Parses a date/time string, yielding the invalid sentinel on failure.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS[.fff]` and `YYYY-MM-DD HH:MM:SS`
/// (both read as UTC), and a bare `YYYY-MM-DD` (UTC midnight).
pub fn parse_datetime(input: &str) -> DateTimeValue {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return DateTimeValue::Valid(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return DateTimeValue::Valid(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return DateTimeValue::Valid(naive.and_utc());
        }
    }

    DateTimeValue::Invalid
}

// =============================================================================
// MethodArgument
// =============================================================================

/// A method input argument as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodArgument {
    /// Declared data type name.
    #[serde(default = "default_argument_type")]
    pub data_type: String,
    /// Raw value.
    #[serde(default)]
    pub value: JsonValue,
}

fn default_argument_type() -> String {
    DataType::String.name().to_string()
}

impl MethodArgument {
    /// Creates a new argument.
    pub fn new(data_type: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            data_type: data_type.into(),
            value: value.into(),
        }
    }

    /// Coerces the raw value to its declared type.
    pub fn coerce(&self) -> OpcUaValue {
        coerce_json(&self.value, &self.data_type)
    }
}

// =============================================================================
// Tests
// =============================================================================
