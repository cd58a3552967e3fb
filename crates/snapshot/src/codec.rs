//! Entity codec: one row as one type-tagged JSON object
//!
//! ```text
//! {"PartitionKey":"p","RowKey":"r","Timestamp":"2024-01-02T03:04:05.123Z","ETag":null,
//!  "Qty":{"Qty":"42","EdmType":"Int32"}}
//! ```
//!
//! The four reserved fields come first, then every property as an object that
//! holds the stringified value under the property's own name next to its
//! `EdmType` tag. Decoding never infers a kind from the JSON value: the tag
//! decides how the text is parsed, so `Int32` and `Int64` survive the trip.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tablesnap_core::row::{ETAG, PARTITION_KEY, ROW_KEY, TIMESTAMP};
use tablesnap_core::value::{format_timestamp, parse_timestamp};
use tablesnap_core::{CodecError, EdmType, Properties, Row, TypedValue};

/// Key of the kind tag inside a property object
pub const EDM_TYPE_KEY: &str = "EdmType";

/// Encodes and decodes rows.
///
/// Excluded properties are dropped on encode only; the reserved fields are
/// always written.
#[derive(Debug, Clone, Default)]
pub struct EntityCodec {
    excluded: Vec<String>,
}

impl EntityCodec {
    /// Codec with no exclusions
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec that omits the named properties when encoding
    pub fn with_excluded<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EntityCodec {
            excluded: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Property names omitted on encode
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|e| e == name)
    }

    /// Encode a row as a single line (no terminator)
    pub fn encode(&self, row: &Row) -> Result<String, CodecError> {
        serde_json::to_string(&EncodedRow { codec: self, row })
            .map_err(|e| CodecError::Malformed(e.to_string()))
    }

    /// Decode one line into a row
    pub fn decode(&self, line: &str) -> Result<Row, CodecError> {
        let raw: RawEntity =
            serde_json::from_str(line).map_err(|e| CodecError::Malformed(e.to_string()))?;
        raw.into_row()
    }
}

struct EncodedRow<'a> {
    codec: &'a EntityCodec,
    row: &'a Row,
}

impl Serialize for EncodedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let row = self.row;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(PARTITION_KEY, &row.partition_key)?;
        map.serialize_entry(ROW_KEY, &row.row_key)?;
        map.serialize_entry(TIMESTAMP, &row.timestamp.as_ref().map(format_timestamp))?;
        map.serialize_entry(ETAG, &row.etag)?;
        for (name, value) in &row.properties {
            if self.codec.is_excluded(name) {
                continue;
            }
            map.serialize_entry(name, &EncodedProperty { name, value })?;
        }
        map.end()
    }
}

struct EncodedProperty<'a> {
    name: &'a str,
    value: &'a TypedValue,
}

impl Serialize for EncodedProperty<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Value before tag: a property literally named "EdmType" decodes by position.
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.name, &self.value.to_wire_string())?;
        map.serialize_entry(EDM_TYPE_KEY, self.value.edm_type().as_str())?;
        map.end()
    }
}

/// Top-level fields in document order, duplicates kept
struct RawEntity(Vec<(String, RawField)>);

enum RawField {
    Scalar(JsonValue),
    Object(Vec<(String, JsonValue)>),
}

impl<'de> Deserialize<'de> for RawEntity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntityVisitor;

        impl<'de> Visitor<'de> for EntityVisitor {
            type Value = RawEntity;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an entity object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RawEntity, A::Error> {
                let mut fields = Vec::new();
                while let Some(key) = access.next_key::<String>()? {
                    fields.push((key, access.next_value::<RawField>()?));
                }
                Ok(RawEntity(fields))
            }
        }

        deserializer.deserialize_map(EntityVisitor)
    }
}

impl<'de> Deserialize<'de> for RawField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldVisitor;

        impl<'de> Visitor<'de> for FieldVisitor {
            type Value = RawField;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a scalar or a property object")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<RawField, E> {
                Ok(RawField::Scalar(JsonValue::Bool(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawField, E> {
                Ok(RawField::Scalar(JsonValue::from(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawField, E> {
                Ok(RawField::Scalar(JsonValue::from(v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawField, E> {
                Ok(RawField::Scalar(JsonValue::from(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RawField, E> {
                Ok(RawField::Scalar(JsonValue::String(v.to_string())))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<RawField, E> {
                Ok(RawField::Scalar(JsonValue::String(v)))
            }

            fn visit_unit<E: de::Error>(self) -> Result<RawField, E> {
                Ok(RawField::Scalar(JsonValue::Null))
            }

            fn visit_none<E: de::Error>(self) -> Result<RawField, E> {
                Ok(RawField::Scalar(JsonValue::Null))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawField, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<JsonValue>()? {
                    items.push(item);
                }
                Ok(RawField::Scalar(JsonValue::Array(items)))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RawField, A::Error> {
                let mut entries = Vec::new();
                while let Some(key) = access.next_key::<String>()? {
                    entries.push((key, access.next_value::<JsonValue>()?));
                }
                Ok(RawField::Object(entries))
            }
        }

        deserializer.deserialize_any(FieldVisitor)
    }
}

impl RawEntity {
    fn into_row(self) -> Result<Row, CodecError> {
        let mut partition_key = None;
        let mut row_key = None;
        let mut timestamp = None;
        let mut etag = None;
        let mut properties = Properties::new();

        for (name, field) in self.0 {
            match name.as_str() {
                PARTITION_KEY => partition_key = reserved_string(&name, field)?,
                ROW_KEY => row_key = reserved_string(&name, field)?,
                TIMESTAMP => {
                    timestamp = match reserved_string(&name, field)? {
                        Some(raw) => Some(parse_timestamp(&raw).map_err(|reason| {
                            CodecError::InvalidValue {
                                property: name.clone(),
                                kind: EdmType::DateTime,
                                value: raw,
                                reason,
                            }
                        })?),
                        None => None,
                    }
                }
                ETAG => etag = reserved_string(&name, field)?,
                _ => {
                    let Some(value) = decode_property(&name, field)? else {
                        continue;
                    };
                    if properties.contains(&name) {
                        return Err(CodecError::DuplicateProperty(name));
                    }
                    properties.insert(name, value)?;
                }
            }
        }

        Ok(Row {
            partition_key: partition_key.ok_or(CodecError::MissingKey(PARTITION_KEY))?,
            row_key: row_key.ok_or(CodecError::MissingKey(ROW_KEY))?,
            timestamp,
            etag,
            properties,
        })
    }
}

fn reserved_string(name: &str, field: RawField) -> Result<Option<String>, CodecError> {
    match field {
        RawField::Scalar(JsonValue::Null) => Ok(None),
        RawField::Scalar(JsonValue::String(s)) => Ok(Some(s)),
        _ => Err(CodecError::Malformed(format!("'{}' must be a string", name))),
    }
}

/// `None` for a null property, which is dropped
fn decode_property(name: &str, field: RawField) -> Result<Option<TypedValue>, CodecError> {
    let entries = match field {
        RawField::Scalar(JsonValue::Null) => return Ok(None),
        RawField::Scalar(_) => {
            return Err(CodecError::Malformed(format!(
                "property '{}' is not a typed object",
                name
            )))
        }
        RawField::Object(entries) => entries,
    };

    let mut value: Option<JsonValue> = None;
    let mut tag: Option<JsonValue> = None;
    for (key, item) in entries {
        if key == name && value.is_none() {
            value = Some(item);
        } else if key == EDM_TYPE_KEY && tag.is_none() {
            tag = Some(item);
        }
    }

    let tag = match tag {
        Some(JsonValue::String(tag)) => tag,
        Some(JsonValue::Null) | None => {
            return Err(CodecError::MissingEdmType {
                property: name.to_string(),
            })
        }
        Some(other) => other.to_string(),
    };
    let kind: EdmType = tag.parse().map_err(|source| CodecError::UnknownEdmType {
        property: name.to_string(),
        source,
    })?;

    let raw = match value {
        None => return Err(CodecError::MissingValue(name.to_string())),
        Some(JsonValue::Null) => return Ok(None),
        Some(JsonValue::String(s)) => s,
        Some(JsonValue::Bool(b)) => b.to_string(),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(_) => {
            return Err(CodecError::Malformed(format!(
                "property '{}' value is not a scalar",
                name
            )))
        }
    };

    TypedValue::parse(kind, &raw)
        .map(Some)
        .map_err(|e| CodecError::InvalidValue {
            property: name.to_string(),
            kind,
            value: e.raw,
            reason: e.reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn sample_row() -> Row {
        Row::new("orders-2024", "0001")
            .with_timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
            .with_etag("W/\"datetime'2024-03-01T12%3A30%3A00Z'\"")
            .with_property("Customer", "ACME")
            .unwrap()
            .with_property("Qty", 42i32)
            .unwrap()
            .with_property("Total", 42i64)
            .unwrap()
            .with_property("Price", 19.5f64)
            .unwrap()
            .with_property("Paid", true)
            .unwrap()
            .with_property("Id", Uuid::nil())
            .unwrap()
            .with_property("Blob", vec![0u8, 1, 2, 255])
            .unwrap()
            .with_property(
                "Shipped",
                Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn test_roundtrip_all_kinds() {
        let codec = EntityCodec::new();
        let row = sample_row();
        let line = codec.encode(&row).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(codec.decode(&line).unwrap(), row);
    }

    #[test]
    fn test_wire_shape() {
        let row = Row::new("p", "r").with_property("Qty", 7i64).unwrap();
        let line = EntityCodec::new().encode(&row).unwrap();
        assert_eq!(
            line,
            r#"{"PartitionKey":"p","RowKey":"r","Timestamp":null,"ETag":null,"Qty":{"Qty":"7","EdmType":"Int64"}}"#
        );
    }

    #[test]
    fn test_int_width_is_preserved() {
        let codec = EntityCodec::new();
        let row = Row::new("p", "r")
            .with_property("Small", 5i32)
            .unwrap()
            .with_property("Big", 5i64)
            .unwrap();
        let decoded = codec.decode(&codec.encode(&row).unwrap()).unwrap();
        assert_eq!(decoded.properties.get("Small"), Some(&TypedValue::Int32(5)));
        assert_eq!(decoded.properties.get("Big"), Some(&TypedValue::Int64(5)));
    }

    #[test]
    fn test_excluded_properties_are_dropped() {
        let codec = EntityCodec::with_excluded(["Customer", "PartitionKey"]);
        let line = codec.encode(&sample_row()).unwrap();
        assert!(!line.contains("Customer"));
        assert!(line.contains("\"PartitionKey\":\"orders-2024\""));
        let decoded = codec.decode(&line).unwrap();
        assert!(decoded.properties.get("Customer").is_none());
        assert_eq!(decoded.properties.len(), sample_row().properties.len() - 1);
    }

    #[test]
    fn test_property_order_is_preserved() {
        let codec = EntityCodec::new();
        let line = r#"{"PartitionKey":"p","RowKey":"r","z":{"z":"1","EdmType":"Int32"},"a":{"a":"x","EdmType":"String"}}"#;
        let row = codec.decode(line).unwrap();
        let names: Vec<&str> = row.properties.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a"]);
    }

    #[test]
    fn test_property_named_edm_type() {
        let codec = EntityCodec::new();
        let row = Row::new("p", "r").with_property("EdmType", 3i32).unwrap();
        let decoded = codec.decode(&codec.encode(&row).unwrap()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn test_decode_accepts_legacy_tags_and_scalars() {
        let codec = EntityCodec::new();
        let line = r#"{"PartitionKey":"p","RowKey":"r","Timestamp":"2024-01-01T00:00:00+02:00","n":{"n":12,"EdmType":"int64"},"b":{"b":true,"EdmType":"Boolean"},"g":{"g":"00000000-0000-0000-0000-000000000000","EdmType":"Guid"}}"#;
        let row = codec.decode(line).unwrap();
        assert_eq!(row.properties.get("n"), Some(&TypedValue::Int64(12)));
        assert_eq!(row.properties.get("b"), Some(&TypedValue::Boolean(true)));
        assert_eq!(row.properties.get("g"), Some(&TypedValue::Guid(Uuid::nil())));
        assert_eq!(
            row.timestamp,
            Some(Utc.with_ymd_and_hms(2023, 12, 31, 22, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_null_property_is_skipped() {
        let codec = EntityCodec::new();
        let line = r#"{"PartitionKey":"p","RowKey":"r","gone":null,"also":{"also":null,"EdmType":"String"}}"#;
        let row = codec.decode(line).unwrap();
        assert!(row.properties.is_empty());
    }

    #[test]
    fn test_missing_edm_type() {
        let line = r#"{"PartitionKey":"p","RowKey":"r","Qty":{"Qty":"1"}}"#;
        let err = EntityCodec::new().decode(line).unwrap_err();
        assert!(matches!(err, CodecError::MissingEdmType { ref property } if property == "Qty"));
    }

    #[test]
    fn test_unknown_edm_type() {
        let line = r#"{"PartitionKey":"p","RowKey":"r","Qty":{"Qty":"1","EdmType":"Decimal"}}"#;
        let err = EntityCodec::new().decode(line).unwrap_err();
        assert!(matches!(err, CodecError::UnknownEdmType { .. }));
    }

    #[test]
    fn test_value_out_of_range_for_width() {
        let line = r#"{"PartitionKey":"p","RowKey":"r","Qty":{"Qty":"4294967296","EdmType":"Int32"}}"#;
        let err = EntityCodec::new().decode(line).unwrap_err();
        match err {
            CodecError::InvalidValue { property, kind, .. } => {
                assert_eq!(property, "Qty");
                assert_eq!(kind, EdmType::Int32);
            }
            other => panic!("Wrong error variant: {:?}", other),
        }
    }

    #[test]
    fn test_missing_keys() {
        let codec = EntityCodec::new();
        let err = codec.decode(r#"{"RowKey":"r"}"#).unwrap_err();
        assert_eq!(err, CodecError::MissingKey(PARTITION_KEY));
        let err = codec.decode(r#"{"PartitionKey":"p","RowKey":null}"#).unwrap_err();
        assert_eq!(err, CodecError::MissingKey(ROW_KEY));
    }

    #[test]
    fn test_duplicate_property() {
        let line = r#"{"PartitionKey":"p","RowKey":"r","a":{"a":"1","EdmType":"Int32"},"a":{"a":"2","EdmType":"Int32"}}"#;
        let err = EntityCodec::new().decode(line).unwrap_err();
        assert_eq!(err, CodecError::DuplicateProperty("a".to_string()));
    }

    #[test]
    fn test_malformed_lines() {
        let codec = EntityCodec::new();
        assert!(matches!(codec.decode("not json"), Err(CodecError::Malformed(_))));
        assert!(matches!(codec.decode("[1,2]"), Err(CodecError::Malformed(_))));
        assert!(matches!(
            codec.decode(r#"{"PartitionKey":"p","RowKey":"r","x":"untyped"}"#),
            Err(CodecError::Malformed(_))
        ));
    }

    fn arb_typed_value() -> impl Strategy<Value = TypedValue> {
        prop_oneof![
            ".*".prop_map(TypedValue::String),
            prop::collection::vec(any::<u8>(), 0..64).prop_map(TypedValue::Bytes),
            any::<bool>().prop_map(TypedValue::Boolean),
            (0i64..4_102_444_800, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
                TypedValue::DateTime(Utc.timestamp_opt(secs, nanos).unwrap())
            }),
            // NaN != NaN
            any::<f64>()
                .prop_filter("not NaN", |f| !f.is_nan())
                .prop_map(TypedValue::Double),
            any::<u128>().prop_map(|n| TypedValue::Guid(Uuid::from_u128(n))),
            any::<i32>().prop_map(TypedValue::Int32),
            any::<i64>().prop_map(TypedValue::Int64),
        ]
    }

    fn arb_row() -> impl Strategy<Value = Row> {
        (
            ".*",
            ".*",
            prop::option::of((0i64..4_102_444_800).prop_map(|s| Utc.timestamp_opt(s, 0).unwrap())),
            prop::option::of("[ -~]{0,20}"),
            prop::collection::vec(("p_[a-zA-Z0-9_]{0,8}", arb_typed_value()), 0..10),
        )
            .prop_map(|(pk, rk, timestamp, etag, props)| {
                let mut row = Row::new(pk, rk);
                row.timestamp = timestamp;
                row.etag = etag;
                for (name, value) in props {
                    row.properties.insert(name, value).unwrap();
                }
                row
            })
    }

    proptest! {
        #[test]
        fn row_roundtrip(row in arb_row()) {
            let codec = EntityCodec::new();
            let line = codec.encode(&row).unwrap();
            prop_assert!(!line.contains('\n'));
            prop_assert_eq!(codec.decode(&line).unwrap(), row);
        }
    }
}
