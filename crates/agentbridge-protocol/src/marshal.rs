//! Conversion between host [`Value`]s and the canonical JSON document.
//!
//! Both directions are recursive and depth first: children are converted
//! before their parent container is assembled, and sibling order is kept.
//!
//! Marshaling builds a brand new [`Document`], so a failure halfway through
//! a large payload leaves nothing behind. Callers treat the whole payload as
//! one unit and drop it on error instead of sending a truncated message.

use serde_json::{Map, Number};

use crate::{Dictionary, ProtocolError, Value};

/// The canonical serialized form of a [`Value`].
pub type Document = serde_json::Value;

// ---------------------------------------------------------------------------
// marshal: Value -> Document
// ---------------------------------------------------------------------------

/// Converts a host value into a canonical document.
///
/// # Errors
/// Returns [`ProtocolError::UnsupportedType`] if the value (or anything
/// nested inside it) is a [`Value::Other`], a non-finite float, or a
/// dictionary key that cannot be turned into a string.
pub fn marshal(value: &Value) -> Result<Document, ProtocolError> {
    match value {
        Value::Nil => Ok(Document::Null),
        Value::Bool(b) => Ok(Document::Bool(*b)),
        Value::Int(i) => Ok(Document::Number(Number::from(*i))),
        Value::Float(f) => marshal_float(*f),
        Value::String(s) => Ok(Document::String(s.clone())),
        Value::Array(items) => {
            items.iter().map(marshal).collect::<Result<_, _>>().map(Document::Array)
        }
        Value::Dictionary(dict) => marshal_dictionary(dict),
        Value::PackedBytes(bytes) => Ok(Document::Array(
            bytes.iter().map(|b| Document::Number(Number::from(*b))).collect(),
        )),
        Value::PackedInts(ints) => Ok(Document::Array(
            ints.iter().map(|i| Document::Number(Number::from(*i))).collect(),
        )),
        Value::PackedFloats(floats) => marshal_floats(floats),
        Value::PackedStrings(strings) => Ok(Document::Array(
            strings.iter().cloned().map(Document::String).collect(),
        )),
        Value::PackedVector2(vectors) => marshal_tuples(vectors),
        Value::PackedVector3(vectors) => marshal_tuples(vectors),
        Value::PackedColors(colors) => marshal_tuples(colors),
        Value::Other { kind } => Err(ProtocolError::unsupported(kind.clone())),
    }
}

fn marshal_float(f: f64) -> Result<Document, ProtocolError> {
    Number::from_f64(f)
        .map(Document::Number)
        .ok_or_else(|| ProtocolError::unsupported(format!("non-finite float {f}")))
}

fn marshal_floats(floats: &[f64]) -> Result<Document, ProtocolError> {
    floats
        .iter()
        .map(|f| marshal_float(*f))
        .collect::<Result<_, _>>()
        .map(Document::Array)
}

fn marshal_tuples<const N: usize>(
    tuples: &[[f64; N]],
) -> Result<Document, ProtocolError> {
    tuples
        .iter()
        .map(|tuple| marshal_floats(tuple))
        .collect::<Result<_, _>>()
        .map(Document::Array)
}

fn marshal_dictionary(dict: &Dictionary) -> Result<Document, ProtocolError> {
    let mut object = Map::with_capacity(dict.len());
    for (key, value) in dict.iter() {
        let key = key_to_string(key)?;
        if object.contains_key(&key) {
            return Err(ProtocolError::unsupported(format!(
                "duplicate dictionary key {key:?} after coercion"
            )));
        }
        object.insert(key, marshal(value)?);
    }
    Ok(Document::Object(object))
}

/// Coerces a dictionary key to its wire string.
///
/// Scalars are rendered as text; containers and unsupported kinds have no
/// sensible string form and are rejected.
pub fn key_to_string(key: &Value) -> Result<String, ProtocolError> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Nil => Ok("null".to_string()),
        other => Err(ProtocolError::unsupported(format!(
            "{} as dictionary key",
            other.kind()
        ))),
    }
}

// ---------------------------------------------------------------------------
// unmarshal: Document -> Value
// ---------------------------------------------------------------------------

/// Converts a canonical document back into a host value.
///
/// Scalars are chosen by the node's own type tag, never by looking at the
/// contents of strings. Integers decode as signed 64-bit.
///
/// # Errors
/// Returns [`ProtocolError::UnsupportedType`] for integers that only fit in
/// an unsigned 64-bit value.
pub fn unmarshal(doc: &Document) -> Result<Value, ProtocolError> {
    match doc {
        Document::Null => Ok(Value::Nil),
        Document::Bool(b) => Ok(Value::Bool(*b)),
        Document::Number(n) => unmarshal_number(n),
        Document::String(s) => Ok(Value::String(s.clone())),
        Document::Array(items) => {
            items.iter().map(unmarshal).collect::<Result<_, _>>().map(Value::Array)
        }
        Document::Object(object) => {
            let mut dict = Dictionary::new();
            for (key, child) in object {
                dict.insert(key.as_str(), unmarshal(child)?);
            }
            Ok(Value::Dictionary(dict))
        }
    }
}

fn unmarshal_number(n: &Number) -> Result<Value, ProtocolError> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Int(i))
    } else if n.is_u64() {
        Err(ProtocolError::unsupported(format!(
            "integer {n} outside the signed 64-bit range"
        )))
    } else {
        n.as_f64()
            .map(Value::Float)
            .ok_or_else(|| ProtocolError::unsupported(format!("number {n}")))
    }
}

/// Parses JSON text and unmarshals it into a host value.
///
/// Nesting deeper than 128 levels is refused as a parse error.
///
/// # Errors
/// Returns [`ProtocolError::Parse`] for malformed text, carrying serde_json's
/// diagnostic, or any error from [`unmarshal`].
pub fn parse_document(bytes: &[u8]) -> Result<Value, ProtocolError> {
    let doc: Document =
        serde_json::from_slice(bytes).map_err(ProtocolError::Parse)?;
    unmarshal(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested_sample() -> Value {
        let mut inner = Dictionary::new();
        inner.insert("name", "scout");
        inner.insert("alive", true);
        inner.insert("target", Value::Nil);

        let mut outer = Dictionary::new();
        outer.insert("hp", 100);
        outer.insert(
            "pos",
            Value::Array(vec![Value::Float(1.5), Value::Float(2.0)]),
        );
        outer.insert("agent", inner);
        outer.insert(
            "history",
            Value::Array(vec![
                Value::Array(vec![Value::Int(-1), Value::from("left")]),
                Value::Dictionary(Dictionary::from_iter([("step", 2)])),
                Value::Array(vec![]),
            ]),
        );
        Value::Dictionary(outer)
    }

    #[test]
    fn test_marshal_scalars() {
        assert_eq!(marshal(&Value::Nil).unwrap(), json!(null));
        assert_eq!(marshal(&Value::Bool(true)).unwrap(), json!(true));
        assert_eq!(marshal(&Value::Int(-42)).unwrap(), json!(-42));
        assert_eq!(marshal(&Value::Float(0.25)).unwrap(), json!(0.25));
        assert_eq!(marshal(&Value::from("héllo")).unwrap(), json!("héllo"));
    }

    #[test]
    fn test_marshal_nested_keeps_structure() {
        let doc = marshal(&nested_sample()).unwrap();
        assert_eq!(
            doc,
            json!({
                "hp": 100,
                "pos": [1.5, 2.0],
                "agent": {"name": "scout", "alive": true, "target": null},
                "history": [[-1, "left"], {"step": 2}, []]
            })
        );
    }

    #[test]
    fn test_round_trip_nested_value() {
        let value = nested_sample();
        let back = unmarshal(&marshal(&value).unwrap()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_round_trip_deeply_nested_arrays() {
        let mut value = Value::Int(7);
        for depth in 0..64 {
            value = if depth % 2 == 0 {
                Value::Array(vec![value, Value::Nil])
            } else {
                Value::Dictionary(Dictionary::from_iter([("d", value)]))
            };
        }
        let back = unmarshal(&marshal(&value).unwrap()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_marshal_other_kind_fails() {
        let err = marshal(&Value::Other { kind: "Object".into() }).unwrap_err();
        assert!(
            matches!(err, ProtocolError::UnsupportedType { ref kind } if kind == "Object")
        );
    }

    #[test]
    fn test_marshal_nested_unsupported_produces_no_output() {
        let value = Value::Array(vec![
            Value::Int(1),
            Value::Dictionary(Dictionary::from_iter([(
                "node",
                Value::Other { kind: "NodePath".into() },
            )])),
            Value::Int(3),
        ]);
        assert!(marshal(&value).is_err());
    }

    #[test]
    fn test_marshal_non_finite_float_fails() {
        assert!(marshal(&Value::Float(f64::NAN)).is_err());
        assert!(marshal(&Value::PackedFloats(vec![1.0, f64::INFINITY])).is_err());
    }

    #[test]
    fn test_marshal_packed_arrays_element_wise() {
        assert_eq!(
            marshal(&Value::PackedBytes(vec![0, 255])).unwrap(),
            json!([0, 255])
        );
        assert_eq!(
            marshal(&Value::PackedInts(vec![-3, 4])).unwrap(),
            json!([-3, 4])
        );
        assert_eq!(
            marshal(&Value::PackedStrings(vec!["a".into(), "b".into()])).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(
            marshal(&Value::PackedVector2(vec![[1.0, 2.0], [3.5, 4.5]])).unwrap(),
            json!([[1.0, 2.0], [3.5, 4.5]])
        );
        assert_eq!(
            marshal(&Value::PackedColors(vec![[1.0, 0.5, 0.0, 1.0]])).unwrap(),
            json!([[1.0, 0.5, 0.0, 1.0]])
        );
    }

    #[test]
    fn test_dictionary_keys_coerced_to_strings() {
        let mut dict = Dictionary::new();
        dict.insert(1, "one");
        dict.insert(true, "yes");
        dict.insert(Value::Nil, "nothing");
        let doc = marshal(&Value::Dictionary(dict)).unwrap();
        assert_eq!(doc, json!({"1": "one", "true": "yes", "null": "nothing"}));
    }

    #[test]
    fn test_colliding_coerced_keys_fail() {
        let mut dict = Dictionary::new();
        dict.insert(1, "int key");
        dict.insert("1", "string key");
        assert_eq!(dict.len(), 2);
        match marshal(&Value::Dictionary(dict)) {
            Err(ProtocolError::UnsupportedType { kind }) => {
                assert!(kind.contains("duplicate dictionary key"), "{kind}");
            }
            other => panic!("expected UnsupportedType, got {other:?}"),
        }
    }

    #[test]
    fn test_container_key_is_unsupported() {
        let mut dict = Dictionary::new();
        dict.insert(Value::Array(vec![]), 1);
        assert!(matches!(
            marshal(&Value::Dictionary(dict)),
            Err(ProtocolError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_unmarshal_uses_type_tags_not_contents() {
        let value = unmarshal(&json!(["12", 12, 12.0, "true", true])).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::from("12"),
                Value::Int(12),
                Value::Float(12.0),
                Value::from("true"),
                Value::Bool(true),
            ])
        );
    }

    #[test]
    fn test_unmarshal_rejects_unsigned_overflow() {
        let doc = json!({"big": u64::MAX});
        assert!(matches!(
            unmarshal(&doc),
            Err(ProtocolError::UnsupportedType { .. })
        ));
        assert_eq!(
            unmarshal(&json!(i64::MIN)).unwrap(),
            Value::Int(i64::MIN)
        );
    }

    #[test]
    fn test_parse_document_reports_syntax_error() {
        let err = parse_document(b"{not valid json").unwrap_err();
        assert!(matches!(err, ProtocolError::Parse(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_parse_document_truncated_object() {
        assert!(matches!(
            parse_document(br#"{"action": "up""#),
            Err(ProtocolError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_document_valid() {
        let value =
            parse_document(br#"{"header": {}, "data": {"action": "up"}}"#)
                .unwrap();
        assert_eq!(
            value.get("data").and_then(|d| d.get("action")),
            Some(&Value::from("up"))
        );
    }

    #[test]
    fn test_parse_nesting_depth_is_bounded() {
        let nested = |depth: usize| format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        let value = parse_document(nested(100).as_bytes()).unwrap();
        assert!(matches!(value, Value::Array(_)));
        assert!(matches!(
            parse_document(nested(200).as_bytes()),
            Err(ProtocolError::Parse(_))
        ));
    }
}
