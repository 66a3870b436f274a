//! JSON argument and return-value marshalling.
//!
//! Argument bytes are UTF-8 JSON. Functions with parameters take a single
//! object supplying exactly the declared names; the declared kind governs
//! the conversion. Byte strings travel as base64, and integers wider than
//! 64 bits travel as decimal strings, in both directions.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde_json::Value as Json;

use crate::error::{VmError, VmResult};
use crate::program::{Param, ParamKind};
use crate::value::{MapKey, Value};

const MAX_INT_STRING_LEN: usize = 80;

/// Decodes argument bytes against a declared parameter list.
///
/// The result vector is ordered like `params` and becomes the first local
/// slots of the invoked frame.
pub fn decode_args(input: &[u8], params: &[Param]) -> VmResult<Vec<Value>> {
    if params.is_empty() {
        return decode_no_args(input).map(|()| Vec::new());
    }

    if is_blank(input) {
        return Err(VmError::argument(format!(
            "function expects {} named argument(s), got no input",
            params.len()
        )));
    }
    let json: Json = serde_json::from_slice(input)
        .map_err(|err| VmError::argument(format!("arguments are not valid JSON: {err}")))?;
    let Json::Object(mut fields) = json else {
        return Err(VmError::argument(
            "expected a JSON object of named arguments",
        ));
    };

    let mut args = Vec::with_capacity(params.len());
    for param in params {
        let field = fields.remove(&param.name).ok_or_else(|| {
            VmError::argument(format!("missing argument `{}`", param.name))
        })?;
        args.push(convert_arg(param, field)?);
    }
    if let Some(extra) = fields.keys().next() {
        return Err(VmError::argument(format!("unexpected argument `{extra}`")));
    }
    Ok(args)
}

/// Encodes a return value as JSON bytes.
pub fn encode_return(value: &Value) -> VmResult<Vec<u8>> {
    let json = value_to_json(value);
    serde_json::to_vec(&json)
        .map_err(|err| VmError::internal(format!("return encoding failed: {err}")))
}

fn decode_no_args(input: &[u8]) -> VmResult<()> {
    if is_blank(input) {
        return Ok(());
    }
    let json: Json = serde_json::from_slice(input)
        .map_err(|err| VmError::argument(format!("arguments are not valid JSON: {err}")))?;
    match json {
        Json::Null => Ok(()),
        Json::Object(fields) if fields.is_empty() => Ok(()),
        Json::Object(fields) => {
            let name = fields.keys().next().cloned().unwrap_or_default();
            Err(VmError::argument(format!(
                "function takes no arguments, got `{name}`"
            )))
        }
        _ => Err(VmError::argument("function takes no arguments")),
    }
}

fn is_blank(input: &[u8]) -> bool {
    input.iter().all(|b| b.is_ascii_whitespace())
}

fn convert_arg(param: &Param, json: Json) -> VmResult<Value> {
    convert(param.kind, json).map_err(|err| match err {
        VmError::Argument { message } => {
            VmError::argument(format!("argument `{}`: {message}", param.name))
        }
        other => other,
    })
}

fn convert(kind: ParamKind, json: Json) -> VmResult<Value> {
    match kind {
        ParamKind::Any => any_from_json(json),
        ParamKind::Bool => match json {
            Json::Bool(b) => Ok(Value::Bool(b)),
            other => Err(mismatch(kind, &other)),
        },
        ParamKind::Int => int_from_json(&json).map(Value::Int),
        ParamKind::String => match json {
            Json::String(s) => Ok(Value::Bytes(s.into_bytes())),
            other => Err(mismatch(kind, &other)),
        },
        ParamKind::Bytes => match json {
            Json::String(s) => BASE64
                .decode(s.as_bytes())
                .map(Value::Bytes)
                .map_err(|_| VmError::argument("invalid base64")),
            other => Err(mismatch(kind, &other)),
        },
        ParamKind::Array => match json {
            Json::Array(items) => items
                .into_iter()
                .map(any_from_json)
                .collect::<VmResult<Vec<_>>>()
                .map(Value::Array),
            other => Err(mismatch(kind, &other)),
        },
        ParamKind::Map => match json {
            Json::Object(fields) => map_from_object(fields),
            other => Err(mismatch(kind, &other)),
        },
    }
}

fn any_from_json(json: Json) -> VmResult<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(b)),
        Json::Number(_) => int_from_json(&json).map(Value::Int),
        Json::String(s) => Ok(Value::Bytes(s.into_bytes())),
        Json::Array(items) => items
            .into_iter()
            .map(any_from_json)
            .collect::<VmResult<Vec<_>>>()
            .map(Value::Array),
        Json::Object(fields) => map_from_object(fields),
    }
}

fn map_from_object(fields: serde_json::Map<String, Json>) -> VmResult<Value> {
    let mut map = BTreeMap::new();
    for (key, value) in fields {
        map.insert(MapKey::Bytes(key.into_bytes()), any_from_json(value)?);
    }
    Ok(Value::Map(map))
}

fn int_from_json(json: &Json) -> VmResult<BigInt> {
    match json {
        Json::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(BigInt::from(v))
            } else if let Some(v) = n.as_u64() {
                Ok(BigInt::from(v))
            } else {
                Err(VmError::argument("expected an integer, got a non-integer number"))
            }
        }
        Json::String(s) => {
            if s.len() > MAX_INT_STRING_LEN {
                return Err(VmError::argument("integer string too long"));
            }
            s.parse::<BigInt>()
                .map_err(|_| VmError::argument(format!("`{s}` is not a decimal integer")))
        }
        other => Err(mismatch(ParamKind::Int, other)),
    }
}

fn mismatch(kind: ParamKind, json: &Json) -> VmError {
    VmError::argument(format!(
        "expected {}, got {}",
        kind.name(),
        json_type_name(json)
    ))
}

fn json_type_name(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => int_to_json(i),
        Value::Bytes(b) => Json::String(bytes_to_string(b)),
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => {
            let mut object = serde_json::Map::new();
            for (key, value) in map {
                object.insert(key_to_string(key), value_to_json(value));
            }
            Json::Object(object)
        }
    }
}

fn int_to_json(value: &BigInt) -> Json {
    if let Some(v) = value.to_i64() {
        Json::from(v)
    } else if let Some(v) = value.to_u64() {
        Json::from(v)
    } else {
        Json::String(value.to_string())
    }
}

fn bytes_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => BASE64.encode(bytes),
    }
}

fn key_to_string(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::Int(i) => i.to_string(),
        MapKey::Bytes(b) => bytes_to_string(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(spec: &[(&str, ParamKind)]) -> Vec<Param> {
        spec.iter().map(|(n, k)| Param::new(*n, *k)).collect()
    }

    #[test]
    fn decodes_named_arguments_in_any_order() {
        let params = params(&[("team", ParamKind::String), ("points", ParamKind::Int)]);
        let args = decode_args(br#"{"points": 30, "team": "a"}"#, &params).unwrap();
        assert_eq!(args[0], Value::from("a"));
        assert_eq!(args[1], Value::from(30i64));
    }

    #[test]
    fn missing_argument_is_reported_by_name() {
        let params = params(&[("team", ParamKind::String)]);
        let err = decode_args(b"{}", &params).unwrap_err();
        assert!(err.to_string().contains("missing argument `team`"));
    }

    #[test]
    fn unexpected_argument_is_rejected() {
        let params = params(&[("team", ParamKind::String)]);
        let err = decode_args(br#"{"team": "a", "bonus": 1}"#, &params).unwrap_err();
        assert!(err.to_string().contains("unexpected argument `bonus`"));
    }

    #[test]
    fn type_mismatch_names_both_sides() {
        let params = params(&[("points", ParamKind::Int)]);
        let err = decode_args(br#"{"points": "not-a-number-x"}"#, &params).unwrap_err();
        assert!(err.to_string().contains("argument `points`"));

        let err = decode_args(br#"{"points": [1]}"#, &params).unwrap_err();
        assert!(err.to_string().contains("expected int, got array"));
    }

    #[test]
    fn floats_are_rejected() {
        let params = params(&[("points", ParamKind::Int)]);
        let err = decode_args(br#"{"points": 1.5}"#, &params).unwrap_err();
        assert!(err.to_string().contains("non-integer number"));
    }

    #[test]
    fn big_integers_travel_as_decimal_strings() {
        let params = params(&[("deposit", ParamKind::Int)]);
        let args =
            decode_args(br#"{"deposit": "340282366920938463463374607431768211455"}"#, &params)
                .unwrap();
        assert_eq!(args[0], Value::Int(BigInt::from(u128::MAX)));

        let encoded = encode_return(&Value::Int(BigInt::from(u128::MAX))).unwrap();
        assert_eq!(
            encoded,
            br#""340282366920938463463374607431768211455""#.to_vec()
        );
    }

    #[test]
    fn bytes_arguments_are_base64() {
        let params = params(&[("blob", ParamKind::Bytes)]);
        let args = decode_args(br#"{"blob": "AAECgP8="}"#, &params).unwrap();
        assert_eq!(args[0], Value::Bytes(vec![0, 1, 2, 0x80, 0xFF]));

        let err = decode_args(br#"{"blob": "!!!"}"#, &params).unwrap_err();
        assert!(err.to_string().contains("invalid base64"));
    }

    #[test]
    fn parameterless_functions_accept_blank_null_and_empty_object() {
        assert!(decode_args(b"", &[]).unwrap().is_empty());
        assert!(decode_args(b"  ", &[]).unwrap().is_empty());
        assert!(decode_args(b"null", &[]).unwrap().is_empty());
        assert!(decode_args(b"{}", &[]).unwrap().is_empty());
        let err = decode_args(br#"{"x": 1}"#, &[]).unwrap_err();
        assert!(err.to_string().contains("takes no arguments"));
    }

    #[test]
    fn any_parameters_convert_structurally() {
        let params = params(&[("payload", ParamKind::Any)]);
        let args = decode_args(
            br#"{"payload": {"teams": ["a", "b"], "active": true, "round": 3}}"#,
            &params,
        )
        .unwrap();
        let Value::Map(map) = &args[0] else {
            panic!("expected a map")
        };
        assert_eq!(
            map.get(&MapKey::Bytes(b"round".to_vec())),
            Some(&Value::from(3i64))
        );
        assert_eq!(
            map.get(&MapKey::Bytes(b"active".to_vec())),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn returns_encode_utf8_and_binary_bytes_differently() {
        assert_eq!(encode_return(&Value::from("alice")).unwrap(), b"\"alice\"");
        assert_eq!(
            encode_return(&Value::Bytes(vec![0xFF, 0x00])).unwrap(),
            b"\"/wA=\""
        );
    }

    #[test]
    fn return_maps_render_scalar_keys_as_strings() {
        let mut map = BTreeMap::new();
        map.insert(MapKey::Bytes(b"count".to_vec()), Value::from(2i64));
        map.insert(MapKey::Int(BigInt::from(7)), Value::Null);
        map.insert(MapKey::Bool(true), Value::from(false));
        let encoded = encode_return(&Value::Map(map)).unwrap();
        let text = String::from_utf8(encoded).unwrap();
        assert!(text.contains("\"count\":2"));
        assert!(text.contains("\"7\":null"));
        assert!(text.contains("\"true\":false"));
    }

    #[test]
    fn void_style_null_returns_encode_as_null() {
        assert_eq!(encode_return(&Value::Null).unwrap(), b"null");
    }
}
