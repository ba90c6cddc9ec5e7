//! Tests for typed rows
//!
//! These tests verify:
//! - Key/value projection and reconstruction
//! - Key spec and schema validation
//! - Row codec

use tabulakv::table::{decode_row, encode_row, KeySpec, Schema, TypeTag, Value};
use tabulakv::TabulaError;

fn row() -> Vec<Value> {
    vec![
        Value::UInt64(7),
        Value::Text("edge".to_string()),
        Value::Float64(0.5),
    ]
}

// =============================================================================
// KeySpec Tests
// =============================================================================

#[test]
fn test_single_key_column() {
    let spec = KeySpec::new([0]);

    let key = spec.project_key(&row()).unwrap();
    let value = spec.project_value(&row()).unwrap();

    assert_eq!(key, vec![Value::UInt64(7)]);
    assert_eq!(value, vec![Value::Text("edge".to_string()), Value::Float64(0.5)]);
    assert_eq!(spec.reconstruct(key, value).unwrap(), row());
}

#[test]
fn test_key_columns_keep_key_order() {
    let spec = KeySpec::new([2, 0]);

    let key = spec.project_key(&row()).unwrap();
    assert_eq!(key, vec![Value::Float64(0.5), Value::UInt64(7)]);

    let value = spec.project_value(&row()).unwrap();
    assert_eq!(value, vec![Value::Text("edge".to_string())]);

    assert_eq!(spec.reconstruct(key, value).unwrap(), row());
}

#[test]
fn test_empty_key_spec_keys_whole_row() {
    let spec = KeySpec::new(Vec::<usize>::new());

    assert_eq!(spec.project_key(&row()).unwrap(), row());
    assert!(spec.project_value(&row()).unwrap().is_empty());
    assert_eq!(spec.reconstruct(row(), Vec::new()).unwrap(), row());
}

#[test]
fn test_invalid_key_specs() {
    assert!(matches!(
        KeySpec::new([3]).validate(3),
        Err(TabulaError::SchemaMismatch(_))
    ));
    assert!(matches!(
        KeySpec::new([1, 1]).validate(3),
        Err(TabulaError::SchemaMismatch(_))
    ));
    assert!(KeySpec::new([1, 2]).validate(3).is_ok());
}

#[test]
fn test_reconstruct_rejects_wrong_key_width() {
    let spec = KeySpec::new([0, 1]);

    let result = spec.reconstruct(vec![Value::UInt64(1)], vec![Value::Bool(true), Value::Bool(false)]);
    assert!(matches!(result, Err(TabulaError::SchemaMismatch(_))));
}

// =============================================================================
// Schema Tests
// =============================================================================

#[test]
fn test_schema_check() {
    let schema = Schema::new(KeySpec::new([0]), [TypeTag::UInt64, TypeTag::Text, TypeTag::Float64]);

    assert!(schema.validate().is_ok());
    assert!(schema.check(&row()).is_ok());

    // Wrong arity
    assert!(matches!(
        schema.check(&row()[..2]),
        Err(TabulaError::SchemaMismatch(_))
    ));

    // Wrong type in column 1
    let mut bad = row();
    bad[1] = Value::Int64(-1);
    assert!(matches!(schema.check(&bad), Err(TabulaError::SchemaMismatch(_))));
}

#[test]
fn test_schema_with_out_of_range_key_invalid() {
    let schema = Schema::new(KeySpec::new([5]), [TypeTag::Bytes, TypeTag::Bytes]);

    assert!(schema.validate().is_err());
}

#[test]
fn test_type_tag_names() {
    for tag in [
        TypeTag::Bool,
        TypeTag::Int64,
        TypeTag::UInt64,
        TypeTag::Float64,
        TypeTag::Text,
        TypeTag::Bytes,
        TypeTag::List,
    ] {
        assert_eq!(tag.as_str().parse::<TypeTag>().unwrap(), tag);
    }
    assert!("varchar".parse::<TypeTag>().is_err());
}

// =============================================================================
// Codec Tests
// =============================================================================

#[test]
fn test_codec_preserves_nested_values() {
    let row = vec![
        Value::Bytes(vec![0, 1, 2]),
        Value::List(vec![Value::UInt64(1), Value::Text("x".to_string())]),
        Value::Bool(true),
    ];

    assert_eq!(decode_row(&encode_row(&row).unwrap()).unwrap(), row);
}

#[test]
fn test_equal_keys_encode_identically() {
    let a = encode_row(&[Value::Text("port:5000".to_string()), Value::Text("edges".to_string())]).unwrap();
    let b = encode_row(&[Value::Text("port:5000".to_string()), Value::Text("edges".to_string())]).unwrap();
    let c = encode_row(&[Value::Text("port:5000".to_string()), Value::Text("nodes".to_string())]).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_decode_garbage_fails() {
    assert!(decode_row(&[0xFF, 0xFF, 0xFF]).is_err());
}
