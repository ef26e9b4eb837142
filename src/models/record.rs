//! Record shape inspection.
//!
//! A [`RecordShape`] is the ordered (name, value) view of one record for the
//! duration of a single call. Shapes are derived from any `Serialize` value
//! that serializes to a struct or a map, which covers plain structs,
//! `serde_json::Map` and `HashMap`-style dynamic records alike.
//!
//! Struct fields keep their declaration order. Map entries are sorted by name
//! so two maps with the same keys always yield the same column order.
//! Byte sequences (`Vec<u8>`, `serde_bytes`) become [`Value::Bytes`]; other
//! sequences and nested structures become [`Value::Json`].

use crate::error::{DbError, DbResult};
use crate::models::Value;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Ordered field names and values of one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordShape {
    fields: Vec<(String, Value)>,
}

impl RecordShape {
    /// Create an empty shape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a serializable record.
    pub fn inspect<T: Serialize + ?Sized>(record: &T) -> DbResult<Self> {
        record
            .serialize(ser::RecordSerializer)
            .map_err(|e| DbError::invalid_input(format!("Record cannot be inspected: {}", e)))
    }

    /// Add a field, replacing the value if the name is already present.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name.into(), value.into());
        self
    }

    fn set(&mut self, name: String, value: Value) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Value of a field by exact name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields in order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Value of the key field. Key names match ASCII case-insensitively.
    pub fn key_value(&self, key_field: &str) -> Option<&Value> {
        self.fields()
            .find(|(n, _)| n.eq_ignore_ascii_case(key_field))
            .map(|(_, v)| v)
    }

    /// Fields in order, skipping the designated key field.
    pub fn non_key_fields<'a>(
        &'a self,
        key_field: &str,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + use<'a> {
        let key_field = key_field.to_owned();
        self.fields()
            .filter(move |(n, _)| !n.eq_ignore_ascii_case(&key_field))
    }

    /// Names of the non-key fields, in order.
    pub fn non_key_names(&self, key_field: &str) -> Vec<&str> {
        self.non_key_fields(key_field).map(|(n, _)| n).collect()
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Serializers producing a [`RecordShape`] straight from `Serialize` data.
mod ser {
    use super::{RecordShape, json_kind};
    use crate::models::Value;
    use serde::Serialize;
    use serde::ser::{self, Impossible};
    use serde_json::{Map, Value as JsonValue};
    use std::fmt::Display;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    pub struct ShapeError(String);

    impl ser::Error for ShapeError {
        fn custom<T: Display>(msg: T) -> Self {
            Self(msg.to_string())
        }
    }

    fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<JsonValue, ShapeError> {
        serde_json::to_value(value).map_err(ser::Error::custom)
    }

    /// Map keys must render as plain names.
    fn key_name<T: Serialize + ?Sized>(key: &T) -> Result<String, ShapeError> {
        match to_json(key)? {
            JsonValue::String(s) => Ok(s),
            JsonValue::Number(n) => Ok(n.to_string()),
            other => Err(ShapeError(format!(
                "field names must be strings, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn tagged(variant: Option<&'static str>, json: JsonValue) -> Value {
        match variant {
            Some(name) => {
                let mut map = Map::new();
                map.insert(name.to_string(), json);
                Value::Json(JsonValue::Object(map))
            }
            None => Value::Json(json),
        }
    }

    /// Generates the scalar methods that a serializer refuses.
    macro_rules! reject_scalars {
        ($($method:ident: $ty:ty => $kind:literal),* $(,)?) => {
            $(
                fn $method(self, _v: $ty) -> Result<Self::Ok, Self::Error> {
                    Err(Self::reject($kind))
                }
            )*
        };
    }

    /// Top level: only structs and maps make a record.
    pub struct RecordSerializer;

    impl RecordSerializer {
        fn reject(kind: &str) -> ShapeError {
            ShapeError(format!("Record must serialize to a map of fields, got {}", kind))
        }
    }

    impl ser::Serializer for RecordSerializer {
        type Ok = RecordShape;
        type Error = ShapeError;
        type SerializeSeq = Impossible<RecordShape, ShapeError>;
        type SerializeTuple = Impossible<RecordShape, ShapeError>;
        type SerializeTupleStruct = Impossible<RecordShape, ShapeError>;
        type SerializeTupleVariant = Impossible<RecordShape, ShapeError>;
        type SerializeMap = FieldCollector;
        type SerializeStruct = FieldCollector;
        type SerializeStructVariant = Impossible<RecordShape, ShapeError>;

        reject_scalars! {
            serialize_bool: bool => "a boolean",
            serialize_i8: i8 => "a number",
            serialize_i16: i16 => "a number",
            serialize_i32: i32 => "a number",
            serialize_i64: i64 => "a number",
            serialize_u8: u8 => "a number",
            serialize_u16: u16 => "a number",
            serialize_u32: u32 => "a number",
            serialize_u64: u64 => "a number",
            serialize_f32: f32 => "a number",
            serialize_f64: f64 => "a number",
            serialize_char: char => "a string",
            serialize_str: &str => "a string",
            serialize_bytes: &[u8] => "bytes",
        }

        fn serialize_none(self) -> Result<RecordShape, ShapeError> {
            Err(Self::reject("null"))
        }

        fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<RecordShape, ShapeError> {
            value.serialize(self)
        }

        fn serialize_unit(self) -> Result<RecordShape, ShapeError> {
            Err(Self::reject("null"))
        }

        fn serialize_unit_struct(self, _name: &'static str) -> Result<RecordShape, ShapeError> {
            Err(Self::reject("a unit struct"))
        }

        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
        ) -> Result<RecordShape, ShapeError> {
            Err(Self::reject("an enum variant"))
        }

        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            value: &T,
        ) -> Result<RecordShape, ShapeError> {
            value.serialize(self)
        }

        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _value: &T,
        ) -> Result<RecordShape, ShapeError> {
            Err(Self::reject("an enum variant"))
        }

        fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, ShapeError> {
            Err(Self::reject("an array"))
        }

        fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, ShapeError> {
            Err(Self::reject("an array"))
        }

        fn serialize_tuple_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleStruct, ShapeError> {
            Err(Self::reject("an array"))
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleVariant, ShapeError> {
            Err(Self::reject("an enum variant"))
        }

        fn serialize_map(self, len: Option<usize>) -> Result<FieldCollector, ShapeError> {
            Ok(FieldCollector::new(len.unwrap_or(0), true))
        }

        fn serialize_struct(self, _name: &'static str, len: usize) -> Result<FieldCollector, ShapeError> {
            Ok(FieldCollector::new(len, false))
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStructVariant, ShapeError> {
            Err(Self::reject("an enum variant"))
        }
    }

    /// Collects the top-level fields of a record.
    pub struct FieldCollector {
        shape: RecordShape,
        pending_key: Option<String>,
        sorted: bool,
    }

    impl FieldCollector {
        fn new(capacity: usize, sorted: bool) -> Self {
            Self {
                shape: RecordShape {
                    fields: Vec::with_capacity(capacity),
                },
                pending_key: None,
                sorted,
            }
        }

        fn finish(mut self) -> RecordShape {
            if self.sorted {
                self.shape.fields.sort_by(|a, b| a.0.cmp(&b.0));
            }
            self.shape
        }
    }

    impl ser::SerializeStruct for FieldCollector {
        type Ok = RecordShape;
        type Error = ShapeError;

        fn serialize_field<T: ?Sized + Serialize>(
            &mut self,
            key: &'static str,
            value: &T,
        ) -> Result<(), ShapeError> {
            let value = value.serialize(ValueSerializer)?;
            self.shape.set(key.to_string(), value);
            Ok(())
        }

        fn end(self) -> Result<RecordShape, ShapeError> {
            Ok(self.finish())
        }
    }

    impl ser::SerializeMap for FieldCollector {
        type Ok = RecordShape;
        type Error = ShapeError;

        fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), ShapeError> {
            self.pending_key = Some(key_name(key)?);
            Ok(())
        }

        fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ShapeError> {
            let key = self
                .pending_key
                .take()
                .ok_or_else(|| ShapeError("map value without a key".to_string()))?;
            let value = value.serialize(ValueSerializer)?;
            self.shape.set(key, value);
            Ok(())
        }

        fn end(self) -> Result<RecordShape, ShapeError> {
            Ok(self.finish())
        }
    }

    /// One field value.
    pub struct ValueSerializer;

    impl ValueSerializer {
        fn int<N>(v: N) -> Value
        where
            N: Copy + Display + TryInto<i64>,
        {
            match TryInto::<i64>::try_into(v) {
                Ok(i) => Value::Int(i),
                // Out of i64 range: keep the exact digits
                Err(_) => Value::String(v.to_string()),
            }
        }
    }

    impl ser::Serializer for ValueSerializer {
        type Ok = Value;
        type Error = ShapeError;
        type SerializeSeq = SeqCollector;
        type SerializeTuple = SeqCollector;
        type SerializeTupleStruct = SeqCollector;
        type SerializeTupleVariant = SeqCollector;
        type SerializeMap = ObjectCollector;
        type SerializeStruct = ObjectCollector;
        type SerializeStructVariant = ObjectCollector;

        fn serialize_bool(self, v: bool) -> Result<Value, ShapeError> {
            Ok(Value::Bool(v))
        }

        fn serialize_i8(self, v: i8) -> Result<Value, ShapeError> {
            Ok(Value::Int(v.into()))
        }

        fn serialize_i16(self, v: i16) -> Result<Value, ShapeError> {
            Ok(Value::Int(v.into()))
        }

        fn serialize_i32(self, v: i32) -> Result<Value, ShapeError> {
            Ok(Value::Int(v.into()))
        }

        fn serialize_i64(self, v: i64) -> Result<Value, ShapeError> {
            Ok(Value::Int(v))
        }

        fn serialize_i128(self, v: i128) -> Result<Value, ShapeError> {
            Ok(Self::int(v))
        }

        fn serialize_u8(self, v: u8) -> Result<Value, ShapeError> {
            Ok(Value::Int(v.into()))
        }

        fn serialize_u16(self, v: u16) -> Result<Value, ShapeError> {
            Ok(Value::Int(v.into()))
        }

        fn serialize_u32(self, v: u32) -> Result<Value, ShapeError> {
            Ok(Value::Int(v.into()))
        }

        fn serialize_u64(self, v: u64) -> Result<Value, ShapeError> {
            Ok(Self::int(v))
        }

        fn serialize_u128(self, v: u128) -> Result<Value, ShapeError> {
            Ok(Self::int(v))
        }

        fn serialize_f32(self, v: f32) -> Result<Value, ShapeError> {
            Ok(Value::Float(v.into()))
        }

        fn serialize_f64(self, v: f64) -> Result<Value, ShapeError> {
            Ok(Value::Float(v))
        }

        fn serialize_char(self, v: char) -> Result<Value, ShapeError> {
            Ok(Value::String(v.to_string()))
        }

        fn serialize_str(self, v: &str) -> Result<Value, ShapeError> {
            Ok(Value::String(v.to_string()))
        }

        fn serialize_bytes(self, v: &[u8]) -> Result<Value, ShapeError> {
            Ok(Value::Bytes(v.to_vec()))
        }

        fn serialize_none(self) -> Result<Value, ShapeError> {
            Ok(Value::Null)
        }

        fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, ShapeError> {
            value.serialize(self)
        }

        fn serialize_unit(self) -> Result<Value, ShapeError> {
            Ok(Value::Null)
        }

        fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, ShapeError> {
            Ok(Value::Null)
        }

        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _index: u32,
            variant: &'static str,
        ) -> Result<Value, ShapeError> {
            Ok(Value::String(variant.to_string()))
        }

        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            value: &T,
        ) -> Result<Value, ShapeError> {
            value.serialize(self)
        }

        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            _index: u32,
            variant: &'static str,
            value: &T,
        ) -> Result<Value, ShapeError> {
            Ok(tagged(Some(variant), to_json(value)?))
        }

        fn serialize_seq(self, len: Option<usize>) -> Result<SeqCollector, ShapeError> {
            Ok(SeqCollector::new(len.unwrap_or(0), None))
        }

        fn serialize_tuple(self, len: usize) -> Result<SeqCollector, ShapeError> {
            Ok(SeqCollector::new(len, None))
        }

        fn serialize_tuple_struct(
            self,
            _name: &'static str,
            len: usize,
        ) -> Result<SeqCollector, ShapeError> {
            Ok(SeqCollector::new(len, None))
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            variant: &'static str,
            len: usize,
        ) -> Result<SeqCollector, ShapeError> {
            Ok(SeqCollector::new(len, Some(variant)))
        }

        fn serialize_map(self, _len: Option<usize>) -> Result<ObjectCollector, ShapeError> {
            Ok(ObjectCollector::new(None))
        }

        fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<ObjectCollector, ShapeError> {
            Ok(ObjectCollector::new(None))
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            variant: &'static str,
            _len: usize,
        ) -> Result<ObjectCollector, ShapeError> {
            Ok(ObjectCollector::new(Some(variant)))
        }
    }

    /// Sequence field. Stays a byte buffer while every element is a `u8`.
    pub struct SeqCollector {
        bytes: Option<Vec<u8>>,
        items: Vec<JsonValue>,
        variant: Option<&'static str>,
    }

    impl SeqCollector {
        fn new(capacity: usize, variant: Option<&'static str>) -> Self {
            Self {
                bytes: variant.is_none().then(|| Vec::with_capacity(capacity)),
                items: Vec::new(),
                variant,
            }
        }

        fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ShapeError> {
            if let Some(mut bytes) = self.bytes.take() {
                if let Ok(byte) = value.serialize(ByteSerializer) {
                    bytes.push(byte);
                    self.bytes = Some(bytes);
                    return Ok(());
                }
                self.items = bytes.into_iter().map(JsonValue::from).collect();
            }
            self.items.push(to_json(value)?);
            Ok(())
        }

        fn finish(self) -> Value {
            match self.bytes {
                Some(bytes) if !bytes.is_empty() => Value::Bytes(bytes),
                _ => tagged(self.variant, JsonValue::Array(self.items)),
            }
        }
    }

    impl ser::SerializeSeq for SeqCollector {
        type Ok = Value;
        type Error = ShapeError;

        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ShapeError> {
            self.push(value)
        }

        fn end(self) -> Result<Value, ShapeError> {
            Ok(self.finish())
        }
    }

    impl ser::SerializeTuple for SeqCollector {
        type Ok = Value;
        type Error = ShapeError;

        fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ShapeError> {
            self.push(value)
        }

        fn end(self) -> Result<Value, ShapeError> {
            Ok(self.finish())
        }
    }

    impl ser::SerializeTupleStruct for SeqCollector {
        type Ok = Value;
        type Error = ShapeError;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ShapeError> {
            self.push(value)
        }

        fn end(self) -> Result<Value, ShapeError> {
            Ok(self.finish())
        }
    }

    impl ser::SerializeTupleVariant for SeqCollector {
        type Ok = Value;
        type Error = ShapeError;

        fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ShapeError> {
            self.push(value)
        }

        fn end(self) -> Result<Value, ShapeError> {
            Ok(self.finish())
        }
    }

    /// Nested struct or map field, kept as a JSON object.
    pub struct ObjectCollector {
        map: Map<String, JsonValue>,
        pending_key: Option<String>,
        variant: Option<&'static str>,
    }

    impl ObjectCollector {
        fn new(variant: Option<&'static str>) -> Self {
            Self {
                map: Map::new(),
                pending_key: None,
                variant,
            }
        }

        fn finish(self) -> Value {
            tagged(self.variant, JsonValue::Object(self.map))
        }
    }

    impl ser::SerializeMap for ObjectCollector {
        type Ok = Value;
        type Error = ShapeError;

        fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), ShapeError> {
            self.pending_key = Some(key_name(key)?);
            Ok(())
        }

        fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ShapeError> {
            let key = self
                .pending_key
                .take()
                .ok_or_else(|| ShapeError("map value without a key".to_string()))?;
            self.map.insert(key, to_json(value)?);
            Ok(())
        }

        fn end(self) -> Result<Value, ShapeError> {
            Ok(self.finish())
        }
    }

    impl ser::SerializeStruct for ObjectCollector {
        type Ok = Value;
        type Error = ShapeError;

        fn serialize_field<T: ?Sized + Serialize>(
            &mut self,
            key: &'static str,
            value: &T,
        ) -> Result<(), ShapeError> {
            self.map.insert(key.to_string(), to_json(value)?);
            Ok(())
        }

        fn end(self) -> Result<Value, ShapeError> {
            Ok(self.finish())
        }
    }

    impl ser::SerializeStructVariant for ObjectCollector {
        type Ok = Value;
        type Error = ShapeError;

        fn serialize_field<T: ?Sized + Serialize>(
            &mut self,
            key: &'static str,
            value: &T,
        ) -> Result<(), ShapeError> {
            self.map.insert(key.to_string(), to_json(value)?);
            Ok(())
        }

        fn end(self) -> Result<Value, ShapeError> {
            Ok(self.finish())
        }
    }

    /// Accepts a single `u8` and nothing else.
    struct ByteSerializer;

    impl ByteSerializer {
        fn reject(kind: &str) -> ShapeError {
            ShapeError(format!("expected a byte, got {}", kind))
        }
    }

    impl ser::Serializer for ByteSerializer {
        type Ok = u8;
        type Error = ShapeError;
        type SerializeSeq = Impossible<u8, ShapeError>;
        type SerializeTuple = Impossible<u8, ShapeError>;
        type SerializeTupleStruct = Impossible<u8, ShapeError>;
        type SerializeTupleVariant = Impossible<u8, ShapeError>;
        type SerializeMap = Impossible<u8, ShapeError>;
        type SerializeStruct = Impossible<u8, ShapeError>;
        type SerializeStructVariant = Impossible<u8, ShapeError>;

        reject_scalars! {
            serialize_bool: bool => "a boolean",
            serialize_i8: i8 => "an i8",
            serialize_i16: i16 => "an i16",
            serialize_i32: i32 => "an i32",
            serialize_i64: i64 => "an i64",
            serialize_u16: u16 => "a u16",
            serialize_u32: u32 => "a u32",
            serialize_u64: u64 => "a u64",
            serialize_f32: f32 => "a float",
            serialize_f64: f64 => "a float",
            serialize_char: char => "a char",
            serialize_str: &str => "a string",
            serialize_bytes: &[u8] => "bytes",
        }

        fn serialize_u8(self, v: u8) -> Result<u8, ShapeError> {
            Ok(v)
        }

        fn serialize_none(self) -> Result<u8, ShapeError> {
            Err(Self::reject("null"))
        }

        fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<u8, ShapeError> {
            Err(Self::reject("an option"))
        }

        fn serialize_unit(self) -> Result<u8, ShapeError> {
            Err(Self::reject("null"))
        }

        fn serialize_unit_struct(self, _name: &'static str) -> Result<u8, ShapeError> {
            Err(Self::reject("a unit struct"))
        }

        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
        ) -> Result<u8, ShapeError> {
            Err(Self::reject("an enum variant"))
        }

        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            _value: &T,
        ) -> Result<u8, ShapeError> {
            Err(Self::reject("a newtype"))
        }

        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _value: &T,
        ) -> Result<u8, ShapeError> {
            Err(Self::reject("an enum variant"))
        }

        fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, ShapeError> {
            Err(Self::reject("an array"))
        }

        fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, ShapeError> {
            Err(Self::reject("an array"))
        }

        fn serialize_tuple_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleStruct, ShapeError> {
            Err(Self::reject("an array"))
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeTupleVariant, ShapeError> {
            Err(Self::reject("an enum variant"))
        }

        fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, ShapeError> {
            Err(Self::reject("a map"))
        }

        fn serialize_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStruct, ShapeError> {
            Err(Self::reject("a struct"))
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStructVariant, ShapeError> {
            Err(Self::reject("an enum variant"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct User {
        #[serde(rename = "Id")]
        id: i64,
        name: String,
        age: Option<i32>,
    }

    #[test]
    fn test_inspect_struct() {
        let shape = RecordShape::inspect(&User {
            id: 1,
            name: "ann".to_string(),
            age: None,
        })
        .unwrap();
        assert_eq!(shape.len(), 3);
        assert_eq!(shape.get("Id"), Some(&Value::Int(1)));
        assert_eq!(shape.get("age"), Some(&Value::Null));
    }

    #[test]
    fn test_non_key_fields_exclude_key() {
        let shape = RecordShape::inspect(&json!({"Id": 1, "a": 2, "b": 3})).unwrap();
        assert_eq!(shape.non_key_names("Id"), vec!["a", "b"]);
        assert_eq!(shape.non_key_names("a"), vec!["Id", "b"]);
    }

    #[test]
    fn test_key_matching_ignores_case() {
        let shape = RecordShape::inspect(&json!({"id": 9, "name": "x"})).unwrap();
        assert_eq!(shape.non_key_names("Id"), vec!["name"]);
        assert_eq!(shape.key_value("ID"), Some(&Value::Int(9)));
    }

    #[test]
    fn test_inspect_order_is_stable() {
        let a = RecordShape::inspect(&json!({"z": 1, "m": 2, "a": 3})).unwrap();
        let b = RecordShape::inspect(&json!({"a": 3, "z": 1, "m": 2})).unwrap();
        let names_a: Vec<_> = a.fields().map(|(n, _)| n).collect();
        let names_b: Vec<_> = b.fields().map(|(n, _)| n).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_inspect_rejects_scalars() {
        let err = RecordShape::inspect(&42).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_struct_fields_keep_declaration_order() {
        let shape = RecordShape::inspect(&User {
            id: 1,
            name: "ann".to_string(),
            age: Some(3),
        })
        .unwrap();
        let names: Vec<_> = shape.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Id", "name", "age"]);
    }

    #[test]
    fn test_map_fields_are_sorted() {
        let mut record = std::collections::HashMap::new();
        record.insert("zeta", 1);
        record.insert("alpha", 2);
        record.insert("mid", 3);
        let shape = RecordShape::inspect(&record).unwrap();
        assert_eq!(shape.non_key_names("Id"), vec!["alpha", "mid", "zeta"]);
    }

    #[derive(Serialize)]
    enum Status {
        Active,
        Paused { reason: String },
    }

    #[derive(Serialize)]
    struct Document {
        data: Vec<u8>,
        empty: Vec<u8>,
        counts: Vec<i32>,
        tags: Vec<String>,
        status: Status,
        paused: Status,
        huge: u64,
    }

    #[test]
    fn test_field_values_keep_their_types() {
        let shape = RecordShape::inspect(&Document {
            data: vec![1, 2, 3],
            empty: Vec::new(),
            counts: vec![1, 2],
            tags: vec!["a".to_string()],
            status: Status::Active,
            paused: Status::Paused {
                reason: "maintenance".to_string(),
            },
            huge: u64::MAX,
        })
        .unwrap();

        assert_eq!(shape.get("data"), Some(&Value::Bytes(vec![1, 2, 3])));
        assert_eq!(shape.get("empty"), Some(&Value::Json(json!([]))));
        assert_eq!(shape.get("counts"), Some(&Value::Json(json!([1, 2]))));
        assert_eq!(shape.get("tags"), Some(&Value::Json(json!(["a"]))));
        assert_eq!(shape.get("status"), Some(&Value::String("Active".to_string())));
        assert_eq!(
            shape.get("paused"),
            Some(&Value::Json(json!({"Paused": {"reason": "maintenance"}})))
        );
        assert_eq!(
            shape.get("huge"),
            Some(&Value::String(u64::MAX.to_string()))
        );
    }

    #[test]
    fn test_json_object_record() {
        let shape = RecordShape::inspect(&json!({"Id": 1, "meta": {"k": true}, "n": null})).unwrap();
        assert_eq!(shape.get("meta"), Some(&Value::Json(json!({"k": true}))));
        assert_eq!(shape.get("n"), Some(&Value::Null));
    }

    #[test]
    fn test_with_field_replaces() {
        let shape = RecordShape::new()
            .with_field("a", 1)
            .with_field("b", "x")
            .with_field("a", 2);
        assert_eq!(shape.len(), 2);
        assert_eq!(shape.get("a"), Some(&Value::Int(2)));
    }
}
