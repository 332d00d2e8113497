use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{self, Serialize, Serializer};

use crate::error::Error;
use crate::value::{Value, ValueRepr};

/// The map type values use internally.
///
/// This is a `BTreeMap` so that iteration order (and with it context
/// fingerprints) is deterministic.
pub type ValueMap = BTreeMap<String, Value>;

/// Transforms a serializable value into a [`Value`].
///
/// Data that cannot be represented (such as non-string-keyed maps with
/// compound keys) becomes the absent sentinel.
pub fn to_value<T: Serialize>(value: &T) -> Value {
    value.serialize(ValueSerializer).unwrap_or(Value::UNDEFINED)
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            ValueRepr::Undefined | ValueRepr::None => serializer.serialize_unit(),
            ValueRepr::Bool(b) => serializer.serialize_bool(b),
            ValueRepr::I64(i) => serializer.serialize_i64(i),
            ValueRepr::F64(f) => serializer.serialize_f64(f),
            ValueRepr::String(ref s, _) => serializer.serialize_str(s),
            ValueRepr::Seq(ref seq) => seq.serialize(serializer),
            ValueRepr::Map(ref map) => map.serialize(serializer),
            ValueRepr::Func(ref func) => {
                serializer.serialize_str(&format!("<function {}>", func.name))
            }
        }
    }
}

struct ValueSerializer;

impl Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SerializeSeq;
    type SerializeTuple = SerializeSeq;
    type SerializeTupleStruct = SerializeSeq;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeStruct;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Value, Error> {
        Ok(Value(ValueRepr::Bool(v)))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, Error> {
        Ok(Value(ValueRepr::I64(v as i64)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, Error> {
        Ok(Value(ValueRepr::I64(v as i64)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, Error> {
        Ok(Value(ValueRepr::I64(v as i64)))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, Error> {
        Ok(Value(ValueRepr::I64(v)))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, Error> {
        match i64::try_from(v) {
            Ok(v) => Ok(Value(ValueRepr::I64(v))),
            Err(_) => Ok(Value(ValueRepr::F64(v as f64))),
        }
    }

    fn serialize_u8(self, v: u8) -> Result<Value, Error> {
        Ok(Value(ValueRepr::I64(v as i64)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, Error> {
        Ok(Value(ValueRepr::I64(v as i64)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, Error> {
        Ok(Value(ValueRepr::I64(v as i64)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, Error> {
        match i64::try_from(v) {
            Ok(v) => Ok(Value(ValueRepr::I64(v))),
            Err(_) => Ok(Value(ValueRepr::F64(v as f64))),
        }
    }

    fn serialize_u128(self, v: u128) -> Result<Value, Error> {
        match i64::try_from(v) {
            Ok(v) => Ok(Value(ValueRepr::I64(v))),
            Err(_) => Ok(Value(ValueRepr::F64(v as f64))),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Value, Error> {
        Ok(Value(ValueRepr::F64(v as f64)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, Error> {
        Ok(Value(ValueRepr::F64(v)))
    }

    fn serialize_char(self, v: char) -> Result<Value, Error> {
        Ok(Value::from(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, Error> {
        Ok(v.iter().map(|&b| Value::from(b as i64)).collect())
    }

    fn serialize_none(self) -> Result<Value, Error> {
        Ok(Value(ValueRepr::None))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, Error> {
        Ok(Value(ValueRepr::None))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, Error> {
        Ok(Value(ValueRepr::None))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, Error> {
        Ok(Value::from(variant))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        let mut map = ValueMap::new();
        map.insert(variant.to_string(), ok!(value.serialize(self)));
        Ok(Value(ValueRepr::Map(Arc::new(map))))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Error> {
        Ok(SerializeSeq {
            elements: Vec::with_capacity(len.unwrap_or(0).min(1024)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Error> {
        Ok(SerializeTupleVariant {
            name: variant,
            fields: Vec::with_capacity(len.min(1024)),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Error> {
        Ok(SerializeMap {
            entries: ValueMap::new(),
            key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Error> {
        Ok(SerializeStruct {
            fields: ValueMap::new(),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Error> {
        Ok(SerializeStructVariant {
            variant,
            map: ValueMap::new(),
        })
    }
}

struct SerializeSeq {
    elements: Vec<Value>,
}

impl ser::SerializeSeq for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.elements.push(ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value(ValueRepr::Seq(Arc::new(self.elements))))
    }
}

impl ser::SerializeTuple for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

struct SerializeTupleVariant {
    name: &'static str,
    fields: Vec<Value>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.fields.push(ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        let mut map = ValueMap::new();
        map.insert(
            self.name.to_string(),
            Value(ValueRepr::Seq(Arc::new(self.fields))),
        );
        Ok(Value(ValueRepr::Map(Arc::new(map))))
    }
}

struct SerializeMap {
    entries: ValueMap,
    key: Option<String>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Error> {
        let key = ok!(key.serialize(ValueSerializer));
        self.key = Some(match key.0 {
            ValueRepr::String(ref s, _) => s.to_string(),
            _ => key.to_string(),
        });
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        if let Some(key) = self.key.take() {
            self.entries.insert(key, ok!(value.serialize(ValueSerializer)));
        }
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value(ValueRepr::Map(Arc::new(self.entries))))
    }
}

struct SerializeStruct {
    fields: ValueMap,
}

impl ser::SerializeStruct for SerializeStruct {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.fields
            .insert(key.to_string(), ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(Value(ValueRepr::Map(Arc::new(self.fields))))
    }
}

struct SerializeStructVariant {
    variant: &'static str,
    map: ValueMap,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.map
            .insert(key.to_string(), ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        let mut rv = ValueMap::new();
        rv.insert(
            self.variant.to_string(),
            Value(ValueRepr::Map(Arc::new(self.map))),
        );
        Ok(Value(ValueRepr::Map(Arc::new(rv))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_value_roundtrip() {
        let value = to_value(&serde_json::json!({
            "name": "Alice",
            "tags": ["a", "b"],
            "age": 30,
            "active": true,
            "score": 1.5,
            "missing": null,
        }));
        assert_eq!(value.get_attr("name"), Value::from("Alice"));
        assert_eq!(value.get_attr("age"), Value::from(30));
        assert_eq!(value.get_attr("active"), Value::from(true));
        assert_eq!(value.get_attr("score"), Value::from(1.5));
        assert!(value.get_attr("missing").is_none());
        assert_eq!(
            value.get_attr("tags").get_item(&Value::from(1)),
            Value::from("b")
        );
    }

    #[test]
    fn test_value_to_json() {
        let value: Value = [("k", 42)].into_iter().collect();
        assert_eq!(serde_json::to_string(&value).unwrap(), "{\"k\":42}");
    }
}
