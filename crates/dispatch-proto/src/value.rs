//! Self-describing boxed value (spec §3 "Value", §4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::varint;

pub const TYPE_URL_BOOL: &str = "type.googleapis.com/google.protobuf.BoolValue";
pub const TYPE_URL_INT64: &str = "type.googleapis.com/google.protobuf.Int64Value";
pub const TYPE_URL_UINT64: &str = "type.googleapis.com/google.protobuf.UInt64Value";
pub const TYPE_URL_DOUBLE: &str = "type.googleapis.com/google.protobuf.DoubleValue";
pub const TYPE_URL_STRING: &str = "type.googleapis.com/google.protobuf.StringValue";
pub const TYPE_URL_BYTES: &str = "type.googleapis.com/google.protobuf.BytesValue";
pub const TYPE_URL_TIMESTAMP: &str = "type.googleapis.com/google.protobuf.Timestamp";
pub const TYPE_URL_DURATION: &str = "type.googleapis.com/google.protobuf.Duration";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("cannot box value of kind {0}")]
    Unsupported(&'static str),
    #[error("cannot unmarshal {type_url} of {detail} into {target}")]
    Conversion {
        type_url: String,
        target: &'static str,
        detail: String,
    },
    #[error("malformed payload for {0}")]
    MalformedPayload(&'static str),
}

/// `(type_url, payload)` per spec §3. Immutable once constructed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Value {
    pub type_url: String,
    pub payload: Vec<u8>,
}

impl Value {
    pub fn new(type_url: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            payload,
        }
    }

    /// Allocation: none (borrows). Complexity: O(1).
    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    /// Structural equality: type URL and payload must both match exactly.
    pub fn equal(&self, other: &Value) -> bool {
        self == other
    }

    pub fn boxed<T: Boxable>(value: &T) -> Result<Value, ValueError> {
        value.box_value()
    }

    pub fn unbox<T: Unboxable>(&self) -> Result<T, ValueError> {
        T::unbox(self)
    }
}

/// `Box(v)` (spec §4.1): wraps a supported scalar or structured message.
pub trait Boxable {
    fn box_value(&self) -> Result<Value, ValueError>;
}

/// `Unbox(v, target)` (spec §4.1).
pub trait Unboxable: Sized {
    fn unbox(v: &Value) -> Result<Self, ValueError>;
}

macro_rules! impl_narrow_int {
    ($ty:ty, $target_name:literal) => {
        impl Boxable for $ty {
            fn box_value(&self) -> Result<Value, ValueError> {
                (*self as i64).box_value()
            }
        }

        impl Unboxable for $ty {
            fn unbox(v: &Value) -> Result<Self, ValueError> {
                let wide = i64::unbox(v)?;
                <$ty>::try_from(wide).map_err(|_| ValueError::Conversion {
                    type_url: v.type_url.clone(),
                    target: $target_name,
                    detail: wide.to_string(),
                })
            }
        }
    };
}

macro_rules! impl_narrow_uint {
    ($ty:ty, $target_name:literal) => {
        impl Boxable for $ty {
            fn box_value(&self) -> Result<Value, ValueError> {
                (*self as u64).box_value()
            }
        }

        impl Unboxable for $ty {
            fn unbox(v: &Value) -> Result<Self, ValueError> {
                let wide = u64::unbox(v)?;
                <$ty>::try_from(wide).map_err(|_| ValueError::Conversion {
                    type_url: v.type_url.clone(),
                    target: $target_name,
                    detail: wide.to_string(),
                })
            }
        }
    };
}

impl Boxable for bool {
    fn box_value(&self) -> Result<Value, ValueError> {
        Ok(Value::new(TYPE_URL_BOOL, vec![u8::from(*self)]))
    }
}

impl Unboxable for bool {
    fn unbox(v: &Value) -> Result<Self, ValueError> {
        if v.type_url != TYPE_URL_BOOL {
            return Err(conversion_err(v, "bool"));
        }
        match v.payload.first() {
            Some(0) => Ok(false),
            Some(_) => Ok(true),
            None => Err(ValueError::MalformedPayload("bool")),
        }
    }
}

impl Boxable for i64 {
    fn box_value(&self) -> Result<Value, ValueError> {
        let mut payload = Vec::with_capacity(10);
        varint::encode_i64(*self, &mut payload);
        Ok(Value::new(TYPE_URL_INT64, payload))
    }
}

impl Unboxable for i64 {
    fn unbox(v: &Value) -> Result<Self, ValueError> {
        if v.type_url != TYPE_URL_INT64 {
            return Err(conversion_err(v, "i64"));
        }
        varint::decode_i64(&v.payload)
            .map(|(value, _)| value)
            .ok_or(ValueError::MalformedPayload("i64"))
    }
}

impl Boxable for u64 {
    fn box_value(&self) -> Result<Value, ValueError> {
        let mut payload = Vec::with_capacity(10);
        varint::encode_u64(*self, &mut payload);
        Ok(Value::new(TYPE_URL_UINT64, payload))
    }
}

impl Unboxable for u64 {
    fn unbox(v: &Value) -> Result<Self, ValueError> {
        if v.type_url != TYPE_URL_UINT64 {
            return Err(conversion_err(v, "u64"));
        }
        varint::decode_u64(&v.payload)
            .map(|(value, _)| value)
            .ok_or(ValueError::MalformedPayload("u64"))
    }
}

impl_narrow_int!(i8, "i8");
impl_narrow_int!(i16, "i16");
impl_narrow_int!(i32, "i32");
impl_narrow_uint!(u8, "u8");
impl_narrow_uint!(u16, "u16");
impl_narrow_uint!(u32, "u32");

impl Boxable for f64 {
    fn box_value(&self) -> Result<Value, ValueError> {
        Ok(Value::new(TYPE_URL_DOUBLE, self.to_le_bytes().to_vec()))
    }
}

impl Unboxable for f64 {
    fn unbox(v: &Value) -> Result<Self, ValueError> {
        if v.type_url != TYPE_URL_DOUBLE {
            return Err(conversion_err(v, "f64"));
        }
        let bytes: [u8; 8] = v
            .payload
            .as_slice()
            .try_into()
            .map_err(|_| ValueError::MalformedPayload("f64"))?;
        Ok(f64::from_le_bytes(bytes))
    }
}

impl Boxable for f32 {
    fn box_value(&self) -> Result<Value, ValueError> {
        (*self as f64).box_value()
    }
}

impl Unboxable for f32 {
    fn unbox(v: &Value) -> Result<Self, ValueError> {
        let wide = f64::unbox(v)?;
        Ok(wide as f32)
    }
}

impl Boxable for String {
    fn box_value(&self) -> Result<Value, ValueError> {
        Ok(Value::new(TYPE_URL_STRING, self.as_bytes().to_vec()))
    }
}

impl Boxable for &str {
    fn box_value(&self) -> Result<Value, ValueError> {
        Ok(Value::new(TYPE_URL_STRING, self.as_bytes().to_vec()))
    }
}

impl Unboxable for String {
    fn unbox(v: &Value) -> Result<Self, ValueError> {
        if v.type_url != TYPE_URL_STRING {
            return Err(conversion_err(v, "String"));
        }
        String::from_utf8(v.payload.clone()).map_err(|_| ValueError::MalformedPayload("String"))
    }
}

impl Boxable for Vec<u8> {
    fn box_value(&self) -> Result<Value, ValueError> {
        Ok(Value::new(TYPE_URL_BYTES, self.clone()))
    }
}

impl Unboxable for Vec<u8> {
    fn unbox(v: &Value) -> Result<Self, ValueError> {
        if v.type_url != TYPE_URL_BYTES {
            return Err(conversion_err(v, "Vec<u8>"));
        }
        Ok(v.payload.clone())
    }
}

impl Boxable for DateTime<Utc> {
    fn box_value(&self) -> Result<Value, ValueError> {
        let mut payload = Vec::with_capacity(12);
        varint::encode_i64(self.timestamp(), &mut payload);
        varint::encode_u64(u64::from(self.timestamp_subsec_nanos()), &mut payload);
        Ok(Value::new(TYPE_URL_TIMESTAMP, payload))
    }
}

impl Unboxable for DateTime<Utc> {
    fn unbox(v: &Value) -> Result<Self, ValueError> {
        if v.type_url != TYPE_URL_TIMESTAMP {
            return Err(conversion_err(v, "Timestamp"));
        }
        let (secs, rest) =
            varint::decode_i64(&v.payload).ok_or(ValueError::MalformedPayload("Timestamp"))?;
        let (nanos, _) =
            varint::decode_u64(rest).ok_or(ValueError::MalformedPayload("Timestamp"))?;
        DateTime::<Utc>::from_timestamp(secs, nanos as u32)
            .ok_or(ValueError::MalformedPayload("Timestamp"))
    }
}

impl Boxable for chrono::Duration {
    fn box_value(&self) -> Result<Value, ValueError> {
        let mut payload = Vec::with_capacity(12);
        varint::encode_i64(self.num_seconds(), &mut payload);
        let nanos = (*self - chrono::Duration::seconds(self.num_seconds()))
            .num_nanoseconds()
            .unwrap_or(0);
        varint::encode_i64(nanos, &mut payload);
        Ok(Value::new(TYPE_URL_DURATION, payload))
    }
}

impl Unboxable for chrono::Duration {
    fn unbox(v: &Value) -> Result<Self, ValueError> {
        if v.type_url != TYPE_URL_DURATION {
            return Err(conversion_err(v, "Duration"));
        }
        let (secs, rest) =
            varint::decode_i64(&v.payload).ok_or(ValueError::MalformedPayload("Duration"))?;
        let (nanos, _) =
            varint::decode_i64(rest).ok_or(ValueError::MalformedPayload("Duration"))?;
        Ok(chrono::Duration::seconds(secs) + chrono::Duration::nanoseconds(nanos))
    }
}

/// Structured message boxing: any serde type round-trips through JSON bytes
/// under its own type URL, matching the "user-defined structured messages"
/// case of spec §3's Value definition.
pub fn box_message<T: Serialize>(type_url: &str, value: &T) -> Result<Value, ValueError> {
    let payload = serde_json::to_vec(value)
        .map_err(|err| ValueError::Conversion {
            type_url: type_url.to_owned(),
            target: "message",
            detail: err.to_string(),
        })?;
    Ok(Value::new(type_url, payload))
}

pub fn unbox_message<T: for<'de> Deserialize<'de>>(
    v: &Value,
    expected_type_url: &str,
) -> Result<T, ValueError> {
    if v.type_url != expected_type_url {
        return Err(ValueError::Conversion {
            type_url: v.type_url.clone(),
            target: "message",
            detail: format!("expected {expected_type_url}"),
        });
    }
    serde_json::from_slice(&v.payload).map_err(|err| ValueError::Conversion {
        type_url: v.type_url.clone(),
        target: "message",
        detail: err.to_string(),
    })
}

fn conversion_err(v: &Value, target: &'static str) -> ValueError {
    ValueError::Conversion {
        type_url: v.type_url.clone(),
        target,
        detail: format!("type url {}", v.type_url),
    }
}
