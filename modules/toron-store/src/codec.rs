// Compact binary encoding for stored records.
//
// A record is written as its fields in the order declared by its `Shape`,
// which sorts fields by name so the layout never depends on how a type
// happens to list them. Integers are big-endian, floats are written by bit
// pattern, strings and sequences carry a u32 length prefix, and optionals a
// one-byte presence flag. Nothing about field names or types is written, so
// a reader must know the shape the bytes were written with.
//
// Decoding collects the fields into a `FieldSet` and hands it to the first
// of the type's constructors whose required fields are all present. Adding
// an optional field, or a constructor for an older shape, keeps existing
// bytes readable without a version tag.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, TimeZone, Utc};

use crate::error::CodecError;

type Result<T> = std::result::Result<T, CodecError>;

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    I32,
    I64,
    F32,
    F64,
    Str,
    /// Seconds since the epoch (i64) followed by sub-second nanos (u32).
    Timestamp,
    Optional(Box<FieldType>),
    List(Box<FieldType>),
    Pair(Box<FieldType>, Box<FieldType>),
    Record(Shape),
}

impl FieldType {
    pub fn optional(inner: FieldType) -> Self {
        FieldType::Optional(Box::new(inner))
    }

    pub fn list(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    pub fn pair(first: FieldType, second: FieldType) -> Self {
        FieldType::Pair(Box::new(first), Box::new(second))
    }

    fn label(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::I32 => "i32",
            FieldType::I64 => "i64",
            FieldType::F32 => "f32",
            FieldType::F64 => "f64",
            FieldType::Str => "string",
            FieldType::Timestamp => "timestamp",
            FieldType::Optional(_) => "optional",
            FieldType::List(_) => "list",
            FieldType::Pair(_, _) => "pair",
            FieldType::Record(_) => "record",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
}

/// Declared field layout of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    name: &'static str,
    fields: Vec<Field>,
}

impl Shape {
    /// Fields are reordered lexicographically by name.
    pub fn new(
        name: &'static str,
        fields: impl IntoIterator<Item = (&'static str, FieldType)>,
    ) -> Self {
        let mut fields: Vec<Field> = fields
            .into_iter()
            .map(|(name, ty)| Field { name, ty })
            .collect();
        fields.sort_by(|a, b| a.name.cmp(b.name));
        fields.dedup_by(|a, b| a.name == b.name);
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
    Optional(Option<Box<Value>>),
    List(Vec<Value>),
    Pair(Box<Value>, Box<Value>),
    Record(FieldSet),
}

impl Value {
    /// Wrap a nested record for use as a field value.
    pub fn record<T: Codable>(record: &T) -> Self {
        Value::Record(record.to_fields())
    }

    fn label(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Optional(_) => "optional",
            Value::List(_) => "list",
            Value::Pair(_, _) => "pair",
            Value::Record(_) => "record",
        }
    }
}

/// Named field values of one record, either about to be encoded or just
/// decoded. Absent optionals are simply not present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet(BTreeMap<String, Value>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl IntoValue) -> Self {
        self.insert(name, value.into_value());
        self
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn take<T: FromValue>(&mut self, name: &str) -> Result<T> {
        let value = self
            .0
            .remove(name)
            .ok_or_else(|| CodecError::SchemaMismatch(format!("missing field `{name}`")))?;
        T::from_value(value)
    }

    pub fn take_opt<T: FromValue>(&mut self, name: &str) -> Result<Option<T>> {
        match self.0.remove(name) {
            None | Some(Value::Optional(None)) => Ok(None),
            Some(Value::Optional(Some(inner))) => T::from_value(*inner).map(Some),
            Some(other) => T::from_value(other).map(Some),
        }
    }

    pub fn take_record<T: Codable>(&mut self, name: &str) -> Result<T> {
        match self.0.remove(name) {
            Some(Value::Record(fields)) => construct(fields, name),
            Some(other) => Err(mismatch("record", &other)),
            None => Err(CodecError::SchemaMismatch(format!("missing field `{name}`"))),
        }
    }
}

fn mismatch(expected: &str, found: &Value) -> CodecError {
    CodecError::SchemaMismatch(format!("expected {expected}, found {}", found.label()))
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! scalar_value {
    ($ty:ty, $variant:ident, $label:literal) => {
        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch($label, &other)),
                }
            }
        }
    };
}

scalar_value!(bool, Bool, "bool");
scalar_value!(i32, I32, "i32");
scalar_value!(i64, I64, "i64");
scalar_value!(f32, F32, "f32");
scalar_value!(f64, F64, "f64");
scalar_value!(String, Str, "string");
scalar_value!(DateTime<Utc>, Timestamp, "timestamp");

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        Value::Optional(self.map(|v| Box::new(v.into_value())))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Optional(None) => Ok(None),
            Value::Optional(Some(inner)) => T::from_value(*inner).map(Some),
            other => Err(mismatch("optional", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<A: IntoValue, B: IntoValue> IntoValue for (A, B) {
    fn into_value(self) -> Value {
        Value::Pair(Box::new(self.0.into_value()), Box::new(self.1.into_value()))
    }
}

impl<A: FromValue, B: FromValue> FromValue for (A, B) {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Pair(a, b) => Ok((A::from_value(*a)?, B::from_value(*b)?)),
            other => Err(mismatch("pair", &other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Codable
// ---------------------------------------------------------------------------

/// One way of building `T` from decoded fields, usable when every name in
/// `required` was decoded.
pub struct Constructor<T> {
    pub required: &'static [&'static str],
    pub build: fn(FieldSet) -> Result<T>,
}

/// A record type with an explicit field list.
pub trait Codable: Sized {
    /// Current layout, used for every write.
    fn shape() -> &'static Shape;

    fn to_fields(&self) -> FieldSet;

    /// Candidate constructors, most specific first.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Earlier layouts that stored bytes may still use, newest first.
    fn legacy_shapes() -> Vec<&'static Shape> {
        Vec::new()
    }
}

pub fn encode<T: Codable>(record: &T) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    write_record(&mut buf, T::shape(), &record.to_fields())?;
    Ok(buf.freeze())
}

pub fn decode<T: Codable>(bytes: &[u8]) -> Result<T> {
    decode_with(bytes, T::shape())
}

/// Decode with the current layout, falling back to each legacy layout. The
/// current layout's error is returned when none of them fits.
pub fn decode_any<T: Codable>(bytes: &[u8]) -> Result<T> {
    let current = match decode(bytes) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    T::legacy_shapes()
        .into_iter()
        .find_map(|shape| decode_with(bytes, shape).ok())
        .ok_or(current)
}

/// Decode bytes written with `shape`, which may be an older layout of `T`.
pub fn decode_with<T: Codable>(bytes: &[u8], shape: &Shape) -> Result<T> {
    let mut buf = bytes;
    let fields = read_record(&mut buf, shape)?;
    if buf.has_remaining() {
        return Err(CodecError::SchemaMismatch(format!(
            "{} trailing bytes after {}",
            buf.remaining(),
            shape.name()
        )));
    }
    construct(fields, shape.name())
}

fn construct<T: Codable>(fields: FieldSet, context: &str) -> Result<T> {
    let constructor = T::constructors()
        .into_iter()
        .find(|c| c.required.iter().all(|name| fields.contains(name)))
        .ok_or_else(|| {
            CodecError::SchemaMismatch(format!("no constructor accepts the fields of {context}"))
        })?;
    (constructor.build)(fields)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn write_record(buf: &mut BytesMut, shape: &Shape, fields: &FieldSet) -> Result<()> {
    for field in shape.fields() {
        match (fields.get(field.name), &field.ty) {
            (Some(value), ty) => write_value(buf, ty, value)?,
            (None, FieldType::Optional(_)) => buf.put_u8(0),
            (None, _) => {
                return Err(CodecError::SchemaMismatch(format!(
                    "{} is missing required field `{}`",
                    shape.name(),
                    field.name
                )))
            }
        }
    }
    Ok(())
}

fn write_len(buf: &mut BytesMut, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| CodecError::UnsupportedType(format!("length {len} exceeds u32")))?;
    buf.put_u32(len);
    Ok(())
}

fn write_value(buf: &mut BytesMut, ty: &FieldType, value: &Value) -> Result<()> {
    match (ty, value) {
        (FieldType::Bool, Value::Bool(b)) => buf.put_u8(u8::from(*b)),
        (FieldType::I32, Value::I32(n)) => buf.put_i32(*n),
        (FieldType::I64, Value::I64(n)) => buf.put_i64(*n),
        (FieldType::F32, Value::F32(x)) => buf.put_u32(x.to_bits()),
        (FieldType::F64, Value::F64(x)) => buf.put_u64(x.to_bits()),
        (FieldType::Str, Value::Str(s)) => {
            write_len(buf, s.len())?;
            buf.put_slice(s.as_bytes());
        }
        (FieldType::Timestamp, Value::Timestamp(t)) => {
            buf.put_i64(t.timestamp());
            buf.put_u32(t.timestamp_subsec_nanos());
        }
        (FieldType::Optional(_), Value::Optional(None)) => buf.put_u8(0),
        (FieldType::Optional(inner), Value::Optional(Some(v))) => {
            buf.put_u8(1);
            write_value(buf, inner, v)?;
        }
        (FieldType::List(inner), Value::List(items)) => {
            write_len(buf, items.len())?;
            for item in items {
                write_value(buf, inner, item)?;
            }
        }
        (FieldType::Pair(first, second), Value::Pair(a, b)) => {
            write_value(buf, first, a)?;
            write_value(buf, second, b)?;
        }
        (FieldType::Record(shape), Value::Record(fields)) => write_record(buf, shape, fields)?,
        (ty, value) => {
            return Err(CodecError::UnsupportedType(format!(
                "{} field cannot hold a {} value",
                ty.label(),
                value.label()
            )))
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn ensure(buf: &[u8], needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(CodecError::TruncatedInput {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn read_len(buf: &mut &[u8]) -> Result<usize> {
    ensure(buf, 4)?;
    Ok(buf.get_u32() as usize)
}

fn read_record(buf: &mut &[u8], shape: &Shape) -> Result<FieldSet> {
    let mut fields = FieldSet::new();
    for field in shape.fields() {
        match read_value(buf, &field.ty)? {
            Value::Optional(None) => {}
            value => fields.insert(field.name, value),
        }
    }
    Ok(fields)
}

fn read_value(buf: &mut &[u8], ty: &FieldType) -> Result<Value> {
    let value = match ty {
        FieldType::Bool => {
            ensure(buf, 1)?;
            match buf.get_u8() {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => {
                    return Err(CodecError::SchemaMismatch(format!("invalid bool byte {other}")))
                }
            }
        }
        FieldType::I32 => {
            ensure(buf, 4)?;
            Value::I32(buf.get_i32())
        }
        FieldType::I64 => {
            ensure(buf, 8)?;
            Value::I64(buf.get_i64())
        }
        FieldType::F32 => {
            ensure(buf, 4)?;
            Value::F32(f32::from_bits(buf.get_u32()))
        }
        FieldType::F64 => {
            ensure(buf, 8)?;
            Value::F64(f64::from_bits(buf.get_u64()))
        }
        FieldType::Str => {
            let len = read_len(buf)?;
            ensure(buf, len)?;
            let raw = buf.copy_to_bytes(len);
            let text = String::from_utf8(raw.to_vec())
                .map_err(|e| CodecError::SchemaMismatch(format!("invalid utf-8: {e}")))?;
            Value::Str(text)
        }
        FieldType::Timestamp => {
            ensure(buf, 12)?;
            let secs = buf.get_i64();
            let nanos = buf.get_u32();
            let ts = Utc.timestamp_opt(secs, nanos).single().ok_or_else(|| {
                CodecError::SchemaMismatch(format!("timestamp out of range: {secs}.{nanos}"))
            })?;
            Value::Timestamp(ts)
        }
        FieldType::Optional(inner) => {
            ensure(buf, 1)?;
            match buf.get_u8() {
                0 => Value::Optional(None),
                1 => Value::Optional(Some(Box::new(read_value(buf, inner)?))),
                other => {
                    return Err(CodecError::SchemaMismatch(format!(
                        "invalid presence flag {other}"
                    )))
                }
            }
        }
        FieldType::List(inner) => {
            let count = read_len(buf)?;
            let mut items = Vec::with_capacity(count.min(buf.remaining()));
            for _ in 0..count {
                items.push(read_value(buf, inner)?);
            }
            Value::List(items)
        }
        FieldType::Pair(first, second) => {
            let a = read_value(buf, first)?;
            let b = read_value(buf, second)?;
            Value::Pair(Box::new(a), Box::new(b))
        }
        FieldType::Record(shape) => Value::Record(read_record(buf, shape)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Airing {
        station: String,
        slot: (i32, i32),
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        name: String,
        rating: f64,
        weight: f32,
        tags: Vec<String>,
        note: Option<String>,
        airing: Airing,
    }

    static AIRING_SHAPE: LazyLock<Shape> = LazyLock::new(|| {
        Shape::new(
            "Airing",
            [
                ("station", FieldType::Str),
                ("slot", FieldType::pair(FieldType::I32, FieldType::I32)),
            ],
        )
    });

    static ENTRY_SHAPE: LazyLock<Shape> = LazyLock::new(|| {
        Shape::new(
            "Entry",
            [
                ("name", FieldType::Str),
                ("rating", FieldType::F64),
                ("weight", FieldType::F32),
                ("tags", FieldType::list(FieldType::Str)),
                ("note", FieldType::optional(FieldType::Str)),
                ("airing", FieldType::Record(AIRING_SHAPE.clone())),
            ],
        )
    });

    impl Codable for Airing {
        fn shape() -> &'static Shape {
            &AIRING_SHAPE
        }

        fn to_fields(&self) -> FieldSet {
            FieldSet::new()
                .with("station", self.station.as_str())
                .with("slot", self.slot)
        }

        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor {
                required: &["station", "slot"],
                build: |mut f| {
                    Ok(Airing {
                        station: f.take("station")?,
                        slot: f.take("slot")?,
                    })
                },
            }]
        }
    }

    impl Codable for Entry {
        fn shape() -> &'static Shape {
            &ENTRY_SHAPE
        }

        fn to_fields(&self) -> FieldSet {
            FieldSet::new()
                .with("name", self.name.as_str())
                .with("rating", self.rating)
                .with("weight", self.weight)
                .with("tags", self.tags.clone())
                .with("note", self.note.clone())
                .with("airing", Value::record(&self.airing))
        }

        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor {
                required: &["name", "rating", "weight", "tags", "airing"],
                build: |mut f| {
                    Ok(Entry {
                        name: f.take("name")?,
                        rating: f.take("rating")?,
                        weight: f.take("weight")?,
                        tags: f.take("tags")?,
                        note: f.take_opt("note")?,
                        airing: f.take_record("airing")?,
                    })
                },
            }]
        }
    }

    fn entry() -> Entry {
        Entry {
            name: "Mushishi".into(),
            rating: 8.75,
            weight: -0.5,
            tags: vec!["iyashikei".into(), "蟲師".into()],
            note: Some("rewatch".into()),
            airing: Airing {
                station: "Fuji TV".into(),
                slot: (25, 30),
            },
        }
    }

    #[test]
    fn shape_orders_fields_by_name() {
        let names: Vec<_> = ENTRY_SHAPE.fields().iter().map(|f| f.name).collect();
        assert_eq!(names, ["airing", "name", "note", "rating", "tags", "weight"]);
    }

    #[test]
    fn nested_record_round_trip() {
        let e = entry();
        let bytes = encode(&e).unwrap();
        assert_eq!(decode::<Entry>(&bytes).unwrap(), e);
    }

    #[test]
    fn absent_optional_writes_only_the_flag() {
        let mut with = entry();
        with.note = Some(String::new());
        let mut without = entry();
        without.note = None;

        let with_len = encode(&with).unwrap().len();
        let without_len = encode(&without).unwrap().len();
        // flag + u32 length vs flag alone
        assert_eq!(with_len - without_len, 4);
        assert_eq!(decode::<Entry>(&encode(&without).unwrap()).unwrap(), without);
    }

    #[test]
    fn every_strict_prefix_is_truncated() {
        let bytes = encode(&entry()).unwrap();
        for cut in 0..bytes.len() {
            let err = decode::<Entry>(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, CodecError::TruncatedInput { .. }), "cut at {cut}: {err}");
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&entry()).unwrap().to_vec();
        bytes.push(0);
        assert!(matches!(
            decode::<Entry>(&bytes),
            Err(CodecError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn value_of_wrong_type_is_unsupported() {
        let shape = Shape::new("Bad", [("n", FieldType::I32)]);
        let mut buf = BytesMut::new();
        let fields = FieldSet::new().with("n", "not a number");
        assert!(matches!(
            write_record(&mut buf, &shape, &fields),
            Err(CodecError::UnsupportedType(_))
        ));
    }

    #[test]
    fn no_matching_constructor_is_schema_mismatch() {
        let narrow = Shape::new("Airing", [("station", FieldType::Str)]);
        let mut buf = BytesMut::new();
        write_record(&mut buf, &narrow, &FieldSet::new().with("station", "NHK")).unwrap();
        assert!(matches!(
            decode_with::<Airing>(&buf, &narrow),
            Err(CodecError::SchemaMismatch(_))
        ));
    }
}
