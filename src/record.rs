//! FlatBuffers record payloads.
//!
//! Each record is a single FlatBuffers table whose fields are the scalar
//! branches of the stream schema, in schema order. Payloads are verified
//! against the schema before any field is read.

use crate::error::{Error, Result};
use crate::schema::{field_slot, BranchKind, StreamSchema};
use flatbuffers::{FlatBufferBuilder, Table, Verifier, VerifierOptions};

/// A single branch value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn kind(&self) -> BranchKind {
        match self {
            Value::Bool(_) => BranchKind::Bool,
            Value::I32(_) => BranchKind::I32,
            Value::I64(_) => BranchKind::I64,
            Value::U32(_) => BranchKind::U32,
            Value::U64(_) => BranchKind::U64,
            Value::F32(_) => BranchKind::F32,
            Value::F64(_) => BranchKind::F64,
        }
    }

    /// Integer view; `None` for floats, bools and `u64` values above `i64::MAX`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I32(v) => Some(v.into()),
            Value::I64(v) => Some(v),
            Value::U32(v) => Some(v.into()),
            Value::U64(v) => i64::try_from(v).ok(),
            Value::Bool(_) | Value::F32(_) | Value::F64(_) => None,
        }
    }

    /// Numeric view of any non-bool value.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::I32(v) => Some(v.into()),
            Value::I64(v) => Some(v as f64),
            Value::U32(v) => Some(v.into()),
            Value::U64(v) => Some(v as f64),
            Value::F32(v) => Some(v.into()),
            Value::F64(v) => Some(v),
            Value::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

impl_value_from!(bool => Bool, i32 => I32, i64 => I64, u32 => U32, u64 => U64, f32 => F32, f64 => F64);

/// A verified, borrowed view of one record.
pub struct Record<'a> {
    schema: &'a StreamSchema,
    table: Table<'a>,
}

impl<'a> Record<'a> {
    /// Verifies `payload` against `schema` and returns a view over it.
    pub fn parse(schema: &'a StreamSchema, payload: &'a [u8]) -> Result<Self> {
        let root = verify(schema, payload)?;
        // SAFETY: `verify` checked that `root` is an in-bounds table whose
        // vtable and every schema slot hold a value of the declared kind.
        let table = unsafe { Table::new(payload, root) };
        Ok(Self { schema, table })
    }

    pub fn schema(&self) -> &'a StreamSchema {
        self.schema
    }

    /// The value of branch `index`. Panics if `index` is out of range.
    pub fn value_at(&self, index: usize) -> Value {
        let slot = field_slot(index);
        let table = &self.table;
        // SAFETY: every slot of the schema was verified in `parse` with its declared kind.
        unsafe {
            match self.schema.branches()[index].kind {
                BranchKind::Bool => Value::Bool(table.get::<bool>(slot, Some(false)).unwrap_or_default()),
                BranchKind::I32 => Value::I32(table.get::<i32>(slot, Some(0)).unwrap_or_default()),
                BranchKind::I64 => Value::I64(table.get::<i64>(slot, Some(0)).unwrap_or_default()),
                BranchKind::U32 => Value::U32(table.get::<u32>(slot, Some(0)).unwrap_or_default()),
                BranchKind::U64 => Value::U64(table.get::<u64>(slot, Some(0)).unwrap_or_default()),
                BranchKind::F32 => Value::F32(table.get::<f32>(slot, Some(0.0)).unwrap_or_default()),
                BranchKind::F64 => Value::F64(table.get::<f64>(slot, Some(0.0)).unwrap_or_default()),
            }
        }
    }

    /// The value of the named branch, or `None` if the schema has no such branch.
    pub fn value(&self, name: &str) -> Option<Value> {
        self.schema.index_of(name).map(|i| self.value_at(i))
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(|v| v.as_bool())
    }

    /// All values in schema order.
    pub fn values(&self) -> Vec<Value> {
        (0..self.schema.len()).map(|i| self.value_at(i)).collect()
    }
}

impl std::fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (branch, value) in self.schema.branches().iter().zip(self.values()) {
            map.entry(&branch.name, &value);
        }
        map.finish()
    }
}

/// Returns the root table position after verifying every schema slot.
fn verify(schema: &StreamSchema, payload: &[u8]) -> Result<usize> {
    if payload.len() < 4 {
        return Err(Error::invalid_record("buffer too small for a record table"));
    }
    let root = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;

    let opts = VerifierOptions::default();
    let mut verifier = Verifier::new(&opts, payload);
    let mut table = verifier.visit_table(root)?;
    for (index, branch) in schema.branches().iter().enumerate() {
        let slot = field_slot(index);
        table = match branch.kind {
            BranchKind::Bool => table.visit_field::<bool>("branch", slot, true)?,
            BranchKind::I32 => table.visit_field::<i32>("branch", slot, true)?,
            BranchKind::I64 => table.visit_field::<i64>("branch", slot, true)?,
            BranchKind::U32 => table.visit_field::<u32>("branch", slot, true)?,
            BranchKind::U64 => table.visit_field::<u64>("branch", slot, true)?,
            BranchKind::F32 => table.visit_field::<f32>("branch", slot, true)?,
            BranchKind::F64 => table.visit_field::<f64>("branch", slot, true)?,
        };
    }
    table.finish();
    Ok(root)
}

/// Encodes a complete value list (schema order) into a record payload.
pub fn encode(schema: &StreamSchema, values: &[Value]) -> Result<Vec<u8>> {
    let mut builder = FlatBufferBuilder::new();
    encode_with(&mut builder, schema, values)?;
    Ok(builder.finished_data().to_vec())
}

fn encode_with(
    builder: &mut FlatBufferBuilder<'_>,
    schema: &StreamSchema,
    values: &[Value],
) -> Result<()> {
    if values.len() != schema.len() {
        return Err(Error::invalid_record(format!(
            "expected {} values, got {}",
            schema.len(),
            values.len()
        )));
    }
    builder.reset();
    let start = builder.start_table();
    for (index, (branch, value)) in schema.branches().iter().zip(values).enumerate() {
        if value.kind() != branch.kind {
            return Err(Error::invalid_record(format!(
                "branch `{}` expects {}, got {}",
                branch.name,
                branch.kind,
                value.kind()
            )));
        }
        let slot = field_slot(index);
        match *value {
            Value::Bool(v) => builder.push_slot_always::<bool>(slot, v),
            Value::I32(v) => builder.push_slot_always::<i32>(slot, v),
            Value::I64(v) => builder.push_slot_always::<i64>(slot, v),
            Value::U32(v) => builder.push_slot_always::<u32>(slot, v),
            Value::U64(v) => builder.push_slot_always::<u64>(slot, v),
            Value::F32(v) => builder.push_slot_always::<f32>(slot, v),
            Value::F64(v) => builder.push_slot_always::<f64>(slot, v),
        }
    }
    let table = builder.end_table(start);
    builder.finish(table, None);
    Ok(())
}

/// Builds one record by branch name.
///
/// The builder is reusable: `finish` resets the set values so the next record
/// can be filled without reallocating the FlatBuffers builder.
pub struct RecordBuilder<'s> {
    schema: &'s StreamSchema,
    values: Vec<Option<Value>>,
    builder: FlatBufferBuilder<'static>,
}

impl<'s> RecordBuilder<'s> {
    pub fn new(schema: &'s StreamSchema) -> Self {
        Self {
            schema,
            values: vec![None; schema.len()],
            builder: FlatBufferBuilder::new(),
        }
    }

    /// Sets a branch value; the value kind must match the branch kind exactly.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| Error::invalid_record(format!("unknown branch `{name}`")))?;
        let kind = self.schema.branches()[index].kind;
        if value.kind() != kind {
            return Err(Error::invalid_record(format!(
                "branch `{name}` expects {kind}, got {}",
                value.kind()
            )));
        }
        self.values[index] = Some(value);
        Ok(self)
    }

    /// Encodes the record. Every branch must have been set.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let mut values = Vec::with_capacity(self.values.len());
        for (branch, value) in self.schema.branches().iter().zip(&self.values) {
            match value {
                Some(v) => values.push(*v),
                None => {
                    return Err(Error::invalid_record(format!(
                        "branch `{}` was not set",
                        branch.name
                    )))
                }
            }
        }
        encode_with(&mut self.builder, self.schema, &values)?;
        self.values.iter_mut().for_each(|v| *v = None);
        Ok(self.builder.finished_data().to_vec())
    }
}
