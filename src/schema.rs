//! Stream schemas and schema binding.
//!
//! A schema is the ordered list of typed branches every record of a stream
//! carries. Branch `i` is stored in FlatBuffers vtable slot `i`.

use crate::error::{Error, Result};
use crate::record::{self, Record};
use flatbuffers::VOffsetT;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Scalar type of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BranchKind::Bool => "bool",
            BranchKind::I32 => "i32",
            BranchKind::I64 => "i64",
            BranchKind::U32 => "u32",
            BranchKind::U64 => "u64",
            BranchKind::F32 => "f32",
            BranchKind::F64 => "f64",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub kind: BranchKind,
}

/// The ordered branch list of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Branch>", into = "Vec<Branch>")]
pub struct StreamSchema {
    branches: Vec<Branch>,
}

impl StreamSchema {
    /// Builds a schema, rejecting empty or duplicate branch names.
    pub fn new(branches: Vec<Branch>) -> Result<Self> {
        if branches.len() > usize::from(VOffsetT::MAX / 2) - 2 {
            return Err(Error::invalid_schema(format!(
                "{} branches exceed the table slot limit",
                branches.len()
            )));
        }
        let mut seen = HashSet::with_capacity(branches.len());
        for branch in &branches {
            if branch.name.is_empty() {
                return Err(Error::invalid_schema("branch name must not be empty"));
            }
            if !seen.insert(branch.name.as_str()) {
                return Err(Error::invalid_schema(format!(
                    "duplicate branch `{}`",
                    branch.name
                )));
            }
        }
        Ok(Self { branches })
    }

    pub fn builder() -> StreamSchemaBuilder {
        StreamSchemaBuilder::default()
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.branches.iter().position(|b| b.name == name)
    }

    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    /// Binds an input stream's schema to this (output) schema.
    ///
    /// Every output branch must exist in the input with the same kind. Input
    /// branches the output does not carry are dropped. Identical schemas bind
    /// as a pass-through.
    pub fn bind_from(&self, input: &StreamSchema) -> std::result::Result<Binding, String> {
        if self == input {
            return Ok(Binding { order: None });
        }
        let mut order = Vec::with_capacity(self.branches.len());
        for branch in &self.branches {
            let index = input
                .index_of(&branch.name)
                .ok_or_else(|| format!("input lacks branch `{}`", branch.name))?;
            let found = input.branches[index].kind;
            if found != branch.kind {
                return Err(format!(
                    "branch `{}` is {found} in input but {} in output",
                    branch.name, branch.kind
                ));
            }
            order.push(index);
        }
        Ok(Binding { order: Some(order) })
    }
}

impl TryFrom<Vec<Branch>> for StreamSchema {
    type Error = Error;

    fn try_from(branches: Vec<Branch>) -> Result<Self> {
        StreamSchema::new(branches)
    }
}

impl From<StreamSchema> for Vec<Branch> {
    fn from(schema: StreamSchema) -> Self {
        schema.branches
    }
}

/// Vtable slot of branch `index`.
#[inline]
pub(crate) fn field_slot(index: usize) -> VOffsetT {
    // Slot 0 and 1 of a vtable hold its own size and the table size.
    ((index + 2) * 2) as VOffsetT
}

#[derive(Debug, Default)]
pub struct StreamSchemaBuilder {
    branches: Vec<Branch>,
}

impl StreamSchemaBuilder {
    pub fn branch(mut self, name: impl Into<String>, kind: BranchKind) -> Self {
        self.branches.push(Branch {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn build(self) -> Result<StreamSchema> {
        StreamSchema::new(self.branches)
    }
}

/// How records of one input stream map onto an output stream's layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// For each output branch, the input branch index. `None` means identical layouts.
    order: Option<Vec<usize>>,
}

impl Binding {
    pub fn is_identity(&self) -> bool {
        self.order.is_none()
    }

    /// Copies `payload` (laid out per `input`) into `out` laid out per `output`.
    pub fn adapt(
        &self,
        input: &StreamSchema,
        output: &StreamSchema,
        payload: &[u8],
        out: &mut Vec<u8>,
    ) -> Result<()> {
        out.clear();
        match &self.order {
            None => out.extend_from_slice(payload),
            Some(order) => {
                let record = Record::parse(input, payload)?;
                let values: Vec<_> = order.iter().map(|&i| record.value_at(i)).collect();
                out.extend_from_slice(&record::encode(output, &values)?);
            }
        }
        Ok(())
    }
}
