//! Boolean combinators over validators.
//!
//! | Node  | Passes when            | Evaluation                               | Failure                          |
//! |-------|------------------------|------------------------------------------|----------------------------------|
//! | `And` | every operand passes   | left to right, stops at first failure    | that operand's error             |
//! | `Or`  | any operand passes     | left to right, stops at first success    | aggregate of every failure       |
//! | `Not` | the operand fails      | once                                     | "returned false" naming the node |
//!
//! Only upload failures count as failed operands. Any other error (I/O, an
//! unchecked step error) aborts evaluation and propagates unchanged.

use super::{outcome, returned_false, SharedValidator, Validator};
use crate::error::{TransferError, UploadError};
use crate::file::FileHandle;
use crate::metadata::Metadata;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

fn write_operands(f: &mut fmt::Formatter<'_>, name: &str, operands: &[SharedValidator]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, v) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{v}")?;
    }
    f.write_str(")")
}

/// Conjunction of validators.
#[derive(Clone)]
pub struct And {
    operands: Vec<SharedValidator>,
}

impl And {
    pub fn new<I: IntoIterator<Item = SharedValidator>>(operands: I) -> Self {
        Self {
            operands: operands.into_iter().collect(),
        }
    }

    pub fn operands(&self) -> &[SharedValidator] {
        &self.operands
    }
}

impl Validator for And {
    fn validate(&self, file: &mut FileHandle, metadata: &mut Metadata) -> Result<bool, TransferError> {
        for (i, v) in self.operands.iter().enumerate() {
            if let Err(e) = outcome(v.as_ref(), file, metadata)? {
                debug!("{} stopped at operand {}: {}", self, i, e);
                return Err(e.into());
            }
        }
        Ok(true)
    }
}

impl fmt::Display for And {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_operands(f, "And", &self.operands)
    }
}

/// Disjunction of validators.
///
/// With no operands there is nothing that could pass, so it returns `false`.
#[derive(Clone)]
pub struct Or {
    operands: Vec<SharedValidator>,
}

impl Or {
    pub fn new<I: IntoIterator<Item = SharedValidator>>(operands: I) -> Self {
        Self {
            operands: operands.into_iter().collect(),
        }
    }

    pub fn operands(&self) -> &[SharedValidator] {
        &self.operands
    }
}

impl Validator for Or {
    fn validate(&self, file: &mut FileHandle, metadata: &mut Metadata) -> Result<bool, TransferError> {
        if self.operands.is_empty() {
            return Ok(false);
        }
        let mut failures = Vec::with_capacity(self.operands.len());
        for v in &self.operands {
            match outcome(v.as_ref(), file, metadata)? {
                Ok(()) => return Ok(true),
                Err(e) => failures.push(e.to_string()),
            }
        }
        Err(UploadError::Aggregate(failures).into())
    }
}

impl fmt::Display for Or {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_operands(f, "Or", &self.operands)
    }
}

/// Negation of a validator. The operand's own failure reason is discarded.
#[derive(Clone)]
pub struct Not {
    inner: SharedValidator,
}

impl Not {
    pub fn new<V: Validator + 'static>(inner: V) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn inner(&self) -> &SharedValidator {
        &self.inner
    }
}

impl Validator for Not {
    fn validate(&self, file: &mut FileHandle, metadata: &mut Metadata) -> Result<bool, TransferError> {
        match outcome(self.inner.as_ref(), file, metadata)? {
            Ok(()) => Err(returned_false(self, file, metadata).into()),
            Err(_) => Ok(true),
        }
    }
}

impl fmt::Display for Not {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Not({})", self.inner)
    }
}

/// Nodes compare by their rendered tree, the same identity used in failure
/// messages. `And(a, b)` and `And(a, b)` built from separate instances are
/// equal; `And(a, b)` and `And(b, a)` are not.
macro_rules! eq_by_display {
    ($($node:ty),*) => {$(
        impl PartialEq for $node {
            fn eq(&self, other: &Self) -> bool {
                self.to_string() == other.to_string()
            }
        }
    )*};
}

eq_by_display!(And, Or, Not);
