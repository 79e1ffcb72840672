//! Atomic multi-operation batches.
//!
//! A [`Batch`] is built up on the client, then handed to
//! [`KvStore::commit`](crate::KvStore::commit). The store checks every
//! precondition first and only then performs the writes, so a batch is
//! applied entirely or not at all.

use crate::{KvStoreError, Result};

/// A single operation queued in a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Write `value` at `key`; precondition: `key` does not exist.
    SetIfAbsent { key: String, value: String },

    /// Overwrite `value` at `key`; precondition: `key` exists.
    SetIfPresent { key: String, value: String },

    /// Remove `key`; precondition: `key` exists.
    DeleteIfPresent { key: String },

    /// Add `member` to the set at `set`. Unconditional.
    SetAdd { set: String, member: String },

    /// Remove `member` from the set at `set`. Unconditional.
    SetRemove { set: String, member: String },
}

impl BatchOp {
    /// The key this operation touches.
    pub fn key(&self) -> &str {
        match self {
            BatchOp::SetIfAbsent { key, .. }
            | BatchOp::SetIfPresent { key, .. }
            | BatchOp::DeleteIfPresent { key } => key,
            BatchOp::SetAdd { set, .. } | BatchOp::SetRemove { set, .. } => set,
        }
    }

    /// Short name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            BatchOp::SetIfAbsent { .. } => "set_if_absent",
            BatchOp::SetIfPresent { .. } => "set_if_present",
            BatchOp::DeleteIfPresent { .. } => "delete_if_present",
            BatchOp::SetAdd { .. } => "set_add",
            BatchOp::SetRemove { .. } => "set_remove",
        }
    }
}

/// An ordered list of operations committed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Starts an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an arbitrary operation.
    pub fn push(mut self, op: BatchOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn set_if_absent(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(BatchOp::SetIfAbsent {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn set_if_present(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(BatchOp::SetIfPresent {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn delete_if_present(self, key: impl Into<String>) -> Self {
        self.push(BatchOp::DeleteIfPresent { key: key.into() })
    }

    pub fn set_add(self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.push(BatchOp::SetAdd {
            set: set.into(),
            member: member.into(),
        })
    }

    pub fn set_remove(self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.push(BatchOp::SetRemove {
            set: set.into(),
            member: member.into(),
        })
    }

    /// The queued operations, in commit order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consumes the batch, yielding its operations in commit order.
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks the batch before it is sent to a store.
    ///
    /// Rejects empty batches, and batches that use the same key both as a
    /// plain value and as a set (the store could never satisfy both).
    pub fn validate(&self) -> Result<()> {
        if self.ops.is_empty() {
            return Err(KvStoreError::InvalidBatch(
                "cannot commit an empty batch".to_string(),
            ));
        }

        for (i, op) in self.ops.iter().enumerate() {
            let is_set_op = matches!(op, BatchOp::SetAdd { .. } | BatchOp::SetRemove { .. });
            for other in &self.ops[i + 1..] {
                let other_is_set_op =
                    matches!(other, BatchOp::SetAdd { .. } | BatchOp::SetRemove { .. });
                if op.key() == other.key() && is_set_op != other_is_set_op {
                    return Err(KvStoreError::InvalidBatch(format!(
                        "key {} used both as a value and as a set",
                        op.key()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// What the store did with a committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Every operation was applied.
    Applied,

    /// The precondition of the operation at index `op` did not hold, so
    /// nothing was written.
    NotApplied { op: usize },
}

impl CommitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommitOutcome::Applied)
    }
}
