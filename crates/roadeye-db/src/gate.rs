//! Commit gating between a store write and the request waiting on it.
//!
//! A write runs on a blocking thread while its caller waits with a deadline.
//! Exactly one side wins: either the write claims the gate and commits, or
//! the caller abandons it first and the write rolls back without effect.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use rusqlite::Transaction;

use crate::{Result, StoreError};

const OPEN: u8 = 0;
const COMMITTING: u8 = 1;
const ABANDONED: u8 = 2;

#[derive(Debug, Clone, Default)]
pub struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives up on the write. Returns false if the write already started
    /// committing, in which case its outcome stands and should be awaited.
    pub fn abandon(&self) -> bool {
        self.0
            .compare_exchange(OPEN, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::Acquire) == ABANDONED
    }

    /// Fails with [`StoreError::Abandoned`] once the caller has given up.
    /// Writes call this right after taking the connection.
    pub fn check(&self) -> Result<()> {
        if self.is_abandoned() {
            return Err(StoreError::Abandoned);
        }
        Ok(())
    }

    /// Marks the write as committing so the caller can no longer abandon it.
    /// Claiming twice is fine; claiming after abandonment fails.
    pub fn claim(&self) -> Result<()> {
        match self
            .0
            .compare_exchange(OPEN, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(COMMITTING) => Ok(()),
            Err(_) => Err(StoreError::Abandoned),
        }
    }

    /// Claims the gate and commits `tx`. If the caller already gave up, `tx`
    /// is dropped, which rolls it back.
    pub fn commit(&self, tx: Transaction<'_>) -> Result<()> {
        self.claim()?;
        tx.commit()?;
        Ok(())
    }
}
