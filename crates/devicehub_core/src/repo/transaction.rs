//! Transaction scope for device repository work.
//!
//! # Responsibility
//! - Open one SQLite transaction and expose a repository bound to it.
//! - Finish the transaction exactly once via commit or rollback.
//!
//! # Invariants
//! - The base repository is never rebound; after the scope ends it keeps
//!   reading through the same connection it had before.
//! - While the scope is open the base repository refuses work with
//!   `TransactionAlreadyActive`; only `repo()` reaches the transaction.
//! - Dropping an unfinished scope rolls back.

use crate::repo::device_repo::{RepoResult, SqliteDeviceRepository};
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Open transaction over a device connection.
#[derive(Debug)]
pub struct DeviceTransaction<'conn> {
    tx: Transaction<'conn>,
    started_at: Instant,
}

impl<'conn> DeviceTransaction<'conn> {
    pub(crate) fn begin(conn: &'conn Connection) -> RepoResult<Self> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        info!("event=tx_begin module=repo status=ok");
        Ok(Self {
            tx,
            started_at: Instant::now(),
        })
    }

    /// Repository whose reads and writes run inside this transaction.
    pub fn repo(&self) -> SqliteDeviceRepository<'_> {
        SqliteDeviceRepository::bound(&self.tx)
    }

    /// Commits every write made through `repo()`.
    pub fn commit(self) -> RepoResult<()> {
        let started_at = self.started_at;
        match self.tx.commit() {
            Ok(()) => {
                info!(
                    "event=tx_commit module=repo status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!("event=tx_commit module=repo status=error error={err}");
                Err(err.into())
            }
        }
    }

    /// Discards every write made through `repo()`.
    pub fn rollback(self) -> RepoResult<()> {
        let started_at = self.started_at;
        match self.tx.rollback() {
            Ok(()) => {
                info!(
                    "event=tx_rollback module=repo status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!("event=tx_rollback module=repo status=error error={err}");
                Err(err.into())
            }
        }
    }
}
