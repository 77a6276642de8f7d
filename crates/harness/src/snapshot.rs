use crate::{HarnessError, Result};
use alloy_primitives::U256;
use ante_ledger::Ledger;

/// An opaque token for a captured ledger state.
///
/// Handles are consumed by [`SnapshotManager::restore`] and cannot be copied, so a handle is
/// restored at most once. Dropping an unrestored handle leaks every mutation made since it was
/// captured.
#[derive(Debug)]
#[must_use = "ledger mutations leak unless the snapshot is restored"]
pub struct SnapshotHandle {
    id: U256,
    armed: bool,
}

impl SnapshotHandle {
    /// The ledger's snapshot id.
    pub fn id(&self) -> U256 {
        self.id
    }

    fn disarm(mut self) -> U256 {
        self.armed = false;
        self.id
    }
}

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        if self.armed {
            warn!(target: "snapshot", id = %self.id, "snapshot handle dropped without being restored");
        }
    }
}

/// Captures and restores full ledger state.
///
/// Snapshots nest: the manager tracks outstanding handles as a stack and only the innermost one
/// may be restored. Reverting an outer snapshot on the ledger would silently invalidate the inner
/// ones, so that is reported as [`HarnessError::InvalidHandle`] instead.
#[derive(Debug)]
pub struct SnapshotManager<'a, L: ?Sized> {
    ledger: &'a L,
    outstanding: Vec<U256>,
}

impl<'a, L: Ledger + ?Sized> SnapshotManager<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger, outstanding: Vec::new() }
    }

    /// Records the current ledger state.
    pub async fn capture(&mut self) -> Result<SnapshotHandle> {
        let id = self.ledger.snapshot().await?;
        self.outstanding.push(id);
        debug!(target: "snapshot", %id, depth = self.outstanding.len(), "captured");
        Ok(SnapshotHandle { id, armed: true })
    }

    /// Rewinds the ledger to exactly the state recorded by `handle`.
    ///
    /// Succeeds regardless of what happened since the capture: failed transactions, forged
    /// storage, time travel.
    pub async fn restore(&mut self, handle: SnapshotHandle) -> Result<()> {
        let id = handle.disarm();
        match self.outstanding.iter().rposition(|outstanding| *outstanding == id) {
            Some(pos) if pos + 1 == self.outstanding.len() => {
                self.outstanding.pop();
            }
            Some(_) => {
                return Err(HarnessError::InvalidHandle {
                    id,
                    reason: "a more recent snapshot is still outstanding",
                });
            }
            None => {
                return Err(HarnessError::InvalidHandle {
                    id,
                    reason: "not captured by this manager",
                });
            }
        }

        if !self.ledger.revert(id).await? {
            return Err(HarnessError::InvalidHandle { id, reason: "unknown to the ledger" });
        }
        debug!(target: "snapshot", %id, depth = self.outstanding.len(), "restored");
        Ok(())
    }

    /// Number of captured snapshots not yet restored.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn ledger(&self) -> &'a L {
        self.ledger
    }
}
