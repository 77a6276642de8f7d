use crate::{HarnessError, Result};
use ante_ledger::{BlockInfo, Ledger, LedgerError};

/// Deterministic control over block timestamps and height.
///
/// Time only moves forward. An advance is a pending offset that is applied when the next block is
/// mined; the timestamp of that block is `parent + offset`.
#[derive(Debug)]
pub struct TimeController<'a, L: ?Sized> {
    ledger: &'a L,
}

impl<'a, L: Ledger + ?Sized> TimeController<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    /// Adds `seconds` to the timestamp of the next mined block. Does not mine.
    ///
    /// Negative values are rejected with [`HarnessError::TimeTravelRejected`].
    pub async fn advance(&self, seconds: i64) -> Result<()> {
        let Ok(seconds) = u64::try_from(seconds) else {
            return Err(HarnessError::TimeTravelRejected(format!(
                "cannot move time backwards by {} seconds",
                seconds.unsigned_abs()
            )));
        };
        self.ledger.increase_time(seconds).await.map_err(time_travel)?;
        debug!(target: "time", seconds, "advanced clock");
        Ok(())
    }

    /// Pins the timestamp of the next mined block, which must be later than the latest one.
    pub async fn warp(&self, timestamp: u64) -> Result<()> {
        self.ledger.set_next_block_timestamp(timestamp).await.map_err(time_travel)?;
        debug!(target: "time", timestamp, "warped clock");
        Ok(())
    }

    /// Produces `blocks` new blocks and returns the new head.
    ///
    /// The first block consumes any pending advance.
    pub async fn mine(&self, blocks: u64) -> Result<BlockInfo> {
        if blocks > 0 {
            self.ledger.mine(blocks).await?;
        }
        let head = self.ledger.block().await?;
        debug!(target: "time", blocks, number = head.number, timestamp = head.timestamp, "mined");
        Ok(head)
    }

    /// Returns the latest block.
    pub async fn now(&self) -> Result<BlockInfo> {
        Ok(self.ledger.block().await?)
    }
}

/// A node that refuses a clock change is a time travel failure rather than a generic one.
fn time_travel(err: LedgerError) -> HarnessError {
    match err {
        LedgerError::Rejected { .. } => HarnessError::TimeTravelRejected(err.to_string()),
        err => err.into(),
    }
}
