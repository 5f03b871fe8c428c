//! Monotonic as-of timestamps
//!
//! Every timestamped entity (system `date`, body/station `updateTime`,
//! market, shipyard, outfitting, signals, per-name body timestamps) runs
//! on its own clock. The store calls [`check`] right before staging an
//! entity; a regression aborts the whole document.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::error::{Error, Result};

/// What to do with an incoming entity after comparing clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing stored yet, or the incoming data is newer
    Apply,
    /// Same timestamp as stored: leave the stored row alone
    Skip,
}

/// Compare an incoming as-of timestamp against the stored one.
///
/// Older data is a [`Error::Monotonicity`] failure naming the entity and
/// both timestamps. Equal timestamps are a no-op, not an error.
pub fn check(
    entity: &'static str,
    key: &str,
    stored: Option<DateTime<Utc>>,
    incoming: DateTime<Utc>,
) -> Result<Verdict> {
    match stored {
        None => Ok(Verdict::Apply),
        Some(stored) if incoming > stored => Ok(Verdict::Apply),
        Some(stored) if incoming == stored => {
            trace!(entity, key, %stored, "timestamp unchanged, skipping");
            Ok(Verdict::Skip)
        }
        Some(stored) => Err(Error::Monotonicity {
            entity,
            key: key.to_string(),
            stored,
            incoming,
        }),
    }
}
