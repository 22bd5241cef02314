// src/fetch/batch.rs
//! Cut an oversized backlog down to what the volume window allows, without
//! splitting a group of filings that share a filing date.
//!
//! The range tracker records coverage by date, so a batch that stopped in the
//! middle of a same-day group would mark the rest of that day as fetched.

use async_trait::async_trait;

use super::client::FetchClient;
use crate::filings::types::FetchDescriptor;

/// Remaining volume quota, and a way to replenish it.
#[async_trait]
pub trait VolumeBudget: Send {
    fn remaining_before_sleep(&self) -> usize;
    async fn force_sleep(&mut self);
}

#[async_trait]
impl VolumeBudget for FetchClient {
    fn remaining_before_sleep(&self) -> usize {
        FetchClient::remaining_before_sleep(self)
    }

    async fn force_sleep(&mut self) {
        FetchClient::force_sleep(self).await
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    /// A single filing date holds more filings than a full volume window.
    #[error(
        "no filing-date boundary within {quota} fetches (backlog of {backlog}) even after sleeping"
    )]
    NoBoundary { quota: usize, backlog: usize },
}

/// Largest `i` in `1..=quota` where `backlog[i - 1]` and `backlog[i]` have
/// different filing dates. Requires `backlog.len() > quota`.
fn last_boundary(backlog: &[FetchDescriptor], quota: usize) -> Option<usize> {
    (1..=quota)
        .rev()
        .find(|&i| backlog[i - 1].filing_date != backlog[i].filing_date)
}

/// Select the prefix of `backlog` (newest first) to fetch in this run.
///
/// Sleeps through one full volume window if the current quota holds no
/// boundary; fails if even a full window is too small.
pub async fn select_batch<B>(
    budget: &mut B,
    mut backlog: Vec<FetchDescriptor>,
) -> Result<Vec<FetchDescriptor>, BatchError>
where
    B: VolumeBudget + ?Sized,
{
    let mut slept = false;
    loop {
        let quota = budget.remaining_before_sleep();
        if backlog.len() <= quota {
            return Ok(backlog);
        }

        if let Some(cut) = last_boundary(&backlog, quota) {
            tracing::info!(
                backlog = backlog.len(),
                quota,
                cut,
                newest = %backlog[0].filing_date,
                oldest = %backlog[cut - 1].filing_date,
                "trimmed backlog to a filing-date boundary"
            );
            backlog.truncate(cut);
            return Ok(backlog);
        }

        if slept {
            return Err(BatchError::NoBoundary {
                quota,
                backlog: backlog.len(),
            });
        }

        tracing::info!(
            backlog = backlog.len(),
            quota,
            "no filing-date boundary within quota, sleeping until the window resets"
        );
        budget.force_sleep().await;
        slept = true;
    }
}
