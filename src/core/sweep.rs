//! Fetching many sources in one run.
//!
//! [`sweep`] runs one fetch session per source, at most `concurrency` at a
//! time, on the calling task. A source that fails on its own (no access, API
//! error, retries exhausted) is recorded and the sweep carries on; a rejected
//! credential or a cancellation ends the whole sweep.

use std::collections::HashSet;

use futures::StreamExt;
use futures::stream;
use tracing::{info, warn};

use crate::client::Transport;
use crate::core::fetcher::{FetchReport, Fetcher};
use crate::core::filter::FetchSpec;
use crate::core::models::{RunMetadata, SourceDescriptor};
use crate::error::{ChatsweepError, Result};
use crate::message::Message;

/// How one source of a sweep ended.
#[derive(Debug)]
pub enum SourceStatus {
    Fetched(FetchReport),
    Failed(ChatsweepError),
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub source: SourceDescriptor,
    pub status: SourceStatus,
}

impl SourceOutcome {
    pub fn report(&self) -> Option<&FetchReport> {
        match &self.status {
            SourceStatus::Fetched(report) => Some(report),
            SourceStatus::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ChatsweepError> {
        match &self.status {
            SourceStatus::Fetched(_) => None,
            SourceStatus::Failed(err) => Some(err),
        }
    }
}

/// Per-source outcomes, in the order the sources were given.
#[derive(Debug)]
pub struct SweepReport {
    pub outcomes: Vec<SourceOutcome>,
    pub spec: FetchSpec,
}

impl SweepReport {
    pub fn fetched(&self) -> impl Iterator<Item = (&SourceDescriptor, &FetchReport)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.report().map(|r| (&o.source, r)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&SourceDescriptor, &ChatsweepError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error().map(|e| (&o.source, e)))
    }

    pub fn total_messages(&self) -> usize {
        self.fetched().map(|(_, r)| r.messages.len()).sum()
    }

    /// Every fetched message in one result set, as a keyword search would
    /// present it: deduplicated by id and sorted.
    pub fn merged(&self, label: &str) -> (Vec<Message>, RunMetadata) {
        let mut seen = HashSet::new();
        let mut messages: Vec<Message> = self
            .fetched()
            .flat_map(|(_, r)| r.messages.iter())
            .filter(|m| seen.insert(m.id()))
            .cloned()
            .collect();
        messages.sort_by_key(Message::sort_key);

        let metadata = RunMetadata::new(SourceDescriptor::search(label), &self.spec, messages.len());
        (messages, metadata)
    }
}

/// Fetches every source in `sources` with the same spec.
///
/// # Errors
///
/// Only session-fatal errors ([`ChatsweepError::is_fatal`]) are returned;
/// everything else is recorded as [`SourceStatus::Failed`].
pub async fn sweep<T: Transport>(
    fetcher: &Fetcher<T>,
    sources: Vec<SourceDescriptor>,
    spec: &FetchSpec,
    concurrency: usize,
) -> Result<SweepReport> {
    let total = sources.len();
    let mut pending = stream::iter(sources.into_iter().enumerate().map(move |(idx, source)| async move {
        let result = fetcher.fetch(&source, spec, None).await;
        (idx, source, result)
    }))
    .buffer_unordered(concurrency.max(1));

    let mut outcomes = Vec::with_capacity(total);
    while let Some((idx, source, result)) = pending.next().await {
        let status = match result {
            Ok(report) => {
                info!(source = %source.label(), messages = report.messages.len(), "Source fetched");
                SourceStatus::Fetched(report)
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(source = %source.label(), error = %err, "Skipping source");
                SourceStatus::Failed(err)
            }
        };
        outcomes.push((idx, SourceOutcome { source, status }));
    }

    outcomes.sort_by_key(|(idx, _)| *idx);
    Ok(SweepReport {
        outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
        spec: spec.clone(),
    })
}
