//! Sequence numbering and the pending-job table.

use std::collections::BTreeMap;

use derive_more::{Display, From, Into};
use tokio::task::JoinHandle;

/// Global detection-order number of a submitted message.
///
/// # Examples
///
/// ```
/// use chatlens::pipeline::Sequence;
///
/// let first = Sequence::default();
/// assert_eq!(first.get(), 0);
/// assert_eq!(first.next().get(), 1);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[display("#{_0}")]
pub struct Sequence(u64);

impl Sequence {
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    #[must_use]
    pub const fn get(self) -> u64 { self.0 }

    /// The sequence number following this one.
    #[must_use]
    pub const fn next(self) -> Self { Self(self.0 + 1) }
}

/// A submitted message awaiting display.
#[derive(Debug)]
pub struct TranslationJob {
    pub sequence: Sequence,
    pub sender_name: String,
    /// Resolves to the translated (or passed-through) text.
    pub result: JoinHandle<String>,
}

/// Jobs keyed by sequence, plus the counter assigning new numbers.
///
/// Always accessed under the pipeline's single mutex, so assignment and
/// insertion happen atomically with respect to the drain.
#[derive(Debug, Default)]
pub(super) struct PendingJobs {
    next: Sequence,
    jobs: BTreeMap<Sequence, TranslationJob>,
    closed: bool,
}

impl PendingJobs {
    pub(super) fn is_closed(&self) -> bool { self.closed }

    pub(super) fn close(&mut self) { self.closed = true; }

    /// Reserve the next sequence number.
    pub(super) fn assign(&mut self) -> Sequence {
        let sequence = self.next;
        self.next = sequence.next();
        sequence
    }

    /// Number of sequence numbers handed out so far.
    pub(super) fn assigned(&self) -> u64 { self.next.get() }

    pub(super) fn insert(&mut self, job: TranslationJob) {
        debug_assert!(
            !self.jobs.contains_key(&job.sequence),
            "sequence numbers are assigned once"
        );
        self.jobs.insert(job.sequence, job);
    }

    pub(super) fn take(&mut self, sequence: Sequence) -> Option<TranslationJob> {
        self.jobs.remove(&sequence)
    }

    pub(super) fn len(&self) -> usize { self.jobs.len() }

    pub(super) fn is_empty(&self) -> bool { self.jobs.is_empty() }
}
