//! Priority queue of runnable job ids

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
	priority_score: u32,
	seq: u64,
	job_id: String,
}

impl Ord for QueueEntry {
	fn cmp(&self, other: &Self) -> Ordering {
		// Max-heap: higher priority first, then earlier enqueue
		self.priority_score
			.cmp(&other.priority_score)
			.then_with(|| other.seq.cmp(&self.seq))
	}
}

impl PartialOrd for QueueEntry {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// Priority-weighted FIFO of job ids
///
/// Entries are not removed on cancellation; the caller skips ids whose job is
/// no longer waiting when they are popped.
#[derive(Debug, Default)]
pub(crate) struct JobQueue {
	heap: BinaryHeap<QueueEntry>,
	next_seq: u64,
}

impl JobQueue {
	pub(crate) fn push(&mut self, job_id: impl Into<String>, priority_score: u32) {
		self.next_seq += 1;
		self.heap.push(QueueEntry {
			priority_score,
			seq: self.next_seq,
			job_id: job_id.into(),
		});
	}

	pub(crate) fn pop(&mut self) -> Option<String> {
		self.heap.pop().map(|entry| entry.job_id)
	}

	pub(crate) fn len(&self) -> usize {
		self.heap.len()
	}
}
