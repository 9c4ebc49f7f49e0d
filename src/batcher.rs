use crate::channel::Sender;
use crate::operator::Emit;
use crate::record::{PageId, RoundValue};

/// A batch of emissions shipped from a map worker to a reduce worker.
pub(crate) type Batch = Vec<(PageId, RoundValue)>;

/// Index of the reduce worker that owns `key`, out of `partitions`.
///
/// Every map worker computes the same index for the same key, so all the values of a key end up
/// in the same reduce worker.
#[inline]
pub(crate) fn partition_of(key: &str, partitions: usize) -> usize {
    (fxhash::hash64(key) % partitions as u64) as usize
}

/// Routes the emissions of a map worker to the reduce workers, buffering them in batches to
/// reduce the channel overhead.
///
/// The buffers are flushed when they reach `batch_size` or when [`Batcher::finish`] is called.
pub(crate) struct Batcher {
    /// One sender per reduce worker, indexed by partition.
    senders: Vec<Sender<Batch>>,
    /// One buffer per reduce worker.
    buffers: Vec<Batch>,
    batch_size: usize,
    /// Set when a reduce worker is gone: every later emission is dropped.
    disconnected: bool,
    sent: usize,
}

impl Batcher {
    pub(crate) fn new(senders: Vec<Sender<Batch>>, batch_size: usize) -> Self {
        let buffers = senders
            .iter()
            .map(|_| Vec::with_capacity(batch_size))
            .collect();
        Self {
            senders,
            buffers,
            batch_size,
            disconnected: false,
            sent: 0,
        }
    }

    /// Flush the buffer of a partition if it's not empty.
    fn flush(&mut self, partition: usize) {
        if self.buffers[partition].is_empty() || self.disconnected {
            return;
        }
        let batch = std::mem::replace(
            &mut self.buffers[partition],
            Vec::with_capacity(self.batch_size),
        );
        self.sent += batch.len();
        if self.senders[partition].send(batch).is_err() {
            self.disconnected = true;
        }
    }

    /// Flush every buffer and close the channels of this worker.
    ///
    /// Returns the number of emissions delivered, or `None` if some reduce worker went away.
    pub(crate) fn finish(mut self) -> Option<usize> {
        for partition in 0..self.buffers.len() {
            self.flush(partition);
        }
        (!self.disconnected).then_some(self.sent)
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl Emit for Batcher {
    fn emit(&mut self, key: PageId, value: RoundValue) {
        let partition = partition_of(&key, self.senders.len());
        self.buffers[partition].push((key, value));
        if self.buffers[partition].len() >= self.batch_size {
            self.flush(partition);
        }
    }
}
