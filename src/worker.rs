use fxhash::FxHashMap;

use crate::batcher::{Batch, Batcher};
use crate::channel::Receiver;
use crate::operator::{Mapper, Reducer};
use crate::record::{PageId, RoundValue};
use crate::substrate::{CancelToken, MapStats, SubstrateError};

/// Call a function if this struct goes out of scope without calling `defuse`, including during a
/// panic stack-unwinding.
struct CatchPanic<F: FnOnce()> {
    /// True if the function should be called.
    primed: bool,
    /// Function to call.
    ///
    /// The `Drop` implementation will move out the function.
    handler: Option<F>,
}

impl<F: FnOnce()> CatchPanic<F> {
    fn new(handler: F) -> Self {
        Self {
            primed: true,
            handler: Some(handler),
        }
    }

    /// Avoid calling the function on drop.
    fn defuse(&mut self) {
        self.primed = false;
    }
}

impl<F: FnOnce()> Drop for CatchPanic<F> {
    fn drop(&mut self) {
        if self.primed {
            if let Some(handler) = self.handler.take() {
                handler();
            }
        }
    }
}

/// Run the mapper over a chunk of the round input, shipping the emissions through `batcher`.
pub(crate) fn map_worker<M: Mapper>(
    id: usize,
    lines: &[String],
    mapper: &M,
    mut batcher: Batcher,
    cancel: &CancelToken,
) -> Result<MapStats, SubstrateError> {
    let mut catch_panic = CatchPanic::new(|| {
        error!("map worker {id} crashed!");
    });

    let mut stats = MapStats::default();
    for line in lines {
        if cancel.is_cancelled() {
            catch_panic.defuse();
            return Err(SubstrateError::Cancelled);
        }
        let outcome = match mapper.map(line, &mut batcher) {
            Ok(outcome) => outcome,
            Err(e) => {
                catch_panic.defuse();
                return Err(e.into());
            }
        };
        stats.record(outcome);
        if batcher.is_disconnected() {
            break;
        }
    }
    let result = match batcher.finish() {
        Some(sent) => {
            debug!(
                "map worker {id} completed: {} lines, {sent} emissions",
                stats.records_in
            );
            Ok(stats)
        }
        None => Err(SubstrateError::Disconnected),
    };
    catch_panic.defuse();
    result
}

/// Group the emissions received by a reduce worker and reduce each key exactly once.
///
/// The worker owns every key routed to it: no other worker sees the values of these keys.
pub(crate) fn reduce_worker<R: Reducer>(
    id: usize,
    receiver: Receiver<Batch>,
    reducer: &R,
    cancel: &CancelToken,
) -> Result<Vec<R::Output>, SubstrateError> {
    let mut catch_panic = CatchPanic::new(|| {
        error!("reduce worker {id} crashed!");
    });

    let mut groups: FxHashMap<PageId, Vec<RoundValue>> = FxHashMap::default();
    for batch in receiver.iter() {
        for (key, value) in batch {
            groups.entry(key).or_default().push(value);
        }
    }
    debug!("reduce worker {id} grouped {} keys", groups.len());

    let mut output = Vec::with_capacity(groups.len());
    for (key, values) in groups {
        if cancel.is_cancelled() {
            catch_panic.defuse();
            return Err(SubstrateError::Cancelled);
        }
        output.push(reducer.reduce(key, values));
    }
    catch_panic.defuse();
    Ok(output)
}
