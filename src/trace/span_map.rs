//! The table of in-flight span records.

use crate::trace::context::TraceContext;
use crate::trace::endpoint::Endpoint;
use crate::trace::id::{SpanId, TraceId};
use crate::trace::record::SpanRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Maps a trace position to its in-progress span record.
///
/// Entries are keyed by the value equality of `(trace id, span id)`, so
/// logically equal contexts, including ones rebuilt from headers, address
/// the same record. At most one live record exists per identity: repeated
/// `get_or_create` calls hand out the same record until it is removed.
#[derive(Debug, Default)]
pub(crate) struct SpanMap {
    spans: Mutex<HashMap<(TraceId, SpanId), Arc<Mutex<SpanRecord>>>>,
}

/// A poisoned record only means another holder panicked mid-mutation;
/// span state stays usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SpanMap {
    pub(crate) fn get(&self, context: &TraceContext) -> Option<Arc<Mutex<SpanRecord>>> {
        lock(&self.spans)
            .get(&(context.trace_id(), context.span_id()))
            .cloned()
    }

    pub(crate) fn get_or_create(
        &self,
        context: &TraceContext,
        local_endpoint: &Endpoint,
    ) -> Arc<Mutex<SpanRecord>> {
        lock(&self.spans)
            .entry((context.trace_id(), context.span_id()))
            .or_insert_with(|| {
                Arc::new(Mutex::new(SpanRecord::new(
                    context.clone(),
                    local_endpoint.clone(),
                )))
            })
            .clone()
    }

    pub(crate) fn remove(&self, context: &TraceContext) -> Option<Arc<Mutex<SpanRecord>>> {
        lock(&self.spans).remove(&(context.trace_id(), context.span_id()))
    }

    /// Drains the entire table, leaving it empty.
    pub(crate) fn remove_all(&self) -> Vec<Arc<Mutex<SpanRecord>>> {
        lock(&self.spans).drain().map(|(_, record)| record).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.spans).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::sampling::SamplingFlags;

    fn context() -> TraceContext {
        TraceContext::builder().sampling_flags(SamplingFlags::SAMPLED).build(
            TraceId::from_hex("bd7a977555f6b982").unwrap(),
            SpanId::from_hex("be2d01e33cc78d97").unwrap(),
        )
    }

    #[test]
    fn one_record_per_identity() {
        let map = SpanMap::default();
        let endpoint = Endpoint::default();

        // structurally equal contexts, distinct values
        let first = map.get_or_create(&context(), &endpoint);
        let second = map.get_or_create(&context(), &endpoint);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_then_create_makes_a_fresh_record() {
        let map = SpanMap::default();
        let endpoint = Endpoint::default();

        let first = map.get_or_create(&context(), &endpoint);
        assert!(map.remove(&context()).is_some());
        assert!(map.get(&context()).is_none());

        let second = map.get_or_create(&context(), &endpoint);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn remove_all_drains_the_table() {
        let map = SpanMap::default();
        let endpoint = Endpoint::default();
        map.get_or_create(&context(), &endpoint);
        map.get_or_create(&context().child(), &endpoint);

        assert_eq!(map.remove_all().len(), 2);
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn removing_an_unknown_context_is_a_no_op() {
        let map = SpanMap::default();
        assert!(map.remove(&context()).is_none());
    }
}
