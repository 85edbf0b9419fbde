use std::{
    collections::HashMap,
    mem,
    sync::{Arc, Mutex, OnceLock, RwLock},
};

use crate::common::KeyValue;

/// Default maximum number of attribute sets a stream tracks.
pub(crate) const STREAM_CARDINALITY_LIMIT: usize = 2000;

/// Attribute set that measurements are folded into once a stream reached its
/// cardinality limit.
pub(crate) fn overflow_attributes() -> &'static [KeyValue] {
    static OVERFLOW: OnceLock<Vec<KeyValue>> = OnceLock::new();
    OVERFLOW.get_or_init(|| vec![KeyValue::new("otel.metric.overflow", true)])
}

/// Per attribute set state of an aggregation.
pub(crate) trait Aggregator: Clone + Send + Sync + 'static {
    /// A static configuration that is needed to create and update trackers,
    /// e.g. the number of buckets of a histogram.
    type Config: Send + Sync + 'static;

    /// The measurement after whatever work could be done outside any lock.
    type PreComputedValue;

    /// Called every time a new attribute set is stored.
    fn create(config: &Self::Config) -> Self;

    /// Called for each measurement.
    fn update(&mut self, config: &Self::Config, value: Self::PreComputedValue);
}

/// Hashing and sorting is expensive, so there are two maps. `all` is keyed by
/// the attributes exactly as recorded, `sorted` by their canonical form and is
/// what collection reads. Both point at the same trackers.
struct Trackers<A> {
    all: HashMap<Vec<KeyValue>, Arc<Mutex<A>>>,
    sorted: HashMap<Vec<KeyValue>, Arc<Mutex<A>>>,
}

impl<A> Default for Trackers<A> {
    fn default() -> Self {
        Trackers {
            all: HashMap::new(),
            sorted: HashMap::new(),
        }
    }
}

/// Routes each measurement to the tracker of its attribute set and collects
/// all trackers, either read only or resetting them.
///
/// Records for an attribute set that was seen before only take the read lock,
/// so unrelated attribute sets never contend. A new attribute set takes the
/// write lock once.
pub(crate) struct ValueMap<A: Aggregator> {
    /// Tracker for measurements with no attributes attached.
    no_attribs: Mutex<Option<A>>,
    trackers: RwLock<Trackers<A>>,
    /// Configuration required to create and update the [`Aggregator`]
    config: A::Config,
    cardinality_limit: usize,
}

impl<A: Aggregator> ValueMap<A> {
    pub(crate) fn new(config: A::Config, cardinality_limit: usize) -> Self {
        ValueMap {
            no_attribs: Mutex::new(None),
            trackers: RwLock::new(Trackers::default()),
            config,
            cardinality_limit,
        }
    }

    pub(crate) fn measure(&self, value: A::PreComputedValue, attrs: &[KeyValue]) {
        if attrs.is_empty() {
            let mut tracker = self.no_attribs.lock().unwrap_or_else(|e| e.into_inner());
            tracker
                .get_or_insert_with(|| A::create(&self.config))
                .update(&self.config, value);
            return;
        }

        {
            let trackers = self.trackers.read().unwrap_or_else(|e| e.into_inner());
            if let Some(tracker) = trackers.all.get(attrs) {
                update(tracker, &self.config, value);
                return;
            }
        }

        let sorted_attrs = sort_and_dedup(attrs);
        let mut trackers = self.trackers.write().unwrap_or_else(|e| e.into_inner());

        // Recheck again in case another thread already inserted
        if let Some(tracker) = trackers.all.get(attrs) {
            update(tracker, &self.config, value);
        } else if let Some(tracker) = trackers.sorted.get(&sorted_attrs).cloned() {
            // Same set recorded with a different order or with duplicate keys.
            update(&tracker, &self.config, value);
            trackers.all.insert(attrs.to_vec(), tracker);
        } else if trackers.sorted.len() + 1 < self.cardinality_limit {
            let mut tracker = A::create(&self.config);
            tracker.update(&self.config, value);
            let tracker = Arc::new(Mutex::new(tracker));
            trackers.all.insert(attrs.to_vec(), tracker.clone());
            trackers.sorted.insert(sorted_attrs, tracker);
        } else if let Some(tracker) = trackers.sorted.get(overflow_attributes()) {
            update(tracker, &self.config, value);
        } else {
            let mut tracker = A::create(&self.config);
            tracker.update(&self.config, value);
            trackers
                .sorted
                .insert(overflow_attributes().to_vec(), Arc::new(Mutex::new(tracker)));
            otel_warn!(
                name: "ValueMap.CardinalityLimitReached",
                message = "Maximum number of attribute sets reached for the stream. Further measurements with new attribute sets are aggregated under otel.metric.overflow=true.",
                cardinality_limit = self.cardinality_limit
            );
        }
    }

    /// Map every tracker to a data point without resetting them.
    ///
    /// Data points are ordered by attribute set, the empty set first.
    pub(crate) fn collect_readonly<Res, MapFn>(&self, dest: &mut Vec<Res>, mut map_fn: MapFn)
    where
        MapFn: FnMut(Vec<KeyValue>, &A) -> Res,
    {
        let trackers = self.trackers.read().unwrap_or_else(|e| e.into_inner());
        prepare_data(dest, trackers.sorted.len());

        if let Some(tracker) = self
            .no_attribs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            dest.push(map_fn(vec![], tracker));
        }

        let mut entries: Vec<_> = trackers.sorted.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (attrs, tracker) in entries {
            let tracker = tracker.lock().unwrap_or_else(|e| e.into_inner());
            dest.push(map_fn(attrs.clone(), &tracker));
        }
    }

    /// Map every tracker to a data point and start over with no attribute
    /// sets.
    ///
    /// The maps are swapped out under the write lock, so every measurement is
    /// reported by exactly one collection.
    pub(crate) fn collect_and_reset<Res, MapFn>(&self, dest: &mut Vec<Res>, mut map_fn: MapFn)
    where
        MapFn: FnMut(Vec<KeyValue>, A) -> Res,
    {
        let (no_attribs, taken) = {
            let mut trackers = self.trackers.write().unwrap_or_else(|e| e.into_inner());
            let no_attribs = self
                .no_attribs
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            (no_attribs, mem::take(&mut *trackers))
        };
        prepare_data(dest, taken.sorted.len());

        if let Some(tracker) = no_attribs {
            dest.push(map_fn(vec![], tracker));
        }

        // Release the extra references so the trackers can be moved out.
        drop(taken.all);
        let mut entries: Vec<_> = taken
            .sorted
            .into_iter()
            .map(|(attrs, tracker)| {
                let tracker = match Arc::try_unwrap(tracker) {
                    Ok(tracker) => tracker.into_inner().unwrap_or_else(|e| e.into_inner()),
                    Err(shared) => shared.lock().unwrap_or_else(|e| e.into_inner()).clone(),
                };
                (attrs, tracker)
            })
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        dest.extend(
            entries
                .into_iter()
                .map(|(attrs, tracker)| map_fn(attrs, tracker)),
        );
    }
}

fn update<A: Aggregator>(tracker: &Mutex<A>, config: &A::Config, value: A::PreComputedValue) {
    tracker
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .update(config, value);
}

/// Canonical form of an attribute set: sorted by key, keeping the last value
/// given for a repeated key.
pub(crate) fn sort_and_dedup(attrs: &[KeyValue]) -> Vec<KeyValue> {
    let mut vec = attrs.to_vec();
    // stable, so repeated keys keep their recording order
    vec.sort_by(|a, b| a.key.cmp(&b.key));

    let mut deduped: Vec<KeyValue> = Vec::with_capacity(vec.len());
    for kv in vec {
        match deduped.last_mut() {
            Some(last) if last.key == kv.key => *last = kv,
            _ => deduped.push(kv),
        }
    }
    deduped
}

/// Clear and allocate exactly required amount of space for all attribute-sets
fn prepare_data<T>(data: &mut Vec<T>, list_len: usize) {
    data.clear();
    let total_len = list_len + 1; // to account for no_attributes case
    if total_len > data.capacity() {
        data.reserve_exact(total_len - data.capacity());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Clone, Debug, Default)]
    struct Count(u64);

    impl Aggregator for Count {
        type Config = ();
        type PreComputedValue = u64;

        fn create(_: &()) -> Self {
            Count::default()
        }

        fn update(&mut self, _: &(), value: u64) {
            self.0 += value;
        }
    }

    fn collect(map: &ValueMap<Count>) -> Vec<(Vec<KeyValue>, u64)> {
        let mut dest = Vec::new();
        map.collect_readonly(&mut dest, |attrs, count| (attrs, count.0));
        dest
    }

    #[test]
    fn canonical_form_keeps_last_duplicate() {
        let attrs = [
            KeyValue::new("b", 1),
            KeyValue::new("a", "first"),
            KeyValue::new("c", true),
            KeyValue::new("a", "last"),
        ];
        assert_eq!(
            sort_and_dedup(&attrs),
            vec![
                KeyValue::new("a", "last"),
                KeyValue::new("b", 1),
                KeyValue::new("c", true),
            ]
        );
    }

    #[test]
    fn attribute_order_does_not_split_sets() {
        let map = ValueMap::<Count>::new((), STREAM_CARDINALITY_LIMIT);
        map.measure(1, &[KeyValue::new("A", "B"), KeyValue::new("C", "D")]);
        map.measure(1, &[KeyValue::new("C", "D"), KeyValue::new("A", "B")]);
        map.measure(
            1,
            &[
                KeyValue::new("A", "X"),
                KeyValue::new("C", "D"),
                KeyValue::new("A", "B"),
            ],
        );

        assert_eq!(
            collect(&map),
            vec![(vec![KeyValue::new("A", "B"), KeyValue::new("C", "D")], 3)]
        );
    }

    #[test]
    fn points_are_ordered_with_empty_set_first() {
        let map = ValueMap::<Count>::new((), STREAM_CARDINALITY_LIMIT);
        map.measure(1, &[KeyValue::new("k", "z")]);
        map.measure(2, &[KeyValue::new("k", "a")]);
        map.measure(3, &[]);

        let points = collect(&map);
        assert_eq!(
            points,
            vec![
                (vec![], 3),
                (vec![KeyValue::new("k", "a")], 2),
                (vec![KeyValue::new("k", "z")], 1),
            ]
        );
    }

    #[test]
    fn overflow_after_cardinality_limit() {
        let limit = 4;
        let map = ValueMap::<Count>::new((), limit);
        for i in 0..10 {
            map.measure(1, &[KeyValue::new("key", i as i64)]);
        }
        // Known sets keep aggregating after the overflow set exists.
        map.measure(1, &[KeyValue::new("key", 0_i64)]);

        let points = collect(&map);
        assert_eq!(points.len(), limit);

        let overflow = points
            .iter()
            .find(|(attrs, _)| attrs.as_slice() == overflow_attributes())
            .expect("overflow point present");
        assert_eq!(overflow.1, 7);

        let total: u64 = points.iter().map(|(_, count)| count).sum();
        assert_eq!(total, 11);
    }

    #[test]
    fn collect_and_reset_starts_over() {
        let map = ValueMap::<Count>::new((), STREAM_CARDINALITY_LIMIT);
        map.measure(5, &[KeyValue::new("k", "v")]);
        map.measure(1, &[]);

        let mut dest = Vec::new();
        map.collect_and_reset(&mut dest, |attrs, count| (attrs, count.0));
        assert_eq!(
            dest,
            vec![(vec![], 1), (vec![KeyValue::new("k", "v")], 5)]
        );
        assert!(collect(&map).is_empty());

        map.collect_and_reset(&mut dest, |attrs, count| (attrs, count.0));
        assert!(dest.is_empty());

        map.measure(2, &[KeyValue::new("k", "v")]);
        map.collect_and_reset(&mut dest, |attrs, count| (attrs, count.0));
        assert_eq!(dest, vec![(vec![KeyValue::new("k", "v")], 2)]);
    }

    #[test]
    fn overflow_resets_with_delta_collection() {
        let map = ValueMap::<Count>::new((), 2);
        map.measure(1, &[KeyValue::new("key", 1_i64)]);
        map.measure(1, &[KeyValue::new("key", 2_i64)]);

        let mut dest = Vec::new();
        map.collect_and_reset(&mut dest, |attrs, count| (attrs, count.0));
        assert_eq!(dest.len(), 2);

        map.measure(1, &[KeyValue::new("key", 2_i64)]);
        map.collect_and_reset(&mut dest, |attrs, count| (attrs, count.0));
        assert_eq!(dest, vec![(vec![KeyValue::new("key", 2_i64)], 1)]);
    }

    #[test]
    fn concurrent_measurements_are_not_lost() {
        let map = Arc::new(ValueMap::<Count>::new((), STREAM_CARDINALITY_LIMIT));
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        map.measure(1, &[KeyValue::new("shared", "yes")]);
                        map.measure(1, &[KeyValue::new("thread", t as i64)]);
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let points = collect(&map);
        assert_eq!(points.len(), 9);
        let shared = points
            .iter()
            .find(|(attrs, _)| attrs == &vec![KeyValue::new("shared", "yes")])
            .unwrap();
        assert_eq!(shared.1, 8000);
        assert!(points
            .iter()
            .filter(|(attrs, _)| attrs[0].key.as_str() == "thread")
            .all(|(_, count)| *count == 1000));
    }
}
