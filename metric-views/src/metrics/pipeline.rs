use core::fmt;
use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::{
    common::{InstrumentationScope, Key, KeyValue},
    error::{MetricError, MetricResult},
    metrics::{
        aggregation::{Aggregation, DEFAULT_HISTOGRAM_BOUNDARIES},
        data::{CollectedMetrics, Metric, ScopeMetrics},
        instrument::{Instrument, InstrumentId, InstrumentKind, Stream},
        internal::{self, AggregateBuilder, AggregateFns, Number, STREAM_CARDINALITY_LIMIT},
        reader::MetricReader,
        view::{self, View},
    },
};

/// Connects all of the instruments created by a meter provider to its
/// [MetricReader].
///
/// As instruments are created they are resolved against the views and the
/// aggregate function of the resolved stream is added to the pipeline, so the
/// reader collects it.
#[doc(hidden)]
pub struct Pipeline {
    reader: Box<dyn MetricReader>,
    views: Arc<[Arc<dyn View>]>,
    inner: Mutex<PipelineInner>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pipeline")
    }
}

/// Aggregations per scope, in the order the scopes created their first
/// stream.
#[derive(Default)]
struct PipelineInner {
    aggregations: Vec<(InstrumentationScope, Vec<InstrumentSync>)>,
}

impl fmt::Debug for PipelineInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineInner")
            .field("aggregations", &self.aggregations)
            .finish()
    }
}

impl Pipeline {
    pub(crate) fn new(reader: Box<dyn MetricReader>, views: Arc<[Arc<dyn View>]>) -> Arc<Self> {
        let pipeline = Arc::new(Pipeline {
            reader,
            views,
            inner: Default::default(),
        });
        pipeline.reader.register_pipeline(Arc::downgrade(&pipeline));
        pipeline
    }

    /// Adds the [InstrumentSync] to pipeline with scope.
    ///
    /// This method is not idempotent. Duplicate calls will result in duplicate
    /// additions, it is the callers responsibility to ensure this is called with
    /// unique values.
    fn add_sync(&self, scope: &InstrumentationScope, i_sync: InstrumentSync) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        otel_debug!(
            name: "InstrumentCreated",
            instrument_name = i_sync.name.as_ref()
        );
        match inner.aggregations.iter_mut().find(|(s, _)| s == scope) {
            Some((_, instruments)) => instruments.push(i_sync),
            None => inner.aggregations.push((scope.clone(), vec![i_sync])),
        }
    }

    /// Collects every stream of the pipeline into `collected`, replacing its
    /// previous content.
    ///
    /// Streams without data points and scopes without streams are left out.
    pub(crate) fn produce(&self, collected: &mut CollectedMetrics) -> MetricResult<()> {
        let inner = self.inner.lock()?;
        collected.scope_metrics.clear();
        collected.scope_metrics.reserve(inner.aggregations.len());

        for (scope, instruments) in &inner.aggregations {
            let metrics: Vec<Metric> = instruments
                .iter()
                .filter_map(|inst| {
                    let (len, data) = inst.comp_agg.call();
                    (len > 0).then(|| Metric {
                        name: inst.name.clone(),
                        description: inst.description.clone(),
                        unit: inst.unit.clone(),
                        data,
                    })
                })
                .collect();

            if !metrics.is_empty() {
                collected.scope_metrics.push(ScopeMetrics {
                    scope: scope.clone(),
                    metrics,
                });
            }
        }

        Ok(())
    }

    /// Send accumulated telemetry
    pub(crate) fn force_flush(&self) -> MetricResult<()> {
        self.reader.force_flush()
    }

    /// Shut down pipeline
    pub(crate) fn shutdown(&self) -> MetricResult<()> {
        self.reader.shutdown()
    }
}

/// A synchronization point between a [Pipeline] and an instrument's aggregate function.
struct InstrumentSync {
    name: Cow<'static, str>,
    description: Cow<'static, str>,
    unit: Cow<'static, str>,
    comp_agg: Arc<dyn internal::ComputeAggregation>,
}

impl fmt::Debug for InstrumentSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentSync")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .finish()
    }
}

/// A view override merged with the instrument it was resolved for.
struct ResolvedStream {
    name: Cow<'static, str>,
    description: Cow<'static, str>,
    unit: Cow<'static, str>,
    aggregation: Aggregation,
    allowed_attribute_keys: Option<Arc<HashSet<Key>>>,
    cardinality_limit: usize,
}

impl ResolvedStream {
    /// Unset fields of the override fall back to the instrument. Histograms
    /// without an aggregation override use the advisory boundaries of the
    /// instrument if it has any.
    fn new(inst: &Instrument, stream: Stream, boundaries: Option<&[f64]>) -> Self {
        let aggregation = match stream.aggregation {
            None | Some(Aggregation::Default) => default_aggregation_selector(inst.kind, boundaries),
            Some(aggregation) => aggregation,
        };

        ResolvedStream {
            name: stream.name.unwrap_or_else(|| inst.name.clone()),
            description: stream
                .description
                .unwrap_or_else(|| inst.description.clone()),
            unit: stream.unit.unwrap_or_else(|| inst.unit.clone()),
            aggregation,
            allowed_attribute_keys: stream.allowed_attribute_keys,
            cardinality_limit: stream.cardinality_limit.unwrap_or(STREAM_CARDINALITY_LIMIT),
        }
    }
}

type Measures<T> = Option<Arc<dyn internal::Measure<T>>>;

/// Instrument identifiers a meter has created streams for, keyed by the
/// lowercased stream name.
pub(crate) type ViewCache = Arc<Mutex<HashMap<Cow<'static, str>, InstrumentId>>>;

/// Facilitates inserting of new instruments from a single scope into a pipeline.
struct Inserter<T> {
    /// The stream every instrument descriptor resolved to.
    ///
    /// The lock is held while views are evaluated, so each descriptor is
    /// resolved exactly once no matter how many threads create it.
    streams: Mutex<HashMap<Instrument, Measures<T>>>,

    /// A cache that holds aggregate function inputs whose outputs have been
    /// inserted into the pipeline.
    ///
    /// Instruments resolving to the same stream identity, for example because
    /// a view renamed them to the same name, share one aggregate function.
    aggregators: Mutex<HashMap<InstrumentId, Measures<T>>>,

    /// A cache that holds instrument identifiers for all the streams a meter
    /// has created.
    ///
    /// It is provided from the meter that owns this inserter. This cache
    /// ensures that during the creation of streams with the same name but
    /// different options (e.g. description, unit) a message is logged.
    views: ViewCache,

    pipeline: Arc<Pipeline>,
}

impl<T> Inserter<T>
where
    T: Number,
{
    fn new(pipeline: Arc<Pipeline>, views: ViewCache) -> Self {
        Inserter {
            streams: Default::default(),
            aggregators: Default::default(),
            views,
            pipeline,
        }
    }

    /// Resolves the provided instrument and inserts the aggregate function of
    /// its stream into the pipeline.
    ///
    /// The first view matching the instrument decides the stream. Without a
    /// matching view the instrument keeps its own name and the default
    /// aggregation of its kind.
    ///
    /// Returns `None` when the stream drops its measurements. Errors are not
    /// cached, a later call with the same instrument resolves it again.
    fn instrument(
        &self,
        inst: Instrument,
        boundaries: Option<&[f64]>,
    ) -> MetricResult<Measures<T>> {
        let mut streams = self.streams.lock()?;
        if let Some(measure) = streams.get(&inst) {
            return Ok(measure.clone());
        }

        let stream = view::resolve(&self.pipeline.views, &inst).unwrap_or_default();
        let resolved = ResolvedStream::new(&inst, stream, boundaries);
        let measure = self.cached_aggregator(&inst.scope, inst.kind, resolved)?;

        if measure.is_none() {
            otel_debug!(
                name: "Instrument.MeasurementsDropped",
                instrument_name = inst.name.as_ref(),
                message = "Measurements from this instrument are dropped due to view configuration."
            );
        }
        streams.insert(inst, measure.clone());
        Ok(measure)
    }

    /// Returns the appropriate aggregate functions for a resolved stream.
    ///
    /// If the exact stream has been created within the scope, that aggregate
    /// function instance will be returned. Otherwise, a new aggregate function
    /// will be cached and returned.
    ///
    /// If the stream conflicts with a stream that has already been created
    /// (e.g. description, unit, data type) a message is logged and a valid new
    /// aggregate function is still returned.
    ///
    /// If the stream defines an aggregation incompatible with the instrument
    /// kind, an error is returned.
    fn cached_aggregator(
        &self,
        scope: &InstrumentationScope,
        kind: InstrumentKind,
        stream: ResolvedStream,
    ) -> MetricResult<Measures<T>> {
        is_aggregator_compatible(&kind, &stream.aggregation)?;

        let mut id = self.inst_id(kind, &stream);
        // A conflicting stream is still created, the conflict is only logged.
        self.log_conflict(&id);

        // If there are requests for the same stream with different name
        // casing, the first-seen needs to be returned. Use a normalized ID for
        // the cache lookup to ensure the correct comparison.
        id.normalize();

        let mut cache = self.aggregators.lock()?;
        if let Some(cached) = cache.get(&id) {
            return Ok(cached.clone());
        }

        let filter = stream.allowed_attribute_keys.clone().map(|allowed| {
            Arc::new(move |kv: &KeyValue| allowed.contains(&kv.key)) as internal::Filter
        });
        let b = AggregateBuilder::new(
            self.pipeline.reader.temporality(kind),
            filter,
            stream.cardinality_limit,
        );

        let measure = match aggregate_fn(b, &stream.aggregation, kind) {
            Some(AggregateFns { measure, collect }) => {
                self.pipeline.add_sync(
                    scope,
                    InstrumentSync {
                        name: stream.name,
                        description: stream.description,
                        unit: stream.unit,
                        comp_agg: collect,
                    },
                );
                Some(measure)
            }
            None => None,
        };

        cache.insert(id, measure.clone());
        Ok(measure)
    }

    /// Validates if a stream with the same name as id has already been created.
    ///
    /// If that stream conflicts with id, a message is logged.
    fn log_conflict(&self, id: &InstrumentId) {
        let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
        let name = Cow::Owned(id.name.to_lowercase());
        match views.get(&name) {
            Some(existing) if existing == id => {}
            Some(existing) => {
                // Same name but different description, kind, unit or number.
                otel_debug!(
                    name: "Instrument.DuplicateMetricStreamDefinitions",
                    message = "duplicate metric stream definitions",
                    reason = format!("names: ({} and {}), descriptions: ({} and {}), kinds: ({:?} and {:?}), units: ({:?} and {:?}), and numbers: ({} and {})",
                    existing.name, id.name,
                    existing.description, id.description,
                    existing.kind, id.kind,
                    existing.unit, id.unit,
                    existing.number, id.number,)
                );
            }
            None => {
                views.insert(name, id.clone());
            }
        }
    }

    fn inst_id(&self, kind: InstrumentKind, stream: &ResolvedStream) -> InstrumentId {
        InstrumentId {
            name: stream.name.clone(),
            description: stream.description.clone(),
            kind,
            unit: stream.unit.clone(),
            number: Cow::Borrowed(std::any::type_name::<T>()),
        }
    }
}

/// The default aggregation and parameters for an instrument of [InstrumentKind].
///
/// * Counter ⇨ Sum
/// * UpDownCounter ⇨ Sum
/// * Gauge ⇨ LastValue
/// * Histogram ⇨ ExplicitBucketHistogram, with the advisory boundaries of the
///   instrument when given
pub(crate) fn default_aggregation_selector(
    kind: InstrumentKind,
    boundaries: Option<&[f64]>,
) -> Aggregation {
    match kind {
        InstrumentKind::Counter | InstrumentKind::UpDownCounter => Aggregation::Sum,
        InstrumentKind::Gauge => Aggregation::LastValue,
        InstrumentKind::Histogram => Aggregation::ExplicitBucketHistogram {
            boundaries: boundaries
                .map(<[f64]>::to_vec)
                .unwrap_or_else(|| DEFAULT_HISTOGRAM_BOUNDARIES.to_vec()),
            record_min_max: true,
        },
    }
}

/// Returns new aggregate functions for the given params, `None` for
/// [Aggregation::Drop].
fn aggregate_fn<T: Number>(
    b: AggregateBuilder<T>,
    agg: &Aggregation,
    kind: InstrumentKind,
) -> Option<AggregateFns<T>> {
    match agg {
        Aggregation::Default => aggregate_fn(b, &default_aggregation_selector(kind, None), kind),
        Aggregation::Drop => None,
        Aggregation::LastValue => Some(b.last_value()),
        Aggregation::Sum => {
            let monotonic = matches!(kind, InstrumentKind::Counter | InstrumentKind::Histogram);
            Some(b.sum(monotonic))
        }
        Aggregation::ExplicitBucketHistogram {
            boundaries,
            record_min_max,
        } => {
            // Kinds that may record negative values report no sum.
            let record_sum = !matches!(kind, InstrumentKind::UpDownCounter | InstrumentKind::Gauge);
            Some(b.explicit_bucket_histogram(boundaries.to_vec(), *record_min_max, record_sum))
        }
    }
}

/// Checks if the aggregation can be used by the instrument.
///
/// Current compatibility:
///
/// | Instrument Kind | Drop | LastValue | Sum | Histogram |
/// |-----------------|------|-----------|-----|-----------|
/// | Counter         | ✓    |           | ✓   | ✓         |
/// | UpDownCounter   | ✓    |           | ✓   | ✓         |
/// | Histogram       | ✓    |           | ✓   | ✓         |
/// | Gauge           | ✓    | ✓         |     | ✓         |
fn is_aggregator_compatible(kind: &InstrumentKind, agg: &Aggregation) -> MetricResult<()> {
    let compatible = match agg {
        Aggregation::Default | Aggregation::Drop | Aggregation::ExplicitBucketHistogram { .. } => {
            true
        }
        Aggregation::Sum => !matches!(kind, InstrumentKind::Gauge),
        Aggregation::LastValue => matches!(kind, InstrumentKind::Gauge),
    };

    if compatible {
        Ok(())
    } else {
        Err(MetricError::Config(format!(
            "{agg} aggregation is incompatible with instrument kind {kind:?}"
        )))
    }
}

/// Resolves the aggregate function an instrument records into while
/// registering it with the pipeline that collects it.
pub(crate) struct Resolver<T> {
    inserter: Option<Inserter<T>>,
}

impl<T> Resolver<T>
where
    T: Number,
{
    pub(crate) fn new(pipeline: Option<Arc<Pipeline>>, view_cache: ViewCache) -> Self {
        Resolver {
            inserter: pipeline.map(|p| Inserter::new(p, view_cache)),
        }
    }

    /// The measure that must be updated by the instrument, `None` when nothing
    /// collects it.
    pub(crate) fn measures(
        &self,
        id: Instrument,
        boundaries: Option<&[f64]>,
    ) -> MetricResult<Measures<T>> {
        match &self.inserter {
            Some(inserter) => inserter.instrument(id, boundaries),
            None => Ok(None),
        }
    }
}
