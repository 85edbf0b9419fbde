//! Synchronous instrument handles and the builders that create them.
use core::fmt;
use std::{borrow::Cow, marker, sync::Arc};

use crate::{
    common::KeyValue,
    error::{MetricError, MetricResult},
};

use super::{instrument::ResolvedMeasure, meter::Meter};

macro_rules! instrument_handle {
    ($(#[$doc:meta])* $name:ident, $method:ident, $method_doc:literal) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name<T>(Arc<ResolvedMeasure<T>>);

        impl<T> $name<T> {
            pub(crate) fn new(measure: ResolvedMeasure<T>) -> Self {
                $name(Arc::new(measure))
            }
        }

        impl<T: Copy + 'static> $name<T> {
            #[doc = $method_doc]
            ///
            /// Returns [MetricError::AlreadyShutdown] once the provider that
            /// created the instrument has been shut down.
            pub fn $method(&self, value: T, attributes: &[KeyValue]) -> MetricResult<()> {
                self.0.call(value, attributes)
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_fmt(format_args!(
                    "{}<{}>",
                    stringify!($name),
                    std::any::type_name::<T>()
                ))
            }
        }
    };
}

instrument_handle!(
    /// An instrument that records increasing values.
    Counter,
    add,
    "Records an increment to the counter."
);

instrument_handle!(
    /// An instrument that records increasing or decreasing values.
    UpDownCounter,
    add,
    "Records an increment or decrement to the counter."
);

instrument_handle!(
    /// An instrument that records independent values, the last one wins.
    Gauge,
    record,
    "Records the current value."
);

instrument_handle!(
    /// An instrument that records a distribution of values into buckets.
    Histogram,
    record,
    "Adds an additional value to the distribution."
);

/// Configuration for building a counter, up-down counter or gauge.
pub struct InstrumentBuilder<'a, T> {
    pub(crate) meter: &'a Meter,
    pub(crate) name: Cow<'static, str>,
    pub(crate) description: Option<Cow<'static, str>>,
    pub(crate) unit: Option<Cow<'static, str>>,
    _marker: marker::PhantomData<T>,
}

impl<'a, T> InstrumentBuilder<'a, T>
where
    T: TryFrom<Self, Error = MetricError>,
{
    pub(crate) fn new(meter: &'a Meter, name: Cow<'static, str>) -> Self {
        InstrumentBuilder {
            meter,
            name,
            description: None,
            unit: None,
            _marker: marker::PhantomData,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    ///
    /// Unit is case sensitive (`kb` is not the same as `kB`). It must be ASCII
    /// and no longer than 63 characters.
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Validates the configuration, resolves the instrument against the
    /// views of the provider and returns its handle.
    pub fn build(self) -> MetricResult<T> {
        T::try_from(self)
    }
}

impl<T> fmt::Debug for InstrumentBuilder<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("kind", &std::any::type_name::<T>())
            .finish()
    }
}

/// Configuration for building a [Histogram].
pub struct HistogramBuilder<'a, T> {
    pub(crate) meter: &'a Meter,
    pub(crate) name: Cow<'static, str>,
    pub(crate) description: Option<Cow<'static, str>>,
    pub(crate) unit: Option<Cow<'static, str>>,
    pub(crate) boundaries: Option<Vec<f64>>,
    _marker: marker::PhantomData<T>,
}

impl<'a, T> HistogramBuilder<'a, T>
where
    Histogram<T>: TryFrom<Self, Error = MetricError>,
{
    pub(crate) fn new(meter: &'a Meter, name: Cow<'static, str>) -> Self {
        HistogramBuilder {
            meter,
            name,
            description: None,
            unit: None,
            boundaries: None,
            _marker: marker::PhantomData,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    ///
    /// Unit is case sensitive (`kb` is not the same as `kB`). It must be ASCII
    /// and no longer than 63 characters.
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Advisory bucket boundaries.
    ///
    /// Used when no view overrides the aggregation of this histogram. They
    /// must be finite, strictly increasing and non-empty, otherwise `build`
    /// fails.
    pub fn with_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.boundaries = Some(boundaries);
        self
    }

    /// Validates the configuration, resolves the histogram against the views
    /// of the provider and returns its handle.
    pub fn build(self) -> MetricResult<Histogram<T>> {
        Histogram::try_from(self)
    }
}

impl<T> fmt::Debug for HistogramBuilder<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("boundaries", &self.boundaries)
            .field("number", &std::any::type_name::<T>())
            .finish()
    }
}
