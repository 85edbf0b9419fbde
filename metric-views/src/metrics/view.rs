use std::{borrow::Cow, fmt, sync::Arc};

use regex::Regex;

use super::instrument::{Instrument, InstrumentKind, Stream};
use crate::error::{MetricError, MetricResult};

/// Used to customize the metrics that are output by the provider.
///
/// Here are some examples when a [View] might be needed:
///
/// * Rename an instrument, for example to shorten a verbose library name.
/// * Customize the aggregation, for example to replace the default histogram
///   buckets with boundaries that suit the recorded values.
/// * Customize which attributes are reported on metrics. An HTTP server
///   library might record the verb and the status code while the application
///   only cares about the status code.
///
/// Views are evaluated in registration order and the first one returning a
/// [Stream] decides the stream of the instrument. An instrument no view
/// matches keeps its own name and the default aggregation of its kind.
///
/// # Example Custom View
///
/// View is implemented for all `Fn(&Instrument) -> Option<Stream>`.
///
/// ```
/// use metric_views::metrics::{Instrument, SdkMeterProvider, Stream};
///
/// // return streams for the given instrument
/// let my_view = |i: &Instrument| {
///   // return Some(Stream) or
///   None
/// };
///
/// let provider = SdkMeterProvider::builder().with_view(my_view).build();
/// # drop(provider)
/// ```
pub trait View: Send + Sync + 'static {
    /// Defines how data should be collected for certain instruments.
    ///
    /// Return [Stream] to use for matching [Instrument]s,
    /// otherwise if there is no match, return `None`.
    fn match_inst(&self, inst: &Instrument) -> Option<Stream>;
}

impl<T> View for T
where
    T: Fn(&Instrument) -> Option<Stream> + Send + Sync + 'static,
{
    fn match_inst(&self, inst: &Instrument) -> Option<Stream> {
        self(inst)
    }
}

impl View for Box<dyn View> {
    fn match_inst(&self, inst: &Instrument) -> Option<Stream> {
        (**self).match_inst(inst)
    }
}

/// Returns the override of the first view matching `inst`.
pub(crate) fn resolve(views: &[Arc<dyn View>], inst: &Instrument) -> Option<Stream> {
    views.iter().find_map(|view| view.match_inst(inst))
}

/// A name criterion, either compared verbatim or as a wildcard pattern where
/// `*` matches any run of characters and `?` matches exactly one.
#[derive(Clone)]
enum NamePattern {
    Exact(Cow<'static, str>),
    Wildcard { pattern: Cow<'static, str>, re: Regex },
}

impl NamePattern {
    fn parse(pattern: Cow<'static, str>) -> MetricResult<Self> {
        if !pattern.contains(['*', '?']) {
            return Ok(NamePattern::Exact(pattern));
        }

        let mut re = String::with_capacity(pattern.len() + 2);
        re.push('^');
        let mut literal = String::new();
        for c in pattern.chars() {
            match c {
                '*' | '?' => {
                    re.push_str(&regex::escape(&literal));
                    literal.clear();
                    re.push_str(if c == '*' { ".*" } else { "." });
                }
                _ => literal.push(c),
            }
        }
        re.push_str(&regex::escape(&literal));
        re.push('$');

        let re = Regex::new(&re)
            .map_err(|e| MetricError::Config(format!("invalid pattern {pattern:?}: {e}")))?;
        Ok(NamePattern::Wildcard { pattern, re })
    }

    fn is_wildcard(&self) -> bool {
        matches!(self, NamePattern::Wildcard { .. })
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Exact(expected) => expected == name,
            NamePattern::Wildcard { re, .. } => re.is_match(name),
        }
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamePattern::Exact(name) => f.debug_tuple("Exact").field(name).finish(),
            NamePattern::Wildcard { pattern, .. } => {
                f.debug_tuple("Wildcard").field(pattern).finish()
            }
        }
    }
}

/// A declarative [View]: match criteria paired with the [Stream] applied to
/// every instrument meeting all of them.
///
/// ```
/// use metric_views::metrics::{Aggregation, Stream, ViewRule};
///
/// # fn main() -> metric_views::MetricResult<()> {
/// let view = ViewRule::builder()
///     .with_scope_name("github.com/open-telemetry/opentelemetry-go/example/view")
///     .with_instrument_name("custom_histogram")
///     .with_stream(
///         Stream::builder()
///             .with_name("bar")
///             .with_aggregation(Aggregation::ExplicitBucketHistogram {
///                 boundaries: vec![64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0],
///                 record_min_max: true,
///             })
///             .build()?,
///     )
///     .build()?;
/// # let _ = view;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ViewRule {
    scope_name: Option<NamePattern>,
    scope_version: Option<Cow<'static, str>>,
    instrument_name: Option<NamePattern>,
    instrument_kind: Option<InstrumentKind>,
    instrument_unit: Option<Cow<'static, str>>,
    stream: Stream,
}

impl ViewRule {
    /// Start building a rule.
    pub fn builder() -> ViewRuleBuilder {
        ViewRuleBuilder::default()
    }

    fn matches(&self, inst: &Instrument) -> bool {
        self.scope_name
            .as_ref()
            .map_or(true, |p| p.matches(inst.scope.name()))
            && self
                .scope_version
                .as_ref()
                .map_or(true, |v| inst.scope.version() == Some(v.as_ref()))
            && self
                .instrument_name
                .as_ref()
                .map_or(true, |p| p.matches(&inst.name))
            && self.instrument_kind.map_or(true, |k| k == inst.kind)
            && self
                .instrument_unit
                .as_ref()
                .map_or(true, |u| *u == inst.unit)
    }
}

impl View for ViewRule {
    fn match_inst(&self, inst: &Instrument) -> Option<Stream> {
        if self.matches(inst) {
            Some(self.stream.clone())
        } else {
            None
        }
    }
}

/// Configuration for a [ViewRule].
#[derive(Debug, Default)]
pub struct ViewRuleBuilder {
    scope_name: Option<Cow<'static, str>>,
    scope_version: Option<Cow<'static, str>>,
    instrument_name: Option<Cow<'static, str>>,
    instrument_kind: Option<InstrumentKind>,
    instrument_unit: Option<Cow<'static, str>>,
    stream: Option<Stream>,
}

impl ViewRuleBuilder {
    /// Match instruments of the meter with this name. Accepts wildcards.
    pub fn with_scope_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.scope_name = Some(name.into());
        self
    }

    /// Match instruments of the meter with this exact version.
    pub fn with_scope_version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.scope_version = Some(version.into());
        self
    }

    /// Match instruments with this name. Accepts wildcards.
    pub fn with_instrument_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.instrument_name = Some(name.into());
        self
    }

    /// Match instruments of this kind.
    pub fn with_instrument_kind(mut self, kind: InstrumentKind) -> Self {
        self.instrument_kind = Some(kind);
        self
    }

    /// Match instruments with this exact unit.
    pub fn with_instrument_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.instrument_unit = Some(unit.into());
        self
    }

    /// The stream applied to matching instruments. Defaults to an empty
    /// override that keeps the instrument's own definition.
    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Validate the criteria and build the [ViewRule].
    pub fn build(self) -> MetricResult<ViewRule> {
        if self.scope_name.is_none()
            && self.scope_version.is_none()
            && self.instrument_name.is_none()
            && self.instrument_kind.is_none()
            && self.instrument_unit.is_none()
        {
            return Err(MetricError::Config(
                "view must have at least one match criterion".into(),
            ));
        }

        let stream = self.stream.unwrap_or_default();
        let scope_name = self.scope_name.map(NamePattern::parse).transpose()?;
        let instrument_name = self.instrument_name.map(NamePattern::parse).transpose()?;

        if let Some(rename) = stream.name.as_deref() {
            match &instrument_name {
                Some(pattern) if pattern.is_wildcard() => {
                    return Err(MetricError::Config(format!(
                        "view renaming to {rename:?} must not match instruments by wildcard: {pattern:?}"
                    )));
                }
                None => {
                    return Err(MetricError::Config(format!(
                        "view renaming to {rename:?} must match an exact instrument name"
                    )));
                }
                _ => {}
            }
        }

        Ok(ViewRule {
            scope_name,
            scope_version: self.scope_version,
            instrument_name,
            instrument_kind: self.instrument_kind,
            instrument_unit: self.instrument_unit,
            stream,
        })
    }
}
