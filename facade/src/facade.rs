//! Monitoring facade: the single entry point of a synthesis pass
//!
//! The facade owns the global alarm and metric factories, the alarm registry,
//! the dashboard factory and the backend. Monitorings, widgets and composite
//! alarms are added one call at a time; the pass ends with [`MonitoringFacade::finish`]
//! (or [`MonitoringFacade::synthesize`] for the in-memory backend).
//!
//! A failed call poisons the facade. Every later mutating call returns
//! [`VigilError::Aborted`] so that a half-built pass is never finalized.

use std::sync::Arc;
use tracing::{debug, error, info};

use vigil_core::alarm::{AnnotationStrategy, DedupeStringProcessor};
use vigil_core::{
    AddCompositeAlarmProps, Alarm, AlarmFactory, AlarmRegistry, AlarmSelector, ArtifactGraph, CompositeAlarm,
    InMemoryBackend, MetricFactory, MonitoringBackend, Result, ScopedAlarmOverrides, VigilConfig, VigilError,
};
use vigil_dashboard::{
    DashboardFactory, DashboardPlacement, DashboardSegment, HeaderLevel, HeaderWidget, SingleWidgetDashboardSegment,
    Widget,
};

use crate::monitoring::{Monitoring, MonitoringScope, MonitoringTarget};

/// Local alarm name prefix of composites created by tag or disambiguator
const COMPOSITE_PREFIX: &str = "Composite";

/// Builder for [`MonitoringFacade`]
pub struct MonitoringFacadeBuilder {
    config: VigilConfig,
    annotation_strategy: Option<Arc<dyn AnnotationStrategy>>,
    dedupe_processor: Option<Arc<dyn DedupeStringProcessor>>,
}

impl MonitoringFacadeBuilder {
    pub fn new(config: VigilConfig) -> Self {
        Self {
            config,
            annotation_strategy: None,
            dedupe_processor: None,
        }
    }

    /// Replace the configured annotation strategy
    pub fn with_annotation_strategy(mut self, strategy: Arc<dyn AnnotationStrategy>) -> Self {
        self.annotation_strategy = Some(strategy);
        self
    }

    /// Replace the configured dedupe string processor
    pub fn with_dedupe_processor(mut self, processor: Arc<dyn DedupeStringProcessor>) -> Self {
        self.dedupe_processor = Some(processor);
        self
    }

    /// Facade over an [`InMemoryBackend`] sized by the configured limits
    pub fn build(self) -> Result<MonitoringFacade<InMemoryBackend>> {
        let backend = InMemoryBackend::new(self.config.limits);
        self.build_with_backend(backend)
    }

    pub fn build_with_backend<B: MonitoringBackend>(self, backend: B) -> Result<MonitoringFacade<B>> {
        self.config.validate()?;

        let mut alarm_factory = AlarmFactory::new(self.config.alarms.clone(), &self.config.limits);
        if let Some(strategy) = self.annotation_strategy {
            alarm_factory = alarm_factory.with_annotation_strategy(strategy);
        }
        if let Some(processor) = self.dedupe_processor {
            alarm_factory = alarm_factory.with_dedupe_processor(processor);
        }
        let metric_factory = MetricFactory::new(self.config.metrics.clone());
        let dashboards = DashboardFactory::new(self.config.dashboards.clone(), self.config.limits);

        info!(
            alarm_prefix = %self.config.alarms.alarm_name_prefix,
            dashboard = %self.config.dashboards.name,
            "Monitoring facade ready"
        );

        Ok(MonitoringFacade {
            config: self.config,
            alarm_factory,
            metric_factory,
            dashboards,
            registry: AlarmRegistry::new(),
            monitorings: Vec::new(),
            backend,
            poisoned: None,
        })
    }
}

/// Collects monitorings, alarms and dashboards of one synthesis pass
pub struct MonitoringFacade<B: MonitoringBackend = InMemoryBackend> {
    config: VigilConfig,
    alarm_factory: AlarmFactory,
    metric_factory: MetricFactory,
    dashboards: DashboardFactory,
    registry: AlarmRegistry,
    monitorings: Vec<Box<dyn Monitoring>>,
    backend: B,
    poisoned: Option<String>,
}

impl<B: MonitoringBackend> MonitoringFacade<B> {
    pub fn config(&self) -> &VigilConfig {
        &self.config
    }

    pub fn alarm_factory(&self) -> &AlarmFactory {
        &self.alarm_factory
    }

    pub fn metric_factory(&self) -> &MetricFactory {
        &self.metric_factory
    }

    pub fn registry(&self) -> &AlarmRegistry {
        &self.registry
    }

    pub fn dashboards(&self) -> &DashboardFactory {
        &self.dashboards
    }

    /// Cause of the failure that poisoned the facade, if any
    pub fn poisoned(&self) -> Option<&str> {
        self.poisoned.as_deref()
    }

    fn guard<T, F>(&mut self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if let Some(cause) = &self.poisoned {
            return Err(VigilError::Aborted(format!("{} after {}", operation, cause)));
        }
        f(self).map_err(|err| {
            error!(operation, error = %err, category = err.category(), "Synthesis step failed");
            self.poisoned = Some(format!("{} failed: {}", operation, err));
            err
        })
    }

    /// Build a monitoring and add its widgets to the dashboards
    pub fn monitor(&mut self, target: MonitoringTarget) -> Result<Vec<Arc<Alarm>>> {
        self.guard("monitor", |facade| {
            let kind = target.as_str();
            let placement = target.base().placement;

            let mut scope = MonitoringScope {
                alarm_factory: &facade.alarm_factory,
                metric_factory: &facade.metric_factory,
                registry: &mut facade.registry,
                backend: &mut facade.backend,
            };
            let monitoring = target.build(&mut scope)?;
            facade.dashboards.add_segment(monitoring.as_ref(), &placement)?;

            info!(
                kind,
                title = monitoring.title(),
                alarms = monitoring.created_alarms().len(),
                "Added monitoring"
            );
            let alarms = monitoring.created_alarms().to_vec();
            facade.monitorings.push(monitoring);
            Ok(alarms)
        })
    }

    pub fn add_segment<S: DashboardSegment + ?Sized>(
        &mut self,
        segment: &S,
        placement: &DashboardPlacement,
    ) -> Result<()> {
        self.guard("add_segment", |facade| facade.dashboards.add_segment(segment, placement))
    }

    /// Add one widget to the detail dashboard and, optionally, the summary and alarm dashboards
    pub fn add_widget(&mut self, widget: Arc<dyn Widget>, add_to_summary: bool, add_to_alarm: bool) -> Result<()> {
        debug!(widget = widget.kind(), add_to_summary, add_to_alarm, "Adding widget");
        let segment = SingleWidgetDashboardSegment::with_targets(widget, add_to_summary, add_to_alarm);
        self.add_segment(&segment, &DashboardPlacement::default())
    }

    pub fn add_header(&mut self, text: &str, level: HeaderLevel, add_to_summary: bool, add_to_alarm: bool) -> Result<()> {
        self.add_widget(Arc::new(HeaderWidget::new(text, level)), add_to_summary, add_to_alarm)
    }

    pub fn add_large_header(&mut self, text: &str) -> Result<()> {
        self.add_header(text, HeaderLevel::Large, false, false)
    }

    pub fn add_medium_header(&mut self, text: &str) -> Result<()> {
        self.add_header(text, HeaderLevel::Medium, false, false)
    }

    pub fn add_small_header(&mut self, text: &str) -> Result<()> {
        self.add_header(text, HeaderLevel::Small, false, false)
    }

    /// Every monitoring added so far, in call order
    pub fn created_monitorings(&self) -> &[Box<dyn Monitoring>] {
        &self.monitorings
    }

    /// Every alarm created so far, in creation order
    pub fn created_alarms(&self) -> Vec<Arc<Alarm>> {
        self.registry.alarms().to_vec()
    }

    pub fn created_alarms_with_tag(&self, tag: &str) -> Vec<Arc<Alarm>> {
        self.registry.with_tag(tag)
    }

    pub fn created_alarms_with_disambiguator(&self, disambiguator: &str) -> Vec<Arc<Alarm>> {
        self.registry.with_disambiguator(disambiguator)
    }

    pub fn created_composite_alarms(&self) -> Vec<Arc<CompositeAlarm>> {
        self.registry.composites().to_vec()
    }

    /// Composite over explicit selectors, named by the global alarm factory
    pub fn create_composite_alarm(&mut self, props: AddCompositeAlarmProps) -> Result<Arc<CompositeAlarm>> {
        self.guard("create_composite_alarm", |facade| {
            facade
                .alarm_factory
                .add_composite_alarm(props, &mut facade.registry, &mut facade.backend)
        })
    }

    /// Composite over every alarm carrying `tag`; the disambiguator defaults to the tag
    pub fn create_composite_alarm_using_tag(
        &mut self,
        tag: &str,
        props: AddCompositeAlarmProps,
    ) -> Result<Arc<CompositeAlarm>> {
        self.composite_by("create_composite_alarm_using_tag", AlarmSelector::Tag(tag.to_string()), tag, props)
    }

    /// Composite over every alarm with `disambiguator`, which is also the composite's default disambiguator
    pub fn create_composite_alarm_using_disambiguator(
        &mut self,
        disambiguator: &str,
        props: AddCompositeAlarmProps,
    ) -> Result<Arc<CompositeAlarm>> {
        self.composite_by(
            "create_composite_alarm_using_disambiguator",
            AlarmSelector::Disambiguator(disambiguator.to_string()),
            disambiguator,
            props,
        )
    }

    fn composite_by(
        &mut self,
        operation: &str,
        selector: AlarmSelector,
        default_disambiguator: &str,
        mut props: AddCompositeAlarmProps,
    ) -> Result<Arc<CompositeAlarm>> {
        props.selectors = vec![selector];
        props
            .disambiguator
            .get_or_insert_with(|| default_disambiguator.to_string());

        self.guard(operation, |facade| {
            let factory = facade.alarm_factory.scoped(
                "",
                Some(COMPOSITE_PREFIX.to_string()),
                ScopedAlarmOverrides::default(),
            );
            factory.add_composite_alarm(props, &mut facade.registry, &mut facade.backend)
        })
    }

    /// Finalize the dashboards into the backend and hand the backend back
    pub fn finish(mut self) -> Result<B> {
        if let Some(cause) = self.poisoned.take() {
            return Err(VigilError::Aborted(format!("finish after {}", cause)));
        }

        let handles = self.dashboards.finalize(&mut self.backend)?;
        info!(
            alarms = self.registry.alarms().len(),
            composites = self.registry.composites().len(),
            dashboards = handles.len(),
            "Synthesis finished"
        );
        Ok(self.backend)
    }
}

impl MonitoringFacade<InMemoryBackend> {
    /// Finish the pass and return everything the in-memory backend recorded
    pub fn synthesize(self) -> Result<ArtifactGraph> {
        Ok(self.finish()?.into_graph())
    }
}
