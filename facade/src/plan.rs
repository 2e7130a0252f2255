//! YAML synthesis plans driving the facade from the command line

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use vigil_core::{AddCompositeAlarmProps, MonitoringBackend, Result};
use vigil_dashboard::HeaderLevel;

use crate::facade::MonitoringFacade;
use crate::monitoring::MonitoringTarget;

fn default_header_level() -> HeaderLevel {
    HeaderLevel::Large
}

/// One facade call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PlanStep {
    Header {
        text: String,
        #[serde(default = "default_header_level")]
        level: HeaderLevel,
        #[serde(default)]
        add_to_summary_dashboard: bool,
        #[serde(default)]
        add_to_alarm_dashboard: bool,
    },
    Monitor {
        target: MonitoringTarget,
    },
    CompositeByTag {
        tag: String,
        #[serde(default)]
        props: AddCompositeAlarmProps,
    },
    CompositeByDisambiguator {
        disambiguator: String,
        #[serde(default)]
        props: AddCompositeAlarmProps,
    },
    Composite {
        props: AddCompositeAlarmProps,
    },
}

impl PlanStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStep::Header { .. } => "header",
            PlanStep::Monitor { .. } => "monitor",
            PlanStep::CompositeByTag { .. } => "composite_by_tag",
            PlanStep::CompositeByDisambiguator { .. } => "composite_by_disambiguator",
            PlanStep::Composite { .. } => "composite",
        }
    }

    fn apply<B: MonitoringBackend>(self, facade: &mut MonitoringFacade<B>) -> Result<()> {
        match self {
            PlanStep::Header {
                text,
                level,
                add_to_summary_dashboard,
                add_to_alarm_dashboard,
            } => facade.add_header(&text, level, add_to_summary_dashboard, add_to_alarm_dashboard),
            PlanStep::Monitor { target } => facade.monitor(target).map(|_| ()),
            PlanStep::CompositeByTag { tag, props } => facade.create_composite_alarm_using_tag(&tag, props).map(|_| ()),
            PlanStep::CompositeByDisambiguator { disambiguator, props } => facade
                .create_composite_alarm_using_disambiguator(&disambiguator, props)
                .map(|_| ()),
            PlanStep::Composite { props } => facade.create_composite_alarm(props).map(|_| ()),
        }
    }
}

/// Ordered list of facade calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisPlan {
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl SynthesisPlan {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        let plan = Self::from_yaml(&yaml)?;
        info!(path = %path.as_ref().display(), steps = plan.steps.len(), "Loaded synthesis plan");
        Ok(plan)
    }

    /// Run every step in order; the first failure stops the plan
    pub fn apply<B: MonitoringBackend>(self, facade: &mut MonitoringFacade<B>) -> Result<()> {
        for (index, step) in self.steps.into_iter().enumerate() {
            debug!(index, step = step.as_str(), "Applying plan step");
            step.apply(facade)?;
        }
        Ok(())
    }
}
