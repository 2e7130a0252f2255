//! Configuration management for monitoring synthesis

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

use crate::alarm::action::ActionStrategy;
use crate::alarm::annotation::AnnotationStrategyKind;
use crate::alarm::dedupe::DedupeProcessorConfig;
use crate::types::TreatMissingData;

/// Main configuration structure for a synthesis pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    /// Global alarm factory defaults
    pub alarms: AlarmFactoryDefaults,

    /// Global metric factory defaults
    pub metrics: MetricFactoryDefaults,

    /// Dashboard settings
    pub dashboards: DashboardsConfig,

    /// Backend capacity limits
    pub limits: BackendLimits,
}

/// Whether alarm actions are enabled, globally or per disambiguator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionsEnabled {
    All(bool),
    PerDisambiguator(BTreeMap<String, bool>),
}

impl Default for ActionsEnabled {
    fn default() -> Self {
        ActionsEnabled::All(true)
    }
}

impl ActionsEnabled {
    /// Resolve for one alarm; a map without an entry for the disambiguator disables actions
    pub fn for_disambiguator(&self, disambiguator: Option<&str>) -> bool {
        match self {
            ActionsEnabled::All(enabled) => *enabled,
            ActionsEnabled::PerDisambiguator(map) => disambiguator
                .and_then(|d| map.get(d).copied())
                .unwrap_or(false),
        }
    }
}

/// Global alarm factory defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmFactoryDefaults {
    /// Prefix of every alarm name issued by this pass
    pub alarm_name_prefix: String,

    pub actions_enabled: ActionsEnabled,

    /// Default notification action
    pub action: Option<ActionStrategy>,

    /// Datapoints that must breach to trigger (default 3)
    pub datapoints_to_alarm: Option<u32>,

    /// Evaluation window (defaults to datapoints_to_alarm)
    pub evaluation_periods: Option<u32>,

    pub treat_missing_data: TreatMissingData,

    pub runbook_link: Option<String>,

    pub documentation_link: Option<String>,

    /// Shade the alarming range on graphs
    pub fill_alarm_range: bool,

    pub annotation_strategy: AnnotationStrategyKind,

    pub dedupe: DedupeProcessorConfig,

    /// Error alarms of one resource share a dedupe string
    pub use_default_dedupe_for_error: bool,

    /// Latency alarms of one resource share a dedupe string
    pub use_default_dedupe_for_latency: bool,
}

impl Default for AlarmFactoryDefaults {
    fn default() -> Self {
        Self {
            alarm_name_prefix: "Vigil".to_string(),
            actions_enabled: ActionsEnabled::default(),
            action: None,
            datapoints_to_alarm: None,
            evaluation_periods: None,
            treat_missing_data: TreatMissingData::default(),
            runbook_link: None,
            documentation_link: None,
            fill_alarm_range: false,
            annotation_strategy: AnnotationStrategyKind::default(),
            dedupe: DedupeProcessorConfig::default(),
            use_default_dedupe_for_error: true,
            use_default_dedupe_for_latency: true,
        }
    }
}

/// Global metric factory defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricFactoryDefaults {
    /// Namespace used when a metric does not name its own
    pub namespace: Option<String>,

    /// Metric period in seconds (default 300)
    pub period_seconds: Option<u64>,
}

/// How dashboard graphs are emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardRenderingPreference {
    #[default]
    InteractiveOnly,
    /// Graphs are replaced by pre-rendered images
    BitmapOnly,
    /// Interactive dashboards plus a `Bitmap-` prefixed image copy of each page
    InteractiveAndBitmap,
}

impl DashboardRenderingPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardRenderingPreference::InteractiveOnly => "interactive_only",
            DashboardRenderingPreference::BitmapOnly => "bitmap_only",
            DashboardRenderingPreference::InteractiveAndBitmap => "interactive_and_bitmap",
        }
    }

    pub fn interactive(&self) -> bool {
        !matches!(self, DashboardRenderingPreference::BitmapOnly)
    }

    pub fn bitmap(&self) -> bool {
        !matches!(self, DashboardRenderingPreference::InteractiveOnly)
    }
}

impl std::fmt::Display for DashboardRenderingPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardsConfig {
    /// Base name of the detail dashboard; summary and alarm dashboards derive from it
    pub name: String,

    pub create_dashboard: bool,

    pub create_summary_dashboard: bool,

    pub create_alarm_dashboard: bool,

    /// Start of the detail and alarm dashboards' default time range
    pub detail_start: String,

    /// Start of the summary dashboard's default time range
    pub summary_start: String,

    pub rendering_preference: DashboardRenderingPreference,
}

impl Default for DashboardsConfig {
    fn default() -> Self {
        Self {
            name: "Vigil".to_string(),
            create_dashboard: true,
            create_summary_dashboard: false,
            create_alarm_dashboard: false,
            detail_start: "-PT8H".to_string(),
            summary_start: "-P14D".to_string(),
            rendering_preference: DashboardRenderingPreference::default(),
        }
    }
}

/// Hard capacity limits of the monitoring backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendLimits {
    pub max_alarm_name_length: usize,
    pub max_dashboard_name_length: usize,
    pub max_widgets_per_dashboard: usize,
    /// Maximum height of one dashboard page, in grid units
    pub max_dashboard_height: u32,
}

impl Default for BackendLimits {
    fn default() -> Self {
        Self {
            max_alarm_name_length: 255,
            max_dashboard_name_length: 255,
            max_widgets_per_dashboard: 500,
            max_dashboard_height: 1000,
        }
    }
}

impl VigilConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            )
            // Add local config (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with VIGIL_ prefix
            .add_source(Environment::with_prefix("VIGIL").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from one explicit file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alarms.alarm_name_prefix.trim().is_empty() {
            return Err(ConfigError::Message("alarm_name_prefix cannot be empty".into()));
        }

        if self.dashboards.name.trim().is_empty() {
            return Err(ConfigError::Message("dashboard name cannot be empty".into()));
        }

        if let (Some(datapoints), Some(periods)) = (
            self.alarms.datapoints_to_alarm,
            self.alarms.evaluation_periods,
        ) {
            if datapoints > periods {
                return Err(ConfigError::Message(format!(
                    "datapoints_to_alarm ({}) cannot exceed evaluation_periods ({})",
                    datapoints, periods
                )));
            }
        }
        if self.alarms.datapoints_to_alarm == Some(0) || self.alarms.evaluation_periods == Some(0) {
            return Err(ConfigError::Message(
                "datapoints_to_alarm and evaluation_periods must be greater than 0".into(),
            ));
        }

        for (field, link) in [
            ("runbook_link", &self.alarms.runbook_link),
            ("documentation_link", &self.alarms.documentation_link),
        ] {
            if let Some(link) = link {
                if Url::parse(link).is_err() {
                    return Err(ConfigError::Message(format!("Invalid {}: {}", field, link)));
                }
            }
        }

        if self.metrics.period_seconds == Some(0) {
            return Err(ConfigError::Message("metric period must be greater than 0".into()));
        }

        let limits = &self.limits;
        if limits.max_alarm_name_length == 0
            || limits.max_dashboard_name_length == 0
            || limits.max_widgets_per_dashboard == 0
            || limits.max_dashboard_height == 0
        {
            return Err(ConfigError::Message("backend limits must be greater than 0".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = VigilConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_alarm_name_length, 255);
        assert_eq!(config.dashboards.detail_start, "-PT8H");
    }

    #[test]
    fn test_rejects_datapoints_above_periods() {
        let mut config = VigilConfig::default();
        config.alarms.datapoints_to_alarm = Some(5);
        config.alarms.evaluation_periods = Some(3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_runbook_url() {
        let mut config = VigilConfig::default();
        config.alarms.runbook_link = Some("not a url".to_string());
        assert!(config.validate().is_err());

        config.alarms.runbook_link = Some("https://wiki.example.com/runbook".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_prefix_and_zero_limits() {
        let mut config = VigilConfig::default();
        config.alarms.alarm_name_prefix = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = VigilConfig::default();
        config.limits.max_widgets_per_dashboard = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_actions_enabled_per_disambiguator() {
        let map = BTreeMap::from([("Critical".to_string(), true), ("Warning".to_string(), false)]);
        let enabled = ActionsEnabled::PerDisambiguator(map);

        assert!(enabled.for_disambiguator(Some("Critical")));
        assert!(!enabled.for_disambiguator(Some("Warning")));
        assert!(!enabled.for_disambiguator(Some("Other")));
        assert!(!enabled.for_disambiguator(None));
        assert!(ActionsEnabled::All(true).for_disambiguator(None));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        writeln!(file, "alarms:")?;
        writeln!(file, "  use_default_dedupe_for_latency: false")?;
        writeln!(file, "dashboards:")?;
        writeln!(file, "  rendering_preference: interactive_and_bitmap")?;

        let config = VigilConfig::from_file(file.path())?;
        assert!(config.alarms.use_default_dedupe_for_error);
        assert!(!config.alarms.use_default_dedupe_for_latency);
        assert_eq!(
            config.dashboards.rendering_preference,
            DashboardRenderingPreference::InteractiveAndBitmap
        );
        assert!(config.dashboards.rendering_preference.interactive());
        assert!(config.dashboards.rendering_preference.bitmap());
        assert_eq!(config.dashboards.detail_start, "-PT8H");
        Ok(())
    }
}
