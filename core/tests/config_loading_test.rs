//! Configuration loading from files

use std::io::Write;

use vigil_core::alarm::DedupeProcessorConfig;
use vigil_core::*;

fn write_config(contents: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_from_file_overrides_defaults() -> anyhow::Result<()> {
    let file = write_config(
        r#"
alarms:
  alarm_name_prefix: Checkout
  datapoints_to_alarm: 2
  evaluation_periods: 4
  actions_enabled: false
  runbook_link: https://runbooks.example.com/checkout
  dedupe:
    type: extend
    prefix: "team-"
  action:
    type: sns
    on_alarm_topic: arn:topic:page
metrics:
  namespace: Checkout
limits:
  max_widgets_per_dashboard: 10
"#,
    )?;

    let config = VigilConfig::from_file(file.path())?;
    config.validate()?;

    assert_eq!(config.alarms.alarm_name_prefix, "Checkout");
    assert_eq!(config.alarms.datapoints_to_alarm, Some(2));
    assert_eq!(config.alarms.actions_enabled, ActionsEnabled::All(false));
    assert_eq!(
        config.alarms.dedupe,
        DedupeProcessorConfig::Extend {
            prefix: "team-".to_string(),
            suffix: String::new(),
        }
    );
    assert_eq!(config.alarms.action, Some(ActionStrategy::notify_sns("arn:topic:page")));
    assert_eq!(config.metrics.namespace.as_deref(), Some("Checkout"));
    assert_eq!(config.limits.max_widgets_per_dashboard, 10);
    // untouched sections keep their defaults
    assert_eq!(config.limits.max_alarm_name_length, 255);
    assert!(config.dashboards.create_dashboard);

    Ok(())
}

#[test]
fn test_invalid_file_fails_validation() -> anyhow::Result<()> {
    let file = write_config(
        r#"
alarms:
  datapoints_to_alarm: 5
  evaluation_periods: 3
"#,
    )?;

    let config = VigilConfig::from_file(file.path())?;
    let err = VigilError::from(config.validate().unwrap_err());
    assert!(err.is_configuration());
    assert_eq!(err.category(), "config");

    Ok(())
}

#[test]
fn test_load_without_files_uses_defaults() {
    let config = VigilConfig::load().unwrap();
    assert_eq!(config.limits, BackendLimits::default());
    assert!(config.validate().is_ok());
}
