//! Alarm names, descriptions, dedupe strings and widget labels

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::alarm::dedupe::{DedupeStringProcessor, DoNotModifyDedupeString};
use crate::strings::join_distinct;
use crate::types::ComparisonOperator;
use crate::{Result, VigilError};

const NAME_SEPARATOR: &str = "-";
const LABEL_SEPARATOR: &str = " ";
const DESCRIPTION_LINE_SEPARATOR: &str = " \r\n";

/// Everything that goes into an alarm's identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingInput {
    pub local_name: String,
    pub global_prefix: Option<String>,
    pub local_prefix: Option<String>,
    pub disambiguator: Option<String>,
    pub resource_identifier: String,
    pub name_override: Option<String>,
    pub dedupe_suffix: Option<String>,
    pub dedupe_override: Option<String>,
}

impl NamingInput {
    pub fn new<S: Into<String>>(local_name: S, resource_identifier: S) -> Self {
        Self {
            local_name: local_name.into(),
            resource_identifier: resource_identifier.into(),
            ..Default::default()
        }
    }

    pub fn global_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.global_prefix = Some(prefix.into());
        self
    }

    pub fn local_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.local_prefix = Some(prefix.into());
        self
    }

    pub fn disambiguator<S: Into<String>>(mut self, disambiguator: S) -> Self {
        self.disambiguator = Some(disambiguator.into());
        self
    }

    pub fn name_override<S: Into<String>>(mut self, name: S) -> Self {
        self.name_override = Some(name.into());
        self
    }

    pub fn dedupe_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.dedupe_suffix = Some(suffix.into());
        self
    }

    pub fn dedupe_override<S: Into<String>>(mut self, dedupe: S) -> Self {
        self.dedupe_override = Some(dedupe.into());
        self
    }
}

/// What a human-readable description is built from
#[derive(Debug, Clone)]
pub struct DescriptionInput {
    pub metric_label: String,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub description_override: Option<String>,
    pub runbook_link: Option<String>,
    pub documentation_link: Option<String>,
}

/// Resolved identity of one alarm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmNames {
    pub alarm_name: String,
    pub description: String,
    pub dedupe_string: String,
    pub widget_label: String,
}

/// Names already issued in this synthesis pass
#[derive(Debug, Clone, Default)]
pub struct IssuedNames {
    names: HashSet<String>,
}

impl IssuedNames {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Record a name, failing if it was issued before
    pub fn claim(&mut self, name: &str) -> Result<()> {
        if !self.names.insert(name.to_string()) {
            return Err(VigilError::NameCollision {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Derives alarm identities from naming inputs
#[derive(Debug, Clone)]
pub struct AlarmNamingStrategy {
    dedupe_processor: Arc<dyn DedupeStringProcessor>,
    max_name_length: usize,
}

impl Default for AlarmNamingStrategy {
    fn default() -> Self {
        Self::new(Arc::new(DoNotModifyDedupeString), 255)
    }
}

impl AlarmNamingStrategy {
    pub fn new(dedupe_processor: Arc<dyn DedupeStringProcessor>, max_name_length: usize) -> Self {
        Self {
            dedupe_processor,
            max_name_length,
        }
    }

    pub fn resolve_name(&self, input: &NamingInput) -> String {
        if let Some(name) = &input.name_override {
            return name.clone();
        }
        join_distinct(
            [
                input.global_prefix.as_deref(),
                input.local_prefix.as_deref(),
                Some(input.resource_identifier.as_str()),
                input.disambiguator.as_deref(),
                Some(input.local_name.as_str()),
            ],
            NAME_SEPARATOR,
        )
    }

    pub fn resolve_widget_label(&self, input: &NamingInput) -> String {
        join_distinct(
            [
                Some(input.resource_identifier.as_str()),
                Some(input.local_name.as_str()),
                input.disambiguator.as_deref(),
            ],
            LABEL_SEPARATOR,
        )
    }

    /// Dedupe string: the alarm name without its disambiguator, or the processed override
    pub fn resolve_dedupe_string(&self, input: &NamingInput) -> String {
        if let Some(dedupe_override) = &input.dedupe_override {
            return self
                .dedupe_processor
                .process_dedupe_string_override(dedupe_override);
        }
        let default = join_distinct(
            [
                input.global_prefix.as_deref(),
                input.local_prefix.as_deref(),
                Some(input.resource_identifier.as_str()),
                Some(input.dedupe_suffix.as_deref().unwrap_or(&input.local_name)),
            ],
            NAME_SEPARATOR,
        );
        self.dedupe_processor.process_dedupe_string(&default)
    }

    pub fn resolve_description(&self, input: &DescriptionInput) -> String {
        let summary = match (&input.description_override, &input.description) {
            (Some(text), _) | (None, Some(text)) => text.clone(),
            (None, None) => {
                let mut text = format!(
                    "{} {} {}",
                    input.metric_label,
                    input.operator.phrase(),
                    input.threshold
                );
                if let Some(unit) = &input.unit {
                    text.push(' ');
                    text.push_str(unit);
                }
                text
            }
        };

        let mut lines = vec![summary];
        if let Some(link) = &input.runbook_link {
            lines.push(format!("Runbook: {}", link));
        }
        if let Some(link) = &input.documentation_link {
            lines.push(format!("Documentation: {}", link));
        }
        lines.join(DESCRIPTION_LINE_SEPARATOR)
    }

    /// Resolve all identity strings and claim the alarm name for this pass
    pub fn issue(
        &self,
        input: &NamingInput,
        description: &DescriptionInput,
        issued: &mut IssuedNames,
    ) -> Result<AlarmNames> {
        let alarm_name = self.resolve_name(input);

        if alarm_name.is_empty() {
            return Err(VigilError::invalid_monitoring(
                input.resource_identifier.clone(),
                format!("alarm '{}' resolved to an empty name", input.local_name),
            ));
        }
        let length = alarm_name.chars().count();
        if length > self.max_name_length {
            return Err(VigilError::NameTooLong {
                name: alarm_name,
                length,
                max: self.max_name_length,
            });
        }
        issued.claim(&alarm_name)?;

        let names = AlarmNames {
            description: self.resolve_description(description),
            dedupe_string: self.resolve_dedupe_string(input),
            widget_label: self.resolve_widget_label(input),
            alarm_name,
        };
        debug!(
            alarm = %names.alarm_name,
            dedupe = %names.dedupe_string,
            "Issued alarm name"
        );
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::dedupe::ExtendDedupeString;

    fn input() -> NamingInput {
        NamingInput::new("Latency", "OrderService")
            .global_prefix("Prod")
            .local_prefix("Api")
            .disambiguator("Critical")
    }

    fn description() -> DescriptionInput {
        DescriptionInput {
            metric_label: "P99 Latency".to_string(),
            operator: ComparisonOperator::GreaterThanThreshold,
            threshold: 500.0,
            unit: Some("ms".to_string()),
            description: None,
            description_override: None,
            runbook_link: None,
            documentation_link: None,
        }
    }

    #[test]
    fn test_resolve_name_joins_distinct_tokens() {
        let naming = AlarmNamingStrategy::default();
        assert_eq!(naming.resolve_name(&input()), "Prod-Api-OrderService-Critical-Latency");

        let repeated = NamingInput::new("latency", "Latency").global_prefix("Prod");
        assert_eq!(naming.resolve_name(&repeated), "Prod-Latency");

        let overridden = input().name_override("my-alarm");
        assert_eq!(naming.resolve_name(&overridden), "my-alarm");
    }

    #[test]
    fn test_widget_label_has_no_global_prefix() {
        let naming = AlarmNamingStrategy::default();
        assert_eq!(naming.resolve_widget_label(&input()), "OrderService Latency Critical");
    }

    #[test]
    fn test_dedupe_string_drops_disambiguator() {
        let naming = AlarmNamingStrategy::default();
        assert_eq!(naming.resolve_dedupe_string(&input()), "Prod-Api-OrderService-Latency");

        let suffixed = input().dedupe_suffix("SlowCalls");
        assert_eq!(naming.resolve_dedupe_string(&suffixed), "Prod-Api-OrderService-SlowCalls");
    }

    #[test]
    fn test_dedupe_override_goes_through_override_hook() {
        let naming = AlarmNamingStrategy::new(Arc::new(ExtendDedupeString::new("team-", "")), 255);
        assert_eq!(
            naming.resolve_dedupe_string(&input().dedupe_override("orders")),
            "team-orders"
        );
        assert_eq!(
            naming.resolve_dedupe_string(&input()),
            "team-Prod-Api-OrderService-Latency"
        );
    }

    #[test]
    fn test_description_with_links() {
        let naming = AlarmNamingStrategy::default();
        let mut input = description();
        assert_eq!(naming.resolve_description(&input), "P99 Latency is greater than 500 ms");

        input.runbook_link = Some("https://runbook".to_string());
        input.documentation_link = Some("https://docs".to_string());
        assert_eq!(
            naming.resolve_description(&input),
            "P99 Latency is greater than 500 ms \r\nRunbook: https://runbook \r\nDocumentation: https://docs"
        );

        input.description = Some("Custom".to_string());
        input.description_override = Some("Override".to_string());
        assert!(naming.resolve_description(&input).starts_with("Override"));
    }

    #[test]
    fn test_issue_rejects_collision() {
        let naming = AlarmNamingStrategy::default();
        let mut issued = IssuedNames::default();

        naming.issue(&input(), &description(), &mut issued).unwrap();
        let err = naming.issue(&input(), &description(), &mut issued).unwrap_err();

        assert!(matches!(err, VigilError::NameCollision { ref name } if name == "Prod-Api-OrderService-Critical-Latency"));
        assert!(err.is_configuration());
        assert_eq!(issued.len(), 1);
    }

    #[test]
    fn test_issue_rejects_long_name() {
        let naming = AlarmNamingStrategy::new(Arc::new(DoNotModifyDedupeString), 10);
        let mut issued = IssuedNames::default();

        let err = naming.issue(&input(), &description(), &mut issued).unwrap_err();
        assert!(matches!(err, VigilError::NameTooLong { max: 10, .. }));
        assert!(issued.is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn naming_is_deterministic(
                local in "[A-Za-z]{1,10}",
                resource in "[A-Za-z0-9]{0,10}",
                disambiguator in proptest::option::of("[A-Za-z]{1,8}"),
            ) {
                let naming = AlarmNamingStrategy::default();
                let mut input = NamingInput::new(local, resource).global_prefix("Prod");
                input.disambiguator = disambiguator;

                prop_assert_eq!(naming.resolve_name(&input), naming.resolve_name(&input.clone()));
                prop_assert_eq!(
                    naming.resolve_dedupe_string(&input),
                    naming.resolve_dedupe_string(&input.clone())
                );
            }
        }
    }
}
