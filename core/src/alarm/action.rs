//! Notification actions attached to alarms

use serde::{Deserialize, Serialize};

/// Severity of an operations item opened by an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpsItemSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl OpsItemSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpsItemSeverity::Critical => "1",
            OpsItemSeverity::High => "2",
            OpsItemSeverity::Medium => "3",
            OpsItemSeverity::Low => "4",
        }
    }
}

/// Action targets per alarm state transition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmActions {
    pub on_alarm: Vec<String>,
    pub on_ok: Vec<String>,
    pub on_insufficient_data: Vec<String>,
}

impl AlarmActions {
    pub fn is_empty(&self) -> bool {
        self.on_alarm.is_empty() && self.on_ok.is_empty() && self.on_insufficient_data.is_empty()
    }

    fn push_unique(targets: &mut Vec<String>, target: &str) {
        if !targets.iter().any(|t| t == target) {
            targets.push(target.to_string());
        }
    }
}

/// How an alarm notifies when it changes state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionStrategy {
    /// No notification
    Noop,

    /// Publish to notification topics
    Sns {
        on_alarm_topic: String,
        #[serde(default)]
        on_ok_topic: Option<String>,
        #[serde(default)]
        on_insufficient_data_topic: Option<String>,
    },

    /// Open an operations item
    OpsItem {
        severity: OpsItemSeverity,
        #[serde(default)]
        category: Option<String>,
    },

    /// Invoke a function
    Lambda { function_arn: String },

    /// Apply every nested strategy in order
    Multiple { actions: Vec<ActionStrategy> },
}

impl ActionStrategy {
    pub fn notify_sns<S: Into<String>>(on_alarm_topic: S) -> Self {
        ActionStrategy::Sns {
            on_alarm_topic: on_alarm_topic.into(),
            on_ok_topic: None,
            on_insufficient_data_topic: None,
        }
    }

    pub fn ops_item(severity: OpsItemSeverity, category: Option<String>) -> Self {
        ActionStrategy::OpsItem { severity, category }
    }

    pub fn trigger_lambda<S: Into<String>>(function_arn: S) -> Self {
        ActionStrategy::Lambda {
            function_arn: function_arn.into(),
        }
    }

    pub fn multiple(actions: Vec<ActionStrategy>) -> Self {
        ActionStrategy::Multiple { actions }
    }

    /// Add this strategy's targets to `actions`
    pub fn add_alarm_actions(&self, actions: &mut AlarmActions) {
        match self {
            ActionStrategy::Noop => {}
            ActionStrategy::Sns {
                on_alarm_topic,
                on_ok_topic,
                on_insufficient_data_topic,
            } => {
                AlarmActions::push_unique(&mut actions.on_alarm, on_alarm_topic);
                if let Some(topic) = on_ok_topic {
                    AlarmActions::push_unique(&mut actions.on_ok, topic);
                }
                if let Some(topic) = on_insufficient_data_topic {
                    AlarmActions::push_unique(&mut actions.on_insufficient_data, topic);
                }
            }
            ActionStrategy::OpsItem { severity, category } => {
                let target = match category {
                    Some(category) => format!("opsitem:{}#CATEGORY={}", severity.as_str(), category),
                    None => format!("opsitem:{}", severity.as_str()),
                };
                AlarmActions::push_unique(&mut actions.on_alarm, &target);
            }
            ActionStrategy::Lambda { function_arn } => {
                AlarmActions::push_unique(&mut actions.on_alarm, function_arn);
            }
            ActionStrategy::Multiple { actions: strategies } => {
                for strategy in strategies {
                    strategy.add_alarm_actions(actions);
                }
            }
        }
    }

    /// Nested `Multiple` strategies flattened into a single list
    pub fn flattened(&self) -> Vec<&ActionStrategy> {
        match self {
            ActionStrategy::Multiple { actions: strategies } => {
                strategies.iter().flat_map(|s| s.flattened()).collect()
            }
            other => vec![other],
        }
    }

    /// Resolve this strategy into concrete targets
    pub fn actions(&self) -> AlarmActions {
        let mut actions = AlarmActions::default();
        self.add_alarm_actions(&mut actions);
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sns_targets() {
        let strategy = ActionStrategy::Sns {
            on_alarm_topic: "arn:topic:alarm".to_string(),
            on_ok_topic: Some("arn:topic:ok".to_string()),
            on_insufficient_data_topic: None,
        };
        let actions = strategy.actions();
        assert_eq!(actions.on_alarm, vec!["arn:topic:alarm"]);
        assert_eq!(actions.on_ok, vec!["arn:topic:ok"]);
        assert!(actions.on_insufficient_data.is_empty());
    }

    #[test]
    fn test_noop_has_no_targets() {
        assert!(ActionStrategy::Noop.actions().is_empty());
    }

    #[test]
    fn test_multiple_applies_all_and_flattens() {
        let strategy = ActionStrategy::multiple(vec![
            ActionStrategy::notify_sns("arn:topic:alarm"),
            ActionStrategy::multiple(vec![
                ActionStrategy::ops_item(OpsItemSeverity::Critical, Some("Availability".to_string())),
                ActionStrategy::notify_sns("arn:topic:alarm"),
            ]),
            ActionStrategy::trigger_lambda("arn:function:pager"),
        ]);

        let actions = strategy.actions();
        assert_eq!(
            actions.on_alarm,
            vec!["arn:topic:alarm", "opsitem:1#CATEGORY=Availability", "arn:function:pager"]
        );
        assert_eq!(strategy.flattened().len(), 4);
    }

    #[test]
    fn test_deserialize_from_config() {
        let strategy: ActionStrategy =
            serde_yaml::from_str("type: sns\non_alarm_topic: arn:topic:alarm\n").unwrap();
        assert_eq!(strategy, ActionStrategy::notify_sns("arn:topic:alarm"));
    }
}
