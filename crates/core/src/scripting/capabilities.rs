//! Script capability flags and runner selection.
//!
//! The frontend renders a different form/runner for each script depending on
//! what it declares. The decision is made here so the API can hand the
//! browser a single [`RunnerKind`].

use serde::{Deserialize, Serialize};

/// Capabilities declared by a script in its manifest or metadata file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Script discovers devices/tests at runtime before running.
    #[serde(default)]
    pub dynamic_discovery: bool,
    /// Script renders a configuration template before pushing it.
    #[serde(default)]
    pub template_generation: bool,
    /// Name of a dedicated sidebar component the frontend should mount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidebar_component: Option<String>,
    /// Script needs device hostname/username/password.
    #[serde(default)]
    pub device_auth: bool,
    /// Frontend shows the run history panel for this script.
    #[serde(default)]
    pub history_tracking: bool,
}

/// Partial capabilities from a per-script metadata file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityOverrides {
    pub dynamic_discovery: Option<bool>,
    pub template_generation: Option<bool>,
    pub sidebar_component: Option<String>,
    pub device_auth: Option<bool>,
    pub history_tracking: Option<bool>,
}

impl Capabilities {
    /// Apply every key present in `overrides`; absent keys keep their value.
    pub fn merge(&mut self, overrides: &CapabilityOverrides) {
        if let Some(v) = overrides.dynamic_discovery {
            self.dynamic_discovery = v;
        }
        if let Some(v) = overrides.template_generation {
            self.template_generation = v;
        }
        if let Some(v) = &overrides.sidebar_component {
            self.sidebar_component = Some(v.clone());
        }
        if let Some(v) = overrides.device_auth {
            self.device_auth = v;
        }
        if let Some(v) = overrides.history_tracking {
            self.history_tracking = v;
        }
    }
}

/// Which runner UI handles a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RunnerKind {
    TemplateWorkflow,
    DiscoveryRunner,
    SidebarRunner { component: String },
    DeviceAuthRunner,
    GenericRunner,
}

/// Pick the runner for a script.
///
/// Precedence: template generation, dynamic discovery, sidebar component,
/// device auth, then the generic runner.
pub fn select_runner(caps: &Capabilities) -> RunnerKind {
    if caps.template_generation {
        return RunnerKind::TemplateWorkflow;
    }
    if caps.dynamic_discovery {
        return RunnerKind::DiscoveryRunner;
    }
    if let Some(component) = caps
        .sidebar_component
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        return RunnerKind::SidebarRunner {
            component: component.to_string(),
        };
    }
    if caps.device_auth {
        return RunnerKind::DeviceAuthRunner;
    }
    RunnerKind::GenericRunner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_is_generic() {
        assert_eq!(
            select_runner(&Capabilities::default()),
            RunnerKind::GenericRunner
        );
    }

    #[test]
    fn template_generation_has_highest_precedence() {
        let caps = Capabilities {
            dynamic_discovery: true,
            template_generation: true,
            sidebar_component: Some("BackupSidebar".into()),
            device_auth: true,
            history_tracking: true,
        };
        assert_eq!(select_runner(&caps), RunnerKind::TemplateWorkflow);
    }

    #[test]
    fn discovery_beats_sidebar_and_auth() {
        let caps = Capabilities {
            dynamic_discovery: true,
            sidebar_component: Some("X".into()),
            device_auth: true,
            ..Default::default()
        };
        assert_eq!(select_runner(&caps), RunnerKind::DiscoveryRunner);
    }

    #[test]
    fn sidebar_component_is_carried() {
        let caps = Capabilities {
            sidebar_component: Some(" BackupRestoreSidebar ".into()),
            device_auth: true,
            ..Default::default()
        };
        assert_eq!(
            select_runner(&caps),
            RunnerKind::SidebarRunner {
                component: "BackupRestoreSidebar".into()
            }
        );
    }

    #[test]
    fn blank_sidebar_is_ignored() {
        let caps = Capabilities {
            sidebar_component: Some("  ".into()),
            device_auth: true,
            ..Default::default()
        };
        assert_eq!(select_runner(&caps), RunnerKind::DeviceAuthRunner);
    }

    #[test]
    fn merge_only_touches_present_keys() {
        let mut caps = Capabilities {
            device_auth: true,
            ..Default::default()
        };
        caps.merge(&CapabilityOverrides {
            dynamic_discovery: Some(true),
            ..Default::default()
        });
        assert!(caps.device_auth);
        assert!(caps.dynamic_discovery);
    }

    #[test]
    fn runner_kind_wire_format() {
        let value = serde_json::to_value(RunnerKind::SidebarRunner {
            component: "JsnapySidebar".into(),
        })
        .expect("serialize");
        assert_eq!(value["kind"], "sidebarRunner");
        assert_eq!(value["component"], "JsnapySidebar");

        let value = serde_json::to_value(RunnerKind::GenericRunner).expect("serialize");
        assert_eq!(value, serde_json::json!({"kind": "genericRunner"}));
    }
}
