//! Request and observation types exchanged with a container runtime

use std::collections::HashMap;
use std::fmt;

/// Port the interactive shell service listens on inside every sandbox
pub const SHELL_PORT: u16 = 3000;

/// Label marking containers owned by DevLab
pub const MANAGED_LABEL: &str = "devlab.managed";

/// Label carrying the scenario type
pub const SCENARIO_TYPE_LABEL: &str = "devlab.scenario_type";

/// Live state of a runtime resource as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiveStatus {
    /// Created, never started
    Created,
    /// Running
    Running,
    /// Paused
    Paused,
    /// Restarting
    Restarting,
    /// Being removed
    Removing,
    /// Exited
    Exited,
    /// Dead
    Dead,
    /// Stopped (engines other than Docker)
    Stopped,
    /// Anything else the engine reports
    Other(String),
}

impl LiveStatus {
    /// Parse an engine state string; never fails
    #[must_use]
    pub fn parse(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "created" => LiveStatus::Created,
            "running" => LiveStatus::Running,
            "paused" => LiveStatus::Paused,
            "restarting" => LiveStatus::Restarting,
            "removing" => LiveStatus::Removing,
            "exited" => LiveStatus::Exited,
            "dead" => LiveStatus::Dead,
            "stopped" => LiveStatus::Stopped,
            _ => LiveStatus::Other(state.to_string()),
        }
    }

    /// Engine spelling
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            LiveStatus::Created => "created",
            LiveStatus::Running => "running",
            LiveStatus::Paused => "paused",
            LiveStatus::Restarting => "restarting",
            LiveStatus::Removing => "removing",
            LiveStatus::Exited => "exited",
            LiveStatus::Dead => "dead",
            LiveStatus::Stopped => "stopped",
            LiveStatus::Other(s) => s,
        }
    }

    /// Shell service may be reachable
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, LiveStatus::Running)
    }

    /// Resource has halted
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, LiveStatus::Exited | LiveStatus::Stopped)
    }
}

impl fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one resource known to the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Engine ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Raw engine state
    pub state: String,
}

/// What to provision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// Image selector; the backend resolves it through its catalog
    pub scenario_type: String,
    /// Optional user script run after the shell service is up
    pub script: Option<String>,
    /// Port the shell service listens on inside the resource
    pub container_port: u16,
    /// Optional resource name
    pub name: Option<String>,
    /// Extra labels
    pub labels: HashMap<String, String>,
}

impl ProvisionRequest {
    /// New request for `scenario_type`
    #[must_use]
    pub fn new(scenario_type: impl Into<String>) -> Self {
        Self {
            scenario_type: scenario_type.into(),
            script: None,
            container_port: SHELL_PORT,
            name: None,
            labels: HashMap::new(),
        }
    }

    /// With user script (blank scripts are dropped)
    #[must_use]
    pub fn with_script(mut self, script: Option<String>) -> Self {
        self.script = script.filter(|s| !s.trim().is_empty());
        self
    }

    /// With resource name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With extra label
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Labels to attach, including the ownership markers
    #[must_use]
    pub fn all_labels(&self) -> HashMap<String, String> {
        let mut labels = self.labels.clone();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        labels.insert(SCENARIO_TYPE_LABEL.to_string(), self.scenario_type.clone());
        labels
    }
}

/// Result of a successful provision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Engine ID of the new resource
    pub container_id: String,
    /// Host port bound to the shell service
    pub host_port: u16,
}

/// Host-side address bound to a container port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddress {
    /// Bound host IP (may be a wildcard)
    pub host_ip: String,
    /// Bound host port
    pub host_port: u16,
}

impl HostAddress {
    /// `http://host:port`, replacing wildcard/empty IPs with `public_host`
    #[must_use]
    pub fn url(&self, public_host: &str) -> String {
        let host = match self.host_ip.as_str() {
            "" | "0.0.0.0" | "::" => public_host,
            ip => ip,
        };
        format!("http://{host}:{}", self.host_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_status_parse_is_total() {
        assert_eq!(LiveStatus::parse("running"), LiveStatus::Running);
        assert_eq!(LiveStatus::parse(" Exited "), LiveStatus::Exited);
        assert_eq!(
            LiveStatus::parse("hibernating"),
            LiveStatus::Other("hibernating".to_string())
        );
        assert_eq!(LiveStatus::parse("hibernating").as_str(), "hibernating");
    }

    #[test]
    fn only_exited_and_stopped_count_as_stopped() {
        assert!(LiveStatus::Exited.is_stopped());
        assert!(LiveStatus::Stopped.is_stopped());
        assert!(!LiveStatus::Paused.is_stopped());
        assert!(!LiveStatus::Dead.is_stopped());
    }

    #[test]
    fn blank_script_is_dropped() {
        let req = ProvisionRequest::new("go").with_script(Some("  ".into()));
        assert!(req.script.is_none());
    }

    #[test]
    fn labels_include_ownership_marker() {
        let labels = ProvisionRequest::new("k8s")
            .with_label("devlab.scenario_id", "scn-1")
            .all_labels();
        assert_eq!(labels.get(MANAGED_LABEL).map(String::as_str), Some("true"));
        assert_eq!(labels.get(SCENARIO_TYPE_LABEL).map(String::as_str), Some("k8s"));
        assert_eq!(labels.get("devlab.scenario_id").map(String::as_str), Some("scn-1"));
    }

    #[test]
    fn wildcard_host_ip_uses_public_host() {
        let addr = HostAddress {
            host_ip: "0.0.0.0".into(),
            host_port: 3004,
        };
        assert_eq!(addr.url("localhost"), "http://localhost:3004");

        let addr = HostAddress {
            host_ip: "10.0.0.5".into(),
            host_port: 3001,
        };
        assert_eq!(addr.url("localhost"), "http://10.0.0.5:3001");
    }
}
