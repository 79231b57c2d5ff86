//! Scenario type catalog
//!
//! Maps a scenario type to the image that backs it. Unknown types are not an
//! error: they fall back to the default image.

use serde::{Deserialize, Serialize};

/// Image used for unknown scenario types
pub const DEFAULT_IMAGE: &str = "devlab-go:latest";

/// Maturity tier of a scenario type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Maturity {
    /// Fully supported
    ProductionReady,
    /// Usable, limited coverage
    Beta,
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTypeInfo {
    /// Type name as requested by users
    #[serde(rename = "type")]
    pub name: String,
    /// Backing image
    pub image: String,
    /// Short description
    pub description: String,
    /// Tools preinstalled in the image
    pub tools: Vec<String>,
    /// Maturity tier
    pub status: Maturity,
    /// Boots k3s on startup
    #[serde(default)]
    pub kubernetes: bool,
}

impl ScenarioTypeInfo {
    fn builtin(
        name: &str,
        description: &str,
        tools: &[&str],
        status: Maturity,
        kubernetes: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            image: format!("devlab-{name}:latest"),
            description: description.to_string(),
            tools: tools.iter().map(|t| (*t).to_string()).collect(),
            status,
            kubernetes,
        }
    }
}

/// Scenario type → image mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCatalog {
    /// Image for unknown types
    pub default_image: String,
    /// Known types
    pub types: Vec<ScenarioTypeInfo>,
}

impl ImageCatalog {
    /// Look up a known type
    #[must_use]
    pub fn get(&self, scenario_type: &str) -> Option<&ScenarioTypeInfo> {
        self.types.iter().find(|t| t.name == scenario_type)
    }

    /// Image for `scenario_type`, falling back to the default
    #[must_use]
    pub fn image_for(&self, scenario_type: &str) -> &str {
        match self.get(scenario_type) {
            Some(info) => &info.image,
            None => {
                tracing::warn!(
                    scenario_type,
                    image = %self.default_image,
                    "unknown scenario type, using default image"
                );
                &self.default_image
            }
        }
    }

    /// Whether `scenario_type` boots k3s
    #[must_use]
    pub fn is_kubernetes(&self, scenario_type: &str) -> bool {
        self.get(scenario_type).is_some_and(|t| t.kubernetes)
    }

    /// With a different default image
    #[must_use]
    pub fn with_default_image(mut self, image: impl Into<String>) -> Self {
        self.default_image = image.into();
        self
    }
}

impl Default for ImageCatalog {
    fn default() -> Self {
        use Maturity::{Beta, ProductionReady};
        Self {
            default_image: DEFAULT_IMAGE.to_string(),
            types: vec![
                ScenarioTypeInfo::builtin(
                    "go",
                    "Go development environment with Go tools",
                    &["go", "git", "vim", "nano"],
                    ProductionReady,
                    false,
                ),
                ScenarioTypeInfo::builtin(
                    "docker",
                    "Docker-in-Docker environment for container development",
                    &["docker", "docker-compose"],
                    ProductionReady,
                    false,
                ),
                ScenarioTypeInfo::builtin(
                    "k8s",
                    "Kubernetes environment with kubectl and k3s",
                    &["kubectl", "k3s"],
                    ProductionReady,
                    true,
                ),
                ScenarioTypeInfo::builtin(
                    "python",
                    "Python development environment with Python tools",
                    &["python3", "pip", "flask"],
                    Beta,
                    false,
                ),
                ScenarioTypeInfo::builtin(
                    "go-k8s",
                    "Go development with Kubernetes tools",
                    &["go", "kubectl", "k3s"],
                    Beta,
                    true,
                ),
                ScenarioTypeInfo::builtin(
                    "python-k8s",
                    "Python development with Kubernetes tools",
                    &["python3", "kubectl", "k3s"],
                    Beta,
                    true,
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_map_to_their_images() {
        let catalog = ImageCatalog::default();
        assert_eq!(catalog.image_for("python"), "devlab-python:latest");
        assert_eq!(catalog.image_for("go-k8s"), "devlab-go-k8s:latest");
    }

    #[test]
    fn unknown_type_falls_back_to_default() {
        let catalog = ImageCatalog::default();
        assert_eq!(catalog.image_for("haskell"), DEFAULT_IMAGE);

        let catalog = catalog.with_default_image("golang:1.21");
        assert_eq!(catalog.image_for("haskell"), "golang:1.21");
    }

    #[test]
    fn kubernetes_flavours_request_k3s() {
        let catalog = ImageCatalog::default();
        assert!(catalog.is_kubernetes("k8s"));
        assert!(catalog.is_kubernetes("python-k8s"));
        assert!(!catalog.is_kubernetes("go"));
        assert!(!catalog.is_kubernetes("unknown"));
    }
}
