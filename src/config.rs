use crate::core::path;
use crate::core::{RecorderError, Result};
use serde::{Deserialize, Serialize};

/// Where the recorder keeps its data on the remote store.
///
/// Loadable from JSON (every field optional) or built with the setters:
///
/// ```
/// use bp_recorder::RecorderConfig;
///
/// let config = RecorderConfig::default()
///     .app_name("BPR-Test")
///     .app_info("integration run");
/// assert_eq!(config.container_path(), "/Root/Content/Apps/BPR-Test");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Workspace that receives the allowed-child-type grants
    pub workspace_path: String,

    /// Folder holding application containers
    pub apps_path: String,

    /// Content name of the application container
    pub app_name: String,

    /// Title stored on the container
    pub display_name: String,

    /// Free-form description stored on the container
    pub app_info: Option<String>,

    /// Schema folder of `GenericContent`, the root of all installed types
    pub schema_root: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            workspace_path: "/Root/Content".to_string(),
            apps_path: "/Root/Content/Apps".to_string(),
            app_name: "BPR-V0_1".to_string(),
            display_name: "Blood Pressure Recorder".to_string(),
            app_info: None,
            schema_root: "/Root/System/Schema/ContentTypes/GenericContent".to_string(),
        }
    }
}

impl RecorderConfig {
    pub fn new(app_name: &str) -> Self {
        Self::default().app_name(app_name)
    }

    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RecorderError::Config(format!("Invalid recorder config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn workspace_path(mut self, path: &str) -> Self {
        self.workspace_path = path.to_string();
        self
    }

    pub fn apps_path(mut self, path: &str) -> Self {
        self.apps_path = path.to_string();
        self
    }

    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = name.to_string();
        self
    }

    pub fn display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    pub fn app_info(mut self, info: &str) -> Self {
        self.app_info = Some(info.to_string());
        self
    }

    pub fn schema_root(mut self, path: &str) -> Self {
        self.schema_root = path.to_string();
        self
    }

    pub fn container_path(&self) -> String {
        path::join(&self.apps_path, &self.app_name)
    }

    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("workspace_path", &self.workspace_path),
            ("apps_path", &self.apps_path),
            ("schema_root", &self.schema_root),
        ] {
            path::validate(value)
                .map_err(|e| RecorderError::Config(format!("{label}: {e}")))?;
        }
        path::validate_name(&self.app_name)
            .map_err(|e| RecorderError::Config(format!("app_name: {e}")))?;

        if !path::is_in_tree(&self.apps_path, &self.workspace_path) {
            return Err(RecorderError::Config(format!(
                "apps_path '{}' is outside workspace '{}'",
                self.apps_path, self.workspace_path
            )));
        }
        Ok(())
    }
}
