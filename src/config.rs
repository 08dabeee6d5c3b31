use crate::error::{ConnectorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Credential keys understood by `JiraServiceManagementConnector::load_credentials`
pub const BASE_URL_KEY: &str = "jira_base_url";
pub const API_TOKEN_KEY: &str = "jira_api_token";
pub const EMAIL_KEY: &str = "jira_email";
pub const PROJECT_KEY_KEY: &str = "jira_project_key";

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub jira: JiraConfig,
    #[serde(default)]
    pub connector: ConnectorSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub api_token: String,
    pub email: String,
    /// Project used when creating issues
    #[serde(default)]
    pub project_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectorSettings {
    /// Page size used when walking the search endpoint
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

const TEMPLATE: &str = r#"# jsm-connector Configuration File
# See: https://developer.atlassian.com/cloud/jira/service-desk/rest/ for API docs

[jira]
# Site URL, without the /rest/api/3 suffix
base_url = "https://your-company.atlassian.net"

# Create an API token: https://id.atlassian.com/manage-profile/security/api-tokens
api_token = "your_jira_api_token_here"
email = "your.email@example.com"

# Optional: project used by 'issue create'
# project_key = "HELP"

[connector]
# Number of tickets requested per page (default: 100)
batch_size = 100
"#;

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, applying environment overrides
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Err(ConnectorError::Config(format!(
                "Configuration file not found at {}. Run 'jsm-connector config init' to create one.",
                config_path.display()
            )));
        }

        let content = fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = env::var("HOME").map_err(|_| {
            ConnectorError::Config("HOME environment variable not set".to_string())
        })?;

        let config_dir = PathBuf::from(home).join(".config").join("jsm-connector");
        Ok(config_dir.join("config.toml"))
    }

    /// Create a template configuration file at the default location
    pub fn create_template() -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        Self::write_template(&config_path)?;
        Ok(config_path)
    }

    /// Write the template to `config_path`, refusing to overwrite
    pub fn write_template(config_path: &Path) -> Result<()> {
        if config_path.exists() {
            return Err(ConnectorError::Config(format!(
                "Configuration file already exists at {}",
                config_path.display()
            )));
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(config_path, TEMPLATE)?;

        // Set file permissions to 600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(config_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(config_path, perms)?;
        }

        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = env::var("JIRA_BASE_URL") {
            self.jira.base_url = base_url;
        }
        if let Ok(token) = env::var("JIRA_API_TOKEN") {
            self.jira.api_token = token;
        }
        if let Ok(email) = env::var("JIRA_EMAIL") {
            self.jira.email = email;
        }
        if let Ok(project_key) = env::var("JIRA_PROJECT_KEY") {
            self.jira.project_key = Some(project_key);
        }
        if let Ok(batch_size) = env::var("JSM_BATCH_SIZE") {
            if let Ok(size) = batch_size.parse() {
                self.connector.batch_size = size;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.jira.api_token.is_empty() || self.jira.api_token.contains("your_jira") {
            return Err(ConnectorError::Config(
                "Jira API token not configured. Please update your config file.".to_string(),
            ));
        }

        if self.jira.email.is_empty() || self.jira.email.contains("your.email") {
            return Err(ConnectorError::Config(
                "Jira account email not configured. Please update your config file.".to_string(),
            ));
        }

        if self.jira.base_url.is_empty() || self.jira.base_url.contains("your-company") {
            return Err(ConnectorError::Config(
                "Jira base URL not configured. Please update your config file.".to_string(),
            ));
        }

        if !self.jira.base_url.starts_with("http") {
            return Err(ConnectorError::Config(
                "Jira base URL must start with http:// or https://".to_string(),
            ));
        }

        if self.connector.batch_size == 0 {
            return Err(ConnectorError::Config(
                "connector.batch_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Credentials mapping handed to the connector
    pub fn credentials(&self) -> HashMap<String, String> {
        let mut credentials = HashMap::new();
        credentials.insert(BASE_URL_KEY.to_string(), self.jira.base_url.clone());
        credentials.insert(API_TOKEN_KEY.to_string(), self.jira.api_token.clone());
        credentials.insert(EMAIL_KEY.to_string(), self.jira.email.clone());
        if let Some(project_key) = &self.jira.project_key {
            credentials.insert(PROJECT_KEY_KEY.to_string(), project_key.clone());
        }
        credentials
    }

    /// Display current configuration (masking sensitive data)
    pub fn display(&self) {
        println!("Jira Configuration:");
        println!("  Base URL: {}", self.jira.base_url);
        println!("  Email: {}", self.jira.email);
        println!(
            "  API Token: {}***",
            &self.jira.api_token.chars().take(8).collect::<String>()
        );
        match &self.jira.project_key {
            Some(key) => println!("  Project Key: {}", key),
            None => println!("  Project Key: (not set)"),
        }

        println!("\nConnector Settings:");
        println!("  Batch size: {}", self.connector.batch_size);
    }
}
