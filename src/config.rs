use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::FeishuError;
use crate::transport::retry::MAX_ATTEMPTS;
use crate::transport::RetryConfig;

pub const DEFAULT_OPEN_URL: &str = "https://open.feishu.cn";
pub const DEFAULT_HOST_URL: &str = "https://www.feishu.cn";
pub const DEFAULT_EMAIL_SUFFIX: &str = "@company.com";

/// Approval template used by one business workflow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkflowConfig {
    pub approval_code: String,
    /// Node that takes a designated approver, when the workflow has one.
    #[serde(default)]
    pub approver_node_id: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    pub app_id: String,
    pub app_secret: String,
    /// Base URL for auth, directory and message endpoints.
    pub open_url: String,
    /// Base URL for approval endpoints.
    pub host_url: String,
    /// Appended to a company account to form the bound e-mail address.
    pub email_suffix: String,
    pub retry: RetryConfig,
    pub workflows: HashMap<String, WorkflowConfig>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("open_url", &self.open_url)
            .field("host_url", &self.host_url)
            .field("email_suffix", &self.email_suffix)
            .field("retry", &self.retry)
            .field("workflows", &self.workflows)
            .finish()
    }
}

impl Config {
    /// Config with every endpoint on one host and default policies.
    pub fn for_host(base_url: &str, app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            open_url: base.clone(),
            host_url: base,
            email_suffix: DEFAULT_EMAIL_SUFFIX.to_string(),
            retry: RetryConfig::default(),
            workflows: HashMap::new(),
        }
    }

    pub fn open_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.open_url.trim_end_matches('/'), path)
    }

    pub fn approval_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.host_url.trim_end_matches('/'), path)
    }

    pub fn workflow(&self, name: &str) -> Result<&WorkflowConfig, FeishuError> {
        self.workflows
            .get(name)
            .ok_or_else(|| FeishuError::Config(format!("unknown workflow '{}'", name)))
    }
}

pub fn load() -> Result<Config, FeishuError> {
    dotenvy::dotenv().ok();

    let app_id = required("FEISHU_APP_ID")?;
    let app_secret = required("FEISHU_APP_SECRET")?;

    let workflows = match std::env::var("FEISHU_WORKFLOWS_FILE") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| FeishuError::Config(format!("cannot read {}: {}", path, e)))?;
            parse_workflows(&raw)?
        }
        Err(_) => HashMap::new(),
    };

    Ok(Config {
        app_id,
        app_secret,
        open_url: base_url("FEISHU_OPEN_URL", DEFAULT_OPEN_URL)?,
        host_url: base_url("FEISHU_HOST_URL", DEFAULT_HOST_URL)?,
        email_suffix: std::env::var("FEISHU_EMAIL_SUFFIX").unwrap_or_else(|_| DEFAULT_EMAIL_SUFFIX.into()),
        retry: RetryConfig {
            max_attempts: attempt_budget(parsed("FEISHU_HTTP_ATTEMPTS", MAX_ATTEMPTS)?)?,
            timeout_ms: parsed("FEISHU_HTTP_TIMEOUT_MS", 5_000)?,
            backoff_ms: parsed("FEISHU_HTTP_BACKOFF_MS", 1_000)?,
        },
        workflows,
    })
}

/// Parse a YAML map of workflow name to template settings.
pub fn parse_workflows(raw: &str) -> Result<HashMap<String, WorkflowConfig>, FeishuError> {
    let workflows: HashMap<String, WorkflowConfig> = serde_yaml::from_str(raw)
        .map_err(|e| FeishuError::Config(format!("invalid workflows file: {}", e)))?;

    if let Some((name, _)) = workflows.iter().find(|(_, wf)| wf.approval_code.trim().is_empty()) {
        return Err(FeishuError::Config(format!("workflow '{}' has an empty approval_code", name)));
    }
    Ok(workflows)
}

fn required(key: &str) -> Result<String, FeishuError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(FeishuError::Config(format!("{} must be set", key))),
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, FeishuError> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| FeishuError::Config(format!("{} is not a valid number: {}", key, v))),
        Err(_) => Ok(default),
    }
}

fn attempt_budget(attempts: u32) -> Result<u32, FeishuError> {
    if (1..=MAX_ATTEMPTS).contains(&attempts) {
        Ok(attempts)
    } else {
        Err(FeishuError::Config(format!(
            "FEISHU_HTTP_ATTEMPTS must be between 1 and {}, got {}",
            MAX_ATTEMPTS, attempts
        )))
    }
}

fn base_url(key: &str, default: &str) -> Result<String, FeishuError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.into());
    validate_base_url(key, &raw)
}

fn validate_base_url(key: &str, raw: &str) -> Result<String, FeishuError> {
    let parsed = url::Url::parse(raw).map_err(|e| FeishuError::Config(format!("{} is not a URL: {}", key, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FeishuError::Config(format!("{} must be an http(s) URL", key)));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
