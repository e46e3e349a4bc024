//! Configuration management for Leadform.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LeadformError, Result};
use crate::submission::FormMethod;

/// Main configuration for the Leadform form controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadformConfig {
    /// Form schema configuration
    #[serde(default)]
    pub form: FormConfig,

    /// Submission workflow configuration
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Anti-abuse token provider configuration
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Local persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// User-facing notification messages
    #[serde(default)]
    pub messages: Messages,

    /// Outbound HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,
}

/// Form schema configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    /// HTTP method used for the submission
    #[serde(default)]
    pub method: FormMethod,

    /// Target URL of the submission
    #[serde(default = "default_action")]
    pub action: String,

    /// Ordered list of field names sent with every submission
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    /// Name of the field carrying the email address
    #[serde(default = "default_email_field")]
    pub email_field: String,

    /// Name of the field the anti-abuse token is written into
    #[serde(default = "default_token_field")]
    pub token_field: String,

    /// Fixed values for fields the user never fills in
    #[serde(default)]
    pub presets: BTreeMap<String, String>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            method: FormMethod::default(),
            action: default_action(),
            fields: default_fields(),
            email_field: default_email_field(),
            token_field: default_token_field(),
            presets: BTreeMap::new(),
        }
    }
}

fn default_action() -> String {
    "http://127.0.0.1:8080/subscribe".to_string()
}

fn default_fields() -> Vec<String> {
    vec![default_email_field(), default_token_field()]
}

fn default_email_field() -> String {
    "email".to_string()
}

fn default_token_field() -> String {
    "g-recaptcha-response".to_string()
}

/// Submission workflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Debounce window on the submit entry point, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long a submitted email suppresses resubmission, in seconds
    #[serde(default = "default_record_ttl")]
    pub record_ttl_secs: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            record_ttl_secs: default_record_ttl(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    3000
}

fn default_record_ttl() -> u64 {
    2 * 60 * 60
}

/// Upper bound on `record_ttl_secs`, one hundred years.
pub const MAX_RECORD_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Anti-abuse token provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    /// Public site key sent with every token request
    #[serde(default)]
    pub site_key: String,

    /// Action name tokens are requested for
    #[serde(default = "default_captcha_action")]
    pub action: String,

    /// Provider script loaded once before the first token request
    #[serde(default = "default_script_url")]
    pub script_url: String,

    /// Endpoint that issues tokens
    pub execute_url: Option<String>,

    /// Fixed token, bypasses the provider entirely
    pub static_token: Option<String>,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            site_key: String::new(),
            action: default_captcha_action(),
            script_url: default_script_url(),
            execute_url: None,
            static_token: None,
        }
    }
}

fn default_captcha_action() -> String {
    "submit".to_string()
}

fn default_script_url() -> String {
    "https://www.google.com/recaptcha/api.js".to_string()
}

/// Local persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON file backing the key-value store
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Key the submission records are stored under
    #[serde(default = "default_storage_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            key: default_storage_key(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("leadform-storage.json")
}

fn default_storage_key() -> String {
    "emails".to_string()
}

/// User-facing notification messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    /// Shown after a successful submission
    #[serde(default = "default_success_message")]
    pub success: String,

    /// Shown when a submission fails without a more specific message
    #[serde(default = "default_error_message")]
    pub error: String,

    /// Shown when the email field is blank
    #[serde(default = "default_email_required_message")]
    pub email_required: String,

    /// Shown when the email was already submitted recently
    #[serde(default = "default_already_submitted_message")]
    pub already_submitted: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            success: default_success_message(),
            error: default_error_message(),
            email_required: default_email_required_message(),
            already_submitted: default_already_submitted_message(),
        }
    }
}

fn default_success_message() -> String {
    "Email sent successfully".to_string()
}

fn default_error_message() -> String {
    "Something went wrong, please try again later".to_string()
}

fn default_email_required_message() -> String {
    "Please enter your email".to_string()
}

fn default_already_submitted_message() -> String {
    "Your request has already been sent!".to_string()
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds; transport defaults apply when unset
    pub timeout_secs: Option<u64>,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("leadform/{}", env!("CARGO_PKG_VERSION"))
}

impl LeadformConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| LeadformError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional YAML file, then apply
    /// `LEADFORM_*` environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        EnvOverrides::collect()?.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Debounce window on the submit entry point.
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.submission.debounce_ms)
    }

    /// Liveness window of a submission record.
    pub fn record_ttl(&self) -> Result<chrono::Duration> {
        let secs = self.submission.record_ttl_secs;
        if secs == 0 || secs > MAX_RECORD_TTL_SECS {
            return Err(LeadformError::Config(format!(
                "submission.record_ttl_secs must be between 1 and {}, got {}",
                MAX_RECORD_TTL_SECS, secs
            )));
        }
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                LeadformError::Config(format!("submission.record_ttl_secs out of range: {}", secs))
            })
    }

    /// Check settings that serde cannot constrain on its own.
    pub fn validate(&self) -> Result<()> {
        self.record_ttl().map(|_| ())
    }
}

/// Scalar settings that can be overridden from the environment, e.g.
/// `LEADFORM_CAPTCHA_STATIC_TOKEN` or `LEADFORM_SUBMISSION_DEBOUNCE_MS`.
///
/// Environment keys are case-folded, so field-name maps such as form presets
/// are only read from the file.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    form_action: Option<String>,
    form_method: Option<FormMethod>,
    submission_debounce_ms: Option<u64>,
    submission_record_ttl_secs: Option<u64>,
    captcha_site_key: Option<String>,
    captcha_action: Option<String>,
    captcha_execute_url: Option<String>,
    captcha_static_token: Option<String>,
    storage_path: Option<PathBuf>,
    storage_key: Option<String>,
    http_timeout_secs: Option<u64>,
}

impl EnvOverrides {
    fn collect() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("LEADFORM"))
    }

    fn from_source(source: config::Environment) -> Result<Self> {
        config::Config::builder()
            .add_source(source.prefix_separator("_").try_parsing(true))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| LeadformError::Config(e.to_string()))
    }

    fn apply(self, config: &mut LeadformConfig) {
        if let Some(action) = self.form_action {
            config.form.action = action;
        }
        if let Some(method) = self.form_method {
            config.form.method = method;
        }
        if let Some(ms) = self.submission_debounce_ms {
            config.submission.debounce_ms = ms;
        }
        if let Some(secs) = self.submission_record_ttl_secs {
            config.submission.record_ttl_secs = secs;
        }
        if let Some(site_key) = self.captcha_site_key {
            config.captcha.site_key = site_key;
        }
        if let Some(action) = self.captcha_action {
            config.captcha.action = action;
        }
        if self.captcha_execute_url.is_some() {
            config.captcha.execute_url = self.captcha_execute_url;
        }
        if self.captcha_static_token.is_some() {
            config.captcha.static_token = self.captcha_static_token;
        }
        if let Some(path) = self.storage_path {
            config.storage.path = path;
        }
        if let Some(key) = self.storage_key {
            config.storage.key = key;
        }
        if self.http_timeout_secs.is_some() {
            config.http.timeout_secs = self.http_timeout_secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LeadformConfig::default();

        assert_eq!(config.debounce_delay(), Duration::from_millis(3000));
        assert_eq!(config.record_ttl().unwrap(), chrono::Duration::hours(2));
        assert_eq!(config.form.method, FormMethod::Post);
        assert_eq!(config.form.fields, vec!["email", "g-recaptcha-response"]);
        assert_eq!(config.storage.key, "emails");
        assert!(config.captcha.static_token.is_none());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
form:
  action: https://example.com/lead
  fields: [name, email, g-recaptcha-response]
  presets:
    name: Landing
submission:
  debounce_ms: 500
messages:
  success: Thanks!
"#;
        let config = LeadformConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.form.action, "https://example.com/lead");
        assert_eq!(config.form.fields.len(), 3);
        assert_eq!(config.form.presets.get("name").map(String::as_str), Some("Landing"));
        assert_eq!(config.form.email_field, "email");
        assert_eq!(config.debounce_delay(), Duration::from_millis(500));
        assert_eq!(config.submission.record_ttl_secs, 7200);
        assert_eq!(config.messages.success, "Thanks!");
        assert_eq!(config.messages.error, default_error_message());
    }

    #[test]
    fn test_from_yaml_invalid() {
        let result = LeadformConfig::from_yaml("submission: [not, a, map]");
        assert!(matches!(result, Err(LeadformError::Config(_))));
    }

    #[test]
    fn test_record_ttl_out_of_range_is_rejected() {
        for ttl in ["0", "10000000000000", "18446744073709551615"] {
            let yaml = format!("submission:\n  record_ttl_secs: {}\n", ttl);
            let result = LeadformConfig::from_yaml(&yaml);
            assert!(matches!(result, Err(LeadformError::Config(_))), "ttl {}", ttl);
        }

        let mut config = LeadformConfig::default();
        config.submission.record_ttl_secs = MAX_RECORD_TTL_SECS;
        assert!(config.validate().is_ok());
        config.submission.record_ttl_secs = MAX_RECORD_TTL_SECS + 1;
        assert!(config.record_ttl().is_err());
    }

    #[test]
    fn test_load_rejects_out_of_range_env_ttl() {
        let mut config = LeadformConfig::default();
        let vars = [("LEADFORM_SUBMISSION_RECORD_TTL_SECS".to_string(), "0".to_string())]
            .into_iter()
            .collect::<std::collections::HashMap<_, _>>();
        let source = config::Environment::with_prefix("LEADFORM").source(Some(vars));

        EnvOverrides::from_source(source).unwrap().apply(&mut config);
        assert!(matches!(config.validate(), Err(LeadformError::Config(_))));
    }

    #[test]
    fn test_example_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/leadform.example.yaml");
        let config = LeadformConfig::from_file(path).unwrap();

        assert_eq!(config.form.fields.len(), 7);
        assert_eq!(config.form.presets.len(), 5);
        assert_eq!(config.http.timeout_secs, Some(10));
        crate::submission::FormSchema::from_config(&config.form).unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let vars = [
            ("LEADFORM_SUBMISSION_DEBOUNCE_MS", "250"),
            ("LEADFORM_CAPTCHA_STATIC_TOKEN", "local"),
            ("LEADFORM_FORM_METHOD", "get"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<std::collections::HashMap<_, _>>();
        let source = config::Environment::with_prefix("LEADFORM").source(Some(vars));

        let mut config = LeadformConfig::default();
        EnvOverrides::from_source(source).unwrap().apply(&mut config);

        assert_eq!(config.submission.debounce_ms, 250);
        assert_eq!(config.captcha.static_token.as_deref(), Some("local"));
        assert_eq!(config.form.method, FormMethod::Get);
        assert_eq!(config.storage.key, "emails");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadform.yaml");
        std::fs::write(&path, "form:\n  method: get\nstorage:\n  key: leads\n").unwrap();

        let config = LeadformConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.form.method, FormMethod::Get);
        assert_eq!(config.storage.key, "leads");
        assert_eq!(config.submission.debounce_ms, 3000);
    }
}
