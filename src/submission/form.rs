//! Form schema and captured form values.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::config::FormConfig;
use crate::error::{LeadformError, Result, SubmitError};

/// HTTP method a form submits with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMethod {
    /// Fields sent as a multipart body
    #[default]
    Post,
    /// Fields sent as query parameters
    Get,
}

impl fmt::Display for FormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormMethod::Post => write!(f, "POST"),
            FormMethod::Get => write!(f, "GET"),
        }
    }
}

/// The validated, fixed shape of the capture form.
///
/// Every submission sends exactly `fields`, in order. Values come from the
/// submitted snapshot, falling back to the configured presets; the token
/// field is always filled by the controller.
#[derive(Debug, Clone)]
pub struct FormSchema {
    method: FormMethod,
    action: String,
    fields: Vec<String>,
    email_field: String,
    token_field: String,
    presets: BTreeMap<String, String>,
}

impl FormSchema {
    /// Build and validate a schema from configuration.
    pub fn from_config(config: &FormConfig) -> Result<Self> {
        let schema = Self {
            method: config.method,
            action: config.action.clone(),
            fields: config.fields.clone(),
            email_field: config.email_field.clone(),
            token_field: config.token_field.clone(),
            presets: config.presets.clone(),
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.action)
            .map_err(|e| LeadformError::Schema(format!("invalid action URL '{}': {}", self.action, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LeadformError::Schema(format!(
                "action URL must be http(s), got '{}'",
                url.scheme()
            )));
        }

        if self.fields.is_empty() {
            return Err(LeadformError::Schema("form has no fields".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.trim().is_empty() {
                return Err(LeadformError::Schema("field names must not be blank".to_string()));
            }
            if !seen.insert(field.as_str()) {
                return Err(LeadformError::Schema(format!("duplicate field '{}'", field)));
            }
        }

        if self.email_field == self.token_field {
            return Err(LeadformError::Schema(
                "email and token fields must differ".to_string(),
            ));
        }
        for (role, name) in [("email", &self.email_field), ("token", &self.token_field)] {
            if !seen.contains(name.as_str()) {
                return Err(LeadformError::Schema(format!(
                    "{} field '{}' is not in the field list",
                    role, name
                )));
            }
        }

        for name in self.presets.keys() {
            if !seen.contains(name.as_str()) {
                return Err(LeadformError::Schema(format!(
                    "preset for unknown field '{}'",
                    name
                )));
            }
            if *name == self.token_field {
                return Err(LeadformError::Schema(format!(
                    "token field '{}' cannot have a preset",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Get the submission method.
    pub fn method(&self) -> FormMethod {
        self.method
    }

    /// Get the submission target URL.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Get the ordered field names.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Get the name of the email field.
    pub fn email_field(&self) -> &str {
        &self.email_field
    }

    /// Get the name of the token field.
    pub fn token_field(&self) -> &str {
        &self.token_field
    }

    /// Assemble the outgoing request for `snapshot`, carrying `token`.
    pub fn build_request(
        &self,
        snapshot: &FormSnapshot,
        token: &str,
    ) -> std::result::Result<FormRequest, SubmitError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for name in &self.fields {
            let value = if *name == self.token_field {
                token
            } else if let Some(value) = snapshot.get(name).or_else(|| self.presets.get(name).map(String::as_str)) {
                value
            } else {
                return Err(SubmitError::Validation(format!(
                    "missing value for field '{}'",
                    name
                )));
            };
            fields.push((name.clone(), value.to_string()));
        }

        Ok(FormRequest {
            method: self.method,
            url: self.action.clone(),
            fields,
        })
    }
}

/// Field values captured at submit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    values: BTreeMap<String, String>,
}

impl FormSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a field value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for FormSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (name, value) in iter {
            snapshot.set(name, value);
        }
        snapshot
    }
}

/// A fully assembled outgoing submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRequest {
    /// HTTP method
    pub method: FormMethod,
    /// Target URL
    pub url: String,
    /// Field name/value pairs in schema order
    pub fields: Vec<(String, String)>,
}

impl FormRequest {
    /// Get the value sent for a field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}
