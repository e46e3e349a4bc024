//! Email submission workflow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::cache::SubmissionCache;
use super::form::{FormSchema, FormSnapshot};
use super::ports::{FormTransport, Notifier, TokenProvider};
use crate::config::Messages;
use crate::error::SubmitError;

/// Default action name tokens are requested for.
pub const DEFAULT_CAPTCHA_ACTION: &str = "submit";

/// Successful end of a submission workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The form was sent and the email recorded
    Submitted,
    /// The email was sent recently; nothing went over the network
    AlreadySubmitted,
}

/// Result of one submission workflow.
pub type SubmitResult = std::result::Result<SubmitOutcome, SubmitError>;

/// Drives the email-capture workflow.
///
/// A page holds one controller. Entry is expected to be gated by a debouncer
/// (see [`CaptureForm`](super::CaptureForm)); on top of that the submission
/// cache is held under an async lock for the whole workflow, so concurrent
/// calls to [`submit`](Self::submit) run one after another.
pub struct SubmissionController {
    schema: FormSchema,
    cache: Mutex<SubmissionCache>,
    tokens: Arc<dyn TokenProvider>,
    transport: Arc<dyn FormTransport>,
    notifier: Arc<dyn Notifier>,
    captcha_action: String,
    messages: Messages,
    loading: AtomicBool,
}

impl SubmissionController {
    /// Create a new controller.
    pub fn new(
        schema: FormSchema,
        cache: SubmissionCache,
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn FormTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            schema,
            cache: Mutex::new(cache),
            tokens,
            transport,
            notifier,
            captcha_action: DEFAULT_CAPTCHA_ACTION.to_string(),
            messages: Messages::default(),
            loading: AtomicBool::new(false),
        }
    }

    /// Request tokens for a custom action name.
    pub fn with_captcha_action(mut self, action: impl Into<String>) -> Self {
        self.captcha_action = action.into();
        self
    }

    /// Use custom workflow-specific messages.
    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    /// Whether a submission is in progress.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Flag a submission as pending before it reaches the workflow.
    pub(crate) fn mark_loading(&self) {
        self.loading.store(true, Ordering::SeqCst);
    }

    /// Whether `email` has a record, live or not.
    pub async fn has_record(&self, email: &str) -> bool {
        self.cache.lock().await.has_record(email)
    }

    /// Whether `email` was submitted recently enough to suppress resubmission.
    pub async fn is_live(&self, email: &str) -> bool {
        self.cache.lock().await.is_live(email)
    }

    /// Run the submission workflow for a captured form.
    ///
    /// Every call ends with exactly one notification and the loading flag
    /// cleared.
    #[instrument(skip(self, snapshot))]
    pub async fn submit(&self, snapshot: FormSnapshot) -> SubmitResult {
        self.loading.store(true, Ordering::SeqCst);
        let result = self.run(&snapshot).await;
        self.loading.store(false, Ordering::SeqCst);

        match &result {
            Ok(SubmitOutcome::Submitted) => self.notifier.show_success(None),
            Ok(SubmitOutcome::AlreadySubmitted) => {
                self.notifier.show_success(Some(self.messages.already_submitted.as_str()))
            }
            Err(SubmitError::Validation(message)) => self.notifier.show_error(Some(message.as_str())),
            Err(_) => self.notifier.show_error(None),
        }

        result
    }

    async fn run(&self, snapshot: &FormSnapshot) -> SubmitResult {
        let email = snapshot
            .get(self.schema.email_field())
            .map(str::trim)
            .unwrap_or_default();
        if email.is_empty() {
            debug!("Rejected submission with blank email");
            return Err(SubmitError::Validation(self.messages.email_required.clone()));
        }

        // Held until the outcome is recorded.
        let mut cache = self.cache.lock().await;

        if cache.has_record(email) && cache.is_live(email) {
            info!(email = %email, "Email already submitted, skipping network");
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        let token = match self.tokens.token(&self.captcha_action).await {
            Some(token) if !token.is_empty() => token,
            _ => {
                warn!(action = %self.captcha_action, "No anti-abuse token issued");
                return Err(SubmitError::TokenUnavailable);
            }
        };

        let request = self.schema.build_request(snapshot, &token)?;

        match self.transport.send(&request).await {
            Ok(()) => {
                cache.record_submission(email);
                info!(email = %email, method = %request.method, url = %request.url, "Form submitted");
                Ok(SubmitOutcome::Submitted)
            }
            Err(e) => {
                warn!(email = %email, error = %e, "Form submission failed");
                Err(SubmitError::Transport(e.to_string()))
            }
        }
    }
}
