//! Email capture workflow and its local duplicate cache.

mod cache;
mod capture;
mod controller;
mod form;
pub mod ports;

pub use cache::{decode, encode, SubmissionCache, SubmissionRecord, DEFAULT_STORAGE_KEY};
pub use capture::{CaptureForm, DEFAULT_SUBMIT_DEBOUNCE};
pub use controller::{SubmissionController, SubmitOutcome, SubmitResult, DEFAULT_CAPTCHA_ACTION};
pub use form::{FormMethod, FormRequest, FormSchema, FormSnapshot};
