//! Debounced submit entry point.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::controller::{SubmissionController, SubmitResult};
use super::form::FormSnapshot;
use crate::debounce::{Debouncer, WindowState};

/// Default debounce window on the submit entry point.
pub const DEFAULT_SUBMIT_DEBOUNCE: Duration = Duration::from_millis(3000);

/// The capture form: a controller behind a debounced submit handler.
pub struct CaptureForm {
    controller: Arc<SubmissionController>,
    debouncer: Debouncer<FormSnapshot, SubmitResult>,
}

impl CaptureForm {
    /// Gate `controller` behind a debounce window of `delay`.
    pub fn new(controller: Arc<SubmissionController>, delay: Duration) -> Self {
        let debouncer = Debouncer::bound(
            Arc::clone(&controller),
            delay,
            |controller: Arc<SubmissionController>, snapshot: FormSnapshot| async move {
                controller.submit(snapshot).await
            },
        );

        Self {
            controller,
            debouncer,
        }
    }

    /// Handle a submit event.
    ///
    /// The controller is flagged as loading right away. The returned future
    /// resolves once the execution this event ends up part of has finished;
    /// events swallowed by a burst resolve with the trailing execution's
    /// result.
    pub fn on_submit(
        &self,
        snapshot: FormSnapshot,
    ) -> impl Future<Output = Option<SubmitResult>> + Send + 'static {
        trace!(window = ?self.debouncer.state(), "Submit event");
        self.controller.mark_loading();
        self.debouncer.call(snapshot)
    }

    /// Get the controller.
    pub fn controller(&self) -> &Arc<SubmissionController> {
        &self.controller
    }

    /// Get the current debounce window phase.
    pub fn window_state(&self) -> WindowState {
        self.debouncer.state()
    }
}
