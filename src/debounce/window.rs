//! Debounce window state.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Observable phase of a debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    /// No window is open; the next call executes immediately
    Idle,
    /// A call executed immediately and the window has not elapsed yet
    Open,
    /// A newer call arrived while the window was open; a deferred
    /// execution is scheduled
    Superseded,
}

/// Mutable state of one debounce window.
///
/// The window owns at most one timer task at a time. Replacing the timer
/// aborts the previous task and bumps the epoch, so a task that already woke
/// up before being aborted can tell it is stale.
pub(crate) struct Window<T> {
    /// Whether a window is currently open
    busy: bool,
    /// Whether a newer call arrived since the window opened
    superseded: bool,
    /// The window-close or deferred-execution task
    timer: Option<JoinHandle<()>>,
    /// Incremented every time the timer is replaced
    epoch: u64,
    /// Result channels of calls waiting on the deferred execution
    waiters: Vec<oneshot::Sender<T>>,
}

impl<T> Window<T> {
    pub(crate) fn new() -> Self {
        Self {
            busy: false,
            superseded: false,
            timer: None,
            epoch: 0,
            waiters: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> WindowState {
        match (self.busy, self.superseded) {
            (false, _) => WindowState::Idle,
            (true, false) => WindowState::Open,
            (true, true) => WindowState::Superseded,
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy
    }

    /// Open a fresh window. Returns the epoch the close timer must carry.
    pub(crate) fn open(&mut self) -> u64 {
        self.busy = true;
        self.superseded = false;
        self.next_epoch()
    }

    /// Mark the window superseded and park the caller's result channel.
    /// Returns the epoch the deferred execution must carry.
    pub(crate) fn supersede(&mut self, waiter: oneshot::Sender<T>) -> u64 {
        self.superseded = true;
        self.waiters.push(waiter);
        self.next_epoch()
    }

    /// Install the timer task for the current epoch.
    pub(crate) fn set_timer(&mut self, timer: JoinHandle<()>) {
        self.timer = Some(timer);
    }

    /// Close the window if `epoch` is still current and no call superseded it.
    ///
    /// Returns `true` if the window was closed.
    pub(crate) fn close_if_unchanged(&mut self, epoch: u64) -> bool {
        if self.epoch != epoch || self.superseded {
            return false;
        }
        self.reset();
        true
    }

    /// Close the window on behalf of the deferred execution of `epoch`.
    ///
    /// Returns the parked result channels, or `None` if the execution was
    /// superseded in the meantime.
    pub(crate) fn take_for_deferred(&mut self, epoch: u64) -> Option<Vec<oneshot::Sender<T>>> {
        if self.epoch != epoch {
            return None;
        }
        self.reset();
        Some(std::mem::take(&mut self.waiters))
    }

    fn next_epoch(&mut self) -> u64 {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    fn reset(&mut self) {
        self.busy = false;
        self.superseded = false;
        // The running task is the timer itself; dropping the handle detaches it.
        self.timer = None;
    }
}
