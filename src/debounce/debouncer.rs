//! Debounced action wrapper.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::window::{Window, WindowState};

type Action<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, T> + Send + Sync>;

/// Collapses bursts of calls to an async action.
///
/// The first call in an idle window executes immediately and opens a window
/// of length `delay`. Any call arriving while the window is open cancels the
/// pending timer and schedules a single deferred execution `delay` after
/// itself, with its own arguments. A burst therefore yields exactly one
/// immediate and one trailing execution.
///
/// Futures of superseded calls resolve with the result of the deferred
/// execution that replaced them.
///
/// One debouncer is meant to guard one entry point; clones share the same
/// window.
pub struct Debouncer<A, T> {
    inner: Arc<Inner<A, T>>,
}

struct Inner<A, T> {
    action: Action<A, T>,
    delay: Duration,
    window: Mutex<Window<T>>,
}

impl<A, T> Clone for Debouncer<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T> Debouncer<A, T>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
{
    /// Wrap `action` with a debounce window of `delay`.
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let action: Action<A, T> = Arc::new(move |args| action(args).boxed());
        Self {
            inner: Arc::new(Inner {
                action,
                delay,
                window: Mutex::new(Window::new()),
            }),
        }
    }

    /// Wrap `action` bound to `context`.
    ///
    /// The context is captured here, at wrap time, and handed to every
    /// execution regardless of who calls the debouncer.
    pub fn bound<C, F, Fut>(context: C, delay: Duration, action: F) -> Self
    where
        C: Clone + Send + Sync + 'static,
        F: Fn(C, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::new(delay, move |args| action(context.clone(), args))
    }

    /// Get the window length.
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Get the current window phase.
    pub fn state(&self) -> WindowState {
        self.inner.window.lock().state()
    }

    /// Invoke the debounced action.
    ///
    /// Must be called from within a tokio runtime. The returned future
    /// resolves to `None` only if the execution it waits on was dropped,
    /// which happens when the runtime shuts down or the action panics.
    pub fn call(&self, args: A) -> impl Future<Output = Option<T>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let mut window = self.inner.window.lock();

        if window.is_busy() {
            let epoch = window.supersede(tx);
            let timer = tokio::spawn(Self::run_deferred(Arc::clone(&self.inner), epoch, args));
            window.set_timer(timer);
            debug!(
                delay_ms = self.inner.delay.as_millis() as u64,
                "Call superseded pending execution, rescheduled"
            );
        } else {
            let epoch = window.open();
            let timer = tokio::spawn(Self::close_after_delay(Arc::clone(&self.inner), epoch));
            window.set_timer(timer);
            drop(window);

            trace!("Window idle, executing immediately");
            let execution = (self.inner.action)(args);
            tokio::spawn(async move {
                let _ = tx.send(execution.await);
            });
        }

        async move { rx.await.ok() }
    }

    async fn close_after_delay(inner: Arc<Inner<A, T>>, epoch: u64) {
        tokio::time::sleep(inner.delay).await;
        if inner.window.lock().close_if_unchanged(epoch) {
            trace!("Window elapsed without further calls");
        }
    }

    async fn run_deferred(inner: Arc<Inner<A, T>>, epoch: u64, args: A) {
        tokio::time::sleep(inner.delay).await;

        let Some(waiters) = inner.window.lock().take_for_deferred(epoch) else {
            return;
        };

        debug!(waiters = waiters.len(), "Running deferred execution");
        let output = (inner.action)(args).await;
        for waiter in waiters {
            let _ = waiter.send(output.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DELAY: Duration = Duration::from_millis(1000);

    fn recording_debouncer() -> (Debouncer<u32, u32>, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let debouncer = Debouncer::new(DELAY, move |n: u32| {
            log.lock().push(n);
            async move { n * 10 }
        });
        (debouncer, seen)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_executes_immediately() {
        let (debouncer, seen) = recording_debouncer();
        assert_eq!(debouncer.delay(), DELAY);

        let result = debouncer.call(1);
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(debouncer.state(), WindowState::Open);

        assert_eq!(result.await, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_yields_one_immediate_and_one_deferred() {
        let (debouncer, seen) = recording_debouncer();

        let first = debouncer.call(1);
        sleep_ms(100).await;
        let second = debouncer.call(2);
        sleep_ms(100).await;
        let third = debouncer.call(3);

        // Deferred execution is due 1000ms after the last call, at t=1200.
        sleep_ms(900).await;
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(debouncer.state(), WindowState::Superseded);

        sleep_ms(150).await;
        assert_eq!(*seen.lock(), vec![1, 3]);
        assert_eq!(debouncer.state(), WindowState::Idle);

        assert_eq!(first.await, Some(10));
        assert_eq!(second.await, Some(30));
        assert_eq!(third.await, Some(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_execute_immediately() {
        let (debouncer, seen) = recording_debouncer();

        for n in 1..=3 {
            assert_eq!(debouncer.call(n).await, Some(n * 10));
            sleep_ms(1500).await;
        }

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_window_does_not_close_early() {
        let (debouncer, seen) = recording_debouncer();

        let _ = debouncer.call(1);
        sleep_ms(900).await;
        let _ = debouncer.call(2);

        // The first window would have elapsed at t=1000.
        sleep_ms(200).await;
        assert_eq!(debouncer.state(), WindowState::Superseded);
        assert_eq!(*seen.lock(), vec![1]);

        sleep_ms(1000).await;
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_call_after_deferred_is_immediate() {
        let (debouncer, seen) = recording_debouncer();

        let _ = debouncer.call(1);
        let _ = debouncer.call(2);
        sleep_ms(1100).await;
        assert_eq!(*seen.lock(), vec![1, 2]);

        let result = debouncer.call(3);
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert_eq!(result.await, Some(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_context_is_captured_at_wrap_time() {
        let context = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::bound(Arc::clone(&context), DELAY, |ctx: Arc<AtomicUsize>, n: usize| {
            let total = ctx.fetch_add(n, Ordering::SeqCst) + n;
            async move { total }
        });

        assert_eq!(debouncer.call(5).await, Some(5));
        sleep_ms(1500).await;
        assert_eq!(debouncer.call(2).await, Some(7));
        assert_eq!(context.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_window() {
        let (debouncer, seen) = recording_debouncer();
        let other = debouncer.clone();

        let _ = debouncer.call(1);
        let pending = other.call(2);
        assert_eq!(*seen.lock(), vec![1]);

        assert_eq!(pending.await, Some(20));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }
}
