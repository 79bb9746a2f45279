//! Pollable
//!
//! Periodic background re-submission of a poll remediation, e.g. while the
//! user clicks an email magic link or approves a push notification.
//!
//! Each pollable owns at most one timer task. Clones share it, so the copy
//! in a caller's response and the copy the flow keeps control the same
//! timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{FlowError, IdxResult, ProtocolError};
use crate::model::{Remediation, RemediationHandler, Response};

#[derive(Default)]
struct PollState {
    task: Mutex<Option<JoinHandle<()>>>,
    in_flight: Arc<AtomicBool>,
}

/// Background polling of one remediation.
#[derive(Clone)]
pub struct Pollable {
    remediation: Remediation,
    interval: Duration,
    state: Arc<PollState>,
}

impl Pollable {
    pub fn new(remediation: Remediation, interval: Duration) -> Self {
        Self {
            remediation,
            interval,
            state: Arc::new(PollState::default()),
        }
    }

    pub fn remediation(&self) -> &Remediation {
        &self.remediation
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a timer task is active.
    pub fn is_polling(&self) -> bool {
        self.lock_task()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Start the timer. A no-op when already polling.
    ///
    /// Polling ends by itself once a poll returns a response without this
    /// remediation; that response is handed to the flow.
    pub fn start_polling(&self) -> IdxResult<()> {
        let mut task = self.lock_task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ProtocolError::InternalError {
                message: "polling requires a tokio runtime".to_string(),
            }
        })?;
        let handler = self
            .remediation
            .weak_handler()
            .ok_or(FlowError::NotAuthenticating)?;

        debug!(
            remediation = %self.remediation.name,
            interval_ms = self.interval.as_millis() as u64,
            "Starting poll"
        );

        *task = Some(runtime.spawn(poll_loop(
            self.remediation.clone(),
            self.interval,
            handler,
            self.state.in_flight.clone(),
        )));
        Ok(())
    }

    /// Stop the timer. A no-op when not polling.
    pub fn stop_polling(&self) {
        if let Some(handle) = self.lock_task().take() {
            if !handle.is_finished() {
                debug!(remediation = %self.remediation.name, "Stopping poll");
            }
            handle.abort();
        }
    }

    /// Poll once right now without changing flow state.
    ///
    /// Fails with `OperationInProgress` while another poll of this
    /// capability is outstanding.
    pub async fn poll_once(&self) -> IdxResult<Response> {
        let handler = self
            .remediation
            .handler()
            .ok_or(FlowError::NotAuthenticating)?;
        let _guard =
            InFlight::acquire(&self.state.in_flight).ok_or(FlowError::OperationInProgress)?;
        handler.poll(&self.remediation).await
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.state
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Pollable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pollable")
            .field("remediation", &self.remediation.name)
            .field("interval", &self.interval)
            .field("polling", &self.is_polling())
            .finish()
    }
}

struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn poll_loop(
    mut remediation: Remediation,
    mut interval: Duration,
    handler: Weak<dyn RemediationHandler>,
    in_flight: Arc<AtomicBool>,
) {
    let generation = remediation.generation();

    loop {
        tokio::time::sleep(interval).await;

        let Some(target) = handler.upgrade() else {
            debug!(remediation = %remediation.name, "Flow dropped, polling ends");
            return;
        };
        let Some(guard) = InFlight::acquire(&in_flight) else {
            trace!(remediation = %remediation.name, "Poll still outstanding, skipping tick");
            continue;
        };

        let result = target.poll(&remediation).await;
        drop(guard);

        match result {
            Ok(response) => {
                let next = response
                    .pollables()
                    .into_iter()
                    .find(|p| p.remediation.name == remediation.name)
                    .map(|p| (p.remediation.clone(), p.interval));

                match next {
                    Some((next_remediation, next_interval)) => {
                        trace!(remediation = %remediation.name, "Still pending");
                        remediation = next_remediation;
                        interval = next_interval;
                    }
                    None => {
                        debug!(remediation = %remediation.name, "Polling finished");
                        target.poll_completed(generation, Ok(response));
                        return;
                    }
                }
            }
            Err(error) => {
                warn!(remediation = %remediation.name, error = %error, "Poll failed");
                target.poll_completed(generation, Err(error));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HttpMethod;
    use crate::model::Form;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use url::Url;

    #[derive(Default)]
    struct CountingHandler {
        polls: AtomicUsize,
    }

    #[async_trait]
    impl RemediationHandler for CountingHandler {
        async fn proceed(&self, _remediation: &Remediation) -> IdxResult<Response> {
            Err(FlowError::NotAuthenticating.into())
        }

        async fn poll(&self, _remediation: &Remediation) -> IdxResult<Response> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Err(ProtocolError::SuccessResponseMissing.into())
        }

        fn poll_completed(&self, _generation: u64, _result: IdxResult<Response>) {}
    }

    fn pollable(handler: &Arc<CountingHandler>) -> Pollable {
        let mut remediation = Remediation::new(
            "challenge-poll",
            HttpMethod::Post,
            Url::parse("https://example.okta.com/idp/idx/challenge/poll").unwrap(),
            Form::default(),
        );
        let weak: Weak<dyn RemediationHandler> = Arc::downgrade(handler) as Weak<dyn RemediationHandler>;
        remediation.bind(1, Some(weak));
        Pollable::new(remediation, Duration::from_secs(4))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let handler = Arc::new(CountingHandler::default());
        let pollable = pollable(&handler);

        pollable.start_polling().unwrap();
        pollable.start_polling().unwrap();
        assert!(pollable.is_polling());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handler.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let handler = Arc::new(CountingHandler::default());
        let pollable = pollable(&handler);

        pollable.stop_polling();
        pollable.stop_polling();
        assert!(!pollable.is_polling());
    }

    #[tokio::test]
    async fn test_clones_share_timer() {
        let handler = Arc::new(CountingHandler::default());
        let pollable = pollable(&handler);
        let clone = pollable.clone();

        pollable.start_polling().unwrap();
        assert!(clone.is_polling());
        clone.stop_polling();
        tokio::task::yield_now().await;
        assert!(!pollable.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_fires_after_interval() {
        let handler = Arc::new(CountingHandler::default());
        let pollable = pollable(&handler);

        pollable.start_polling().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(handler.polls.load(Ordering::SeqCst), 1);
        // the error ended polling
        assert!(!pollable.is_polling());
    }

    #[test]
    fn test_start_requires_runtime() {
        let handler = Arc::new(CountingHandler::default());
        assert!(pollable(&handler).start_polling().is_err());
    }
}
