use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use taskbot_core::config::DispatchOrdering;
use taskbot_core::domain::UserId;

use crate::dispatcher::Dispatcher;
use crate::events::InboundEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("update source failed to connect: {0}")]
    Connect(String),
    #[error("update source read failed: {0}")]
    Receive(String),
    #[error("update source disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Stream of inbound chat updates. `Ok(None)` means the stream closed.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn connect(&self) -> Result<(), RunnerError>;
    async fn next_event(&self) -> Result<Option<InboundEvent>, RunnerError>;
    async fn disconnect(&self) -> Result<(), RunnerError>;
}

/// Update source fed through an mpsc channel by a platform adapter.
pub struct ChannelSource {
    receiver: Mutex<mpsc::Receiver<InboundEvent>>,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<InboundEvent>) -> Self {
        Self { receiver: Mutex::new(receiver) }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<InboundEvent>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self::new(receiver))
    }
}

#[async_trait]
impl UpdateSource for ChannelSource {
    async fn connect(&self) -> Result<(), RunnerError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<InboundEvent>, RunnerError> {
        Ok(self.receiver.lock().await.recv().await)
    }

    async fn disconnect(&self) -> Result<(), RunnerError> {
        self.receiver.lock().await.close();
        Ok(())
    }
}

type WorkerMap = Arc<Mutex<HashMap<UserId, mpsc::UnboundedSender<InboundEvent>>>>;

/// Consumes the update stream in arrival order and hands every event to the
/// dispatcher without waiting for earlier events to finish.
pub struct UpdateRunner {
    source: Arc<dyn UpdateSource>,
    dispatcher: Arc<Dispatcher>,
    reconnect_policy: ReconnectPolicy,
    ordering: DispatchOrdering,
    worker_idle_timeout: Duration,
    workers: WorkerMap,
}

impl UpdateRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        dispatcher: Arc<Dispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self {
            source,
            dispatcher,
            reconnect_policy,
            ordering: DispatchOrdering::Concurrent,
            worker_idle_timeout: Duration::from_secs(30),
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `PerUser` runs one user's events one at a time, in arrival order, on a
    /// worker that exits after `idle_timeout` without events.
    pub fn with_ordering(mut self, ordering: DispatchOrdering, idle_timeout: Duration) -> Self {
        self.ordering = ordering;
        self.worker_idle_timeout = idle_timeout;
        self
    }

    pub async fn active_workers(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Returns once the source closes or reconnect retries run out. In-flight
    /// handlers are awaited before returning.
    pub async fn start(&self) -> Result<(), RunnerError> {
        let mut in_flight = JoinSet::new();
        let result = self.run_with_retries(&mut in_flight).await;

        self.workers.lock().await.clear();
        while let Some(joined) = in_flight.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "dispatch task panicked");
            }
        }
        result
    }

    async fn run_with_retries(&self, in_flight: &mut JoinSet<()>) -> Result<(), RunnerError> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt, in_flight).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "update source failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "update source retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        in_flight: &mut JoinSet<()>,
    ) -> Result<(), RunnerError> {
        info!(attempt, "opening update source");
        self.source.connect().await?;
        info!(attempt, ordering = self.ordering.as_str(), "update source connected");

        loop {
            let Some(event) = self.source.next_event().await? else {
                info!(attempt, "update source closed");
                self.source.disconnect().await?;
                return Ok(());
            };

            debug!(
                event_name = "ingress.update_received",
                user_id = %event.user_id(),
                event_kind = event.kind(),
                "received update"
            );

            while in_flight.try_join_next().is_some() {}
            self.schedule(event, in_flight).await;
        }
    }

    async fn schedule(&self, event: InboundEvent, in_flight: &mut JoinSet<()>) {
        match self.ordering {
            DispatchOrdering::Concurrent => {
                let dispatcher = Arc::clone(&self.dispatcher);
                in_flight.spawn(async move {
                    dispatcher.dispatch(event).await;
                });
            }
            DispatchOrdering::PerUser => {
                let user_id = event.user_id();
                let mut workers = self.workers.lock().await;

                let event = match workers.get(&user_id) {
                    Some(sender) => match sender.send(event) {
                        Ok(()) => return,
                        // worker exited between timeout and removal
                        Err(mpsc::error::SendError(event)) => event,
                    },
                    None => event,
                };

                let (sender, receiver) = mpsc::unbounded_channel();
                if sender.send(event).is_err() {
                    return;
                }
                workers.insert(user_id, sender);
                debug!(user_id = %user_id, "starting per-user worker");

                in_flight.spawn(run_user_worker(
                    user_id,
                    receiver,
                    Arc::clone(&self.dispatcher),
                    Arc::clone(&self.workers),
                    self.worker_idle_timeout,
                ));
            }
        }
    }
}

async fn run_user_worker(
    user_id: UserId,
    mut receiver: mpsc::UnboundedReceiver<InboundEvent>,
    dispatcher: Arc<Dispatcher>,
    workers: WorkerMap,
    idle_timeout: Duration,
) {
    loop {
        match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(event)) => {
                dispatcher.dispatch(event).await;
            }
            Ok(None) => break,
            Err(_) => {
                // Senders enqueue while holding the map lock, so an empty queue
                // observed under the lock means nothing is in transit.
                let mut map = workers.lock().await;
                match receiver.try_recv() {
                    Ok(event) => {
                        drop(map);
                        dispatcher.dispatch(event).await;
                    }
                    Err(_) => {
                        map.remove(&user_id);
                        break;
                    }
                }
            }
        }
    }
    debug!(user_id = %user_id, "per-user worker stopped");
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use taskbot_core::config::DispatchOrdering;
    use taskbot_core::domain::UserId;
    use taskbot_core::labels::{CommandTable, LabelCatalog};
    use taskbot_core::session::DialogSessions;

    use super::{ReconnectPolicy, RunnerError, UpdateRunner, UpdateSource};
    use crate::dispatcher::Dispatcher;
    use crate::events::InboundEvent;
    use crate::registry::{CallbackRegistry, MessageRegistry};

    #[derive(Default)]
    struct ScriptedSource {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), RunnerError>>,
        events: VecDeque<Result<Option<InboundEvent>, RunnerError>>,
        connect_attempts: usize,
        disconnect_calls: usize,
    }

    impl ScriptedSource {
        fn with_script(
            connect_results: Vec<Result<(), RunnerError>>,
            events: Vec<Result<Option<InboundEvent>, RunnerError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    events: events.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn connect(&self) -> Result<(), RunnerError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_event(&self) -> Result<Option<InboundEvent>, RunnerError> {
            let mut state = self.state.lock().await;
            state.events.pop_front().unwrap_or(Ok(None))
        }

        async fn disconnect(&self) -> Result<(), RunnerError> {
            self.state.lock().await.disconnect_calls += 1;
            Ok(())
        }
    }

    fn empty_dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            MessageRegistry::new(),
            CallbackRegistry::new(),
            DialogSessions::in_memory(),
            Arc::new(LabelCatalog::default()),
            Arc::new(CommandTable::default()),
        ))
    }

    fn no_delay() -> ReconnectPolicy {
        ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let source = Arc::new(ScriptedSource::with_script(
            vec![Err(RunnerError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(InboundEvent::text(UserId(1), "hello"))), Ok(None)],
        ));

        let runner = UpdateRunner::new(source.clone(), empty_dispatcher(), no_delay());
        runner.start().await.expect("runner should not fail");

        assert_eq!(source.connect_attempts().await, 2);
        assert_eq!(source.disconnect_calls().await, 1);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let source = Arc::new(ScriptedSource::with_script(
            vec![
                Err(RunnerError::Connect("fail-1".to_owned())),
                Err(RunnerError::Connect("fail-2".to_owned())),
                Err(RunnerError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = UpdateRunner::new(source.clone(), empty_dispatcher(), no_delay());
        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(source.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn read_failure_triggers_reconnect() {
        let source = Arc::new(ScriptedSource::with_script(
            vec![Ok(()), Ok(())],
            vec![Err(RunnerError::Receive("reset".to_owned())), Ok(None)],
        ));

        let runner = UpdateRunner::new(source.clone(), empty_dispatcher(), no_delay());
        runner.start().await.expect("runner should recover");
        assert_eq!(source.connect_attempts().await, 2);
    }

    #[tokio::test]
    async fn per_user_workers_are_torn_down_on_close() {
        let source = Arc::new(ScriptedSource::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(InboundEvent::text(UserId(1), "a"))),
                Ok(Some(InboundEvent::text(UserId(2), "b"))),
                Ok(Some(InboundEvent::text(UserId(1), "c"))),
                Ok(None),
            ],
        ));

        let runner = UpdateRunner::new(source, empty_dispatcher(), no_delay())
            .with_ordering(DispatchOrdering::PerUser, Duration::from_secs(60));
        runner.start().await.expect("runner finishes");
        assert_eq!(runner.active_workers().await, 0);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = ReconnectPolicy { max_retries: 10, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(9), Duration::from_millis(1_000));
    }
}
