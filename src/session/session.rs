use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::location::{LocationSource, PositionSample};
use crate::sink::PublishSink;

use super::error::SessionError;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub enum SessionMode {
    Idle,
    Active {
        since: DateTime<Utc>,
        run_id: String,
    },
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SessionStatus {
    pub mode: SessionMode,
    pub last_sample: Option<PositionSample>,
    pub published: u64,
    pub last_publish_error: Option<String>,
}

#[derive(Debug)]
struct Shared {
    status: SessionStatus,
}

#[derive(Debug)]
struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Start/stop lifecycle around the recurring sampling tick.
///
/// At most one worker task exists while Active, none while Idle. Tick work
/// (sample + publish) runs in its own task so a slow agent or sink never
/// delays the next tick; such a task may finish after the session goes Idle,
/// but it only ever writes sample/publish fields, never the mode.
pub struct TrackingSession<S, P> {
    source: Arc<S>,
    sink: Option<Arc<P>>,
    user_id: Option<String>,
    period: Duration,
    shared: Arc<StdMutex<Shared>>,
    worker: Option<WorkerHandle>,
}

impl<S, P> TrackingSession<S, P>
where
    S: LocationSource + 'static,
    P: PublishSink + 'static,
{
    pub fn new(
        source: Arc<S>,
        sink: Option<Arc<P>>,
        user_id: Option<String>,
        period: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            user_id,
            period,
            shared: Arc::new(StdMutex::new(Shared {
                status: SessionStatus {
                    mode: SessionMode::Idle,
                    last_sample: None,
                    published: 0,
                    last_publish_error: None,
                },
            })),
            worker: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().unwrap().status.clone()
    }

    /// Begin ticking. A second start while Active is a no-op; the worker
    /// handle is the duplicate-timer guard.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.worker.is_some() {
            log::debug!("session already active, ignoring start");
            return Ok(());
        }

        let sink = self.sink.clone().ok_or(SessionError::NotConnected)?;
        let source = self.source.clone();
        let shared = self.shared.clone();
        let user_id = self.user_id.clone();
        let period = self.period;

        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_session_loop(shared, source, sink, user_id, period, stop_rx));
        self.worker = Some(WorkerHandle { stop_tx, join });

        let since = Utc::now();
        let run_id = generate_run_id(since);
        log::info!("tracking session {} started", run_id);

        let mut locked = self.shared.lock().unwrap();
        locked.status.mode = SessionMode::Active { since, run_id };
        Ok(())
    }

    /// Cancel future ticks and wait for the worker to wind down. A stop
    /// while Idle is a no-op. An in-flight tick is not cancelled.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = worker.stop_tx.send(());
        let _ = worker.join.await;

        let mut locked = self.shared.lock().unwrap();
        locked.status.mode = SessionMode::Idle;
        log::info!("tracking session stopped");
    }
}

/// Run id in the style `20240501T120000Z_<uuid>`, for log correlation.
fn generate_run_id(start: DateTime<Utc>) -> String {
    let uuid = uuid::Uuid::new_v4();
    let timestamp = start.format("%Y%m%dT%H%M%SZ");
    format!("{}_{}", timestamp, uuid)
}

async fn run_session_loop<S, P>(
    shared: Arc<StdMutex<Shared>>,
    source: Arc<S>,
    sink: Arc<P>,
    user_id: Option<String>,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) where
    S: LocationSource + 'static,
    P: PublishSink + 'static,
{
    // First tick one full period after start, matching the cadence of the
    // publishes that follow.
    let mut ticks = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = ticks.tick() => {}
            _ = &mut stop_rx => break,
        }

        tokio::spawn(run_tick(
            shared.clone(),
            source.clone(),
            sink.clone(),
            user_id.clone(),
        ));
    }
}

async fn run_tick<S, P>(
    shared: Arc<StdMutex<Shared>>,
    source: Arc<S>,
    sink: Arc<P>,
    user_id: Option<String>,
) where
    S: LocationSource + 'static,
    P: PublishSink + 'static,
{
    let mut sample = match source.sample().await {
        Ok(sample) => sample,
        Err(e) => {
            log::warn!("location sample failed: {}", e);
            return;
        }
    };
    sample.user_id = user_id;

    {
        let mut locked = shared.lock().unwrap();
        locked.status.last_sample = Some(sample.clone());
    }

    match sink.publish(&sample).await {
        Ok(()) => {
            let mut locked = shared.lock().unwrap();
            locked.status.published += 1;
            locked.status.last_publish_error = None;
        }
        Err(e) => {
            log::warn!("publish failed: {}", e);
            let mut locked = shared.lock().unwrap();
            locked.status.last_publish_error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::location::LocationError;
    use crate::sink::SinkError;

    const PERIOD: Duration = Duration::from_secs(5);

    struct ScriptedSource {
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LocationSource for ScriptedSource {
        async fn sample(&self) -> Result<PositionSample, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(LocationError::PermissionDenied)
            } else {
                Ok(PositionSample::now(37.422, -122.084, Some(5.0)))
            }
        }
    }

    struct CountingSink {
        fail: bool,
        published: AtomicUsize,
    }

    impl CountingSink {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                fail: false,
                published: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                published: AtomicUsize::new(0),
            })
        }

        fn published(&self) -> usize {
            self.published.load(Ordering::SeqCst)
        }
    }

    impl PublishSink for CountingSink {
        async fn publish(&self, _sample: &PositionSample) -> Result<(), SinkError> {
            if self.fail {
                Err(SinkError::Rejected { status: 500 })
            } else {
                self.published.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn session(
        source: &Arc<ScriptedSource>,
        sink: Option<&Arc<CountingSink>>,
    ) -> TrackingSession<ScriptedSource, CountingSink> {
        TrackingSession::new(
            source.clone(),
            sink.cloned(),
            Some("user-1".to_string()),
            PERIOD,
        )
    }

    async fn let_ticks_pass(n: u32) {
        tokio::time::sleep(PERIOD * n + Duration::from_millis(100)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_start_schedules_one_timer() {
        let source = ScriptedSource::ok();
        let sink = CountingSink::ok();
        let mut session = session(&source, Some(&sink));

        session.start().unwrap();
        session.start().unwrap();
        assert!(matches!(session.status().mode, SessionMode::Active { .. }));

        let_ticks_pass(5).await;
        // A duplicated timer would have doubled this.
        assert_eq!(source.calls(), 5);
        assert_eq!(sink.published(), 5);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_idle_is_noop() {
        let source = ScriptedSource::ok();
        let sink = CountingSink::ok();
        let mut session = session(&source, Some(&sink));

        session.stop().await;
        assert!(matches!(session.status().mode, SessionMode::Idle));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_future_ticks() {
        let source = ScriptedSource::ok();
        let sink = CountingSink::ok();
        let mut session = session(&source, Some(&sink));

        session.start().unwrap();
        let_ticks_pass(2).await;
        session.stop().await;

        assert!(matches!(session.status().mode, SessionMode::Idle));
        let sampled = source.calls();
        assert_eq!(sampled, 2);

        let_ticks_pass(6).await;
        assert_eq!(source.calls(), sampled);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_resumes_ticking() {
        let source = ScriptedSource::ok();
        let sink = CountingSink::ok();
        let mut session = session(&source, Some(&sink));

        session.start().unwrap();
        let_ticks_pass(1).await;
        session.stop().await;

        session.start().unwrap();
        let_ticks_pass(1).await;
        assert_eq!(source.calls(), 2);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn sampler_failure_keeps_session_active() {
        let source = ScriptedSource::failing();
        let sink = CountingSink::ok();
        let mut session = session(&source, Some(&sink));

        session.start().unwrap();
        let_ticks_pass(3).await;

        assert!(matches!(session.status().mode, SessionMode::Active { .. }));
        assert_eq!(source.calls(), 3);
        assert_eq!(sink.published(), 0);
        assert!(session.status().last_sample.is_none());

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_surfaces_in_status_and_keeps_ticking() {
        let source = ScriptedSource::ok();
        let sink = CountingSink::failing();
        let mut session = session(&source, Some(&sink));

        session.start().unwrap();
        let_ticks_pass(2).await;

        let status = session.status();
        assert!(matches!(status.mode, SessionMode::Active { .. }));
        assert!(status.last_publish_error.is_some());
        assert_eq!(status.published, 0);
        assert_eq!(source.calls(), 2);

        let_ticks_pass(1).await;
        assert_eq!(source.calls(), 3);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_sink_refuses() {
        let source = ScriptedSource::ok();
        let mut session: TrackingSession<ScriptedSource, CountingSink> =
            TrackingSession::new(source.clone(), None, None, PERIOD);

        assert!(matches!(session.start(), Err(SessionError::NotConnected)));
        assert!(matches!(session.status().mode, SessionMode::Idle));

        let_ticks_pass(3).await;
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_ticks_update_last_sample_and_count() {
        let source = ScriptedSource::ok();
        let sink = CountingSink::ok();
        let mut session = session(&source, Some(&sink));

        session.start().unwrap();
        let_ticks_pass(2).await;

        let status = session.status();
        let sample = status.last_sample.expect("sample recorded");
        assert!((sample.latitude - 37.422).abs() < 1e-9);
        assert_eq!(sample.user_id.as_deref(), Some("user-1"));
        assert_eq!(status.published, 2);
        assert!(status.last_publish_error.is_none());

        session.stop().await;
    }
}
