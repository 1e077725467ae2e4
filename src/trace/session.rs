use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::lookup::GeoLookup;
use crate::state::{GeoLocation, Hop};
use crate::trace::runner::CommandRunner;
use crate::trace::simulate::RouteSimulator;

/// Callback receiving each hop as it is produced
pub type HopFn = dyn Fn(Hop) + Send + Sync;

/// Terminal callback receiving the count of delivered hops
pub type CompleteFn = Box<dyn FnOnce(usize) + Send>;

/// Lifecycle state of a trace session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Errored,
}

/// How a session produces its hops
pub enum Strategy {
    /// Drive the operating system's trace utility
    Command(CommandRunner),
    /// Replay a predefined route offline
    Simulated(RouteSimulator),
}

impl Strategy {
    async fn run(
        &self,
        cancel: &CancellationToken,
        target: &str,
        geo: Option<&GeoLookup>,
        on_hop: &HopFn,
        on_complete: CompleteFn,
    ) -> Result<()> {
        match self {
            Self::Command(runner) => runner.run(cancel, target, geo, on_hop, on_complete).await,
            Self::Simulated(simulator) => simulator.run(cancel, on_hop, on_complete).await,
        }
    }
}

/// One trace attempt: single-flight start, streaming hop delivery and
/// cooperative cancellation.
///
/// The session owns its background task and cancellation handle; the
/// geolocation service is a shared collaborator supplied by the caller.
pub struct TraceSession {
    id: String,
    target: String,
    strategy: Arc<Strategy>,
    geo: Option<Arc<GeoLookup>>,
    state: Arc<Mutex<RunState>>,
    cancel: CancellationToken,
}

impl TraceSession {
    /// Session backed by the platform trace utility
    pub fn new(target: impl Into<String>, geo: Option<Arc<GeoLookup>>) -> Self {
        Self::with_strategy(target, Strategy::Command(CommandRunner::native()), geo)
    }

    /// Session backed by the offline route simulator
    pub fn simulated(target: impl Into<String>) -> Self {
        let target = target.into();
        let simulator = RouteSimulator::for_target(&target);
        Self::with_strategy(target, Strategy::Simulated(simulator), None)
    }

    /// Session with an explicit strategy
    pub fn with_strategy(
        target: impl Into<String>,
        strategy: Strategy,
        geo: Option<Arc<GeoLookup>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            target: target.into(),
            strategy: Arc::new(strategy),
            geo,
            state: Arc::new(Mutex::new(RunState::Idle)),
            cancel: CancellationToken::new(),
        }
    }

    /// Process-unique session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Original target string
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Source location of the route when simulating; command-backed
    /// sessions have none
    pub fn source(&self) -> Option<GeoLocation> {
        match self.strategy.as_ref() {
            Strategy::Simulated(simulator) => Some(simulator.source().clone()),
            Strategy::Command(_) => None,
        }
    }

    /// Current lifecycle state snapshot
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Whether the background task is active
    pub fn is_running(&self) -> bool {
        *self.state.lock() == RunState::Running
    }

    /// Begin asynchronous execution, at most once per session lifetime.
    ///
    /// Spawns one task that drives the strategy and forwards its output:
    /// `on_hop` fires zero or more times, then exactly one of `on_complete`
    /// or `on_error`. Cancellation suppresses both terminal callbacks.
    /// Calling `start` while running or after a terminal state is a no-op.
    pub fn start<H, C, E>(&self, on_hop: H, on_complete: C, on_error: E)
    where
        H: Fn(Hop) + Send + Sync + 'static,
        C: FnOnce(usize) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if *state != RunState::Idle {
                return;
            }
            *state = RunState::Running;
        }

        let strategy = Arc::clone(&self.strategy);
        let geo = self.geo.clone();
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();
        let target = self.target.clone();

        tokio::spawn(async move {
            let result = strategy
                .run(&cancel, &target, geo.as_deref(), &on_hop, Box::new(on_complete))
                .await;

            match result {
                Ok(()) => {
                    let mut state = state.lock();
                    if *state == RunState::Running {
                        *state = RunState::Completed;
                    }
                }
                Err(_) if cancel.is_cancelled() => {
                    // Cancellation is not an error; cancel() normally moved
                    // the state already
                    let mut state = state.lock();
                    if *state == RunState::Running {
                        *state = RunState::Cancelled;
                    }
                }
                Err(err) => {
                    {
                        let mut state = state.lock();
                        if *state == RunState::Running {
                            *state = RunState::Errored;
                        }
                    }
                    on_error(format!("{err:#}"));
                }
            }
        });
    }

    /// Signal the running task to stop without waiting for it to unwind.
    ///
    /// Idempotent, valid in any state; a no-op unless the session is
    /// running. The task observes the signal at its next checkpoint.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if *state == RunState::Running {
            self.cancel.cancel();
            *state = RunState::Cancelled;
        }
    }
}
