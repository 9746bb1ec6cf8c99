//! Background refresh for one active simulation.
//!
//! A single feed owns the state timer and the logs timer; the control panel
//! and the dashboard both read the same state fetch. Every update is tagged
//! with the epoch it was started under so the session can drop anything that
//! arrives after the user has moved on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::api::SimulationApi;
use crate::config::PollConfig;
use crate::control::ControlAction;
use crate::error::ApiError;
use crate::model::{LogEntry, SimulationId, SimulationState};

/// Session generation a feed was started for.
pub type Epoch = u64;

#[derive(Debug)]
pub enum FeedEvent {
    State(Result<SimulationState, ApiError>),
    Logs(Result<Vec<LogEntry>, ApiError>),
    Action {
        action: ControlAction,
        result: Result<(), ApiError>,
    },
}

#[derive(Debug)]
pub struct FeedUpdate {
    pub epoch: Epoch,
    pub event: FeedEvent,
}

pub type FeedSender = mpsc::UnboundedSender<FeedUpdate>;
pub type FeedReceiver = mpsc::UnboundedReceiver<FeedUpdate>;

pub fn feed_channel() -> (FeedSender, FeedReceiver) {
    mpsc::unbounded_channel()
}

/// Shared state every task spawned by one feed carries.
#[derive(Clone)]
struct FeedContext {
    api: Arc<dyn SimulationApi>,
    id: SimulationId,
    epoch: Epoch,
    live: Arc<AtomicBool>,
    updates: FeedSender,
}

impl FeedContext {
    /// Forward an event unless the feed has been stopped. Returns `false` once
    /// nothing more should be sent.
    fn publish(&self, event: FeedEvent) -> bool {
        if !self.live.load(Ordering::Acquire) {
            debug!(simulation = %self.id, epoch = self.epoch, "dropping late update");
            return false;
        }
        self.updates
            .send(FeedUpdate {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }
}

pub struct SimulationFeed {
    ctx: FeedContext,
    handle: Handle,
    tasks: Vec<JoinHandle<()>>,
}

impl SimulationFeed {
    /// Start both refresh timers. The first fetch of each fires immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        api: Arc<dyn SimulationApi>,
        id: SimulationId,
        epoch: Epoch,
        poll: &PollConfig,
        updates: FeedSender,
    ) -> Self {
        let handle = Handle::current();
        let ctx = FeedContext {
            api,
            id,
            epoch,
            live: Arc::new(AtomicBool::new(true)),
            updates,
        };
        info!(simulation = %ctx.id, epoch, "starting simulation feed");

        let tasks = vec![
            handle.spawn(poll_state(ctx.clone(), poll.state_interval)),
            handle.spawn(poll_logs(ctx.clone(), poll.logs_interval, poll.log_window)),
        ];
        Self { ctx, handle, tasks }
    }

    pub fn simulation_id(&self) -> &SimulationId {
        &self.ctx.id
    }

    pub fn epoch(&self) -> Epoch {
        self.ctx.epoch
    }

    pub fn is_live(&self) -> bool {
        self.ctx.live.load(Ordering::Acquire)
    }

    /// Send a control action in the background; the outcome comes back as a
    /// [`FeedEvent::Action`].
    pub fn dispatch(&mut self, action: ControlAction) {
        if !self.is_live() {
            return;
        }
        let ctx = self.ctx.clone();
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(self.handle.spawn(async move {
            let result = action.send(ctx.api.as_ref(), &ctx.id).await;
            ctx.publish(FeedEvent::Action { action, result });
        }));
    }

    /// Stop the timers and abandon in-flight requests.
    pub fn stop(&mut self) {
        if self.ctx.live.swap(false, Ordering::AcqRel) {
            info!(simulation = %self.ctx.id, epoch = self.ctx.epoch, "stopping simulation feed");
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SimulationFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_state(ctx: FeedContext, period: Duration) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let result = ctx.api.simulation_state(&ctx.id).await;
        if !ctx.publish(FeedEvent::State(result)) {
            break;
        }
    }
}

async fn poll_logs(ctx: FeedContext, period: Duration, window: usize) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let result = ctx
            .api
            .simulation_logs(&ctx.id, window)
            .await
            .map(|response| response.logs);
        if !ctx.publish(FeedEvent::Logs(result)) {
            break;
        }
    }
}
