//! Tokio host for a [`DoorController`].
//!
//! The controller moves into one task and is never shared. Transports talk
//! to it through a cloneable [`ControllerHandle`]; each call is a message on
//! an mpsc channel answered over a oneshot. Between messages the task ticks
//! the controller on a fixed interval.
//!
//! ```text
//! ┌───────────┐  Request   ┌──────────────────────────┐
//! │ HTTP      │───────────►│                          │
//! └───────────┘            │  controller task         │
//! ┌───────────┐  Request   │  select! {               │
//! │ MQTT      │───────────►│    interval.tick() → tick│
//! └───────────┘            │    rx.recv() → serve     │
//! ┌───────────┐  edges     │  }                       │
//! │ edge ISR  │───────────►│                          │
//! └───────────┘            └──────────────────────────┘
//! ```
//!
//! The task ends with the [`SystemRequest`] that stopped it.

use crate::{
    api::{self, ApiRequest, ApiResponse},
    commands::{Command, CommandReply},
    controller::{DoorController, DoorStatus, SystemRequest},
    dispatcher::Notification,
    error::{ControllerError, Result},
};
use doorman_core::Origin;
use std::time::Duration;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info};

const REQUEST_QUEUE_CAPACITY: usize = 32;

/// Current time on the runtime clock.
///
/// Follows tokio's clock, so it also advances under a paused test runtime.
/// Edge timestamps and controller construction should use it too.
pub fn now() -> std::time::Instant {
    time::Instant::now().into_std()
}

enum Request {
    Api {
        request: ApiRequest,
        reply: oneshot::Sender<ApiResponse>,
    },
    Mqtt {
        topic: String,
        payload: String,
        reply: oneshot::Sender<Result<Option<CommandReply>>>,
    },
    Execute {
        command: Command,
        origin: Origin,
        reply: oneshot::Sender<Result<CommandReply>>,
    },
    Note {
        message: String,
    },
    Log {
        reply: oneshot::Sender<Vec<String>>,
    },
    Status {
        reply: oneshot::Sender<DoorStatus>,
    },
    Notifications {
        reply: oneshot::Sender<Vec<Notification>>,
    },
    Shutdown,
}

/// Cloneable access to a running controller.
///
/// Every method fails with [`ControllerError::Stopped`] once the task has
/// exited.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Request>,
}

impl ControllerHandle {
    /// Serve an HTTP request.
    pub async fn api(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.call(|reply| Request::Api { request, reply }).await
    }

    /// Deliver an inbound MQTT message.
    pub async fn mqtt(
        &self,
        topic: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<Option<CommandReply>> {
        let (topic, payload) = (topic.into(), payload.into());
        self.call(|reply| Request::Mqtt {
            topic,
            payload,
            reply,
        })
        .await?
    }

    /// Apply a command directly.
    pub async fn execute(&self, command: Command, origin: Origin) -> Result<CommandReply> {
        self.call(|reply| Request::Execute {
            command,
            origin,
            reply,
        })
        .await?
    }

    /// Append an external lifecycle line to the event log.
    pub async fn note(&self, message: impl Into<String>) -> Result<()> {
        self.send(Request::Note {
            message: message.into(),
        })
        .await
    }

    pub async fn snapshot_log(&self) -> Result<Vec<String>> {
        self.call(|reply| Request::Log { reply }).await
    }

    pub async fn status(&self) -> Result<DoorStatus> {
        self.call(|reply| Request::Status { reply }).await
    }

    /// Drain notifications queued by rules.
    pub async fn take_notifications(&self) -> Result<Vec<Notification>> {
        self.call(|reply| Request::Notifications { reply }).await
    }

    /// Ask the task to exit with [`SystemRequest::Shutdown`].
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Request::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ControllerError::Stopped)
    }

    async fn call<T>(&self, request: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(request(reply)).await?;
        response.await.map_err(|_| ControllerError::Stopped)
    }
}

/// Move `controller` into a task ticking every `tick_interval`.
///
/// The task exits when the controller returns a [`SystemRequest`], when
/// [`ControllerHandle::shutdown`] is called, or when every handle is
/// dropped.
///
/// # Examples
///
/// ```
/// use doorman_controller::{ControllerConfig, DoorController, Pins, SystemRequest, runtime};
/// use doorman_hardware::mock::{MockInput, MockOutput};
/// use doorman_storage::MemoryStore;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> doorman_controller::Result<()> {
/// let pins = Pins {
///     relay: Box::new(MockOutput::new("relay").0),
///     led: Box::new(MockOutput::new("led").0),
///     door: Box::new(MockInput::new("door", true).0),
///     aux: Box::new(MockInput::new("aux", true).0),
///     reset: Box::new(MockInput::new("reset", true).0),
/// };
/// let (controller, _edges) = DoorController::new(
///     ControllerConfig::default(),
///     pins,
///     Box::new(MemoryStore::new()),
///     runtime::now(),
/// );
///
/// let (handle, task) = runtime::spawn_controller(controller, Duration::from_millis(10));
/// assert!(handle.snapshot_log().await?[0].contains("Door Controller Ready"));
///
/// handle.shutdown().await?;
/// assert_eq!(task.await.unwrap(), SystemRequest::Shutdown);
/// # Ok(())
/// # }
/// ```
pub fn spawn_controller(
    controller: DoorController,
    tick_interval: Duration,
) -> (ControllerHandle, JoinHandle<SystemRequest>) {
    let (tx, rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
    let task = tokio::spawn(run(controller, rx, tick_interval));
    (ControllerHandle { tx }, task)
}

async fn run(
    mut controller: DoorController,
    mut requests: mpsc::Receiver<Request>,
    tick_interval: Duration,
) -> SystemRequest {
    let mut interval = time::interval(tick_interval.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(tick_ms = tick_interval.as_millis() as u64, "Controller task running");

    let outcome = loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(request) = controller.tick(now()) {
                    break request;
                }
            }
            request = requests.recv() => match request {
                Some(Request::Shutdown) => break SystemRequest::Shutdown,
                Some(request) => serve(&mut controller, request),
                None => {
                    debug!("All controller handles dropped");
                    break SystemRequest::Shutdown;
                }
            },
        }
    };

    info!(?outcome, "Controller task stopped");
    outcome
}

fn serve(controller: &mut DoorController, request: Request) {
    // A caller that stopped waiting drops its receiver; the reply is lost.
    match request {
        Request::Api { request, reply } => {
            let _ = reply.send(api::handle(controller, &request, now()));
        }
        Request::Mqtt {
            topic,
            payload,
            reply,
        } => {
            let _ = reply.send(controller.mqtt(&topic, &payload, now()));
        }
        Request::Execute {
            command,
            origin,
            reply,
        } => {
            let _ = reply.send(controller.execute(command, origin, now()));
        }
        Request::Note { message } => controller.note(message, now()),
        Request::Log { reply } => {
            let _ = reply.send(controller.snapshot_log());
        }
        Request::Status { reply } => {
            let _ = reply.send(controller.status());
        }
        Request::Notifications { reply } => {
            let _ = reply.send(controller.take_notifications());
        }
        Request::Shutdown => {}
    }
}
