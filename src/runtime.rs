//! The session runtime
//!
//! A [`Game`] is a plain value that must never be mutated concurrently; this
//! module gives it the single serialized event queue it expects. All inbound
//! traffic — joins, answers, host commands, disconnects, and timer firings —
//! becomes a [`Command`] on one mpsc channel, consumed by a dedicated task
//! that owns the game. Timers are spawned sleeps that feed their alarm back
//! into the same channel, so a firing is just another queued command; the
//! [`PendingAlarm`] slot aborts the previous sleep whenever a new one is
//! armed, and the alarm epochs checked by the game make any firing that
//! slipped into the queue before an abort inert.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{
    game::{AlarmMessage, Game, IncomingMessage},
    session::{Gateway, Id},
};

/// An event queued for the session task
#[derive(Debug, Clone, derive_more::From)]
pub enum Command {
    /// A new participant joins with the given display name
    Join {
        /// The joining connection
        id: Id,
        /// The requested display name
        name: String,
    },
    /// A message arrived from a connected participant
    Incoming {
        /// The sending connection
        id: Id,
        /// The message itself
        message: IncomingMessage,
    },
    /// A participant's connection went away
    Disconnect {
        /// The disconnected connection
        id: Id,
    },
    /// A scheduled timer fired
    #[from]
    Alarm(AlarmMessage),
    /// Stop the session task
    Shutdown,
}

/// A handle for feeding commands into a running session
///
/// Cheap to clone; one handle per transport connection is typical. The
/// session task exits once every handle is dropped or after
/// [`SessionHandle::shutdown`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    /// Enqueues a command for the session task
    ///
    /// Returns `false` if the session has already stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Asks the session task to stop
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Owner of the session's one in-flight sleep task
///
/// Arming aborts whatever sleep was pending, so at most one timer task ever
/// exists per session. A sleep that already pushed its alarm into the queue
/// before the abort is handled by the game's epoch check.
#[derive(Debug, Default)]
struct PendingAlarm {
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PendingAlarm {
    /// Replaces the pending sleep with a new one
    fn arm(
        &mut self,
        feedback: &mpsc::WeakUnboundedSender<Command>,
        alarm: AlarmMessage,
        after: Duration,
    ) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let feedback = feedback.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(commands) = feedback.upgrade() {
                let _ = commands.send(alarm.into());
            }
        }));
    }
}

impl Drop for PendingAlarm {
    /// Aborts the pending sleep so it cannot outlive the session
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawns the session task for a game and returns a handle to it
///
/// The task owns the game and the gateway and processes commands one at a
/// time until every handle is dropped or a [`Command::Shutdown`] arrives.
///
/// # Arguments
///
/// * `game` - The session state to drive
/// * `gateway` - Outbound fan-out used for every event the game emits
pub fn spawn<G>(game: Game, gateway: G) -> SessionHandle
where
    G: Gateway + Send + 'static,
{
    let (commands, inbox) = mpsc::unbounded_channel();
    let feedback = commands.downgrade();

    tokio::spawn(session_loop(game, gateway, inbox, feedback));

    SessionHandle { commands }
}

/// Consumes commands one at a time, keeping all game access serialized
async fn session_loop<G: Gateway>(
    mut game: Game,
    gateway: G,
    mut inbox: mpsc::UnboundedReceiver<Command>,
    feedback: mpsc::WeakUnboundedSender<Command>,
) {
    debug!("session loop started");
    let mut pending = PendingAlarm::default();

    while let Some(command) = inbox.recv().await {
        let mut armed = Vec::new();
        let schedule = |alarm: AlarmMessage, after: Duration| armed.push((alarm, after));

        match command {
            Command::Join { id, name } => {
                if let Err(error) = game.add_player(id, &name, &gateway) {
                    warn!(%id, %error, "join rejected");
                }
            }
            Command::Incoming { id, message } => {
                game.receive_message(id, message, schedule, &gateway);
            }
            Command::Disconnect { id } => {
                game.remove_player(id, schedule, &gateway);
            }
            Command::Alarm(alarm) => {
                game.receive_alarm(alarm, schedule, &gateway);
            }
            Command::Shutdown => {
                debug!("shutdown requested");
                break;
            }
        }

        for (alarm, after) in armed {
            pending.arm(&feedback, alarm, after);
        }
    }

    debug!("session loop exited");
}
