//! Tokio event loop
//!
//! A single task owns the [`Game`] and processes connection events and
//! fired alarms one at a time, so the core never needs a lock. Transports
//! talk to that task through a cloneable [`GameHandle`] and receive their
//! outbound events on a per-connection channel.

use std::collections::HashMap;

use tokio::{
    sync::mpsc,
    task::{AbortHandle, JoinHandle},
};
use tracing::{debug, info};
use web_time::Duration;

use crate::{
    AlarmMessage, UpdateMessage,
    config::GameConfig,
    game::{Game, IncomingMessage},
    scheduler::{Scheduler, TimerId},
    session::Tunnel,
    watcher::Id,
};

/// What the event loop pushes to one connection
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// An event to serialize and send
    Message(UpdateMessage),
    /// The server is dropping this connection
    Close,
}

/// A tunnel backed by an unbounded channel to the connection's writer
#[derive(Debug, Clone)]
pub struct ChannelTunnel(mpsc::UnboundedSender<Outbound>);

impl Tunnel for ChannelTunnel {
    fn send_message(&self, message: &UpdateMessage) {
        // A closed receiver means the disconnect is already queued.
        let _ = self.0.send(Outbound::Message(message.clone()));
    }

    fn close(self) {
        let _ = self.0.send(Outbound::Close);
    }
}

/// Inputs of the event loop
#[derive(Debug)]
pub enum Event {
    /// A transport accepted a connection
    Connected {
        /// The new connection
        id: Id,
        /// Where to push its events
        tunnel: ChannelTunnel,
    },
    /// A connection sent a command
    Message {
        /// The sender
        id: Id,
        /// The parsed command
        message: IncomingMessage,
    },
    /// A connection went away
    Disconnected {
        /// The closed connection
        id: Id,
    },
    /// An armed alarm fired
    Alarm {
        /// The timer that fired
        timer: TimerId,
        /// What it carries
        alarm: AlarmMessage,
    },
    /// Stop the loop
    Shutdown,
}

/// Scheduler whose alarms are sleeping tokio tasks
///
/// Alarm tasks only hold a weak sender so pending alarms never keep the
/// event loop alive.
#[derive(Debug)]
pub struct TokioScheduler {
    events: mpsc::WeakUnboundedSender<Event>,
    timers: HashMap<TimerId, AbortHandle>,
    next_id: u64,
}

impl TokioScheduler {
    fn new(events: mpsc::WeakUnboundedSender<Event>) -> Self {
        Self {
            events,
            timers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Marks `timer` as fired
    ///
    /// Returns `false` if the timer was cancelled after its task had
    /// already queued the alarm.
    fn fired(&mut self, timer: TimerId) -> bool {
        self.timers.remove(&timer).is_some()
    }

    fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, alarm: AlarmMessage, after: Duration) -> TimerId {
        self.next_id += 1;
        let timer = TimerId::new(self.next_id);
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(events) = events.upgrade() {
                let _ = events.send(Event::Alarm { timer, alarm });
            }
        });
        self.timers.insert(timer, task.abort_handle());

        timer
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(handle) = self.timers.remove(&timer) {
            handle.abort();
        }
    }
}

/// Cloneable entry point into a running game
#[derive(Debug, Clone)]
pub struct GameHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl GameHandle {
    fn submit(&self, event: Event) {
        if self.events.send(event).is_err() {
            debug!("event dropped, game loop has exited");
        }
    }

    /// Registers a new connection
    ///
    /// # Returns
    ///
    /// The connection's id and the receiving end of its outbound channel
    pub fn connect(&self) -> (Id, mpsc::UnboundedReceiver<Outbound>) {
        let id = Id::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.submit(Event::Connected {
            id,
            tunnel: ChannelTunnel(sender),
        });
        (id, receiver)
    }

    /// Forwards a command from `id`
    pub fn send(&self, id: Id, message: IncomingMessage) {
        self.submit(Event::Message { id, message });
    }

    /// Reports that `id` went away
    pub fn disconnect(&self, id: Id) {
        self.submit(Event::Disconnected { id });
    }

    /// Asks the event loop to cancel every timer and exit
    pub fn shutdown(&self) {
        self.submit(Event::Shutdown);
    }
}

/// Starts the event loop for a fresh game on the current tokio runtime
///
/// The loop exits on [`GameHandle::shutdown`] or once every handle has been
/// dropped.
pub fn spawn(config: GameConfig) -> (GameHandle, JoinHandle<()>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let scheduler = TokioScheduler::new(sender.downgrade());
    let game = Game::new(config, fastrand::Rng::new());

    let task = tokio::spawn(run(game, scheduler, receiver));

    (GameHandle { events: sender }, task)
}

async fn run(
    mut game: Game,
    mut scheduler: TokioScheduler,
    mut events: mpsc::UnboundedReceiver<Event>,
) {
    let mut tunnels: HashMap<Id, ChannelTunnel> = HashMap::new();

    info!("game loop started");

    while let Some(event) = events.recv().await {
        match event {
            Event::Connected { id, tunnel } => {
                tunnels.insert(id, tunnel);
                game.connect(id);
            }
            Event::Message { id, message } => {
                game.receive_message(id, message, &mut scheduler, |id: Id| {
                    tunnels.get(&id).cloned()
                });
            }
            Event::Disconnected { id } => {
                tunnels.remove(&id);
                game.disconnect(id, |id: Id| tunnels.get(&id).cloned());
            }
            Event::Alarm { timer, alarm } => {
                if !scheduler.fired(timer) {
                    debug!(?alarm, "cancelled alarm dropped");
                    continue;
                }
                game.receive_alarm(alarm, &mut scheduler, |id: Id| tunnels.get(&id).cloned());
            }
            Event::Shutdown => break,
        }
    }

    game.shutdown(&mut scheduler);
    scheduler.cancel_all();

    info!("game loop stopped");
}
