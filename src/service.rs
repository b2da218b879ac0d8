//! Single-threaded simulation actor. Every mutation of a running session
//! goes through one queue, so a day advance never overlaps a save, a
//! placement or a deletion.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    catalog::{BuildingKind, Resources},
    engine::DaySummary,
    grid::TilePos,
    interaction::Command,
    placement::PlacementError,
    session::{CommandOutcome, Session},
    snapshot::{GameStateData, PersistenceError},
    world::Selection,
};

const COMMAND_QUEUE: usize = 64;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("the simulation has stopped")]
    Stopped,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub enum SimCommand {
    AdvanceDay(oneshot::Sender<DaySummary>),
    Apply(Command, oneshot::Sender<CommandOutcome>),
    Save(oneshot::Sender<Result<PathBuf, PersistenceError>>),
    Load(oneshot::Sender<Result<(), PersistenceError>>),
    Snapshot(oneshot::Sender<GameStateData>),
    Status(oneshot::Sender<SessionStatus>),
    Shutdown,
}

/// Notifications for presentation collaborators (HUD, audio).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    DayAdvanced { day: u32, inventory: Resources },
    BuildingPlaced { pos: TilePos, kind: BuildingKind },
    PlacementRejected { pos: TilePos, kind: BuildingKind, error: PlacementError },
    ObjectDestroyed { pos: TilePos, refund: Resources },
    Saved(PathBuf),
    Loaded { day: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub day: u32,
    pub year: u32,
    pub inventory: Resources,
    pub selection: Selection,
    pub residents: usize,
}

#[derive(Clone)]
pub struct SimHandle {
    commands: mpsc::Sender<SimCommand>,
    events: broadcast::Sender<SimEvent>,
}

impl SimHandle {
    /// Moves the session onto a blocking worker. The join handle yields the
    /// session back once the actor shuts down.
    pub fn spawn(session: Session) -> (Self, JoinHandle<Session>) {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let events_for_actor = events.clone();
        let actor = tokio::task::spawn_blocking(move || run_actor(session, rx, events_for_actor));
        (Self { commands, events }, actor)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SimCommand,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ServiceError::Stopped)?;
        response.await.map_err(|_| ServiceError::Stopped)
    }

    pub async fn advance_day(&self) -> Result<DaySummary, ServiceError> {
        self.request(SimCommand::AdvanceDay).await
    }

    pub async fn apply(&self, command: Command) -> Result<CommandOutcome, ServiceError> {
        self.request(|reply| SimCommand::Apply(command, reply)).await
    }

    pub async fn place_building(
        &self,
        pos: TilePos,
        kind: BuildingKind,
    ) -> Result<CommandOutcome, ServiceError> {
        self.apply(Command::PlaceBuilding { pos, kind }).await
    }

    pub async fn delete_building(&self, pos: TilePos) -> Result<CommandOutcome, ServiceError> {
        self.apply(Command::DeleteBuilding(pos)).await
    }

    pub async fn select_tile(&self, pos: TilePos) -> Result<CommandOutcome, ServiceError> {
        self.apply(Command::SelectTile(pos)).await
    }

    pub async fn set_selected_object(
        &self,
        kind: Option<BuildingKind>,
    ) -> Result<CommandOutcome, ServiceError> {
        self.apply(Command::SetSelectedObject(kind)).await
    }

    pub async fn save(&self) -> Result<PathBuf, ServiceError> {
        Ok(self.request(SimCommand::Save).await??)
    }

    pub async fn load(&self) -> Result<(), ServiceError> {
        Ok(self.request(SimCommand::Load).await??)
    }

    pub async fn snapshot(&self) -> Result<GameStateData, ServiceError> {
        self.request(SimCommand::Snapshot).await
    }

    pub async fn status(&self) -> Result<SessionStatus, ServiceError> {
        self.request(SimCommand::Status).await
    }

    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.commands
            .send(SimCommand::Shutdown)
            .await
            .map_err(|_| ServiceError::Stopped)
    }
}

fn run_actor(
    mut session: Session,
    mut rx: mpsc::Receiver<SimCommand>,
    events: broadcast::Sender<SimEvent>,
) -> Session {
    let publish = |event: SimEvent| {
        // no subscribers is fine
        let _ = events.send(event);
    };

    while let Some(command) = rx.blocking_recv() {
        match command {
            SimCommand::AdvanceDay(reply) => {
                let summary = session.advance_day();
                publish(SimEvent::DayAdvanced {
                    day: session.world().day(),
                    inventory: summary.inventory,
                });
                if let Some(path) = &summary.saved_to {
                    publish(SimEvent::Saved(path.clone()));
                }
                let _ = reply.send(summary);
            }
            SimCommand::Apply(command, reply) => {
                let outcome = session.apply(command);
                for event in events_for(&outcome) {
                    publish(event);
                }
                let _ = reply.send(outcome);
            }
            SimCommand::Save(reply) => {
                let result = session.save();
                if let Ok(path) = &result {
                    publish(SimEvent::Saved(path.clone()));
                }
                let _ = reply.send(result);
            }
            SimCommand::Load(reply) => {
                let result = session.reload();
                match &result {
                    Ok(()) => publish(SimEvent::Loaded {
                        day: session.world().day(),
                    }),
                    Err(err) => warn!(error = %err, "service.load_failed"),
                }
                let _ = reply.send(result);
            }
            SimCommand::Snapshot(reply) => {
                let _ = reply.send(session.snapshot());
            }
            SimCommand::Status(reply) => {
                let world = session.world();
                let _ = reply.send(SessionStatus {
                    day: world.day(),
                    year: world.year(),
                    inventory: world.inventory().balances(),
                    selection: world.selection().clone(),
                    residents: world.total_residents(),
                });
            }
            SimCommand::Shutdown => {
                debug!("service.shutdown_requested");
                break;
            }
        }
    }
    info!(day = session.world().day(), "service.stopped");
    session
}

fn events_for(outcome: &CommandOutcome) -> Vec<SimEvent> {
    match outcome {
        CommandOutcome::Placed(placed) => vec![SimEvent::BuildingPlaced {
            pos: placed.pos,
            kind: placed.kind,
        }],
        CommandOutcome::PlacementRejected { pos, kind, error } => vec![SimEvent::PlacementRejected {
            pos: *pos,
            kind: *kind,
            error: *error,
        }],
        CommandOutcome::Removed(removal) => vec![SimEvent::ObjectDestroyed {
            pos: removal.pos,
            refund: removal.refund,
        }],
        CommandOutcome::RoadBuilt { built, .. } => built
            .iter()
            .map(|placed| SimEvent::BuildingPlaced {
                pos: placed.pos,
                kind: placed.kind,
            })
            .collect(),
        CommandOutcome::DeletionRejected { .. } | CommandOutcome::Updated => Vec::new(),
    }
}

/// Submits one day advance per period. The next tick is not requested until
/// the previous advance has been answered.
pub fn spawn_day_timer(handle: SimHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            match handle.advance_day().await {
                Ok(summary) => debug!(day = summary.day, "service.timer_tick"),
                Err(_) => break,
            }
        }
    })
}
