use std::sync::{Arc, Mutex};

use rand::{distributions::Alphanumeric, Rng};
use tracing::{debug, info, warn};

use crate::errors::{ClientError, ClientResult};
use crate::planner::Planner;
use crate::protocol::ClientCommand;
use crate::snapshot::SnapshotCache;
use crate::transport::Requester;
use crate::types::{GameSnapshot, GameView, Seat, TurnPlan};

/// Where the local player stands in this turn's commit-reveal handshake.
/// The turn number is carried in every committed phase so stale snapshots
/// and duplicate triggers can be told apart from live ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    Planning,
    Committed(u32),
    AwaitingPeer(u32),
    Revealing(u32),
    Resolved(u32),
}

/// BASED stakes overlay. `Offered` means the opponent has raised and we have
/// not answered yet; while it holds, the automatic reveal is suspended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakesPhase {
    Idle,
    Offered,
    Accepted,
    Declined,
}

/// The frozen {seat, plan, salt, turn} tuple sent at commit time. The reveal
/// must repeat it byte for byte.
#[derive(Clone, Debug)]
struct CommitTicket {
    seat: Seat,
    plan: TurnPlan,
    salt: String,
    turn: u32,
}

struct CoordState {
    phase: TurnPhase,
    ticket: Option<CommitTicket>,
    stakes: StakesPhase,
    last_turn: Option<u32>,
}

/// Drives the two-phase turn handshake.
///
/// Commits when the player ends the turn; reveals when the snapshot shows
/// every seat committed for the current turn and our own commit unrevealed.
/// Entering `Revealing` is the single-flight guard: the snapshot watcher runs
/// the decision sequentially, so once the phase holds a turn number no second
/// reveal for it can be issued, and the spawned request checks the phase
/// again before applying its outcome.
pub struct Coordinator {
    requester: Arc<dyn Requester>,
    planner: Arc<Mutex<Planner>>,
    cache: SnapshotCache,
    node_id: String,
    state: Mutex<CoordState>,
}

impl Coordinator {
    pub fn new(
        requester: Arc<dyn Requester>,
        planner: Arc<Mutex<Planner>>,
        cache: SnapshotCache,
        node_id: String,
    ) -> Self {
        Self {
            requester,
            planner,
            cache,
            node_id,
            state: Mutex::new(CoordState {
                phase: TurnPhase::Planning,
                ticket: None,
                stakes: StakesPhase::Idle,
                last_turn: None,
            }),
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.state.lock().unwrap().phase
    }

    /// True while the opponent's stakes offer is waiting for our answer.
    pub fn has_stakes_offer(&self) -> bool {
        self.state.lock().unwrap().stakes == StakesPhase::Offered
    }

    /// Our seat in the current game, derived from the configured node id.
    pub fn seat(&self) -> ClientResult<Seat> {
        let snapshot = self.cache.latest().ok_or(ClientError::NoActiveGame)?;
        let game = snapshot.game.ok_or(ClientError::NoActiveGame)?;
        game.seat_of_node(&self.node_id)
            .ok_or(ClientError::SeatUnassigned)
    }

    /// Freeze the draft plan, lock the accumulator and send the commit.
    /// A failed commit releases the lock so the player may retry; a repeat
    /// trigger for an already-committed turn is a no-op; a trigger that finds
    /// the phase still locked for an older turn drops the stale state and
    /// errors rather than committing a plan the player never drafted.
    pub async fn end_turn(&self) -> ClientResult<()> {
        let snapshot = self.cache.latest().ok_or(ClientError::NoActiveGame)?;
        let game = snapshot.game.ok_or(ClientError::NoActiveGame)?;
        let seat = game
            .seat_of_node(&self.node_id)
            .ok_or(ClientError::SeatUnassigned)?;
        let turn = game.turn;

        {
            let mut state = self.state.lock().unwrap();
            match state.phase {
                TurnPhase::Planning => {}
                TurnPhase::Committed(t)
                | TurnPhase::AwaitingPeer(t)
                | TurnPhase::Revealing(t)
                | TurnPhase::Resolved(t)
                    if t == turn =>
                {
                    debug!(turn, "end turn ignored, already committed");
                    return Ok(());
                }
                // Locked for a turn the server has left behind: release the
                // stale commit and reject this trigger. Committing here would
                // send a plan the player never drafted for the new turn; an
                // explicit retry goes through the arm above as Planning.
                _ => {
                    warn!(turn, phase = ?state.phase, "dropping stale commit state");
                    state.ticket = None;
                    state.phase = TurnPhase::Planning;
                    self.planner.lock().unwrap().reset();
                    return Err(ClientError::PlanLocked);
                }
            }
        }

        let (plan, salt) = {
            let mut planner = self.planner.lock().unwrap();
            if planner.is_locked() {
                return Err(ClientError::PlanLocked);
            }
            planner.lock();
            (planner.plan().clone(), fresh_salt())
        };
        {
            let mut state = self.state.lock().unwrap();
            state.phase = TurnPhase::Committed(turn);
            state.ticket = Some(CommitTicket {
                seat: seat.clone(),
                plan: plan.clone(),
                salt: salt.clone(),
                turn,
            });
        }

        match self
            .requester
            .request(ClientCommand::CommitTurn {
                seat,
                plan,
                salt,
                turn,
            })
            .await
        {
            Ok(_) => {
                info!(turn, "turn committed");
                Ok(())
            }
            Err(err) => {
                warn!(turn, %err, "commit failed, unlocking plan");
                let mut state = self.state.lock().unwrap();
                state.phase = TurnPhase::Planning;
                state.ticket = None;
                self.planner.lock().unwrap().unlock();
                Err(err)
            }
        }
    }

    /// React to a snapshot update. Called sequentially by the watcher task;
    /// this is the only place reveals are initiated.
    pub fn on_snapshot(self: &Arc<Self>, snapshot: Option<&GameSnapshot>) {
        let game = match snapshot.and_then(|s| s.game.as_ref()) {
            Some(game) => game,
            None => {
                // No game any more: drop the draft and all handshake state.
                let mut state = self.state.lock().unwrap();
                state.phase = TurnPhase::Planning;
                state.ticket = None;
                state.stakes = StakesPhase::Idle;
                state.last_turn = None;
                self.planner.lock().unwrap().reset();
                return;
            }
        };

        let mut to_reveal = None;
        {
            let mut state = self.state.lock().unwrap();

            // A new turn number always starts from a clean draft.
            if state.last_turn != Some(game.turn) {
                if state.last_turn.is_some() {
                    self.planner.lock().unwrap().reset();
                }
                state.last_turn = Some(game.turn);
            }

            self.update_stakes(&mut state, game);

            match state.phase {
                TurnPhase::Committed(turn) | TurnPhase::AwaitingPeer(turn) => {
                    if game.turn > turn {
                        // The server resolved past us; a reveal for this turn
                        // would land in a round no longer in resolution.
                        warn!(tracked = turn, observed = game.turn, "abandoning stale turn");
                        state.phase = TurnPhase::Planning;
                        state.ticket = None;
                        self.planner.lock().unwrap().reset();
                    } else if game.turn == turn {
                        if game.all_committed()
                            && !self.local_revealed(&state, game)
                            && state.stakes != StakesPhase::Offered
                        {
                            // Single-flight: flipping the phase here is what
                            // keeps a second wakeup from re-sending.
                            state.phase = TurnPhase::Revealing(turn);
                            to_reveal = state.ticket.clone();
                        } else {
                            state.phase = TurnPhase::AwaitingPeer(turn);
                        }
                    }
                }
                TurnPhase::Revealing(turn) if game.turn > turn => {
                    warn!(tracked = turn, observed = game.turn, "abandoning in-flight reveal");
                    state.phase = TurnPhase::Planning;
                    state.ticket = None;
                    self.planner.lock().unwrap().reset();
                }
                TurnPhase::Resolved(turn) if game.turn != turn => {
                    state.phase = TurnPhase::Planning;
                }
                _ => {}
            }
        }

        if let Some(ticket) = to_reveal {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                coordinator.send_reveal(ticket).await;
            });
        }
    }

    fn update_stakes(&self, state: &mut CoordState, game: &GameView) {
        let offered_to_us = game
            .pending_stakes
            .as_deref()
            .map(|holder| holder != self.node_id)
            .unwrap_or(false);
        match state.stakes {
            StakesPhase::Idle if offered_to_us => {
                info!("opponent raised the stakes, suspending reveal");
                state.stakes = StakesPhase::Offered;
            }
            StakesPhase::Offered if !offered_to_us => {
                state.stakes = StakesPhase::Idle;
            }
            StakesPhase::Accepted | StakesPhase::Declined
                if game.pending_stakes.is_none() =>
            {
                state.stakes = StakesPhase::Idle;
            }
            _ => {}
        }
    }

    fn local_revealed(&self, state: &CoordState, game: &GameView) -> bool {
        let Some(ticket) = state.ticket.as_ref() else {
            return false;
        };
        game.player(&ticket.seat)
            .and_then(|p| p.commit.as_ref())
            .map(|c| c.turn == ticket.turn && c.revealed.is_some())
            .unwrap_or(false)
    }

    async fn send_reveal(self: Arc<Self>, ticket: CommitTicket) {
        let result = self
            .requester
            .request(ClientCommand::RevealTurn {
                seat: ticket.seat.clone(),
                plan: ticket.plan.clone(),
                salt: ticket.salt.clone(),
                turn: ticket.turn,
            })
            .await;

        let mut state = self.state.lock().unwrap();
        if state.phase != TurnPhase::Revealing(ticket.turn) {
            // Abandoned while we were in flight; whatever came back is moot.
            debug!(turn = ticket.turn, "dropping outcome of abandoned reveal");
            return;
        }
        match result {
            Ok(_) => {
                info!(turn = ticket.turn, "turn revealed");
                state.phase = TurnPhase::Resolved(ticket.turn);
                state.ticket = None;
                self.planner.lock().unwrap().reset();
            }
            Err(err) => {
                warn!(turn = ticket.turn, %err, "reveal failed, clearing guard");
                // Clear the in-flight guard; the next snapshot may retry.
                state.phase = TurnPhase::AwaitingPeer(ticket.turn);
            }
        }
    }

    /// Raise the stakes ourselves. Also records the intent on the draft plan
    /// so a commit carries it.
    pub async fn call_stakes(&self) -> ClientResult<()> {
        let seat = self.seat()?;
        self.planner.lock().unwrap().set_based(true);
        self.requester
            .request(ClientCommand::CallBased { seat })
            .await
            .map(|_| ())
    }

    /// Accept the opponent's raise, doubling effective stakes. The offer flag
    /// clears once the answer is sent, whatever the server says.
    pub async fn accept_stakes(&self) -> ClientResult<()> {
        let seat = self.seat()?;
        self.state.lock().unwrap().stakes = StakesPhase::Accepted;
        self.requester
            .request(ClientCommand::AcceptBased { seat })
            .await
            .map(|_| ())
    }

    /// Decline the raise, forfeiting the turn's stakes increase.
    pub async fn decline_stakes(&self) -> ClientResult<()> {
        let seat = self.seat()?;
        self.state.lock().unwrap().stakes = StakesPhase::Declined;
        self.requester
            .request(ClientCommand::FoldBased { seat })
            .await
            .map(|_| ())
    }
}

fn fresh_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salt_is_fresh_per_call() {
        let a = fresh_salt();
        let b = fresh_salt();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
