use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::sleep;

use mcg_client::coordinator::{Coordinator, TurnPhase};
use mcg_client::errors::{ClientError, ClientResult};
use mcg_client::planner::Planner;
use mcg_client::protocol::{ClientCommand, ServerReply};
use mcg_client::snapshot::SnapshotCache;
use mcg_client::transport::Requester;
use mcg_client::types::{
    GameSnapshot, GameView, Phase, PlayerView, Seat, TurnCommit, TurnPlan,
};

const HOST_NODE: &str = "host.node";
const OPP_NODE: &str = "opp.node";

/// In-memory stand-in for the websocket transport. Records every command and
/// answers with Ack, with optional failure/delay knobs per command kind.
struct FakeRequester {
    sent: Mutex<Vec<ClientCommand>>,
    fail_commits: bool,
    reveal_delay: Duration,
}

impl FakeRequester {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_commits: false,
            reveal_delay: Duration::from_millis(0),
        })
    }

    fn failing_commits() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_commits: true,
            reveal_delay: Duration::from_millis(0),
        })
    }

    fn slow_reveals(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_commits: false,
            reveal_delay: delay,
        })
    }

    fn sent(&self) -> Vec<ClientCommand> {
        self.sent.lock().unwrap().clone()
    }

    fn reveals(&self) -> Vec<ClientCommand> {
        self.sent()
            .into_iter()
            .filter(|c| matches!(c, ClientCommand::RevealTurn { .. }))
            .collect()
    }
}

#[async_trait]
impl Requester for FakeRequester {
    async fn request(&self, command: ClientCommand) -> ClientResult<ServerReply> {
        self.sent.lock().unwrap().push(command.clone());
        match command {
            ClientCommand::CommitTurn { .. } if self.fail_commits => {
                Err(ClientError::NotConnected)
            }
            ClientCommand::RevealTurn { .. } => {
                sleep(self.reveal_delay).await;
                Ok(ServerReply::Ack)
            }
            _ => Ok(ServerReply::Ack),
        }
    }
}

fn player(seat: Seat, node_id: &str, committed_turn: Option<u32>) -> PlayerView {
    PlayerView {
        seat,
        node_id: node_id.to_string(),
        hand: vec![],
        kitchen: vec![],
        abyss: vec![],
        mana: 3,
        max_mana: 3,
        score: 0,
        cost_discount: 0,
        commit: committed_turn.map(|turn| TurnCommit {
            hash: format!("hash-{turn}"),
            salt: None,
            revealed: None,
            turn,
        }),
        feed_locked: false,
    }
}

fn snapshot(turn: u32, host_commit: Option<u32>, opp_commit: Option<u32>) -> GameSnapshot {
    snapshot_with_stakes(turn, host_commit, opp_commit, None)
}

fn snapshot_with_stakes(
    turn: u32,
    host_commit: Option<u32>,
    opp_commit: Option<u32>,
    pending_stakes: Option<&str>,
) -> GameSnapshot {
    GameSnapshot {
        catalog: vec![],
        game: Some(GameView {
            feed: vec![],
            players: vec![
                player(Seat::Host, HOST_NODE, host_commit),
                player(Seat::Opponent, OPP_NODE, opp_commit),
            ],
            turn,
            phase: Phase::Commit,
            stakes: 1,
            pending_stakes: pending_stakes.map(str::to_string),
            winner: None,
        }),
        lobbies: vec![],
    }
}

struct Rig {
    requester: Arc<FakeRequester>,
    planner: Arc<Mutex<Planner>>,
    cache: SnapshotCache,
    coordinator: Arc<Coordinator>,
}

fn rig(requester: Arc<FakeRequester>) -> Rig {
    let planner = Arc::new(Mutex::new(Planner::new()));
    let cache = SnapshotCache::new();
    let coordinator = Arc::new(Coordinator::new(
        requester.clone(),
        planner.clone(),
        cache.clone(),
        HOST_NODE.to_string(),
    ));
    Rig {
        requester,
        planner,
        cache,
        coordinator,
    }
}

fn push(rig: &Rig, snapshot: GameSnapshot) {
    rig.cache.publish(snapshot.clone());
    rig.coordinator.on_snapshot(Some(&snapshot));
}

#[tokio::test]
async fn both_committed_triggers_exactly_one_reveal() -> Result<()> {
    let rig = rig(FakeRequester::new());
    push(&rig, snapshot(5, None, None));

    rig.coordinator.end_turn().await?;
    assert_eq!(rig.coordinator.phase(), TurnPhase::Committed(5));
    assert!(rig.planner.lock().unwrap().is_locked());

    // Both seats now show commit records for turn 5; local not yet revealed.
    push(&rig, snapshot(5, Some(5), Some(5)));
    sleep(Duration::from_millis(50)).await;

    let reveals = rig.requester.reveals();
    assert_eq!(reveals.len(), 1);
    assert_eq!(rig.coordinator.phase(), TurnPhase::Resolved(5));
    assert!(!rig.planner.lock().unwrap().is_locked());
    assert_eq!(rig.planner.lock().unwrap().plan(), &TurnPlan::default());
    Ok(())
}

#[tokio::test]
async fn reveal_repeats_the_committed_tuple() -> Result<()> {
    let rig = rig(FakeRequester::new());
    push(&rig, snapshot(2, None, None));
    rig.coordinator.end_turn().await?;
    push(&rig, snapshot(2, Some(2), Some(2)));
    sleep(Duration::from_millis(50)).await;

    let sent = rig.requester.sent();
    let commit = sent
        .iter()
        .find(|c| matches!(c, ClientCommand::CommitTurn { .. }))
        .expect("commit sent");
    let reveal = sent
        .iter()
        .find(|c| matches!(c, ClientCommand::RevealTurn { .. }))
        .expect("reveal sent");

    let ClientCommand::CommitTurn {
        seat: cs,
        plan: cp,
        salt: csalt,
        turn: ct,
    } = commit
    else {
        unreachable!()
    };
    let ClientCommand::RevealTurn {
        seat: rs,
        plan: rp,
        salt: rsalt,
        turn: rt,
    } = reveal
    else {
        unreachable!()
    };
    assert_eq!((cs, cp, csalt, ct), (rs, rp, rsalt, rt));
    Ok(())
}

#[tokio::test]
async fn duplicate_snapshot_wakeups_do_not_double_reveal() -> Result<()> {
    let rig = rig(FakeRequester::slow_reveals(Duration::from_millis(100)));
    push(&rig, snapshot(3, None, None));
    rig.coordinator.end_turn().await?;

    // Several updates land while the first reveal is still in flight.
    push(&rig, snapshot(3, Some(3), Some(3)));
    push(&rig, snapshot(3, Some(3), Some(3)));
    push(&rig, snapshot(3, Some(3), Some(3)));
    sleep(Duration::from_millis(200)).await;

    assert_eq!(rig.requester.reveals().len(), 1);
    assert_eq!(rig.coordinator.phase(), TurnPhase::Resolved(3));
    Ok(())
}

#[tokio::test]
async fn duplicate_end_turn_sends_one_commit() -> Result<()> {
    let rig = rig(FakeRequester::new());
    push(&rig, snapshot(1, None, None));
    rig.coordinator.end_turn().await?;
    rig.coordinator.end_turn().await?;

    let commits = rig
        .requester
        .sent()
        .into_iter()
        .filter(|c| matches!(c, ClientCommand::CommitTurn { .. }))
        .count();
    assert_eq!(commits, 1);
    Ok(())
}

#[tokio::test]
async fn turn_advancing_past_commit_abandons_the_reveal() -> Result<()> {
    let rig = rig(FakeRequester::new());
    push(&rig, snapshot(4, None, None));
    rig.coordinator.end_turn().await?;

    // The server resolved turn 4 without us and moved on.
    push(&rig, snapshot(5, None, None));
    sleep(Duration::from_millis(50)).await;

    assert!(rig.requester.reveals().is_empty());
    assert_eq!(rig.coordinator.phase(), TurnPhase::Planning);
    assert!(!rig.planner.lock().unwrap().is_locked());

    // The guard is clear: the next turn commits normally.
    rig.coordinator.end_turn().await?;
    assert_eq!(rig.coordinator.phase(), TurnPhase::Committed(5));
    Ok(())
}

#[tokio::test]
async fn stale_lock_rejects_end_turn_instead_of_committing_blind() -> Result<()> {
    let rig = rig(FakeRequester::new());
    push(&rig, snapshot(1, None, None));
    rig.coordinator.end_turn().await?;

    // The cache has already moved to turn 2 but the watcher has not fed it to
    // the coordinator yet, so the phase still holds the turn-1 commit.
    rig.cache.publish(snapshot(2, None, None));

    let err = rig.coordinator.end_turn().await.unwrap_err();
    assert!(matches!(err, ClientError::PlanLocked));
    assert_eq!(rig.coordinator.phase(), TurnPhase::Planning);
    assert!(!rig.planner.lock().unwrap().is_locked());

    // No unplanned commit went out for turn 2.
    let turns: Vec<u32> = rig
        .requester
        .sent()
        .into_iter()
        .filter_map(|c| match c {
            ClientCommand::CommitTurn { turn, .. } => Some(turn),
            _ => None,
        })
        .collect();
    assert_eq!(turns, vec![1]);

    // An explicit retry commits for the observed turn.
    rig.coordinator.end_turn().await?;
    assert_eq!(rig.coordinator.phase(), TurnPhase::Committed(2));
    Ok(())
}

#[tokio::test]
async fn failed_commit_releases_the_plan_lock() -> Result<()> {
    let rig = rig(FakeRequester::failing_commits());
    push(&rig, snapshot(1, None, None));

    let err = rig.coordinator.end_turn().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(rig.coordinator.phase(), TurnPhase::Planning);
    assert!(!rig.planner.lock().unwrap().is_locked());
    Ok(())
}

#[tokio::test]
async fn stakes_offer_suspends_reveal_until_answered() -> Result<()> {
    let rig = rig(FakeRequester::new());
    push(&rig, snapshot(6, None, None));
    rig.coordinator.end_turn().await?;

    // Both committed, but the opponent has an unanswered BASED offer up.
    push(&rig, snapshot_with_stakes(6, Some(6), Some(6), Some(OPP_NODE)));
    sleep(Duration::from_millis(50)).await;
    assert!(rig.coordinator.has_stakes_offer());
    assert!(rig.requester.reveals().is_empty());
    assert_eq!(rig.coordinator.phase(), TurnPhase::AwaitingPeer(6));

    rig.coordinator.accept_stakes().await?;
    assert!(!rig.coordinator.has_stakes_offer());

    // Offer resolved server-side; the reveal may now proceed.
    push(&rig, snapshot(6, Some(6), Some(6)));
    sleep(Duration::from_millis(50)).await;
    assert_eq!(rig.requester.reveals().len(), 1);
    assert_eq!(rig.coordinator.phase(), TurnPhase::Resolved(6));
    Ok(())
}

#[tokio::test]
async fn own_stakes_call_is_not_an_offer_to_us() -> Result<()> {
    let rig = rig(FakeRequester::new());
    push(&rig, snapshot(2, None, None));
    rig.coordinator.call_stakes().await?;
    assert!(rig.planner.lock().unwrap().plan().based);

    push(&rig, snapshot_with_stakes(2, None, None, Some(HOST_NODE)));
    assert!(!rig.coordinator.has_stakes_offer());
    Ok(())
}

#[tokio::test]
async fn leaving_the_match_clears_all_handshake_state() -> Result<()> {
    let rig = rig(FakeRequester::new());
    push(&rig, snapshot(3, None, None));
    rig.coordinator.end_turn().await?;

    let empty = GameSnapshot {
        catalog: vec![],
        game: None,
        lobbies: vec![],
    };
    push(&rig, empty);

    assert_eq!(rig.coordinator.phase(), TurnPhase::Planning);
    assert!(!rig.planner.lock().unwrap().is_locked());
    assert!(rig.coordinator.seat().is_err());
    Ok(())
}
