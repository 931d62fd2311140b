use serde::{Deserialize, Serialize};

// Mirrored domain model. Every shape here is the client-side view of a value
// the server owns; field names must stay wire-compatible with the backend.
// Card and commit instances are only ever observed, never constructed locally.

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Seat {
    Host,
    Opponent,
}

impl Seat {
    pub fn other(&self) -> Seat {
        match self {
            Seat::Host => Seat::Opponent,
            Seat::Opponent => Seat::Host,
        }
    }
}

/// Where a card instance currently lives. A card occupies exactly one
/// location; the slot index is only meaningful inside the feed.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Location {
    Deck,
    Hand,
    Kitchen,
    Feed(FeedSlot),
    Abyss,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FeedSlot {
    pub slot: usize,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Keyword {
    Haste,
    Stealth,
    Fragile,
    Shielded(ShieldedKeyword),
    Taunt,
    Anchor,
    Heavy,
    Gatekeeper(GatekeeperKeyword),
    HealKitchen,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ShieldedKeyword {
    pub amount: i32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct GatekeeperKeyword {
    pub max_cost: u8,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum CardKind {
    Meme(MemeBlueprint),
    Exploit(ExploitEffect),
}

/// Stats block for a meme card. The server also ships trigger/ability data in
/// this object; the client does not act on abilities and lets serde drop them.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MemeBlueprint {
    pub base_virality: i32,
    pub cook_rate: i32,
    pub yield_rate: i32,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub volatile: Option<i32>,
    #[serde(default)]
    pub initial_freeze: Option<u32>,
}

/// The closed set of exploit effect kinds. Target legality is derived from the
/// variant alone (see `legality::target_profile`), so adding a kind here is a
/// compile-time-checked change to the rules table.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum ExploitEffect {
    Damage(DamageParams),
    AreaDamageKitchen(i32),
    Boost(i32),
    Debuff(i32),
    ResurrectLast,
    Protect,
    Double,
    Execute,
    PinSlot(usize),
    MoveUp(usize),
    LockFeed,
    NukeBelow(NukeParams),
    Tax(TaxParams),
    ShuffleFeed,
    DiscountNext,
    ManaBurn(ManaBurnParams),
    WipeBottom(usize),
    SpawnShitposts(usize),
    Silence,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct DamageParams {
    pub amount: i32,
    pub target: Target,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct NukeParams {
    pub threshold: i32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TaxParams {
    pub amount: u8,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ManaBurnParams {
    pub amount: u8,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Target {
    AnyKitchen,
    EnemyKitchen,
    FeedSlot(usize),
    Card(String),
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CardDefinition {
    pub id: String,
    pub name: String,
    pub cost: u8,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub class: CardKind,
}

/// A concrete copy of a card definition in play, owned by the match.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CardInstance {
    pub instance_id: String,
    pub variant_id: String,
    pub name: String,
    pub owner: Seat,
    pub cost: u8,
    pub class: CardKind,
    #[serde(default)]
    pub base_virality: i32,
    #[serde(default)]
    pub current_virality: i32,
    #[serde(default)]
    pub cook_rate: i32,
    #[serde(default)]
    pub yield_rate: i32,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub frozen_turns: u32,
    pub location: Location,
}

/// The draft of a single turn: at most one hand-to-kitchen play, any number of
/// posts and exploit casts, plus the BASED stakes intent.
#[derive(Clone, Default, Serialize, Deserialize, Debug, PartialEq)]
pub struct TurnPlan {
    pub plays_to_kitchen: Vec<String>,
    pub posts: Vec<PostAction>,
    pub exploits: Vec<ExploitAction>,
    #[serde(default)]
    pub based: bool,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PostAction {
    pub card_id: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ExploitAction {
    pub card_id: String,
    pub target: Option<Target>,
}

/// Per-player, per-turn commit record. A record for the current turn with no
/// revealed plan is "committed but not revealed".
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TurnCommit {
    pub hash: String,
    pub salt: Option<String>,
    pub revealed: Option<TurnPlan>,
    pub turn: u32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Phase {
    Lobby,
    Commit,
    Reveal,
    Resolving,
    StakePending,
    GameOver,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Lobby {
    pub id: String,
    pub host: String,
    pub mode: String,
    pub stakes: u8,
    pub description: String,
    pub opponent: Option<String>,
    pub started: bool,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct LobbyConfig {
    pub mode: String,
    pub stakes: u8,
    pub description: String,
}

/// Per-seat state as mirrored from the server. Resolution internals
/// (mana tax, pinned slots, rng state) are dropped on deserialize.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PlayerView {
    pub seat: Seat,
    pub node_id: String,
    #[serde(default)]
    pub hand: Vec<CardInstance>,
    #[serde(default)]
    pub kitchen: Vec<CardInstance>,
    #[serde(default)]
    pub abyss: Vec<CardInstance>,
    pub mana: u8,
    pub max_mana: u8,
    pub score: i32,
    #[serde(default)]
    pub cost_discount: i32,
    #[serde(default)]
    pub commit: Option<TurnCommit>,
    #[serde(default)]
    pub feed_locked: bool,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct GameView {
    pub feed: Vec<CardInstance>,
    pub players: Vec<PlayerView>,
    pub turn: u32,
    pub phase: Phase,
    pub stakes: u8,
    #[serde(default)]
    pub pending_stakes: Option<String>,
    #[serde(default)]
    pub winner: Option<Seat>,
}

impl GameView {
    pub fn player(&self, seat: &Seat) -> Option<&PlayerView> {
        self.players.iter().find(|p| &p.seat == seat)
    }

    pub fn seat_of_node(&self, node_id: &str) -> Option<Seat> {
        self.players
            .iter()
            .find(|p| p.node_id == node_id)
            .map(|p| p.seat.clone())
    }

    /// True when every seat has a commit record for the current turn.
    pub fn all_committed(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .iter()
                .all(|p| p.commit.as_ref().map(|c| c.turn) == Some(self.turn))
    }
}

/// Everything the server pushes in one sync: catalog, live game, lobby list.
/// Replaced wholesale on every push; never merged.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct GameSnapshot {
    #[serde(default)]
    pub catalog: Vec<CardDefinition>,
    pub game: Option<GameView>,
    #[serde(default)]
    pub lobbies: Vec<Lobby>,
}
