use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{GameSnapshot, LobbyConfig, Seat, TurnPlan};

// --- Client to Server Messages ---

/// Commands the client can issue. Serialized with a `type` tag and the payload
/// nested under `data`, matching the backend's websocket schema.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum ClientCommand {
    GetSnapshot,
    NewGame {
        opponent: Option<String>,
    },
    HostLobby(LobbyConfig),
    JoinLobby {
        lobby_id: String,
        deck: Vec<String>,
    },
    StartLobbyGame {
        lobby_id: String,
    },
    FetchRemoteLobbies {
        host_node: String,
    },
    JoinRemoteLobby {
        host_node: String,
        lobby_id: String,
        deck: Vec<String>,
    },
    SyncRemoteGame {
        host_node: String,
    },
    CommitTurn {
        seat: Seat,
        plan: TurnPlan,
        salt: String,
        turn: u32,
    },
    RevealTurn {
        seat: Seat,
        plan: TurnPlan,
        salt: String,
        turn: u32,
    },
    CallBased {
        seat: Seat,
    },
    AcceptBased {
        seat: Seat,
    },
    FoldBased {
        seat: Seat,
    },
    Reset,
}

// --- Server to Client Messages ---

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum ServerReply {
    Snapshot(GameSnapshot),
    Error(String),
    Ack,
}

/// Wrapper adding the correlation id. Requests always carry a fresh id; a
/// reply echoes the id of the request it answers, and unsolicited pushes
/// arrive with no id at all.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Envelope<T> {
    pub id: Option<String>,
    #[serde(flatten)]
    pub message: T,
}

impl Envelope<ClientCommand> {
    pub fn request(command: ClientCommand) -> (Uuid, Self) {
        let id = Uuid::new_v4();
        (
            id,
            Envelope {
                id: Some(id.to_string()),
                message: command,
            },
        )
    }
}
