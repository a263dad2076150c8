use crate::PlayerIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Team {
    Unassigned,
    Spectators,
    Terrorists,
    CounterTerrorists,
    Unknown,
}

// https://github.com/markus-wa/demoinfocs-golang/blob/205b0bb25e9f3e96e1d306d154199b4a6292940e/pkg/demoinfocs/common/common.go#L22
pub static TEAMS: phf::Map<i32, Team> = phf::phf_map! {
    0_i32 => Team::Unassigned,
    1_i32 => Team::Spectators,
    2_i32 => Team::Terrorists,
    3_i32 => Team::CounterTerrorists,
};

impl Team {
    pub fn from_number(number: i32) -> Self {
        TEAMS.get(&number).copied().unwrap_or(Team::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "Unassigned",
            Self::Spectators => "Spectators",
            Self::Terrorists => "Terrorists",
            Self::CounterTerrorists => "CounterTerrorists",
            Self::Unknown => "Unknown",
        }
    }
}

impl core::fmt::Display for Team {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TeamState {
    pub id: i32,
    pub score: i32,
}

/// Live state of the entity a player currently controls.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PawnState {
    pub position: Vector,
    #[serde(default)]
    pub velocity: Vector,
    pub view_direction_x: f32,
    pub view_direction_y: f32,
    pub health: u32,
    #[serde(default)]
    pub armor: u32,
    #[serde(default)]
    pub flash_duration: f32,
}

/// Authoritative live attributes of a participant as maintained by the
/// decoder. The engine only ever reads these.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlayerState {
    pub identity: PlayerIdentity,
    pub user_id: i32,
    #[serde(default)]
    pub is_bot: bool,
    pub team: i32,
    #[serde(default)]
    pub team_state: Option<TeamState>,
    #[serde(default)]
    pub pawn: Option<PawnState>,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
    #[serde(default)]
    pub assists: u32,
}
