use crate::PlayerIdentity;

/// A typed event emitted by the demo decoder while replaying a recording.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    RoundStart,
    Kill(Kill),
    Damage(Damage),
    BombPlanted(BombSiteAction),
    BombDefused(BombSiteAction),
    BombPlantBegin { actor: PlayerIdentity },
    BombPlantAbort { actor: PlayerIdentity },
    BombDefuseBegin { actor: PlayerIdentity },
    BombDefuseAbort { actor: PlayerIdentity },
}

/// Any participant may be missing, e.g. a death caused by the world has no
/// killer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Kill {
    #[serde(default)]
    pub killer: Option<PlayerIdentity>,
    #[serde(default)]
    pub victim: Option<PlayerIdentity>,
    #[serde(default)]
    pub assister: Option<PlayerIdentity>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Damage {
    #[serde(default)]
    pub victim: Option<PlayerIdentity>,
    #[serde(default)]
    pub attacker: Option<PlayerIdentity>,
    pub health_damage: u32,
    #[serde(default)]
    pub armor_damage: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BombSiteAction {
    pub actor: PlayerIdentity,
    pub site: Bombsite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Bombsite {
    A,
    B,
    Unknown,
}

impl core::fmt::Display for Bombsite {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::Unknown => Ok(()),
        }
    }
}
