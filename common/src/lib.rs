//! Data shared between the demo decoder boundary and the analysis engine.

mod event;
pub use event::{BombSiteAction, Bombsite, Damage, Event, Kill};

mod identity;
pub use identity::PlayerIdentity;

mod player;
pub use player::{PawnState, PlayerState, Team, TeamState, Vector, TEAMS};
