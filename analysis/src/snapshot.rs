use common::{Bombsite, PlayerState, Team, Vector};

use crate::{buffer::EventBuffer, rounds::RoundTracker};

/// The boundary at which a set of snapshots is taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub tick: u32,
    pub second: u32,
    pub time: f64,
    pub clock_time: f64,
    pub round_number: u32,
}

/// One output row, the state of a single player at a window boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub name: String,
    pub is_bot: bool,
    pub player_id: i32,
    pub team: Team,
    pub team_id: i32,
    pub team_score: i32,
    pub round_number: u32,
    pub tick: u32,
    pub time: f64,
    pub clock_time: f64,
    pub position: Vector,
    pub velocity: Vector,
    pub view_direction_x: f32,
    pub view_direction_y: f32,
    pub kill_event: bool,
    pub killed_by: Vec<String>,
    pub killed: Vec<String>,
    pub assisters: Vec<String>,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub attacked: bool,
    pub attacked_by: Vec<String>,
    pub attacking: bool,
    pub attacking_target: Vec<String>,
    pub health: u32,
    pub health_damage_taken: u32,
    pub armor: u32,
    pub armor_damage_taken: u32,
    pub bomb_plant_begin: bool,
    pub bomb_planted: bool,
    pub bomb_defuse_started: bool,
    pub bomb_defused: bool,
    pub bomb_plant_site: Option<Bombsite>,
    pub bomb_defuse_site: Option<Bombsite>,
    pub flash_duration: f32,
}

/// Merges live state, round flags and the buffered events of one window.
pub struct SnapshotBuilder<'a> {
    window: Window,
    rounds: &'a RoundTracker,
    buffer: &'a EventBuffer,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(window: Window, rounds: &'a RoundTracker, buffer: &'a EventBuffer) -> Self {
        Self {
            window,
            rounds,
            buffer,
        }
    }

    /// Builds the rows in the order of `players`, leaving out every player
    /// whose live state is incomplete.
    pub fn build(&self, players: &[PlayerState]) -> Vec<PlayerSnapshot> {
        players
            .iter()
            .filter_map(|player| {
                let row = self.player(player);
                if row.is_none() {
                    tracing::trace!(
                        player = ?player.identity,
                        second = self.window.second,
                        "Skipping player with incomplete state"
                    );
                }
                row
            })
            .collect()
    }

    pub fn player(&self, player: &PlayerState) -> Option<PlayerSnapshot> {
        let team_state = player.team_state.as_ref()?;
        let pawn = player.pawn.as_ref()?;
        let identity = &player.identity;

        let mut kill_event = false;
        let mut killed = Vec::new();
        let mut killed_by = Vec::new();
        for kill in self.buffer.kills(identity) {
            if kill.killer.as_ref() == Some(identity) {
                kill_event = true;
                if let Some(victim) = kill.victim.as_ref() {
                    killed.push(victim.name.clone());
                }
            }
            if kill.victim.as_ref() == Some(identity) {
                kill_event = true;
                if let Some(killer) = kill.killer.as_ref() {
                    killed_by.push(killer.name.clone());
                }
            }
        }

        let assisters = self
            .buffer
            .assists(identity)
            .iter()
            .map(|victim| victim.name.clone())
            .collect();

        let mut attacked_by = Vec::new();
        let mut attacking_target = Vec::new();
        let mut health_damage_taken = 0;
        let mut armor_damage_taken = 0;
        for (other, exchange) in self.buffer.damage(identity) {
            if !exchange.taken.is_empty() {
                attacked_by.push(other.name.clone());
                health_damage_taken = exchange.taken.health.saturating_add(health_damage_taken);
                armor_damage_taken = exchange.taken.armor.saturating_add(armor_damage_taken);
            }
            if !exchange.dealt.is_empty() {
                attacking_target.push(other.name.clone());
            }
        }

        let bomb_planted = self
            .buffer
            .bomb_planted()
            .filter(|record| &record.actor == identity);
        let bomb_defused = self
            .buffer
            .bomb_defused()
            .filter(|record| &record.actor == identity);

        Some(PlayerSnapshot {
            name: identity.name.clone(),
            is_bot: player.is_bot,
            player_id: player.user_id,
            team: Team::from_number(player.team),
            team_id: team_state.id,
            team_score: team_state.score,
            round_number: self.window.round_number,
            tick: self.window.tick,
            time: self.window.time,
            clock_time: self.window.clock_time,
            position: pawn.position,
            velocity: pawn.velocity,
            view_direction_x: pawn.view_direction_x,
            view_direction_y: pawn.view_direction_y,
            kill_event,
            killed_by,
            killed,
            assisters,
            kills: player.kills,
            deaths: player.deaths,
            assists: player.assists,
            attacked: !attacked_by.is_empty(),
            attacked_by,
            attacking: !attacking_target.is_empty(),
            attacking_target,
            health: pawn.health,
            health_damage_taken,
            armor: pawn.armor,
            armor_damage_taken,
            bomb_plant_begin: self.rounds.bomb_plant_begun(identity),
            bomb_planted: bomb_planted.is_some(),
            bomb_defuse_started: self.rounds.bomb_defuse_started(identity),
            bomb_defused: bomb_defused.is_some(),
            bomb_plant_site: bomb_planted.map(|record| record.site),
            bomb_defuse_site: bomb_defused.map(|record| record.site),
            flash_duration: pawn.flash_duration,
        })
    }
}
