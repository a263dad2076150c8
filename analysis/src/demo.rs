//! Replays CS2 demos (`.dem`) through `csdemo`.
//!
//! The demo is parsed in full first. Its game events and entity updates are
//! then merged into a single stream ordered by tick and handed to a
//! [`Handler`], the same way a recording is replayed.

use std::collections::{BTreeMap, HashMap};

use common::{
    BombSiteAction, Bombsite, Damage, Event, Kill, PawnState, PlayerIdentity, PlayerState,
    TeamState, Vector,
};

use crate::decoder::{Handler, LiveState, RunError};

/// World coordinates are split into a cell and an offset within that cell.
const CELL_SIZE: f32 = (1 << 9) as f32;
const MAX_COORD: f32 = (1 << 14) as f32;
/// Entity handles carry the entity index in their lower bits.
const ENTITY_HANDLE_MASK: u32 = 0x7FF;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Tick rate the demo was recorded at.
    pub tick_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self { tick_rate: 64.0 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("Demo is empty")]
    Empty,
    #[error("Invalid tick rate {0}")]
    InvalidTickRate(f64),
    #[error("Not a demo container")]
    Container,
    #[error("Parsing demo frames")]
    Frames,
}

pub struct Demo<'b> {
    buf: &'b [u8],
    tick_rate: f64,
}

impl<'b> Demo<'b> {
    /// Checks the container, the frames are only decoded by [`Self::run`].
    pub fn parse(config: &Config, buf: &'b [u8]) -> Result<Self, DemoError> {
        if buf.is_empty() {
            return Err(DemoError::Empty);
        }
        if !(config.tick_rate.is_finite() && config.tick_rate > 0.0) {
            return Err(DemoError::InvalidTickRate(config.tick_rate));
        }

        csdemo::Container::parse(buf).map_err(|_| DemoError::Container)?;

        Ok(Self {
            buf,
            tick_rate: config.tick_rate,
        })
    }

    pub fn tick_rate(&self) -> f64 {
        self.tick_rate
    }

    pub fn run<H>(self, handler: &mut H) -> Result<(), RunError<H::Error>>
    where
        H: Handler,
    {
        let tmp = csdemo::Container::parse(self.buf).map_err(|_| DemoError::Container)?;
        let output = csdemo::parser::parse(
            csdemo::FrameIterator::parse(tmp.inner),
            csdemo::parser::EntityFilter::all(),
        )
        .map_err(|_| DemoError::Frames)?;

        tracing::debug!(
            map = output.header.map_name(),
            ticks = output.entity_states.ticks.len(),
            "Parsed demo"
        );

        let mut roster = Roster::new(self.tick_rate);
        for (user, player) in output.player_info.iter() {
            roster.join(user.0, player.xuid, &player.name, player.team);
        }

        let mut pawns = Pawns::default();
        for event in output.events.iter() {
            if let csdemo::DemoEvent::GameEvent(ge) = event {
                if let csdemo::game_event::GameEvent::PlayerSpawn(pspawn) = ge.as_ref() {
                    match (pspawn.userid, &pspawn.userid_pawn) {
                        (Some(user), Some(csdemo::RawValue::I32(v))) => pawns.spawned(*v, user.0),
                        _ => {}
                    };
                }
            }
        }

        let mut ticks = output.entity_states.ticks.iter().peekable();
        let mut current = None;
        for event in output.events.iter() {
            match event {
                csdemo::DemoEvent::Tick(tick) => {
                    let tick = tick.tick();
                    if current == Some(tick) {
                        continue;
                    }
                    if current.is_some() {
                        finish_frame(&mut roster, handler)?;
                    }
                    current = Some(tick);
                    roster.tick = tick;

                    while let Some(tick_state) = ticks.next_if(|t| t.tick <= tick) {
                        let _tracing_guard =
                            tracing::trace_span!("Tick", tick = tick_state.tick).entered();

                        for event in apply_entities(&mut roster, &mut pawns, tick_state) {
                            handler
                                .on_event(&roster, &event)
                                .map_err(RunError::Handler)?;
                        }
                    }
                }
                csdemo::DemoEvent::GameEvent(ge) => {
                    if let Some(event) = game_event(&mut roster, ge.as_ref()) {
                        handler
                            .on_event(&roster, &event)
                            .map_err(RunError::Handler)?;
                    }
                }
                _ => {}
            };
        }

        for tick_state in ticks {
            roster.tick = roster.tick.max(tick_state.tick);
            for event in apply_entities(&mut roster, &mut pawns, tick_state) {
                handler
                    .on_event(&roster, &event)
                    .map_err(RunError::Handler)?;
            }
            current = Some(roster.tick);
        }
        if current.is_some() {
            finish_frame(&mut roster, handler)?;
        }

        Ok(())
    }
}

fn finish_frame<H>(roster: &mut Roster, handler: &mut H) -> Result<(), RunError<H::Error>>
where
    H: Handler,
{
    for event in roster.take_aborts() {
        handler
            .on_event(&*roster, &event)
            .map_err(RunError::Handler)?;
    }

    roster.refresh();
    handler.on_frame_done(&*roster).map_err(RunError::Handler)
}

/// Maps pawn entities to the users controlling them.
#[derive(Default)]
struct Pawns {
    /// Pawn ids announced by `player_spawn`
    spawned: HashMap<i32, i32>,
    structured: HashMap<csdemo::structured::pawnid::PawnID, i32>,
    /// Entity index of a pawn to its user
    entities: HashMap<i32, i32>,
    /// Entity index of a team to its team number
    teams: HashMap<i32, i32>,
}

impl Pawns {
    fn spawned(&mut self, pawn: i32, user: i32) {
        self.spawned.insert(pawn, user);
        self.structured
            .insert(csdemo::structured::pawnid::PawnID::from(pawn), user);
    }

    fn user(&mut self, entity: i32, pawn: Option<u32>) -> Option<i32> {
        if let Some(user) = pawn.and_then(|p| self.spawned.get(&(p as i32)).copied()) {
            self.entities.insert(entity, user);
            return Some(user);
        }

        self.entities.get(&entity).copied()
    }
}

fn number(value: &csdemo::parser::Variant) -> Option<f64> {
    value
        .as_i32()
        .map(f64::from)
        .or_else(|| value.as_u32().map(f64::from))
        .or_else(|| value.as_f32().map(f64::from))
}

fn flag(value: &csdemo::parser::Variant) -> Option<bool> {
    match value {
        csdemo::parser::Variant::Bool(b) => Some(*b),
        other => other.as_u32().map(|v| v != 0),
    }
}

fn apply_entities(
    roster: &mut Roster,
    pawns: &mut Pawns,
    tick_state: &csdemo::parser::EntityTickStates,
) -> Vec<Event> {
    let mut events = Vec::new();

    for state in tick_state.states.iter() {
        let class: &str = state.class.as_ref();
        let number_prop =
            |name: &str| state.get_prop(name).and_then(|prop| number(&prop.value));
        let u32_prop = |name: &str| state.get_prop(name).and_then(|prop| prop.value.as_u32());
        let f32_prop = |name: &str| state.get_prop(name).and_then(|prop| prop.value.as_f32());
        let flag_prop = |name: &str| state.get_prop(name).and_then(|prop| flag(&prop.value));

        match class {
            "CCSPlayerPawn" => {
                let user = match pawns.user(state.id, u32_prop("CCSPlayerPawn.m_nEntityId")) {
                    Some(u) => u,
                    None => continue,
                };

                let update = PawnUpdate {
                    cell: [
                        u32_prop("CCSPlayerPawn.CBodyComponentBaseAnimGraph.m_cellX"),
                        u32_prop("CCSPlayerPawn.CBodyComponentBaseAnimGraph.m_cellY"),
                        u32_prop("CCSPlayerPawn.CBodyComponentBaseAnimGraph.m_cellZ"),
                    ],
                    offset: [
                        f32_prop("CCSPlayerPawn.CBodyComponentBaseAnimGraph.m_vecX"),
                        f32_prop("CCSPlayerPawn.CBodyComponentBaseAnimGraph.m_vecY"),
                        f32_prop("CCSPlayerPawn.CBodyComponentBaseAnimGraph.m_vecZ"),
                    ],
                    eye_angles: state.get_prop("CCSPlayerPawn.m_angEyeAngles").and_then(
                        |prop| match &prop.value {
                            csdemo::parser::Variant::VecXYZ(v) => Some(*v),
                            _ => None,
                        },
                    ),
                    health: number_prop("CCSPlayerPawn.m_iHealth").map(|v| v.max(0.0) as u32),
                    armor: number_prop("CCSPlayerPawn.m_ArmorValue").map(|v| v.max(0.0) as u32),
                    flash_duration: f32_prop("CCSPlayerPawn.m_flFlashDuration"),
                    team: number_prop("CCSPlayerPawn.m_iTeamNum").map(|v| v as i32),
                    defusing: flag_prop("CCSPlayerPawn.m_bIsDefusing"),
                };

                let _inner_guard =
                    tracing::trace_span!("Entity", user, entity_id = state.id).entered();
                events.extend(roster.apply_pawn(user, &update));
            }
            "CC4" => {
                let owner = u32_prop("CC4.m_hOwnerEntity")
                    .and_then(|handle| pawns.entities.get(&((handle & ENTITY_HANDLE_MASK) as i32)))
                    .copied();
                events.extend(roster.apply_c4(owner, flag_prop("CC4.m_bStartedArming")));
            }
            "CPlantedC4" => {
                if let Some(site) = number_prop("CPlantedC4.m_nBombSite") {
                    roster.set_bomb_site(site as i32);
                }
            }
            "CCSGameRulesProxy" => {
                if let Some(count) =
                    u32_prop("CCSGameRulesProxy.CCSGameRules.m_nRoundStartCount")
                {
                    events.extend(roster.round_start_count(count));
                }
            }
            _ => {
                let team = match csdemo::structured::ccsteam::CCSTeam::try_from(state) {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                let team_number = number_prop("CCSTeam.m_iTeamNum")
                    .map(|n| n as i32)
                    .or_else(|| {
                        let pawn_ids = team.player_pawns();
                        pawn_ids
                            .into_iter()
                            .filter_map(|pawn| pawns.structured.get(&pawn))
                            .filter_map(|user| roster.team_of(*user))
                            .next()
                    })
                    .or_else(|| pawns.teams.get(&state.id).copied());
                let team_number = match team_number {
                    Some(n) => n,
                    None => continue,
                };
                pawns.teams.insert(state.id, team_number);

                if let Some(score) = team.score() {
                    roster.set_team_score(team_number, score as i32);
                }
            }
        };
    }

    events
}

fn game_event(roster: &mut Roster, event: &csdemo::game_event::GameEvent) -> Option<Event> {
    match event {
        csdemo::game_event::GameEvent::RoundAnnounceMatchStart(_) => {
            roster.reset_stats();
            None
        }
        csdemo::game_event::GameEvent::PlayerSpawn(pspawn) => {
            roster.spawn(pspawn.userid?.0);
            None
        }
        csdemo::game_event::GameEvent::PlayerHurt(phurt) => {
            let health = match phurt.health {
                Some(csdemo::RawValue::F32(v)) => v.max(0.0) as u32,
                Some(csdemo::RawValue::I32(v)) => v.max(0) as u32,
                Some(csdemo::RawValue::U64(v)) => v.min(u32::MAX as u64) as u32,
                _ => 0,
            };
            roster.hurt(phurt.userid?.0, phurt.attacker.map(|a| a.0), health)
        }
        csdemo::game_event::GameEvent::PlayerDeath(pdeath) => roster.death(
            pdeath.userid?.0,
            pdeath.attacker.map(|a| a.0),
            pdeath.assister.map(|a| a.0),
        ),
        csdemo::game_event::GameEvent::BombPlanted(planted) => {
            roster.bomb_planted(planted.userid?.0)
        }
        csdemo::game_event::GameEvent::BombDefused(defused) => {
            roster.bomb_defused(defused.userid?.0)
        }
        _ => None,
    }
}

/// Props of a single pawn update, `None` for everything that did not change.
#[derive(Debug, Default, Clone, PartialEq)]
struct PawnUpdate {
    cell: [Option<u32>; 3],
    offset: [Option<f32>; 3],
    /// Pitch, yaw and roll
    eye_angles: Option<[f32; 3]>,
    health: Option<u32>,
    armor: Option<u32>,
    flash_duration: Option<f32>,
    team: Option<i32>,
    defusing: Option<bool>,
}

#[derive(Debug, Default, Clone)]
struct Body {
    cell: [u32; 3],
    offset: [f32; 3],
    last_move: Option<(u32, Vector)>,
    velocity: Vector,
    view_direction_x: f32,
    view_direction_y: f32,
    health: u32,
    armor: u32,
    flash_duration: f32,
}

impl Body {
    fn position(&self) -> Vector {
        let axis = |i: usize| self.cell[i] as f32 * CELL_SIZE + self.offset[i] - MAX_COORD;
        Vector::new(axis(0), axis(1), axis(2))
    }

    /// A pawn without a position update in `tick` is standing still.
    fn pawn(&self, tick: u32) -> PawnState {
        let velocity = match self.last_move {
            Some((moved, _)) if moved == tick => self.velocity,
            _ => Vector::default(),
        };

        PawnState {
            position: self.position(),
            velocity,
            view_direction_x: self.view_direction_x,
            view_direction_y: self.view_direction_y,
            health: self.health,
            armor: self.armor,
            flash_duration: self.flash_duration,
        }
    }
}

#[derive(Debug)]
struct Tracked {
    identity: PlayerIdentity,
    user_id: i32,
    is_bot: bool,
    team: i32,
    kills: u32,
    deaths: u32,
    assists: u32,
    body: Option<Body>,
    /// Health as reported by the last `player_hurt`
    life: u32,
    /// Armor lost since the last `player_hurt`
    armor_lost: u32,
    defusing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abort {
    Plant,
    Defuse,
}

/// Live state of all players in a demo.
#[derive(Debug)]
struct Roster {
    tick_rate: f64,
    tick: u32,
    players: BTreeMap<i32, Tracked>,
    team_scores: HashMap<i32, i32>,
    round_start_count: Option<u32>,
    bomb_site: Option<Bombsite>,
    planter: Option<i32>,
    /// Resolved at the end of the frame, a plant or defuse that finished in
    /// the same frame is not an abort.
    pending_aborts: Vec<(i32, Abort)>,
    participants: Vec<PlayerState>,
}

impl Roster {
    fn new(tick_rate: f64) -> Self {
        Self {
            tick_rate,
            tick: 0,
            players: BTreeMap::new(),
            team_scores: HashMap::new(),
            round_start_count: None,
            bomb_site: None,
            planter: None,
            pending_aborts: Vec::new(),
            participants: Vec::new(),
        }
    }

    /// Bots have no steam id and are told apart by their user id.
    fn join(&mut self, user: i32, xuid: u64, name: &str, team: i32) {
        let id = if xuid != 0 {
            xuid
        } else {
            u64::from(user as u32)
        };

        self.players.entry(user).or_insert_with(|| Tracked {
            identity: PlayerIdentity::new(id, name),
            user_id: user,
            is_bot: xuid == 0,
            team,
            kills: 0,
            deaths: 0,
            assists: 0,
            body: None,
            life: 100,
            armor_lost: 0,
            defusing: false,
        });
    }

    fn identity(&self, user: i32) -> Option<PlayerIdentity> {
        self.players.get(&user).map(|p| p.identity.clone())
    }

    fn team_of(&self, user: i32) -> Option<i32> {
        self.players.get(&user).map(|p| p.team)
    }

    fn spawn(&mut self, user: i32) {
        if let Some(player) = self.players.get_mut(&user) {
            player.life = 100;
            player.armor_lost = 0;
        }
    }

    fn reset_stats(&mut self) {
        for player in self.players.values_mut() {
            player.kills = 0;
            player.deaths = 0;
            player.assists = 0;
        }
    }

    fn apply_pawn(&mut self, user: i32, update: &PawnUpdate) -> Option<Event> {
        let tick = self.tick;
        let tick_rate = self.tick_rate;
        let player = self.players.get_mut(&user)?;

        if let Some(team) = update.team {
            player.team = team;
        }

        let body = player.body.get_or_insert_with(Body::default);
        for axis in 0..3 {
            if let Some(cell) = update.cell[axis] {
                body.cell[axis] = cell;
            }
            if let Some(offset) = update.offset[axis] {
                body.offset[axis] = offset;
            }
        }

        let moved = update.cell.iter().any(Option::is_some)
            || update.offset.iter().any(Option::is_some);
        if moved {
            let position = body.position();
            if let Some((last_tick, last)) = body.last_move.filter(|(t, _)| *t < tick) {
                let seconds = (tick - last_tick) as f64 / tick_rate;
                let speed = |now: f32, before: f32| ((now - before) as f64 / seconds) as f32;
                body.velocity = Vector::new(
                    speed(position.x, last.x),
                    speed(position.y, last.y),
                    speed(position.z, last.z),
                );
            }
            body.last_move = Some((tick, position));
        }

        if let Some([pitch, yaw, _]) = update.eye_angles {
            body.view_direction_x = yaw;
            body.view_direction_y = pitch;
        }
        if let Some(health) = update.health {
            body.health = health;
        }
        if let Some(armor) = update.armor {
            let lost = body.armor.saturating_sub(armor);
            player.armor_lost = player.armor_lost.saturating_add(lost);
            body.armor = armor;
        }
        if let Some(flash_duration) = update.flash_duration {
            body.flash_duration = flash_duration;
        }

        let defusing = update.defusing?;
        let was_defusing = std::mem::replace(&mut player.defusing, defusing);
        match (was_defusing, defusing) {
            (false, true) => Some(Event::BombDefuseBegin {
                actor: player.identity.clone(),
            }),
            (true, false) => {
                self.pending_aborts.push((user, Abort::Defuse));
                None
            }
            _ => None,
        }
    }

    fn apply_c4(&mut self, owner: Option<i32>, arming: Option<bool>) -> Option<Event> {
        match arming? {
            true => {
                let user = owner?;
                if self.planter == Some(user) {
                    return None;
                }
                self.planter = Some(user);

                Some(Event::BombPlantBegin {
                    actor: self.identity(user)?,
                })
            }
            false => {
                if let Some(user) = self.planter.take() {
                    self.pending_aborts.push((user, Abort::Plant));
                }
                None
            }
        }
    }

    fn set_bomb_site(&mut self, site: i32) {
        self.bomb_site = Some(match site {
            0 => Bombsite::A,
            1 => Bombsite::B,
            _ => Bombsite::Unknown,
        });
    }

    fn set_team_score(&mut self, team: i32, score: i32) {
        self.team_scores.insert(team, score);
    }

    /// The first value seen is the state the demo starts in, only later
    /// increments start a round.
    fn round_start_count(&mut self, count: u32) -> Option<Event> {
        match self.round_start_count.replace(count) {
            Some(previous) if count > previous => {
                self.bomb_site = None;
                self.planter = None;
                Some(Event::RoundStart)
            }
            _ => None,
        }
    }

    fn hurt(&mut self, victim: i32, attacker: Option<i32>, health: u32) -> Option<Event> {
        let attacker = attacker.and_then(|a| self.identity(a));

        let player = self.players.get_mut(&victim)?;
        let health_damage = player.life.saturating_sub(health);
        player.life = health;
        let armor_damage = std::mem::take(&mut player.armor_lost);

        Some(Event::Damage(Damage {
            victim: Some(player.identity.clone()),
            attacker,
            health_damage,
            armor_damage,
        }))
    }

    /// Team kills and assists on teammates do not count towards the stats.
    fn death(&mut self, victim: i32, attacker: Option<i32>, assister: Option<i32>) -> Option<Event> {
        let victim_team = self.team_of(victim)?;

        if let Some(player) = self.players.get_mut(&victim) {
            player.deaths = player.deaths.saturating_add(1);
        }
        if let Some(killer) = attacker.filter(|a| *a != victim) {
            if let Some(player) = self.players.get_mut(&killer) {
                if player.team != victim_team {
                    player.kills = player.kills.saturating_add(1);
                }
            }
        }
        if let Some(assister) = assister {
            if let Some(player) = self.players.get_mut(&assister) {
                if player.team != victim_team {
                    player.assists = player.assists.saturating_add(1);
                }
            }
        }

        Some(Event::Kill(Kill {
            killer: attacker.and_then(|a| self.identity(a)),
            victim: self.identity(victim),
            assister: assister.and_then(|a| self.identity(a)),
        }))
    }

    fn bomb_planted(&mut self, user: i32) -> Option<Event> {
        self.pending_aborts
            .retain(|pending| *pending != (user, Abort::Plant));
        self.planter = None;

        Some(Event::BombPlanted(BombSiteAction {
            actor: self.identity(user)?,
            site: self.bomb_site.unwrap_or(Bombsite::Unknown),
        }))
    }

    fn bomb_defused(&mut self, user: i32) -> Option<Event> {
        self.pending_aborts
            .retain(|pending| *pending != (user, Abort::Defuse));
        if let Some(player) = self.players.get_mut(&user) {
            player.defusing = false;
        }

        Some(Event::BombDefused(BombSiteAction {
            actor: self.identity(user)?,
            site: self.bomb_site.unwrap_or(Bombsite::Unknown),
        }))
    }

    fn take_aborts(&mut self) -> Vec<Event> {
        let pending = std::mem::take(&mut self.pending_aborts);

        pending
            .into_iter()
            .filter_map(|(user, abort)| {
                let actor = self.identity(user)?;
                Some(match abort {
                    Abort::Plant => Event::BombPlantAbort { actor },
                    Abort::Defuse => Event::BombDefuseAbort { actor },
                })
            })
            .collect()
    }

    /// Rebuilds the participants, players on either side in user id order.
    fn refresh(&mut self) {
        let tick = self.tick;
        let team_scores = &self.team_scores;

        self.participants = self
            .players
            .values()
            .filter(|p| p.team == 2 || p.team == 3)
            .map(|p| PlayerState {
                identity: p.identity.clone(),
                user_id: p.user_id,
                is_bot: p.is_bot,
                team: p.team,
                team_state: team_scores
                    .get(&p.team)
                    .map(|score| TeamState {
                        id: p.team,
                        score: *score,
                    }),
                pawn: p.body.as_ref().map(|body| body.pawn(tick)),
                kills: p.kills,
                deaths: p.deaths,
                assists: p.assists,
            })
            .collect();
    }
}

impl LiveState for Roster {
    fn ingame_tick(&self) -> u32 {
        self.tick
    }

    fn participants(&self) -> &[PlayerState] {
        &self.participants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EXCEL: u64 = 76561198000000001;
    const CUTE: u64 = 76561198000000002;

    fn roster() -> Roster {
        let mut roster = Roster::new(64.0);
        roster.join(1, EXCEL, "Excel", 2);
        roster.join(2, CUTE, "cute", 3);
        roster.join(3, 0, "BOT Ringo", 3);
        roster.join(4, 76561198000000004, "caster", 1);
        roster.set_team_score(2, 4);
        roster.set_team_score(3, 7);
        roster
    }

    fn moved(cell: [u32; 3], offset: [f32; 3]) -> PawnUpdate {
        PawnUpdate {
            cell: cell.map(Some),
            offset: offset.map(Some),
            ..Default::default()
        }
    }

    #[test]
    fn bots_keyed_by_user_id() {
        let roster = roster();

        assert_eq!(Some(PlayerIdentity::new(EXCEL, "Excel")), roster.identity(1));
        assert_eq!(3, roster.identity(3).unwrap().id);
        assert!(roster.players[&3].is_bot);
        assert!(!roster.players[&1].is_bot);
    }

    #[test]
    fn participants_are_playing_players() {
        let mut roster = roster();
        roster.apply_pawn(1, &moved([32, 32, 32], [0.0, 0.0, 0.0]));
        roster.refresh();

        let names: Vec<_> = roster
            .participants()
            .iter()
            .map(|p| p.identity.name.as_str())
            .collect();
        assert_eq!(vec!["Excel", "cute", "BOT Ringo"], names);

        let excel = &roster.participants()[0];
        assert_eq!(Some(TeamState { id: 2, score: 4 }), excel.team_state);
        assert!(excel.pawn.is_some());
        assert_eq!(None, roster.participants()[1].pawn);
    }

    #[test]
    fn position_from_cell_and_offset() {
        let mut roster = roster();
        roster.apply_pawn(1, &moved([33, 30, 32], [16.0, 256.0, 0.5]));
        roster.refresh();

        let pawn = roster.participants()[0].pawn.clone().unwrap();
        assert_eq!(Vector::new(528.0, -768.0, 0.5), pawn.position);
    }

    #[test]
    fn velocity_from_movement() {
        let mut roster = roster();
        roster.tick = 64;
        roster.apply_pawn(1, &moved([32, 32, 32], [0.0, 0.0, 0.0]));
        roster.tick = 96;
        roster.apply_pawn(1, &moved([32, 32, 32], [100.0, 0.0, 0.0]));
        roster.refresh();

        let pawn = roster.participants()[0].pawn.clone().unwrap();
        assert_eq!(Vector::new(200.0, 0.0, 0.0), pawn.velocity);

        // No update in this tick, the pawn stands still
        roster.tick = 97;
        roster.refresh();
        let pawn = roster.participants()[0].pawn.clone().unwrap();
        assert_eq!(Vector::default(), pawn.velocity);
    }

    #[test]
    fn partial_updates_keep_previous_values() {
        let mut roster = roster();
        roster.apply_pawn(
            1,
            &PawnUpdate {
                eye_angles: Some([-10.0, 90.0, 0.0]),
                health: Some(100),
                armor: Some(100),
                ..moved([32, 32, 32], [1.0, 2.0, 3.0])
            },
        );
        roster.apply_pawn(
            1,
            &PawnUpdate {
                offset: [None, Some(5.0), None],
                flash_duration: Some(2.5),
                ..Default::default()
            },
        );
        roster.refresh();

        let pawn = roster.participants()[0].pawn.clone().unwrap();
        assert_eq!(Vector::new(1.0, 5.0, 3.0), pawn.position);
        assert_eq!((90.0, -10.0), (pawn.view_direction_x, pawn.view_direction_y));
        assert_eq!((100, 100), (pawn.health, pawn.armor));
        assert_eq!(2.5, pawn.flash_duration);
    }

    #[test]
    fn team_switch_from_pawn() {
        let mut roster = roster();
        roster.apply_pawn(
            1,
            &PawnUpdate {
                team: Some(3),
                ..Default::default()
            },
        );
        roster.refresh();

        assert_eq!(3, roster.participants()[0].team);
        assert_eq!(
            Some(TeamState { id: 3, score: 7 }),
            roster.participants()[0].team_state
        );
    }

    #[test]
    fn hurt_uses_health_difference() {
        let mut roster = roster();
        roster.spawn(2);
        roster.apply_pawn(
            2,
            &PawnUpdate {
                armor: Some(100),
                ..Default::default()
            },
        );
        roster.apply_pawn(
            2,
            &PawnUpdate {
                armor: Some(88),
                ..Default::default()
            },
        );

        let event = roster.hurt(2, Some(1), 73);
        assert_eq!(
            Some(Event::Damage(Damage {
                victim: roster.identity(2),
                attacker: roster.identity(1),
                health_damage: 27,
                armor_damage: 12,
            })),
            event
        );

        let event = roster.hurt(2, Some(1), 60);
        assert_eq!(
            Some(Event::Damage(Damage {
                victim: roster.identity(2),
                attacker: roster.identity(1),
                health_damage: 13,
                armor_damage: 0,
            })),
            event
        );

        assert_eq!(None, roster.hurt(42, Some(1), 10));
    }

    #[test]
    fn hurt_by_the_world() {
        let mut roster = roster();

        let event = roster.hurt(1, None, 90);
        assert_eq!(
            Some(Event::Damage(Damage {
                victim: roster.identity(1),
                attacker: None,
                health_damage: 10,
                armor_damage: 0,
            })),
            event
        );
    }

    #[test]
    fn death_updates_stats() {
        let mut roster = roster();

        // The assister is a teammate of the victim
        let event = roster.death(2, Some(1), Some(3));
        assert_eq!(
            Some(Event::Kill(Kill {
                killer: roster.identity(1),
                victim: roster.identity(2),
                assister: roster.identity(3),
            })),
            event
        );

        // Team kill
        roster.death(3, Some(2), None);
        // Suicide
        roster.death(1, Some(1), None);

        let stats = |user: i32| {
            let p = &roster.players[&user];
            (p.kills, p.deaths, p.assists)
        };
        assert_eq!((1, 1, 0), stats(1));
        assert_eq!((0, 1, 0), stats(2));
        assert_eq!((0, 1, 0), stats(3));

        roster.reset_stats();
        assert_eq!((0, 0, 0), stats(1));
    }

    #[test]
    fn round_start_on_counter_increase() {
        let mut roster = roster();

        assert_eq!(None, roster.round_start_count(3));
        assert_eq!(None, roster.round_start_count(3));
        assert_eq!(Some(Event::RoundStart), roster.round_start_count(4));
    }

    #[test]
    fn plant_begin_and_abort() {
        let mut roster = roster();

        assert_eq!(
            Some(Event::BombPlantBegin {
                actor: PlayerIdentity::new(EXCEL, "Excel")
            }),
            roster.apply_c4(Some(1), Some(true))
        );
        assert_eq!(None, roster.apply_c4(Some(1), Some(true)));
        assert_eq!(None, roster.apply_c4(Some(1), Some(false)));

        assert_eq!(
            vec![Event::BombPlantAbort {
                actor: PlayerIdentity::new(EXCEL, "Excel")
            }],
            roster.take_aborts()
        );
        assert!(roster.take_aborts().is_empty());
    }

    #[test]
    fn finished_plant_is_no_abort() {
        let mut roster = roster();

        roster.apply_c4(Some(1), Some(true));
        roster.set_bomb_site(1);
        roster.apply_c4(Some(1), Some(false));

        assert_eq!(
            Some(Event::BombPlanted(BombSiteAction {
                actor: PlayerIdentity::new(EXCEL, "Excel"),
                site: Bombsite::B,
            })),
            roster.bomb_planted(1)
        );
        assert!(roster.take_aborts().is_empty());
    }

    #[test]
    fn defuse_begin_abort_and_finish() {
        let mut roster = roster();
        let defusing = |value| PawnUpdate {
            defusing: Some(value),
            ..Default::default()
        };
        let cute = PlayerIdentity::new(CUTE, "cute");

        assert_eq!(
            Some(Event::BombDefuseBegin {
                actor: cute.clone()
            }),
            roster.apply_pawn(2, &defusing(true))
        );
        assert_eq!(None, roster.apply_pawn(2, &defusing(true)));
        assert_eq!(None, roster.apply_pawn(2, &defusing(false)));
        assert_eq!(
            vec![Event::BombDefuseAbort {
                actor: cute.clone()
            }],
            roster.take_aborts()
        );

        roster.set_bomb_site(0);
        roster.apply_pawn(2, &defusing(true));
        roster.apply_pawn(2, &defusing(false));
        assert_eq!(
            Some(Event::BombDefused(BombSiteAction {
                actor: cute,
                site: Bombsite::A,
            })),
            roster.bomb_defused(2)
        );
        assert!(roster.take_aborts().is_empty());
    }

    #[test]
    fn armor_loss_saturates() {
        let mut roster = roster();
        roster.apply_pawn(
            2,
            &PawnUpdate {
                armor: Some(100),
                ..Default::default()
            },
        );
        roster.players.get_mut(&2).unwrap().armor_lost = u32::MAX - 5;
        roster.apply_pawn(
            2,
            &PawnUpdate {
                armor: Some(0),
                ..Default::default()
            },
        );

        assert_eq!(u32::MAX, roster.players[&2].armor_lost);
    }

    #[test]
    fn rejects_non_demo_input() {
        let config = Config::default();

        assert!(matches!(Demo::parse(&config, b""), Err(DemoError::Empty)));
        assert!(matches!(
            Demo::parse(&config, b"HL2DEMO\0"),
            Err(DemoError::Container)
        ));
        assert!(matches!(
            Demo::parse(&Config { tick_rate: 0.0 }, b"PBDEMS2\0"),
            Err(DemoError::InvalidTickRate(_))
        ));
    }
}
