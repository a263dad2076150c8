//! Events observed since the last flush.
//!
//! Everything in here is keyed by [`PlayerIdentity`] and created lazily on
//! the first write. [`EventBuffer::clear`] is the only way to reset it and
//! is called once per window, after all rows of that window were written.

use std::collections::{BTreeMap, HashMap};

use common::{Bombsite, Kill, PlayerIdentity};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DamageTotals {
    pub health: u32,
    pub armor: u32,
}

impl DamageTotals {
    fn add(&mut self, health: u32, armor: u32) {
        self.health = self.health.saturating_add(health);
        self.armor = self.armor.saturating_add(armor);
    }

    pub fn is_empty(&self) -> bool {
        self.health == 0 && self.armor == 0
    }
}

/// Damage exchanged between a player and one other player within a window.
///
/// For `damage[p][other]`, `taken` is what `other` did to `p` and `dealt` is
/// what `p` did to `other`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PairDamage {
    pub taken: DamageTotals,
    pub dealt: DamageTotals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BombRecord {
    pub actor: PlayerIdentity,
    pub site: Bombsite,
}

#[derive(Debug, Default)]
pub struct EventBuffer {
    kills: HashMap<PlayerIdentity, Vec<Kill>>,
    assists: HashMap<PlayerIdentity, Vec<PlayerIdentity>>,
    damage: HashMap<PlayerIdentity, BTreeMap<PlayerIdentity, PairDamage>>,
    bomb_planted: Option<BombRecord>,
    bomb_defused: Option<BombRecord>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the kill for the killer and for the victim, and the victim for
    /// the assister.
    pub fn record_kill(
        &mut self,
        killer: Option<&PlayerIdentity>,
        victim: Option<&PlayerIdentity>,
        assister: Option<&PlayerIdentity>,
    ) {
        let kill = Kill {
            killer: killer.cloned(),
            victim: victim.cloned(),
            assister: assister.cloned(),
        };

        if let Some(killer) = killer {
            self.kills
                .entry(killer.clone())
                .or_default()
                .push(kill.clone());
        }
        match victim {
            // A suicide is a single kill for the player, not two
            Some(victim) if Some(victim) != killer => {
                self.kills
                    .entry(victim.clone())
                    .or_default()
                    .push(kill.clone());
            }
            _ => {}
        };

        if let (Some(assister), Some(victim)) = (assister, victim) {
            self.record_assist(assister, victim);
        }
    }

    pub fn record_assist(&mut self, assister: &PlayerIdentity, victim: &PlayerIdentity) {
        self.assists
            .entry(assister.clone())
            .or_default()
            .push(victim.clone());
    }

    /// Accumulates the damage on both sides of the pair.
    pub fn record_damage(
        &mut self,
        victim: &PlayerIdentity,
        attacker: &PlayerIdentity,
        health: u32,
        armor: u32,
    ) {
        self.damage
            .entry(victim.clone())
            .or_default()
            .entry(attacker.clone())
            .or_default()
            .taken
            .add(health, armor);

        self.damage
            .entry(attacker.clone())
            .or_default()
            .entry(victim.clone())
            .or_default()
            .dealt
            .add(health, armor);
    }

    pub fn record_bomb_planted(&mut self, actor: &PlayerIdentity, site: Bombsite) {
        self.bomb_planted = Some(BombRecord {
            actor: actor.clone(),
            site,
        });
    }

    pub fn record_bomb_defused(&mut self, actor: &PlayerIdentity, site: Bombsite) {
        self.bomb_defused = Some(BombRecord {
            actor: actor.clone(),
            site,
        });
    }

    /// Drops pending bomb records without touching anything else, a new round
    /// must not inherit the bomb state of the previous one.
    pub fn clear_bomb(&mut self) {
        self.bomb_planted = None;
        self.bomb_defused = None;
    }

    pub fn clear(&mut self) {
        self.kills.clear();
        self.assists.clear();
        self.damage.clear();
        self.clear_bomb();
    }

    pub fn is_empty(&self) -> bool {
        self.kills.is_empty()
            && self.assists.is_empty()
            && self.damage.is_empty()
            && self.bomb_planted.is_none()
            && self.bomb_defused.is_none()
    }

    pub fn kills(&self, player: &PlayerIdentity) -> &[Kill] {
        self.kills.get(player).map(|k| k.as_slice()).unwrap_or(&[])
    }

    pub fn assists(&self, player: &PlayerIdentity) -> &[PlayerIdentity] {
        self.assists.get(player).map(|a| a.as_slice()).unwrap_or(&[])
    }

    /// All players `player` exchanged damage with, ordered by identity.
    pub fn damage(
        &self,
        player: &PlayerIdentity,
    ) -> impl Iterator<Item = (&PlayerIdentity, &PairDamage)> + '_ {
        self.damage.get(player).into_iter().flat_map(|d| d.iter())
    }

    pub fn damage_between(
        &self,
        player: &PlayerIdentity,
        other: &PlayerIdentity,
    ) -> Option<&PairDamage> {
        self.damage.get(player).and_then(|d| d.get(other))
    }

    pub fn bomb_planted(&self) -> Option<&BombRecord> {
        self.bomb_planted.as_ref()
    }

    pub fn bomb_defused(&self) -> Option<&BombRecord> {
        self.bomb_defused.as_ref()
    }
}
