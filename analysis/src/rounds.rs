/// Round scoped state. The flags survive window flushes and are only reset
/// when the next round starts.
#[derive(Debug, Default)]
pub struct RoundTracker {
    round_number: u32,
    round_start_time: f64,
    bomb_plant_begun: std::collections::HashMap<common::PlayerIdentity, bool>,
    bomb_defuse_started: std::collections::HashMap<common::PlayerIdentity, bool>,
}

impl RoundTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_round_start(&mut self, elapsed: f64) {
        self.round_number += 1;
        self.round_start_time = elapsed;
        self.bomb_plant_begun.clear();
        self.bomb_defuse_started.clear();

        tracing::debug!(round = self.round_number, elapsed, "Round started");
    }

    pub fn on_bomb_plant_begin(&mut self, actor: &common::PlayerIdentity) {
        self.bomb_plant_begun.insert(actor.clone(), true);
    }

    pub fn on_bomb_plant_abort(&mut self, actor: &common::PlayerIdentity) {
        self.bomb_plant_begun.insert(actor.clone(), false);
    }

    pub fn on_bomb_defuse_begin(&mut self, actor: &common::PlayerIdentity) {
        self.bomb_defuse_started.insert(actor.clone(), true);
    }

    pub fn on_bomb_defuse_abort(&mut self, actor: &common::PlayerIdentity) {
        self.bomb_defuse_started.insert(actor.clone(), false);
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn round_start_time(&self) -> f64 {
        self.round_start_time
    }

    pub fn bomb_plant_begun(&self, player: &common::PlayerIdentity) -> bool {
        self.bomb_plant_begun.get(player).copied().unwrap_or(false)
    }

    pub fn bomb_defuse_started(&self, player: &common::PlayerIdentity) -> bool {
        self.bomb_defuse_started.get(player).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PlayerIdentity;

    #[test]
    fn round_start_counts_and_records_time() {
        let mut rounds = RoundTracker::new();
        assert_eq!(0, rounds.round_number());

        rounds.on_round_start(12.5);
        assert_eq!(1, rounds.round_number());
        assert_eq!(12.5, rounds.round_start_time());

        rounds.on_round_start(140.0);
        assert_eq!(2, rounds.round_number());
        assert_eq!(140.0, rounds.round_start_time());
    }

    #[test]
    fn plant_and_abort() {
        let planter = PlayerIdentity::new(1, "Excel");
        let other = PlayerIdentity::new(2, "xTee");
        let mut rounds = RoundTracker::new();

        rounds.on_bomb_plant_begin(&planter);
        assert!(rounds.bomb_plant_begun(&planter));
        assert!(!rounds.bomb_plant_begun(&other));

        rounds.on_bomb_plant_abort(&planter);
        assert!(!rounds.bomb_plant_begun(&planter));
    }

    #[test]
    fn round_start_resets_flags() {
        let planter = PlayerIdentity::new(1, "Excel");
        let defuser = PlayerIdentity::new(6, "zodiac");
        let mut rounds = RoundTracker::new();

        rounds.on_bomb_plant_begin(&planter);
        rounds.on_bomb_defuse_begin(&defuser);
        assert!(rounds.bomb_defuse_started(&defuser));

        rounds.on_round_start(30.0);

        assert!(!rounds.bomb_plant_begun(&planter));
        assert!(!rounds.bomb_defuse_started(&defuser));
    }

    #[test]
    fn defuse_abort_only_affects_actor() {
        let first = PlayerIdentity::new(5, "cute");
        let second = PlayerIdentity::new(6, "zodiac");
        let mut rounds = RoundTracker::new();

        rounds.on_bomb_defuse_begin(&first);
        rounds.on_bomb_defuse_begin(&second);
        rounds.on_bomb_defuse_abort(&first);

        assert!(!rounds.bomb_defuse_started(&first));
        assert!(rounds.bomb_defuse_started(&second));
    }
}
