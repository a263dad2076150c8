use crate::snapshot::PlayerSnapshot;

pub const HEADER: [&str; 40] = [
    "Name",
    "IsBot",
    "PlayerID",
    "Team",
    "TeamID",
    "TeamScore",
    "RoundNumber",
    "Tick",
    "Time",
    "ClockTime",
    "PosX",
    "PosY",
    "PosZ",
    "VelX",
    "VelY",
    "VelZ",
    "ViewDirectionX",
    "ViewDirectionY",
    "KillEvent",
    "KilledBy",
    "Killed",
    "Assisters",
    "Kills",
    "Deaths",
    "Assists",
    "Attacked",
    "AttackedBy",
    "Attacking",
    "AttackingTarget",
    "Health",
    "HealthDamageTaken",
    "Armor",
    "ArmorDamageTaken",
    "BombPlantBegin",
    "BombPlanted",
    "BombDefuseStarted",
    "BombDefused",
    "BombPlantSite",
    "BombDefuseSite",
    "FlashDuration",
];

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Writing record: {0}")]
    Csv(#[from] csv::Error),
    #[error("Output: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Whether the sink is unusable from now on, as opposed to a single row
    /// having failed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Csv(e) => e.is_io_error(),
            Self::Io(_) => true,
        }
    }
}

/// Receives finished rows.
pub trait RowSink {
    fn write_row(&mut self, row: &PlayerSnapshot) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl RowSink for Vec<PlayerSnapshot> {
    fn write_row(&mut self, row: &PlayerSnapshot) -> Result<(), SinkError> {
        self.push(row.clone());
        Ok(())
    }
}

pub struct CsvSink<W>
where
    W: std::io::Write,
{
    writer: csv::Writer<W>,
}

impl<W> CsvSink<W>
where
    W: std::io::Write,
{
    /// Wraps `inner` and writes the header row.
    pub fn new(inner: W) -> Result<Self, SinkError> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(HEADER)?;

        Ok(Self { writer })
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
    }
}

impl<W> RowSink for CsvSink<W>
where
    W: std::io::Write,
{
    fn write_row(&mut self, row: &PlayerSnapshot) -> Result<(), SinkError> {
        self.writer.write_record(record(row))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn record(row: &PlayerSnapshot) -> [String; 40] {
    let site = |site: Option<common::Bombsite>| site.map(|s| s.to_string()).unwrap_or_default();

    [
        row.name.clone(),
        row.is_bot.to_string(),
        row.player_id.to_string(),
        row.team.to_string(),
        row.team_id.to_string(),
        row.team_score.to_string(),
        row.round_number.to_string(),
        row.tick.to_string(),
        format!("{:.2}", row.time),
        format!("{:.2}", row.clock_time),
        format!("{:.6}", row.position.x),
        format!("{:.6}", row.position.y),
        format!("{:.6}", row.position.z),
        format!("{:.6}", row.velocity.x),
        format!("{:.6}", row.velocity.y),
        format!("{:.6}", row.velocity.z),
        format!("{:.6}", row.view_direction_x),
        format!("{:.6}", row.view_direction_y),
        row.kill_event.to_string(),
        row.killed_by.join(","),
        row.killed.join(","),
        row.assisters.join(","),
        row.kills.to_string(),
        row.deaths.to_string(),
        row.assists.to_string(),
        row.attacked.to_string(),
        row.attacked_by.join(","),
        row.attacking.to_string(),
        row.attacking_target.join(","),
        row.health.to_string(),
        row.health_damage_taken.to_string(),
        row.armor.to_string(),
        row.armor_damage_taken.to_string(),
        row.bomb_plant_begin.to_string(),
        row.bomb_planted.to_string(),
        row.bomb_defuse_started.to_string(),
        row.bomb_defused.to_string(),
        site(row.bomb_plant_site),
        site(row.bomb_defuse_site),
        format!("{:.2}", row.flash_duration),
    ]
}
