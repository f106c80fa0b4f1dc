use anyhow::Result;
use chrono::NaiveDate;

use super::models::{AdvancedStatLine, Game, GameId, GameStatLine, PlayerId, TeamId};

/// Read-only access to ingested game history.
///
/// Every list that represents a player's history is ordered newest-first.
/// Implementations own their own timeouts; the scoring core never retries.
pub trait GameHistoryReader: Send + Sync {
    /// All of a player's box-score lines, newest-first.
    fn recent_games(&self, player: PlayerId) -> Result<Vec<GameStatLine>>;

    /// Up to `limit` advanced lines for a player, newest-first. With
    /// `before`, only lines dated strictly earlier are considered, so the
    /// limit applies after the cutoff.
    fn recent_advanced_stats(
        &self,
        player: PlayerId,
        before: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<AdvancedStatLine>>;

    /// Team-level advanced lines with `start <= date <= end`.
    fn team_stats_in_range(
        &self,
        team: TeamId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AdvancedStatLine>>;

    /// Box-score lines from games between the two teams played before `before`.
    fn games_between(
        &self,
        team_a: TeamId,
        team_b: TeamId,
        before: NaiveDate,
    ) -> Result<Vec<GameStatLine>>;

    /// Games involving `team` with `start <= date <= end`.
    fn team_games_in_range(
        &self,
        team: TeamId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Game>>;

    fn games_on(&self, date: NaiveDate) -> Result<Vec<Game>>;

    fn find_game(&self, game: GameId) -> Result<Option<Game>>;

    /// Players currently listed on a team.
    fn roster(&self, team: TeamId) -> Result<Vec<PlayerId>>;

    fn player_team(&self, player: PlayerId) -> Result<Option<TeamId>>;
}
