//! In-memory game history for unit tests.

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

use super::models::*;
use super::reader::GameHistoryReader;

/// Day `n` of a synthetic season starting 2024-01-01 (day 1).
pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n as i64 - 1)
}

pub fn line(player: PlayerId, game: GameId, date: NaiveDate, points: i32) -> GameStatLine {
    GameStatLine {
        player_id: player,
        game_id: game,
        team_id: 1,
        game_date: date,
        points,
        assists: 5,
        rebounds: 8,
        minutes: 32.0,
    }
}

/// Newest-first lines for `player`, one game every other day ending on `last_day`.
pub fn lines_with_points(player: PlayerId, last_day: u32, points: &[i32]) -> Vec<GameStatLine> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let d = last_day - 2 * i as u32;
            line(player, 1_000 + d as GameId, day(d), *p)
        })
        .collect()
}

pub fn final_game(
    id: GameId,
    date: NaiveDate,
    home: TeamId,
    away: TeamId,
    home_score: i32,
    away_score: i32,
) -> Game {
    Game {
        id,
        game_date: date,
        home_team: home,
        away_team: away,
        status: GameStatus::Final,
        home_score: Some(home_score),
        away_score: Some(away_score),
    }
}

pub fn scheduled_game(id: GameId, date: NaiveDate, home: TeamId, away: TeamId) -> Game {
    Game {
        id,
        game_date: date,
        home_team: home,
        away_team: away,
        status: GameStatus::Scheduled,
        home_score: None,
        away_score: None,
    }
}

/// League-average advanced line.
pub fn advanced(subject: u64, game: GameId, date: NaiveDate) -> AdvancedStatLine {
    AdvancedStatLine {
        subject_id: subject,
        game_id: game,
        game_date: date,
        pie: 0.100,
        pace: 100.0,
        usage_pct: 20.0,
        true_shooting_pct: 55.0,
        assist_pct: 15.0,
        assist_ratio: 15.0,
        rebound_pct: 10.0,
        offensive_rebound_pct: 5.0,
        defensive_rebound_pct: 15.0,
        offensive_rating: 110.0,
        defensive_rating: 110.0,
        net_rating: 0.0,
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryHistory {
    pub games: Vec<Game>,
    pub lines: Vec<GameStatLine>,
    pub player_advanced: Vec<AdvancedStatLine>,
    pub team_advanced: Vec<AdvancedStatLine>,
    pub rosters: HashMap<TeamId, Vec<PlayerId>>,
    pub unavailable: bool,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(mut self, lines: Vec<GameStatLine>) -> Self {
        self.lines.extend(lines);
        self
    }

    pub fn with_games(mut self, games: Vec<Game>) -> Self {
        self.games.extend(games);
        self
    }

    pub fn with_player_advanced(mut self, lines: Vec<AdvancedStatLine>) -> Self {
        self.player_advanced.extend(lines);
        self
    }

    pub fn with_team_advanced(mut self, lines: Vec<AdvancedStatLine>) -> Self {
        self.team_advanced.extend(lines);
        self
    }

    pub fn with_roster(mut self, team: TeamId, players: Vec<PlayerId>) -> Self {
        self.rosters.insert(team, players);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            bail!("history store offline");
        }
        Ok(())
    }

    fn newest_first<T: Clone>(items: impl Iterator<Item = T>, date: impl Fn(&T) -> NaiveDate) -> Vec<T> {
        let mut out: Vec<T> = items.collect();
        out.sort_by(|a, b| date(b).cmp(&date(a)));
        out
    }
}

impl GameHistoryReader for InMemoryHistory {
    fn recent_games(&self, player: PlayerId) -> Result<Vec<GameStatLine>> {
        self.check()?;
        Ok(Self::newest_first(
            self.lines.iter().filter(|l| l.player_id == player).cloned(),
            |l| l.game_date,
        ))
    }

    fn recent_advanced_stats(
        &self,
        player: PlayerId,
        before: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<AdvancedStatLine>> {
        self.check()?;
        let mut rows = Self::newest_first(
            self.player_advanced
                .iter()
                .filter(|l| l.subject_id == player)
                .filter(|l| before.map_or(true, |cutoff| l.game_date < cutoff))
                .cloned(),
            |l| l.game_date,
        );
        rows.truncate(limit);
        Ok(rows)
    }

    fn team_stats_in_range(
        &self,
        team: TeamId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AdvancedStatLine>> {
        self.check()?;
        Ok(self
            .team_advanced
            .iter()
            .filter(|l| l.subject_id == team && l.game_date >= start && l.game_date <= end)
            .cloned()
            .collect())
    }

    fn games_between(
        &self,
        team_a: TeamId,
        team_b: TeamId,
        before: NaiveDate,
    ) -> Result<Vec<GameStatLine>> {
        self.check()?;
        let ids: Vec<GameId> = self
            .games
            .iter()
            .filter(|g| g.game_date < before)
            .filter(|g| {
                (g.home_team == team_a && g.away_team == team_b)
                    || (g.home_team == team_b && g.away_team == team_a)
            })
            .map(|g| g.id)
            .collect();
        Ok(Self::newest_first(
            self.lines.iter().filter(|l| ids.contains(&l.game_id)).cloned(),
            |l| l.game_date,
        ))
    }

    fn team_games_in_range(
        &self,
        team: TeamId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Game>> {
        self.check()?;
        Ok(Self::newest_first(
            self.games
                .iter()
                .filter(|g| g.home_team == team || g.away_team == team)
                .filter(|g| g.game_date >= start && g.game_date <= end)
                .cloned(),
            |g| g.game_date,
        ))
    }

    fn games_on(&self, date: NaiveDate) -> Result<Vec<Game>> {
        self.check()?;
        Ok(self.games.iter().filter(|g| g.game_date == date).cloned().collect())
    }

    fn find_game(&self, game: GameId) -> Result<Option<Game>> {
        self.check()?;
        Ok(self.games.iter().find(|g| g.id == game).cloned())
    }

    fn roster(&self, team: TeamId) -> Result<Vec<PlayerId>> {
        self.check()?;
        Ok(self.rosters.get(&team).cloned().unwrap_or_default())
    }

    fn player_team(&self, player: PlayerId) -> Result<Option<TeamId>> {
        self.check()?;
        Ok(self
            .rosters
            .iter()
            .find(|(_, players)| players.contains(&player))
            .map(|(team, _)| *team)
            .or_else(|| {
                self.recent_games(player)
                    .ok()
                    .and_then(|g| g.first().map(|l| l.team_id))
            }))
    }
}
