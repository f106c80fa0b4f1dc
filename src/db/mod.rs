use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

#[cfg(test)]
pub mod fixtures;
pub mod models;
pub mod reader;

use models::*;
pub use reader::GameHistoryReader;

/// Thread-safe SQLite connection (single connection with mutex).
///
/// The ingestion side writes these tables; the scoring core only reads them.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    fn advanced_rows(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<AdvancedStatLine>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map_advanced)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let total = rows.len();
        let kept: Vec<AdvancedStatLine> =
            rows.into_iter().filter(|l| l.is_within_bounds()).collect();
        if kept.len() < total {
            warn!(
                "Skipped {} advanced stat row(s) outside documented ranges",
                total - kept.len()
            );
        }
        Ok(kept)
    }
}

impl GameHistoryReader for Database {
    fn recent_games(&self, player: PlayerId) -> Result<Vec<GameStatLine>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.player_id, s.game_id, s.team_id, g.game_date,
                    s.points, s.assists, s.rebounds, s.minutes
             FROM game_stats s JOIN games g ON g.id = s.game_id
             WHERE s.player_id = ?1
             ORDER BY g.game_date DESC, g.id DESC",
        )?;
        let lines = stmt
            .query_map(params![player as i64], map_stat_line)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    fn recent_advanced_stats(
        &self,
        player: PlayerId,
        before: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<AdvancedStatLine>> {
        self.advanced_rows(
            &format!(
                "{ADVANCED_SELECT}
                 WHERE a.subject_kind = 'player' AND a.subject_id = ?1
                   AND (?2 IS NULL OR g.game_date < ?2)
                 ORDER BY g.game_date DESC, g.id DESC LIMIT ?3"
            ),
            params![player as i64, before, limit as i64],
        )
    }

    fn team_stats_in_range(
        &self,
        team: TeamId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AdvancedStatLine>> {
        self.advanced_rows(
            &format!(
                "{ADVANCED_SELECT}
                 WHERE a.subject_kind = 'team' AND a.subject_id = ?1
                   AND g.game_date BETWEEN ?2 AND ?3
                 ORDER BY g.game_date DESC, g.id DESC"
            ),
            params![team as i64, start, end],
        )
    }

    fn games_between(
        &self,
        team_a: TeamId,
        team_b: TeamId,
        before: NaiveDate,
    ) -> Result<Vec<GameStatLine>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.player_id, s.game_id, s.team_id, g.game_date,
                    s.points, s.assists, s.rebounds, s.minutes
             FROM game_stats s JOIN games g ON g.id = s.game_id
             WHERE ((g.home_team = ?1 AND g.away_team = ?2)
                 OR (g.home_team = ?2 AND g.away_team = ?1))
               AND g.game_date < ?3
             ORDER BY g.game_date DESC, g.id DESC",
        )?;
        let lines = stmt
            .query_map(params![team_a as i64, team_b as i64, before], map_stat_line)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    fn team_games_in_range(
        &self,
        team: TeamId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Game>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{GAME_SELECT}
             WHERE (home_team = ?1 OR away_team = ?1) AND game_date BETWEEN ?2 AND ?3
             ORDER BY game_date DESC, id DESC"
        ))?;
        let games = stmt
            .query_map(params![team as i64, start, end], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    fn games_on(&self, date: NaiveDate) -> Result<Vec<Game>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("{GAME_SELECT} WHERE game_date = ?1 ORDER BY id"))?;
        let games = stmt
            .query_map(params![date], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    fn find_game(&self, game: GameId) -> Result<Option<Game>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("{GAME_SELECT} WHERE id = ?1"),
                params![game as i64],
                map_game,
            )
            .optional()?;
        Ok(found)
    }

    fn roster(&self, team: TeamId) -> Result<Vec<PlayerId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM players WHERE team_id = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![team as i64], |row| Ok(row.get::<_, i64>(0)? as PlayerId))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn player_team(&self, player: PlayerId) -> Result<Option<TeamId>> {
        let conn = self.conn()?;
        let team = conn
            .query_row(
                "SELECT team_id FROM players WHERE id = ?1",
                params![player as i64],
                |row| Ok(row.get::<_, i64>(0)? as TeamId),
            )
            .optional()?;
        Ok(team)
    }
}

// Seeding helpers for reader tests; production rows come from the ingestion job.
#[cfg(test)]
impl Database {
    pub fn upsert_player(&self, player: PlayerId, team: TeamId) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO players (id, team_id) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET team_id = excluded.team_id",
            params![player as i64, team as i64],
        )?;
        Ok(())
    }

    pub fn upsert_game(&self, game: &Game) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO games (id, game_date, home_team, away_team, status, home_score, away_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                home_score = excluded.home_score,
                away_score = excluded.away_score",
            params![
                game.id as i64,
                game.game_date,
                game.home_team as i64,
                game.away_team as i64,
                game.status.as_str(),
                game.home_score,
                game.away_score,
            ],
        )?;
        Ok(())
    }

    pub fn insert_game_stat(&self, line: &GameStatLine) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO game_stats (player_id, game_id, team_id, points, assists, rebounds, minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                line.player_id as i64,
                line.game_id as i64,
                line.team_id as i64,
                line.points,
                line.assists,
                line.rebounds,
                line.minutes,
            ],
        )?;
        Ok(())
    }

    pub fn insert_advanced_stat(&self, kind: &str, line: &AdvancedStatLine) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO advanced_stats (
                subject_kind, subject_id, game_id, pie, pace, usage_pct,
                true_shooting_pct, assist_pct, assist_ratio, rebound_pct,
                offensive_rebound_pct, defensive_rebound_pct,
                offensive_rating, defensive_rating, net_rating
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            params![
                kind,
                line.subject_id as i64,
                line.game_id as i64,
                line.pie,
                line.pace,
                line.usage_pct,
                line.true_shooting_pct,
                line.assist_pct,
                line.assist_ratio,
                line.rebound_pct,
                line.offensive_rebound_pct,
                line.defensive_rebound_pct,
                line.offensive_rating,
                line.defensive_rating,
                line.net_rating,
            ],
        )?;
        Ok(())
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

const GAME_SELECT: &str =
    "SELECT id, game_date, home_team, away_team, status, home_score, away_score FROM games";

const ADVANCED_SELECT: &str = "SELECT a.subject_id, a.game_id, g.game_date, a.pie, a.pace,
        a.usage_pct, a.true_shooting_pct, a.assist_pct, a.assist_ratio, a.rebound_pct,
        a.offensive_rebound_pct, a.defensive_rebound_pct,
        a.offensive_rating, a.defensive_rating, a.net_rating
     FROM advanced_stats a JOIN games g ON g.id = a.game_id";

fn map_stat_line(row: &rusqlite::Row) -> rusqlite::Result<GameStatLine> {
    Ok(GameStatLine {
        player_id: row.get::<_, i64>(0)? as PlayerId,
        game_id: row.get::<_, i64>(1)? as GameId,
        team_id: row.get::<_, i64>(2)? as TeamId,
        game_date: row.get(3)?,
        points: row.get(4)?,
        assists: row.get(5)?,
        rebounds: row.get(6)?,
        minutes: row.get(7)?,
    })
}

fn map_advanced(row: &rusqlite::Row) -> rusqlite::Result<AdvancedStatLine> {
    Ok(AdvancedStatLine {
        subject_id: row.get::<_, i64>(0)? as u64,
        game_id: row.get::<_, i64>(1)? as GameId,
        game_date: row.get(2)?,
        pie: row.get(3)?,
        pace: row.get(4)?,
        usage_pct: row.get(5)?,
        true_shooting_pct: row.get(6)?,
        assist_pct: row.get(7)?,
        assist_ratio: row.get(8)?,
        rebound_pct: row.get(9)?,
        offensive_rebound_pct: row.get(10)?,
        defensive_rebound_pct: row.get(11)?,
        offensive_rating: row.get(12)?,
        defensive_rating: row.get(13)?,
        net_rating: row.get(14)?,
    })
}

fn map_game(row: &rusqlite::Row) -> rusqlite::Result<Game> {
    let status: String = row.get(4)?;
    Ok(Game {
        id: row.get::<_, i64>(0)? as GameId,
        game_date: row.get(1)?,
        home_team: row.get::<_, i64>(2)? as TeamId,
        away_team: row.get::<_, i64>(3)? as TeamId,
        status: GameStatus::parse(&status),
        home_score: row.get(5)?,
        away_score: row.get(6)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    id       INTEGER PRIMARY KEY,
    team_id  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS games (
    id          INTEGER PRIMARY KEY,
    game_date   TEXT    NOT NULL,
    home_team   INTEGER NOT NULL,
    away_team   INTEGER NOT NULL,
    status      TEXT    NOT NULL DEFAULT 'scheduled',
    home_score  INTEGER,
    away_score  INTEGER
);

CREATE TABLE IF NOT EXISTS game_stats (
    player_id  INTEGER NOT NULL,
    game_id    INTEGER NOT NULL,
    team_id    INTEGER NOT NULL,
    points     INTEGER NOT NULL,
    assists    INTEGER NOT NULL,
    rebounds   INTEGER NOT NULL,
    minutes    REAL    NOT NULL DEFAULT 0,
    PRIMARY KEY (player_id, game_id),
    FOREIGN KEY (game_id) REFERENCES games(id)
);

CREATE TABLE IF NOT EXISTS advanced_stats (
    subject_kind          TEXT    NOT NULL,
    subject_id            INTEGER NOT NULL,
    game_id               INTEGER NOT NULL,
    pie                   REAL    NOT NULL,
    pace                  REAL    NOT NULL,
    usage_pct             REAL    NOT NULL,
    true_shooting_pct     REAL    NOT NULL,
    assist_pct            REAL    NOT NULL,
    assist_ratio          REAL    NOT NULL,
    rebound_pct           REAL    NOT NULL,
    offensive_rebound_pct REAL    NOT NULL,
    defensive_rebound_pct REAL    NOT NULL,
    offensive_rating      REAL    NOT NULL,
    defensive_rating      REAL    NOT NULL,
    net_rating            REAL    NOT NULL,
    PRIMARY KEY (subject_kind, subject_id, game_id),
    FOREIGN KEY (game_id) REFERENCES games(id)
);

CREATE INDEX IF NOT EXISTS idx_games_date ON games(game_date);
CREATE INDEX IF NOT EXISTS idx_game_stats_player ON game_stats(player_id);
CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id);
"#;
