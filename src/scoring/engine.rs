use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use super::advanced::{advanced_impact, AdvancedWeighting};
use super::blowout::{
    blowout_impact, blowout_probability, strength_differential, team_strength, BlowoutImpact,
    BLOWOUT_RISK_THRESHOLD, IMPACT_SAMPLE_GAMES, STRENGTH_LOOKBACK_DAYS,
};
use super::composer::{compose, ConfidenceBreakdown, ScoringInputs, ScoringStrategy};
use super::context::{
    defense_factor, game_context, matchup_impact, HomeCourtFactors, DEFENSE_LOOKBACK_DAYS,
};
use super::hit_rate::{summarize, validate_threshold, HitRateSummary};
use super::recency::recency_score;
use super::rest::{is_back_to_back, rest_multiplier, RestImpact};
use super::window::{StatWindow, WindowPolicy};
use super::{Factor, LeagueBaselines};
use crate::db::models::{Game, GameStatLine, PlayerId, Stat, StatCategory, TeamId, TimePeriod};
use crate::db::GameHistoryReader;
use crate::error::{CoreError, Result};

/// Knobs injected into every scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub baselines: LeagueBaselines,
    pub home_court: HomeCourtFactors,
    pub window_policy: WindowPolicy,
    pub strategy: ScoringStrategy,
    pub advanced_weighting: AdvancedWeighting,
    /// Window behind the dashboard-refresh base score.
    pub base_period: TimePeriod,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            baselines: LeagueBaselines::default(),
            home_court: HomeCourtFactors::STANDARD,
            window_policy: WindowPolicy::Strict,
            strategy: ScoringStrategy::DashboardRefresh,
            advanced_weighting: AdvancedWeighting::NormalizedBaseline,
            base_period: TimePeriod::L10,
        }
    }
}

/// Entry point for every scoring operation.
///
/// Each call fetches the history it needs once and then runs pure scorers
/// over that snapshot; the same snapshot always yields the same decimal.
pub struct ConfidenceEngine<R> {
    reader: R,
    settings: EngineSettings,
}

impl<R: GameHistoryReader> ConfidenceEngine<R> {
    pub fn new(reader: R, settings: EngineSettings) -> Self {
        ConfidenceEngine { reader, settings }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Hit rate, average and legacy proxy over the period's window.
    pub fn calculate_hit_rate(
        &self,
        player: PlayerId,
        category: StatCategory,
        threshold: u32,
        period: TimePeriod,
    ) -> Result<HitRateSummary> {
        let stat = validate_request(player, category, threshold)?;
        let history = self.reader.recent_games(player)?;
        Ok(self.hit_rate_from_history(&history, stat, threshold, period))
    }

    /// Same as [`calculate_hit_rate`](Self::calculate_hit_rate) over an
    /// already fetched newest-first history. Arguments must be validated.
    pub fn hit_rate_from_history(
        &self,
        history: &[GameStatLine],
        stat: Stat,
        threshold: u32,
        period: TimePeriod,
    ) -> HitRateSummary {
        let window = StatWindow::resolve(period, self.settings.window_policy);
        summarize(
            window.take(history),
            stat,
            threshold,
            window.is_satisfied_by(history.len()),
        )
    }

    pub fn has_sufficient_data(
        &self,
        player: PlayerId,
        period: TimePeriod,
        policy: WindowPolicy,
    ) -> Result<bool> {
        validate_player(player)?;
        let games = self.reader.recent_games(player)?;
        Ok(StatWindow::resolve(period, policy).is_satisfied_by(games.len()))
    }

    /// Confidence in [0, 100] using the configured strategy.
    pub fn calculate_confidence_score(
        &self,
        player: PlayerId,
        game: &Game,
        category: StatCategory,
        threshold: u32,
    ) -> Result<Decimal> {
        self.score_breakdown(self.settings.strategy, player, game, category, threshold)
            .map(|b| b.score)
    }

    pub fn score_breakdown(
        &self,
        strategy: ScoringStrategy,
        player: PlayerId,
        game: &Game,
        category: StatCategory,
        threshold: u32,
    ) -> Result<ConfidenceBreakdown> {
        let stat = validate_request(player, category, threshold)?;
        let date = game.game_date;
        let baselines = &self.settings.baselines;

        let prior: Vec<GameStatLine> = self
            .reader
            .recent_games(player)?
            .into_iter()
            .filter(|g| g.game_date < date)
            .collect();
        let team = self.resolve_team(player, game, &prior)?;
        let opponent = team.and_then(|t| game.opponent_of(t));

        // Game context
        let is_home = team == Some(game.home_team);
        let defense = match opponent {
            Some(opp) => {
                let lines = self.reader.team_stats_in_range(
                    opp,
                    date - Duration::days(DEFENSE_LOOKBACK_DAYS),
                    date - Duration::days(1),
                )?;
                defense_factor(&lines, baselines)
            }
            None => defense_factor(&[], baselines),
        };
        let matchup = match (team, opponent) {
            (Some(t), Some(opp)) => {
                let meetings: Vec<GameStatLine> = self
                    .reader
                    .games_between(t, opp, date)?
                    .into_iter()
                    .filter(|l| l.player_id == player)
                    .collect();
                matchup_impact(&meetings, stat, threshold)
            }
            _ => matchup_impact(&[], stat, threshold),
        };
        let context = game_context(self.settings.home_court.factor(is_home), defense, matchup);

        // Rest
        let (days_of_rest, multiplier) = rest_multiplier(&prior, date, stat);
        let back_to_back = match team {
            Some(t) => {
                let yesterday = date - Duration::days(1);
                let games = self.reader.team_games_in_range(t, yesterday, yesterday)?;
                is_back_to_back(&games, game)
            }
            None => false,
        };
        let rest = RestImpact {
            days_of_rest,
            multiplier,
            back_to_back,
        };

        // Form and advanced metrics
        let recency = recency_score(&prior, stat, threshold);
        let latest = self
            .reader
            .recent_advanced_stats(player, Some(date), 1)?
            .into_iter()
            .next();
        let advanced = advanced_impact(
            latest.as_ref(),
            stat,
            self.settings.advanced_weighting,
            baselines,
        );

        // Blowout risk
        let blowout_risk = self.game_blowout_risk(game)?;
        let performance_retention =
            if strategy == ScoringStrategy::SinglePick && blowout_risk > BLOWOUT_RISK_THRESHOLD {
                self.blowout_impact_before(player, Some(date))?.performance_retention
            } else {
                Decimal::ONE
            };

        for (name, factor) in [
            ("defense", defense),
            ("matchup", matchup),
            ("rest", multiplier),
            ("recency", recency),
            ("advanced", advanced),
        ] {
            if let Factor::Defaulted(v) = factor {
                debug!(player, game = game.id, "{} factor defaulted to {}", name, v);
            }
        }

        let window = StatWindow::resolve(self.settings.base_period, self.settings.window_policy);
        let inputs = ScoringInputs {
            stat,
            threshold,
            prior_games: &prior,
            base_window: window.take(&prior),
            context,
            rest,
            recency,
            advanced,
            blowout_risk,
            performance_retention,
        };
        Ok(compose(strategy, &inputs))
    }

    /// Probability (0–100) that this game turns into a blowout.
    pub fn game_blowout_risk(&self, game: &Game) -> Result<Decimal> {
        let baselines = &self.settings.baselines;
        let start = game.game_date - Duration::days(STRENGTH_LOOKBACK_DAYS);
        let end = game.game_date - Duration::days(1);
        let home = team_strength(
            &self.reader.team_stats_in_range(game.home_team, start, end)?,
            baselines,
        );
        let away = team_strength(
            &self.reader.team_stats_in_range(game.away_team, start, end)?,
            baselines,
        );
        if home.defaulted != away.defaulted {
            debug!(
                game = game.id,
                "one side has no strength data; rating default {} inflates the gap",
                baselines.blowout_rating_default
            );
        }
        Ok(blowout_probability(strength_differential(&home, &away, baselines)))
    }

    pub fn analyze_player_blowout_impact(&self, player: PlayerId) -> Result<BlowoutImpact> {
        validate_player(player)?;
        self.blowout_impact_before(player, None)
    }

    /// Blowout impact over the games played strictly before `before`.
    fn blowout_impact_before(
        &self,
        player: PlayerId,
        before: Option<NaiveDate>,
    ) -> Result<BlowoutImpact> {
        let mut lines: Vec<GameStatLine> = self
            .reader
            .recent_games(player)?
            .into_iter()
            .filter(|l| before.map_or(true, |cutoff| l.game_date < cutoff))
            .collect();
        lines.truncate(IMPACT_SAMPLE_GAMES);
        let advanced = self
            .reader
            .recent_advanced_stats(player, before, IMPACT_SAMPLE_GAMES)?;

        let mut games = HashMap::new();
        for id in lines.iter().map(|l| l.game_id).chain(advanced.iter().map(|l| l.game_id)) {
            if games.contains_key(&id) {
                continue;
            }
            if let Some(game) = self.reader.find_game(id)? {
                games.insert(id, game);
            }
        }
        Ok(blowout_impact(&lines, &advanced, &games))
    }

    pub fn is_back_to_back(&self, game: &Game, player: PlayerId) -> Result<bool> {
        validate_player(player)?;
        let prior = self.reader.recent_games(player)?;
        let Some(team) = self.resolve_team(player, game, &prior)? else {
            return Ok(false);
        };
        let yesterday = game.game_date - Duration::days(1);
        let games = self.reader.team_games_in_range(team, yesterday, yesterday)?;
        Ok(is_back_to_back(&games, game))
    }

    /// The player's team for this game. Unknown players score with neutral
    /// context; a known team that is not in the game is a caller error.
    fn resolve_team(
        &self,
        player: PlayerId,
        game: &Game,
        history: &[GameStatLine],
    ) -> Result<Option<TeamId>> {
        let team = match self.reader.player_team(player)? {
            Some(t) => Some(t),
            None => history.first().map(|l| l.team_id),
        };
        match team {
            Some(t) if game.opponent_of(t).is_none() => Err(CoreError::invalid(format!(
                "player {} (team {}) is not playing in game {}",
                player, t, game.id
            ))),
            other => Ok(other),
        }
    }
}

fn validate_player(player: PlayerId) -> Result<()> {
    if player == 0 {
        return Err(CoreError::invalid("player id is unset"));
    }
    Ok(())
}

pub(crate) fn validate_request(player: PlayerId, category: StatCategory, threshold: u32) -> Result<Stat> {
    validate_player(player)?;
    let stat = Stat::try_from(category)?;
    validate_threshold(threshold)?;
    Ok(stat)
}
