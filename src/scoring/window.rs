//! Symbolic time periods → concrete "most recent N games" slices.

use crate::db::models::{GameStatLine, TimePeriod};

/// Two call paths disagree on what "enough games" means, so both exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Caps plus a per-period minimum: L5 3, L10 5, L15 8, L20 10, SEASON 15.
    Strict,
    /// Hard caps only; any non-empty history counts as sufficient.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatWindow {
    /// `None` means the whole season.
    pub game_count: Option<usize>,
    pub minimum_games: usize,
}

impl StatWindow {
    pub fn resolve(period: TimePeriod, policy: WindowPolicy) -> Self {
        let (game_count, strict_minimum) = match period {
            TimePeriod::L5 => (Some(5), 3),
            TimePeriod::L10 => (Some(10), 5),
            TimePeriod::L15 => (Some(15), 8),
            TimePeriod::L20 => (Some(20), 10),
            TimePeriod::Season => (None, 15),
        };
        let minimum_games = match policy {
            WindowPolicy::Strict => strict_minimum,
            WindowPolicy::Lenient => 1,
        };
        StatWindow {
            game_count,
            minimum_games,
        }
    }

    /// Most recent games of a newest-first history, limited to the window.
    pub fn take<'a>(&self, games: &'a [GameStatLine]) -> &'a [GameStatLine] {
        match self.game_count {
            Some(n) => &games[..n.min(games.len())],
            None => games,
        }
    }

    pub fn is_satisfied_by(&self, available_games: usize) -> bool {
        available_games >= self.minimum_games
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::lines_with_points;

    #[test]
    fn strict_mapping_matches_period_table() {
        let expected = [
            (TimePeriod::L5, Some(5), 3),
            (TimePeriod::L10, Some(10), 5),
            (TimePeriod::L15, Some(15), 8),
            (TimePeriod::L20, Some(20), 10),
            (TimePeriod::Season, None, 15),
        ];
        for (period, count, minimum) in expected {
            let w = StatWindow::resolve(period, WindowPolicy::Strict);
            assert_eq!(w.game_count, count, "{:?}", period);
            assert_eq!(w.minimum_games, minimum, "{:?}", period);
        }
    }

    #[test]
    fn lenient_policy_keeps_caps_but_drops_minimums() {
        let strict = StatWindow::resolve(TimePeriod::L20, WindowPolicy::Strict);
        let lenient = StatWindow::resolve(TimePeriod::L20, WindowPolicy::Lenient);
        assert_eq!(strict.game_count, lenient.game_count);
        assert!(!strict.is_satisfied_by(3));
        assert!(lenient.is_satisfied_by(3));
        assert!(!lenient.is_satisfied_by(0));
    }

    #[test]
    fn l10_with_three_games_is_insufficient_under_strict() {
        let w = StatWindow::resolve(TimePeriod::L10, WindowPolicy::Strict);
        assert!(!w.is_satisfied_by(3));
        assert!(w.is_satisfied_by(5));
    }

    #[test]
    fn take_limits_to_most_recent_games() {
        let games = lines_with_points(1, 40, &[30, 28, 26, 24, 22, 20, 18]);
        let l5 = StatWindow::resolve(TimePeriod::L5, WindowPolicy::Strict).take(&games);
        assert_eq!(l5.len(), 5);
        assert_eq!(l5[0].points, 30);

        let season = StatWindow::resolve(TimePeriod::Season, WindowPolicy::Strict).take(&games);
        assert_eq!(season.len(), 7);

        let short = &games[..2];
        assert_eq!(StatWindow::resolve(TimePeriod::L10, WindowPolicy::Lenient).take(short).len(), 2);
    }
}
