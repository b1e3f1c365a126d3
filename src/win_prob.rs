use crate::state::{Play, WinProbEntry};

const CLOCK_WINDOW_SECS: u32 = 60;
const LEADING_PCT: f32 = 55.0;
const TRAILING_PCT: f32 = 45.0;
const TIED_PCT: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinProbSource {
    Embedded,
    TableExact,
    TableClock,
    TableLatest,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWinProbability {
    /// Possessing team's chance, 0..=100.
    pub percent: f32,
    pub source: WinProbSource,
}

pub fn resolve_win_probability(
    play: &Play,
    table: &[WinProbEntry],
    drive_team_id: Option<&str>,
    home_team_id: &str,
    home_score: u16,
    away_score: u16,
) -> f32 {
    resolve_detailed(play, table, drive_team_id, home_team_id, home_score, away_score).percent
}

/// Embedded probability, then the game table, then a score heuristic.
pub fn resolve_detailed(
    play: &Play,
    table: &[WinProbEntry],
    drive_team_id: Option<&str>,
    home_team_id: &str,
    home_score: u16,
    away_score: u16,
) -> ResolvedWinProbability {
    let possessing = Possession::of(drive_team_id, home_team_id);

    if let Some(prob) = play.probability {
        return ResolvedWinProbability {
            percent: possessing.percent(prob.home, prob.away),
            source: WinProbSource::Embedded,
        };
    }

    if let Some((entry, source)) = match_table_entry(play, table) {
        return ResolvedWinProbability {
            percent: possessing.percent(entry.home_win, None),
            source,
        };
    }

    ResolvedWinProbability {
        percent: heuristic(possessing, home_score, away_score),
        source: WinProbSource::Heuristic,
    }
}

fn match_table_entry<'a>(
    play: &Play,
    table: &'a [WinProbEntry],
) -> Option<(&'a WinProbEntry, WinProbSource)> {
    let exact = table.iter().find(|e| {
        e.play_id.as_deref() == Some(play.id.as_str())
            || (play.sequence_number > 0 && e.sequence_number == Some(play.sequence_number))
    });
    if let Some(entry) = exact {
        return Some((entry, WinProbSource::TableExact));
    }

    if let (Some(period), Some(clock)) = (play.period, play.clock.as_ref().and_then(|c| c.seconds))
    {
        let near = table
            .iter()
            .filter(|e| e.period == Some(period))
            .filter_map(|e| Some((e, e.clock_seconds?.abs_diff(clock))))
            .filter(|(_, diff)| *diff <= CLOCK_WINDOW_SECS)
            .min_by_key(|(_, diff)| *diff);
        if let Some((entry, _)) = near {
            return Some((entry, WinProbSource::TableClock));
        }
    }

    // The table is published in game order.
    table.last().map(|entry| (entry, WinProbSource::TableLatest))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Possession {
    Home,
    Away,
    Unknown,
}

impl Possession {
    fn of(drive_team_id: Option<&str>, home_team_id: &str) -> Self {
        match drive_team_id {
            Some(id) if !home_team_id.is_empty() && id == home_team_id => Possession::Home,
            Some(id) if !id.is_empty() => Possession::Away,
            _ => Possession::Unknown,
        }
    }

    /// `home` is a 0..1 fraction; unknown possession shows the favourite.
    fn percent(self, home: f64, away: Option<f64>) -> f32 {
        let home = clamp(home, 0.0, 1.0);
        let away = clamp(away.unwrap_or(1.0 - home), 0.0, 1.0);
        let fraction = match self {
            Possession::Home => home,
            Possession::Away => away,
            Possession::Unknown => home.max(away),
        };
        (fraction * 100.0) as f32
    }
}

fn heuristic(possessing: Possession, home_score: u16, away_score: u16) -> f32 {
    if home_score == away_score {
        return TIED_PCT;
    }
    let home_leads = home_score > away_score;
    match possessing {
        Possession::Home if home_leads => LEADING_PCT,
        Possession::Home => TRAILING_PCT,
        Possession::Away if home_leads => TRAILING_PCT,
        Possession::Away => LEADING_PCT,
        Possession::Unknown => TIED_PCT,
    }
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() { lo } else { v.max(lo).min(hi) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GameClock, PlayProbability};

    fn play(id: &str, seq: u32) -> Play {
        Play {
            id: id.to_string(),
            sequence_number: seq,
            ..Play::default()
        }
    }

    fn entry(play_id: Option<&str>, period: u8, clock: u32, home: f64) -> WinProbEntry {
        WinProbEntry {
            play_id: play_id.map(|s| s.to_string()),
            sequence_number: None,
            period: Some(period),
            clock_seconds: Some(clock),
            home_win: home,
            tie: None,
        }
    }

    #[test]
    fn embedded_flips_for_away_possession() {
        let mut p = play("1", 1);
        p.probability = Some(PlayProbability {
            home: 0.7,
            away: None,
            tie: None,
        });
        let home = resolve_win_probability(&p, &[], Some("12"), "12", 0, 0);
        let away = resolve_win_probability(&p, &[], Some("2"), "12", 0, 0);
        assert!((home - 70.0).abs() < 1e-4);
        assert!((away - 30.0).abs() < 1e-4);
    }

    #[test]
    fn embedded_beats_table() {
        let mut p = play("1", 1);
        p.probability = Some(PlayProbability {
            home: 0.6,
            away: Some(0.4),
            tie: None,
        });
        let table = vec![entry(Some("1"), 1, 900, 0.9)];
        let resolved = resolve_detailed(&p, &table, Some("12"), "12", 0, 0);
        assert_eq!(resolved.source, WinProbSource::Embedded);
        assert!((resolved.percent - 60.0).abs() < 1e-4);
    }

    #[test]
    fn table_matches_by_play_id() {
        let table = vec![
            entry(Some("9"), 1, 800, 0.2),
            entry(Some("10"), 1, 700, 0.8),
        ];
        let resolved = resolve_detailed(&play("9", 3), &table, Some("12"), "12", 0, 0);
        assert_eq!(resolved.source, WinProbSource::TableExact);
        assert!((resolved.percent - 20.0).abs() < 1e-4);
    }

    #[test]
    fn table_matches_by_clock_window() {
        let mut p = play("x", 0);
        p.period = Some(2);
        p.clock = Some(GameClock {
            display: "10:00".to_string(),
            seconds: Some(600),
        });
        let table = vec![
            entry(None, 2, 680, 0.1),
            entry(None, 2, 640, 0.3),
            entry(None, 3, 600, 0.9),
        ];
        let resolved = resolve_detailed(&p, &table, Some("12"), "12", 0, 0);
        assert_eq!(resolved.source, WinProbSource::TableClock);
        assert!((resolved.percent - 30.0).abs() < 1e-4);
    }

    #[test]
    fn table_falls_back_to_last_entry() {
        let table = vec![entry(None, 1, 900, 0.5), entry(None, 1, 850, 0.65)];
        let resolved = resolve_detailed(&play("x", 0), &table, Some("12"), "12", 0, 0);
        assert_eq!(resolved.source, WinProbSource::TableLatest);
        assert!((resolved.percent - 65.0).abs() < 1e-4);
    }

    #[test]
    fn heuristic_tied_is_fifty() {
        for (home, away) in [(0, 0), (7, 7), (24, 24)] {
            assert_eq!(
                resolve_win_probability(&play("x", 0), &[], Some("12"), "12", home, away),
                50.0
            );
            assert_eq!(
                resolve_win_probability(&play("x", 0), &[], None, "12", home, away),
                50.0
            );
        }
    }

    #[test]
    fn heuristic_follows_possessing_team() {
        assert_eq!(
            resolve_win_probability(&play("x", 0), &[], Some("12"), "12", 14, 7),
            55.0
        );
        assert_eq!(
            resolve_win_probability(&play("x", 0), &[], Some("2"), "12", 14, 7),
            45.0
        );
        assert_eq!(
            resolve_win_probability(&play("x", 0), &[], Some("2"), "12", 3, 10),
            55.0
        );
    }

    #[test]
    fn unknown_possession_shows_favourite() {
        let table = vec![entry(None, 1, 900, 0.25)];
        let pct = resolve_win_probability(&play("x", 0), &table, None, "12", 0, 0);
        assert!((pct - 75.0).abs() < 1e-4);
    }
}
