use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::state::{Drive, GameSnapshot, PlaySet, Situation};

/// Content hash of the fields that matter for display.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Keys are ordered by the map; nested objects are ordered by serde_json's sorted map.
    pub fn of(projection: &BTreeMap<&'static str, Value>) -> Self {
        let canonical = serde_json::to_vec(projection).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn short_hex(&self) -> String {
        self.0[..6].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short_hex())
    }
}

pub trait Fingerprinted {
    fn projection(&self) -> BTreeMap<&'static str, Value>;

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.projection())
    }
}

/// Foreground fetches always commit; silent ones only when the projection changed.
pub fn should_commit<T: Fingerprinted + ?Sized>(
    previous: Option<&Fingerprint>,
    snapshot: &T,
    silent: bool,
) -> (bool, Fingerprint) {
    let current = snapshot.fingerprint();
    let commit = !silent || previous != Some(&current);
    (commit, current)
}

impl Fingerprinted for GameSnapshot {
    fn projection(&self) -> BTreeMap<&'static str, Value> {
        let mut map = BTreeMap::new();
        map.insert("home_score", json!(self.home.score));
        map.insert("away_score", json!(self.away.score));
        map.insert("home_lines", json!(self.home.line_scores));
        map.insert("away_lines", json!(self.away.line_scores));
        map.insert("period", json!(self.status.period));
        map.insert("clock", json!(self.status.display_clock));
        map.insert("completed", json!(self.status.completed));
        map.insert("status", json!(self.status.description));
        map.insert(
            "situation",
            self.situation
                .as_ref()
                .map(situation_value)
                .unwrap_or(Value::Null),
        );
        map.insert("win_prob_len", json!(self.win_probability.len()));
        map.insert(
            "boxscore_athletes",
            json!(
                self.boxscore
                    .as_ref()
                    .map(|b| b
                        .teams
                        .iter()
                        .flat_map(|t| &t.categories)
                        .map(|c| c.athletes.len())
                        .sum::<usize>())
                    .unwrap_or(0)
            ),
        );
        map
    }
}

impl Fingerprinted for [Drive] {
    fn projection(&self) -> BTreeMap<&'static str, Value> {
        let drives: Vec<Value> = self
            .iter()
            .map(|d| {
                let plays = match &d.plays {
                    PlaySet::Pending { count, .. } => json!({ "pending": count }),
                    PlaySet::Loaded(plays) => json!({
                        "loaded": plays.len(),
                        "last": plays.last().map(|p| p.id.clone()),
                    }),
                    PlaySet::Stale { plays, count, .. } => json!({
                        "loaded": plays.len(),
                        "last": plays.last().map(|p| p.id.clone()),
                        "pending": count,
                    }),
                };
                json!({
                    "id": d.id,
                    "team": d.team.id,
                    "result": d.result,
                    "in_progress": d.is_in_progress(),
                    "start": d.start.yard_line,
                    "end": d.end().and_then(|e| e.yard_line),
                    "yards": d.yards,
                    "plays": plays,
                })
            })
            .collect();
        let mut map = BTreeMap::new();
        map.insert("count", json!(self.len()));
        map.insert("drives", Value::Array(drives));
        map
    }
}

impl Fingerprinted for Situation {
    fn projection(&self) -> BTreeMap<&'static str, Value> {
        let mut map = BTreeMap::new();
        map.insert("situation", situation_value(self));
        map
    }
}

fn situation_value(s: &Situation) -> Value {
    json!({
        "possession": s.possession,
        "down": s.down,
        "distance": s.distance,
        "yard_line": s.yard_line,
        "text": s.down_distance_text,
        "red_zone": s.is_red_zone,
        "home_timeouts": s.home_timeouts,
        "away_timeouts": s.away_timeouts,
        "last_play": s.last_play_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn situation(down: u8, yard_line: i32) -> Situation {
        Situation {
            possession: Some("12".to_string()),
            down: Some(down),
            distance: Some(10),
            yard_line: Some(yard_line),
            ..Situation::default()
        }
    }

    #[test]
    fn foreground_always_commits() {
        let s = situation(1, 25);
        let fp = s.fingerprint();
        let (commit, _) = should_commit(Some(&fp), &s, false);
        assert!(commit);
    }

    #[test]
    fn silent_identical_is_skipped() {
        let s = situation(1, 25);
        let fp = s.fingerprint();
        let (commit, next) = should_commit(Some(&fp), &s.clone(), true);
        assert!(!commit);
        assert_eq!(next, fp);
    }

    #[test]
    fn silent_change_commits() {
        let fp = situation(1, 25).fingerprint();
        let (commit, next) = should_commit(Some(&fp), &situation(2, 31), true);
        assert!(commit);
        assert_ne!(next, fp);
    }

    #[test]
    fn first_silent_result_commits() {
        let (commit, _) = should_commit(None, &situation(1, 25), true);
        assert!(commit);
    }

    #[test]
    fn fields_outside_projection_do_not_change_hash() {
        let a = situation(1, 25);
        let mut b = a.clone();
        b.clock = Some("4:12".to_string());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
