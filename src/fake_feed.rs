use std::sync::Mutex;
use std::time::SystemTime;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::fetch::GameFeed;
use crate::state::{
    Athlete, AthleteRef, Boxscore, BoxscoreAthlete, BoxscoreTeam, Drive, DrivePhase, FieldMarker,
    GameClock, GameSnapshot, GameStatus, HomeAway, Participant, Play, PlayProbability, PlaySet,
    PlayType, Situation, SnapshotNesting, StatCategory, TeamRef, TeamSide, WinProbEntry,
};

const QUARTER_SECS: i32 = 900;
const PREGAME_POLLS: u32 = 2;
const DRIVE_REF_PREFIX: &str = "fake://drives/";

struct FakeTeam {
    id: &'static str,
    abbr: &'static str,
    name: &'static str,
    color: &'static str,
    /// (athlete id, name, position)
    roster: [(&'static str, &'static str, &'static str); 3],
}

const HOME: FakeTeam = FakeTeam {
    id: "901",
    abbr: "HAWK",
    name: "Harbor Hawks",
    color: "0b3d91",
    roster: [
        ("90101", "Sam Rivers", "QB"),
        ("90102", "Dee Carter", "RB"),
        ("90103", "Milo Grant", "WR"),
    ],
};

const AWAY: FakeTeam = FakeTeam {
    id: "902",
    abbr: "WOLF",
    name: "Ridge Wolves",
    color: "7a1f1f",
    roster: [
        ("90201", "Jonah Pike", "QB"),
        ("90202", "Ty Bennett", "RB"),
        ("90203", "Ari Cole", "WR"),
    ],
};

fn team(side: HomeAway) -> &'static FakeTeam {
    match side {
        HomeAway::Home => &HOME,
        HomeAway::Away => &AWAY,
    }
}

fn other(side: HomeAway) -> HomeAway {
    match side {
        HomeAway::Home => HomeAway::Away,
        HomeAway::Away => HomeAway::Home,
    }
}

/// Offline simulated game. Every summary request advances play by one snap.
pub struct FakeFeed {
    seed: u64,
    sim: Mutex<SimGame>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().r#gen())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            sim: Mutex::new(SimGame::new(seed)),
        }
    }

    fn with_sim<T>(&self, f: impl FnOnce(&mut SimGame) -> T) -> T {
        let mut guard = self.sim.lock().expect("fake game lock poisoned");
        f(&mut guard)
    }
}

impl Default for FakeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl GameFeed for FakeFeed {
    fn game_summary(&self, game_id: &str) -> Result<GameSnapshot> {
        Ok(self.with_sim(|sim| {
            sim.advance();
            sim.snapshot(game_id)
        }))
    }

    fn drives(&self, _game_id: &str) -> Result<Vec<Drive>> {
        Ok(self.with_sim(|sim| sim.drives.iter().map(SimDrive::to_drive).collect()))
    }

    fn situation(&self, _game_id: &str, _game_date: Option<NaiveDate>) -> Result<Situation> {
        Ok(self.with_sim(|sim| sim.situation()))
    }

    fn drive_plays(&self, reference: &str) -> Result<Vec<Play>> {
        let drive_id = reference
            .strip_prefix(DRIVE_REF_PREFIX)
            .and_then(|rest| rest.split('/').next())
            .ok_or_else(|| anyhow!("unknown plays reference {reference}"))?;
        self.with_sim(|sim| {
            sim.drives
                .iter()
                .find(|d| d.id == drive_id)
                .map(|d| d.plays.clone())
                .ok_or_else(|| anyhow!("unknown drive {drive_id}"))
        })
    }

    fn reset(&self) {
        self.with_sim(|sim| *sim = SimGame::new(self.seed));
    }
}

struct SimDrive {
    id: String,
    offense: HomeAway,
    start: FieldMarker,
    end: Option<FieldMarker>,
    result: Option<String>,
    plays: Vec<Play>,
    yards: i32,
}

impl SimDrive {
    fn to_drive(&self) -> Drive {
        let offense = team(self.offense);
        Drive {
            id: self.id.clone(),
            team: TeamRef {
                id: Some(offense.id.to_string()),
                abbreviation: Some(offense.abbr.to_string()),
                reference: None,
            },
            description: Some(format!("{} plays, {} yards", self.plays.len(), self.yards)),
            start: self.start.clone(),
            phase: match &self.end {
                Some(end) => DrivePhase::Concluded(end.clone()),
                None => DrivePhase::InProgress,
            },
            result: self.result.clone(),
            short_result: self.result.clone(),
            elapsed: None,
            yards: Some(self.yards),
            offensive_plays: Some(self.plays.len() as u32),
            is_score: matches!(self.result.as_deref(), Some("Touchdown" | "Field Goal")),
            plays: PlaySet::Pending {
                reference: Some(format!("{DRIVE_REF_PREFIX}{}/plays", self.id)),
                count: Some(self.plays.len() as u32),
            },
        }
    }
}

struct SimGame {
    rng: StdRng,
    polls: u32,
    period: u8,
    clock: i32,
    home_score: u16,
    away_score: u16,
    home_lines: Vec<u16>,
    away_lines: Vec<u16>,
    offense: HomeAway,
    /// Yards from the offense's own goal line.
    ball_on: i32,
    down: u8,
    distance: i32,
    sequence: u32,
    drives: Vec<SimDrive>,
    win_probability: Vec<WinProbEntry>,
    completed: bool,
}

impl SimGame {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            polls: 0,
            period: 1,
            clock: QUARTER_SECS,
            home_score: 0,
            away_score: 0,
            home_lines: vec![0],
            away_lines: vec![0],
            offense: HomeAway::Away,
            ball_on: 25,
            down: 1,
            distance: 10,
            sequence: 0,
            drives: Vec::new(),
            win_probability: Vec::new(),
            completed: false,
        }
    }

    fn pregame(&self) -> bool {
        self.polls <= PREGAME_POLLS
    }

    fn advance(&mut self) {
        self.polls += 1;
        if self.pregame() || self.completed {
            return;
        }
        if self.drives.last().map(|d| d.end.is_some()).unwrap_or(true) {
            self.start_drive();
        }
        self.run_snap();
        self.run_clock();
    }

    fn start_drive(&mut self) {
        let id = format!("{}", self.drives.len() + 1);
        self.down = 1;
        self.distance = 10;
        let start = self.marker();
        self.drives.push(SimDrive {
            id,
            offense: self.offense,
            start,
            end: None,
            result: None,
            plays: Vec::new(),
            yards: 0,
        });
    }

    fn run_snap(&mut self) {
        let start = self.marker();
        if self.down == 4 && self.distance > 1 {
            if self.ball_on >= 62 {
                let made = self.rng.gen_bool(0.8);
                let kick = 100 - self.ball_on + 17;
                let text = if made {
                    format!("{} yard field goal is GOOD", kick)
                } else {
                    format!("{} yard field goal is No Good", kick)
                };
                if made {
                    self.add_points(self.offense, 3);
                }
                self.push_play("59", "Field Goal Good", text, start, 0, made);
                self.finish_drive(if made { "Field Goal" } else { "Missed FG" }, 100 - self.ball_on);
            } else {
                let net = self.rng.gen_range(35..=50);
                let text = format!("{} punts {net} yards", team(self.offense).abbr);
                self.push_play("52", "Punt", text, start, 0, false);
                let landing = (self.ball_on + net).min(95);
                self.finish_drive("Punt", (100 - landing).max(5));
            }
            return;
        }

        let mut gain = self.rng.gen_range(-4..=12);
        if self.rng.gen_bool(0.06) {
            gain = self.rng.gen_range(20..=55);
        }
        let pass = self.rng.gen_bool(0.55);
        let offense = team(self.offense);
        let text = if pass {
            format!("{} pass to {} for {gain} yards", offense.roster[0].1, offense.roster[2].1)
        } else {
            format!("{} run for {gain} yards", offense.roster[1].1)
        };

        if self.ball_on + gain >= 100 {
            let gain = 100 - self.ball_on;
            self.ball_on = 100;
            self.add_points(self.offense, 7);
            let text = format!("{text}, TOUCHDOWN");
            let (id, label) = if pass { ("67", "Passing Touchdown") } else { ("68", "Rushing Touchdown") };
            self.push_play(id, label, text, start, gain, true);
            self.finish_drive("Touchdown", 25);
            return;
        }

        self.ball_on = (self.ball_on + gain).max(1);
        self.distance -= gain;
        if self.distance <= 0 {
            self.down = 1;
            self.distance = 10.min(100 - self.ball_on);
        } else {
            self.down += 1;
        }
        let (id, label) = if pass { ("24", "Pass Reception") } else { ("5", "Rush") };
        self.push_play(id, label, text, start, gain, false);
        if let Some(drive) = self.drives.last_mut() {
            drive.yards += gain;
        }
    }

    fn run_clock(&mut self) {
        self.clock -= self.rng.gen_range(25..=45);
        if self.clock > 0 {
            return;
        }
        if self.period >= 4 {
            self.clock = 0;
            self.completed = true;
            if self.drives.last().map(|d| d.end.is_none()).unwrap_or(false) {
                self.finish_drive("End of Game", 25);
            }
            return;
        }
        self.period += 1;
        self.clock = QUARTER_SECS;
        self.home_lines.push(0);
        self.away_lines.push(0);
        if self.period == 3 && self.drives.last().map(|d| d.end.is_none()).unwrap_or(false) {
            self.finish_drive("End of Half", 25);
            self.offense = HomeAway::Home;
        }
    }

    fn add_points(&mut self, side: HomeAway, points: u16) {
        let (score, lines) = match side {
            HomeAway::Home => (&mut self.home_score, &mut self.home_lines),
            HomeAway::Away => (&mut self.away_score, &mut self.away_lines),
        };
        *score += points;
        if let Some(last) = lines.last_mut() {
            *last += points;
        }
    }

    /// Concludes the current drive and hands the ball over at `next_ball_on`.
    fn finish_drive(&mut self, result: &str, next_ball_on: i32) {
        let end = self.marker();
        if let Some(drive) = self.drives.last_mut() {
            drive.end = Some(end);
            drive.result = Some(result.to_string());
        }
        self.offense = other(self.offense);
        self.ball_on = next_ball_on;
        self.down = 1;
        self.distance = 10;
    }

    fn push_play(
        &mut self,
        type_id: &str,
        type_text: &str,
        text: String,
        start: FieldMarker,
        gain: i32,
        scoring: bool,
    ) {
        self.sequence += 1;
        let home_win = self.home_win_fraction();
        let offense = team(self.offense);
        let id = format!("{}{:04}", self.drives.len(), self.sequence);
        let involved: &[(usize, &str)] = match type_id {
            "24" | "67" => &[(0, "passer"), (2, "receiver")],
            "5" | "68" => &[(1, "rusher")],
            _ => &[],
        };
        let participants = involved
            .iter()
            .enumerate()
            .map(|(order, (slot, role))| Participant {
                role: role.to_string(),
                order: Some(order as u32 + 1),
                athlete: AthleteRef::Reference(format!(
                    "fake://athletes/{}",
                    offense.roster[*slot].0
                )),
            })
            .collect();
        let clock_secs = self.clock.max(0) as u32;
        let play = Play {
            id: id.clone(),
            sequence_number: self.sequence,
            play_type: Some(PlayType {
                id: type_id.to_string(),
                text: type_text.to_string(),
                abbreviation: None,
            }),
            text,
            short_text: None,
            scoring,
            period: Some(self.period),
            clock: Some(GameClock {
                display: format_clock(clock_secs),
                seconds: Some(clock_secs),
            }),
            start: Some(start),
            end: Some(self.marker()),
            stat_yardage: Some(gain),
            probability: (self.sequence % 3 == 0).then_some(PlayProbability {
                home: home_win,
                away: Some(1.0 - home_win),
                tie: None,
            }),
            participants,
        };
        self.win_probability.push(WinProbEntry {
            play_id: Some(id),
            sequence_number: Some(self.sequence),
            period: Some(self.period),
            clock_seconds: Some(clock_secs),
            home_win,
            tie: None,
        });
        if let Some(drive) = self.drives.last_mut() {
            drive.plays.push(play);
        }
    }

    fn home_win_fraction(&self) -> f64 {
        let diff = self.home_score as f64 - self.away_score as f64;
        let elapsed_quarters = self.period as f64 - self.clock.max(0) as f64 / QUARTER_SECS as f64;
        let weight = 0.08 + 0.06 * elapsed_quarters;
        1.0 / (1.0 + (-(diff * weight + 0.05)).exp())
    }

    fn marker(&self) -> FieldMarker {
        let offense = team(self.offense);
        let defense = team(other(self.offense));
        let territory = if self.ball_on <= 50 {
            format!("{} {}", offense.abbr, self.ball_on)
        } else {
            format!("{} {}", defense.abbr, 100 - self.ball_on)
        };
        FieldMarker {
            yard_line: Some(self.ball_on),
            text: Some(territory.clone()),
            period: Some(self.period),
            clock: Some(format_clock(self.clock.max(0) as u32)),
            down: Some(self.down),
            distance: Some(self.distance),
            down_distance_text: None,
            short_down_distance_text: None,
            possession_text: Some(territory),
            team_id: Some(offense.id.to_string()),
        }
    }

    fn situation(&self) -> Situation {
        if self.pregame() || self.completed {
            return Situation::default();
        }
        let marker = self.marker();
        Situation {
            possession: Some(team(self.offense).id.to_string()),
            possession_text: marker.possession_text,
            down: Some(self.down),
            distance: Some(self.distance),
            yard_line: Some(self.ball_on),
            down_distance_text: None,
            short_down_distance_text: None,
            is_red_zone: self.ball_on >= 80,
            home_timeouts: Some(3),
            away_timeouts: Some(3),
            period: Some(self.period),
            clock: Some(format_clock(self.clock.max(0) as u32)),
            last_play_text: self
                .drives
                .iter()
                .rev()
                .find_map(|d| d.plays.last())
                .map(|p| p.text.clone()),
        }
    }

    fn snapshot(&self, game_id: &str) -> GameSnapshot {
        let description = if self.pregame() {
            "Scheduled"
        } else if self.completed {
            "Final"
        } else {
            "In Progress"
        };
        let state = if self.pregame() {
            "pre"
        } else if self.completed {
            "post"
        } else {
            "in"
        };
        GameSnapshot {
            id: game_id.to_string(),
            date: Some(Utc::now().format("%Y-%m-%dT%H:%MZ").to_string()),
            nesting: SnapshotNesting::Header,
            home: side(&HOME, self.home_score, &self.home_lines),
            away: side(&AWAY, self.away_score, &self.away_lines),
            status: GameStatus {
                period: if self.pregame() { 0 } else { self.period },
                display_clock: format_clock(self.clock.max(0) as u32),
                completed: self.completed,
                description: description.to_string(),
                state: Some(state.to_string()),
            },
            situation: (!self.pregame() && !self.completed).then(|| self.situation()),
            boxscore: Some(boxscore()),
            win_probability: self.win_probability.clone(),
            fetched_at: Some(SystemTime::now()),
        }
    }
}

fn side(team: &FakeTeam, score: u16, lines: &[u16]) -> TeamSide {
    TeamSide {
        team_id: team.id.to_string(),
        abbreviation: team.abbr.to_string(),
        display_name: team.name.to_string(),
        logo: None,
        color: Some(team.color.to_string()),
        record: None,
        score,
        line_scores: lines.to_vec(),
    }
}

fn boxscore() -> Boxscore {
    Boxscore {
        teams: [&HOME, &AWAY]
            .into_iter()
            .map(|t| BoxscoreTeam {
                team_id: t.id.to_string(),
                abbreviation: Some(t.abbr.to_string()),
                categories: vec![StatCategory {
                    name: "roster".to_string(),
                    labels: Vec::new(),
                    athletes: t
                        .roster
                        .iter()
                        .map(|(id, name, position)| BoxscoreAthlete {
                            athlete: Athlete {
                                id: id.to_string(),
                                display_name: name.to_string(),
                                short_name: None,
                                jersey: None,
                                position: Some(position.to_string()),
                                headshot: None,
                                team_id: Some(t.id.to_string()),
                            },
                            stats: Vec::new(),
                        })
                        .collect(),
                }],
            })
            .collect(),
    }
}

fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pregame_then_live() {
        let feed = FakeFeed::with_seed(7);
        let first = feed.game_summary("g1").unwrap();
        assert!(first.status.is_scheduled());
        assert!(feed.drives("g1").unwrap().is_empty());
        for _ in 0..PREGAME_POLLS {
            feed.game_summary("g1").unwrap();
        }
        let live = feed.game_summary("g1").unwrap();
        assert_eq!(live.status.state.as_deref(), Some("in"));
        let drives = feed.drives("g1").unwrap();
        assert!(!drives.is_empty());
        let reference = drives[0].plays_reference().unwrap().to_string();
        assert!(!feed.drive_plays(&reference).unwrap().is_empty());
    }

    #[test]
    fn game_runs_to_final() {
        let feed = FakeFeed::with_seed(42);
        let mut last = feed.game_summary("g1").unwrap();
        for _ in 0..2000 {
            last = feed.game_summary("g1").unwrap();
            if last.status.completed {
                break;
            }
        }
        assert!(last.status.completed);
        let drives = feed.drives("g1").unwrap();
        assert!(drives.iter().all(|d| !d.is_in_progress()));
        let total: u16 = last.home.line_scores.iter().sum();
        assert_eq!(total, last.home.score);
    }

    #[test]
    fn reset_restarts_the_game() {
        let feed = FakeFeed::with_seed(3);
        for _ in 0..10 {
            feed.game_summary("g1").unwrap();
        }
        feed.reset();
        assert!(feed.game_summary("g1").unwrap().status.is_scheduled());
    }

    #[test]
    fn unknown_reference_errors() {
        let feed = FakeFeed::with_seed(1);
        assert!(feed.drive_plays("https://elsewhere/plays").is_err());
    }
}
