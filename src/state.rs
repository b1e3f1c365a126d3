use std::collections::{HashMap, HashSet, VecDeque};
use std::time::SystemTime;

use tracing::debug;

use crate::drive_store::DriveStore;
use crate::fingerprint::{Fingerprint, should_commit};
use crate::participants::BoxscoreIndex;

const MAX_LOG_LINES: usize = 100;
const MAX_ALERTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HomeAway {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Summary,
    Drives,
    Situation,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::Summary, Lane::Drives, Lane::Situation];

    pub fn label(self) -> &'static str {
        match self {
            Lane::Summary => "summary",
            Lane::Drives => "drives",
            Lane::Situation => "situation",
        }
    }
}

/// Where the competition block was found in the summary payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotNesting {
    #[default]
    Header,
    TopLevel,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamSide {
    pub team_id: String,
    pub abbreviation: String,
    pub display_name: String,
    pub logo: Option<String>,
    pub color: Option<String>,
    pub record: Option<String>,
    pub score: u16,
    pub line_scores: Vec<u16>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameStatus {
    pub period: u8,
    pub display_clock: String,
    pub completed: bool,
    pub description: String,
    /// Upstream state tag: "pre", "in" or "post".
    pub state: Option<String>,
}

impl GameStatus {
    pub fn is_scheduled(&self) -> bool {
        self.description.to_lowercase().contains("scheduled")
    }

    pub fn is_halftime(&self) -> bool {
        self.description.eq_ignore_ascii_case("halftime")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matchup {
    pub home_id: String,
    pub home_abbr: String,
    pub away_id: String,
    pub away_abbr: String,
}

impl Matchup {
    pub fn side_of_team(&self, team_id: &str) -> Option<HomeAway> {
        if !self.home_id.is_empty() && team_id == self.home_id {
            Some(HomeAway::Home)
        } else if !self.away_id.is_empty() && team_id == self.away_id {
            Some(HomeAway::Away)
        } else {
            None
        }
    }

    pub fn side_of_abbreviation(&self, abbr: &str) -> Option<HomeAway> {
        let abbr = abbr.trim();
        if abbr.is_empty() {
            None
        } else if abbr.eq_ignore_ascii_case(&self.home_abbr) {
            Some(HomeAway::Home)
        } else if abbr.eq_ignore_ascii_case(&self.away_abbr) {
            Some(HomeAway::Away)
        } else {
            None
        }
    }

    pub fn abbreviation_of(&self, side: HomeAway) -> &str {
        match side {
            HomeAway::Home => &self.home_abbr,
            HomeAway::Away => &self.away_abbr,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub id: String,
    pub date: Option<String>,
    pub nesting: SnapshotNesting,
    pub home: TeamSide,
    pub away: TeamSide,
    pub status: GameStatus,
    pub situation: Option<Situation>,
    pub boxscore: Option<Boxscore>,
    pub win_probability: Vec<WinProbEntry>,
    pub fetched_at: Option<SystemTime>,
}

impl GameSnapshot {
    pub fn matchup(&self) -> Matchup {
        Matchup {
            home_id: self.home.team_id.clone(),
            home_abbr: self.home.abbreviation.clone(),
            away_id: self.away.team_id.clone(),
            away_abbr: self.away.abbreviation.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Situation {
    pub possession: Option<String>,
    pub possession_text: Option<String>,
    pub down: Option<u8>,
    pub distance: Option<i32>,
    pub yard_line: Option<i32>,
    pub down_distance_text: Option<String>,
    pub short_down_distance_text: Option<String>,
    pub is_red_zone: bool,
    pub home_timeouts: Option<u8>,
    pub away_timeouts: Option<u8>,
    pub period: Option<u8>,
    pub clock: Option<String>,
    pub last_play_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMarker {
    pub yard_line: Option<i32>,
    pub text: Option<String>,
    pub period: Option<u8>,
    pub clock: Option<String>,
    pub down: Option<u8>,
    pub distance: Option<i32>,
    pub down_distance_text: Option<String>,
    pub short_down_distance_text: Option<String>,
    pub possession_text: Option<String>,
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamRef {
    pub id: Option<String>,
    pub abbreviation: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrivePhase {
    InProgress,
    Concluded(FieldMarker),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaySet {
    /// Never fetched. `reference` is absent when upstream gave no plays link at all.
    Pending {
        reference: Option<String>,
        count: Option<u32>,
    },
    /// Fetched, possibly empty.
    Loaded(Vec<Play>),
    /// Fetched earlier, but upstream has since reported more plays than are held.
    Stale {
        plays: Vec<Play>,
        reference: String,
        count: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Drive {
    pub id: String,
    pub team: TeamRef,
    pub description: Option<String>,
    pub start: FieldMarker,
    pub phase: DrivePhase,
    pub result: Option<String>,
    pub short_result: Option<String>,
    pub elapsed: Option<String>,
    pub yards: Option<i32>,
    pub offensive_plays: Option<u32>,
    pub is_score: bool,
    pub plays: PlaySet,
}

impl Drive {
    pub fn end(&self) -> Option<&FieldMarker> {
        match &self.phase {
            DrivePhase::InProgress => None,
            DrivePhase::Concluded(end) => Some(end),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.phase, DrivePhase::InProgress)
    }

    /// True once plays were fetched, even if a newer list is on its way.
    pub fn has_plays_data(&self) -> bool {
        !matches!(self.plays, PlaySet::Pending { .. })
    }

    pub fn plays_are_stale(&self) -> bool {
        matches!(self.plays, PlaySet::Stale { .. })
    }

    pub fn plays(&self) -> &[Play] {
        match &self.plays {
            PlaySet::Loaded(plays) | PlaySet::Stale { plays, .. } => plays,
            PlaySet::Pending { .. } => &[],
        }
    }

    pub fn plays_reference(&self) -> Option<&str> {
        match &self.plays {
            PlaySet::Pending { reference, .. } => reference.as_deref(),
            PlaySet::Stale { reference, .. } => Some(reference),
            PlaySet::Loaded(_) => None,
        }
    }

    pub fn play_count(&self) -> Option<u32> {
        match &self.plays {
            PlaySet::Pending { count, .. } => *count,
            PlaySet::Loaded(plays) => Some(plays.len() as u32),
            PlaySet::Stale { plays, count, .. } => {
                Some(count.unwrap_or(0).max(plays.len() as u32))
            }
        }
    }

    pub fn find_play(&self, play_id: &str) -> Option<&Play> {
        self.plays().iter().find(|p| p.id == play_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayType {
    pub id: String,
    pub text: String,
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameClock {
    pub display: String,
    pub seconds: Option<u32>,
}

/// Embedded per-play win probability, stored home-relative as a 0..1 fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayProbability {
    pub home: f64,
    pub away: Option<f64>,
    pub tie: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Play {
    pub id: String,
    pub sequence_number: u32,
    pub play_type: Option<PlayType>,
    pub text: String,
    pub short_text: Option<String>,
    pub scoring: bool,
    pub period: Option<u8>,
    pub clock: Option<GameClock>,
    pub start: Option<FieldMarker>,
    pub end: Option<FieldMarker>,
    pub stat_yardage: Option<i32>,
    pub probability: Option<PlayProbability>,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Athlete {
    pub id: String,
    pub display_name: String,
    pub short_name: Option<String>,
    pub jersey: Option<String>,
    pub position: Option<String>,
    pub headshot: Option<String>,
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AthleteRef {
    Full(Athlete),
    Reference(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub role: String,
    pub order: Option<u32>,
    pub athlete: AthleteRef,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boxscore {
    pub teams: Vec<BoxscoreTeam>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxscoreTeam {
    pub team_id: String,
    pub abbreviation: Option<String>,
    pub categories: Vec<StatCategory>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatCategory {
    pub name: String,
    pub labels: Vec<String>,
    pub athletes: Vec<BoxscoreAthlete>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxscoreAthlete {
    pub athlete: Athlete,
    pub stats: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WinProbEntry {
    pub play_id: Option<String>,
    pub sequence_number: Option<u32>,
    pub period: Option<u8>,
    pub clock_seconds: Option<u32>,
    pub home_win: f64,
    pub tie: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMeta {
    pub game_id: String,
    pub lane: Lane,
    /// Monotonic issue order across all lanes of the provider.
    pub token: u64,
    pub silent: bool,
}

#[derive(Debug, Clone)]
pub enum LanePayload {
    Summary(Box<GameSnapshot>),
    Drives(Vec<Drive>),
    Situation(Situation),
}

#[derive(Debug, Clone)]
pub enum Delta {
    LaneStarted(FetchMeta),
    LaneResolved {
        meta: FetchMeta,
        payload: LanePayload,
    },
    LaneFailed {
        meta: FetchMeta,
        error: String,
    },
    DrivePlays {
        game_id: String,
        drive_id: String,
        plays: Vec<Play>,
    },
    DrivePlaysFailed {
        game_id: String,
        drive_id: String,
        error: String,
    },
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    SelectGame {
        game_id: String,
    },
    SetOverlayOpen(bool),
    Refresh,
    CompleteDrive {
        game_id: String,
        drive_id: String,
        reference: String,
    },
    Stop,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub game_id: Option<String>,
    pub game: Option<GameSnapshot>,
    pub drives: DriveStore,
    pub situation: Option<Situation>,
    pub boxscore_index: BoxscoreIndex,
    pub fingerprints: HashMap<Lane, Fingerprint>,
    pub tokens: HashMap<Lane, u64>,
    pub loading: HashSet<Lane>,
    pub committed_at: HashMap<Lane, SystemTime>,
    pub plays_pending: HashSet<String>,
    pub alerts: VecDeque<String>,
    pub logs: VecDeque<String>,
    pub selected_drive: usize,
    pub open_drive: Option<String>,
    pub drive_scroll: u16,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            game_id: None,
            game: None,
            drives: DriveStore::new(),
            situation: None,
            boxscore_index: BoxscoreIndex::default(),
            fingerprints: HashMap::new(),
            tokens: HashMap::new(),
            loading: HashSet::new(),
            committed_at: HashMap::new(),
            plays_pending: HashSet::new(),
            alerts: VecDeque::new(),
            logs: VecDeque::new(),
            selected_drive: 0,
            open_drive: None,
            drive_scroll: 0,
            help_overlay: false,
        }
    }

    /// Switches the active game and discards everything committed for the previous one.
    pub fn select_game(&mut self, game_id: &str) {
        let logs = std::mem::take(&mut self.logs);
        *self = Self::new();
        self.logs = logs;
        self.game_id = Some(game_id.to_string());
        self.loading.extend(Lane::ALL);
    }

    pub fn is_active_game(&self, game_id: &str) -> bool {
        self.game_id.as_deref() == Some(game_id)
    }

    pub fn matchup(&self) -> Option<Matchup> {
        self.game.as_ref().map(GameSnapshot::matchup)
    }

    pub fn is_loading(&self, lane: Lane) -> bool {
        self.loading.contains(&lane)
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOG_LINES {
            self.logs.pop_front();
        }
    }

    pub fn push_alert(&mut self, msg: impl Into<String>) {
        self.alerts.push_back(msg.into());
        while self.alerts.len() > MAX_ALERTS {
            self.alerts.pop_front();
        }
    }

    pub fn take_alert(&mut self) -> Option<String> {
        self.alerts.pop_front()
    }

    pub fn selected_drive(&self) -> Option<&Drive> {
        self.drives.drives().get(self.selected_drive)
    }

    pub fn select_next_drive(&mut self) {
        let len = self.drives.drives().len();
        if len == 0 {
            self.selected_drive = 0;
            return;
        }
        self.selected_drive = (self.selected_drive + 1).min(len - 1);
    }

    pub fn select_prev_drive(&mut self) {
        self.selected_drive = self.selected_drive.saturating_sub(1);
    }

    pub fn clamp_selection(&mut self) {
        let len = self.drives.drives().len();
        if len == 0 {
            self.selected_drive = 0;
        } else if self.selected_drive >= len {
            self.selected_drive = len - 1;
        }
    }

    /// Token gate: a result is only considered when it was issued after the one
    /// currently committed for its lane.
    fn accept_token(&mut self, lane: Lane, token: u64) -> bool {
        match self.tokens.get(&lane) {
            Some(current) if *current >= token => false,
            _ => {
                self.tokens.insert(lane, token);
                true
            }
        }
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::LaneStarted(meta) => {
            if !state.is_active_game(&meta.game_id) {
                return;
            }
            if !meta.silent {
                state.loading.insert(meta.lane);
            }
        }
        Delta::LaneResolved { meta, payload } => {
            if !state.is_active_game(&meta.game_id) {
                debug!(game_id = %meta.game_id, lane = meta.lane.label(), "dropping result for inactive game");
                return;
            }
            if !meta.silent {
                state.loading.remove(&meta.lane);
            }
            if !state.accept_token(meta.lane, meta.token) {
                debug!(lane = meta.lane.label(), token = meta.token, "dropping stale result");
                return;
            }
            commit_payload(state, &meta, payload);
        }
        Delta::LaneFailed { meta, error } => {
            if !state.is_active_game(&meta.game_id) {
                return;
            }
            if meta.silent {
                state.push_log(format!("[WARN] {} poll failed: {error}", meta.lane.label()));
            } else {
                state.loading.remove(&meta.lane);
                state.push_alert(format!("Failed to load {}: {error}", meta.lane.label()));
                state.push_log(format!("[ERROR] {} load failed: {error}", meta.lane.label()));
            }
        }
        Delta::DrivePlays {
            game_id,
            drive_id,
            plays,
        } => {
            if !state.is_active_game(&game_id) {
                return;
            }
            state.plays_pending.remove(&drive_id);
            let count = plays.len();
            if state.drives.materialize(&drive_id, plays).is_some() {
                state.push_log(format!("[INFO] Drive {drive_id}: {count} plays loaded"));
            }
        }
        Delta::DrivePlaysFailed {
            game_id,
            drive_id,
            error,
        } => {
            if !state.is_active_game(&game_id) {
                return;
            }
            state.plays_pending.remove(&drive_id);
            let background = state
                .drives
                .get(&drive_id)
                .is_some_and(Drive::plays_are_stale);
            state.drives.keep_held_plays(&drive_id);
            if !background {
                state.push_alert(format!("Failed to load plays for drive {drive_id}: {error}"));
            }
            state.push_log(format!("[WARN] Drive plays error: {error}"));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

fn commit_payload(state: &mut AppState, meta: &FetchMeta, payload: LanePayload) {
    let previous = state.fingerprints.get(&meta.lane);
    match payload {
        LanePayload::Summary(snapshot) => {
            let (commit, fingerprint) = should_commit(previous, &*snapshot, meta.silent);
            if !commit {
                return;
            }
            if let Some(prev) = state.game.as_ref()
                && (prev.home.score, prev.away.score) != (snapshot.home.score, snapshot.away.score)
            {
                state.push_log(format!(
                    "[ALERT] Score: {} {}-{} {}",
                    snapshot.away.abbreviation,
                    snapshot.away.score,
                    snapshot.home.score,
                    snapshot.home.abbreviation
                ));
            }
            state.boxscore_index = snapshot
                .boxscore
                .as_ref()
                .map(BoxscoreIndex::build)
                .unwrap_or_default();
            state.game = Some(*snapshot);
            record_commit(state, meta.lane, fingerprint);
        }
        LanePayload::Drives(drives) => {
            let (commit, fingerprint) = should_commit(previous, drives.as_slice(), meta.silent);
            if !commit {
                return;
            }
            if state.drives.replace_drives(drives, meta.silent) {
                state.clamp_selection();
                record_commit(state, meta.lane, fingerprint);
            }
        }
        LanePayload::Situation(situation) => {
            let (commit, fingerprint) = should_commit(previous, &situation, meta.silent);
            if !commit {
                return;
            }
            state.situation = Some(situation);
            record_commit(state, meta.lane, fingerprint);
        }
    }
}

fn record_commit(state: &mut AppState, lane: Lane, fingerprint: Fingerprint) {
    state.fingerprints.insert(lane, fingerprint);
    state.committed_at.insert(lane, SystemTime::now());
}
