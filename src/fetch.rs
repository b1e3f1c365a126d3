use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::http_cache::{HttpCache, ReqwestTransport, SystemClock};
use crate::http_client::{http_client, https_url};
use crate::state::{
    Athlete, AthleteRef, Boxscore, BoxscoreAthlete, BoxscoreTeam, Drive, DrivePhase, FieldMarker,
    GameClock, GameSnapshot, GameStatus, Participant, Play, PlayProbability, PlaySet, PlayType,
    Situation, SnapshotNesting, StatCategory, TeamRef, TeamSide, WinProbEntry,
};

const SITE_API: &str = "https://site.api.espn.com/apis/site/v2/sports/football";
const CORE_API: &str = "https://sports.core.api.espn.com/v2/sports/football/leagues";
const MAX_PAGES: u32 = 20;
const QUARTER_SECONDS: i64 = 900;

/// Source of live game payloads. Implementations may block; callers run them on a worker pool.
pub trait GameFeed: Send + Sync {
    fn game_summary(&self, game_id: &str) -> Result<GameSnapshot>;
    fn drives(&self, game_id: &str) -> Result<Vec<Drive>>;
    fn situation(&self, game_id: &str, game_date: Option<NaiveDate>) -> Result<Situation>;
    fn drive_plays(&self, reference: &str) -> Result<Vec<Play>>;
    /// Drops any per-game memoization. Called when the active game changes.
    fn reset(&self) {}
}

pub struct EspnFeed {
    league: String,
    cache: HttpCache,
}

impl EspnFeed {
    pub fn new(league: &str, cache_ttl: Duration, request_timeout: Duration) -> Result<Self> {
        let client = http_client(request_timeout)?;
        let cache = HttpCache::new(
            Box::new(ReqwestTransport::new(client)),
            Arc::new(SystemClock),
            cache_ttl,
        );
        Ok(Self::with_cache(league, cache))
    }

    pub fn with_cache(league: &str, cache: HttpCache) -> Self {
        Self {
            league: league.to_string(),
            cache,
        }
    }

    fn summary_url(&self, game_id: &str) -> String {
        format!("{SITE_API}/{}/summary?event={game_id}", self.league)
    }

    fn drives_url(&self, game_id: &str) -> String {
        format!(
            "{CORE_API}/{}/events/{game_id}/competitions/{game_id}/drives?lang=en&region=us",
            self.league
        )
    }

    fn scoreboard_url(&self, date: NaiveDate) -> String {
        format!(
            "{SITE_API}/{}/scoreboard?dates={}",
            self.league,
            date.format("%Y%m%d")
        )
    }

    fn get(&self, url: &str) -> Result<String> {
        self.cache
            .fetch(&https_url(url))
            .with_context(|| format!("request failed: {url}"))
    }

    /// Walks `page=1..pageCount` and concatenates items in page order.
    fn fetch_paged<T>(&self, url: &str, parse: fn(&str) -> Result<Page<T>>) -> Result<Vec<T>> {
        let first = parse(&self.get(url)?)?;
        let mut items = first.items;
        let pages = first.page_count.min(MAX_PAGES);
        for page in 2..=pages {
            let sep = if url.contains('?') { '&' } else { '?' };
            let next = parse(&self.get(&format!("{url}{sep}page={page}"))?)?;
            items.extend(next.items);
        }
        Ok(items)
    }
}

impl GameFeed for EspnFeed {
    fn game_summary(&self, game_id: &str) -> Result<GameSnapshot> {
        let body = self.get(&self.summary_url(game_id))?;
        let mut snapshot = parse_summary_json(&body)?;
        if snapshot.id.is_empty() {
            snapshot.id = game_id.to_string();
        }
        Ok(snapshot)
    }

    fn drives(&self, game_id: &str) -> Result<Vec<Drive>> {
        self.fetch_paged(&self.drives_url(game_id), parse_drives_page_json)
    }

    fn situation(&self, game_id: &str, game_date: Option<NaiveDate>) -> Result<Situation> {
        if let Some(date) = game_date {
            match self
                .get(&self.scoreboard_url(date))
                .and_then(|body| parse_scoreboard_situation_json(&body, game_id))
            {
                Ok(Some(situation)) => return Ok(situation),
                Ok(None) => debug!(game_id, "game not on scoreboard, using summary"),
                Err(err) => debug!(game_id, error = %err, "scoreboard situation failed"),
            }
        }
        let body = self.get(&self.summary_url(game_id))?;
        parse_summary_situation_json(&body)
    }

    fn drive_plays(&self, reference: &str) -> Result<Vec<Play>> {
        let mut plays = self.fetch_paged(reference, parse_plays_page_json)?;
        plays.sort_by_key(|p| p.sequence_number);
        Ok(plays)
    }

    fn reset(&self) {
        self.cache.clear();
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_index: u32,
    pub page_count: u32,
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(rename = "pageIndex", default)]
    page_index: Option<u32>,
    #[serde(rename = "pageCount", default)]
    page_count: Option<u32>,
}

fn parse_page<T>(raw: &str, what: &'static str, item: fn(&Value) -> Option<T>) -> Result<Page<T>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Page {
            items: Vec::new(),
            page_index: 1,
            page_count: 1,
        });
    }
    let envelope: PageEnvelope =
        serde_json::from_str(trimmed).with_context(|| format!("invalid {what} json"))?;
    Ok(Page {
        items: envelope.items.iter().filter_map(item).collect(),
        page_index: envelope.page_index.unwrap_or(1),
        page_count: envelope.page_count.unwrap_or(1).max(1),
    })
}

pub fn parse_drives_page_json(raw: &str) -> Result<Page<Drive>> {
    parse_page(raw, "drives", parse_drive)
}

pub fn parse_plays_page_json(raw: &str) -> Result<Page<Play>> {
    parse_page(raw, "plays", parse_play)
}

pub fn parse_summary_json(raw: &str) -> Result<GameSnapshot> {
    let root: Value = serde_json::from_str(raw.trim()).context("invalid summary json")?;
    let (competition, nesting) = locate_competition(&root)
        .context("summary has no competition block")?;

    let header = root.get("header").unwrap_or(&Value::Null);
    let id = pick_string(header, &["id"])
        .or_else(|| pick_string(competition, &["id"]))
        .unwrap_or_default();

    let competitors = competition
        .get("competitors")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let mut home = TeamSide::default();
    let mut away = TeamSide::default();
    for (idx, entry) in competitors.iter().enumerate() {
        let side = parse_team_side(entry);
        match entry.get("homeAway").and_then(|v| v.as_str()) {
            Some("home") => home = side,
            Some("away") => away = side,
            _ if idx == 0 => home = side,
            _ => away = side,
        }
    }

    let status_value = competition
        .get("status")
        .or_else(|| header.get("status"))
        .unwrap_or(&Value::Null);

    Ok(GameSnapshot {
        id,
        date: pick_string(competition, &["date"]).or_else(|| pick_string(header, &["date"])),
        nesting,
        home,
        away,
        status: parse_status(status_value),
        situation: competition.get("situation").and_then(parse_situation),
        boxscore: root.get("boxscore").and_then(parse_boxscore),
        win_probability: root
            .get("winprobability")
            .and_then(|v| v.as_array())
            .map(|entries| entries.iter().filter_map(parse_win_prob_entry).collect())
            .unwrap_or_default(),
        fetched_at: Some(SystemTime::now()),
    })
}

/// Situation from a summary body; an empty situation when the game has none.
pub fn parse_summary_situation_json(raw: &str) -> Result<Situation> {
    let root: Value = serde_json::from_str(raw.trim()).context("invalid summary json")?;
    Ok(locate_competition(&root)
        .and_then(|(competition, _)| competition.get("situation"))
        .and_then(parse_situation)
        .unwrap_or_default())
}

/// Situation for `game_id` from a dated scoreboard. `None` when the event is not listed.
pub fn parse_scoreboard_situation_json(raw: &str, game_id: &str) -> Result<Option<Situation>> {
    let root: Value = serde_json::from_str(raw.trim()).context("invalid scoreboard json")?;
    let events = root
        .get("events")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let Some(event) = events
        .iter()
        .find(|e| pick_string(e, &["id"]).as_deref() == Some(game_id))
    else {
        return Ok(None);
    };
    Ok(Some(
        first_competition(event)
            .and_then(|c| c.get("situation"))
            .and_then(parse_situation)
            .unwrap_or_default(),
    ))
}

/// Parses the leading `YYYY-MM-DD` of an upstream timestamp.
pub fn game_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok()
}

fn locate_competition(root: &Value) -> Option<(&Value, SnapshotNesting)> {
    if let Some(comp) = root.get("header").and_then(first_competition) {
        return Some((comp, SnapshotNesting::Header));
    }
    first_competition(root).map(|comp| (comp, SnapshotNesting::TopLevel))
}

fn first_competition(value: &Value) -> Option<&Value> {
    value
        .get("competitions")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
}

fn parse_team_side(entry: &Value) -> TeamSide {
    let team = entry.get("team").unwrap_or(&Value::Null);
    let logo = pick_string(team, &["logo"]).or_else(|| {
        team.get("logos")
            .and_then(|v| v.as_array())
            .and_then(|logos| logos.first())
            .and_then(|logo| pick_string(logo, &["href"]))
    });
    let line_scores = entry
        .get("linescores")
        .and_then(|v| v.as_array())
        .map(|scores| {
            scores
                .iter()
                .filter_map(|s| pick_u32(s, &["displayValue", "value"]).map(|n| n as u16))
                .collect()
        })
        .unwrap_or_default();
    let record = entry
        .get("record")
        .and_then(|v| v.as_array())
        .and_then(|records| records.first())
        .and_then(|r| pick_string(r, &["summary", "displayValue"]));

    TeamSide {
        team_id: pick_string(team, &["id"])
            .or_else(|| pick_string(entry, &["id"]))
            .unwrap_or_default(),
        abbreviation: pick_string(team, &["abbreviation"]).unwrap_or_default(),
        display_name: pick_string(team, &["displayName", "name"]).unwrap_or_default(),
        logo,
        color: pick_string(team, &["color"]),
        record,
        score: pick_u32(entry, &["score"]).unwrap_or(0) as u16,
        line_scores,
    }
}

fn parse_status(value: &Value) -> GameStatus {
    let kind = value.get("type").unwrap_or(&Value::Null);
    GameStatus {
        period: pick_u32(value, &["period"]).unwrap_or(0) as u8,
        display_clock: pick_string(value, &["displayClock"]).unwrap_or_default(),
        completed: kind
            .get("completed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        description: pick_string(kind, &["description", "name"]).unwrap_or_default(),
        state: pick_string(kind, &["state"]),
    }
}

fn parse_situation(value: &Value) -> Option<Situation> {
    if !value.is_object() {
        return None;
    }
    let last_play = value.get("lastPlay").unwrap_or(&Value::Null);
    Some(Situation {
        possession: pick_string(value, &["possession"]),
        possession_text: pick_string(value, &["possessionText"]),
        down: pick_i32(value, &["down"]).filter(|d| *d > 0).map(|d| d as u8),
        distance: pick_i32(value, &["distance"]),
        yard_line: pick_i32(value, &["yardLine"]),
        down_distance_text: pick_string(value, &["downDistanceText"]),
        short_down_distance_text: pick_string(value, &["shortDownDistanceText"]),
        is_red_zone: value
            .get("isRedZone")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        home_timeouts: pick_u32(value, &["homeTimeouts"]).map(|n| n as u8),
        away_timeouts: pick_u32(value, &["awayTimeouts"]).map(|n| n as u8),
        period: pick_u32(value, &["period"]).map(|n| n as u8),
        clock: pick_string(value, &["clock", "displayClock"]),
        last_play_text: pick_string(last_play, &["text"]),
    })
}

fn parse_drive(value: &Value) -> Option<Drive> {
    let id = pick_string(value, &["id"])?;
    let team = parse_team_ref(value.get("team"));
    let start = value.get("start").map(parse_marker).unwrap_or_default();
    let phase = match value.get("end") {
        Some(end) if end.is_object() => DrivePhase::Concluded(parse_marker(end)),
        _ => DrivePhase::InProgress,
    };
    let plays = parse_play_set(value.get("plays"));

    Some(Drive {
        id,
        team,
        description: pick_string(value, &["description"]),
        start,
        phase,
        result: pick_string(value, &["displayResult", "result"]),
        short_result: pick_string(value, &["shortDisplayResult"]),
        elapsed: value
            .get("timeElapsed")
            .and_then(|t| pick_string(t, &["displayValue"])),
        yards: pick_i32(value, &["yards"]),
        offensive_plays: pick_u32(value, &["offensivePlays"]),
        is_score: value
            .get("isScore")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        plays,
    })
}

fn parse_play_set(value: Option<&Value>) -> PlaySet {
    let Some(value) = value else {
        return PlaySet::Pending {
            reference: None,
            count: None,
        };
    };
    if let Some(items) = value.get("items").and_then(|v| v.as_array()) {
        let count = pick_u32(value, &["count"]);
        if !items.is_empty() || count == Some(0) {
            return PlaySet::Loaded(items.iter().filter_map(parse_play).collect());
        }
    }
    if let Some(items) = value.as_array() {
        return PlaySet::Loaded(items.iter().filter_map(parse_play).collect());
    }
    PlaySet::Pending {
        reference: pick_string(value, &["$ref"]).map(|r| https_url(&r)),
        count: pick_u32(value, &["count"]),
    }
}

fn parse_team_ref(value: Option<&Value>) -> TeamRef {
    let Some(value) = value else {
        return TeamRef::default();
    };
    let reference = pick_string(value, &["$ref"]);
    TeamRef {
        id: pick_string(value, &["id"])
            .or_else(|| reference.as_deref().and_then(team_id_from_ref)),
        abbreviation: pick_string(value, &["abbreviation"]),
        reference,
    }
}

/// Extracts the numeric id from a `.../teams/{id}?...` link.
pub fn team_id_from_ref(reference: &str) -> Option<String> {
    id_after_segment(reference, "/teams/")
}

pub(crate) fn id_after_segment(reference: &str, segment: &str) -> Option<String> {
    let idx = reference.find(segment)?;
    let id: String = reference[idx + segment.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if id.is_empty() { None } else { Some(id) }
}

fn parse_marker(value: &Value) -> FieldMarker {
    FieldMarker {
        yard_line: pick_i32(value, &["yardLine"]),
        text: pick_string(value, &["text"]),
        period: value
            .get("period")
            .and_then(|p| pick_u32(p, &["number"]))
            .map(|n| n as u8),
        clock: value
            .get("clock")
            .and_then(|c| pick_string(c, &["displayValue"])),
        down: pick_i32(value, &["down"]).filter(|d| *d > 0).map(|d| d as u8),
        distance: pick_i32(value, &["distance"]),
        down_distance_text: pick_string(value, &["downDistanceText"]),
        short_down_distance_text: pick_string(value, &["shortDownDistanceText"]),
        possession_text: pick_string(value, &["possessionText"]),
        team_id: parse_team_ref(value.get("team")).id,
    }
}

pub fn parse_play(value: &Value) -> Option<Play> {
    let id = pick_string(value, &["id"])?;
    let play_type = value.get("type").and_then(|t| {
        Some(PlayType {
            id: pick_string(t, &["id"]).unwrap_or_default(),
            text: pick_string(t, &["text"])?,
            abbreviation: pick_string(t, &["abbreviation"]),
        })
    });
    let clock = value.get("clock").and_then(|c| {
        Some(GameClock {
            display: pick_string(c, &["displayValue"])?,
            seconds: c.get("value").and_then(|v| v.as_f64()).map(|s| s as u32),
        })
    });
    let participants = value
        .get("participants")
        .and_then(|v| v.as_array())
        .map(|list| list.iter().filter_map(parse_participant).collect())
        .unwrap_or_default();

    Some(Play {
        id,
        sequence_number: pick_u32(value, &["sequenceNumber"]).unwrap_or(0),
        play_type,
        text: pick_string(value, &["text"]).unwrap_or_default(),
        short_text: pick_string(value, &["shortText"]),
        scoring: value
            .get("scoringPlay")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        period: value
            .get("period")
            .and_then(|p| pick_u32(p, &["number"]))
            .map(|n| n as u8),
        clock,
        start: value.get("start").map(parse_marker),
        end: value.get("end").map(parse_marker),
        stat_yardage: pick_i32(value, &["statYardage"]),
        probability: value.get("probability").and_then(parse_probability),
        participants,
    })
}

fn parse_probability(value: &Value) -> Option<PlayProbability> {
    let home = value.get("homeWinPercentage").and_then(|v| v.as_f64())?;
    Some(PlayProbability {
        home,
        away: value.get("awayWinPercentage").and_then(|v| v.as_f64()),
        tie: value.get("tiePercentage").and_then(|v| v.as_f64()),
    })
}

fn parse_participant(value: &Value) -> Option<Participant> {
    let athlete = value.get("athlete")?;
    let athlete = if athlete.get("displayName").is_some() || athlete.get("fullName").is_some() {
        AthleteRef::Full(parse_athlete(athlete)?)
    } else {
        AthleteRef::Reference(https_url(&pick_string(athlete, &["$ref"])?))
    };
    Some(Participant {
        role: pick_string(value, &["type"]).unwrap_or_default(),
        order: pick_u32(value, &["order"]),
        athlete,
    })
}

fn parse_athlete(value: &Value) -> Option<Athlete> {
    let id = pick_string(value, &["id"])?;
    let headshot = value.get("headshot").and_then(|h| match h {
        Value::String(s) => Some(s.clone()),
        other => pick_string(other, &["href"]),
    });
    Some(Athlete {
        id,
        display_name: pick_string(value, &["displayName", "fullName"]).unwrap_or_default(),
        short_name: pick_string(value, &["shortName"]),
        jersey: pick_string(value, &["jersey"]),
        position: value
            .get("position")
            .and_then(|p| pick_string(p, &["abbreviation"])),
        headshot: headshot.map(|h| https_url(&h)),
        team_id: parse_team_ref(value.get("team")).id,
    })
}

fn parse_boxscore(value: &Value) -> Option<Boxscore> {
    let players = value.get("players").and_then(|v| v.as_array())?;
    let teams = players
        .iter()
        .map(|entry| {
            let team = entry.get("team").unwrap_or(&Value::Null);
            let team_id = pick_string(team, &["id"]).unwrap_or_default();
            let categories = entry
                .get("statistics")
                .and_then(|v| v.as_array())
                .map(|cats| {
                    cats.iter()
                        .map(|cat| parse_stat_category(cat, &team_id))
                        .collect()
                })
                .unwrap_or_default();
            BoxscoreTeam {
                team_id: team_id.clone(),
                abbreviation: pick_string(team, &["abbreviation"]),
                categories,
            }
        })
        .collect();
    Some(Boxscore { teams })
}

fn parse_stat_category(value: &Value, team_id: &str) -> StatCategory {
    let labels = value
        .get("labels")
        .and_then(|v| v.as_array())
        .map(|l| l.iter().filter_map(as_string).collect())
        .unwrap_or_default();
    let athletes = value
        .get("athletes")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|row| {
                    let mut athlete = parse_athlete(row.get("athlete")?)?;
                    if athlete.team_id.is_none() && !team_id.is_empty() {
                        athlete.team_id = Some(team_id.to_string());
                    }
                    let stats = row
                        .get("stats")
                        .and_then(|v| v.as_array())
                        .map(|s| s.iter().filter_map(as_string).collect())
                        .unwrap_or_default();
                    Some(BoxscoreAthlete { athlete, stats })
                })
                .collect()
        })
        .unwrap_or_default();
    StatCategory {
        name: pick_string(value, &["name"]).unwrap_or_default(),
        labels,
        athletes,
    }
}

fn parse_win_prob_entry(value: &Value) -> Option<WinProbEntry> {
    let home_win = value.get("homeWinPercentage").and_then(|v| v.as_f64())?;
    let seconds_left = value.get("secondsLeft").and_then(|v| v.as_i64());
    let (period, clock_seconds) = match (
        pick_u32(value, &["period"]),
        pick_u32(value, &["clock", "clockSeconds"]),
    ) {
        (Some(p), clock) => (Some(p as u8), clock),
        (None, _) => match seconds_left.and_then(regulation_clock) {
            Some((p, c)) => (Some(p), Some(c)),
            None => (None, None),
        },
    };
    Some(WinProbEntry {
        play_id: pick_string(value, &["playId"]),
        sequence_number: pick_u32(value, &["sequenceNumber"]),
        period,
        clock_seconds,
        home_win,
        tie: value.get("tiesPercentage").and_then(|v| v.as_f64()),
    })
}

/// Maps game seconds remaining onto (quarter, seconds left in quarter). Regulation only.
pub fn regulation_clock(seconds_left: i64) -> Option<(u8, u32)> {
    if !(0..=4 * QUARTER_SECONDS).contains(&seconds_left) {
        return None;
    }
    if seconds_left == 0 {
        return Some((4, 0));
    }
    let quarters_after = (seconds_left - 1) / QUARTER_SECONDS;
    let period = 4 - quarters_after;
    let clock = seconds_left - quarters_after * QUARTER_SECONDS;
    Some((period as u8, clock as u32))
}

fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = value.get(*key)
            && let Some(s) = as_string(v)
            && !s.is_empty()
        {
            return Some(s);
        }
    }
    None
}

fn pick_u32(value: &Value, keys: &[&str]) -> Option<u32> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            if let Some(num) = v.as_u64() {
                return Some(num as u32);
            }
            if let Some(num) = v.as_f64()
                && num >= 0.0
            {
                return Some(num as u32);
            }
            if let Some(s) = v.as_str()
                && let Ok(num) = s.trim().parse::<u32>()
            {
                return Some(num);
            }
        }
    }
    None
}

fn pick_i32(value: &Value, keys: &[&str]) -> Option<i32> {
    for key in keys {
        if let Some(v) = value.get(*key) {
            if let Some(num) = v.as_i64() {
                return Some(num as i32);
            }
            if let Some(num) = v.as_f64() {
                return Some(num.round() as i32);
            }
            if let Some(s) = v.as_str()
                && let Ok(num) = s.trim().parse::<i32>()
            {
                return Some(num);
            }
        }
    }
    None
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regulation_clock_splits_quarters() {
        assert_eq!(regulation_clock(3600), Some((1, 900)));
        assert_eq!(regulation_clock(2701), Some((1, 1)));
        assert_eq!(regulation_clock(2700), Some((2, 900)));
        assert_eq!(regulation_clock(905), Some((3, 5)));
        assert_eq!(regulation_clock(60), Some((4, 60)));
        assert_eq!(regulation_clock(0), Some((4, 0)));
        assert_eq!(regulation_clock(-5), None);
    }

    #[test]
    fn team_id_comes_from_ref_link() {
        assert_eq!(
            team_id_from_ref(
                "http://sports.core.api.espn.com/v2/sports/football/leagues/nfl/seasons/2024/teams/12?lang=en"
            )
            .as_deref(),
            Some("12")
        );
        assert_eq!(team_id_from_ref("http://x/teams/?a"), None);
    }

    #[test]
    fn drive_without_end_is_in_progress() {
        let value: Value = serde_json::json!({
            "id": "77",
            "team": {"$ref": "http://x/teams/7?lang=en"},
            "start": {"yardLine": 25, "text": "DEN 25"},
            "plays": {"$ref": "http://x/drives/77/plays", "count": 3}
        });
        let drive = parse_drive(&value).unwrap();
        assert!(drive.is_in_progress());
        assert_eq!(drive.team.id.as_deref(), Some("7"));
        assert_eq!(drive.plays_reference(), Some("https://x/drives/77/plays"));
        assert_eq!(drive.play_count(), Some(3));
    }

    #[test]
    fn embedded_play_items_are_loaded() {
        let value: Value = serde_json::json!({
            "id": "78",
            "end": {"yardLine": 40},
            "plays": {"count": 1, "items": [{"id": "p1", "sequenceNumber": "4", "text": "Run"}]}
        });
        let drive = parse_drive(&value).unwrap();
        assert!(!drive.is_in_progress());
        assert!(drive.has_plays_data());
        assert_eq!(drive.plays()[0].sequence_number, 4);
    }

    #[test]
    fn missing_plays_link_is_pending_without_reference() {
        let value: Value = serde_json::json!({"id": "79"});
        let drive = parse_drive(&value).unwrap();
        assert_eq!(
            drive.plays,
            PlaySet::Pending {
                reference: None,
                count: None
            }
        );
    }

    #[test]
    fn game_date_reads_iso_prefix() {
        assert_eq!(
            game_date("2024-09-06T00:20Z"),
            NaiveDate::from_ymd_opt(2024, 9, 6)
        );
        assert_eq!(game_date("soon"), None);
    }
}
