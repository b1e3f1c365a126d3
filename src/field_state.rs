use crate::state::{Drive, FieldMarker, HomeAway, Matchup, Play, Situation};

const FIELD_MIN: i32 = 2;
const FIELD_MAX: i32 = 98;

/// Result text that ends a game rather than a possession.
const END_OF_GAME: [&str; 2] = ["end of game", "end of half"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YardLineSource {
    LatestPlay,
    Situation,
    DriveStart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    pub drive_id: String,
    pub possession_team_id: Option<String>,
    pub possession_side: Option<HomeAway>,
    /// Side whose half the ball sits in, from the territory label.
    pub territory_side: Option<HomeAway>,
    pub yard_line: i32,
    /// 0 is the away goal line, 100 the home goal line.
    pub field_percent: f32,
    pub down_distance_text: Option<String>,
    pub yard_line_text: Option<String>,
    pub source: YardLineSource,
}

pub fn current_drive(drives: &[Drive]) -> Option<&Drive> {
    drives.iter().find(|d| {
        d.is_in_progress()
            && !d
                .result
                .as_deref()
                .map(|r| END_OF_GAME.contains(&r.trim().to_lowercase().as_str()))
                .unwrap_or(false)
    })
}

/// Highest sequence number; on ties the later list entry wins.
pub fn most_recent_play(plays: &[Play]) -> Option<&Play> {
    plays
        .iter()
        .enumerate()
        .max_by_key(|(idx, p)| (p.sequence_number, *idx))
        .map(|(_, p)| p)
}

pub fn field_percent(yard_line: i32) -> f32 {
    100_i32.saturating_sub(yard_line).clamp(FIELD_MIN, FIELD_MAX) as f32
}

pub fn derive_field_state(
    drives: &[Drive],
    situation: Option<&Situation>,
    matchup: Option<&Matchup>,
) -> Option<FieldState> {
    let drive = current_drive(drives)?;
    let situation_spot = situation.filter(|s| s.yard_line.is_some());
    // Held plays that upstream has moved past lose to a live situation.
    let play_end = most_recent_play(drive.plays())
        .and_then(|p| p.end.as_ref())
        .filter(|end| end.yard_line.is_some())
        .filter(|_| !(drive.plays_are_stale() && situation_spot.is_some()));

    let (yard_line, source, down_distance_text, territory) = if let Some(end) = play_end {
        (
            end.yard_line?,
            YardLineSource::LatestPlay,
            marker_down_distance(end),
            territory_label(end),
        )
    } else if let Some(sit) = situation_spot {
        (
            sit.yard_line?,
            YardLineSource::Situation,
            sit.down_distance_text
                .clone()
                .or_else(|| sit.short_down_distance_text.clone())
                .or_else(|| format_down_distance(sit.down, sit.distance)),
            sit.possession_text.as_deref().and_then(leading_abbreviation),
        )
    } else {
        (
            drive.start.yard_line?,
            YardLineSource::DriveStart,
            marker_down_distance(&drive.start),
            territory_label(&drive.start),
        )
    };

    let possession_team_id = drive
        .team
        .id
        .clone()
        .or_else(|| drive.end().and_then(|e| e.team_id.clone()))
        .or_else(|| situation.and_then(|s| s.possession.clone()));
    let possession_side = matchup.and_then(|m| {
        possession_team_id
            .as_deref()
            .and_then(|id| m.side_of_team(id))
            .or_else(|| {
                drive
                    .team
                    .abbreviation
                    .as_deref()
                    .and_then(|a| m.side_of_abbreviation(a))
            })
    });
    let territory_side = matchup.and_then(|m| {
        territory
            .as_deref()
            .and_then(|abbr| m.side_of_abbreviation(abbr))
    });

    Some(FieldState {
        drive_id: drive.id.clone(),
        possession_team_id,
        possession_side,
        territory_side,
        yard_line,
        field_percent: field_percent(yard_line),
        down_distance_text,
        yard_line_text: Some(format_yard_line_text(
            yard_line,
            territory.as_deref(),
            matchup,
            territory_side,
        )),
        source,
    })
}

fn marker_down_distance(marker: &FieldMarker) -> Option<String> {
    marker
        .down_distance_text
        .clone()
        .or_else(|| marker.short_down_distance_text.clone())
        .or_else(|| format_down_distance(marker.down, marker.distance))
}

fn territory_label(marker: &FieldMarker) -> Option<String> {
    marker
        .possession_text
        .as_deref()
        .or(marker.text.as_deref())
        .and_then(leading_abbreviation)
}

/// "KC 35" -> "KC".
fn leading_abbreviation(text: &str) -> Option<String> {
    let token = text.split_whitespace().next()?;
    if token.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(token.to_uppercase())
    } else {
        None
    }
}

pub fn ordinal(n: u8) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

pub fn format_down_distance(down: Option<u8>, distance: Option<i32>) -> Option<String> {
    let down = down.filter(|d| (1..=4).contains(d))?;
    let distance = distance.filter(|d| *d >= 0)?;
    Some(format!("{} & {distance}", ordinal(down)))
}

/// "50" at midfield, otherwise the territory abbreviation and yard line.
pub fn format_yard_line_text(
    yard_line: i32,
    territory: Option<&str>,
    matchup: Option<&Matchup>,
    territory_side: Option<HomeAway>,
) -> String {
    if yard_line == 50 {
        return "50".to_string();
    }
    let abbr = territory.map(str::to_string).or_else(|| {
        matchup
            .zip(territory_side)
            .map(|(m, side)| m.abbreviation_of(side).to_string())
    });
    match abbr {
        Some(abbr) if !abbr.is_empty() => format!("{abbr} {yard_line}"),
        _ => yard_line.to_string(),
    }
}
