use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use gridiron_terminal::error::FetchError;
use gridiron_terminal::fetch::{
    EspnFeed, GameFeed, parse_drives_page_json, parse_plays_page_json,
    parse_scoreboard_situation_json, parse_summary_json, parse_summary_situation_json,
};
use gridiron_terminal::http_cache::{
    Clock, HttpCache, Transport, TransportResponse, Validators,
};
use gridiron_terminal::state::{AthleteRef, DrivePhase, SnapshotNesting};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_summary_under_header() {
    let snap = parse_summary_json(&read_fixture("summary_header.json")).expect("fixture should parse");
    assert_eq!(snap.id, "401671789");
    assert_eq!(snap.nesting, SnapshotNesting::Header);
    assert_eq!(snap.home.abbreviation, "BUF");
    assert_eq!(snap.home.score, 17);
    assert_eq!(snap.away.abbreviation, "KC");
    assert_eq!(snap.away.team_id, "12");
    assert_eq!(snap.home.line_scores, vec![7, 3, 7]);
    assert_eq!(snap.home.record.as_deref(), Some("8-2"));
    assert_eq!(
        snap.home.logo.as_deref(),
        Some("https://a.espncdn.com/i/teamlogos/nfl/500/buf.png")
    );
    assert_eq!(snap.status.period, 3);
    assert_eq!(snap.status.display_clock, "4:12");
    assert!(!snap.status.completed);
    assert!(!snap.status.is_scheduled());

    let situation = snap.situation.as_ref().expect("situation embedded");
    assert_eq!(situation.down, Some(2));
    assert_eq!(situation.yard_line, Some(41));
    assert_eq!(situation.away_timeouts, Some(2));

    let boxscore = snap.boxscore.as_ref().expect("boxscore present");
    assert_eq!(boxscore.teams.len(), 2);
    assert_eq!(boxscore.teams[0].categories.len(), 2);

    assert_eq!(snap.win_probability.len(), 3);
    let last = &snap.win_probability[2];
    assert_eq!(last.period, Some(3));
    assert_eq!(last.clock_seconds, Some(252));
    assert_eq!(snap.date.as_deref(), Some("2024-11-17T21:25Z"));
}

#[test]
fn parses_summary_at_top_level() {
    let snap =
        parse_summary_json(&read_fixture("summary_top_level.json")).expect("fixture should parse");
    assert_eq!(snap.nesting, SnapshotNesting::TopLevel);
    assert_eq!(snap.id, "401671800");
    assert_eq!(snap.home.abbreviation, "WSH");
    assert_eq!(snap.away.abbreviation, "DAL");
    assert!(snap.status.is_scheduled());
    assert!(snap.situation.is_none());
    assert!(snap.win_probability.is_empty());
}

#[test]
fn summary_without_competition_is_an_error() {
    assert!(parse_summary_json(r#"{"header": {"id": "1"}}"#).is_err());
    assert!(parse_summary_json("not json").is_err());
}

#[test]
fn parses_drive_pages() {
    let page = parse_drives_page_json(&read_fixture("drives_page1.json")).expect("fixture should parse");
    assert_eq!(page.page_count, 2);
    assert_eq!(page.items.len(), 2);
    let first = &page.items[0];
    assert_eq!(first.team.id.as_deref(), Some("12"));
    assert_eq!(first.result.as_deref(), Some("Touchdown"));
    assert!(first.is_score);
    assert_eq!(first.start.yard_line, Some(30));
    assert!(matches!(first.phase, DrivePhase::Concluded(ref end) if end.yard_line == Some(100)));
    assert!(
        first
            .plays_reference()
            .is_some_and(|r| r.starts_with("https://sports.core.api.espn.com/"))
    );

    let page2 = parse_drives_page_json(&read_fixture("drives_page2.json")).expect("fixture should parse");
    assert!(page2.items[0].is_in_progress());
    assert_eq!(page2.items[0].start.period, Some(3));
}

#[test]
fn empty_page_body_is_empty() {
    let page = parse_drives_page_json("null").unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.page_count, 1);
}

#[test]
fn parses_plays_page() {
    let page = parse_plays_page_json(&read_fixture("plays.json")).expect("fixture should parse");
    assert_eq!(page.items.len(), 2);
    let run = &page.items[0];
    assert_eq!(run.sequence_number, 57);
    assert_eq!(run.period, Some(3));
    assert_eq!(run.clock.as_ref().and_then(|c| c.seconds), Some(252));
    assert_eq!(run.end.as_ref().and_then(|e| e.yard_line), Some(41));
    assert_eq!(run.end.as_ref().and_then(|e| e.team_id.as_deref()), Some("12"));
    assert!(run.probability.is_none());
    assert!(matches!(run.participants[0].athlete, AthleteRef::Reference(ref r) if r.contains("/athletes/4361529")));

    let pass = &page.items[1];
    let prob = pass.probability.expect("embedded probability");
    assert!((prob.home - 0.58).abs() < 1e-9);
    assert_eq!(pass.participants.len(), 2);
    assert_eq!(pass.participants[1].role, "receiver");
}

#[test]
fn scoreboard_situation_is_found_by_event_id() {
    let raw = read_fixture("scoreboard.json");
    let situation = parse_scoreboard_situation_json(&raw, "401671789")
        .unwrap()
        .expect("event listed");
    assert_eq!(situation.down, Some(3));
    assert_eq!(situation.short_down_distance_text.as_deref(), Some("3rd & 2"));
    assert!(parse_scoreboard_situation_json(&raw, "999").unwrap().is_none());
}

#[test]
fn summary_situation_defaults_when_absent() {
    let situation = parse_summary_situation_json(&read_fixture("summary_top_level.json")).unwrap();
    assert_eq!(situation.down, None);
    assert_eq!(situation.yard_line, None);
}

struct FixtureTransport {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Transport for FixtureTransport {
    fn get(&self, url: &str, _validators: &Validators) -> Result<TransportResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let name = if url.contains("/plays") {
            "plays.json"
        } else if url.contains("drives") && url.contains("page=2") {
            "drives_page2.json"
        } else if url.contains("drives") {
            "drives_page1.json"
        } else if url.contains("scoreboard?dates=20241117") {
            "scoreboard.json"
        } else if url.contains("summary?event=") {
            "summary_header.json"
        } else {
            return Err(FetchError::Http {
                status: 404,
                url: url.to_string(),
            });
        };
        Ok(TransportResponse::Body {
            body: read_fixture(name),
            validators: Validators::default(),
        })
    }
}

struct FixedClock(Instant);

impl Clock for FixedClock {
    fn now(&self) -> Instant {
        self.0
    }
}

fn fixture_feed() -> (EspnFeed, Arc<Mutex<Vec<String>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let cache = HttpCache::new(
        Box::new(FixtureTransport {
            calls: calls.clone(),
        }),
        Arc::new(FixedClock(Instant::now())),
        Duration::from_secs(2),
    );
    (EspnFeed::with_cache("nfl", cache), calls)
}

#[test]
fn espn_feed_walks_drive_pages() {
    let (feed, calls) = fixture_feed();
    let drives = feed.drives("401671789").unwrap();
    assert_eq!(drives.len(), 3);
    assert_eq!(drives[2].id, "4016717893");
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with(
        "https://sports.core.api.espn.com/v2/sports/football/leagues/nfl/events/401671789/competitions/401671789/drives?"
    ));
    assert!(calls[1].ends_with("&page=2"));
}

#[test]
fn espn_feed_orders_plays_by_sequence() {
    let (feed, _) = fixture_feed();
    let plays = feed
        .drive_plays("http://sports.core.api.espn.com/v2/sports/football/leagues/nfl/events/401671789/competitions/401671789/drives/4016717893/plays?lang=en")
        .unwrap();
    let seqs: Vec<u32> = plays.iter().map(|p| p.sequence_number).collect();
    assert_eq!(seqs, vec![56, 57]);
}

#[test]
fn espn_feed_prefers_dated_scoreboard_for_situation() {
    let (feed, calls) = fixture_feed();
    let situation = feed
        .situation("401671789", NaiveDate::from_ymd_opt(2024, 11, 17))
        .unwrap();
    assert_eq!(situation.down, Some(3));

    let fallback = feed.situation("401671789", None).unwrap();
    assert_eq!(fallback.down, Some(2));
    assert!(calls.lock().unwrap().iter().any(|u| u.contains("summary?event=401671789")));
}

#[test]
fn espn_feed_cache_serves_repeat_summary() {
    let (feed, calls) = fixture_feed();
    feed.game_summary("401671789").unwrap();
    feed.game_summary("401671789").unwrap();
    assert_eq!(calls.lock().unwrap().len(), 1);
    feed.reset();
    feed.game_summary("401671789").unwrap();
    assert_eq!(calls.lock().unwrap().len(), 2);
}
