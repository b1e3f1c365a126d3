use anyhow::{Result, bail};

use crate::fetch::GameFeed;
use crate::state::{Drive, Play, PlaySet};

/// What is needed to give a drive its plays.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<'a> {
    Ready(&'a Drive),
    Fetch(String),
    /// Upstream gave no plays link; completes as an empty list.
    NoReference,
}

/// Committed drive list for the active game.
#[derive(Debug, Clone, Default)]
pub struct DriveStore {
    drives: Vec<Drive>,
    loaded: bool,
}

impl DriveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any drive list has been committed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn drives(&self) -> &[Drive] {
        &self.drives
    }

    pub fn get(&self, drive_id: &str) -> Option<&Drive> {
        self.drives.iter().find(|d| d.id == drive_id)
    }

    pub fn clear(&mut self) {
        self.drives.clear();
        self.loaded = false;
    }

    /// Commits a fetched drive list. Returns false when a silent update was
    /// judged redundant and skipped.
    ///
    /// Plays already materialized on a drive survive a refresh that only
    /// carries a plays link for it. When upstream reports more plays than are
    /// held, or a live drive's count is unknown, the held list is kept but
    /// marked stale so it gets fetched again.
    pub fn replace_drives(&mut self, incoming: Vec<Drive>, silent: bool) -> bool {
        if silent && self.loaded && !drives_changed(&self.drives, &incoming) {
            return false;
        }
        let mut merged = incoming;
        for drive in &mut merged {
            if drive.has_plays_data() {
                continue;
            }
            let Some(prev) = self.drives.iter().find(|d| d.id == drive.id) else {
                continue;
            };
            if !prev.has_plays_data() {
                continue;
            }
            let held = prev.plays().to_vec();
            drive.plays = match &drive.plays {
                PlaySet::Pending {
                    reference: Some(reference),
                    count,
                } if behind(*count, held.len(), drive.is_in_progress()) => PlaySet::Stale {
                    plays: held,
                    reference: reference.clone(),
                    count: *count,
                },
                _ => PlaySet::Loaded(held),
            };
        }
        self.drives = merged;
        self.loaded = true;
        true
    }

    /// Drives whose held plays are behind upstream, with the link to refetch them.
    pub fn stale_drives(&self) -> Vec<(String, String)> {
        self.drives
            .iter()
            .filter_map(|d| match &d.plays {
                PlaySet::Stale { reference, .. } => Some((d.id.clone(), reference.clone())),
                _ => None,
            })
            .collect()
    }

    /// Drops the stale mark after a failed refetch so it is retried on the next
    /// drives commit instead of immediately.
    pub fn keep_held_plays(&mut self, drive_id: &str) {
        if let Some(drive) = self.drives.iter_mut().find(|d| d.id == drive_id)
            && let PlaySet::Stale { plays, .. } = &mut drive.plays
        {
            let held = std::mem::take(plays);
            drive.plays = PlaySet::Loaded(held);
        }
    }

    pub fn plan_completion(&self, drive_id: &str) -> Option<Completion<'_>> {
        let drive = self.get(drive_id)?;
        Some(match &drive.plays {
            PlaySet::Loaded(_) => Completion::Ready(drive),
            PlaySet::Pending {
                reference: Some(reference),
                ..
            }
            | PlaySet::Stale { reference, .. } => Completion::Fetch(reference.clone()),
            PlaySet::Pending {
                reference: None, ..
            } => Completion::NoReference,
        })
    }

    /// Writes fetched plays onto the drive. A fetched drive is only replaced by
    /// a list at least as long, so plays never disappear.
    pub fn materialize(&mut self, drive_id: &str, plays: Vec<Play>) -> Option<&Drive> {
        let drive = self.drives.iter_mut().find(|d| d.id == drive_id)?;
        let replace = match &drive.plays {
            PlaySet::Pending { .. } => true,
            PlaySet::Loaded(existing) | PlaySet::Stale { plays: existing, .. } => {
                plays.len() >= existing.len()
            }
        };
        if replace {
            drive.plays = PlaySet::Loaded(plays);
        } else if let PlaySet::Stale { plays: existing, .. } = &drive.plays {
            drive.plays = PlaySet::Loaded(existing.clone());
        }
        Some(drive)
    }

    /// Blocking completion. Loaded drives return without a fetch.
    pub fn complete_plays(&mut self, drive_id: &str, feed: &dyn GameFeed) -> Result<Drive> {
        let plays = match self.plan_completion(drive_id) {
            None => bail!("unknown drive {drive_id}"),
            Some(Completion::Ready(drive)) => return Ok(drive.clone()),
            Some(Completion::NoReference) => Vec::new(),
            Some(Completion::Fetch(reference)) => feed.drive_plays(&reference)?,
        };
        match self.materialize(drive_id, plays) {
            Some(drive) => Ok(drive.clone()),
            None => bail!("unknown drive {drive_id}"),
        }
    }
}

fn behind(reported: Option<u32>, held: usize, in_progress: bool) -> bool {
    match reported {
        Some(count) => count as usize > held,
        None => in_progress,
    }
}

fn drives_changed(current: &[Drive], incoming: &[Drive]) -> bool {
    if incoming.len() > current.len() {
        return true;
    }
    match (current.last(), incoming.last()) {
        (Some(cur), Some(new)) => {
            cur.id != new.id || cur.result != new.result || new.play_count() > cur.play_count()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;

    use super::*;
    use crate::state::{DrivePhase, FieldMarker, GameSnapshot, Situation, TeamRef};

    fn drive(id: &str, result: Option<&str>, reference: Option<&str>) -> Drive {
        Drive {
            id: id.to_string(),
            team: TeamRef::default(),
            description: None,
            start: FieldMarker::default(),
            phase: if result.is_some() {
                DrivePhase::Concluded(FieldMarker::default())
            } else {
                DrivePhase::InProgress
            },
            result: result.map(|r| r.to_string()),
            short_result: None,
            elapsed: None,
            yards: None,
            offensive_plays: None,
            is_score: false,
            plays: PlaySet::Pending {
                reference: reference.map(|r| r.to_string()),
                count: None,
            },
        }
    }

    fn play(id: &str) -> Play {
        Play {
            id: id.to_string(),
            ..Play::default()
        }
    }

    struct CountingFeed {
        calls: AtomicUsize,
    }

    impl GameFeed for CountingFeed {
        fn game_summary(&self, _game_id: &str) -> Result<GameSnapshot> {
            bail!("unused")
        }
        fn drives(&self, _game_id: &str) -> Result<Vec<Drive>> {
            bail!("unused")
        }
        fn situation(&self, _game_id: &str, _date: Option<NaiveDate>) -> Result<Situation> {
            bail!("unused")
        }
        fn drive_plays(&self, _reference: &str) -> Result<Vec<Play>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![play("p1"), play("p2")])
        }
    }

    #[test]
    fn silent_update_with_same_tail_is_skipped() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![drive("d1", Some("Punt"), None)], false);
        let applied = store.replace_drives(vec![drive("d1", Some("Punt"), None)], true);
        assert!(!applied);
    }

    #[test]
    fn silent_update_with_new_result_applies() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![drive("d1", None, None)], false);
        assert!(store.replace_drives(vec![drive("d1", Some("Touchdown"), None)], true));
        assert_eq!(store.drives()[0].result.as_deref(), Some("Touchdown"));
    }

    #[test]
    fn silent_update_with_more_drives_applies() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![drive("d1", Some("Punt"), None)], false);
        assert!(store.replace_drives(
            vec![drive("d1", Some("Punt"), None), drive("d2", None, None)],
            true
        ));
        assert_eq!(store.drives().len(), 2);
    }

    #[test]
    fn silent_empty_list_never_clears() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![drive("d1", Some("Punt"), None)], false);
        assert!(!store.replace_drives(Vec::new(), true));
        assert_eq!(store.drives().len(), 1);
    }

    #[test]
    fn foreground_update_always_applies() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![drive("d1", Some("Punt"), None)], false);
        assert!(store.replace_drives(vec![drive("d1", Some("Punt"), None)], false));
    }

    #[test]
    fn refresh_keeps_materialized_plays() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![drive("d1", None, Some("ref1"))], false);
        store.materialize("d1", vec![play("p1")]);
        store.replace_drives(vec![drive("d1", Some("Field Goal"), Some("ref1"))], true);
        let d1 = store.get("d1").unwrap();
        assert!(d1.has_plays_data());
        assert_eq!(d1.plays().len(), 1);
    }

    #[test]
    fn complete_plays_fetches_once() {
        let feed = CountingFeed {
            calls: AtomicUsize::new(0),
        };
        let mut store = DriveStore::new();
        store.replace_drives(vec![drive("d1", None, Some("ref1"))], false);
        let first = store.complete_plays("d1", &feed).unwrap();
        let second = store.complete_plays("d1", &feed).unwrap();
        assert_eq!(first.plays().len(), 2);
        assert_eq!(first, second);
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_reference_completes_empty() {
        let feed = CountingFeed {
            calls: AtomicUsize::new(0),
        };
        let mut store = DriveStore::new();
        store.replace_drives(vec![drive("d1", None, None)], false);
        let done = store.complete_plays("d1", &feed).unwrap();
        assert!(done.has_plays_data());
        assert!(done.plays().is_empty());
        assert_eq!(feed.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_drive_is_an_error() {
        let feed = CountingFeed {
            calls: AtomicUsize::new(0),
        };
        let mut store = DriveStore::new();
        assert!(store.complete_plays("nope", &feed).is_err());
    }

    fn with_count(mut d: Drive, count: u32) -> Drive {
        if let PlaySet::Pending { count: c, .. } = &mut d.plays {
            *c = Some(count);
        }
        d
    }

    #[test]
    fn growing_play_count_marks_drive_stale() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![with_count(drive("d1", None, Some("r1")), 1)], false);
        store.materialize("d1", vec![play("p1")]);
        assert!(store.replace_drives(vec![with_count(drive("d1", None, Some("r1")), 3)], true));
        let d1 = store.get("d1").unwrap();
        assert!(d1.plays_are_stale());
        assert_eq!(d1.plays().len(), 1);
        assert_eq!(store.stale_drives(), vec![("d1".to_string(), "r1".to_string())]);
        assert_eq!(
            store.plan_completion("d1"),
            Some(Completion::Fetch("r1".to_string()))
        );
    }

    #[test]
    fn matching_play_count_stays_loaded() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![with_count(drive("d1", None, Some("r1")), 2)], false);
        store.materialize("d1", vec![play("p1"), play("p2")]);
        store.replace_drives(vec![with_count(drive("d1", Some("Punt"), Some("r1")), 2)], false);
        assert!(!store.get("d1").unwrap().plays_are_stale());
        assert!(store.stale_drives().is_empty());
    }

    #[test]
    fn short_refetch_clears_stale_mark() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![with_count(drive("d1", None, Some("r1")), 2)], false);
        store.materialize("d1", vec![play("p1"), play("p2")]);
        store.replace_drives(vec![with_count(drive("d1", None, Some("r1")), 4)], false);
        store.materialize("d1", vec![play("p1")]);
        let d1 = store.get("d1").unwrap();
        assert!(!d1.plays_are_stale());
        assert_eq!(d1.plays().len(), 2);
    }

    #[test]
    fn shorter_play_list_does_not_replace() {
        let mut store = DriveStore::new();
        store.replace_drives(vec![drive("d1", None, Some("r"))], false);
        store.materialize("d1", vec![play("p1"), play("p2")]);
        store.materialize("d1", vec![play("p1")]);
        assert_eq!(store.get("d1").unwrap().plays().len(), 2);
    }
}
