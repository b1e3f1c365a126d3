use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use gridiron_terminal::fetch::{parse_plays_page_json, parse_summary_json};
use gridiron_terminal::field_state::derive_field_state;
use gridiron_terminal::fingerprint::Fingerprinted;
use gridiron_terminal::participants::{BoxscoreIndex, enrich_participants};
use gridiron_terminal::state::{
    Drive, DrivePhase, FieldMarker, Play, PlaySet, TeamRef,
};

const SUMMARY_JSON: &str = include_str!("../tests/fixtures/summary_header.json");
const PLAYS_JSON: &str = include_str!("../tests/fixtures/plays.json");

fn sample_drives(count: usize, plays_per_drive: u32) -> Vec<Drive> {
    (0..count)
        .map(|idx| {
            let plays = (0..plays_per_drive)
                .map(|seq| Play {
                    id: format!("{idx}-{seq}"),
                    sequence_number: seq,
                    end: Some(FieldMarker {
                        yard_line: Some(20 + (seq as i32 * 7) % 60),
                        down: Some(1 + (seq % 4) as u8),
                        distance: Some(10),
                        ..FieldMarker::default()
                    }),
                    ..Play::default()
                })
                .collect();
            Drive {
                id: idx.to_string(),
                team: TeamRef {
                    id: Some(if idx % 2 == 0 { "12" } else { "2" }.to_string()),
                    ..TeamRef::default()
                },
                description: None,
                start: FieldMarker {
                    yard_line: Some(25),
                    ..FieldMarker::default()
                },
                phase: if idx + 1 == count {
                    DrivePhase::InProgress
                } else {
                    DrivePhase::Concluded(FieldMarker::default())
                },
                result: (idx + 1 != count).then(|| "Punt".to_string()),
                short_result: None,
                elapsed: None,
                yards: Some(10),
                offensive_plays: Some(plays_per_drive),
                is_score: false,
                plays: PlaySet::Loaded(plays),
            }
        })
        .collect()
}

fn bench_summary_parse(c: &mut Criterion) {
    c.bench_function("summary_parse", |b| {
        b.iter(|| {
            let snap = parse_summary_json(black_box(SUMMARY_JSON)).unwrap();
            black_box(snap.home.score);
        })
    });
}

fn bench_drive_fingerprint(c: &mut Criterion) {
    let drives = sample_drives(28, 9);
    c.bench_function("drive_fingerprint", |b| {
        b.iter(|| black_box(black_box(drives.as_slice()).fingerprint()))
    });
}

fn bench_field_state(c: &mut Criterion) {
    let drives = sample_drives(28, 9);
    c.bench_function("field_state_derive", |b| {
        b.iter(|| black_box(derive_field_state(black_box(&drives), None, None)))
    });
}

fn bench_participant_enrich(c: &mut Criterion) {
    let snap = parse_summary_json(SUMMARY_JSON).unwrap();
    let index = BoxscoreIndex::build(snap.boxscore.as_ref().unwrap());
    let plays = parse_plays_page_json(PLAYS_JSON).unwrap().items;
    c.bench_function("participant_enrich", |b| {
        b.iter(|| {
            for play in &plays {
                black_box(enrich_participants(play, &index, Some("12")));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_summary_parse,
    bench_drive_fingerprint,
    bench_field_state,
    bench_participant_enrich
);
criterion_main!(benches);
