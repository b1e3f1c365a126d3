use std::collections::HashMap;

use crate::fetch::id_after_segment;
use crate::state::{Athlete, AthleteRef, Boxscore, Participant, Play};

const HEADSHOT_BASE: &str = "https://a.espncdn.com/i/headshots/nfl/players/full";

/// Boxscore athletes keyed by id, built once per committed snapshot.
#[derive(Debug, Clone, Default)]
pub struct BoxscoreIndex {
    athletes: HashMap<String, Athlete>,
}

impl BoxscoreIndex {
    pub fn build(boxscore: &Boxscore) -> Self {
        let mut athletes = HashMap::new();
        for team in &boxscore.teams {
            for category in &team.categories {
                for row in &category.athletes {
                    athletes
                        .entry(row.athlete.id.clone())
                        .or_insert_with(|| {
                            let mut athlete = row.athlete.clone();
                            if athlete.team_id.is_none() && !team.team_id.is_empty() {
                                athlete.team_id = Some(team.team_id.clone());
                            }
                            athlete
                        });
                }
            }
        }
        Self { athletes }
    }

    pub fn get(&self, athlete_id: &str) -> Option<&Athlete> {
        self.athletes.get(athlete_id)
    }

    pub fn len(&self) -> usize {
        self.athletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.athletes.is_empty()
    }
}

pub fn default_headshot(athlete_id: &str) -> String {
    format!("{HEADSHOT_BASE}/{athlete_id}.png")
}

/// Numeric id from a `.../athletes/{id}?...` link.
pub fn athlete_id_from_ref(reference: &str) -> Option<String> {
    id_after_segment(reference, "/athletes/")
}

/// Resolves every participant to a full athlete record. Participants whose
/// reference is not in the boxscore are dropped.
pub fn enrich_participants(
    play: &Play,
    index: &BoxscoreIndex,
    drive_team_id: Option<&str>,
) -> Vec<Participant> {
    play.participants
        .iter()
        .filter_map(|participant| {
            let athlete = match &participant.athlete {
                AthleteRef::Full(athlete) => athlete.clone(),
                AthleteRef::Reference(reference) => {
                    let id = athlete_id_from_ref(reference)?;
                    index.get(&id)?.clone()
                }
            };
            Some(Participant {
                role: participant.role.clone(),
                order: participant.order,
                athlete: AthleteRef::Full(complete_athlete(athlete, drive_team_id)),
            })
        })
        .collect()
}

fn complete_athlete(mut athlete: Athlete, drive_team_id: Option<&str>) -> Athlete {
    if athlete.headshot.as_deref().map(str::is_empty).unwrap_or(true) {
        athlete.headshot = Some(default_headshot(&athlete.id));
    }
    if athlete.team_id.is_none() {
        athlete.team_id = drive_team_id.map(str::to_string);
    }
    athlete
}
