use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use crate::config::EngineConfig;
use crate::drive_store::Completion;
use crate::feed::spawn_provider;
use crate::fetch::GameFeed;
use crate::field_state::{FieldState, derive_field_state};
use crate::participants::enrich_participants;
use crate::state::{AppState, Delta, Drive, GameSnapshot, Participant, ProviderCommand, apply_delta};
use crate::win_prob::{ResolvedWinProbability, resolve_detailed};

#[derive(Debug, Clone, PartialEq)]
pub enum DriveRequest {
    Ready(Drive),
    /// Plays are being fetched; the drive updates on a later `pump`.
    Pending,
    Unknown,
}

/// Consumer-side handle: owns committed state and talks to the provider thread.
pub struct LiveGameEngine {
    state: AppState,
    cmd_tx: Sender<ProviderCommand>,
    rx: Receiver<Delta>,
    handle: Option<JoinHandle<()>>,
}

impl LiveGameEngine {
    pub fn spawn(config: &EngineConfig, feed: Arc<dyn GameFeed>) -> Self {
        let (tx, rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let handle = spawn_provider(tx, cmd_rx, feed, config);
        Self {
            state: AppState::new(),
            cmd_tx,
            rx,
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn select_game(&mut self, game_id: &str) {
        self.state.select_game(game_id);
        self.state.push_log(format!("[INFO] Tracking game {game_id}"));
        let _ = self.cmd_tx.send(ProviderCommand::SelectGame {
            game_id: game_id.to_string(),
        });
    }

    /// Applies every delta waiting on the channel. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(delta) = self.rx.try_recv() {
            apply_delta(&mut self.state, delta);
            applied += 1;
        }
        if applied > 0 {
            self.refetch_stale_plays();
        }
        applied
    }

    /// Re-requests plays for drives whose held list fell behind upstream.
    fn refetch_stale_plays(&mut self) {
        let Some(game_id) = self.state.game_id.clone() else {
            return;
        };
        for (drive_id, reference) in self.state.drives.stale_drives() {
            if !self.state.plays_pending.insert(drive_id.clone()) {
                continue;
            }
            let _ = self.cmd_tx.send(ProviderCommand::CompleteDrive {
                game_id: game_id.clone(),
                drive_id,
                reference,
            });
        }
    }

    pub fn current_game_state(&self, game_id: &str) -> Option<&GameSnapshot> {
        if !self.state.is_active_game(game_id) {
            return None;
        }
        self.state.game.as_ref()
    }

    pub fn drives(&self, game_id: &str) -> Option<&[Drive]> {
        if !self.state.is_active_game(game_id) || !self.state.drives.is_loaded() {
            return None;
        }
        Some(self.state.drives.drives())
    }

    pub fn field_state(&self, game_id: &str) -> Option<FieldState> {
        if !self.state.is_active_game(game_id) {
            return None;
        }
        let matchup = self.state.matchup();
        derive_field_state(
            self.state.drives.drives(),
            self.state.situation.as_ref(),
            matchup.as_ref(),
        )
    }

    pub fn open_drive(&mut self, drive_id: &str) -> DriveRequest {
        let Some(game_id) = self.state.game_id.clone() else {
            return DriveRequest::Unknown;
        };
        let reference = match self.state.drives.plan_completion(drive_id) {
            None => return DriveRequest::Unknown,
            Some(Completion::Ready(drive)) => return DriveRequest::Ready(drive.clone()),
            Some(Completion::Fetch(reference)) => Some(reference),
            Some(Completion::NoReference) => None,
        };
        let Some(reference) = reference else {
            return match self.state.drives.materialize(drive_id, Vec::new()) {
                Some(drive) => DriveRequest::Ready(drive.clone()),
                None => DriveRequest::Unknown,
            };
        };
        if self.state.plays_pending.insert(drive_id.to_string()) {
            let _ = self.cmd_tx.send(ProviderCommand::CompleteDrive {
                game_id,
                drive_id: drive_id.to_string(),
                reference,
            });
        }
        DriveRequest::Pending
    }

    pub fn set_overlay_open(&mut self, open: bool) {
        let _ = self.cmd_tx.send(ProviderCommand::SetOverlayOpen(open));
    }

    pub fn refresh(&mut self) {
        let _ = self.cmd_tx.send(ProviderCommand::Refresh);
    }

    pub fn play_win_probability(
        &self,
        drive_id: &str,
        play_id: &str,
    ) -> Option<ResolvedWinProbability> {
        let game = self.state.game.as_ref()?;
        let drive = self.state.drives.get(drive_id)?;
        let play = drive.find_play(play_id)?;
        Some(resolve_detailed(
            play,
            &game.win_probability,
            drive.team.id.as_deref(),
            &game.home.team_id,
            game.home.score,
            game.away.score,
        ))
    }

    pub fn play_participants(&self, drive_id: &str, play_id: &str) -> Vec<Participant> {
        let Some(drive) = self.state.drives.get(drive_id) else {
            return Vec::new();
        };
        let Some(play) = drive.find_play(play_id) else {
            return Vec::new();
        };
        enrich_participants(play, &self.state.boxscore_index, drive.team.id.as_deref())
    }

    pub fn take_alert(&mut self) -> Option<String> {
        self.state.take_alert()
    }

    /// Stops the provider thread and waits for it. Also runs on drop.
    pub fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(ProviderCommand::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LiveGameEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
