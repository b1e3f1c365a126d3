use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::fetch::{self, GameFeed};
use crate::scheduler::{LaneFetch, PollScheduler};
use crate::state::{Delta, FetchMeta, Lane, LanePayload, ProviderCommand};

const LOOP_SLEEP: Duration = Duration::from_millis(50);

/// Runs the poll loop on its own thread. Lane fetches go to a worker pool and
/// their results come back through this loop before reaching `tx`, so the
/// scheduler sees every observed status first.
pub fn spawn_provider(
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
    feed: Arc<dyn GameFeed>,
    config: &EngineConfig,
) -> JoinHandle<()> {
    let interval = config.poll_interval;
    let parallelism = config.fetch_parallelism;
    thread::spawn(move || {
        let mut provider = Provider {
            feed,
            pool: build_fetch_pool(parallelism),
            scheduler: PollScheduler::new(interval),
            out: tx,
            done: mpsc::channel(),
            next_token: 0,
            game_date: None,
            inflight_drives: HashSet::new(),
        };
        provider.run(cmd_rx);
    })
}

struct Provider {
    feed: Arc<dyn GameFeed>,
    pool: Option<rayon::ThreadPool>,
    scheduler: PollScheduler,
    out: Sender<Delta>,
    done: (Sender<Delta>, Receiver<Delta>),
    next_token: u64,
    game_date: Option<NaiveDate>,
    inflight_drives: HashSet<String>,
}

impl Provider {
    fn run(&mut self, cmd_rx: Receiver<ProviderCommand>) {
        loop {
            loop {
                match cmd_rx.try_recv() {
                    Ok(ProviderCommand::Stop) | Err(TryRecvError::Disconnected) => {
                        self.scheduler.stop();
                        info!("provider stopped");
                        return;
                    }
                    Ok(cmd) => self.handle_command(cmd),
                    Err(TryRecvError::Empty) => break,
                }
            }

            while let Ok(delta) = self.done.1.try_recv() {
                self.observe(&delta);
                if self.out.send(delta).is_err() {
                    return;
                }
            }

            let due = self.scheduler.tick(Instant::now());
            self.dispatch(due);

            thread::sleep(LOOP_SLEEP);
        }
    }

    fn handle_command(&mut self, cmd: ProviderCommand) {
        match cmd {
            ProviderCommand::SelectGame { game_id } => {
                info!(game_id = %game_id, "selecting game");
                self.feed.reset();
                self.inflight_drives.clear();
                self.game_date = None;
                let fetches = self.scheduler.select_game(&game_id, Instant::now());
                self.dispatch(fetches);
            }
            ProviderCommand::SetOverlayOpen(open) => {
                let fetches = self.scheduler.set_overlay_open(open);
                self.dispatch(fetches);
            }
            ProviderCommand::Refresh => {
                let fetches = self.scheduler.refresh();
                self.dispatch(fetches);
            }
            ProviderCommand::CompleteDrive {
                game_id,
                drive_id,
                reference,
            } => {
                if self.scheduler.game_id() != Some(game_id.as_str()) {
                    return;
                }
                if !self.inflight_drives.insert(drive_id.clone()) {
                    return;
                }
                let feed = self.feed.clone();
                let done = self.done.0.clone();
                self.spawn(move || {
                    let delta = match feed.drive_plays(&reference) {
                        Ok(plays) => Delta::DrivePlays {
                            game_id,
                            drive_id,
                            plays,
                        },
                        Err(err) => {
                            warn!(drive_id = %drive_id, error = %err, "drive plays fetch failed");
                            Delta::DrivePlaysFailed {
                                game_id,
                                drive_id,
                                error: format!("{err:#}"),
                            }
                        }
                    };
                    let _ = done.send(delta);
                });
            }
            ProviderCommand::Stop => {}
        }
    }

    /// Feeds results for the active game back into the scheduler.
    fn observe(&mut self, delta: &Delta) {
        match delta {
            Delta::LaneResolved {
                meta,
                payload: LanePayload::Summary(snapshot),
            } => {
                self.scheduler
                    .observe_status(&meta.game_id, meta.token, &snapshot.status);
                if self.scheduler.game_id() == Some(meta.game_id.as_str()) {
                    self.game_date = snapshot.date.as_deref().and_then(fetch::game_date);
                }
            }
            Delta::DrivePlays { drive_id, .. } | Delta::DrivePlaysFailed { drive_id, .. } => {
                self.inflight_drives.remove(drive_id);
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, fetches: Vec<LaneFetch>) {
        let Some(game_id) = self.scheduler.game_id().map(str::to_string) else {
            return;
        };
        for fetch in fetches {
            self.next_token += 1;
            let meta = FetchMeta {
                game_id: game_id.clone(),
                lane: fetch.lane,
                token: self.next_token,
                silent: fetch.silent,
            };
            if self.out.send(Delta::LaneStarted(meta.clone())).is_err() {
                return;
            }
            let feed = self.feed.clone();
            let done = self.done.0.clone();
            let game_date = self.game_date;
            self.spawn(move || {
                let _ = done.send(run_lane(feed.as_ref(), meta, game_date));
            });
        }
    }

    fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(pool) = self.pool.as_ref() {
            pool.spawn(job);
        } else {
            thread::spawn(job);
        }
    }
}

fn run_lane(feed: &dyn GameFeed, meta: FetchMeta, game_date: Option<NaiveDate>) -> Delta {
    let result = match meta.lane {
        Lane::Summary => feed
            .game_summary(&meta.game_id)
            .map(|s| LanePayload::Summary(Box::new(s))),
        Lane::Drives => feed.drives(&meta.game_id).map(LanePayload::Drives),
        Lane::Situation => feed
            .situation(&meta.game_id, game_date)
            .map(LanePayload::Situation),
    };
    match result {
        Ok(payload) => Delta::LaneResolved { meta, payload },
        Err(err) => {
            warn!(
                game_id = %meta.game_id,
                lane = meta.lane.label(),
                silent = meta.silent,
                error = %err,
                "lane fetch failed"
            );
            Delta::LaneFailed {
                meta,
                error: format!("{err:#}"),
            }
        }
    }
}

fn build_fetch_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|idx| format!("gridiron-fetch-{idx}"))
        .build()
        .ok()
}
