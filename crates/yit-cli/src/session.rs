//! Attach-or-spawn: reuse a running player or launch a detached one.
//!
//! There is no persisted session.  Every action probes the control channel
//! with `get_property idle-active`; a reply means Attached, an unreachable
//! endpoint means Absent.  Spawning is guarded by an exclusive lock file so
//! two invocations racing on Absent do not both launch a player.  The lock
//! names the process that owns it: the spawning invocation until the launch,
//! then the launched player.  A lock whose owner is gone, or that is older
//! than the TTL, is taken over.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::{debug, info, warn};
use yit_proto::config::PlayerConfig;
use yit_proto::platform;
use yit_proto::protocol::{LoadMode, MpvCommand};
use yit_proto::store::Track;

use crate::mpv::{expect_success, ControlChannel, IpcError};

/// How often and how many times to re-probe while another invocation spawns.
const SPAWN_WAIT_STEP: Duration = Duration::from_millis(200);
const SPAWN_WAIT_STEPS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Attached,
    Absent,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not talk to the player: {0}")]
    Probe(IpcError),

    #[error("failed to start the player: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("another yit invocation is still starting the player")]
    SpawnInProgress,
}

/// Result of one call in an attached batch.
#[derive(Debug)]
pub struct ItemOutcome {
    pub command: MpvCommand,
    pub result: Result<(), IpcError>,
}

#[derive(Debug)]
pub enum PlayReport {
    /// Commands were sent to a running player, one outcome per call in order.
    Attached { outcomes: Vec<ItemOutcome> },
    /// A new player was launched with these media arguments.
    Spawned { media: Vec<String> },
}

impl PlayReport {
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        let outcomes: &[ItemOutcome] = match self {
            PlayReport::Attached { outcomes } => outcomes,
            PlayReport::Spawned { .. } => &[],
        };
        outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Command line for a fresh player process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub flags: Vec<String>,
    pub media: Vec<String>,
}

impl LaunchPlan {
    pub fn new(config: &PlayerConfig, endpoint: &Path, tracks: &[Track]) -> Self {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        let flags = vec![
            "--no-video".to_string(),
            "--idle".to_string(),
            format!("--cache={}", yes_no(config.cache)),
            format!("--prefetch-playlist={}", yes_no(config.prefetch_playlist)),
            format!("--demuxer-max-bytes={}", config.demuxer_max_bytes),
            format!("--demuxer-max-back-bytes={}", config.demuxer_max_back_bytes),
            platform::ipc_server_arg(endpoint),
        ];
        Self {
            flags,
            media: tracks.iter().map(|t| t.url.clone()).collect(),
        }
    }

    pub fn argv(&self) -> impl Iterator<Item = &String> {
        self.flags.iter().chain(self.media.iter())
    }
}

/// Starts player processes.
pub trait PlayerLauncher {
    /// Launch the player and return its process id.
    fn launch(&self, plan: &LaunchPlan) -> Result<u32, SessionError>;
}

/// Launches mpv fully detached: own process group, stdio discarded, never
/// waited on, so it outlives this process.
#[derive(Debug, Clone)]
pub struct MpvLauncher {
    binary: PathBuf,
}

impl MpvLauncher {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

impl PlayerLauncher for MpvLauncher {
    fn launch(&self, plan: &LaunchPlan) -> Result<u32, SessionError> {
        let mut cmd = std::process::Command::new(&self.binary);
        cmd.args(plan.argv())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        let child = cmd.spawn().map_err(SessionError::Spawn)?;
        info!(
            "session: spawned {} pid={} with {} media args",
            self.binary.display(),
            child.id(),
            plan.media.len()
        );
        Ok(child.id())
    }
}

pub struct SessionManager<C, L> {
    channel: C,
    launcher: L,
    player: PlayerConfig,
    endpoint: PathBuf,
    lock_path: PathBuf,
}

impl<C: ControlChannel, L: PlayerLauncher> SessionManager<C, L> {
    pub fn new(
        channel: C,
        launcher: L,
        player: PlayerConfig,
        endpoint: PathBuf,
        lock_path: PathBuf,
    ) -> Self {
        Self {
            channel,
            launcher,
            player,
            endpoint,
            lock_path,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    #[cfg(test)]
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Attached when the player answers, Absent when nothing listens.  Any
    /// other failure aborts the action instead of triggering a spawn.
    pub async fn probe(&self) -> Result<SessionState, SessionError> {
        match self.channel.get_property("idle-active").await {
            Ok(resp) if resp.is_success() => {
                self.release_spawn_lock();
                Ok(SessionState::Attached)
            }
            Ok(resp) => Err(SessionError::Probe(IpcError::Protocol(format!(
                "probe replied '{}'",
                resp.error
            )))),
            Err(IpcError::Absent) => Ok(SessionState::Absent),
            Err(e) => Err(SessionError::Probe(e)),
        }
    }

    /// Play `tracks` in order, replacing whatever is playing.
    pub async fn play(&self, tracks: &[Track]) -> Result<PlayReport, SessionError> {
        if tracks.is_empty() {
            return Ok(PlayReport::Attached { outcomes: Vec::new() });
        }
        match self.probe().await? {
            SessionState::Attached => Ok(self.attach(tracks).await),
            SessionState::Absent => self.spawn(tracks).await,
        }
    }

    async fn attach(&self, tracks: &[Track]) -> PlayReport {
        let mut commands = Vec::with_capacity(tracks.len() + 1);
        commands.push(MpvCommand::load(&tracks[0].url, LoadMode::Replace));
        commands.push(MpvCommand::set("pause", false));
        commands.extend(
            tracks[1..]
                .iter()
                .map(|t| MpvCommand::load(&t.url, LoadMode::Append)),
        );

        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            let result = expect_success(self.channel.call(&command).await).map(|_| ());
            if let Err(e) = &result {
                warn!("session: {:?} failed: {}", command, e);
            }
            outcomes.push(ItemOutcome { command, result });
        }
        PlayReport::Attached { outcomes }
    }

    async fn spawn(&self, tracks: &[Track]) -> Result<PlayReport, SessionError> {
        if !self.acquire_spawn_lock() {
            debug!("session: spawn lock held elsewhere, waiting for that player");
            for _ in 0..SPAWN_WAIT_STEPS {
                tokio::time::sleep(SPAWN_WAIT_STEP).await;
                if self.probe().await? == SessionState::Attached {
                    return Ok(self.attach(tracks).await);
                }
            }
            return Err(SessionError::SpawnInProgress);
        }

        let plan = LaunchPlan::new(&self.player, &self.endpoint, tracks);
        match self.launcher.launch(&plan) {
            Ok(pid) => self.hand_lock_to(pid),
            Err(e) => {
                self.release_spawn_lock();
                return Err(e);
            }
        }
        Ok(PlayReport::Spawned { media: plan.media })
    }

    /// The player now owns the lock: it stays held while that process lives
    /// and before its endpoint answers.
    fn hand_lock_to(&self, pid: u32) {
        if let Err(e) = std::fs::write(&self.lock_path, format!("{}\n", pid)) {
            warn!("session: cannot record player pid in spawn lock: {}", e);
        }
    }

    /// Drop the spawn lock after the player was told to quit.
    pub fn forget_player(&self) {
        self.release_spawn_lock();
    }

    /// Create the lock file exclusively.  A lock older than the TTL belongs
    /// to a spawn that never produced a player and is taken over.
    fn acquire_spawn_lock(&self) -> bool {
        if let Some(parent) = self.lock_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        for _ in 0..2 {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
            {
                Ok(mut f) => {
                    let _ = writeln!(f, "{}", std::process::id());
                    return true;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if !self.lock_is_stale() {
                        return false;
                    }
                    debug!("session: removing stale spawn lock");
                    let _ = std::fs::remove_file(&self.lock_path);
                }
                Err(e) => {
                    warn!("session: cannot create spawn lock, continuing without: {}", e);
                    return true;
                }
            }
        }
        false
    }

    fn lock_is_stale(&self) -> bool {
        let owner = std::fs::read_to_string(&self.lock_path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok());
        if let Some(pid) = owner {
            if !process_alive(pid) {
                debug!("session: spawn lock owner {} is gone", pid);
                return true;
            }
        }

        let age = std::fs::metadata(&self.lock_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok());
        match age {
            Some(age) => age > self.player.spawn_lock_ttl(),
            None => true,
        }
    }

    fn release_spawn_lock(&self) {
        if self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

/// Whether `pid` names a running process.  Only the TTL applies where this
/// cannot be checked.
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // kill(pid, 0) checks existence without sending a signal.
    // EPERM means the process exists but belongs to someone else.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
