//! User intents mapped onto control-channel calls and store mutations.
//!
//! Every recoverable problem (bad index, no player, player errors) ends up as
//! a printed message; only failures to write output bubble up.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use yit_proto::protocol::{LoadMode, MpvCommand, QueueEntry};
use yit_proto::resolve::TitleIndex;
use yit_proto::store::{Library, StoreError, Track, TrackStore};

use crate::mpv::{expect_success, ControlChannel, IpcError};
use crate::search::SearchProvider;
use crate::session::{PlayReport, PlayerLauncher, SessionManager};

const NO_RESULTS: &str = "No search results found. Run 'yit search <query>' first.";
const NOT_RUNNING: &str = "yit is not running.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FavAction {
    Add,
    List,
    Play,
    Remove,
}

/// Single-shot controls that need no arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Pause,
    Resume,
    Toggle,
    Stop,
    Next,
    Back,
    Replay,
    Loop,
    Unloop,
    Clear,
}

impl Control {
    fn commands(&self) -> Vec<MpvCommand> {
        match self {
            Self::Pause => vec![MpvCommand::set("pause", true)],
            Self::Resume => vec![MpvCommand::set("pause", false)],
            Self::Toggle => vec![MpvCommand::Cycle("pause".into())],
            Self::Stop => vec![MpvCommand::Quit],
            Self::Next => vec![MpvCommand::PlaylistNext],
            Self::Back => vec![MpvCommand::PlaylistPrev],
            Self::Replay => vec![
                MpvCommand::Seek { pos: 0.0, absolute: true },
                MpvCommand::set("pause", false),
            ],
            Self::Loop => vec![MpvCommand::set("loop-file", "inf")],
            Self::Unloop => vec![MpvCommand::set("loop-file", "no")],
            Self::Clear => vec![MpvCommand::PlaylistClear],
        }
    }

    fn done_message(&self) -> &'static str {
        match self {
            Self::Pause => "Paused.",
            Self::Resume => "Resumed.",
            Self::Toggle => "Toggled playback.",
            Self::Stop => "Stopped.",
            Self::Next => "Skipping to next track...",
            Self::Back => "Going to previous track...",
            Self::Replay => "Restarting current track...",
            Self::Loop => "Looping current track.",
            Self::Unloop => "Unlooped. Playback will continue normally.",
            Self::Clear => "Queue cleared.",
        }
    }
}

/// Machine-readable player snapshot for `yit agent`.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct AgentState {
    pub status: &'static str,
    pub track: AgentTrack,
    pub position: f64,
    pub duration: f64,
    pub volume: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub queue_length: u64,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct AgentTrack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommandInfo {
    pub cmd: &'static str,
    pub usage: &'static str,
    pub desc: &'static str,
}

/// The `yit commands` listing.
pub fn command_list() -> Vec<CommandInfo> {
    [
        ("search", "yit search <query> [-p]", "Search YouTube. -p to auto-play."),
        ("play", "yit play <index>", "Play a track from results."),
        ("add", "yit add <index>", "Add a track to queue."),
        ("pause", "yit pause", "Pause playback."),
        ("resume", "yit resume", "Resume playback."),
        ("toggle", "yit toggle", "Toggle pause/resume."),
        ("stop", "yit stop", "Stop playback completely."),
        ("next", "yit next", "Skip to next track."),
        ("back", "yit back", "Go to previous track."),
        ("replay", "yit replay", "Replay current track (alias: 0)."),
        ("loop", "yit loop", "Loop current track indefinitely."),
        ("unloop", "yit unloop", "Stop looping."),
        ("queue", "yit queue", "Show current queue."),
        ("clear", "yit clear", "Clear the queue."),
        ("status", "yit status", "Show playback status (text)."),
        ("agent", "yit agent", "Get full system state (JSON)."),
        ("commands", "yit commands", "Get this list (JSON)."),
        ("fav", "yit fav [add|list|play|remove] [index]", "Manage favorites."),
    ]
    .into_iter()
    .map(|(cmd, usage, desc)| CommandInfo { cmd, usage, desc })
    .collect()
}

fn is_looping(value: Option<&Value>) -> bool {
    matches!(value.and_then(Value::as_str), Some("inf") | Some("yes"))
}

pub struct Controller<C, L, S: TrackStore, Q> {
    session: SessionManager<C, L>,
    library: Library<S>,
    search: Q,
    max_results: usize,
}

impl<C, L, S, Q> Controller<C, L, S, Q>
where
    C: ControlChannel,
    L: PlayerLauncher,
    S: TrackStore,
    Q: SearchProvider,
{
    pub fn new(
        session: SessionManager<C, L>,
        library: Library<S>,
        search: Q,
        max_results: usize,
    ) -> Self {
        Self {
            session,
            library,
            search,
            max_results,
        }
    }

    fn channel(&self) -> &C {
        self.session.channel()
    }

    fn remember(&self, track: &Track) {
        if let Err(e) = self.library.save_to_history(track) {
            warn!("history: could not save {}: {}", track.url, e);
        }
    }

    pub async fn search(
        &self,
        query: &str,
        autoplay: bool,
        out: &mut impl Write,
    ) -> anyhow::Result<()> {
        writeln!(out, "Searching for '{}'...", query)?;
        let results = match self.search.search(query, self.max_results).await {
            Ok(r) => r,
            Err(e) => {
                writeln!(out, "Search failed: {}", e)?;
                return Ok(());
            }
        };
        if results.is_empty() {
            writeln!(out, "No results found.")?;
            return Ok(());
        }

        writeln!(out, "\nResults:")?;
        for (i, track) in results.iter().enumerate() {
            writeln!(out, "{}. {}", i + 1, track.title)?;
        }
        if let Err(e) = self.library.replace_results(&results) {
            writeln!(out, "Warning: could not save results: {}", e)?;
        }

        if autoplay {
            writeln!(out, "\nAuto-playing result #1...")?;
            self.play_tracks(&results[..1], out).await?;
        }
        Ok(())
    }

    fn pick_result(&self, ordinal: usize, out: &mut impl Write) -> anyhow::Result<Option<Track>> {
        if self.library.results.load().is_empty() {
            writeln!(out, "{}", NO_RESULTS)?;
            return Ok(None);
        }
        let track = self.library.result_at(ordinal);
        if track.is_none() {
            writeln!(out, "Invalid selection number.")?;
        }
        Ok(track)
    }

    pub async fn play(&self, ordinal: usize, out: &mut impl Write) -> anyhow::Result<()> {
        if let Some(track) = self.pick_result(ordinal, out)? {
            self.play_tracks(&[track], out).await?;
        }
        Ok(())
    }

    /// Replace the queue with `tracks`, attaching to or spawning the player.
    pub async fn play_tracks(&self, tracks: &[Track], out: &mut impl Write) -> anyhow::Result<()> {
        let Some(first) = tracks.first() else {
            return Ok(());
        };
        writeln!(out, "Playing: {}", first.title)?;
        if tracks.len() > 1 {
            writeln!(out, "...and {} others queued.", tracks.len() - 1)?;
        }
        for track in tracks {
            self.remember(track);
        }

        match self.session.play(tracks).await {
            Ok(report @ PlayReport::Attached { .. }) => {
                writeln!(out, "Added to existing player.")?;
                for failed in report.failures() {
                    if let Err(e) = &failed.result {
                        writeln!(out, "  ! {:?}: {}", failed.command.to_args(), e)?;
                    }
                }
            }
            Ok(PlayReport::Spawned { .. }) => writeln!(out, "Player started in background.")?,
            Err(e) => writeln!(out, "Could not start playback: {}", e)?,
        }
        Ok(())
    }

    pub async fn add(&self, ordinal: usize, out: &mut impl Write) -> anyhow::Result<()> {
        let Some(track) = self.pick_result(ordinal, out)? else {
            return Ok(());
        };
        writeln!(out, "Adding to queue: {}", track.title)?;
        self.remember(&track);

        let appended = self
            .channel()
            .call(&MpvCommand::load(&track.url, LoadMode::AppendPlay))
            .await;
        match appended {
            Ok(resp) if resp.is_success() => writeln!(out, "Added to queue.")?,
            _ => {
                writeln!(out, "Player not running (or append failed), starting new queue...")?;
                self.play_tracks(&[track], out).await?;
            }
        }
        Ok(())
    }

    pub async fn control(&self, control: Control, out: &mut impl Write) -> anyhow::Result<()> {
        for cmd in control.commands() {
            match expect_success(self.channel().call(&cmd).await) {
                Ok(_) => {}
                Err(IpcError::Absent) => {
                    writeln!(out, "{}", NOT_RUNNING)?;
                    return Ok(());
                }
                Err(e) => {
                    writeln!(out, "Error communicating with player: {}", e)?;
                    return Ok(());
                }
            }
        }
        if control == Control::Stop {
            self.session.forget_player();
        }
        writeln!(out, "{}", control.done_message())?;
        Ok(())
    }

    pub async fn queue(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let playlist = match self.channel().get_property("playlist").await {
            Ok(resp) if resp.is_success() => resp.data.unwrap_or(Value::Null),
            _ => {
                writeln!(out, "Queue is empty (or player not running).")?;
                return Ok(());
            }
        };
        let entries: Vec<QueueEntry> = match playlist {
            Value::Null => Vec::new(),
            other => match serde_json::from_value(other) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("queue: unexpected playlist shape: {}", e);
                    writeln!(out, "Error communicating with player: unexpected playlist data")?;
                    return Ok(());
                }
            },
        };
        if entries.is_empty() {
            writeln!(out, "Queue is empty.")?;
            return Ok(());
        }

        let index = TitleIndex::build(&self.library.results.load(), &self.library.history.load());
        writeln!(out, "\nCurrent Queue:")?;
        for (i, entry) in entries.iter().enumerate() {
            let prefix = if entry.current { "-> " } else { "   " };
            writeln!(out, "{}{}. {}", prefix, i + 1, index.resolve(entry))?;
        }
        Ok(())
    }

    pub async fn status(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let title = self
            .channel()
            .property("media-title")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|t| !t.is_empty());

        let Some(title) = title else {
            let idle = self.channel().get_property("idle-active").await;
            if idle.is_ok() {
                writeln!(out, "Queue is empty.")?;
            } else {
                writeln!(out, "{}", NOT_RUNNING)?;
            }
            return Ok(());
        };

        let paused = self.channel().property("pause").await.and_then(|v| v.as_bool());
        let looping = is_looping(self.channel().property("loop-file").await.as_ref());

        let mut status = String::from(if paused == Some(true) { "[Paused]" } else { "[Playing]" });
        if looping {
            status.push_str(" [Looped]");
        }
        writeln!(out, "{} {}", status, title)?;
        Ok(())
    }

    pub async fn agent_state(&self) -> AgentState {
        let mut state = AgentState {
            status: "stopped",
            ..Default::default()
        };
        if self.channel().get_property("idle-active").await.is_err() {
            return state;
        }

        let ch = self.channel();
        match ch.property("pause").await.and_then(|v| v.as_bool()) {
            Some(true) => state.status = "paused",
            Some(false) => state.status = "playing",
            None => {}
        }
        state.track.title = ch
            .property("media-title")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty());
        state.track.url = ch
            .property("path")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty());
        state.position = ch.property("time-pos").await.and_then(|v| v.as_f64()).unwrap_or(0.0);
        state.duration = ch.property("duration").await.and_then(|v| v.as_f64()).unwrap_or(0.0);
        state.volume = ch.property("volume").await.and_then(|v| v.as_f64()).unwrap_or(0.0);
        state.looping = is_looping(ch.property("loop-file").await.as_ref());
        state.queue_length = ch
            .property("playlist-count")
            .await
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        state
    }

    pub async fn agent(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let state = self.agent_state().await;
        writeln!(out, "{}", serde_json::to_string_pretty(&state)?)?;
        Ok(())
    }

    pub async fn fav(
        &self,
        action: FavAction,
        target: Option<&str>,
        out: &mut impl Write,
    ) -> anyhow::Result<()> {
        let ordinal = match target.map(|t| t.trim().parse::<usize>()) {
            None => None,
            Some(Ok(n)) => Some(n),
            Some(Err(_)) => {
                writeln!(out, "Invalid index (must be a number).")?;
                return Ok(());
            }
        };

        match action {
            FavAction::List => self.fav_list(out),
            FavAction::Add => self.fav_add(ordinal, out).await,
            FavAction::Remove => self.fav_remove(ordinal, out),
            FavAction::Play => self.fav_play(ordinal, out).await,
        }
    }

    fn fav_list(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let favs = self.library.favorites();
        if favs.is_empty() {
            writeln!(out, "No favorites yet.")?;
            return Ok(());
        }
        writeln!(out, "\nFavorites:")?;
        for (i, track) in favs.iter().enumerate() {
            writeln!(out, "{}. {}", i + 1, track.title)?;
        }
        Ok(())
    }

    async fn fav_add(&self, ordinal: Option<usize>, out: &mut impl Write) -> anyhow::Result<()> {
        let track = match ordinal {
            Some(n) => match self.pick_result(n, out)? {
                Some(t) => t,
                None => return Ok(()),
            },
            None => {
                let url = self.channel().property("path").await;
                let title = self.channel().property("media-title").await;
                match (
                    url.as_ref().and_then(Value::as_str).filter(|s| !s.is_empty()),
                    title.as_ref().and_then(Value::as_str).filter(|s| !s.is_empty()),
                ) {
                    (Some(url), Some(title)) => Track::new(title, url),
                    _ => {
                        writeln!(
                            out,
                            "No track selected or playing. Specify an index from search results or play a song first."
                        )?;
                        return Ok(());
                    }
                }
            }
        };

        self.remember(&track);
        match self.library.add_favorite(&track) {
            Ok(true) => writeln!(out, "Added to favorites: {}", track.title)?,
            Ok(false) => writeln!(out, "Already in favorites: {}", track.title)?,
            Err(e) => writeln!(out, "Could not save favorites: {}", e)?,
        }
        Ok(())
    }

    fn fav_remove(&self, ordinal: Option<usize>, out: &mut impl Write) -> anyhow::Result<()> {
        let Some(ordinal) = ordinal else {
            writeln!(out, "Specify an index to remove (run 'yit fav list').")?;
            return Ok(());
        };
        let Some(index) = ordinal.checked_sub(1) else {
            writeln!(out, "Invalid index.")?;
            return Ok(());
        };
        match self.library.remove_favorite(index) {
            Ok(removed) => writeln!(out, "Removed: {}", removed.title)?,
            Err(StoreError::IndexOutOfRange { .. }) => writeln!(out, "Invalid index.")?,
            Err(e) => writeln!(out, "Could not save favorites: {}", e)?,
        }
        Ok(())
    }

    async fn fav_play(&self, ordinal: Option<usize>, out: &mut impl Write) -> anyhow::Result<()> {
        let favs = self.library.favorites();
        if favs.is_empty() {
            writeln!(out, "No favorites to play.")?;
            return Ok(());
        }
        match ordinal {
            Some(n) => match self.library.favorite_at(n) {
                Some(track) => self.play_tracks(&[track], out).await,
                None => {
                    writeln!(out, "Invalid index.")?;
                    Ok(())
                }
            },
            None => {
                writeln!(out, "Playing all {} favorites...", favs.len())?;
                self.play_tracks(&favs, out).await
            }
        }
    }
}
