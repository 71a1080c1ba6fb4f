mod cli;
mod commands;
mod mpv;
mod search;
mod session;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use yit_proto::config::Config;
use yit_proto::platform;
use yit_proto::store::{Library, TrackStore};
use yit_proto::update;

use cli::{Cli, Cmd};
use commands::{command_list, Controller};
use mpv::{ControlChannel, MpvClient};
use search::{SearchProvider, YtDlpSearch};
use session::{MpvLauncher, PlayerLauncher, SessionManager};

/// How long a finished command waits for the background update check.
const UPDATE_GRACE: Duration = Duration::from_millis(500);

fn init_logging() -> anyhow::Result<()> {
    std::fs::create_dir_all(platform::data_dir())?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(platform::log_file())?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,yit=debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("yit: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Err(e) = init_logging() {
        eprintln!("yit: logging disabled: {}", e);
    }
    info!("yit {} starting: {:?}", env!("CARGO_PKG_VERSION"), cli.command);

    let mut out = std::io::stdout().lock();

    if matches!(cli.command, Cmd::Commands) {
        writeln!(out, "{}", serde_json::to_string_pretty(&command_list())?)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load().unwrap_or_else(|e| {
        warn!("config: load failed, using defaults: {}", e);
        Config::default()
    });

    let update_path = platform::update_file();
    show_update_notice(&cli.command, &update_path, &mut std::io::stderr())?;
    let update_config = config.update.clone();
    let update_task = tokio::spawn(async move {
        update::check_for_updates(&update_config, &update_path).await;
    });

    let Some(mpv_binary) = platform::find_mpv_binary(config.player.binary.as_deref()) else {
        eprintln!("yit: mpv not found. Install mpv (https://mpv.io) or set YIT_MPV_PATH.");
        return Ok(ExitCode::FAILURE);
    };
    info!("mpv binary: {}", mpv_binary.display());

    let endpoint = platform::ipc_endpoint();
    let session = SessionManager::new(
        MpvClient::new(endpoint.clone(), config.player.ipc_timeout()),
        MpvLauncher::new(mpv_binary),
        config.player.clone(),
        endpoint,
        platform::spawn_lock_file(),
    );
    let controller = Controller::new(
        session,
        Library::open_default(),
        YtDlpSearch::new(platform::find_yt_dlp_binary(config.search.binary.as_deref())),
        config.search.max_results,
    );

    dispatch(&controller, cli.command, &mut out).await?;
    out.flush()?;

    let _ = tokio::time::timeout(UPDATE_GRACE, update_task).await;
    Ok(ExitCode::SUCCESS)
}

/// Print the cached "newer version" hint on stderr.  Skipped for the JSON
/// commands so their output stays machine-readable.
fn show_update_notice(
    command: &Cmd,
    cache_path: &Path,
    err: &mut impl Write,
) -> std::io::Result<()> {
    if matches!(command, Cmd::Agent | Cmd::Commands) {
        return Ok(());
    }
    if let Some(notice) = update::update_notice(cache_path, env!("CARGO_PKG_VERSION")) {
        writeln!(err, "\x1b[93m{}\x1b[0m", notice)?;
    }
    Ok(())
}

async fn dispatch<C, L, S, Q>(
    controller: &Controller<C, L, S, Q>,
    command: Cmd,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    C: ControlChannel,
    L: PlayerLauncher,
    S: TrackStore,
    Q: SearchProvider,
{
    if let Some(control) = command.control() {
        return controller.control(control, out).await;
    }
    match command {
        Cmd::Search { query, play } => controller.search(&query.join(" "), play, out).await,
        Cmd::Play { number } => controller.play(number, out).await,
        Cmd::Add { number } => controller.add(number, out).await,
        Cmd::Queue => controller.queue(out).await,
        Cmd::Status => controller.status(out).await,
        Cmd::Agent => controller.agent(out).await,
        Cmd::Fav { action, target } => controller.fav(action, target.as_deref(), out).await,
        Cmd::Commands => {
            writeln!(out, "{}", serde_json::to_string_pretty(&command_list())?)?;
            Ok(())
        }
        // Handled by `control()` above.
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{manager, RecordingChannel, RecordingLauncher};
    use serde_json::json;
    use yit_proto::update::UpdateCache;

    fn newer_version_cached(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("update.json");
        UpdateCache {
            last_checked: 0.0,
            latest_version: "999.0.0".into(),
        }
        .save(&path)
        .unwrap();
        path
    }

    #[test]
    fn test_update_notice_goes_to_stderr_for_text_commands() {
        let dir = tempfile::tempdir().unwrap();
        let cache = newer_version_cached(dir.path());
        let mut err = Vec::new();
        show_update_notice(&Cmd::Status, &cache, &mut err).unwrap();
        assert!(String::from_utf8(err).unwrap().contains("999.0.0"));
    }

    #[tokio::test]
    async fn test_agent_output_is_pure_json_with_update_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = newer_version_cached(dir.path());

        let mut err = Vec::new();
        show_update_notice(&Cmd::Agent, &cache, &mut err).unwrap();
        assert!(err.is_empty());

        let channel = RecordingChannel::attached()
            .with_property("pause", json!(false))
            .with_property("media-title", json!("Song"));
        let controller = Controller::new(
            manager(channel, RecordingLauncher::default(), dir.path()),
            Library::in_memory(),
            YtDlpSearch::new(None),
            5,
        );
        let mut out = Vec::new();
        dispatch(&controller, Cmd::Agent, &mut out).await.unwrap();

        let state: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(state["status"], "playing");
        assert_eq!(state["track"]["title"], "Song");
    }
}
