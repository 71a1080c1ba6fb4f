use std::path::{Path, PathBuf};

/// Name of the named pipe (Windows) the player listens on.
#[cfg(windows)]
const PIPE_NAME: &str = "yit_socket";

/// Everything yit persists lives here: track documents, the update cache,
/// the log file, the spawn lock and (on Unix) the control socket.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".yit")
}

pub fn config_dir() -> PathBuf {
    // On macOS and Linux, always use ~/.config/yit/
    // (avoid macOS Application Support folder for consistency)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("yit")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("yit")
    }
}

pub fn results_file() -> PathBuf {
    data_dir().join("results.json")
}

pub fn history_file() -> PathBuf {
    data_dir().join("history.json")
}

pub fn favorites_file() -> PathBuf {
    data_dir().join("favorites.json")
}

pub fn update_file() -> PathBuf {
    data_dir().join("update.json")
}

pub fn spawn_lock_file() -> PathBuf {
    data_dir().join("spawn.lock")
}

pub fn log_file() -> PathBuf {
    data_dir().join("yit.log")
}

/// The control channel endpoint.  Fixed per platform family, never configured.
#[cfg(unix)]
pub fn ipc_endpoint() -> PathBuf {
    data_dir().join("socket")
}

#[cfg(windows)]
pub fn ipc_endpoint() -> PathBuf {
    PathBuf::from(format!(r"\\.\pipe\{}", PIPE_NAME))
}

pub fn ipc_server_arg(endpoint: &Path) -> String {
    format!("--input-ipc-server={}", endpoint.display())
}

#[cfg(unix)]
fn mpv_binary_names() -> &'static [&'static str] {
    &["mpv"]
}

#[cfg(windows)]
fn mpv_binary_names() -> &'static [&'static str] {
    &["mpv.exe", "mpv"]
}

#[cfg(unix)]
fn yt_dlp_binary_names() -> &'static [&'static str] {
    &["yt-dlp"]
}

#[cfg(windows)]
fn yt_dlp_binary_names() -> &'static [&'static str] {
    &["yt-dlp.exe", "yt-dlp"]
}

fn find_beside_exe(names: &[&str]) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    for name in names {
        let p = dir.join(name);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        for name in names {
            let p = dir.join(name);
            if p.is_file() {
                return Some(p);
            }
        }
    }
    None
}

fn find_binary(explicit: Option<&Path>, env_var: &str, names: &[&str]) -> Option<PathBuf> {
    // 1. Explicit path from config
    if let Some(p) = explicit {
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }

    // 2. Environment variable override
    if let Ok(p) = std::env::var(env_var) {
        let p = PathBuf::from(p);
        if p.exists() {
            return Some(p);
        }
    }

    // 3. Beside executable
    if let Some(p) = find_beside_exe(names) {
        return Some(p);
    }

    // 4. PATH
    find_on_path(names)
}

/// Find the mpv binary used as the background player.
///
/// Searches in order: `explicit` (from config), `YIT_MPV_PATH`, beside the
/// current executable, then PATH.
pub fn find_mpv_binary(explicit: Option<&Path>) -> Option<PathBuf> {
    find_binary(explicit, "YIT_MPV_PATH", mpv_binary_names())
}

/// Find the yt-dlp binary used for searching.
///
/// Searches in order: `explicit` (from config), `YT_DLP_PATH`, beside the
/// current executable, then PATH.
pub fn find_yt_dlp_binary(explicit: Option<&Path>) -> Option<PathBuf> {
    find_binary(explicit, "YT_DLP_PATH", yt_dlp_binary_names())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_live_in_data_dir() {
        let dir = data_dir();
        assert!(dir.ends_with(".yit"));
        assert_eq!(results_file().parent(), Some(dir.as_path()));
        assert_eq!(history_file().parent(), Some(dir.as_path()));
        assert_eq!(favorites_file().parent(), Some(dir.as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_ipc_server_arg() {
        let arg = ipc_server_arg(Path::new("/home/u/.yit/socket"));
        assert_eq!(arg, "--input-ipc-server=/home/u/.yit/socket");
    }

    #[test]
    fn test_explicit_binary_wins() {
        let exe = std::env::current_exe().unwrap();
        assert_eq!(find_mpv_binary(Some(&exe)), Some(exe));
    }
}
