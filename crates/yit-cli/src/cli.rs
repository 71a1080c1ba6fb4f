use clap::{Parser, Subcommand};

use crate::commands::{Control, FavAction};

/// Fire-and-forget music player: search, queue and control a background mpv.
#[derive(Debug, Parser)]
#[command(name = "yit", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Search YouTube and remember the results
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Auto-play the first result
        #[arg(short, long)]
        play: bool,
    },
    /// Play a track by its number in the last search
    Play { number: usize },
    /// Append a track from the last search to the queue
    Add { number: usize },
    /// Pause playback
    #[command(alias = "p")]
    Pause,
    /// Resume playback
    #[command(alias = "r")]
    Resume,
    /// Toggle pause/resume
    Toggle,
    /// Stop playback and quit the player
    Stop,
    /// Next track
    #[command(alias = "n")]
    Next,
    /// Previous track
    #[command(alias = "b")]
    Back,
    /// Replay current track
    #[command(alias = "0")]
    Replay,
    /// Loop current track
    Loop,
    /// Stop looping
    Unloop,
    /// Show queue
    Queue,
    /// Clear queue
    Clear,
    /// Show status
    Status,
    /// JSON state for scripts and agents
    Agent,
    /// JSON command list for scripts and agents
    Commands,
    /// Manage favorites
    Fav {
        #[arg(value_enum, default_value_t = FavAction::List)]
        action: FavAction,
        /// Index (for add/play/remove)
        target: Option<String>,
    },
}

impl Cmd {
    pub fn control(&self) -> Option<Control> {
        Some(match self {
            Cmd::Pause => Control::Pause,
            Cmd::Resume => Control::Resume,
            Cmd::Toggle => Control::Toggle,
            Cmd::Stop => Control::Stop,
            Cmd::Next => Control::Next,
            Cmd::Back => Control::Back,
            Cmd::Replay => Control::Replay,
            Cmd::Loop => Control::Loop,
            Cmd::Unloop => Control::Unloop,
            Cmd::Clear => Control::Clear,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_joins_words() {
        let cli = Cli::try_parse_from(["yit", "search", "daft", "punk", "-p"]).unwrap();
        match cli.command {
            Cmd::Search { query, play } => {
                assert_eq!(query.join(" "), "daft punk");
                assert!(play);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_aliases() {
        let cli = Cli::try_parse_from(["yit", "0"]).unwrap();
        assert_eq!(cli.command.control(), Some(Control::Replay));
        let cli = Cli::try_parse_from(["yit", "n"]).unwrap();
        assert_eq!(cli.command.control(), Some(Control::Next));
    }

    #[test]
    fn test_fav_defaults_to_list() {
        let cli = Cli::try_parse_from(["yit", "fav"]).unwrap();
        assert!(matches!(cli.command, Cmd::Fav { action: FavAction::List, target: None }));

        let cli = Cli::try_parse_from(["yit", "fav", "remove", "2"]).unwrap();
        match cli.command {
            Cmd::Fav { action, target } => {
                assert_eq!(action, FavAction::Remove);
                assert_eq!(target.as_deref(), Some("2"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_play_needs_number() {
        assert!(Cli::try_parse_from(["yit", "play"]).is_err());
        assert!(Cli::try_parse_from(["yit", "play", "two"]).is_err());
    }
}
