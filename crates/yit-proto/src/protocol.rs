//! Wire types for the player's JSON-line control channel.
//!
//! One request per connection: `{"command": [verb, args...]}\n` out,
//! `{"error": "success", "data": ...}\n` back.  There are no request ids.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// How `loadfile` places a URL into the player's playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Replace,
    Append,
    AppendPlay,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Append => "append",
            Self::AppendPlay => "append-play",
        }
    }
}

/// Commands understood by the player.
#[derive(Debug, Clone, PartialEq)]
pub enum MpvCommand {
    GetProperty(String),
    SetProperty(String, Value),
    Cycle(String),
    LoadFile { url: String, mode: LoadMode },
    PlaylistNext,
    PlaylistPrev,
    PlaylistClear,
    Seek { pos: f64, absolute: bool },
    Quit,
}

impl MpvCommand {
    pub fn get(prop: &str) -> Self {
        Self::GetProperty(prop.to_string())
    }

    pub fn set(prop: &str, value: impl Into<Value>) -> Self {
        Self::SetProperty(prop.to_string(), value.into())
    }

    pub fn load(url: &str, mode: LoadMode) -> Self {
        Self::LoadFile {
            url: url.to_string(),
            mode,
        }
    }

    /// The positional `command` array.
    pub fn to_args(&self) -> Value {
        match self {
            Self::GetProperty(p) => json!(["get_property", p]),
            Self::SetProperty(p, v) => json!(["set_property", p, v]),
            Self::Cycle(p) => json!(["cycle", p]),
            Self::LoadFile { url, mode } => json!(["loadfile", url, mode.as_str()]),
            Self::PlaylistNext => json!(["playlist-next"]),
            Self::PlaylistPrev => json!(["playlist-prev"]),
            Self::PlaylistClear => json!(["playlist-clear"]),
            Self::Seek { pos, absolute } => {
                if *absolute {
                    json!(["seek", pos, "absolute"])
                } else {
                    json!(["seek", pos])
                }
            }
            Self::Quit => json!(["quit"]),
        }
    }

    /// Serialise as a single newline-terminated request line.
    pub fn encode_line(&self) -> serde_json::Result<String> {
        let mut raw = serde_json::to_string(&json!({ "command": self.to_args() }))?;
        raw.push('\n');
        Ok(raw)
    }
}

/// Reply to a single command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpvResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl MpvResponse {
    pub fn success(data: Option<Value>) -> Self {
        Self {
            error: "success".to_string(),
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error == "success"
    }

    pub fn data_str(&self) -> Option<&str> {
        self.data.as_ref()?.as_str()
    }

    pub fn data_bool(&self) -> Option<bool> {
        self.data.as_ref()?.as_bool()
    }

    pub fn data_f64(&self) -> Option<f64> {
        self.data.as_ref()?.as_f64()
    }
}

/// One item of the player's `playlist` property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// URL or path the player was given; the only reliable join key.
    #[serde(default, rename = "filename")]
    pub url_or_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub current: bool,
}
