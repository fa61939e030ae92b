use serde::{Deserialize, Serialize};

/// Auto-advance policy when a track reaches its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "repeat off",
            Self::All => "repeat all",
            Self::One => "repeat one",
        }
    }
}

/// One playable catalog entry. Identity is `id`; two tracks with the same
/// id are the same track as far as playlist membership is concerned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub src: String,
    #[serde(default)]
    pub cover: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    #[serde(default = "default_saved_volume")]
    pub saved_volume: f32,
    #[serde(default = "default_search_limit")]
    pub search_limit: u8,
    #[serde(default)]
    pub search_endpoint: Option<String>,
}

fn default_saved_volume() -> f32 {
    1.0
}

fn default_search_limit() -> u8 {
    12
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            repeat_mode: RepeatMode::Off,
            saved_volume: default_saved_volume(),
            search_limit: default_search_limit(),
            search_endpoint: None,
        }
    }
}
