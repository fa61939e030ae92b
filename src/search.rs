use crate::model::Track;
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://discoveryprovider.audius.co";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the public Audius discovery provider. One GET per call,
/// no retries; a non-success status is surfaced once as an error.
pub struct SearchClient {
    http: reqwest::blocking::Client,
    endpoint: String,
}

impl SearchClient {
    pub fn new(endpoint: Option<&str>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build catalog http client")?;
        let endpoint = endpoint
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        Ok(Self { http, endpoint })
    }

    pub fn search_tracks(&self, query: &str, limit: u8) -> Result<Vec<Track>> {
        let url = format!("{}/v1/tracks/search", self.endpoint);
        let limit = limit.to_string();
        let body = self.fetch(&url, &[("query", query), ("limit", &limit)])?;
        Ok(normalize_results(&body, &self.endpoint))
    }

    pub fn trending(&self, limit: u8) -> Result<Vec<Track>> {
        let url = format!("{}/v1/tracks/trending", self.endpoint);
        let limit = limit.to_string();
        let body = self.fetch(&url, &[("limit", &limit)])?;
        Ok(normalize_results(&body, &self.endpoint))
    }

    fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .with_context(|| format!("catalog request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("catalog request to {url} failed: {status}");
        }
        response
            .json()
            .context("failed to parse catalog response body")
    }
}

/// Maps a catalog response (a `data` array or a bare array) into tracks.
/// Entries without a usable id are dropped.
pub fn normalize_results(body: &Value, endpoint: &str) -> Vec<Track> {
    let entries = body
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| body.as_array());
    let Some(entries) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| normalize_track(entry, endpoint))
        .collect()
}

fn normalize_track(entry: &Value, endpoint: &str) -> Option<Track> {
    let id = value_as_id(entry.get("id")?)?;
    let title = entry
        .get("title")
        .or_else(|| entry.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Track {id}"));
    let artist = pick_artist(entry);
    let src = pick_stream_url(entry, &id, endpoint);
    let cover = pick_artwork(entry);

    Some(Track {
        id,
        title,
        artist,
        src,
        cover,
    })
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn pick_artist(entry: &Value) -> String {
    let user = entry.get("user");
    user.and_then(|user| user.get("name"))
        .or_else(|| user.and_then(|user| user.get("handle")))
        .or_else(|| entry.get("owner").and_then(|owner| owner.get("name")))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

fn pick_stream_url(entry: &Value, id: &str, endpoint: &str) -> String {
    if let Some(url) = entry.get("stream_url").and_then(Value::as_str) {
        return url.to_string();
    }
    if let Some(url) = entry.get("download").and_then(Value::as_str) {
        return url.to_string();
    }
    format!("{endpoint}/v1/tracks/{id}/stream")
}

/// Artwork shows up in several shapes across catalog versions; take the
/// first usable one, falling back to the uploader's avatar.
fn pick_artwork(entry: &Value) -> String {
    if let Some(artwork) = entry.get("artwork") {
        if let Some(url) = artwork.as_str().filter(|url| !url.is_empty()) {
            return url.to_string();
        }
        for size in ["150x150", "200x200"] {
            if let Some(url) = artwork.get(size).and_then(Value::as_str) {
                return url.to_string();
            }
        }
        if let Some(url) = artwork
            .get("sizes")
            .and_then(|sizes| sizes.get(0))
            .and_then(Value::as_str)
        {
            return url.to_string();
        }
    }
    if let Some(url) = entry.get("cover_art").and_then(Value::as_str) {
        return url.to_string();
    }
    if let Some(url) = entry
        .get("cover_art_sizes")
        .and_then(|sizes| sizes.get("150x150"))
        .and_then(Value::as_str)
    {
        return url.to_string();
    }
    entry
        .get("user")
        .and_then(|user| user.get("avatar"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug)]
pub enum SearchCommand {
    Query {
        generation: u64,
        text: String,
        limit: u8,
    },
    Trending {
        generation: u64,
        limit: u8,
    },
    Shutdown,
}

#[derive(Debug)]
pub enum SearchEvent {
    Results {
        generation: u64,
        tracks: Vec<Track>,
    },
    Failed {
        generation: u64,
        message: String,
    },
}

/// Owns the catalog client on its own thread so the event loop never
/// blocks on the network. Responses carry the request's generation; the
/// caller drops events from superseded requests.
pub struct SearchWorker {
    cmd_tx: Sender<SearchCommand>,
    event_rx: Receiver<SearchEvent>,
}

impl SearchWorker {
    pub fn spawn(endpoint: Option<&str>) -> Result<Self> {
        let client = SearchClient::new(endpoint)?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        thread::spawn(move || worker_loop(client, cmd_rx, event_tx));
        Ok(Self { cmd_tx, event_rx })
    }

    pub fn submit(&self, command: SearchCommand) {
        let _ = self.cmd_tx.send(command);
    }

    pub fn try_recv_event(&self) -> Option<SearchEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(SearchCommand::Shutdown);
    }
}

fn worker_loop(
    client: SearchClient,
    cmd_rx: Receiver<SearchCommand>,
    event_tx: Sender<SearchEvent>,
) {
    while let Ok(command) = cmd_rx.recv() {
        let (generation, outcome) = match command {
            SearchCommand::Shutdown => return,
            SearchCommand::Query {
                generation,
                text,
                limit,
            } => (generation, client.search_tracks(&text, limit)),
            SearchCommand::Trending { generation, limit } => (generation, client.trending(limit)),
        };

        let event = match outcome {
            Ok(tracks) => SearchEvent::Results { generation, tracks },
            Err(err) => SearchEvent::Failed {
                generation,
                message: format!("{err:#}"),
            },
        };
        if event_tx.send(event).is_err() {
            return;
        }
    }
}
