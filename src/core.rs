use crate::model::{PersistedState, RepeatMode, Track};
use crate::playlist::{TrackList, TraversalIndex};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::time::Duration;

/// Backward within the first four seconds moves to the predecessor;
/// past that it restarts the current track.
pub const RESTART_THRESHOLD: Duration = Duration::from_secs(4);

/// What the presentation binding must do to the physical audio handle
/// after a transition. One directive per input event; no listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    None,
    /// Point the audio handle at a new source.
    Load { src: String, autoplay: bool },
    /// Seek the current source back to zero.
    Restart { autoplay: bool },
    Resume,
    Pause,
    /// Stop playback and release the source.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Empty,
    Ready,
    Playing,
}

#[derive(Debug)]
pub struct PlayerCore {
    pub playlist: TrackList,
    /// Pre-shuffle ordering, kept while shuffle is on so toggle-off can
    /// restore it. Mutations while shuffled are mirrored into it.
    original: Vec<Track>,
    links: TraversalIndex,
    pub current: Option<usize>,
    pub playing: bool,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub volume: f32,
    pub search_limit: u8,
    pub search_endpoint: Option<String>,
    pub status: String,
    pub dirty: bool,
    rng: SmallRng,
}

impl PlayerCore {
    pub fn from_persisted(state: PersistedState) -> Self {
        let playlist = TrackList::new(state.tracks);
        let links = TraversalIndex::from_len(playlist.len());
        let current = (!playlist.is_empty()).then_some(0);
        Self {
            playlist,
            original: Vec::new(),
            links,
            current,
            playing: false,
            shuffle: false,
            repeat: state.repeat_mode,
            volume: state.saved_volume.clamp(0.0, 1.0),
            search_limit: state.search_limit,
            search_endpoint: state.search_endpoint,
            status: String::from("Ready"),
            dirty: true,
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Canonical ordering is persisted: the pre-shuffle baseline while
    /// shuffle is on, the live order otherwise.
    pub fn persisted_state(&self) -> PersistedState {
        let tracks = if self.shuffle {
            self.original.clone()
        } else {
            self.playlist.tracks().to_vec()
        };
        PersistedState {
            tracks,
            repeat_mode: self.repeat,
            saved_volume: self.volume,
            search_limit: self.search_limit,
            search_endpoint: self.search_endpoint.clone(),
        }
    }

    pub fn state(&self) -> PlayerState {
        match self.current {
            None => PlayerState::Empty,
            Some(_) if self.playing => PlayerState::Playing,
            Some(_) => PlayerState::Ready,
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.playlist.at(self.current?)
    }

    pub fn toggle_play(&mut self) -> Directive {
        if self.current_track().is_none() {
            return Directive::None;
        }

        if self.playing {
            self.playing = false;
            self.set_status("Paused");
            Directive::Pause
        } else {
            self.playing = true;
            self.set_status("Playing");
            Directive::Resume
        }
    }

    /// The media handle reported that the current source ran to its end.
    pub fn handle_track_end(&mut self) -> Directive {
        let Some(current) = self.current else {
            return Directive::None;
        };

        match self.repeat {
            RepeatMode::One => {
                self.playing = true;
                self.dirty = true;
                Directive::Restart { autoplay: true }
            }
            RepeatMode::Off => match self.links.successor_of(current) {
                Some(next) => {
                    self.current = Some(next);
                    self.playing = true;
                    self.load_current(true)
                }
                None => {
                    self.playing = false;
                    self.set_status("End of playlist");
                    Directive::Pause
                }
            },
            RepeatMode::All => {
                self.current = Some(self.links.successor_of(current).unwrap_or(0));
                self.playing = true;
                self.load_current(true)
            }
        }
    }

    /// Manual forward. Inert at the tail unless repeat-all wraps.
    pub fn forward(&mut self) -> Directive {
        let Some(current) = self.current else {
            return Directive::None;
        };

        let next = match self.links.successor_of(current) {
            Some(next) => next,
            None if self.repeat == RepeatMode::All => 0,
            None => return Directive::None,
        };

        self.current = Some(next);
        self.playing = true;
        self.load_current(true)
    }

    /// Manual backward. Restarts the current track once it has played for
    /// `RESTART_THRESHOLD`; otherwise moves to the predecessor, keeping
    /// whatever play/pause intent was active.
    pub fn backward(&mut self, elapsed: Duration) -> Directive {
        let Some(current) = self.current else {
            return Directive::None;
        };

        if elapsed >= RESTART_THRESHOLD {
            self.dirty = true;
            return Directive::Restart {
                autoplay: self.playing,
            };
        }

        let previous = match self.links.predecessor_of(current) {
            Some(previous) => previous,
            None if self.repeat == RepeatMode::All && !self.playlist.is_empty() => {
                self.playlist.len() - 1
            }
            None => return Directive::None,
        };

        self.current = Some(previous);
        let autoplay = self.playing;
        self.load_current(autoplay)
    }

    /// Direct selection from the playlist view.
    pub fn select_track(&mut self, id: &str) -> Directive {
        let Some(position) = self.playlist.index_of_id(id) else {
            self.set_status("Track is not in the playlist");
            return Directive::None;
        };

        self.current = Some(position);
        self.playing = true;
        self.load_current(true)
    }

    /// Shuffle on pins the active track at the head of a fresh permutation;
    /// shuffle off restores the pre-shuffle order and reselects the active
    /// track by id, falling back to the head when that id is gone.
    pub fn toggle_shuffle(&mut self) -> Directive {
        if self.playlist.is_empty() {
            self.set_status("Nothing to shuffle");
            return Directive::None;
        }

        if !self.shuffle {
            self.original = self.playlist.tracks().to_vec();
            let order = self.playlist.shuffled(&mut self.rng, self.current);
            self.playlist.replace(order);
            self.rebuild_links();
            if self.current.is_some() {
                self.current = Some(0);
            }
            self.shuffle = true;
            self.set_status("Shuffle on");
            return Directive::None;
        }

        let active_id = self.current_track().map(|track| track.id.clone());
        let restored = std::mem::take(&mut self.original);
        self.playlist.replace(restored);
        self.rebuild_links();
        self.shuffle = false;
        self.set_status("Shuffle off");

        match active_id.and_then(|id| self.playlist.index_of_id(&id)) {
            Some(position) => {
                // Same track keeps playing; only the ordering changed.
                self.current = Some(position);
                Directive::None
            }
            None => {
                self.current = (!self.playlist.is_empty()).then_some(0);
                if self.current.is_some() {
                    let autoplay = self.playing;
                    self.load_current(autoplay)
                } else {
                    self.playing = false;
                    Directive::Stop
                }
            }
        }
    }

    pub fn cycle_repeat(&mut self) {
        self.repeat = self.repeat.next();
        self.set_status(self.repeat.label());
    }

    /// Tail append; the active position never moves.
    pub fn append_track(&mut self, track: Track) {
        let title = track.title.clone();
        if self.shuffle {
            if self.playlist.index_of_id(&track.id).is_some() {
                self.set_status("Already in playlist");
                return;
            }
            self.original.push(track.clone());
        }
        if !self.playlist.append(track) {
            self.set_status("Already in playlist");
            return;
        }
        self.rebuild_links();
        if self.current.is_none() {
            // First track after empty: Ready at the head, paused.
            self.current = Some(0);
            self.playing = false;
        }
        self.set_status(&format!("Added {title}"));
    }

    pub fn remove_track(&mut self, id: &str) -> Directive {
        let Some(removed) = self.playlist.remove_by_id(id) else {
            self.set_status("Track is not in the playlist");
            return Directive::None;
        };
        if self.shuffle {
            self.original.retain(|track| track.id != id);
        }
        self.rebuild_links();
        self.set_status("Removed track");

        if self.playlist.is_empty() {
            self.current = None;
            self.playing = false;
            self.set_status("Playlist is empty");
            return Directive::Stop;
        }

        match self.current {
            Some(position) if removed < position => {
                self.current = Some(position - 1);
                Directive::None
            }
            Some(position) if removed == position => {
                self.current = Some(0);
                let autoplay = self.playing;
                self.load_current(autoplay)
            }
            _ => {
                self.reconcile();
                Directive::None
            }
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.set_status(&format!("Volume: {}%", (self.volume * 100.0).round() as u16));
    }

    /// Invariant repair: the position is always a valid index or the empty
    /// sentinel. Never an error, always a local clamp.
    pub fn reconcile(&mut self) {
        if self.playlist.is_empty() {
            self.current = None;
            self.playing = false;
            return;
        }
        if let Some(position) = self.current {
            if position >= self.playlist.len() {
                self.current = Some(self.playlist.len() - 1);
            }
        }
    }

    pub fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }

    fn rebuild_links(&mut self) {
        self.links = TraversalIndex::from_len(self.playlist.len());
        self.dirty = true;
    }

    fn load_current(&mut self, autoplay: bool) -> Directive {
        self.dirty = true;
        match self.current_track() {
            Some(track) => Directive::Load {
                src: track.src.clone(),
                autoplay,
            },
            None => Directive::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("title-{id}"),
            artist: String::from("artist"),
            src: format!("https://example.invalid/{id}/stream"),
            cover: String::new(),
        }
    }

    fn core_with(ids: &[&str]) -> PlayerCore {
        PlayerCore::from_persisted(PersistedState {
            tracks: ids.iter().map(|id| track(id)).collect(),
            ..PersistedState::default()
        })
    }

    fn load_of(directive: &Directive) -> (&str, bool) {
        match directive {
            Directive::Load { src, autoplay } => (src.as_str(), *autoplay),
            other => panic!("expected Load, got {other:?}"),
        }
    }

    #[test]
    fn toggle_play_is_inert_when_empty() {
        let mut core = core_with(&[]);
        assert_eq!(core.state(), PlayerState::Empty);
        assert_eq!(core.toggle_play(), Directive::None);
        assert!(!core.playing);
    }

    #[test]
    fn toggle_play_flips_between_ready_and_playing() {
        let mut core = core_with(&["a"]);
        assert_eq!(core.state(), PlayerState::Ready);
        assert_eq!(core.toggle_play(), Directive::Resume);
        assert_eq!(core.state(), PlayerState::Playing);
        assert_eq!(core.toggle_play(), Directive::Pause);
        assert_eq!(core.state(), PlayerState::Ready);
    }

    #[test]
    fn track_end_with_repeat_off_stops_at_the_tail() {
        let mut core = core_with(&["a", "b"]);
        core.current = Some(1);
        core.playing = true;

        assert_eq!(core.handle_track_end(), Directive::Pause);
        assert_eq!(core.current, Some(1));
        assert_eq!(core.state(), PlayerState::Ready);
    }

    #[test]
    fn track_end_with_repeat_off_advances_mid_list() {
        let mut core = core_with(&["a", "b"]);
        core.playing = true;

        let directive = core.handle_track_end();
        let (src, autoplay) = load_of(&directive);
        assert!(src.contains("/b/"));
        assert!(autoplay);
        assert_eq!(core.current, Some(1));
    }

    #[test]
    fn track_end_with_repeat_all_wraps_to_head() {
        let mut core = core_with(&["a", "b"]);
        core.repeat = RepeatMode::All;
        core.current = Some(1);
        core.playing = true;

        let directive = core.handle_track_end();
        let (src, autoplay) = load_of(&directive);
        assert!(src.contains("/a/"));
        assert!(autoplay);
        assert_eq!(core.current, Some(0));
    }

    #[test]
    fn track_end_with_repeat_one_restarts_in_place() {
        let mut core = core_with(&["a", "b"]);
        core.repeat = RepeatMode::One;
        core.playing = true;

        assert_eq!(
            core.handle_track_end(),
            Directive::Restart { autoplay: true }
        );
        assert_eq!(core.current, Some(0));
        assert!(core.playing);
    }

    #[test]
    fn forward_is_inert_at_the_tail_without_repeat_all() {
        let mut core = core_with(&["a", "b", "c"]);
        core.current = Some(1);

        core.forward();
        assert_eq!(core.current, Some(2));

        assert_eq!(core.forward(), Directive::None);
        assert_eq!(core.current, Some(2));

        assert_eq!(
            core.backward(Duration::from_secs(5)),
            Directive::Restart { autoplay: true }
        );
        assert_eq!(core.current, Some(2));
    }

    #[test]
    fn forward_wraps_under_repeat_all() {
        let mut core = core_with(&["a", "b", "c"]);
        core.repeat = RepeatMode::All;
        core.current = Some(2);

        core.forward();
        assert_eq!(core.current, Some(0));
    }

    #[test]
    fn repeat_all_forward_cycles_back_after_length_calls() {
        let mut core = core_with(&["a", "b", "c"]);
        core.repeat = RepeatMode::All;
        for _ in 0..3 {
            core.forward();
        }
        assert_eq!(core.current, Some(0));
    }

    #[test]
    fn forward_then_backward_returns_to_the_start() {
        let mut core = core_with(&["a", "b", "c"]);
        core.current = Some(1);
        core.forward();
        core.backward(Duration::from_secs(1));
        assert_eq!(core.current, Some(1));
    }

    #[test]
    fn backward_preserves_paused_intent() {
        let mut core = core_with(&["a", "b"]);
        core.current = Some(1);
        core.playing = false;

        let directive = core.backward(Duration::ZERO);
        let (_, autoplay) = load_of(&directive);
        assert!(!autoplay);
        assert!(!core.playing);
        assert_eq!(core.current, Some(0));
    }

    #[test]
    fn backward_wraps_to_tail_under_repeat_all() {
        let mut core = core_with(&["a", "b", "c"]);
        core.repeat = RepeatMode::All;

        core.backward(Duration::ZERO);
        assert_eq!(core.current, Some(2));
    }

    #[test]
    fn backward_at_head_without_repeat_all_is_inert() {
        let mut core = core_with(&["a", "b"]);
        assert_eq!(core.backward(Duration::ZERO), Directive::None);
        assert_eq!(core.current, Some(0));
    }

    #[test]
    fn select_track_sets_playing_intent() {
        let mut core = core_with(&["a", "b", "c"]);
        let directive = core.select_track("c");
        let (src, autoplay) = load_of(&directive);
        assert!(src.contains("/c/"));
        assert!(autoplay);
        assert_eq!(core.current, Some(2));
        assert!(core.playing);
    }

    #[test]
    fn shuffle_on_pins_active_track_then_off_restores_order() {
        let mut core = core_with(&["a", "b", "c", "d"]);
        core.current = Some(2);
        core.playing = true;

        assert_eq!(core.toggle_shuffle(), Directive::None);
        assert!(core.shuffle);
        assert_eq!(core.current, Some(0));
        assert_eq!(core.current_track().map(|t| t.id.as_str()), Some("c"));
        assert_eq!(core.playlist.len(), 4);

        assert_eq!(core.toggle_shuffle(), Directive::None);
        assert!(!core.shuffle);
        let ids: Vec<&str> = core
            .playlist
            .tracks()
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(core.current, Some(2));
        assert!(core.playing);
    }

    #[test]
    fn remove_while_shuffled_is_mirrored_into_the_restored_order() {
        let mut core = core_with(&["a", "b", "c"]);
        core.current = Some(1);
        core.toggle_shuffle();

        // Removing the pinned track reselects whatever lands at the head.
        core.remove_track("b");
        let active = core.current_track().map(|t| t.id.clone()).expect("active");

        assert_eq!(core.toggle_shuffle(), Directive::None);
        let ids: Vec<&str> = core
            .playlist
            .tracks()
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(core.playlist.index_of_id("b").is_none());
        assert_eq!(
            core.current_track().map(|t| t.id.clone()),
            Some(active)
        );
    }

    #[test]
    fn append_while_shuffled_survives_shuffle_off() {
        let mut core = core_with(&["a", "b"]);
        core.toggle_shuffle();
        core.append_track(track("z"));

        core.toggle_shuffle();
        let ids: Vec<&str> = core
            .playlist
            .tracks()
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "z"]);
    }

    #[test]
    fn append_to_empty_list_promotes_to_ready() {
        let mut core = core_with(&[]);
        core.append_track(track("a"));
        assert_eq!(core.state(), PlayerState::Ready);
        assert_eq!(core.current, Some(0));
        assert!(!core.playing);
    }

    #[test]
    fn append_duplicate_is_a_no_op() {
        let mut core = core_with(&["a"]);
        core.append_track(track("a"));
        assert_eq!(core.playlist.len(), 1);
        assert_eq!(core.status, "Already in playlist");
    }

    #[test]
    fn remove_before_current_shifts_position_left() {
        let mut core = core_with(&["a", "b", "c"]);
        core.current = Some(2);
        assert_eq!(core.remove_track("a"), Directive::None);
        assert_eq!(core.current, Some(1));
        assert_eq!(core.current_track().map(|t| t.id.as_str()), Some("c"));
    }

    #[test]
    fn remove_after_current_leaves_position_alone() {
        let mut core = core_with(&["a", "b", "c"]);
        core.current = Some(0);
        assert_eq!(core.remove_track("c"), Directive::None);
        assert_eq!(core.current, Some(0));
    }

    #[test]
    fn remove_active_track_reselects_head() {
        let mut core = core_with(&["a", "b", "c"]);
        core.current = Some(1);
        core.playing = true;

        let directive = core.remove_track("b");
        let (src, autoplay) = load_of(&directive);
        assert!(src.contains("/a/"));
        assert!(autoplay);
        assert_eq!(core.current, Some(0));
    }

    #[test]
    fn remove_last_remaining_track_empties_the_player() {
        let mut core = core_with(&["a"]);
        core.playing = true;
        assert_eq!(core.remove_track("a"), Directive::Stop);
        assert_eq!(core.state(), PlayerState::Empty);
        assert_eq!(core.current, None);
        assert!(!core.playing);
    }

    #[test]
    fn volume_clamps_and_rejects_non_finite() {
        let mut core = core_with(&["a"]);
        core.set_volume(1.8);
        assert_eq!(core.volume, 1.0);
        core.set_volume(-0.3);
        assert_eq!(core.volume, 0.0);
        core.set_volume(0.4);
        core.set_volume(f32::NAN);
        assert_eq!(core.volume, 0.4);
        core.set_volume(f32::INFINITY);
        assert_eq!(core.volume, 0.4);
    }

    #[test]
    fn reconcile_clamps_stale_positions() {
        let mut core = core_with(&["a", "b", "c"]);
        core.current = Some(9);
        core.reconcile();
        assert_eq!(core.current, Some(2));

        core.playlist.replace(Vec::new());
        core.reconcile();
        assert_eq!(core.current, None);
        assert!(!core.playing);
    }

    #[test]
    fn persisted_state_keeps_pre_shuffle_order() {
        let mut core = core_with(&["a", "b", "c"]);
        core.toggle_shuffle();
        let saved = core.persisted_state();
        let ids: Vec<&str> = saved.tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    proptest::proptest! {
        #[test]
        fn position_stays_in_bounds_under_random_ops(ops in proptest::collection::vec(0u8..10, 1..200)) {
            let mut core = core_with(&["a", "b", "c", "d", "e"]);
            let mut fresh = 0_u32;

            for op in ops {
                match op {
                    0 => { let _ = core.toggle_play(); }
                    1 => { let _ = core.handle_track_end(); }
                    2 => { let _ = core.forward(); }
                    3 => { let _ = core.backward(Duration::from_secs(1)); }
                    4 => { let _ = core.backward(Duration::from_secs(9)); }
                    5 => { let _ = core.toggle_shuffle(); }
                    6 => core.cycle_repeat(),
                    7 => {
                        fresh += 1;
                        core.append_track(track(&format!("new-{fresh}")));
                    }
                    8 => {
                        if let Some(id) = core.playlist.at(0).map(|t| t.id.clone()) {
                            let _ = core.remove_track(&id);
                        }
                    }
                    _ => {
                        if let Some(id) = core.current_track().map(|t| t.id.clone()) {
                            let _ = core.select_track(&id);
                        }
                    }
                }

                match core.current {
                    Some(position) => prop_assert!(position < core.playlist.len()),
                    None => prop_assert!(core.playlist.is_empty()),
                }
            }
        }

        #[test]
        fn forward_then_backward_is_identity_in_the_interior(len in 3usize..10, start in 1usize..8) {
            let ids: Vec<String> = (0..len).map(|n| format!("t{n}")).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let mut core = core_with(&refs);
            let start = start.min(len - 2);
            core.current = Some(start);

            core.forward();
            core.backward(Duration::from_secs(1));
            prop_assert!(core.current == Some(start));
        }
    }
}
