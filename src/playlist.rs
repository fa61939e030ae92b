use crate::model::Track;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Ordered sequence of tracks, addressable by position and by id.
/// No two entries share an id.
#[derive(Debug, Clone, Default)]
pub struct TrackList {
    tracks: Vec<Track>,
    lookup: HashMap<String, usize>,
}

impl TrackList {
    pub fn new(tracks: Vec<Track>) -> Self {
        let mut list = Self::default();
        for track in tracks {
            list.append(track);
        }
        list
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn at(&self, position: usize) -> Option<&Track> {
        self.tracks.get(position)
    }

    pub fn index_of_id(&self, id: &str) -> Option<usize> {
        self.lookup.get(id).copied()
    }

    /// Appends at the tail. No-op when the id is already present; returns
    /// whether the list grew.
    pub fn append(&mut self, track: Track) -> bool {
        if self.lookup.contains_key(&track.id) {
            return false;
        }
        self.lookup.insert(track.id.clone(), self.tracks.len());
        self.tracks.push(track);
        true
    }

    /// Removes the track with the given id, keeping the relative order of
    /// the rest. Returns the removed entry's former position.
    pub fn remove_by_id(&mut self, id: &str) -> Option<usize> {
        let position = self.index_of_id(id)?;
        self.tracks.remove(position);
        self.rebuild_lookup();
        Some(position)
    }

    /// Wholesale swap of the underlying sequence.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.rebuild_lookup();
    }

    /// New sequence with all elements permuted by uniform Fisher-Yates,
    /// except that a valid `pinned` position is lifted to the head before
    /// the rest is shuffled. Does not mutate the source.
    pub fn shuffled(&self, rng: &mut SmallRng, pinned: Option<usize>) -> Vec<Track> {
        let mut rest = self.tracks.clone();
        let head = pinned
            .filter(|position| *position < rest.len())
            .map(|position| rest.remove(position));
        rest.shuffle(rng);

        match head {
            Some(track) => {
                let mut out = Vec::with_capacity(rest.len() + 1);
                out.push(track);
                out.extend(rest);
                out
            }
            None => rest,
        }
    }

    fn rebuild_lookup(&mut self) {
        self.lookup = self
            .tracks
            .iter()
            .enumerate()
            .map(|(position, track)| (track.id.clone(), position))
            .collect();
    }
}

#[derive(Debug, Clone, Copy)]
struct LinkNode {
    prev: Option<usize>,
    next: Option<usize>,
}

/// Predecessor/successor view over a track sequence. Always recomputed from
/// scratch when the sequence changes; playlist sizes make incremental
/// patching not worth having.
#[derive(Debug, Clone, Default)]
pub struct TraversalIndex {
    nodes: Vec<LinkNode>,
}

impl TraversalIndex {
    pub fn from_len(len: usize) -> Self {
        let nodes = (0..len)
            .map(|position| LinkNode {
                prev: position.checked_sub(1),
                next: (position + 1 < len).then_some(position + 1),
            })
            .collect();
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn predecessor_of(&self, position: usize) -> Option<usize> {
        self.nodes.get(position)?.prev
    }

    pub fn successor_of(&self, position: usize) -> Option<usize> {
        self.nodes.get(position)?.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("title-{id}"),
            artist: String::from("artist"),
            src: format!("https://example.invalid/{id}/stream"),
            cover: String::new(),
        }
    }

    #[test]
    fn append_rejects_duplicate_ids() {
        let mut list = TrackList::default();
        assert!(list.append(track("a")));
        assert!(!list.append(track("a")));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_preserves_order_and_reports_position() {
        let mut list = TrackList::new(vec![track("a"), track("b"), track("c")]);
        assert_eq!(list.remove_by_id("b"), Some(1));
        let ids: Vec<&str> = list.tracks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(list.index_of_id("c"), Some(1));
        assert_eq!(list.remove_by_id("missing"), None);
    }

    #[test]
    fn traversal_index_has_open_ends() {
        let links = TraversalIndex::from_len(3);
        assert_eq!(links.predecessor_of(0), None);
        assert_eq!(links.successor_of(0), Some(1));
        assert_eq!(links.predecessor_of(2), Some(1));
        assert_eq!(links.successor_of(2), None);
        assert_eq!(links.successor_of(7), None);
    }

    #[test]
    fn shuffled_pins_requested_position_at_head() {
        let list = TrackList::new(vec![track("a"), track("b"), track("c"), track("d")]);
        let mut rng = SmallRng::seed_from_u64(7);
        let order = list.shuffled(&mut rng, Some(2));
        assert_eq!(order[0].id, "c");
        assert_eq!(order.len(), 4);
        let mut ids: Vec<&str> = order.iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn shuffled_ignores_out_of_bounds_pin() {
        let list = TrackList::new(vec![track("a"), track("b")]);
        let mut rng = SmallRng::seed_from_u64(3);
        let order = list.shuffled(&mut rng, Some(9));
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn shuffled_tail_orders_are_roughly_uniform() {
        // [a, b, c] pinned at 0: the tail must come out as both (b, c) and
        // (c, b) a reasonable share of the time.
        let list = TrackList::new(vec![track("a"), track("b"), track("c")]);
        let mut flipped = 0;
        let trials = 400;
        for seed in 0..trials {
            let mut rng = SmallRng::seed_from_u64(seed);
            let order = list.shuffled(&mut rng, Some(0));
            assert_eq!(order[0].id, "a");
            if order[1].id == "c" {
                flipped += 1;
            }
        }
        assert!(flipped > trials / 4, "only {flipped}/{trials} flipped");
        assert!(flipped < trials * 3 / 4, "{flipped}/{trials} flipped");
    }
}
