#![no_main]

use libfuzzer_sys::fuzz_target;
use std::time::Duration;
use wavedeck::core::PlayerCore;
use wavedeck::model::{PersistedState, Track};

fuzz_target!(|data: &[u8]| {
    let len = (data.len() % 16).max(1);
    let tracks = (0..len)
        .map(|idx| Track {
            id: format!("{idx}"),
            title: format!("track_{idx}"),
            artist: String::from("fuzz"),
            src: format!("https://example.invalid/v1/tracks/{idx}/stream"),
            cover: String::new(),
        })
        .collect();
    let mut core = PlayerCore::from_persisted(PersistedState {
        tracks,
        ..PersistedState::default()
    });

    let mut fresh = len;
    for byte in data {
        match byte % 10 {
            0 => {
                let _ = core.toggle_play();
            }
            1 => {
                let _ = core.forward();
            }
            2 => {
                let _ = core.backward(Duration::from_secs((byte % 8) as u64));
            }
            3 => {
                let _ = core.handle_track_end();
            }
            4 => {
                let _ = core.toggle_shuffle();
            }
            5 => core.cycle_repeat(),
            6 => {
                core.append_track(Track {
                    id: format!("{fresh}"),
                    title: format!("track_{fresh}"),
                    artist: String::from("fuzz"),
                    src: format!("https://example.invalid/v1/tracks/{fresh}/stream"),
                    cover: String::new(),
                });
                fresh += 1;
            }
            7 => {
                let _ = core.remove_track(&format!("{}", byte % 16));
            }
            8 => {
                let _ = core.select_track(&format!("{}", byte % 16));
            }
            _ => core.set_volume(f32::from(*byte) / 128.0),
        }

        if let Some(position) = core.current {
            assert!(position < core.playlist.len());
        } else {
            assert!(core.playlist.is_empty() || !core.playing);
        }
    }
});
