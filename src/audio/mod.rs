use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::HostTrait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::io::Cursor;
use std::time::{Duration, Instant};

const MAX_VOLUME: f32 = 1.0;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The single playback handle. Switching tracks reassigns its source;
/// there is never more than one live decode pipeline.
pub trait AudioEngine {
    /// Point the handle at a new source (stream URL or local path) and
    /// start it, paused unless `autoplay`.
    fn load(&mut self, src: &str, autoplay: bool) -> Result<()>;
    /// Seek the current source back to zero without reloading it.
    fn restart(&mut self, autoplay: bool) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn is_paused(&self) -> bool;
    fn current_src(&self) -> Option<&str>;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn is_finished(&self) -> bool;
}

pub struct RodioAudioEngine {
    stream: OutputStream,
    sink: Sink,
    http: reqwest::blocking::Client,
    current: Option<String>,
    track_duration: Option<Duration>,
    volume: f32,
}

impl RodioAudioEngine {
    pub fn new() -> Result<Self> {
        let (stream, sink) = Self::open_output_stream()?;
        let http = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build stream fetch client")?;
        Ok(Self {
            stream,
            sink,
            http,
            current: None,
            track_duration: None,
            volume: 1.0,
        })
    }

    fn open_output_stream() -> Result<(OutputStream, Sink)> {
        let mut stream = with_silenced_stderr(|| {
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => {
                    let host = rodio::cpal::default_host();
                    let mut started: Option<OutputStream> = None;
                    for device in host.output_devices().ok().into_iter().flatten() {
                        let opened = OutputStreamBuilder::from_device(device)
                            .context("failed to open fallback output device")
                            .and_then(|builder| {
                                builder
                                    .with_error_callback(|_| {})
                                    .open_stream_or_fallback()
                                    .context("failed to start fallback output stream")
                            });
                        if let Ok(stream) = opened {
                            started = Some(stream);
                            break;
                        }
                    }
                    started.with_context(|| {
                        format!("unable to start any audio output stream: {default_err:#}")
                    })
                }
            }
        })?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        Ok((stream, sink))
    }

    fn append_source(&mut self, src: &str) -> Result<Option<Duration>> {
        if src.starts_with("http://") || src.starts_with("https://") {
            let response = self
                .http
                .get(src)
                .send()
                .with_context(|| format!("failed to fetch stream {src}"))?;
            let status = response.status();
            if !status.is_success() {
                anyhow::bail!("stream fetch for {src} failed: {status}");
            }
            let bytes = response
                .bytes()
                .with_context(|| format!("failed to read stream body {src}"))?;
            let source = Decoder::new(Cursor::new(bytes.to_vec()))
                .with_context(|| format!("failed to decode stream {src}"))?;
            let duration = source.total_duration();
            self.sink.append(source);
            Ok(duration)
        } else {
            let file =
                File::open(src).with_context(|| format!("failed to open track {src}"))?;
            let source =
                Decoder::try_from(file).with_context(|| format!("failed to decode {src}"))?;
            let duration = source.total_duration();
            self.sink.append(source);
            Ok(duration)
        }
    }
}

impl AudioEngine for RodioAudioEngine {
    fn load(&mut self, src: &str, autoplay: bool) -> Result<()> {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());

        self.track_duration = self.append_source(src)?;
        self.sink.set_volume(self.volume);
        if !autoplay {
            self.sink.pause();
        }
        self.current = Some(src.to_string());
        Ok(())
    }

    fn restart(&mut self, autoplay: bool) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }
        self.sink
            .try_seek(Duration::ZERO)
            .map_err(|err| anyhow::anyhow!("failed to restart current track: {err:?}"))?;
        if autoplay {
            self.sink.play();
        } else {
            self.sink.pause();
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.sink.play();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }
        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn current_src(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        self.sink.set_volume(self.volume);
    }

    fn is_finished(&self) -> bool {
        self.current.is_some() && !self.sink.is_paused() && self.sink.empty()
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Logical-clock engine used when no output device is available and in
/// tests. Durations are unknown, so it never auto-finishes.
pub struct NullAudioEngine {
    paused: bool,
    current: Option<String>,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
}

impl NullAudioEngine {
    pub fn new() -> Self {
        Self {
            paused: false,
            current: None,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
        }
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        position
    }
}

impl Default for NullAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for NullAudioEngine {
    fn load(&mut self, src: &str, autoplay: bool) -> Result<()> {
        self.paused = !autoplay;
        self.current = Some(src.to_string());
        self.started_at = autoplay.then(Instant::now);
        self.position_offset = Duration::ZERO;
        Ok(())
    }

    fn restart(&mut self, autoplay: bool) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }
        self.position_offset = Duration::ZERO;
        self.paused = !autoplay;
        self.started_at = autoplay.then(Instant::now);
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) {
        if self.current.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }
        self.position_offset = position;
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn current_src(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        None
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    fn is_finished(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioEngine, NullAudioEngine};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn null_engine_position_advances_while_playing() {
        let mut engine = NullAudioEngine::new();
        engine
            .load("https://example.invalid/t/stream", true)
            .expect("load should work in null mode");
        let before = engine.position().expect("position present");
        thread::sleep(Duration::from_millis(20));
        let after = engine.position().expect("position present");
        assert!(after > before, "position should advance while playing");
    }

    #[test]
    fn null_engine_pause_freezes_position() {
        let mut engine = NullAudioEngine::new();
        engine
            .load("https://example.invalid/t/stream", true)
            .expect("load should work in null mode");
        thread::sleep(Duration::from_millis(20));

        engine.pause();
        let paused = engine.position().expect("position present");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.position().expect("position present"), paused);

        engine.resume();
        thread::sleep(Duration::from_millis(20));
        assert!(engine.position().expect("position present") > paused);
    }

    #[test]
    fn null_engine_load_without_autoplay_starts_paused() {
        let mut engine = NullAudioEngine::new();
        engine
            .load("https://example.invalid/t/stream", false)
            .expect("load should work in null mode");
        assert!(engine.is_paused());
        assert_eq!(engine.position(), Some(Duration::ZERO));
    }

    #[test]
    fn null_engine_restart_rewinds_to_zero() {
        let mut engine = NullAudioEngine::new();
        engine
            .load("https://example.invalid/t/stream", true)
            .expect("load should work in null mode");
        engine.seek_to(Duration::from_secs(30)).expect("seek");
        engine.restart(false).expect("restart");
        assert_eq!(engine.position(), Some(Duration::ZERO));
        assert!(engine.is_paused());
    }

    #[test]
    fn null_engine_stop_releases_the_source() {
        let mut engine = NullAudioEngine::new();
        engine
            .load("https://example.invalid/t/stream", true)
            .expect("load should work in null mode");
        engine.stop();
        assert_eq!(engine.current_src(), None);
        assert_eq!(engine.position(), None);
        assert!(!engine.is_finished());
    }
}
