//! Playback engine: the native stand-in for a media element.
//!
//! Observable state (paused, position, duration, volume, muted) is owned
//! here and read live by the controller every frame; nothing is duplicated
//! in UI state. Video frames arrive from [`stream`], audio runs through
//! [`audio`], and both restart together on seek.

pub mod audio;
pub mod probe;
pub mod stream;

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use audio::{AudioGain, AudioOutput};
use probe::MediaMeta;
use stream::{VideoFrame, VideoStream};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg/ffprobe not found on PATH")]
    ToolsMissing,
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Wall-clock playback position with a committed base.
///
/// While playing, position = base + elapsed since resume; pausing folds the
/// elapsed time into the base. Seeks replace the base outright.
#[derive(Debug)]
pub struct PlaybackClock {
    base_secs: f64,
    resumed_at: Option<Instant>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            base_secs: 0.0,
            resumed_at: None,
        }
    }

    pub fn position(&self, now: Instant) -> f64 {
        self.base_secs
            + self
                .resumed_at
                .map_or(0.0, |t| now.duration_since(t).as_secs_f64())
    }

    pub fn play(&mut self, now: Instant) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(t) = self.resumed_at.take() {
            self.base_secs += now.duration_since(t).as_secs_f64();
        }
    }

    pub fn seek(&mut self, secs: f64, now: Instant) {
        self.base_secs = secs;
        if self.resumed_at.is_some() {
            self.resumed_at = Some(now);
        }
    }

    pub fn is_running(&self) -> bool {
        self.resumed_at.is_some()
    }
}

/// The playback engine for a single resolved media URL.
pub struct Player {
    url: String,
    meta: Option<MediaMeta>,
    clock: PlaybackClock,
    paused: bool,
    ended: bool,
    volume: f32,
    muted: bool,
    gain: Arc<AudioGain>,
    video: Option<VideoStream>,
    audio: Option<AudioOutput>,
}

impl Player {
    /// Probe the URL and start the decode pipelines, initially paused.
    ///
    /// Probe or spawn failures are runtime playback errors: logged, and the
    /// player stays usable with a black surface and zero duration.
    pub fn open(url: &str) -> Self {
        let mut player = Self {
            url: url.to_string(),
            meta: None,
            clock: PlaybackClock::new(),
            paused: true,
            ended: false,
            volume: 1.0,
            muted: false,
            gain: Arc::new(AudioGain::new(1.0)),
            video: None,
            audio: None,
        };

        if !probe::tools_available() {
            log::error!("cannot play media: {}", MediaError::ToolsMissing);
            return player;
        }

        match probe::probe(url) {
            Ok(meta) => {
                log::info!(
                    "media: {}x{} {:.2} fps, {:.1}s",
                    meta.width,
                    meta.height,
                    meta.fps,
                    meta.duration_secs
                );
                player.meta = Some(meta);
                player.restart_pipelines(0.0);
            }
            Err(e) => log::error!("cannot play media: {e}"),
        }
        player
    }

    fn restart_pipelines(&mut self, start_secs: f64) {
        let Some(meta) = &self.meta else { return };

        self.video = match VideoStream::open(&self.url, meta, start_secs) {
            Ok(v) => Some(v),
            Err(e) => {
                log::error!("video pipeline failed: {e}");
                None
            }
        };
        self.audio =
            match AudioOutput::open(&self.url, start_secs, self.gain.clone(), !self.paused) {
                Ok(a) => Some(a),
                Err(e) => {
                    log::warn!("no audio: {e}");
                    None
                }
            };
    }

    /// Whether probing succeeded and dimensions/duration are known.
    pub fn metadata(&self) -> Option<&MediaMeta> {
        self.meta.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn duration_secs(&self) -> f64 {
        self.meta.as_ref().map_or(0.0, |m| m.duration_secs)
    }

    pub fn position_secs(&self) -> f64 {
        let pos = self.clock.position(Instant::now());
        let duration = self.duration_secs();
        if duration > 0.0 { pos.min(duration) } else { pos }
    }

    pub fn play(&mut self) {
        if !self.paused {
            return;
        }
        // Replaying a finished stream starts over, like a media element
        if self.ended {
            self.seek(0.0);
            self.ended = false;
        }
        self.paused = false;
        self.clock.play(Instant::now());
        if let Some(audio) = &self.audio {
            audio.play();
        }
    }

    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.clock.pause(Instant::now());
        if let Some(audio) = &self.audio {
            audio.pause();
        }
    }

    /// Flip playback, like clicking the play/pause control.
    pub fn toggle(&mut self) {
        if self.paused {
            self.play();
        } else {
            self.pause();
        }
    }

    /// Jump to `secs`, clamped to `[0, duration]`. Restarts both pipelines.
    pub fn seek(&mut self, secs: f64) {
        if self.meta.is_none() {
            return;
        }
        let duration = self.duration_secs();
        let target = if duration > 0.0 {
            secs.clamp(0.0, duration)
        } else {
            secs.max(0.0)
        };
        self.clock.seek(target, Instant::now());
        self.ended = false;
        self.restart_pipelines(target);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.gain.set_volume(self.volume);
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.gain.set_muted(self.muted);
    }

    /// Per-frame tick: returns the frame due for upload, if any, and flips
    /// to paused once the stream has fully played out.
    pub fn update(&mut self) -> Option<VideoFrame> {
        let position = self.position_secs();
        let frame = self.video.as_mut().and_then(|v| v.poll_due(position));

        if !self.paused && !self.ended {
            let drained = self.video.as_ref().is_some_and(|v| v.is_finished());
            let duration = self.duration_secs();
            if drained && (duration <= 0.0 || position >= duration) {
                self.pause();
                self.ended = true;
                if duration > 0.0 {
                    self.clock.seek(duration, Instant::now());
                }
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clock_starts_stopped_at_zero() {
        let clock = PlaybackClock::new();
        assert!(!clock.is_running());
        assert_eq!(clock.position(Instant::now()), 0.0);
    }

    #[test]
    fn clock_advances_only_while_playing() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();

        // Paused: position frozen no matter how much time passes
        assert_eq!(clock.position(t0 + Duration::from_secs(5)), 0.0);

        clock.play(t0);
        let pos = clock.position(t0 + Duration::from_secs(2));
        assert!((pos - 2.0).abs() < 1e-9);

        clock.pause(t0 + Duration::from_secs(2));
        assert!((clock.position(t0 + Duration::from_secs(60)) - 2.0).abs() < 1e-9);

        // Resume continues from the committed base
        clock.play(t0 + Duration::from_secs(60));
        let pos = clock.position(t0 + Duration::from_secs(63));
        assert!((pos - 5.0).abs() < 1e-9);
    }

    #[test]
    fn clock_play_is_idempotent() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.play(t0);
        // A second play must not reset the running origin
        clock.play(t0 + Duration::from_secs(10));
        let pos = clock.position(t0 + Duration::from_secs(10));
        assert!((pos - 10.0).abs() < 1e-9);
    }

    #[test]
    fn mute_state_is_observable_and_independent_of_volume() {
        // A bad URL leaves the player usable with no pipelines; the
        // volume/mute surface works regardless.
        let mut player = Player::open("does-not-exist.mp4");
        assert!(!player.is_muted());

        player.set_volume(0.4);
        player.toggle_mute();
        assert!(player.is_muted());
        assert!((player.volume() - 0.4).abs() < 1e-6);

        player.toggle_mute();
        assert!(!player.is_muted());
    }

    #[test]
    fn clock_seek_keeps_running_state() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();

        clock.seek(30.0, t0);
        assert!(!clock.is_running());
        assert_eq!(clock.position(t0), 30.0);

        clock.play(t0);
        clock.seek(10.0, t0 + Duration::from_secs(4));
        assert!(clock.is_running());
        let pos = clock.position(t0 + Duration::from_secs(5));
        assert!((pos - 11.0).abs() < 1e-9);
    }
}
