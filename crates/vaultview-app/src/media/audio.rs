//! Audio output: ffmpeg PCM pipe -> ring buffer -> cpal stream.
//!
//! A second ffmpeg child decodes the same URL to interleaved f32 samples at
//! the output device's rate. A reader thread fills a lock-free ring; the
//! cpal callback drains it, applying the volume/mute gain. Underruns play
//! silence instead of blocking the audio thread.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;

/// Ring capacity in samples (power of 2 for mask arithmetic).
const RING_SIZE: usize = 1 << 16;
const RING_MASK: usize = RING_SIZE - 1;

/// Volume and mute shared between the control thread and the cpal callback.
/// Volume is stored as f32 bits in an AtomicU32.
pub struct AudioGain {
    volume_bits: AtomicU32,
    muted: AtomicBool,
}

impl AudioGain {
    pub fn new(volume: f32) -> Self {
        Self {
            volume_bits: AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()),
            muted: AtomicBool::new(false),
        }
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Effective gain applied per sample.
    pub fn gain(&self) -> f32 {
        if self.muted() { 0.0 } else { self.volume() }
    }
}

/// Lock-free single-producer single-consumer sample ring. Samples live as
/// f32 bits in atomics, so neither side ever takes a lock.
pub struct SampleRing {
    data: Box<[AtomicU32]>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
}

impl SampleRing {
    pub fn new() -> Self {
        let data: Vec<AtomicU32> = (0..RING_SIZE).map(|_| AtomicU32::new(0)).collect();
        Self {
            data: data.into_boxed_slice(),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
        }
    }

    /// Push samples (single producer: the pipe reader thread).
    pub fn push(&self, samples: &[f32]) {
        let mut wp = self.write_pos.load(Ordering::Relaxed);
        for &sample in samples {
            self.data[wp & RING_MASK].store(sample.to_bits(), Ordering::Relaxed);
            wp = wp.wrapping_add(1);
        }
        self.write_pos.store(wp, Ordering::Release);
    }

    /// Read up to `dst.len()` samples (single consumer: the cpal callback).
    /// Returns the number of samples read.
    pub fn read(&self, dst: &mut [f32]) -> usize {
        let wp = self.write_pos.load(Ordering::Acquire);
        let rp = self.read_pos.load(Ordering::Relaxed);
        let available = wp.wrapping_sub(rp);
        let to_read = available.min(dst.len());

        for (i, slot) in dst.iter_mut().enumerate().take(to_read) {
            let idx = rp.wrapping_add(i) & RING_MASK;
            *slot = f32::from_bits(self.data[idx].load(Ordering::Relaxed));
        }

        self.read_pos
            .store(rp.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Samples currently buffered.
    pub fn buffered(&self) -> usize {
        let wp = self.write_pos.load(Ordering::Acquire);
        let rp = self.read_pos.load(Ordering::Acquire);
        wp.wrapping_sub(rp)
    }
}

/// Decode little-endian f32 samples from `src` into the ring until EOF.
///
/// Pipe reads return arbitrary lengths; bytes left over from a read that
/// ends mid-sample are kept at the front of the buffer for the next read, so
/// sample alignment survives short reads.
fn pump_samples(mut src: impl Read, ring: &SampleRing) {
    let mut buf = [0u8; 16384];
    let mut filled = 0usize;
    let mut samples = Vec::with_capacity(buf.len() / 4);
    loop {
        // Keep roughly half the ring free so pushes never lap the reader.
        while ring.buffered() > RING_SIZE / 2 {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let n = match src.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        filled += n;
        let usable = filled - filled % 4;
        samples.clear();
        samples.extend(
            buf[..usable]
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
        ring.push(&samples);
        buf.copy_within(usable..filled, 0);
        filled -= usable;
    }
}

pub struct AudioOutput {
    stream: Stream,
    child: Child,
}

impl AudioOutput {
    /// Spawn the PCM decode child and open the output stream, paused or not
    /// according to `playing`.
    pub fn open(url: &str, start_secs: f64, gain: Arc<AudioGain>, playing: bool) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("No audio output device found"))?;

        let config = device.default_output_config()?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            anyhow::bail!(
                "unsupported output sample format {:?}",
                config.sample_format()
            );
        }
        let sample_rate = config.sample_rate();
        let channels = config.channels();
        log::info!("Audio output: {sample_rate}Hz, {channels}ch");

        let mut cmd = Command::new("ffmpeg");
        if start_secs > 0.0 {
            cmd.args(["-ss", &format!("{start_secs:.3}")]);
        }
        cmd.args(["-i", url])
            .args([
                "-vn",
                "-f", "f32le",
                "-acodec", "pcm_f32le",
                "-ac", &channels.to_string(),
                "-ar", &sample_rate.to_string(),
                "-v", "quiet",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn()?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("ffmpeg: no stdout pipe"))?;

        let ring = Arc::new(SampleRing::new());
        let ring_reader = ring.clone();
        std::thread::Builder::new()
            .name("audio-decode".into())
            .spawn(move || pump_samples(stdout, &ring_reader))?;

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let n = ring.read(data);
                let g = gain.gain();
                for sample in &mut data[..n] {
                    *sample *= g;
                }
                for sample in &mut data[n..] {
                    *sample = 0.0;
                }
            },
            |err| {
                log::error!("Audio stream error: {err}");
            },
            None,
        )?;

        if playing {
            stream.play()?;
        } else {
            stream.pause()?;
        }

        Ok(Self { stream, child })
    }

    pub fn play(&self) {
        if let Err(e) = self.stream.play() {
            log::warn!("Failed to resume audio: {e}");
        }
    }

    pub fn pause(&self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("Failed to pause audio: {e}");
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_reflects_volume_and_mute() {
        let gain = AudioGain::new(0.8);
        assert!((gain.gain() - 0.8).abs() < 1e-6);
        gain.set_muted(true);
        assert_eq!(gain.gain(), 0.0);
        assert!((gain.volume() - 0.8).abs() < 1e-6); // volume survives mute
        gain.set_muted(false);
        gain.set_volume(1.5);
        assert_eq!(gain.gain(), 1.0); // clamped to [0, 1]
        gain.set_volume(-0.5);
        assert_eq!(gain.gain(), 0.0);
    }

    #[test]
    fn ring_roundtrip_and_underrun() {
        let ring = SampleRing::new();
        ring.push(&[1.0, 2.0, 3.0]);
        assert_eq!(ring.buffered(), 3);

        let mut out = [0.0f32; 5];
        let n = ring.read(&mut out);
        assert_eq!(n, 3);
        assert_eq!(&out[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(ring.buffered(), 0);

        // Empty ring reads zero samples
        assert_eq!(ring.read(&mut out), 0);
    }

    /// Returns at most `step` bytes per read, forcing mid-sample splits.
    struct DribbleReader<'a> {
        data: &'a [u8],
        pos: usize,
        step: usize,
    }

    impl Read for DribbleReader<'_> {
        fn read(&mut self, dst: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(self.data.len() - self.pos).min(dst.len());
            dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn pump_keeps_sample_alignment_across_short_reads() {
        let expected: Vec<f32> = vec![1.0, -2.5, 3.25, 0.0, -0.125, 1e-3, 42.0];
        let bytes: Vec<u8> = expected.iter().flat_map(|s| s.to_le_bytes()).collect();

        for step in [1, 3, 5, 7] {
            let ring = SampleRing::new();
            pump_samples(
                DribbleReader {
                    data: &bytes,
                    pos: 0,
                    step,
                },
                &ring,
            );

            let mut out = vec![0.0f32; expected.len() + 4];
            let n = ring.read(&mut out);
            assert_eq!(n, expected.len(), "step {step}");
            assert_eq!(&out[..n], &expected[..], "step {step}");
        }
    }

    #[test]
    fn ring_wraps_around() {
        let ring = SampleRing::new();
        let chunk: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let mut out = vec![0.0f32; 1000];
        // Push/read enough times to wrap the ring several times over
        for _ in 0..((RING_SIZE / 1000) + 2) {
            ring.push(&chunk);
            assert_eq!(ring.read(&mut out), 1000);
            assert_eq!(out, chunk);
        }
    }
}
