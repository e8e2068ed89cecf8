//! Streaming video decode via an ffmpeg subprocess.
//!
//! ffmpeg writes raw RGBA frames to stdout; a reader thread cuts the pipe
//! into fixed-size frames, stamps each with its presentation time, and sends
//! them over a small bounded channel. The full channel blocks the reader,
//! which in turn blocks ffmpeg on the pipe — decode never runs ahead of
//! playback by more than a few frames. Seeking is a restart with `-ss`.

use std::io::Read;
use std::process::{Child, Command, Stdio};

use crossbeam_channel::{Receiver, TryRecvError};

use super::probe::MediaMeta;
use super::MediaError;

/// Frames buffered between the decode thread and the render thread.
const CHANNEL_DEPTH: usize = 4;

/// One decoded frame with its presentation time.
pub struct VideoFrame {
    /// RGBA8, `width * height * 4` bytes.
    pub data: Vec<u8>,
    pub pts_secs: f64,
}

pub struct VideoStream {
    rx: Receiver<VideoFrame>,
    child: Child,
    /// Frame popped from the channel but not yet due for presentation.
    pending: Option<VideoFrame>,
    finished: bool,
}

impl VideoStream {
    /// Spawn ffmpeg decoding `url` from `start_secs` onward.
    pub fn open(url: &str, meta: &MediaMeta, start_secs: f64) -> Result<Self, MediaError> {
        let frame_size = (meta.width as usize) * (meta.height as usize) * 4;
        let fps = if meta.fps > 0.0 { meta.fps } else { 30.0 };

        let mut cmd = Command::new("ffmpeg");
        if start_secs > 0.0 {
            cmd.args(["-ss", &format!("{start_secs:.3}")]);
        }
        cmd.args(["-i", url])
            .args([
                "-f", "rawvideo",
                "-pix_fmt", "rgba",
                "-s", &format!("{}x{}", meta.width, meta.height),
                "-an",
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
            .ok_or_else(|| MediaError::Probe("ffmpeg: no stdout pipe".into()))?;

        let (tx, rx) = crossbeam_channel::bounded(CHANNEL_DEPTH);
        std::thread::Builder::new()
            .name("video-decode".into())
            .spawn(move || {
                let mut buf = vec![0u8; frame_size];
                let mut index: u64 = 0;
                loop {
                    if stdout.read_exact(&mut buf).is_err() {
                        break; // EOF or killed child
                    }
                    let frame = VideoFrame {
                        data: buf.clone(),
                        pts_secs: start_secs + index as f64 / fps,
                    };
                    index += 1;
                    if tx.send(frame).is_err() {
                        break; // receiver dropped
                    }
                }
            })?;

        log::info!("video stream started at {start_secs:.3}s ({fps:.2} fps)");

        Ok(Self {
            rx,
            child,
            pending: None,
            finished: false,
        })
    }

    /// Pop every frame due at `position` and return the latest one.
    /// Frames decoded ahead of the clock are held back for the next call.
    pub fn poll_due(&mut self, position: f64) -> Option<VideoFrame> {
        let mut due = None;

        if let Some(frame) = self.pending.take() {
            if frame.pts_secs <= position {
                due = Some(frame);
            } else {
                self.pending = Some(frame);
                return None;
            }
        }

        loop {
            match self.rx.try_recv() {
                Ok(frame) => {
                    if frame.pts_secs <= position {
                        due = Some(frame);
                    } else {
                        self.pending = Some(frame);
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.finished = true;
                    break;
                }
            }
        }
        due
    }

    /// True once the decoder has exited and every frame has been presented.
    pub fn is_finished(&self) -> bool {
        self.finished && self.pending.is_none()
    }
}

impl Drop for VideoStream {
    fn drop(&mut self) {
        // Killing the child EOFs the pipe; the reader thread then exits on
        // its own once the (dropped) channel rejects the next send.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
