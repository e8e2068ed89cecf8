//! Per-window application state: wires the playback engine, the frame
//! presenter and the control overlay together, and owns the overlay
//! auto-hide timer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use winit::window::{Fullscreen, Window};

use crate::gpu::{self, GpuContext, frame::FramePresenter};
use crate::media::Player;
use crate::token::MediaDescriptor;
use crate::ui::EguiOverlay;
use crate::ui::controls::{Controls, ControlsResponse};

const HIDE_DELAY: Duration = Duration::from_secs(3);

/// Overlay visibility timer. Any pointer or control activity re-arms it;
/// expiry hides the controls only while playback is running.
pub struct AutoHide {
    visible: bool,
    deadline: Option<Instant>,
    delay: Duration,
}

impl AutoHide {
    pub fn new(now: Instant, delay: Duration) -> Self {
        Self {
            visible: true,
            deadline: Some(now + delay),
            delay,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn poke(&mut self, now: Instant) {
        self.visible = true;
        self.deadline = Some(now + self.delay);
    }

    pub fn tick(&mut self, now: Instant, playing: bool) {
        if let Some(deadline) = self.deadline {
            if now >= deadline {
                self.deadline = None;
                if playing {
                    self.visible = false;
                }
            }
        }
    }
}

pub struct App {
    window: Arc<Window>,
    gpu: GpuContext,
    overlay: EguiOverlay,
    player: Player,
    presenter: Option<FramePresenter>,
    autohide: AutoHide,
}

impl App {
    pub fn new(window: Arc<Window>, descriptor: &MediaDescriptor) -> Result<Self> {
        let gpu = GpuContext::new(window.clone())?;
        let overlay = EguiOverlay::new(&gpu.device, gpu.format, &window);

        let player = Player::open(&descriptor.url);
        let presenter = player.metadata().map(|meta| {
            FramePresenter::new(
                &gpu.device,
                &gpu.queue,
                gpu.format,
                meta.width,
                meta.height,
                gpu.surface_config.width,
                gpu.surface_config.height,
            )
        });

        Ok(Self {
            window,
            gpu,
            overlay,
            player,
            presenter,
            autohide: AutoHide::new(Instant::now(), HIDE_DELAY),
        })
    }

    pub fn overlay_mut(&mut self) -> &mut EguiOverlay {
        &mut self.overlay
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.gpu.surface_config.width, self.gpu.surface_config.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        if let Some(presenter) = &self.presenter {
            presenter.resize(&self.gpu.queue, width, height);
        }
        let ppp = self.window.scale_factor() as f32;
        self.overlay.resize(width, height, ppp);
    }

    /// Cursor movement or a handled shortcut keeps the controls on screen.
    pub fn on_activity(&mut self) {
        self.autohide.poke(Instant::now());
    }

    pub fn toggle_fullscreen(&mut self) {
        if self.window.fullscreen().is_some() {
            self.window.set_fullscreen(None);
        } else {
            self.window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
    }

    pub fn redraw(&mut self) -> Result<(), wgpu::SurfaceError> {
        if let Some(frame) = self.player.update() {
            if let Some(presenter) = &self.presenter {
                presenter.upload(&self.gpu.queue, &frame.data);
            }
        }
        self.autohide
            .tick(Instant::now(), !self.player.is_paused());

        self.overlay.begin_frame(&self.window);
        let controls = Controls {
            paused: self.player.is_paused(),
            position: self.player.position_secs(),
            duration: self.player.duration_secs(),
            volume: self.player.volume(),
            muted: self.player.is_muted(),
            fullscreen: self.window.fullscreen().is_some(),
            visible: self.autohide.is_visible(),
        };
        let response = controls.show(&self.overlay.context());
        self.overlay.end_frame(&self.window);
        self.apply(&response);

        let surface_texture = self.gpu.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        match &self.presenter {
            Some(presenter) => presenter.render(&mut encoder, &view),
            None => gpu::clear_pass(&mut encoder, &view),
        }
        self.overlay
            .render(&self.gpu.device, &self.gpu.queue, &mut encoder, &view);

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn apply(&mut self, response: &ControlsResponse) {
        if response.toggle_playback {
            self.player.toggle();
            self.on_activity();
        }
        if let Some(target) = response.seek_to {
            self.player.seek(target);
            self.on_activity();
        }
        if let Some(volume) = response.set_volume {
            self.player.set_volume(volume);
            self.on_activity();
        }
        if response.toggle_mute {
            self.player.toggle_mute();
            self.on_activity();
        }
        if response.toggle_fullscreen {
            self.toggle_fullscreen();
            self.on_activity();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_visible_and_hides_after_delay_while_playing() {
        let t0 = Instant::now();
        let mut hide = AutoHide::new(t0, Duration::from_secs(3));
        assert!(hide.is_visible());

        hide.tick(t0 + Duration::from_secs(2), true);
        assert!(hide.is_visible());

        hide.tick(t0 + Duration::from_secs(3), true);
        assert!(!hide.is_visible());
    }

    #[test]
    fn never_hides_while_paused() {
        let t0 = Instant::now();
        let mut hide = AutoHide::new(t0, Duration::from_secs(3));

        hide.tick(t0 + Duration::from_secs(10), false);
        assert!(hide.is_visible());

        // Expiry while paused disarms the timer; resuming does not hide
        // until activity re-arms it
        hide.tick(t0 + Duration::from_secs(11), true);
        assert!(hide.is_visible());

        hide.poke(t0 + Duration::from_secs(11));
        hide.tick(t0 + Duration::from_secs(14), true);
        assert!(!hide.is_visible());
    }

    #[test]
    fn poke_rearms_the_timer() {
        let t0 = Instant::now();
        let mut hide = AutoHide::new(t0, Duration::from_secs(3));

        hide.tick(t0 + Duration::from_secs(3), true);
        assert!(!hide.is_visible());

        hide.poke(t0 + Duration::from_secs(5));
        assert!(hide.is_visible());
        hide.tick(t0 + Duration::from_secs(7), true);
        assert!(hide.is_visible());
        hide.tick(t0 + Duration::from_secs(8), true);
        assert!(!hide.is_visible());
    }
}
