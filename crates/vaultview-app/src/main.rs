mod app;
mod gpu;
mod media;
mod token;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use app::App;
use token::MediaDescriptor;

const SEEK_STEP_SECS: f64 = 10.0;

struct VaultviewApp {
    descriptor: MediaDescriptor,
    app: Option<App>,
    window: Option<Arc<Window>>,
}

impl VaultviewApp {
    fn new(descriptor: MediaDescriptor) -> Self {
        Self {
            descriptor,
            app: None,
            window: None,
        }
    }
}

impl ApplicationHandler for VaultviewApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title(self.descriptor.display_name())
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = Arc::new(event_loop.create_window(attrs).expect("Failed to create window"));

        // Center window on primary monitor
        if let Some(monitor) = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
        {
            let monitor_size = monitor.size();
            let window_size = window.outer_size();
            let monitor_pos = monitor.position();
            let x = (monitor_size.width.saturating_sub(window_size.width)) / 2;
            let y = (monitor_size.height.saturating_sub(window_size.height)) / 2;
            window.set_outer_position(winit::dpi::PhysicalPosition::new(
                monitor_pos.x + x as i32,
                monitor_pos.y + y as i32,
            ));
        }

        self.window = Some(window.clone());

        match App::new(window, &self.descriptor) {
            Ok(app) => {
                self.app = Some(app);
                log::info!("playing \"{}\"", self.descriptor.display_name());
            }
            Err(e) => {
                log::error!("Failed to initialize app: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(app), Some(window)) = (self.app.as_mut(), self.window.as_ref()) else {
            return;
        };

        // Let egui handle events first
        let egui_consumed = app.overlay_mut().handle_event(window, &event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                app.resize(size.width, size.height);
            }
            WindowEvent::CursorMoved { .. } | WindowEvent::Touch(_) => {
                app.on_activity();
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Right,
                ..
            } => {
                // No context menu over the video
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } if !egui_consumed || !app.overlay_mut().wants_keyboard() => {
                match key {
                    KeyCode::Space => {
                        app.player_mut().toggle();
                        app.on_activity();
                    }
                    KeyCode::KeyM => {
                        app.player_mut().toggle_mute();
                        app.on_activity();
                    }
                    KeyCode::KeyF => {
                        app.toggle_fullscreen();
                        app.on_activity();
                    }
                    KeyCode::ArrowRight => {
                        let target = app.player_mut().position_secs() + SEEK_STEP_SECS;
                        app.player_mut().seek(target);
                        app.on_activity();
                    }
                    KeyCode::ArrowLeft => {
                        let target = app.player_mut().position_secs() - SEEK_STEP_SECS;
                        app.player_mut().seek(target);
                        app.on_activity();
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                match app.redraw() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let (w, h) = app.surface_size();
                        app.resize(w, h);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {e}");
                    }
                }

                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let arg = std::env::args().nth(1);
    let descriptor = match token::resolve(arg.as_deref()) {
        Ok(d) => d,
        Err(e) => {
            log::error!("{e}");
            rfd::MessageDialog::new()
                .set_level(rfd::MessageLevel::Error)
                .set_title("Vaultview")
                .set_description(e.to_string())
                .show();
            return Ok(());
        }
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut app = VaultviewApp::new(descriptor);
    event_loop.run_app(&mut app)?;

    Ok(())
}
