//! Player control overlay.
//!
//! One bottom bar (play/pause, scrubbable progress, time label, volume
//! slider, fullscreen) plus a centered big-play button while paused. The
//! widget is stateless: it renders the live playback state it is handed and
//! reports requested actions in [`ControlsResponse`].

use egui::{Align2, Color32, Context, CornerRadius, FontId, Pos2, Rect, Sense, Stroke, Ui, Vec2};

const BAR_HEIGHT: f32 = 44.0;
const PADDING: f32 = 8.0;
const TIME_WIDTH: f32 = 110.0;
const VOLUME_WIDTH: f32 = 90.0;

const BAR_COLOR: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 170);
const ICON_COLOR: Color32 = Color32::WHITE;
const FILL_COLOR: Color32 = Color32::from_rgb(229, 9, 20);
const TRACK_COLOR: Color32 = Color32::from_rgba_premultiplied(90, 90, 90, 160);

/// Live state the controls render from; never cached between frames.
pub struct Controls {
    pub paused: bool,
    pub position: f64,
    pub duration: f64,
    pub volume: f32,
    pub muted: bool,
    pub fullscreen: bool,
    /// Auto-hide verdict for the bottom bar.
    pub visible: bool,
}

/// Actions the user requested this frame.
#[derive(Default)]
pub struct ControlsResponse {
    pub toggle_playback: bool,
    pub seek_to: Option<f64>,
    pub set_volume: Option<f32>,
    pub toggle_mute: bool,
    pub toggle_fullscreen: bool,
}

impl Controls {
    pub fn show(&self, ctx: &Context) -> ControlsResponse {
        let mut response = ControlsResponse::default();
        let screen = ctx.screen_rect();

        egui::Area::new(egui::Id::new("player-controls"))
            .fixed_pos(Pos2::ZERO)
            .show(ctx, |ui| {
                if self.paused {
                    response.toggle_playback |= self.draw_big_play(ui, screen);
                }
                if self.visible {
                    self.draw_bar(ui, screen, &mut response);
                }
            });

        response
    }

    /// Centered oversized play button, shown only while paused.
    fn draw_big_play(&self, ui: &mut Ui, screen: Rect) -> bool {
        let center = screen.center();
        let hit = Rect::from_center_size(center, Vec2::splat(96.0));
        let resp = ui.allocate_rect(hit, Sense::click());

        let radius = if resp.hovered() { 42.0 } else { 38.0 };
        ui.painter().circle_filled(center, radius, BAR_COLOR);
        ui.painter()
            .circle_stroke(center, radius, Stroke::new(2.0, ICON_COLOR));

        let s = radius * 0.5;
        ui.painter().add(egui::Shape::convex_polygon(
            vec![
                Pos2::new(center.x - s * 0.6, center.y - s),
                Pos2::new(center.x - s * 0.6, center.y + s),
                Pos2::new(center.x + s, center.y),
            ],
            ICON_COLOR,
            Stroke::NONE,
        ));

        resp.clicked()
    }

    fn draw_bar(&self, ui: &mut Ui, screen: Rect, response: &mut ControlsResponse) {
        let bar = Rect::from_min_size(
            Pos2::new(screen.min.x, screen.max.y - BAR_HEIGHT),
            Vec2::new(screen.width(), BAR_HEIGHT),
        );
        ui.painter().rect_filled(bar, CornerRadius::ZERO, BAR_COLOR);

        let button_size = BAR_HEIGHT - PADDING * 2.0;

        // Layout: [play] [progress] [time] [mute] [volume] [fullscreen]
        let play_rect = Rect::from_min_size(
            Pos2::new(bar.min.x + PADDING, bar.min.y + PADDING),
            Vec2::splat(button_size),
        );
        let fullscreen_rect = Rect::from_min_size(
            Pos2::new(bar.max.x - button_size - PADDING, bar.min.y + PADDING),
            Vec2::splat(button_size),
        );
        let volume_rect = Rect::from_min_size(
            Pos2::new(
                fullscreen_rect.min.x - VOLUME_WIDTH - PADDING,
                bar.min.y + PADDING,
            ),
            Vec2::new(VOLUME_WIDTH, button_size),
        );
        let mute_rect = Rect::from_min_size(
            Pos2::new(
                volume_rect.min.x - button_size - PADDING,
                bar.min.y + PADDING,
            ),
            Vec2::splat(button_size),
        );
        let time_rect = Rect::from_min_size(
            Pos2::new(mute_rect.min.x - TIME_WIDTH - PADDING, bar.min.y + PADDING),
            Vec2::new(TIME_WIDTH, button_size),
        );
        let track_left = play_rect.max.x + PADDING;
        let track_width = (time_rect.min.x - PADDING - track_left).max(0.0);
        let track_rect = Rect::from_min_size(
            Pos2::new(track_left, bar.center().y - 2.5),
            Vec2::new(track_width, 5.0),
        );

        response.toggle_playback |= self.draw_play_button(ui, play_rect);
        self.draw_progress(ui, track_rect, response);
        self.draw_time_label(ui, time_rect);
        response.toggle_mute |= draw_mute_button(ui, mute_rect, self.muted);
        self.draw_volume(ui, volume_rect, response);
        response.toggle_fullscreen |= draw_fullscreen_button(ui, fullscreen_rect, self.fullscreen);
    }

    fn draw_play_button(&self, ui: &mut Ui, rect: Rect) -> bool {
        let resp = ui.allocate_rect(rect, Sense::click());
        if resp.hovered() {
            ui.painter().rect_filled(
                rect,
                CornerRadius::same(4),
                Color32::from_rgba_premultiplied(40, 40, 40, 40),
            );
        }

        let center = rect.center();
        let icon = rect.width() * 0.5;
        if self.paused {
            // Play triangle
            ui.painter().add(egui::Shape::convex_polygon(
                vec![
                    Pos2::new(center.x - icon * 0.4, center.y - icon * 0.5),
                    Pos2::new(center.x - icon * 0.4, center.y + icon * 0.5),
                    Pos2::new(center.x + icon * 0.5, center.y),
                ],
                ICON_COLOR,
                Stroke::NONE,
            ));
        } else {
            // Pause bars
            let bar_w = icon * 0.25;
            let gap = icon * 0.25;
            for side in [-1.0f32, 1.0] {
                let r = Rect::from_center_size(
                    Pos2::new(center.x + side * (gap + bar_w) * 0.5, center.y),
                    Vec2::new(bar_w, icon),
                );
                ui.painter()
                    .rect_filled(r, CornerRadius::same(2), ICON_COLOR);
            }
        }
        resp.clicked()
    }

    fn draw_progress(&self, ui: &mut Ui, rect: Rect, response: &mut ControlsResponse) {
        // Fatter hit area than the painted track
        let hit = rect.expand2(Vec2::new(0.0, 10.0));
        let resp = ui.allocate_rect(hit, Sense::click_and_drag());

        ui.painter()
            .rect_filled(rect, CornerRadius::same(3), TRACK_COLOR);

        let percent = progress_percent(self.position, self.duration);
        let fill_width = rect.width() * percent / 100.0;
        let fill = Rect::from_min_size(rect.min, Vec2::new(fill_width, rect.height()));
        ui.painter()
            .rect_filled(fill, CornerRadius::same(3), FILL_COLOR);

        if percent > 0.0 {
            let handle = Pos2::new(rect.min.x + fill_width, rect.center().y);
            let radius = if resp.hovered() || resp.dragged() { 7.0 } else { 5.0 };
            ui.painter().circle_filled(handle, radius, FILL_COLOR);
        }

        // Screen-reader story: current percent plus an elapsed-time text
        resp.widget_info(|| {
            egui::WidgetInfo::labeled(
                egui::WidgetType::Slider,
                true,
                format!("{:.0}% - {} elapsed", percent, format_time(self.position)),
            )
        });

        if self.duration > 0.0 && (resp.clicked() || resp.dragged()) {
            if let Some(pos) = resp.interact_pointer_pos() {
                response.seek_to = Some(seek_target(pos.x, rect, self.duration));
            }
        }
    }

    fn draw_time_label(&self, ui: &Ui, rect: Rect) {
        let text = format!(
            "{} / {}",
            format_time(self.position),
            format_time(self.duration)
        );
        ui.painter().text(
            rect.center(),
            Align2::CENTER_CENTER,
            text,
            FontId::proportional(13.0),
            ICON_COLOR,
        );
    }

    fn draw_volume(&self, ui: &mut Ui, rect: Rect, response: &mut ControlsResponse) {
        let mut volume = self.volume;
        let slider = egui::Slider::new(&mut volume, 0.0..=1.0).show_value(false);
        if ui.put(rect, slider).changed() {
            response.set_volume = Some(volume);
        }
    }
}

fn draw_mute_button(ui: &mut Ui, rect: Rect, muted: bool) -> bool {
    let resp = ui.allocate_rect(rect, Sense::click());
    if resp.hovered() {
        ui.painter().rect_filled(
            rect,
            CornerRadius::same(4),
            Color32::from_rgba_premultiplied(40, 40, 40, 40),
        );
    }

    // Speaker: small box plus an outward cone; a slash across it when muted
    let center = rect.center();
    let s = rect.width() * 0.25;
    ui.painter().rect_filled(
        Rect::from_center_size(Pos2::new(center.x - s * 0.8, center.y), Vec2::new(s * 0.7, s)),
        CornerRadius::ZERO,
        ICON_COLOR,
    );
    ui.painter().add(egui::Shape::convex_polygon(
        vec![
            Pos2::new(center.x - s * 0.5, center.y - s * 0.4),
            Pos2::new(center.x + s * 0.6, center.y - s),
            Pos2::new(center.x + s * 0.6, center.y + s),
            Pos2::new(center.x - s * 0.5, center.y + s * 0.4),
        ],
        ICON_COLOR,
        Stroke::NONE,
    ));
    if muted {
        ui.painter().line_segment(
            [
                Pos2::new(center.x - s * 1.3, center.y + s * 1.3),
                Pos2::new(center.x + s * 1.3, center.y - s * 1.3),
            ],
            Stroke::new(2.0, FILL_COLOR),
        );
    }
    resp.clicked()
}

fn draw_fullscreen_button(ui: &mut Ui, rect: Rect, fullscreen: bool) -> bool {
    let resp = ui.allocate_rect(rect, Sense::click());
    if resp.hovered() {
        ui.painter().rect_filled(
            rect,
            CornerRadius::same(4),
            Color32::from_rgba_premultiplied(40, 40, 40, 40),
        );
    }

    // Four corner brackets: pointing out to enter, in to exit
    let center = rect.center();
    let extent = rect.width() * 0.3;
    let arm = extent * 0.5 * if fullscreen { -1.0 } else { 1.0 };
    let stroke = Stroke::new(2.0, ICON_COLOR);
    for (sx, sy) in [(-1.0f32, -1.0f32), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
        let corner = Pos2::new(center.x + sx * extent, center.y + sy * extent);
        ui.painter()
            .line_segment([corner, Pos2::new(corner.x - sx * arm, corner.y)], stroke);
        ui.painter()
            .line_segment([corner, Pos2::new(corner.x, corner.y - sy * arm)], stroke);
    }
    resp.clicked()
}

/// `m:ss` with zero-padded seconds; invalid inputs render as 0:00.
pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Progress percent in `[0, 100]`; zero-duration media renders as 0.
pub fn progress_percent(position: f64, duration: f64) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    ((position / duration) * 100.0).clamp(0.0, 100.0) as f32
}

/// Map a pointer x within the track linearly onto the media timeline.
pub fn seek_target(pointer_x: f32, track: Rect, duration: f64) -> f64 {
    if track.width() <= 0.0 {
        return 0.0;
    }
    let rel = (pointer_x - track.min.x).clamp(0.0, track.width());
    f64::from(rel / track.width()) * duration
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_time_known_values() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(3599.0), "59:59");
    }

    #[test]
    fn format_time_tolerates_bad_input() {
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
    }

    #[test]
    fn percent_bounds_and_monotonicity() {
        let duration = 120.0;
        let mut last = -1.0f32;
        for i in 0..=120 {
            let p = progress_percent(f64::from(i), duration);
            assert!((0.0..=100.0).contains(&p));
            assert!(p >= last);
            last = p;
        }
        // Positions past the end clamp instead of overflowing
        assert_eq!(progress_percent(500.0, duration), 100.0);
        assert_eq!(progress_percent(-5.0, duration), 0.0);
        // Unknown duration renders empty, not NaN
        assert_eq!(progress_percent(10.0, 0.0), 0.0);
    }

    #[test]
    fn seek_maps_track_edges_to_timeline_edges() {
        let track = Rect::from_min_size(Pos2::new(100.0, 0.0), Vec2::new(200.0, 5.0));
        let duration = 60.0;
        assert!((seek_target(100.0, track, duration) - 0.0).abs() < 1e-6);
        assert!((seek_target(300.0, track, duration) - 60.0).abs() < 1e-6);
        assert!((seek_target(200.0, track, duration) - 30.0).abs() < 1e-6);
    }

    #[test]
    fn seek_clamps_outside_pointer_positions() {
        let track = Rect::from_min_size(Pos2::new(100.0, 0.0), Vec2::new(200.0, 5.0));
        assert_eq!(seek_target(0.0, track, 60.0), 0.0);
        assert_eq!(seek_target(1000.0, track, 60.0), 60.0);
        // Degenerate track never divides by zero
        let empty = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::new(0.0, 5.0));
        assert_eq!(seek_target(50.0, empty, 60.0), 0.0);
    }
}
