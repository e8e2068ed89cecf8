pub mod controls;
pub mod overlay;

pub use overlay::EguiOverlay;
