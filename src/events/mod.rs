pub mod screen;
pub mod window;

pub use screen::{Rect, Screen};
pub use window::{WindowEvent, WindowId, WindowInfo};
