use super::screen::{Rect, Screen};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Непрозрачный идентификатор окна у хоста (используется только для поиска и логов)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Снимок состояния окна у хоста
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub internal_id: WindowId,
    /// Идентификатор приложения-владельца
    pub resource_name: String,
    pub full_screen: bool,
    /// 0 - не развёрнуто, 1 - по вертикали, 2 - по горизонтали, 3 - полностью.
    /// Прочие значения не документированы.
    pub maximize_mode: u32,
    pub output: Screen,
    pub frame_geometry: Rect,
}

impl WindowInfo {
    pub const UNMAXIMIZED: u32 = 0;

    pub fn new(
        internal_id: WindowId,
        resource_name: impl Into<String>,
        output: Screen,
        frame_geometry: Rect,
    ) -> Self {
        Self {
            internal_id,
            resource_name: resource_name.into(),
            full_screen: false,
            maximize_mode: Self::UNMAXIMIZED,
            output,
            frame_geometry,
        }
    }

    pub fn with_full_screen(mut self, full_screen: bool) -> Self {
        self.full_screen = full_screen;
        self
    }

    pub fn with_maximize_mode(mut self, maximize_mode: u32) -> Self {
        self.maximize_mode = maximize_mode;
        self
    }

    pub fn is_maximized(&self) -> bool {
        self.maximize_mode != Self::UNMAXIMIZED
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} на {}",
            self.internal_id, self.resource_name, self.frame_geometry, self.output.name
        )
    }
}

/// Уведомления хоста о жизненном цикле окон
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Added(WindowInfo),
    OutputChanged(WindowId),
    Removed(WindowId),
}

impl WindowEvent {
    pub fn window_id(&self) -> &WindowId {
        match self {
            WindowEvent::Added(window) => &window.internal_id,
            WindowEvent::OutputChanged(id) | WindowEvent::Removed(id) => id,
        }
    }
}

impl fmt::Display for WindowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowEvent::Added(window) => write!(f, "Added: {}", window),
            WindowEvent::OutputChanged(id) => write!(f, "OutputChanged: {}", id),
            WindowEvent::Removed(id) => write!(f, "Removed: {}", id),
        }
    }
}
