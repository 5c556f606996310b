use crate::events::{Rect, Screen, WindowInfo};
use crate::presets::{IdealGeometry, PresetTable, ResolutionPreset};
use std::fmt;

/// Частичное изменение рамки окна: заданные поля перекрывают текущие,
/// отсутствующие остаются как есть.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryPatch {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl GeometryPatch {
    /// Абсолютная целевая геометрия для окна на экране `screen`
    pub fn for_screen(screen: &Screen, ideal: &IdealGeometry) -> Self {
        Self {
            x: ideal.offset_x.map(|offset| screen.geometry.x + offset),
            y: ideal.offset_y.map(|offset| screen.geometry.y + offset),
            width: ideal.width,
            height: ideal.height,
        }
    }

    /// Применяет изменения к копии текущей рамки
    pub fn apply(&self, current: &Rect) -> Rect {
        Rect {
            x: self.x.unwrap_or(current.x),
            y: self.y.unwrap_or(current.y),
            width: self.width.unwrap_or(current.width),
            height: self.height.unwrap_or(current.height),
        }
    }
}

/// Решение реактора для одного уведомления о смене монитора
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    SkipFullScreen,
    SkipMaximized,
    UnrecognizedResolution,
    Resize {
        preset: ResolutionPreset,
        frame: Rect,
    },
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::SkipFullScreen => write!(f, "окно в полноэкранном режиме"),
            Placement::SkipMaximized => write!(f, "окно развёрнуто"),
            Placement::UnrecognizedResolution => write!(f, "разрешение экрана не распознано"),
            Placement::Resize { preset, frame } => write!(f, "{} -> {}", preset, frame),
        }
    }
}

/// Чистая функция: что сделать с окном на его текущем экране.
/// Зависит только от снимка окна и таблицы пресетов.
pub fn plan(window: &WindowInfo, table: &PresetTable) -> Placement {
    if window.full_screen {
        return Placement::SkipFullScreen;
    }

    // Любое ненулевое значение - не трогаем
    if window.is_maximized() {
        return Placement::SkipMaximized;
    }

    let Some((preset, ideal)) = table.lookup(&window.output.geometry) else {
        return Placement::UnrecognizedResolution;
    };

    let patch = GeometryPatch::for_screen(&window.output, ideal);
    Placement::Resize {
        preset,
        frame: patch.apply(&window.frame_geometry),
    }
}
