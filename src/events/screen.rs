use serde::{Deserialize, Serialize};
use std::fmt;

/// Прямоугольник в глобальных координатах рабочего стола
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Площадь пересечения двух прямоугольников (0, если не пересекаются)
    pub fn overlap_area(&self, other: &Rect) -> u64 {
        let left = i64::from(self.x).max(i64::from(other.x));
        let top = i64::from(self.y).max(i64::from(other.y));
        let right = (i64::from(self.x) + i64::from(self.width))
            .min(i64::from(other.x) + i64::from(other.width));
        let bottom = (i64::from(self.y) + i64::from(self.height))
            .min(i64::from(other.y) + i64::from(other.height));

        if right <= left || bottom <= top {
            return 0;
        }
        ((right - left) * (bottom - top)) as u64
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Монитор: имя и геометрия в глобальном пространстве
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Screen {
    pub name: String,
    pub geometry: Rect,
}

impl Screen {
    pub fn new(name: impl Into<String>, geometry: Rect) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }

    /// Монитор, которому принадлежит окно: наибольшее перекрытие с рамкой,
    /// иначе первый монитор из списка.
    pub fn containing<'a>(screens: &'a [Screen], frame: &Rect) -> Option<&'a Screen> {
        let mut best: Option<(&Screen, u64)> = None;
        for screen in screens {
            let area = screen.geometry.overlap_area(frame);
            if area > 0 && best.map_or(true, |(_, best_area)| area > best_area) {
                best = Some((screen, area));
            }
        }
        best.map(|(screen, _)| screen).or_else(|| screens.first())
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.geometry)
    }
}
