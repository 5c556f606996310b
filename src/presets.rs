//! Таблица пресетов: распознаваемые разрешения мониторов и идеальная геометрия
//! окна для каждого из них.
//!
//! Таблица строится один раз при старте из конфигурации и дальше только читается.
//! Сопоставление разрешений - строго по точному совпадению пикселей.

use crate::config::PresetsConfig;
use crate::events::Rect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Закрытый набор распознаваемых разрешений
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionPreset {
    QuadHd,
    FullHd,
}

impl ResolutionPreset {
    pub const ALL: [ResolutionPreset; 2] = [ResolutionPreset::QuadHd, ResolutionPreset::FullHd];

    /// Размер экрана в пикселях (ширина, высота)
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ResolutionPreset::QuadHd => (2560, 1440),
            ResolutionPreset::FullHd => (1920, 1080),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResolutionPreset::QuadHd => "QUAD_HD",
            ResolutionPreset::FullHd => "FULL_HD",
        }
    }

    /// Классификация геометрии экрана. `None` для любого нераспознанного размера.
    pub fn classify(geometry: &Rect) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.dimensions() == (geometry.width, geometry.height))
    }
}

impl fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.dimensions();
        write!(f, "{} ({}x{})", self.label(), width, height)
    }
}

/// Идеальная геометрия окна относительно левого верхнего угла экрана.
/// Отсутствующее поле означает "оставить текущее значение окна".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdealGeometry {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub offset_x: Option<i32>,
    #[serde(default)]
    pub offset_y: Option<i32>,
}

impl IdealGeometry {
    pub fn new(width: u32, height: u32, offset_x: i32, offset_y: i32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            offset_x: Some(offset_x),
            offset_y: Some(offset_y),
        }
    }
}

impl fmt::Display for IdealGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show<T: fmt::Display>(value: Option<T>) -> String {
            value.map_or_else(|| "-".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "{{width: {}, height: {}, x: {}, y: {}}}",
            show(self.width),
            show(self.height),
            show(self.offset_x),
            show(self.offset_y)
        )
    }
}

/// Неизменяемая таблица "пресет -> идеальная геометрия"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetTable {
    geometries: HashMap<ResolutionPreset, IdealGeometry>,
}

impl PresetTable {
    pub fn from_config(presets: &PresetsConfig) -> Self {
        let geometries = HashMap::from([
            (ResolutionPreset::QuadHd, presets.quad_hd),
            (ResolutionPreset::FullHd, presets.full_hd),
        ]);
        Self { geometries }
    }

    pub fn get(&self, preset: ResolutionPreset) -> Option<&IdealGeometry> {
        self.geometries.get(&preset)
    }

    /// Классифицирует экран и возвращает пресет вместе с его геометрией
    pub fn lookup(&self, screen_geometry: &Rect) -> Option<(ResolutionPreset, &IdealGeometry)> {
        let preset = ResolutionPreset::classify(screen_geometry)?;
        self.get(preset).map(|geometry| (preset, geometry))
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self::from_config(&PresetsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_resolutions() {
        assert_eq!(
            ResolutionPreset::classify(&Rect::new(0, 0, 2560, 1440)),
            Some(ResolutionPreset::QuadHd)
        );
        assert_eq!(
            ResolutionPreset::classify(&Rect::new(2560, 0, 1920, 1080)),
            Some(ResolutionPreset::FullHd)
        );
    }

    #[test]
    fn test_classify_is_exact_match_only() {
        for (width, height) in [(1366, 768), (1440, 2560), (1920, 1200), (2559, 1440), (0, 0)] {
            assert_eq!(ResolutionPreset::classify(&Rect::new(0, 0, width, height)), None);
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(ResolutionPreset::QuadHd.label(), "QUAD_HD");
        assert_eq!(ResolutionPreset::FullHd.label(), "FULL_HD");
        assert_eq!(ResolutionPreset::FullHd.to_string(), "FULL_HD (1920x1080)");
    }

    #[test]
    fn test_default_table() {
        let table = PresetTable::default();
        assert_eq!(
            table.get(ResolutionPreset::QuadHd),
            Some(&IdealGeometry::new(2000, 1219, 280, 110))
        );
        assert_eq!(
            table.get(ResolutionPreset::FullHd),
            Some(&IdealGeometry::new(1600, 1019, 160, 30))
        );
    }

    #[test]
    fn test_lookup() {
        let table = PresetTable::default();
        let (preset, geometry) = table.lookup(&Rect::new(100, 100, 1920, 1080)).unwrap();
        assert_eq!(preset, ResolutionPreset::FullHd);
        assert_eq!(geometry.width, Some(1600));
        assert!(table.lookup(&Rect::new(0, 0, 1366, 768)).is_none());
    }
}
