use crate::presets::{IdealGeometry, ResolutionPreset};
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub target: TargetConfig,
    pub host: HostConfig,
    /// Не сериализуется в базовый слой figment: таблица пресета из файла
    /// заменяет встроенную целиком, а опущенное поле значит "не менять".
    #[serde(default, skip_serializing)]
    pub presets: PresetsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl LoggingConfig {
    /// Директивы `EnvFilter`. Уровень из командной строки заменяет и
    /// `level`, и `filter`: иначе более точная директива из `filter`
    /// (например `screen_fit=info`) перекрыла бы его для самого крейта.
    pub fn directives(&self, cli_level: Option<&str>) -> Result<String> {
        match cli_level {
            Some(level) => {
                validate_level(level)?;
                Ok(level.to_string())
            }
            None if self.filter.trim().is_empty() => Ok(self.level.clone()),
            None => Ok(format!("{},{}", self.level, self.filter)),
        }
    }
}

fn validate_level(level: &str) -> Result<()> {
    if !LOG_LEVELS.contains(&level) {
        anyhow::bail!("Неверный уровень логирования: {}", level);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Идентификатор приложения, окна которого отслеживаются
    pub resource_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    pub polling_interval_ms: u64,
    pub dry_run_hop_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PresetsConfig {
    #[serde(default = "default_quad_hd")]
    pub quad_hd: IdealGeometry,
    #[serde(default = "default_full_hd")]
    pub full_hd: IdealGeometry,
}

// Смещения заранее посчитаны так, чтобы окно было по центру
fn default_quad_hd() -> IdealGeometry {
    IdealGeometry::new(2000, 1219, 280, 110)
}

fn default_full_hd() -> IdealGeometry {
    IdealGeometry::new(1600, 1019, 160, 30)
}

impl PresetsConfig {
    pub fn iter(&self) -> impl Iterator<Item = (ResolutionPreset, &IdealGeometry)> {
        [
            (ResolutionPreset::QuadHd, &self.quad_hd),
            (ResolutionPreset::FullHd, &self.full_hd),
        ]
        .into_iter()
    }
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            quad_hd: default_quad_hd(),
            full_hd: default_full_hd(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                filter: "screen_fit=info".to_string(),
            },
            target: TargetConfig {
                resource_name: "librewolf".to_string(),
            },
            host: HostConfig {
                polling_interval_ms: 500,
                dry_run_hop_interval_ms: 10_000,
            },
            presets: PresetsConfig::default(),
        }
    }
}

impl Config {
    /// Загружает конфигурацию: значения по умолчанию, затем TOML-файл
    /// (если он есть), затем переменные окружения `SCREEN_FIT_*`.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let config: Config = Self::figment(config_path)
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("SCREEN_FIT_").split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        validate_level(&self.logging.level)?;

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.target.resource_name.trim().is_empty() {
            anyhow::bail!("target.resource_name не может быть пустым");
        }

        if self.host.polling_interval_ms < 100 {
            anyhow::bail!("polling_interval_ms должно быть минимум 100");
        }

        if self.host.dry_run_hop_interval_ms == 0 {
            anyhow::bail!("dry_run_hop_interval_ms должно быть больше 0");
        }

        // Валидация пресетов
        for (preset, geometry) in self.presets.iter() {
            if geometry.width == Some(0) || geometry.height == Some(0) {
                anyhow::bail!("Нулевой размер окна в пресете {}", preset.label());
            }
        }

        Ok(())
    }
}
