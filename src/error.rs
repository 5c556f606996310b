use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenFitError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Команда {command} завершилась с ошибкой: {stderr}")]
    Command { command: String, stderr: String },

    #[error("Не удалось разобрать вывод {source_name}: {details}")]
    Parse { source_name: String, details: String },

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl ScreenFitError {
    pub fn parse(source_name: impl Into<String>, details: impl Into<String>) -> Self {
        ScreenFitError::Parse {
            source_name: source_name.into(),
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScreenFitError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! screen_fit_error {
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::ScreenFitError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::ScreenFitError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let err = ScreenFitError::parse("xrandr", "нет мониторов");
        assert_eq!(
            err.to_string(),
            "Не удалось разобрать вывод xrandr: нет мониторов"
        );
    }

    #[test]
    fn test_error_macro() {
        let err = screen_fit_error!(internal, "окно {} пропало", "0x01");
        assert!(matches!(err, ScreenFitError::Internal(ref m) if m == "окно 0x01 пропало"));
    }
}
