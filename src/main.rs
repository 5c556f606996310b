use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod placement;
mod presets;
mod services;

use config::Config;
use presets::PresetTable;
use services::{create_window_host, ScreenChangeReactor, Workspace};

#[derive(Parser, Debug)]
#[command(name = "screen-fit")]
#[command(about = "Подгоняет окно браузера под пресет геометрии при переходе на другой монитор")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "screen-fit.toml")]
    config: String,

    /// Режим сухого запуска (эмуляция рабочего стола в памяти)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает logging.level)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);

    // Инициализация системы логирования
    let directives = config.logging.directives(args.log_level.as_deref())?;
    init_tracing(&directives, &config.logging.format)?;

    info!("Запуск screen-fit v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные окна не затрагиваются");
    }

    // Таблица пресетов строится один раз и дальше только читается
    let presets = Arc::new(PresetTable::from_config(&config.presets));
    for (preset, geometry) in config.presets.iter() {
        info!("Пресет {}: {}", preset, geometry);
    }

    let host = create_window_host(config.clone(), args.dry_run)?;
    let workspace = Arc::new(Workspace::new(host));
    let reactor = Arc::new(ScreenChangeReactor::new(&config, presets));
    reactor.install(&workspace)?;

    info!("Все компоненты инициализированы");

    let workspace_task = workspace.clone();
    let workspace_handle = tokio::spawn(async move {
        if let Err(e) = workspace_task.run().await {
            error!("Ошибка в Workspace: {}", e);
        }
    });

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");
    workspace_handle.abort();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, workspace_handle).await {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    drop(reactor);
    info!("screen-fit завершил работу");
    Ok(())
}

fn init_tracing(directives: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directives))?;

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
