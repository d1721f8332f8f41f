use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
mod config;
mod cycling;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use cycling::{GroupStore, MemoryGroupStore, SessionMachine};
use services::hud::{hud_channel, spawn_log_presenter};
use services::{
    command_channel, create_keyboard_listener, create_process_service, create_window_system, CycleCoordinator,
    VirtualDevice, WindowActivator, WindowRegistry,
};
use utils::permissions::{create_permission_gate, PermissionPoller};

#[derive(Parser, Debug)]
#[command(name = "shortcut-cycle")]
#[command(about = "Глобальные хоткеи для циклического переключения между группами приложений")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "cycle.toml")]
    config: String,

    /// Режим сухого запуска (без реальных действий)
    #[arg(long)]
    dry_run: bool,

    /// Фильтр логирования (перекрывает logging.level и logging.filter)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Arc::new(Config::load(&args.config)?);

    let filter = args.log_level.clone().unwrap_or_else(|| config.logging.directive());
    init_tracing(&filter, &config.logging.format)?;

    info!("Запуск Shortcut Cycle v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {} (групп: {})", args.config, config.groups.len());

    if args.dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    } else {
        utils::permissions::check_input_permissions()?;
    }

    // Сервисы окон и процессов
    let window_system = create_window_system(args.dry_run);
    let registry = Arc::new(WindowRegistry::new(window_system.clone()));
    let activator = Arc::new(WindowActivator::new(
        window_system.clone(),
        registry,
        config.activation_settings(),
    ));
    let processes = create_process_service(window_system, args.dry_run);

    // Доступ к окнам проверяет только поллер, координатор читает опубликованное состояние
    let poller = PermissionPoller::start(create_permission_gate(args.dry_run), config.poll_interval());

    // Сессии и координатор
    let store: Arc<dyn GroupStore> = Arc::new(MemoryGroupStore::new(config.groups()?));
    for group in store.groups() {
        match group.hotkey {
            Some(hotkey) => info!("Группа [{}] '{}': {} приложений, хоткей {}", group.id, group.name, group.apps.len(), hotkey),
            None => warn!("Группа [{}] '{}' без хоткея", group.id, group.name),
        }
    }
    let machine = SessionMachine::new(store, config.session_settings());
    let (hud_tx, hud_rx) = hud_channel();
    let (commands, commands_rx) = command_channel();
    let coordinator = CycleCoordinator::new(machine, processes, activator, poller.status(), hud_tx, commands.clone());

    // Захват клавиатуры
    let virtual_device = Arc::new(VirtualDevice::new("Shortcut Cycle Virtual Keyboard", args.dry_run)?);
    let keyboard_listener = create_keyboard_listener(config.clone(), commands, virtual_device.clone(), args.dry_run)?;

    info!("Все компоненты инициализированы");

    let hud_handle = spawn_log_presenter(hud_rx);
    let coordinator_handle = tokio::spawn(async move {
        if let Err(e) = coordinator.run(commands_rx).await {
            error!("Ошибка в CycleCoordinator: {}", e);
        }
    });
    let keyboard_handle = tokio::spawn(async move {
        if let Err(e) = keyboard_listener.run().await {
            error!("Ошибка в KeyboardListener: {}", e);
        }
    });

    info!("Все сервисы запущены");

    match signal::ctrl_c().await {
        Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
        Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
    }

    info!("Завершение работы...");

    poller.cancel();

    // Гарантируем отсутствие залипших клавиш
    if let Err(e) = virtual_device.release_all_keys() {
        warn!("Не удалось выполнить release_all_keys: {}", e);
    }

    // Прерываем задачи: захват клавиатуры освобождается вместе с устройством
    keyboard_handle.abort();
    coordinator_handle.abort();
    hud_handle.abort();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let _ = keyboard_handle.await;
        let _ = coordinator_handle.await;
        let _ = hud_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("Shortcut Cycle завершил работу");
    Ok(())
}

fn init_tracing(filter: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;

    let compact = (format == "compact").then(|| tracing_subscriber::fmt::layer().compact());
    let pretty = (format != "compact").then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(pretty)
        .init();

    Ok(())
}
