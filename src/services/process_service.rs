//! Process and launch service: which apps are running, which one is in front,
//! and how to start a group member that is not running yet.

use crate::cycling::{AppRef, RunningApp};
use crate::debug_if_enabled;
use crate::error::{CycleError, Result};
use crate::services::window_system::WindowSystem;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

#[async_trait::async_trait]
pub trait ProcessService: Send + Sync {
    /// Все процессы, владеющие окнами
    async fn running_instances(&self) -> Result<Vec<RunningApp>>;

    async fn frontmost(&self) -> Result<Option<RunningApp>>;

    async fn launch(&self, app: &AppRef) -> Result<()>;
}

/// Linux: владельцы окон из системного списка, идентификатор приложения через sysinfo
pub struct LinuxProcessService {
    system: Arc<dyn WindowSystem>,
    processes: Mutex<System>,
}

impl LinuxProcessService {
    pub fn new(system: Arc<dyn WindowSystem>) -> Self {
        Self {
            system,
            processes: Mutex::new(System::new()),
        }
    }

    /// Обновить сведения только о нужных pid и вернуть их идентификаторы приложений
    fn resolve(&self, pids: &[u32]) -> Vec<RunningApp> {
        let targets: Vec<Pid> = pids.iter().map(|pid| Pid::from_u32(*pid)).collect();
        let mut processes = self.processes.lock();
        processes.refresh_processes(ProcessesToUpdate::Some(&targets), true);

        pids.iter()
            .filter_map(|&pid| {
                let process = processes.process(Pid::from_u32(pid))?;
                let id = app_id_from_parts(process.exe(), process.name())?;
                Some(RunningApp::new(id, pid))
            })
            .collect()
    }
}

/// Имя исполняемого файла, либо имя процесса, если exe недоступен
pub fn app_id_from_parts(exe: Option<&Path>, name: &OsStr) -> Option<String> {
    let from_exe = exe.and_then(|exe| {
        exe.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.trim_end_matches(" (deleted)").to_string())
    });

    from_exe
        .or_else(|| name.to_str().map(|name| name.trim().to_string()))
        .filter(|id| !id.is_empty())
}

/// Разбить команду запуска на программу и аргументы по правилам shell (кавычки, экранирование)
pub fn split_command(app: &AppRef) -> Result<(String, Vec<String>)> {
    let mut parts = shell_words::split(app.launch_command())
        .map_err(|e| CycleError::Launch(app.id.clone(), format!("неверная команда запуска: {}", e)))?
        .into_iter();
    let program = parts
        .next()
        .ok_or_else(|| CycleError::Launch(app.id.clone(), "пустая команда".to_string()))?;
    Ok((program, parts.collect()))
}

fn spawn_detached(app: &AppRef) -> Result<()> {
    let (program, args) = split_command(app)?;

    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| CycleError::Launch(app.id.clone(), e.to_string()))?;

    info!("Запущено приложение '{}' (pid {})", app.display_name(), child.id());

    // Дочерний процесс забираем в фоне, чтобы не оставлять зомби
    tokio::task::spawn_blocking(move || {
        if let Err(e) = child.wait() {
            debug!("Ожидание дочернего процесса прервано: {}", e);
        }
    });
    Ok(())
}

#[async_trait::async_trait]
impl ProcessService for LinuxProcessService {
    async fn running_instances(&self) -> Result<Vec<RunningApp>> {
        let owners: BTreeSet<u32> = self
            .system
            .window_list()
            .await?
            .into_iter()
            .map(|window| window.owner_pid)
            .filter(|pid| *pid != 0)
            .collect();

        let owners: Vec<u32> = owners.into_iter().collect();
        let running = self.resolve(&owners);
        debug_if_enabled!("Запущенных процессов с окнами: {}", running.len());
        Ok(running)
    }

    async fn frontmost(&self) -> Result<Option<RunningApp>> {
        Ok(self
            .system
            .frontmost_pid()
            .await?
            .and_then(|pid| self.resolve(&[pid]).into_iter().next()))
    }

    async fn launch(&self, app: &AppRef) -> Result<()> {
        spawn_detached(app)
    }
}

/// Dry-run: фиксированный набор процессов, запуск только логируется
pub struct DryRunProcessService {
    system: Arc<dyn WindowSystem>,
}

impl DryRunProcessService {
    const APPS: [(u32, &'static str); 3] = [(1001, "alacritty"), (1002, "firefox"), (1003, "code")];

    pub fn new(system: Arc<dyn WindowSystem>) -> Self {
        Self { system }
    }

    fn app_for(pid: u32) -> Option<RunningApp> {
        Self::APPS
            .iter()
            .find(|(known, _)| *known == pid)
            .map(|(pid, id)| RunningApp::new(*id, *pid))
    }
}

#[async_trait::async_trait]
impl ProcessService for DryRunProcessService {
    async fn running_instances(&self) -> Result<Vec<RunningApp>> {
        Ok(Self::APPS.iter().map(|(pid, id)| RunningApp::new(*id, *pid)).collect())
    }

    async fn frontmost(&self) -> Result<Option<RunningApp>> {
        Ok(self.system.frontmost_pid().await?.and_then(Self::app_for))
    }

    async fn launch(&self, app: &AppRef) -> Result<()> {
        match split_command(app) {
            Ok((program, args)) => info!("Dry-run: запуск '{}' {:?}", program, args),
            Err(e) => warn!("Dry-run: {}", e),
        }
        Ok(())
    }
}

pub fn create_process_service(system: Arc<dyn WindowSystem>, dry_run: bool) -> Arc<dyn ProcessService> {
    if dry_run {
        Arc::new(DryRunProcessService::new(system))
    } else {
        Arc::new(LinuxProcessService::new(system))
    }
}
