use crate::error::{CycleError, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Есть ли у процесса доступ к управлению чужими окнами
pub trait PermissionGate: Send + Sync {
    fn is_granted(&self) -> bool;
}

/// X11: задан DISPLAY и X-сервер отвечает xdotool
pub struct X11PermissionGate;

impl PermissionGate for X11PermissionGate {
    fn is_granted(&self) -> bool {
        if std::env::var_os("DISPLAY").is_none() {
            debug!("DISPLAY не задан");
            return false;
        }
        Command::new("xdotool")
            .arg("getdisplaygeometry")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

/// Для dry-run
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn is_granted(&self) -> bool {
        true
    }
}

pub fn create_permission_gate(dry_run: bool) -> Arc<dyn PermissionGate> {
    if dry_run {
        Arc::new(AlwaysGranted)
    } else {
        Arc::new(X11PermissionGate)
    }
}

/// Последнее известное состояние доступа, которое публикует [`PermissionPoller`]
#[derive(Clone)]
pub struct PermissionStatus {
    granted: watch::Receiver<bool>,
}

impl PermissionStatus {
    /// Состояние, которое никогда не меняется
    #[cfg(test)]
    pub fn fixed(granted: bool) -> Self {
        let (_tx, granted) = watch::channel(granted);
        Self { granted }
    }

    pub fn is_granted(&self) -> bool {
        *self.granted.borrow()
    }

    /// Дождаться выдачи доступа; `false`, если опрос прекратился раньше
    #[cfg(test)]
    pub async fn wait_granted(&mut self) -> bool {
        self.granted.wait_for(|granted| *granted).await.is_ok()
    }
}

/// Периодическая проверка доступа; останавливается при первом успехе или по отмене
pub struct PermissionPoller {
    handle: JoinHandle<()>,
    granted: watch::Receiver<bool>,
}

impl PermissionPoller {
    pub fn start(gate: Arc<dyn PermissionGate>, interval: Duration) -> Self {
        let (tx, granted) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut attempts = 0u32;
            loop {
                ticker.tick().await;
                attempts += 1;
                if gate.is_granted() {
                    info!("Доступ к окнам получен (попытка {})", attempts);
                    let _ = tx.send(true);
                    break;
                }
                if attempts == 1 {
                    warn!("{}", CycleError::PermissionDenied("ожидаем доступ к X-серверу".to_string()));
                }
            }
        });

        Self { handle, granted }
    }

    /// Состояние для потребителей; сам gate после старта опрашивает только поллер
    pub fn status(&self) -> PermissionStatus {
        PermissionStatus {
            granted: self.granted.clone(),
        }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for PermissionPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Проверить права доступа к устройствам ввода для захвата хоткеев
pub fn check_input_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    check_input_devices_access()?;
    check_uinput_access()?;
    check_not_root();

    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_input_devices_access() -> Result<()> {
    let input_dir = "/dev/input";

    if !std::path::Path::new(input_dir).exists() {
        return Err(CycleError::Permission(format!("Директория {} не существует", input_dir)));
    }

    match fs::read_dir(input_dir) {
        Ok(_) => {
            info!("Доступ к {} подтвержден", input_dir);
            Ok(())
        }
        Err(e) => Err(CycleError::Permission(format!(
            "Нет доступа к {}: {}. Добавьте пользователя в группу 'input'",
            input_dir, e
        ))),
    }
}

fn check_uinput_access() -> Result<()> {
    let uinput_device = "/dev/uinput";

    if !std::path::Path::new(uinput_device).exists() {
        warn!("{} не существует, возможно модуль uinput не загружен", uinput_device);
        return Ok(());
    }

    let metadata = fs::metadata(uinput_device).map_err(|e| {
        CycleError::Permission(format!("Не удалось проверить права доступа к {}: {}", uinput_device, e))
    })?;

    if !mode_allows_group_or_other(metadata.permissions().mode()) {
        return Err(CycleError::Permission(format!(
            "Нет прав доступа к {}. Добавьте пользователя в группу 'uinput' или 'input'",
            uinput_device
        )));
    }

    info!("Доступ к {} подтвержден", uinput_device);
    Ok(())
}

fn mode_allows_group_or_other(mode: u32) -> bool {
    mode & 0o006 != 0 || mode & 0o060 != 0
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("⚠️  Приложение запущено от имени root!");
            warn!("   Рекомендуется: sudo usermod -a -G input,uinput $USER && sudo modprobe uinput");
        }
        Ok(user) => info!("Приложение запущено от имени пользователя: {}", user),
        Err(_) => warn!("Не удалось определить пользователя"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct GrantAfter {
        checks: AtomicUsize,
        after: usize,
    }

    impl PermissionGate for GrantAfter {
        fn is_granted(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) + 1 >= self.after
        }
    }

    #[test]
    fn test_uinput_mode_check() {
        assert!(mode_allows_group_or_other(0o660));
        assert!(mode_allows_group_or_other(0o666));
        assert!(!mode_allows_group_or_other(0o600));
    }

    #[tokio::test]
    async fn test_poller_stops_after_grant() {
        let gate = Arc::new(GrantAfter { checks: AtomicUsize::new(0), after: 3 });
        let poller = PermissionPoller::start(gate.clone(), Duration::from_millis(5));
        let mut status = poller.status();

        assert!(status.wait_granted().await);
        assert!(status.is_granted());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(gate.checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_poller_never_grants() {
        let gate = Arc::new(GrantAfter { checks: AtomicUsize::new(0), after: usize::MAX });
        let poller = PermissionPoller::start(gate, Duration::from_millis(5));
        let mut status = poller.status();
        poller.cancel();

        assert!(!status.wait_granted().await);
        assert!(!status.is_granted());
    }

    #[test]
    fn test_fixed_status_outlives_its_sender() {
        assert!(PermissionStatus::fixed(true).is_granted());
        assert!(!PermissionStatus::fixed(false).is_granted());
    }
}
