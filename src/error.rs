use thiserror::Error;

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка uinput: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("Устройство не найдено: {0}")]
    DeviceNotFound(String),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    /// Доступ к окнам других процессов не выдан - подсистема не работает до выдачи
    #[error("Нет доступа к управлению окнами: {0}")]
    PermissionDenied(String),

    /// У процесса не нашлось ни одного окна
    #[error("Окна процесса {pid} не найдены")]
    EnumerationEmpty { pid: u32 },

    /// Ни обычный raise, ни синтетический клик не подтвердились
    #[error("Активация окна процесса {pid} не подтверждена")]
    ActivationUnconfirmed { pid: u32 },

    /// Закэшированный дескриптор окна больше не резолвится
    #[error("Устаревший дескриптор окна: pid {pid}, слот {slot}")]
    StaleHandle { pid: u32, slot: usize },

    #[error("Не удалось запустить приложение '{0}': {1}")]
    Launch(String, String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl CycleError {
    pub fn device_not_found<T>(msg: impl Into<String>) -> Result<T> {
        Err(CycleError::DeviceNotFound(msg.into()))
    }

    /// Ошибки, после которых достаточно перечислить окна процесса заново
    pub fn requires_reenumeration(&self) -> bool {
        matches!(
            self,
            CycleError::EnumerationEmpty { .. } | CycleError::StaleHandle { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CycleError>;

#[macro_export]
macro_rules! cycle_error {
    (permission_denied, $($arg:tt)*) => {
        $crate::error::CycleError::PermissionDenied(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::CycleError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::CycleError::Internal(format!($($arg)*))
    };
}
