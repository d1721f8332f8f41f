//! WindowSystem: the only place that talks to the desktop.
//!
//! Two views of a process's windows are exposed, mirroring what the registry
//! needs: an introspection view (roles, minimized state, element references)
//! and the flat OS window list (numbers, owners, layers, on-screen flags).
//! Activation primitives and synthetic clicks live here too. No caching and
//! no decisions happen at this level.

mod dry_run;
#[cfg(test)]
pub mod fake;
mod x11;

pub use dry_run::DryRunWindowSystem;
pub use x11::X11WindowSystem;

use crate::error::Result;
use crate::events::{AxWindow, ElementRef, ListedWindow, Point, WindowHandle};
use std::sync::Arc;
use tracing::info;

#[async_trait::async_trait]
pub trait WindowSystem: Send + Sync {
    /// Окна процесса через интроспекцию, без фильтрации
    async fn accessibility_windows(&self, pid: u32) -> Result<Vec<AxWindow>>;

    /// Системный список окон всех процессов
    async fn window_list(&self) -> Result<Vec<ListedWindow>>;

    /// Корневой элемент процесса
    fn process_element(&self, pid: u32) -> ElementRef {
        ElementRef::Process(pid)
    }

    async fn activate_process(&self, pid: u32) -> Result<()>;

    /// Кооперативный подъём окна
    async fn raise(&self, handle: &WindowHandle) -> Result<()>;

    /// Номер самого верхнего окна процесса в стеке
    async fn topmost_window_number(&self, pid: u32) -> Result<Option<u64>>;

    /// Элемент с фокусом, если фокус сейчас у этого процесса
    async fn focused_element(&self, pid: u32) -> Result<Option<ElementRef>>;

    /// Нажатие и отпускание левой кнопки в точке (экранные координаты, начало сверху)
    async fn post_click(&self, point: Point) -> Result<()>;

    async fn screen_height(&self) -> Result<f64>;

    async fn frontmost_pid(&self) -> Result<Option<u32>>;
}

/// Factory function to create the window system backend based on the dry_run flag
pub fn create_window_system(dry_run: bool) -> Arc<dyn WindowSystem> {
    if dry_run {
        info!("Dry-run режим - действия с окнами только логируются");
        Arc::new(DryRunWindowSystem::new())
    } else {
        Arc::new(X11WindowSystem::new())
    }
}
