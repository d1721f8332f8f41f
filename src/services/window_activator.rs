//! Window activator: brings one specific window of a process to the front.
//!
//! Resolution order for the target handle is the numeric cache, then a fresh
//! enumeration matched by number, then the slot cache. The raise sequence is
//! process activation, cooperative raise and verification. If verification
//! fails a synthetic click on the title bar is tried. Failures are logged and
//! never propagated to the caller.

use crate::debug_if_enabled;
use crate::error::{CycleError, Result};
use crate::events::{ElementRef, Point, Rect, WindowHandle};
use crate::services::window_registry::WindowRegistry;
use crate::services::window_system::WindowSystem;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const TITLE_BAR_INSET_MIN: f64 = 8.0;
const TITLE_BAR_INSET_MAX: f64 = 22.0;

#[derive(Debug, Clone)]
pub struct ActivationSettings {
    /// Пауза перед проверкой результата
    pub verify_delay: Duration,
    pub click_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Raised,
    Clicked,
    /// Окно найдено, попытка сделана, но подтверждения нет
    Unconfirmed,
    NoWindow,
}

pub struct WindowActivator {
    system: Arc<dyn WindowSystem>,
    registry: Arc<WindowRegistry>,
    settings: ActivationSettings,
}

impl WindowActivator {
    pub fn new(system: Arc<dyn WindowSystem>, registry: Arc<WindowRegistry>, settings: ActivationSettings) -> Self {
        Self { system, registry, settings }
    }

    /// `true`, если окно поднято, либо попытка была сделана для найденного окна
    pub async fn raise(&self, pid: u32, slot: Option<usize>, window_number: Option<u64>) -> bool {
        match self.activate(pid, slot, window_number).await {
            Ok(ActivationOutcome::NoWindow) => {
                info!("У процесса {} нет окна для активации", pid);
                false
            }
            Ok(outcome) => {
                debug_if_enabled!("Активация pid {}: {:?}", pid, outcome);
                true
            }
            Err(e) => {
                warn!("Ошибка активации pid {}: {}", pid, e);
                false
            }
        }
    }

    pub async fn activate(&self, pid: u32, slot: Option<usize>, window_number: Option<u64>) -> Result<ActivationOutcome> {
        let Some(handle) = self.resolve(pid, slot, window_number).await? else {
            return Ok(ActivationOutcome::NoWindow);
        };

        match self.raise_handle(&handle).await {
            Err(e) if e.requires_reenumeration() => {
                // Устаревший дескриптор: одно повторное перечисление
                warn!("{} - перечисляем окна заново", e);
                let fresh = self.registry.windows(pid).await?;
                let retry = handle
                    .window_number
                    .and_then(|number| fresh.iter().find(|h| h.window_number == Some(number)))
                    .or_else(|| fresh.get(handle.slot))
                    .or_else(|| fresh.first());
                match retry {
                    Some(retry) => self.raise_handle(retry).await,
                    None => Ok(ActivationOutcome::NoWindow),
                }
            }
            other => other,
        }
    }

    async fn resolve(&self, pid: u32, slot: Option<usize>, window_number: Option<u64>) -> Result<Option<WindowHandle>> {
        if let Some(number) = window_number {
            if let Some(handle) = self.registry.cached_by_number(number).filter(|h| h.pid == pid) {
                return Ok(Some(handle));
            }
            let fresh = self.registry.windows(pid).await?;
            if let Some(handle) = fresh.into_iter().find(|h| h.window_number == Some(number)) {
                return Ok(Some(handle));
            }
        }

        let slot = slot.unwrap_or(0);
        if let Some(handle) = self.registry.cached_by_slot(pid, slot) {
            return Ok(Some(handle));
        }

        let fresh = self.registry.windows(pid).await?;
        Ok(fresh.get(slot).or_else(|| fresh.first()).cloned())
    }

    async fn raise_handle(&self, handle: &WindowHandle) -> Result<ActivationOutcome> {
        self.system.activate_process(handle.pid).await?;
        self.system.raise(handle).await.map_err(|e| {
            debug!("raise для {} не удался: {}", handle, e);
            CycleError::StaleHandle { pid: handle.pid, slot: handle.slot }
        })?;

        if self.verify(handle).await {
            return Ok(ActivationOutcome::Raised);
        }

        if self.settings.click_fallback {
            if let Some(frame) = handle.frame {
                let screen_height = self.system.screen_height().await.ok();
                for point in title_bar_points(&frame, screen_height) {
                    debug_if_enabled!("Клик по заголовку {} в ({:.0}, {:.0})", handle, point.x, point.y);
                    if let Err(e) = self.system.post_click(point).await {
                        warn!("Синтетический клик не удался: {}", e);
                        continue;
                    }
                    if self.verify(handle).await {
                        info!("Окно {} поднято кликом по заголовку", handle);
                        return Ok(ActivationOutcome::Clicked);
                    }
                }
            }
        }

        warn!("{}", CycleError::ActivationUnconfirmed { pid: handle.pid });
        Ok(ActivationOutcome::Unconfirmed)
    }

    /// Сильная проверка по номеру окна, иначе слабая по элементу с фокусом
    async fn verify(&self, handle: &WindowHandle) -> bool {
        if !self.settings.verify_delay.is_zero() {
            tokio::time::sleep(self.settings.verify_delay).await;
        }

        if let Some(number) = handle.window_number {
            match self.system.topmost_window_number(handle.pid).await {
                Ok(topmost) => return topmost == Some(number),
                Err(e) => debug!("Стек окон недоступен ({}), проверяем фокус", e),
            }
        }

        let focused: Option<ElementRef> = self.system.focused_element(handle.pid).await.ok().flatten();
        focused == Some(handle.element)
    }
}

/// Точки для клика по заголовку: от верхнего края и от перевёрнутого (нижнего) начала координат
pub fn title_bar_points(frame: &Rect, screen_height: Option<f64>) -> SmallVec<[Point; 2]> {
    let inset = (frame.height / 2.0).clamp(TITLE_BAR_INSET_MIN, TITLE_BAR_INSET_MAX);
    let x = frame.center_x();
    let top = Point::new(x, frame.y + inset);

    let mut points = SmallVec::new();
    points.push(top);
    if let Some(height) = screen_height {
        let flipped = Point::new(x, height - frame.max_y() + inset);
        if (flipped.y - top.y).abs() > 1.0 {
            points.push(flipped);
        }
    }
    points
}
