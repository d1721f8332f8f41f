//! Window registry: enumerates a process's windows into stable handles.
//!
//! Every enumeration first drops all cached handles of that process, so a
//! handle is only valid until the next enumeration of its pid. Handles are
//! cached twice: by `(pid, slot)` and, when known, by window number.

use crate::debug_if_enabled;
use crate::error::{CycleError, Result};
use crate::events::{AxWindow, ElementRef, ListedWindow, WindowHandle};
use crate::services::window_system::WindowSystem;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct WindowRegistry {
    system: Arc<dyn WindowSystem>,
    by_slot: DashMap<(u32, usize), WindowHandle>,
    by_number: DashMap<u64, WindowHandle>,
}

impl WindowRegistry {
    pub fn new(system: Arc<dyn WindowSystem>) -> Self {
        Self {
            system,
            by_slot: DashMap::new(),
            by_number: DashMap::new(),
        }
    }

    /// Свежее перечисление окон процесса
    pub async fn windows(&self, pid: u32) -> Result<Vec<WindowHandle>> {
        self.invalidate(pid);

        let raw = match self.system.accessibility_windows(pid).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Интроспекция процесса {} не удалась: {}", pid, e);
                Vec::new()
            }
        };
        let standard: Vec<&AxWindow> = raw
            .iter()
            .filter(|window| window.role.is_standard() && !window.minimized)
            .collect();

        let handles = if standard.is_empty() {
            debug!("{}, пробуем системный список окон", CycleError::EnumerationEmpty { pid });
            self.fallback(pid, &raw).await?
        } else {
            standard
                .into_iter()
                .enumerate()
                .map(|(slot, window)| WindowHandle {
                    pid,
                    slot,
                    element: window.element,
                    window_number: window.window_number,
                    title: window.title.clone(),
                    frame: window.frame,
                })
                .collect()
        };

        if handles.is_empty() {
            info!("{}", CycleError::EnumerationEmpty { pid });
        }

        for handle in &handles {
            self.by_slot.insert((pid, handle.slot), handle.clone());
            if let Some(number) = handle.window_number {
                self.by_number.insert(number, handle.clone());
            }
        }

        debug_if_enabled!("Процесс {}: окон {}", pid, handles.len());
        Ok(handles)
    }

    async fn fallback(&self, pid: u32, raw: &[AxWindow]) -> Result<Vec<WindowHandle>> {
        let listed: Vec<ListedWindow> = self
            .system
            .window_list()
            .await?
            .into_iter()
            .filter(|window| window.owner_pid == pid && window.on_screen && window.layer == 0)
            .collect();

        Ok(pair_positionally(pid, &listed, raw, self.system.process_element(pid)))
    }

    pub fn cached_by_slot(&self, pid: u32, slot: usize) -> Option<WindowHandle> {
        self.by_slot.get(&(pid, slot)).map(|entry| entry.value().clone())
    }

    pub fn cached_by_number(&self, number: u64) -> Option<WindowHandle> {
        self.by_number.get(&number).map(|entry| entry.value().clone())
    }

    pub fn invalidate(&self, pid: u32) {
        self.by_slot.retain(|(owner, _), _| *owner != pid);
        self.by_number.retain(|_, handle| handle.pid != pid);
    }
}

/// N-е окно системного списка получает N-й элемент интроспекции,
/// а если элементов меньше - корневой элемент процесса
pub fn pair_positionally(
    pid: u32,
    listed: &[ListedWindow],
    raw: &[AxWindow],
    process_element: ElementRef,
) -> Vec<WindowHandle> {
    listed
        .iter()
        .enumerate()
        .map(|(slot, window)| WindowHandle {
            pid,
            slot,
            element: raw.get(slot).map_or(process_element, |element| element.element),
            window_number: Some(window.number),
            title: window.title.clone(),
            frame: window.frame,
        })
        .collect()
}
