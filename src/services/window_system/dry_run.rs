use super::WindowSystem;
use crate::error::Result;
use crate::events::{AxWindow, ElementRef, ListedWindow, Point, Rect, WindowHandle, WindowRole};
use parking_lot::Mutex;
use tracing::info;

/// Эмуляция рабочего стола: несколько фиктивных окон, действия только логируются
pub struct DryRunWindowSystem {
    windows: Vec<ListedWindow>,
    focused: Mutex<Option<(u32, u64)>>,
}

impl DryRunWindowSystem {
    pub fn new() -> Self {
        let fake = [
            (0x0100_0001, 1001, "Terminal - dry_run"),
            (0x0100_0002, 1002, "Browser - dry_run"),
            (0x0100_0003, 1002, "Browser (2) - dry_run"),
            (0x0100_0004, 1003, "Editor - dry_run"),
        ];

        let windows = fake
            .iter()
            .enumerate()
            .map(|(i, (number, pid, title))| ListedWindow {
                number: *number,
                owner_pid: *pid,
                layer: 0,
                on_screen: true,
                title: title.to_string(),
                frame: Some(Rect::new(40.0 * i as f64, 30.0 * i as f64, 1280.0, 800.0)),
            })
            .collect();

        Self {
            windows,
            focused: Mutex::new(None),
        }
    }
}

impl Default for DryRunWindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WindowSystem for DryRunWindowSystem {
    async fn accessibility_windows(&self, pid: u32) -> Result<Vec<AxWindow>> {
        Ok(self
            .windows
            .iter()
            .filter(|window| window.owner_pid == pid)
            .map(|window| AxWindow {
                element: ElementRef::Window(window.number),
                role: WindowRole::Standard,
                minimized: false,
                title: window.title.clone(),
                frame: window.frame,
                window_number: Some(window.number),
            })
            .collect())
    }

    async fn window_list(&self) -> Result<Vec<ListedWindow>> {
        Ok(self.windows.clone())
    }

    async fn activate_process(&self, pid: u32) -> Result<()> {
        info!("Dry-run: активация процесса {}", pid);
        Ok(())
    }

    async fn raise(&self, handle: &WindowHandle) -> Result<()> {
        info!("Dry-run: поднимаем окно {}", handle);
        if let Some(number) = handle.window_number {
            *self.focused.lock() = Some((handle.pid, number));
        }
        Ok(())
    }

    async fn topmost_window_number(&self, pid: u32) -> Result<Option<u64>> {
        Ok(self
            .focused
            .lock()
            .filter(|(owner, _)| *owner == pid)
            .map(|(_, number)| number))
    }

    async fn focused_element(&self, pid: u32) -> Result<Option<ElementRef>> {
        Ok(self.topmost_window_number(pid).await?.map(ElementRef::Window))
    }

    async fn post_click(&self, point: Point) -> Result<()> {
        info!("Dry-run: клик в ({:.0}, {:.0})", point.x, point.y);
        Ok(())
    }

    async fn screen_height(&self) -> Result<f64> {
        Ok(1080.0)
    }

    async fn frontmost_pid(&self) -> Result<Option<u32>> {
        Ok(self.focused.lock().map(|(pid, _)| pid))
    }
}
