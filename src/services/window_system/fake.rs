//! Scripted window system for tests: returns canned windows and records every call.

use super::WindowSystem;
use crate::error::{CycleError, Result};
use crate::events::{AxWindow, ElementRef, ListedWindow, Point, WindowHandle};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct FakeState {
    ax: HashMap<u32, Vec<AxWindow>>,
    list: Vec<ListedWindow>,
    /// raise принимается, но окно не поднимается
    stubborn: HashSet<ElementRef>,
    /// raise возвращает ошибку
    broken: HashSet<ElementRef>,
    /// интроспекция процесса возвращает ошибку
    opaque: HashSet<u32>,
    /// клик в точке фокусирует окно (pid, элемент, номер)
    click_targets: Vec<(Point, u32, ElementRef, Option<u64>)>,
    focused: HashMap<u32, ElementRef>,
    topmost: HashMap<u32, u64>,
    frontmost: Option<u32>,
    screen_height: f64,
    calls: Vec<String>,
}

pub struct FakeWindowSystem {
    state: Mutex<FakeState>,
}

impl FakeWindowSystem {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                screen_height: 1080.0,
                ..FakeState::default()
            }),
        }
    }

    pub fn set_ax_windows(&self, pid: u32, windows: Vec<AxWindow>) {
        self.state.lock().ax.insert(pid, windows);
    }

    pub fn set_window_list(&self, list: Vec<ListedWindow>) {
        self.state.lock().list = list;
    }

    pub fn make_stubborn(&self, element: ElementRef) {
        self.state.lock().stubborn.insert(element);
    }

    pub fn make_broken(&self, element: ElementRef) {
        self.state.lock().broken.insert(element);
    }

    pub fn make_opaque(&self, pid: u32) {
        self.state.lock().opaque.insert(pid);
    }

    pub fn focus_on_click(&self, point: Point, pid: u32, element: ElementRef, number: Option<u64>) {
        self.state.lock().click_targets.push((point, pid, element, number));
    }

    pub fn set_screen_height(&self, height: f64) {
        self.state.lock().screen_height = height;
    }

    pub fn set_frontmost(&self, pid: Option<u32>) {
        self.state.lock().frontmost = pid;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state.lock().calls.iter().filter(|call| call.starts_with(prefix)).count()
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.calls()
            .iter()
            .filter_map(|call| {
                let coords = call.strip_prefix("click ")?;
                let (x, y) = coords.split_once(',')?;
                Some(Point::new(x.parse().ok()?, y.parse().ok()?))
            })
            .collect()
    }

    fn record(state: &mut FakeState, call: String) {
        state.calls.push(call);
    }
}

impl Default for FakeWindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WindowSystem for FakeWindowSystem {
    async fn accessibility_windows(&self, pid: u32) -> Result<Vec<AxWindow>> {
        let mut state = self.state.lock();
        Self::record(&mut state, format!("ax {}", pid));
        if state.opaque.contains(&pid) {
            return Err(CycleError::ServiceUnavailable(format!("интроспекция процесса {}", pid)));
        }
        Ok(state.ax.get(&pid).cloned().unwrap_or_default())
    }

    async fn window_list(&self) -> Result<Vec<ListedWindow>> {
        let mut state = self.state.lock();
        Self::record(&mut state, "list".to_string());
        Ok(state.list.clone())
    }

    async fn activate_process(&self, pid: u32) -> Result<()> {
        let mut state = self.state.lock();
        Self::record(&mut state, format!("activate {}", pid));
        Ok(())
    }

    async fn raise(&self, handle: &WindowHandle) -> Result<()> {
        let mut state = self.state.lock();
        Self::record(&mut state, format!("raise {}", handle.element));

        if state.broken.contains(&handle.element) {
            return Err(CycleError::StaleHandle { pid: handle.pid, slot: handle.slot });
        }
        if state.stubborn.contains(&handle.element) {
            return Ok(());
        }
        state.focused.insert(handle.pid, handle.element);
        if let Some(number) = handle.window_number {
            state.topmost.insert(handle.pid, number);
        }
        state.frontmost = Some(handle.pid);
        Ok(())
    }

    async fn topmost_window_number(&self, pid: u32) -> Result<Option<u64>> {
        Ok(self.state.lock().topmost.get(&pid).copied())
    }

    async fn focused_element(&self, pid: u32) -> Result<Option<ElementRef>> {
        Ok(self.state.lock().focused.get(&pid).copied())
    }

    async fn post_click(&self, point: Point) -> Result<()> {
        let mut state = self.state.lock();
        Self::record(&mut state, format!("click {},{}", point.x, point.y));

        let hit = state
            .click_targets
            .iter()
            .find(|(target, ..)| (target.x - point.x).abs() < 0.5 && (target.y - point.y).abs() < 0.5)
            .cloned();
        if let Some((_, pid, element, number)) = hit {
            state.focused.insert(pid, element);
            if let Some(number) = number {
                state.topmost.insert(pid, number);
            }
            state.frontmost = Some(pid);
        }
        Ok(())
    }

    async fn screen_height(&self) -> Result<f64> {
        Ok(self.state.lock().screen_height)
    }

    async fn frontmost_pid(&self) -> Result<Option<u32>> {
        Ok(self.state.lock().frontmost)
    }
}
