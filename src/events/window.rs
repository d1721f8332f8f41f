use serde::{Deserialize, Serialize};
use std::fmt;

/// Точка в экранных координатах (начало - левый верхний угол)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Геометрия окна
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }
}

/// Непрозрачная ссылка на элемент окна, которую понимает только бэкенд
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementRef {
    /// Конкретное окно
    Window(u64),
    /// Корневой элемент процесса - когда собственного элемента окна не нашлось
    Process(u32),
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRef::Window(id) => write!(f, "window:{:#x}", id),
            ElementRef::Process(pid) => write!(f, "process:{}", pid),
        }
    }
}

/// Роль окна с точки зрения интроспекции
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowRole {
    Standard,
    Dialog,
    Panel,
    Sheet,
    Other(String),
}

impl WindowRole {
    pub fn is_standard(&self) -> bool {
        matches!(self, WindowRole::Standard)
    }
}

/// Окно, как его видит API интроспекции (без фильтрации)
#[derive(Debug, Clone, PartialEq)]
pub struct AxWindow {
    pub element: ElementRef,
    pub role: WindowRole,
    pub minimized: bool,
    pub title: String,
    pub frame: Option<Rect>,
    pub window_number: Option<u64>,
}

/// Запись системного списка окон
#[derive(Debug, Clone, PartialEq)]
pub struct ListedWindow {
    pub number: u64,
    pub owner_pid: u32,
    pub layer: i32,
    pub on_screen: bool,
    pub title: String,
    pub frame: Option<Rect>,
}

/// Окно процесса со стабильным слотом в рамках одного перечисления
#[derive(Debug, Clone, PartialEq)]
pub struct WindowHandle {
    pub pid: u32,
    pub slot: usize,
    pub element: ElementRef,
    pub window_number: Option<u64>,
    pub title: String,
    pub frame: Option<Rect>,
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" (pid {}, слот {}, {})", self.title, self.pid, self.slot, self.element)
    }
}
