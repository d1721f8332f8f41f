use super::WindowSystem;
use crate::cycle_error;
use crate::debug_if_enabled;
use crate::error::{CycleError, Result};
use crate::events::{AxWindow, ElementRef, ListedWindow, Point, Rect, WindowHandle, WindowRole};
use std::collections::HashMap;
use std::process::{Command, Output};
use tracing::debug;

/// X11 через xdotool, wmctrl и xprop (EWMH)
pub struct X11WindowSystem;

impl X11WindowSystem {
    pub fn new() -> Self {
        Self
    }

    fn output(program: &str, args: &[&str]) -> Result<Output> {
        Command::new(program)
            .args(args)
            .output()
            .map_err(|e| cycle_error!(service_unavailable, "{} не найден: {}", program, e))
    }

    fn stdout(program: &str, args: &[&str]) -> Result<String> {
        let output = Self::output(program, args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} {:?} вернул ошибку: {}", program, args, stderr.trim());
            return Err(cycle_error!(internal, "{} вернул ошибку: {}", program, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn client_list() -> Result<Vec<u64>> {
        let out = Self::stdout("xprop", &["-root", "_NET_CLIENT_LIST"])?;
        Ok(parse_window_ids(&out))
    }

    /// `xdotool search` завершается с кодом 1, если ничего не нашлось
    fn windows_of_pid(pid: u32) -> Result<Vec<u64>> {
        let pid = pid.to_string();
        let output = Self::output("xdotool", &["search", "--pid", &pid])?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect())
    }

    fn window_props(id: u64) -> Result<WindowProps> {
        let id = format!("{:#x}", id);
        let out = Self::stdout(
            "xprop",
            &["-id", &id, "_NET_WM_PID", "_NET_WM_WINDOW_TYPE", "_NET_WM_STATE", "_NET_WM_NAME"],
        )?;
        Ok(parse_window_props(&out))
    }

    fn geometry(id: u64) -> Option<Rect> {
        let id = id.to_string();
        Self::stdout("xdotool", &["getwindowgeometry", "--shell", &id])
            .ok()
            .and_then(|out| parse_geometry_shell(&out))
    }

    fn current_desktop() -> Option<i64> {
        Self::stdout("wmctrl", &["-d"]).ok().and_then(|out| parse_current_desktop(&out))
    }
}

impl Default for X11WindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WindowSystem for X11WindowSystem {
    async fn accessibility_windows(&self, pid: u32) -> Result<Vec<AxWindow>> {
        let managed = Self::client_list()?;
        let owned = Self::windows_of_pid(pid)?;

        let mut windows = Vec::new();
        // Порядок перечисления - порядок _NET_CLIENT_LIST (порядок появления окон)
        for id in managed.into_iter().filter(|id| owned.contains(id)) {
            let props = match Self::window_props(id) {
                Ok(props) => props,
                Err(e) => {
                    debug!("Окно {:#x} пропущено: {}", id, e);
                    continue;
                }
            };
            if props.pid.is_some_and(|owner| owner != pid) {
                continue;
            }
            windows.push(AxWindow {
                element: ElementRef::Window(id),
                role: props.role,
                minimized: props.minimized,
                title: props.title,
                frame: Self::geometry(id),
                window_number: Some(id),
            });
        }

        debug_if_enabled!("Интроспекция pid {}: окон {}", pid, windows.len());
        Ok(windows)
    }

    async fn window_list(&self) -> Result<Vec<ListedWindow>> {
        let current = Self::current_desktop();
        let out = Self::stdout("wmctrl", &["-lpG"])?;
        Ok(out
            .lines()
            .filter_map(|line| parse_wmctrl_line(line, current))
            .collect())
    }

    async fn activate_process(&self, pid: u32) -> Result<()> {
        // В X11 нет активации процесса отдельно от окна
        debug_if_enabled!("Активация процесса {} - делегируется подъёму окна", pid);
        Ok(())
    }

    async fn raise(&self, handle: &WindowHandle) -> Result<()> {
        let id = match (handle.element, handle.window_number) {
            (ElementRef::Window(id), _) => id,
            (ElementRef::Process(_), Some(number)) => number,
            (ElementRef::Process(_), None) => {
                return Err(CycleError::StaleHandle { pid: handle.pid, slot: handle.slot });
            }
        };

        let id = format!("{:#x}", id);
        Self::stdout("wmctrl", &["-i", "-a", &id])
            .map_err(|_| CycleError::StaleHandle { pid: handle.pid, slot: handle.slot })?;
        Ok(())
    }

    async fn topmost_window_number(&self, pid: u32) -> Result<Option<u64>> {
        let stacking = parse_window_ids(&Self::stdout("xprop", &["-root", "_NET_CLIENT_LIST_STACKING"])?);
        let owners: HashMap<u64, u32> = self
            .window_list()
            .await?
            .into_iter()
            .map(|window| (window.number, window.owner_pid))
            .collect();

        // Стек перечисляется снизу вверх
        Ok(stacking
            .into_iter()
            .rev()
            .find(|id| owners.get(id) == Some(&pid)))
    }

    async fn focused_element(&self, pid: u32) -> Result<Option<ElementRef>> {
        let Ok(active) = Self::stdout("xdotool", &["getactivewindow"]) else {
            return Ok(None);
        };
        let Ok(id) = active.trim().parse::<u64>() else {
            return Ok(None);
        };
        let owner = Self::stdout("xdotool", &["getwindowpid", &id.to_string()])
            .ok()
            .and_then(|out| out.trim().parse::<u32>().ok());

        Ok((owner == Some(pid)).then_some(ElementRef::Window(id)))
    }

    async fn post_click(&self, point: Point) -> Result<()> {
        let x = (point.x.round() as i64).to_string();
        let y = (point.y.round() as i64).to_string();
        // Нажатие и отпускание в одном вызове: клик завершён до проверки
        Self::stdout("xdotool", &["mousemove", "--sync", &x, &y, "mousedown", "1", "mouseup", "1"])?;
        Ok(())
    }

    async fn screen_height(&self) -> Result<f64> {
        let out = Self::stdout("xdotool", &["getdisplaygeometry"])?;
        parse_display_height(&out).ok_or_else(|| cycle_error!(internal, "Неожиданный вывод getdisplaygeometry: {}", out.trim()))
    }

    async fn frontmost_pid(&self) -> Result<Option<u32>> {
        Ok(Self::stdout("xdotool", &["getactivewindow", "getwindowpid"])
            .ok()
            .and_then(|out| out.trim().parse().ok()))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct WindowProps {
    pid: Option<u32>,
    role: WindowRole,
    minimized: bool,
    title: String,
}

fn parse_hex(token: &str) -> Option<u64> {
    let token = token.trim().trim_end_matches(',');
    let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

/// `_NET_CLIENT_LIST(WINDOW): window id # 0x1e00003, 0x2a00007`
fn parse_window_ids(out: &str) -> Vec<u64> {
    out.split_once('#')
        .map(|(_, ids)| ids.split(',').filter_map(parse_hex).collect())
        .unwrap_or_default()
}

fn next_token(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some((&rest[..end], &rest[end..]))
}

/// Строка `wmctrl -lpG`: id, рабочий стол, pid, x, y, ширина, высота, хост, заголовок
fn parse_wmctrl_line(line: &str, current_desktop: Option<i64>) -> Option<ListedWindow> {
    let (id, rest) = next_token(line)?;
    let (desktop, rest) = next_token(rest)?;
    let (pid, rest) = next_token(rest)?;
    let (x, rest) = next_token(rest)?;
    let (y, rest) = next_token(rest)?;
    let (width, rest) = next_token(rest)?;
    let (height, rest) = next_token(rest)?;
    let title = next_token(rest).map(|(_, title)| title.trim()).unwrap_or("");

    let desktop: i64 = desktop.parse().ok()?;
    let frame = Rect::new(
        x.parse().ok()?,
        y.parse().ok()?,
        width.parse().ok()?,
        height.parse().ok()?,
    );

    Some(ListedWindow {
        number: parse_hex(id)?,
        owner_pid: pid.parse().ok()?,
        // Липкие окна (-1) - панели и доки, обычные окна на слое 0
        layer: if desktop < 0 { 1 } else { 0 },
        on_screen: desktop < 0 || current_desktop.map_or(true, |current| current == desktop),
        title: title.to_string(),
        frame: Some(frame),
    })
}

/// Текущий рабочий стол из `wmctrl -d` (строка со звёздочкой)
fn parse_current_desktop(out: &str) -> Option<i64> {
    out.lines().find_map(|line| {
        let (index, rest) = next_token(line)?;
        let (marker, _) = next_token(rest)?;
        (marker == "*").then(|| index.parse().ok()).flatten()
    })
}

fn role_from_type(atom: &str, modal: bool) -> WindowRole {
    match atom.trim_start_matches("_NET_WM_WINDOW_TYPE_") {
        "NORMAL" => WindowRole::Standard,
        "DIALOG" if modal => WindowRole::Sheet,
        "DIALOG" => WindowRole::Dialog,
        "DOCK" | "TOOLBAR" | "UTILITY" | "MENU" => WindowRole::Panel,
        other => WindowRole::Other(other.to_lowercase()),
    }
}

fn parse_window_props(out: &str) -> WindowProps {
    let mut pid = None;
    let mut window_type: Option<String> = None;
    let mut states: Vec<String> = Vec::new();
    let mut title = String::new();

    for line in out.lines() {
        let Some((name, value)) = line.split_once(" = ") else {
            continue;
        };
        let value = value.trim();
        if name.starts_with("_NET_WM_PID") {
            pid = value.parse().ok();
        } else if name.starts_with("_NET_WM_WINDOW_TYPE") {
            window_type = value.split(',').next().map(|atom| atom.trim().to_string());
        } else if name.starts_with("_NET_WM_STATE") {
            states = value.split(',').map(|atom| atom.trim().to_string()).collect();
        } else if name.starts_with("_NET_WM_NAME") {
            title = value.trim_matches('"').to_string();
        }
    }

    let modal = states.iter().any(|state| state == "_NET_WM_STATE_MODAL");
    WindowProps {
        pid,
        // Без _NET_WM_WINDOW_TYPE окно считается обычным
        role: window_type.map_or(WindowRole::Standard, |atom| role_from_type(&atom, modal)),
        minimized: states.iter().any(|state| state == "_NET_WM_STATE_HIDDEN"),
        title,
    }
}

fn parse_geometry_shell(out: &str) -> Option<Rect> {
    let mut values: HashMap<&str, f64> = HashMap::new();
    for line in out.lines() {
        if let Some((key, value)) = line.trim().split_once('=') {
            if let Ok(value) = value.parse() {
                values.insert(key, value);
            }
        }
    }
    Some(Rect::new(
        *values.get("X")?,
        *values.get("Y")?,
        *values.get("WIDTH")?,
        *values.get("HEIGHT")?,
    ))
}

fn parse_display_height(out: &str) -> Option<f64> {
    out.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window_ids() {
        let out = "_NET_CLIENT_LIST_STACKING(WINDOW): window id # 0x1e00003, 0x2a00007, 0x3c0000a\n";
        assert_eq!(parse_window_ids(out), vec![0x1e00003, 0x2a00007, 0x3c0000a]);
        assert!(parse_window_ids("_NET_CLIENT_LIST:  not found.").is_empty());
    }

    #[test]
    fn test_parse_wmctrl_line() {
        let line = "0x02c00007  0 4321   10   38   1900 1000 workstation Inbox - Mail  (draft)";
        let window = parse_wmctrl_line(line, Some(0)).unwrap();
        assert_eq!(window.number, 0x02c00007);
        assert_eq!(window.owner_pid, 4321);
        assert_eq!(window.layer, 0);
        assert!(window.on_screen);
        assert_eq!(window.title, "Inbox - Mail  (draft)");
        assert_eq!(window.frame, Some(Rect::new(10.0, 38.0, 1900.0, 1000.0)));
    }

    #[test]
    fn test_parse_wmctrl_line_other_desktop_and_sticky() {
        let hidden = parse_wmctrl_line("0x01  2 10 0 0 100 100 host Title", Some(0)).unwrap();
        assert!(!hidden.on_screen);

        let panel = parse_wmctrl_line("0x02 -1 11 0 0 1920 30 host panel", Some(0)).unwrap();
        assert!(panel.on_screen);
        assert_eq!(panel.layer, 1);

        let untitled = parse_wmctrl_line("0x03  0 12 0 0 10 10 host", Some(0)).unwrap();
        assert_eq!(untitled.title, "");

        assert!(parse_wmctrl_line("garbage", None).is_none());
    }

    #[test]
    fn test_parse_current_desktop() {
        let out = "0  - DG: 3840x1080  VP: N/A  WA: 0,0 3840x1080  Work\n\
                   1  * DG: 3840x1080  VP: 0,0  WA: 0,0 3840x1080  Web\n";
        assert_eq!(parse_current_desktop(out), Some(1));
        assert_eq!(parse_current_desktop(""), None);
    }

    #[test]
    fn test_parse_window_props() {
        let out = "_NET_WM_PID(CARDINAL) = 4321\n\
                   _NET_WM_WINDOW_TYPE(ATOM) = _NET_WM_WINDOW_TYPE_NORMAL\n\
                   _NET_WM_STATE(ATOM) = _NET_WM_STATE_HIDDEN, _NET_WM_STATE_MAXIMIZED_VERT\n\
                   _NET_WM_NAME(UTF8_STRING) = \"Inbox = Mail\"\n";
        let props = parse_window_props(out);
        assert_eq!(props.pid, Some(4321));
        assert_eq!(props.role, WindowRole::Standard);
        assert!(props.minimized);
        assert_eq!(props.title, "Inbox = Mail");
    }

    #[test]
    fn test_window_roles() {
        let dialog = parse_window_props("_NET_WM_WINDOW_TYPE(ATOM) = _NET_WM_WINDOW_TYPE_DIALOG\n");
        assert_eq!(dialog.role, WindowRole::Dialog);

        let sheet = parse_window_props(
            "_NET_WM_WINDOW_TYPE(ATOM) = _NET_WM_WINDOW_TYPE_DIALOG\n_NET_WM_STATE(ATOM) = _NET_WM_STATE_MODAL\n",
        );
        assert_eq!(sheet.role, WindowRole::Sheet);

        let untyped = parse_window_props("_NET_WM_WINDOW_TYPE:  not found.\n");
        assert_eq!(untyped.role, WindowRole::Standard);
        assert!(!untyped.minimized);

        assert_eq!(role_from_type("_NET_WM_WINDOW_TYPE_DOCK", false), WindowRole::Panel);
        assert_eq!(role_from_type("_NET_WM_WINDOW_TYPE_SPLASH", false), WindowRole::Other("splash".into()));
    }

    #[test]
    fn test_parse_geometry_shell() {
        let out = "WINDOW=46137351\nX=10\nY=38\nWIDTH=1900\nHEIGHT=1000\nSCREEN=0\n";
        assert_eq!(parse_geometry_shell(out), Some(Rect::new(10.0, 38.0, 1900.0, 1000.0)));
        assert_eq!(parse_geometry_shell("WINDOW=1\n"), None);
    }

    #[test]
    fn test_parse_display_height() {
        assert_eq!(parse_display_height("1920 1080\n"), Some(1080.0));
        assert_eq!(parse_display_height("1920"), None);
    }
}
