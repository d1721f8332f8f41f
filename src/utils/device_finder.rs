use crate::error::{CycleError, Result};
use evdev::KeyCode as EvKey;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct DeviceFinder;

impl DeviceFinder {
    /// Путь к клавиатуре: явно указанный или найденный автоматически (`auto`)
    pub fn find_keyboard_device(device_path: &str) -> Result<PathBuf> {
        if device_path != "auto" {
            let path = PathBuf::from(device_path);
            if path.exists() {
                info!("Используется указанное устройство: {:?}", path);
                return Ok(path);
            }
            return CycleError::device_not_found(format!("Указанное устройство не найдено: {:?}", path));
        }

        info!("Автопоиск клавиатурного устройства...");
        if let Some(device) = Self::find_by_id()? {
            info!("Найдено устройство по ID: {:?}", device);
            return Ok(device);
        }
        if let Some(device) = Self::find_by_event_devices()? {
            info!("Найдено устройство среди event устройств: {:?}", device);
            return Ok(device);
        }

        CycleError::device_not_found(
            "Не удалось найти клавиатуру. Убедитесь, что пользователь добавлен в группу 'input'",
        )
    }

    fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir)
            .map_err(|e| CycleError::Permission(format!("Нет доступа к {}: {}", dir.display(), e)))?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        paths.sort();
        Ok(paths)
    }

    fn find_by_id() -> Result<Option<PathBuf>> {
        let by_id = Path::new("/dev/input/by-id");
        if !by_id.exists() {
            debug!("Директория /dev/input/by-id не существует");
            return Ok(None);
        }

        let mut candidates: Vec<(PathBuf, u32)> = Self::list_dir(by_id)?
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                let priority = by_id_priority(&name)?;
                Some((path, priority))
            })
            .filter(|(path, _)| Self::is_keyboard_device(path))
            .collect();

        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(candidates.into_iter().next().map(|(path, _)| path))
    }

    fn find_by_event_devices() -> Result<Option<PathBuf>> {
        Ok(Self::list_dir(Path::new("/dev/input"))?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("event"))
            })
            .find(|path| Self::is_keyboard_device(path)))
    }

    fn is_keyboard_device(path: &Path) -> bool {
        let device = match evdev::Device::open(path) {
            Ok(device) => device,
            Err(e) => {
                debug!("Не удалось открыть устройство {:?}: {}", path, e);
                return false;
            }
        };

        let name = device.name().unwrap_or("Unknown").to_lowercase();
        if is_pointer_name(&name) {
            debug!("Исключаем устройство как мышь/тачпад: {:?} ({})", path, name);
            return false;
        }

        // У настоящей клавиатуры есть буквы, пробел, Enter и много других клавиш
        let has_keys = device.supported_keys().is_some_and(|keys| {
            keys.contains(EvKey::KEY_A)
                && keys.contains(EvKey::KEY_SPACE)
                && keys.contains(EvKey::KEY_ENTER)
                && keys.iter().count() > 20
        });
        debug!("Устройство {:?} ({}) клавиатура: {}", path, name, has_keys);
        has_keys
    }
}

fn is_pointer_name(name: &str) -> bool {
    let name = name.to_lowercase();
    ["mouse", "deathadder", "touchpad", "trackpoint"]
        .iter()
        .any(|marker| name.contains(marker))
}

/// Приоритет устройства из /dev/input/by-id по имени ссылки; `None` - не клавиатура
fn by_id_priority(name: &str) -> Option<u32> {
    let looks_like_keyboard = (name.contains("kbd") || name.to_lowercase().contains("keyboard")) && name.contains("event");
    if !looks_like_keyboard || is_pointer_name(name) {
        return None;
    }
    Some(if name.ends_with("event-kbd") {
        100
    } else if name.to_lowercase().contains("keyboard") {
        50
    } else {
        10
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_keyboard_device_with_specific_path() {
        let result = DeviceFinder::find_keyboard_device("/non/existent/path");
        assert!(matches!(result, Err(CycleError::DeviceNotFound(_))));
    }

    #[test]
    fn test_by_id_priority() {
        assert_eq!(by_id_priority("usb-Logitech_USB_Keyboard-event-kbd"), Some(100));
        assert_eq!(by_id_priority("usb-Some_Keyboard-if01-event-mouse"), None);
        assert_eq!(by_id_priority("usb-Vendor_Keyboard-event-if02"), Some(50));
        assert_eq!(by_id_priority("usb-Razer_DeathAdder-event-kbd"), None);
        assert_eq!(by_id_priority("usb-Mouse-event-mouse"), None);
    }
}
