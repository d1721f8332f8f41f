use std::collections::HashMap;
use once_cell::sync::Lazy;

/// Имена клавиш, допустимые в хоткеях групп, и их коды evdev
pub struct KeycodeMap;

const HOTKEY_KEYS: &[(&str, u16)] = &[
    // Буквы в порядке раскладки (коды evdev идут рядами)
    ("q", 16), ("w", 17), ("e", 18), ("r", 19), ("t", 20), ("y", 21), ("u", 22), ("i", 23), ("o", 24), ("p", 25),
    ("a", 30), ("s", 31), ("d", 32), ("f", 33), ("g", 34), ("h", 35), ("j", 36), ("k", 37), ("l", 38),
    ("z", 44), ("x", 45), ("c", 46), ("v", 47), ("b", 48), ("n", 49), ("m", 50),
    // Цифровой ряд
    ("1", 2), ("2", 3), ("3", 4), ("4", 5), ("5", 6), ("6", 7), ("7", 8), ("8", 9), ("9", 10), ("0", 11),
    // Функциональные клавиши
    ("f1", 59), ("f2", 60), ("f3", 61), ("f4", 62), ("f5", 63), ("f6", 64),
    ("f7", 65), ("f8", 66), ("f9", 67), ("f10", 68), ("f11", 87), ("f12", 88),
    // Прочие
    ("grave", 41), ("tab", 15), ("space", 57), ("enter", 28), ("escape", 1),
    ("minus", 12), ("equal", 13), ("comma", 51), ("dot", 52), ("slash", 53),
    ("semicolon", 39), ("apostrophe", 40), ("leftbrace", 26), ("rightbrace", 27),
];

/// Левые и правые варианты модификаторов
const MODIFIER_KEYS: &[(&str, u16)] = &[
    ("ctrl", 29), ("ctrl", 97),
    ("shift", 42), ("shift", 54),
    ("alt", 56), ("alt", 100),
    ("super", 125), ("super", 126),
];

static KEY_NAME_TO_CODE: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    HOTKEY_KEYS.iter().copied().collect()
});

static CODE_TO_KEY_NAME: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    HOTKEY_KEYS.iter().map(|&(name, code)| (code, name)).collect()
});

static CODE_TO_MODIFIER: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    MODIFIER_KEYS.iter().map(|&(name, code)| (code, name)).collect()
});

impl KeycodeMap {
    /// Получить код клавиши по её имени
    pub fn get_keycode(key_name: &str) -> Result<u16, String> {
        let normalized = key_name.trim().to_lowercase();
        let normalized = match normalized.as_str() {
            "esc" => "escape",
            "return" => "enter",
            "`" => "grave",
            other => other,
        };
        KEY_NAME_TO_CODE.get(normalized)
            .copied()
            .ok_or_else(|| format!("Неизвестная клавиша: {}", key_name))
    }

    /// Получить имя клавиши по её коду
    pub fn get_key_name(keycode: u16) -> Option<&'static str> {
        CODE_TO_KEY_NAME.get(&keycode).copied()
            .or_else(|| CODE_TO_MODIFIER.get(&keycode).copied())
    }

    /// Имя модификатора ("ctrl", "alt", ...) для кода левой или правой клавиши
    pub fn modifier_name(keycode: u16) -> Option<&'static str> {
        CODE_TO_MODIFIER.get(&keycode).copied()
    }
}
