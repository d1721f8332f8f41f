use crate::events::Modifiers;
use crate::services::keycode_map::KeycodeMap;
use smallvec::SmallVec;

/// Зажатые физические модификаторы (левый и правый учитываются отдельно)
#[derive(Debug, Default)]
pub struct ModifierState {
    held: SmallVec<[u16; 8]>,
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true`, если код - модификатор и состояние учтено
    pub fn update_key(&mut self, code: u16, pressed: bool) -> bool {
        if KeycodeMap::modifier_name(code).is_none() {
            return false;
        }
        if pressed {
            if !self.held.contains(&code) {
                self.held.push(code);
            }
        } else {
            self.held.retain(|held| *held != code);
        }
        true
    }

    pub fn to_modifiers(&self) -> Modifiers {
        let mut modifiers = Modifiers::new();
        for code in &self.held {
            match KeycodeMap::modifier_name(*code) {
                Some("ctrl") => modifiers.ctrl = true,
                Some("alt") => modifiers.alt = true,
                Some("shift") => modifiers.shift = true,
                Some("super") => modifiers.super_key = true,
                _ => {}
            }
        }
        modifiers
    }
}
