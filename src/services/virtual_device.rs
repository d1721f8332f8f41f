use crate::error::{CycleError, Result};
use crate::events::{KeyCode, KeyState};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, info};

const EV_SYN: i32 = 0;
const EV_KEY: i32 = 1;

/// Виртуальная клавиатура uinput: через неё проходят все клавиши, кроме хоткеев групп
pub struct VirtualDevice {
    device: Option<Mutex<uinput::Device>>,
    /// Клавиши, нажатые через устройство и ещё не отпущенные
    pressed: Mutex<SmallVec<[u16; 8]>>,
    dry_run: bool,
}

impl VirtualDevice {
    pub fn new(device_name: &str, dry_run: bool) -> Result<Self> {
        info!("Инициализация VirtualDevice '{}' (dry_run: {})", device_name, dry_run);

        let device = if dry_run {
            None
        } else {
            Some(Mutex::new(Self::create_virtual_device(device_name)?))
        };

        Ok(Self {
            device,
            pressed: Mutex::new(SmallVec::new()),
            dry_run,
        })
    }

    fn create_virtual_device(device_name: &str) -> Result<uinput::Device> {
        info!("Создание виртуального устройства uinput '{}'", device_name);

        let device = uinput::default()?
            .name(device_name)?
            .event(uinput::event::Keyboard::All)?
            .create()
            .map_err(|e| CycleError::Internal(format!("Не удалось создать виртуальное устройство '{}': {}", device_name, e)))?;

        info!("Виртуальное устройство '{}' создано успешно", device_name);
        Ok(device)
    }

    pub fn send_key(&self, key: KeyCode, state: KeyState) -> Result<()> {
        self.track(key.value(), state);

        if self.dry_run {
            debug!("[DRY RUN] Проброс {} {:?}", key, state);
            return Ok(());
        }

        let device = self
            .device
            .as_ref()
            .ok_or_else(|| CycleError::Internal("Виртуальное устройство недоступно".to_string()))?;
        let mut device = device.lock();

        device
            .write(EV_KEY, key.value() as i32, state.value())
            .map_err(|e| CycleError::Internal(format!("Не удалось отправить событие клавиши {}: {}", key, e)))?;
        device
            .write(EV_SYN, 0, 0)
            .map_err(|e| CycleError::Internal(format!("Не удалось синхронизировать события: {}", e)))?;
        Ok(())
    }

    fn track(&self, code: u16, state: KeyState) {
        let mut pressed = self.pressed.lock();
        match state {
            KeyState::Pressed if !pressed.contains(&code) => pressed.push(code),
            KeyState::Released => pressed.retain(|held| *held != code),
            _ => {}
        }
    }

    pub fn pressed_keys(&self) -> Vec<u16> {
        self.pressed.lock().to_vec()
    }

    /// Отпустить всё, что осталось нажатым (при завершении работы)
    pub fn release_all_keys(&self) -> Result<()> {
        let held = self.pressed_keys();
        if !held.is_empty() {
            info!("Отпускаем залипшие клавиши: {:?}", held);
        }
        for code in held {
            self.send_key(KeyCode::new(code), KeyState::Released)?;
        }
        Ok(())
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if !self.dry_run {
            info!("Закрытие виртуального устройства");
        }
    }
}
