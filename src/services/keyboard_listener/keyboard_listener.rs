use crate::cycling::GroupId;
use crate::error::{CycleError, Result};
use crate::events::{Hotkey, KeyCode, KeyState};
use crate::services::cycle_coordinator::CommandSender;
use crate::services::VirtualDevice;
use crate::trace_if_enabled;
use crate::utils::DeviceFinder;
use evdev::{Device, EventType, InputEvent};
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::hotkey_router::HotkeyRouter;
use super::r#trait::KeyboardListenerTrait;

pub struct RealKeyboardListener {
    device: Device,
    router: HotkeyRouter,
    commands: CommandSender,
    virtual_device: Arc<VirtualDevice>,
}

impl RealKeyboardListener {
    pub fn new(
        device_path: &str,
        bindings: Vec<(Hotkey, GroupId)>,
        commands: CommandSender,
        virtual_device: Arc<VirtualDevice>,
    ) -> Result<Self> {
        info!("Инициализация RealKeyboardListener ({} хоткеев)", bindings.len());

        let device_path = DeviceFinder::find_keyboard_device(device_path)?;

        let mut device = Device::open(&device_path).map_err(|e| {
            CycleError::DeviceNotFound(format!("Не удалось открыть устройство {:?}: {}", device_path, e))
        })?;

        match device.grab() {
            Ok(_) => Self::log_grabbed_device(&device),
            Err(e) => {
                Self::log_grab_error(&device_path, &e);
                return Err(CycleError::Permission(format!(
                    "Не удалось захватить устройство эксклюзивно: {}",
                    e
                )));
            }
        }

        Ok(Self {
            device,
            router: HotkeyRouter::new(bindings),
            commands,
            virtual_device,
        })
    }

    async fn run_impl(self) -> Result<()> {
        let Self { device, mut router, commands, virtual_device } = self;
        info!("RealKeyboardListener запущен, начинаем чтение событий");

        let mut stream = device.into_event_stream()?;
        loop {
            let event = match stream.next_event().await {
                Ok(event) => event,
                Err(e) => {
                    error!("Ошибка чтения событий: {}", e);
                    if let Err(e) = stream.device_mut().ungrab() {
                        warn!("Не удалось освободить устройство: {}", e);
                    }
                    return Err(CycleError::Io(e));
                }
            };

            if !Self::handle_event(&mut router, &commands, &virtual_device, event) {
                info!("Координатор остановлен, прекращаем чтение клавиатуры");
                if let Err(e) = stream.device_mut().ungrab() {
                    warn!("Не удалось освободить устройство: {}", e);
                }
                return Ok(());
            }
        }
    }

    /// `false`, если канал команд закрыт
    fn handle_event(
        router: &mut HotkeyRouter,
        commands: &CommandSender,
        virtual_device: &VirtualDevice,
        event: InputEvent,
    ) -> bool {
        if event.event_type() != EventType::KEY {
            return true;
        }
        let Some(state) = KeyState::from_value(event.value()) else {
            debug!("Неизвестное значение события: {}", event.value());
            return true;
        };

        let routed = router.route(event.code(), state, Instant::now());
        trace_if_enabled!("Клавиша {} {:?} -> {:?}", KeyCode::new(event.code()), state, routed);

        if routed.passthrough {
            if let Err(e) = virtual_device.send_key(KeyCode::new(event.code()), state) {
                debug!("Не удалось пробросить клавишу {}: {}", event.code(), e);
            }
        }

        for command in routed.commands {
            if commands.send(command).is_err() {
                return false;
            }
        }
        true
    }

    fn log_grabbed_device(device: &Device) {
        info!("Устройство: {}", device.name().unwrap_or("Unknown"));
        info!("Физический путь: {:?}", device.physical_path());
        info!("Устройство захвачено эксклюзивно");
    }

    fn log_grab_error(device_path: &Path, e: &Error) {
        warn!("Не удалось захватить устройство {}: {}", device_path.display(), e);
        warn!("Попробуйте добавить пользователя в группу input: sudo usermod -a -G input $USER");
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for RealKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
