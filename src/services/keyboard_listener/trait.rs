use crate::config::Config;
use crate::cycling::GroupId;
use crate::error::Result;
use crate::events::Hotkey;
use crate::services::cycle_coordinator::CommandSender;
use crate::services::VirtualDevice;
use std::sync::Arc;

/// Источник команд хоткеев: реальная клавиатура или эмуляция
#[async_trait::async_trait]
pub trait KeyboardListenerTrait {
    async fn run(self: Box<Self>) -> Result<()>;
}

pub fn create_keyboard_listener(
    config: Arc<Config>,
    commands: CommandSender,
    virtual_device: Arc<VirtualDevice>,
    dry_run: bool,
) -> Result<Box<dyn KeyboardListenerTrait + Send>> {
    let bindings: Vec<(Hotkey, GroupId)> = config.hotkey_bindings();

    if dry_run {
        Ok(Box::new(super::dry_keyboard_listener::DryRunKeyboardListener::new(
            bindings, commands,
        )))
    } else {
        Ok(Box::new(super::keyboard_listener::RealKeyboardListener::new(
            &config.input.device_path,
            bindings,
            commands,
            virtual_device,
        )?))
    }
}
