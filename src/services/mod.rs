pub mod cycle_coordinator;
pub mod hud;
pub mod keyboard_listener;
pub mod keycode_map;
pub mod process_service;
pub mod virtual_device;
pub mod window_activator;
pub mod window_registry;
pub mod window_system;

pub use cycle_coordinator::{command_channel, CycleCoordinator};
pub use keyboard_listener::create_keyboard_listener;
pub use process_service::create_process_service;
pub use virtual_device::VirtualDevice;
pub use window_activator::WindowActivator;
pub use window_registry::WindowRegistry;
pub use window_system::create_window_system;
