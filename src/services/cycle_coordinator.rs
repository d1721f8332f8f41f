//! CycleCoordinator: the single task that owns the session machine.
//!
//! Commands arrive over one channel (hotkeys, timers, HUD input) and are
//! handled strictly in order. Effects returned by the machine are carried out
//! here before the next command is read, so a finalize can never overtake the
//! activation that preceded it.

use crate::cycling::{Effect, SessionMachine, Target, WorldSnapshot};
use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{CycleCommand, TimerKind};
use crate::services::hud::{HudMessage, HudSender};
use crate::services::process_service::ProcessService;
use crate::services::window_activator::WindowActivator;
use crate::utils::permissions::PermissionStatus;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type CommandSender = mpsc::UnboundedSender<CycleCommand>;
pub type CommandReceiver = mpsc::UnboundedReceiver<CycleCommand>;

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}

pub struct CycleCoordinator {
    machine: SessionMachine,
    processes: Arc<dyn ProcessService>,
    activator: Arc<WindowActivator>,
    permissions: PermissionStatus,
    hud: HudSender,
    commands: CommandSender,
    timers: HashMap<TimerKind, JoinHandle<()>>,
    denial_reported: bool,
}

impl CycleCoordinator {
    pub fn new(
        machine: SessionMachine,
        processes: Arc<dyn ProcessService>,
        activator: Arc<WindowActivator>,
        permissions: PermissionStatus,
        hud: HudSender,
        commands: CommandSender,
    ) -> Self {
        Self {
            machine,
            processes,
            activator,
            permissions,
            hud,
            commands,
            timers: HashMap::new(),
            denial_reported: false,
        }
    }

    pub async fn run(mut self, mut rx: CommandReceiver) -> Result<()> {
        info!("Координатор циклов запущен");
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        self.abort_timers();
        info!("Координатор циклов остановлен");
        Ok(())
    }

    pub async fn handle(&mut self, command: CycleCommand) {
        let world = match &command {
            CycleCommand::HotkeyDown { group, at } if !self.machine.continues_session(group, *at) => {
                if !self.check_permission() {
                    return;
                }
                match self.snapshot().await {
                    Ok(world) => Some(world),
                    Err(e) => {
                        warn!("Не удалось получить список процессов: {}", e);
                        return;
                    }
                }
            }
            _ => None,
        };

        let effects = self.machine.handle(&command, world.as_ref());
        for effect in effects {
            self.apply(effect).await;
        }
    }

    /// Отказ в доступе сообщается один раз, пока доступ не появится
    fn check_permission(&mut self) -> bool {
        if self.permissions.is_granted() {
            self.denial_reported = false;
            return true;
        }
        if !self.denial_reported {
            warn!("{}", crate::cycle_error!(permission_denied, "переключение групп недоступно"));
            self.denial_reported = true;
        }
        false
    }

    async fn snapshot(&self) -> Result<WorldSnapshot> {
        let running = self.processes.running_instances().await?;
        let frontmost = self.processes.frontmost().await.unwrap_or_else(|e| {
            debug!("Активный процесс не определён: {}", e);
            None
        });
        Ok(WorldSnapshot { running, frontmost })
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Activate(Target::Raise { instance, pid }) => {
                if !self.activator.raise(pid, None, None).await {
                    warn!("Не удалось поднять окно {}", instance);
                }
            }
            Effect::Activate(Target::Launch { app }) => {
                if let Err(e) = self.processes.launch(&app).await {
                    warn!("{}", e);
                }
            }
            Effect::Hud(message) => self.send_hud(message),
            Effect::Schedule { kind, generation, after } => self.schedule(kind, generation, after),
            Effect::Cancel(kind) => {
                if let Some(handle) = self.timers.remove(&kind) {
                    handle.abort();
                }
            }
        }
    }

    fn send_hud(&self, message: HudMessage) {
        if self.hud.send(message).is_err() {
            debug!("HUD не слушает");
        }
    }

    fn schedule(&mut self, kind: TimerKind, generation: u64, after: Duration) {
        let commands = self.commands.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = commands.send(CycleCommand::TimerFired { kind, generation, at: Instant::now() });
        });

        debug_if_enabled!("Таймер {:?} #{} через {:?}", kind, generation, after);
        if let Some(previous) = self.timers.insert(kind, handle) {
            previous.abort();
        }
    }

    fn abort_timers(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

impl Drop for CycleCoordinator {
    fn drop(&mut self) {
        self.abort_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycling::{AppRef, Group, GroupId, GroupStore, MemoryGroupStore, RunningApp, SessionSettings};
    use crate::events::{AxWindow, ElementRef, Rect, WindowRole};
    use crate::services::hud::hud_channel;
    use crate::services::window_activator::ActivationSettings;
    use crate::services::window_registry::WindowRegistry;
    use crate::services::window_system::fake::FakeWindowSystem;
    use crate::utils::permissions::{PermissionGate, PermissionPoller};
    use std::sync::atomic::{AtomicBool, Ordering};
    use parking_lot::Mutex;

    struct StaticProcesses {
        running: Vec<RunningApp>,
        launched: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ProcessService for StaticProcesses {
        async fn running_instances(&self) -> Result<Vec<RunningApp>> {
            Ok(self.running.clone())
        }

        async fn frontmost(&self) -> Result<Option<RunningApp>> {
            Ok(None)
        }

        async fn launch(&self, app: &AppRef) -> Result<()> {
            self.launched.lock().push(app.id.clone());
            Ok(())
        }
    }

    struct Harness {
        coordinator: CycleCoordinator,
        rx: CommandReceiver,
        store: Arc<MemoryGroupStore>,
        fake: Arc<FakeWindowSystem>,
        processes: Arc<StaticProcesses>,
    }

    fn harness(permissions: PermissionStatus) -> Harness {
        let group = Group::new("dev", vec![AppRef::new("code"), AppRef::new("alacritty")]);
        let store = Arc::new(MemoryGroupStore::new(vec![group]));
        let fake = Arc::new(FakeWindowSystem::new());
        fake.set_ax_windows(
            20,
            vec![AxWindow {
                element: ElementRef::Window(0x20),
                role: WindowRole::Standard,
                minimized: false,
                title: "code".into(),
                frame: Some(Rect::new(0.0, 0.0, 800.0, 600.0)),
                window_number: Some(0x20),
            }],
        );
        let registry = Arc::new(WindowRegistry::new(fake.clone()));
        let activator = Arc::new(WindowActivator::new(
            fake.clone(),
            registry,
            ActivationSettings { verify_delay: Duration::ZERO, click_fallback: true },
        ));
        let processes = Arc::new(StaticProcesses {
            running: vec![RunningApp::new("code", 20)],
            launched: Mutex::new(Vec::new()),
        });
        let machine = SessionMachine::new(
            store.clone(),
            SessionSettings {
                hud_enabled: false,
                hold_threshold: Duration::from_millis(250),
                chain_timeout: Duration::from_millis(150),
                mru_capacity: 16,
            },
        );
        let (hud, _hud_rx) = hud_channel();
        let (commands, rx) = command_channel();
        let coordinator = CycleCoordinator::new(machine, processes.clone(), activator, permissions, hud, commands);

        Harness { coordinator, rx, store, fake, processes }
    }

    #[tokio::test]
    async fn test_tap_raises_then_launches_and_commits_on_timeout() {
        let mut h = harness(PermissionStatus::fixed(true));
        let dev = GroupId::new("dev");

        h.coordinator.handle(CycleCommand::hotkey_down(dev.clone())).await;
        assert!(h.fake.calls().contains(&"raise window:0x20".to_string()));

        h.coordinator.handle(CycleCommand::hotkey_down(dev.clone())).await;
        assert_eq!(*h.processes.launched.lock(), vec!["alacritty".to_string()]);
        assert_eq!(h.store.mru_write_count(&dev), 0);

        // таймаут цепочки приходит через тот же канал
        let fired = tokio::time::timeout(Duration::from_secs(2), h.rx.recv()).await.unwrap().unwrap();
        assert!(matches!(fired, CycleCommand::TimerFired { kind: TimerKind::ChainTimeout, .. }));
        h.coordinator.handle(fired).await;

        assert_eq!(h.store.mru_write_count(&dev), 1);
        assert_eq!(h.store.group(&dev).unwrap().mru, vec!["alacritty".to_string()]);
    }

    #[tokio::test]
    async fn test_superseded_timer_is_aborted() {
        let mut h = harness(PermissionStatus::fixed(true));
        let dev = GroupId::new("dev");

        h.coordinator.handle(CycleCommand::hotkey_down(dev.clone())).await;
        h.coordinator.handle(CycleCommand::hotkey_down(dev.clone())).await;

        let first = tokio::time::timeout(Duration::from_secs(2), h.rx.recv()).await.unwrap().unwrap();
        h.coordinator.handle(first).await;
        // второго срабатывания не будет: прежний таймер отменён
        let second = tokio::time::timeout(Duration::from_millis(150), h.rx.recv()).await;
        assert!(second.is_err());
        assert_eq!(h.store.mru_write_count(&dev), 1);
    }

    #[tokio::test]
    async fn test_denied_permission_does_nothing() {
        let mut h = harness(PermissionStatus::fixed(false));
        let dev = GroupId::new("dev");

        h.coordinator.handle(CycleCommand::hotkey_down(dev.clone())).await;
        h.coordinator.handle(CycleCommand::hotkey_down(dev)).await;

        assert!(h.fake.calls().is_empty());
        assert!(h.processes.launched.lock().is_empty());
        assert!(h.coordinator.denial_reported);
    }

    struct Switch(AtomicBool);

    impl PermissionGate for Switch {
        fn is_granted(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_grant_published_by_poller_unblocks_sessions() {
        let gate = Arc::new(Switch(AtomicBool::new(false)));
        let poller = PermissionPoller::start(gate.clone(), Duration::from_millis(5));
        let mut h = harness(poller.status());
        let dev = GroupId::new("dev");

        h.coordinator.handle(CycleCommand::hotkey_down(dev.clone())).await;
        assert!(h.coordinator.denial_reported);
        assert!(h.fake.calls().is_empty());

        gate.0.store(true, Ordering::SeqCst);
        let mut status = poller.status();
        assert!(tokio::time::timeout(Duration::from_secs(2), status.wait_granted()).await.unwrap());

        h.coordinator.handle(CycleCommand::hotkey_down(dev)).await;
        assert!(!h.coordinator.denial_reported);
        assert!(h.fake.calls().contains(&"raise window:0x20".to_string()));
    }
}
