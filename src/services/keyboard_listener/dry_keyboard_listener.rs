use crate::cycling::GroupId;
use crate::error::Result;
use crate::events::{CycleCommand, Hotkey, HudAction};
use crate::services::cycle_coordinator::CommandSender;
use tokio::time::{interval, sleep, Duration};
use tracing::{info, warn};

use super::r#trait::KeyboardListenerTrait;

const TAP: Duration = Duration::from_millis(40);
const HOLD: Duration = Duration::from_millis(600);
const HUD_PAUSE: Duration = Duration::from_millis(300);

/// Шаг сценария эмуляции
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Down,
    Up,
    Wait(Duration),
    Hud(HudAction),
    ReleaseModifiers,
}

/// Сценарий раунда: двойной тап, затем удержания с навигацией по HUD
pub fn script(round: u64) -> Vec<Step> {
    use Step::*;

    if round % 4 == 1 {
        return vec![Down, Wait(TAP), Up, Down, Wait(TAP), Up];
    }

    let mut steps = vec![Down, Wait(HOLD), Up, Wait(HUD_PAUSE)];
    match round % 4 {
        2 => steps.extend([Hud(HudAction::Next), Wait(HUD_PAUSE), ReleaseModifiers]),
        3 => steps.extend([
            Hud(HudAction::Next),
            Hud(HudAction::Previous),
            Wait(HUD_PAUSE),
            Hud(HudAction::Select(0)),
        ]),
        _ => steps.extend([Hud(HudAction::Dismiss), ReleaseModifiers]),
    }
    steps
}

/// Эмуляция: раз в несколько секунд очередной раунд сценария для первой группы
pub struct DryRunKeyboardListener {
    bindings: Vec<(Hotkey, GroupId)>,
    commands: CommandSender,
}

impl DryRunKeyboardListener {
    pub fn new(bindings: Vec<(Hotkey, GroupId)>, commands: CommandSender) -> Self {
        info!("Инициализация DryRunKeyboardListener");
        Self { bindings, commands }
    }

    /// false - координатор остановлен
    async fn play(&self, group: &GroupId, steps: &[Step]) -> bool {
        for step in steps {
            let command = match *step {
                Step::Down => CycleCommand::hotkey_down(group.clone()),
                Step::Up => CycleCommand::hotkey_up(group.clone()),
                Step::Hud(action) => CycleCommand::hud(action),
                Step::ReleaseModifiers => CycleCommand::modifiers_released(),
                Step::Wait(pause) => {
                    sleep(pause).await;
                    continue;
                }
            };
            if self.commands.send(command).is_err() {
                return false;
            }
        }
        true
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - KeyboardListener работает в режиме эмуляции");

        let Some((hotkey, group)) = self.bindings.first().cloned() else {
            warn!("Нет групп с хоткеями - эмулировать нечего");
            return Ok(());
        };

        let mut ticker = interval(Duration::from_secs(5));
        let mut round = 0u64;
        loop {
            ticker.tick().await;
            round += 1;

            let steps = script(round);
            info!("Dry-run: раунд {} для {} (группа [{}]): {:?}", round, hotkey, group, steps);
            if !self.play(&group, &steps).await {
                info!("Координатор остановлен, эмуляция завершена");
                return Ok(());
            }
        }
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for DryRunKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
