//! Session state machine for one hotkey interaction.
//!
//! `Idle → Pressed → (HeldPreview | TapChaining) → Idle`
//!
//! The machine is synchronous and owns no timers or windows: it consumes
//! [`CycleCommand`]s and returns [`Effect`]s for the coordinator to carry out.
//! MRU is written to the store only when a session finalizes, and only if the
//! ordering actually changes.

use super::engine::{Candidate, CyclingEngine, DecisionContext, Target};
use super::group::{Group, GroupId, RunningApp};
use super::instance::InstanceId;
use super::mru::MruView;
use super::store::GroupStore;
use crate::debug_if_enabled;
use crate::events::{CycleCommand, HudAction, TimerKind};
use crate::services::hud::{HudItem, HudMessage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub hud_enabled: bool,
    pub hold_threshold: Duration,
    pub chain_timeout: Duration,
    pub mru_capacity: usize,
}

/// Снимок процессов на момент начала сессии
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    pub running: Vec<RunningApp>,
    pub frontmost: Option<RunningApp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Pressed,
    HeldPreview,
    TapChaining,
}

/// Что координатор должен сделать после обработки команды
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Activate(Target),
    Hud(HudMessage),
    Schedule { kind: TimerKind, generation: u64, after: Duration },
    Cancel(TimerKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinalizeReason {
    /// Отпущены модификаторы при открытом HUD или явный выбор в HUD
    Commit,
    ChainTimeout,
    /// Нажатие другой группы или после простоя
    Superseded,
    Dismissed,
}

struct Session {
    group: Group,
    candidates: Vec<Candidate>,
    selection: usize,
    hud_visible: bool,
    key_down: bool,
    started_at: Instant,
    last_step_at: Instant,
    activated: Option<Target>,
    view: MruView,
}

impl Session {
    fn selected_target(&self) -> Target {
        self.candidates[self.selection].target()
    }

    fn hud_items(&self) -> Vec<HudItem> {
        self.candidates
            .iter()
            .map(|candidate| HudItem {
                label: candidate.label(),
                running: candidate.running.is_some(),
            })
            .collect()
    }
}

pub struct SessionMachine {
    store: Arc<dyn GroupStore>,
    settings: SessionSettings,
    phase: SessionPhase,
    session: Option<Session>,
    generation: u64,
    hold_generation: u64,
    chain_generation: u64,
    last_activation_group: Option<GroupId>,
}

impl SessionMachine {
    pub fn new(store: Arc<dyn GroupStore>, settings: SessionSettings) -> Self {
        Self {
            store,
            settings,
            phase: SessionPhase::Idle,
            session: None,
            generation: 0,
            hold_generation: 0,
            chain_generation: 0,
            last_activation_group: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current_group(&self) -> Option<&GroupId> {
        self.session.as_ref().map(|session| &session.group.id)
    }

    pub fn selection(&self) -> Option<usize> {
        self.session.as_ref().map(|session| session.selection)
    }

    /// Локальный порядок MRU текущей сессии (в хранилище не попадает до завершения)
    pub fn local_mru(&self) -> Option<&[String]> {
        self.session.as_ref().map(|session| session.view.order())
    }

    /// Продолжит ли нажатие этой группы текущую сессию (тогда снимок процессов не нужен)
    pub fn continues_session(&self, group: &GroupId, at: Instant) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        if &session.group.id != group {
            return false;
        }
        match self.phase {
            SessionPhase::Idle => false,
            SessionPhase::Pressed | SessionPhase::HeldPreview => true,
            SessionPhase::TapChaining => {
                at.saturating_duration_since(session.last_step_at) <= self.settings.chain_timeout
            }
        }
    }

    pub fn handle(&mut self, command: &CycleCommand, world: Option<&WorldSnapshot>) -> Vec<Effect> {
        debug_if_enabled!("Сессия [{:?}] получила: {}", self.phase, command);

        match command {
            CycleCommand::HotkeyDown { group, at } => self.on_hotkey_down(group, *at, world),
            CycleCommand::HotkeyUp { group, at } => self.on_hotkey_up(group, *at),
            CycleCommand::ModifiersReleased { at } => self.on_modifiers_released(*at),
            CycleCommand::TimerFired { kind, generation, at } => self.on_timer(*kind, *generation, *at),
            CycleCommand::Hud { action, at } => self.on_hud(*action, *at),
        }
    }

    fn on_hotkey_down(&mut self, group: &GroupId, at: Instant, world: Option<&WorldSnapshot>) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.continues_session(group, at) {
            self.continue_session(at, &mut effects);
            return effects;
        }

        if self.session.is_some() {
            effects.extend(self.finalize(FinalizeReason::Superseded));
        }

        let Some(world) = world else {
            warn!("Нет снимка процессов для новой сессии группы [{}]", group);
            return effects;
        };
        self.start_session(group, at, world, &mut effects);
        effects
    }

    fn start_session(&mut self, group_id: &GroupId, at: Instant, world: &WorldSnapshot, effects: &mut Vec<Effect>) {
        let Some(group) = self.store.group(group_id) else {
            warn!("Группа [{}] не найдена", group_id);
            return;
        };

        let candidates = CyclingEngine::candidates(&group, &world.running);
        let last_active = self.store.last_active_instance(group_id);
        let decision = CyclingEngine::next_target(&DecisionContext {
            group: &group,
            candidates: &candidates,
            frontmost: world.frontmost.as_ref(),
            last_active: last_active.as_ref(),
            last_activation_group: self.last_activation_group.as_ref(),
            preview_selection: None,
        });

        let Some(decision) = decision else {
            info!("В группе [{}] нечего активировать", group_id);
            return;
        };

        info!(
            "Новая сессия группы [{}]: кандидатов {}, цель {} ({:?})",
            group_id,
            candidates.len(),
            decision.target,
            decision.reason
        );

        let view = MruView::new(group.mru.clone(), self.settings.mru_capacity);
        self.session = Some(Session {
            group,
            candidates,
            selection: decision.index,
            hud_visible: false,
            key_down: true,
            started_at: at,
            last_step_at: at,
            activated: None,
            view,
        });

        self.enter_pressed_or_activate(at, effects);
    }

    /// HUD включён - ждём порог удержания; иначе активируем сразу
    fn enter_pressed_or_activate(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        if self.settings.hud_enabled {
            self.phase = SessionPhase::Pressed;
            self.hold_generation = self.next_generation();
            effects.push(Effect::Schedule {
                kind: TimerKind::Hold,
                generation: self.hold_generation,
                after: self.settings.hold_threshold,
            });
        } else {
            self.activate_selection(at, effects);
        }
    }

    fn continue_session(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match self.phase {
            SessionPhase::HeldPreview => {
                session.selection = CyclingEngine::advance(session.candidates.len(), session.selection);
                session.key_down = true;
                effects.push(Effect::Hud(HudMessage::Select { selection: session.selection }));
            }
            SessionPhase::TapChaining => {
                session.selection = CyclingEngine::advance(session.candidates.len(), session.selection);
                session.key_down = true;
                session.last_step_at = at;
                effects.push(Effect::Cancel(TimerKind::ChainTimeout));
                self.enter_pressed_or_activate(at, effects);
            }
            // Повторное нажатие без отпускания - автоповтор, игнорируем
            SessionPhase::Pressed | SessionPhase::Idle => {}
        }
    }

    fn on_hotkey_up(&mut self, group: &GroupId, at: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(session) = self.session.as_mut() else {
            return effects;
        };
        if &session.group.id != group {
            return effects;
        }
        session.key_down = false;

        if self.phase == SessionPhase::Pressed {
            // Порог удержания не достигнут - это тап
            effects.push(Effect::Cancel(TimerKind::Hold));
            self.activate_selection(at, &mut effects);
        }
        effects
    }

    fn on_modifiers_released(&mut self, at: Instant) -> Vec<Effect> {
        match self.phase {
            SessionPhase::HeldPreview => self.finalize(FinalizeReason::Commit),
            SessionPhase::Pressed => {
                let mut effects = vec![Effect::Cancel(TimerKind::Hold)];
                if let Some(session) = self.session.as_mut() {
                    session.key_down = false;
                }
                self.activate_selection(at, &mut effects);
                effects
            }
            SessionPhase::TapChaining | SessionPhase::Idle => Vec::new(),
        }
    }

    fn on_timer(&mut self, kind: TimerKind, generation: u64, at: Instant) -> Vec<Effect> {
        match kind {
            TimerKind::Hold => {
                if generation != self.hold_generation || self.phase != SessionPhase::Pressed {
                    debug_if_enabled!("Устаревший таймер удержания #{}", generation);
                    return Vec::new();
                }
                let Some(session) = self.session.as_mut() else {
                    return Vec::new();
                };
                if !session.key_down {
                    return Vec::new();
                }
                session.hud_visible = true;
                self.phase = SessionPhase::HeldPreview;
                info!(
                    "Удержание {}мс - показываем HUD группы [{}]",
                    at.saturating_duration_since(session.started_at).as_millis(),
                    session.group.id
                );
                vec![Effect::Hud(HudMessage::Show {
                    group: session.group.id.clone(),
                    items: session.hud_items(),
                    selection: session.selection,
                })]
            }
            TimerKind::ChainTimeout => {
                if generation != self.chain_generation || self.phase != SessionPhase::TapChaining {
                    debug_if_enabled!("Устаревший таймер цепочки #{}", generation);
                    return Vec::new();
                }
                self.finalize(FinalizeReason::ChainTimeout)
            }
        }
    }

    fn on_hud(&mut self, action: HudAction, _at: Instant) -> Vec<Effect> {
        if self.phase != SessionPhase::HeldPreview {
            return Vec::new();
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let len = session.candidates.len();

        match action {
            HudAction::Next => {
                session.selection = CyclingEngine::advance(len, session.selection);
                vec![Effect::Hud(HudMessage::Select { selection: session.selection })]
            }
            HudAction::Previous => {
                session.selection = CyclingEngine::retreat(len, session.selection);
                vec![Effect::Hud(HudMessage::Select { selection: session.selection })]
            }
            HudAction::Select(index) if index < len => {
                session.selection = index;
                self.finalize(FinalizeReason::Commit)
            }
            HudAction::Select(index) => {
                warn!("HUD выбрал несуществующий элемент #{}", index);
                Vec::new()
            }
            HudAction::Dismiss => self.finalize(FinalizeReason::Dismissed),
        }
    }

    fn activate_selection(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let target = session.selected_target();
        session.view.touch(&target.instance_id());
        session.activated = Some(target.clone());
        session.last_step_at = at;
        self.last_activation_group = Some(session.group.id.clone());
        debug_if_enabled!("Локальный MRU сессии: {:?}", session.view.order());

        effects.push(Effect::Activate(target));

        self.phase = SessionPhase::TapChaining;
        self.chain_generation = self.next_generation();
        effects.push(Effect::Schedule {
            kind: TimerKind::ChainTimeout,
            generation: self.chain_generation,
            after: self.settings.chain_timeout,
        });
    }

    fn finalize(&mut self, reason: FinalizeReason) -> Vec<Effect> {
        let mut effects = vec![Effect::Cancel(TimerKind::Hold), Effect::Cancel(TimerKind::ChainTimeout)];
        self.phase = SessionPhase::Idle;
        let Some(session) = self.session.take() else {
            return effects;
        };

        if session.hud_visible {
            effects.push(Effect::Hud(HudMessage::Hide));
        }

        let chosen = match reason {
            FinalizeReason::Commit => {
                let target = session.selected_target();
                if session.activated.as_ref() != Some(&target) {
                    self.last_activation_group = Some(session.group.id.clone());
                    effects.push(Effect::Activate(target.clone()));
                }
                Some(target)
            }
            FinalizeReason::ChainTimeout | FinalizeReason::Superseded => session.activated.clone(),
            FinalizeReason::Dismissed => None,
        };

        info!("Сессия группы [{}] завершена ({:?})", session.group.id, reason);

        if let Some(target) = chosen {
            self.commit(&session.group.id, &target.instance_id());
        }
        effects
    }

    /// Единственное место, где MRU попадает в хранилище
    fn commit(&self, group_id: &GroupId, selected: &InstanceId) {
        let Some(group) = self.store.group(group_id) else {
            return;
        };
        let order = CyclingEngine::committed_order(&group, selected, self.settings.mru_capacity);
        if order != group.mru {
            self.store.update_mru_order(group_id, order);
        } else {
            debug_if_enabled!("MRU группы [{}] не изменился", group_id);
        }
        self.store.set_last_active(group_id, selected.clone());
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycling::group::AppRef;
    use crate::cycling::store::MemoryGroupStore;

    const CHAIN: Duration = Duration::from_millis(500);
    const HOLD: Duration = Duration::from_millis(250);

    fn settings(hud_enabled: bool) -> SessionSettings {
        SessionSettings {
            hud_enabled,
            hold_threshold: HOLD,
            chain_timeout: CHAIN,
            mru_capacity: 16,
        }
    }

    fn abc(id: &str, mru: &[&str]) -> Group {
        Group::new(id, vec![AppRef::new("a"), AppRef::new("b"), AppRef::new("c")]).with_mru(mru.iter().copied())
    }

    fn machine(groups: Vec<Group>, hud: bool) -> (SessionMachine, Arc<MemoryGroupStore>) {
        let store = Arc::new(MemoryGroupStore::new(groups));
        (SessionMachine::new(store.clone(), settings(hud)), store)
    }

    fn down(group: &str, at: Instant) -> CycleCommand {
        CycleCommand::HotkeyDown { group: GroupId::new(group), at }
    }

    fn up(group: &str, at: Instant) -> CycleCommand {
        CycleCommand::HotkeyUp { group: GroupId::new(group), at }
    }

    fn activations(effects: &[Effect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Activate(target) => Some(target.instance_id().to_string()),
                _ => None,
            })
            .collect()
    }

    fn scheduled(effects: &[Effect], wanted: TimerKind) -> Option<u64> {
        effects.iter().find_map(|effect| match effect {
            Effect::Schedule { kind, generation, .. } if *kind == wanted => Some(*generation),
            _ => None,
        })
    }

    fn running_abc() -> WorldSnapshot {
        WorldSnapshot {
            running: vec![RunningApp::new("a", 1), RunningApp::new("b", 2), RunningApp::new("c", 3)],
            frontmost: None,
        }
    }

    #[test]
    fn test_taps_with_nothing_running_launch_in_order_and_wrap() {
        let (mut sm, _store) = machine(vec![abc("g", &[])], false);
        let world = WorldSnapshot::default();
        let t0 = Instant::now();

        let mut launched = Vec::new();
        for step in 0..4u64 {
            let at = t0 + Duration::from_millis(step * 200);
            let effects = sm.handle(&down("g", at), Some(&world));
            launched.extend(activations(&effects));
            sm.handle(&up("g", at + Duration::from_millis(30)), None);
        }

        assert_eq!(launched, vec!["a", "b", "c", "a"]);
        assert_eq!(sm.phase(), SessionPhase::TapChaining);
    }

    #[test]
    fn test_tap_chain_is_a_forward_pass_even_when_frontmost_is_not_first() {
        let (mut sm, _store) = machine(vec![abc("g", &["b-2", "a-1", "c-3"])], false);
        let mut world = running_abc();
        world.frontmost = Some(RunningApp::new("a", 1));
        let t0 = Instant::now();

        let mut order = Vec::new();
        for step in 0..4u64 {
            let at = t0 + Duration::from_millis(step * 100);
            order.extend(activations(&sm.handle(&down("g", at), Some(&world))));
        }
        // a не голова MRU: старт с первого участника, дальше вперёд без «пинг-понга»
        assert_eq!(order, vec!["a-1", "c-3", "b-2", "a-1"]);
    }

    #[test]
    fn test_chain_timeout_commits_last_activation_once() {
        let (mut sm, store) = machine(vec![abc("g", &["a-1", "b-2", "c-3"])], false);
        let mut world = running_abc();
        world.frontmost = Some(RunningApp::new("a", 1));
        let t0 = Instant::now();

        sm.handle(&down("g", t0), Some(&world));
        let effects = sm.handle(&down("g", t0 + Duration::from_millis(100)), Some(&world));
        assert_eq!(activations(&effects), vec!["c-3"]);
        assert_eq!(store.mru_write_count(&GroupId::new("g")), 0);

        let generation = scheduled(&effects, TimerKind::ChainTimeout).unwrap();
        sm.handle(
            &CycleCommand::TimerFired { kind: TimerKind::ChainTimeout, generation, at: t0 + CHAIN * 2 },
            None,
        );

        let id = GroupId::new("g");
        assert_eq!(sm.phase(), SessionPhase::Idle);
        assert_eq!(store.mru_write_count(&id), 1);
        assert_eq!(store.group(&id).unwrap().mru, vec!["c-3", "a-1", "b-2"]);
        assert_eq!(store.last_active_instance(&id), Some(InstanceId::composite("c", 3)));
    }

    #[test]
    fn test_stale_chain_timer_is_ignored() {
        let (mut sm, store) = machine(vec![abc("g", &[])], false);
        let world = running_abc();
        let t0 = Instant::now();

        let first = sm.handle(&down("g", t0), Some(&world));
        let stale = scheduled(&first, TimerKind::ChainTimeout).unwrap();
        let second = sm.handle(&down("g", t0 + Duration::from_millis(100)), Some(&world));
        assert!(second.contains(&Effect::Cancel(TimerKind::ChainTimeout)));

        sm.handle(&CycleCommand::TimerFired { kind: TimerKind::ChainTimeout, generation: stale, at: t0 + CHAIN }, None);
        assert_eq!(sm.phase(), SessionPhase::TapChaining);
        assert_eq!(store.mru_write_count(&GroupId::new("g")), 0);
    }

    #[test]
    fn test_held_preview_navigation_does_not_touch_stored_mru() {
        let (mut sm, store) = machine(vec![abc("g", &["a-1", "b-2", "c-3"])], true);
        let mut world = running_abc();
        world.frontmost = Some(RunningApp::new("a", 1));
        let id = GroupId::new("g");
        let t0 = Instant::now();

        let effects = sm.handle(&down("g", t0), Some(&world));
        assert!(activations(&effects).is_empty());
        let hold = scheduled(&effects, TimerKind::Hold).unwrap();

        let shown = sm.handle(&CycleCommand::TimerFired { kind: TimerKind::Hold, generation: hold, at: t0 + HOLD }, None);
        assert!(matches!(shown.as_slice(), [Effect::Hud(HudMessage::Show { selection: 1, .. })]));
        assert_eq!(sm.phase(), SessionPhase::HeldPreview);
        assert_eq!(sm.current_group(), Some(&id));

        // Отпускание клавиши при зажатых модификаторах ничего не фиксирует
        assert!(sm.handle(&up("g", t0 + HOLD * 2), None).is_empty());
        sm.handle(&down("g", t0 + HOLD * 3), None);
        sm.handle(&CycleCommand::Hud { action: HudAction::Previous, at: t0 + HOLD * 4 }, None);
        sm.handle(&CycleCommand::Hud { action: HudAction::Next, at: t0 + HOLD * 5 }, None);
        assert_eq!(sm.selection(), Some(2));
        assert_eq!(store.mru_write_count(&id), 0);
        assert_eq!(store.group(&id).unwrap().mru, vec!["a-1", "b-2", "c-3"]);

        let finalized = sm.handle(&CycleCommand::ModifiersReleased { at: t0 + HOLD * 6 }, None);
        assert_eq!(activations(&finalized), vec!["c-3"]);
        assert!(finalized.contains(&Effect::Hud(HudMessage::Hide)));
        assert_eq!(store.mru_write_count(&id), 1);
        assert_eq!(store.group(&id).unwrap().mru, vec!["c-3", "a-1", "b-2"]);
        assert_eq!(sm.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_quick_tap_with_hud_enabled_activates_on_release() {
        let (mut sm, _store) = machine(vec![abc("g", &[])], true);
        let world = running_abc();
        let t0 = Instant::now();

        let pressed = sm.handle(&down("g", t0), Some(&world));
        let hold = scheduled(&pressed, TimerKind::Hold).unwrap();
        let released = sm.handle(&up("g", t0 + Duration::from_millis(50)), None);
        assert_eq!(activations(&released), vec!["a-1"]);
        assert!(released.contains(&Effect::Cancel(TimerKind::Hold)));

        // таймер удержания пришёл позже - HUD не показывается
        let late = sm.handle(&CycleCommand::TimerFired { kind: TimerKind::Hold, generation: hold, at: t0 + HOLD }, None);
        assert!(late.is_empty());
        assert_eq!(sm.phase(), SessionPhase::TapChaining);
    }

    #[test]
    fn test_hud_select_commits_immediately() {
        let (mut sm, store) = machine(vec![abc("g", &[])], true);
        let t0 = Instant::now();
        let pressed = sm.handle(&down("g", t0), Some(&running_abc()));
        let hold = scheduled(&pressed, TimerKind::Hold).unwrap();
        sm.handle(&CycleCommand::TimerFired { kind: TimerKind::Hold, generation: hold, at: t0 + HOLD }, None);

        let effects = sm.handle(&CycleCommand::Hud { action: HudAction::Select(1), at: t0 + HOLD * 2 }, None);
        assert_eq!(activations(&effects), vec!["b-2"]);
        assert_eq!(store.group(&GroupId::new("g")).unwrap().mru, vec!["b-2"]);
    }

    #[test]
    fn test_hud_dismiss_commits_nothing() {
        let (mut sm, store) = machine(vec![abc("g", &["a-1"])], true);
        let t0 = Instant::now();
        let pressed = sm.handle(&down("g", t0), Some(&running_abc()));
        let hold = scheduled(&pressed, TimerKind::Hold).unwrap();
        sm.handle(&CycleCommand::TimerFired { kind: TimerKind::Hold, generation: hold, at: t0 + HOLD }, None);

        let effects = sm.handle(&CycleCommand::Hud { action: HudAction::Dismiss, at: t0 + HOLD * 2 }, None);
        assert!(activations(&effects).is_empty());
        assert!(effects.contains(&Effect::Hud(HudMessage::Hide)));
        assert_eq!(store.mru_write_count(&GroupId::new("g")), 0);
    }

    #[test]
    fn test_disjoint_press_starts_new_session() {
        let (mut sm, store) = machine(vec![abc("g1", &[]), abc("g2", &[])], false);
        let world = running_abc();
        let t0 = Instant::now();

        sm.handle(&down("g1", t0), Some(&world));
        assert!(!sm.continues_session(&GroupId::new("g2"), t0));

        let effects = sm.handle(&down("g2", t0 + Duration::from_millis(50)), Some(&world));
        assert_eq!(sm.current_group(), Some(&GroupId::new("g2")));
        // предыдущая цепочка зафиксирована
        assert_eq!(store.group(&GroupId::new("g1")).unwrap().mru, vec!["a-1"]);
        assert_eq!(activations(&effects).len(), 1);

        // та же группа после простоя дольше таймаута - тоже новая сессия
        let later = t0 + CHAIN * 4;
        assert!(!sm.continues_session(&GroupId::new("g2"), later));
    }

    #[test]
    fn test_group_resumes_after_other_group_raised_shared_app() {
        let g1 = Group::new(
            "g1",
            vec![AppRef::new("a"), AppRef::new("b"), AppRef::new("c"), AppRef::new("d")],
        )
        .with_mru(["d-4", "b-2", "a-1", "c-3"]);
        let g2 = Group::new("g2", vec![AppRef::new("x"), AppRef::new("y"), AppRef::new("d")])
            .with_mru(["y-11", "d-4", "x-10"]);
        let (mut sm, store) = machine(vec![g1, g2], false);
        store.set_last_active(&GroupId::new("g1"), InstanceId::composite("b", 2));

        let running: Vec<RunningApp> = [("a", 1), ("b", 2), ("c", 3), ("d", 4), ("x", 10), ("y", 11)]
            .into_iter()
            .map(|(id, pid)| RunningApp::new(id, pid))
            .collect();
        let t0 = Instant::now();

        let world = WorldSnapshot { running: running.clone(), frontmost: Some(RunningApp::new("y", 11)) };
        let effects = sm.handle(&down("g2", t0), Some(&world));
        assert_eq!(activations(&effects), vec!["d-4"]);
        let generation = scheduled(&effects, TimerKind::ChainTimeout).unwrap();
        sm.handle(&CycleCommand::TimerFired { kind: TimerKind::ChainTimeout, generation, at: t0 + CHAIN }, None);
        assert_eq!(sm.phase(), SessionPhase::Idle);

        // d поставила g2, поэтому g1 продолжает со своей последней активации b
        let world = WorldSnapshot { running, frontmost: Some(RunningApp::new("d", 4)) };
        let effects = sm.handle(&down("g1", t0 + CHAIN * 3), Some(&world));
        assert_eq!(activations(&effects), vec!["a-1"]);
    }

    #[test]
    fn test_mru_round_trip_does_not_drift() {
        let (mut sm, store) = machine(vec![abc("g", &["b-2", "a-1", "c-3"])], true);
        let id = GroupId::new("g");
        let world = running_abc();
        let t0 = Instant::now();

        let before: Vec<Candidate> = CyclingEngine::candidates(&store.group(&id).unwrap(), &world.running);

        // выбор текущей головы MRU ничего не перезаписывает
        let pressed = sm.handle(&down("g", t0), Some(&world));
        let hold = scheduled(&pressed, TimerKind::Hold).unwrap();
        sm.handle(&CycleCommand::TimerFired { kind: TimerKind::Hold, generation: hold, at: t0 + HOLD }, None);
        sm.handle(&CycleCommand::Hud { action: HudAction::Select(0), at: t0 + HOLD * 2 }, None);

        let after: Vec<Candidate> = CyclingEngine::candidates(&store.group(&id).unwrap(), &world.running);
        assert_eq!(before, after);
        assert_eq!(store.mru_write_count(&id), 0);
    }

    #[test]
    fn test_local_view_moves_but_store_waits() {
        let (mut sm, store) = machine(vec![abc("g", &["a-1", "b-2", "c-3"])], false);
        let mut world = running_abc();
        world.frontmost = Some(RunningApp::new("a", 1));
        let t0 = Instant::now();

        sm.handle(&down("g", t0), Some(&world));
        assert_eq!(sm.local_mru().unwrap()[0], "b-2");
        assert_eq!(store.group(&GroupId::new("g")).unwrap().mru[0], "a-1");
    }
}
