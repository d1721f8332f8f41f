//! Cycling decision engine.
//!
//! Pure functions over a snapshot: the group definition, running instances, the
//! frontmost instance, the group's last-active record and the session's preview
//! selection. Nothing here touches the window system or the store.

use super::group::{AppRef, Group, GroupId, RunningApp};
use super::instance::{resolve_running, InstanceId};
use super::mru::{order_running, promote};
use crate::debug_if_enabled;
use std::fmt;

/// Что сделать с выбранным участником
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Raise { instance: InstanceId, pid: u32 },
    Launch { app: AppRef },
}

impl Target {
    /// Идентификатор для MRU; у запуска pid ещё неизвестен - пишется голый id
    pub fn instance_id(&self) -> InstanceId {
        match self {
            Target::Raise { instance, .. } => instance.clone(),
            Target::Launch { app } => InstanceId::bare(&app.id),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Raise { instance, .. } => write!(f, "raise {}", instance),
            Target::Launch { app } => write!(f, "launch {}", app.id),
        }
    }
}

/// Элемент списка кандидатов сессии
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub app: AppRef,
    pub running: Option<RunningApp>,
}

impl Candidate {
    pub fn target(&self) -> Target {
        match &self.running {
            Some(running) => Target::Raise {
                instance: running.instance_id(),
                pid: running.pid,
            },
            None => Target::Launch { app: self.app.clone() },
        }
    }

    pub fn label(&self) -> String {
        match &self.running {
            Some(running) => format!("{} ({})", self.app.display_name(), running.pid),
            None => format!("{} (не запущено)", self.app.display_name()),
        }
    }
}

/// Какое правило дало решение
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    PreviewSelection,
    AfterFrontmost,
    AfterLastActive,
    FirstMember,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub index: usize,
    pub target: Target,
    pub reason: DecisionReason,
}

pub struct DecisionContext<'a> {
    pub group: &'a Group,
    pub candidates: &'a [Candidate],
    pub frontmost: Option<&'a RunningApp>,
    pub last_active: Option<&'a InstanceId>,
    /// Группа, через которую была сделана предыдущая активация
    pub last_activation_group: Option<&'a GroupId>,
    pub preview_selection: Option<usize>,
}

pub struct CyclingEngine;

impl CyclingEngine {
    /// Запущенные участники в порядке MRU, затем (если режим позволяет)
    /// незапущенные приложения в порядке группы
    pub fn candidates(group: &Group, running: &[RunningApp]) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = order_running(group, running)
            .into_iter()
            .filter_map(|instance| {
                let app = group.apps.iter().find(|app| app.id == instance.bundle_id)?;
                Some(Candidate { app: app.clone(), running: Some(instance) })
            })
            .collect();

        if group.mode.may_launch() {
            for app in &group.apps {
                // Уже есть либо запущенный экземпляр, либо запись на запуск
                if !candidates.iter().any(|candidate| candidate.app.id == app.id) {
                    candidates.push(Candidate { app: app.clone(), running: None });
                }
            }
        }

        candidates
    }

    pub fn next_target(ctx: &DecisionContext<'_>) -> Option<Decision> {
        let len = ctx.candidates.len();
        if len == 0 {
            return None;
        }

        let (index, reason) = Self::preview_rule(ctx)
            .map(|idx| (idx, DecisionReason::PreviewSelection))
            .or_else(|| Self::frontmost_rule(ctx).map(|idx| (idx, DecisionReason::AfterFrontmost)))
            .or_else(|| Self::last_active_rule(ctx).map(|idx| (idx, DecisionReason::AfterLastActive)))
            .unwrap_or_else(|| (Self::first_member_rule(ctx), DecisionReason::FirstMember));

        debug_if_enabled!(
            "Решение для группы [{}]: #{} ({:?}) из {}",
            ctx.group.id, index, reason, len
        );

        Some(Decision {
            index,
            target: ctx.candidates[index].target(),
            reason,
        })
    }

    /// Следующий индекс цепочки: всегда вперёд по снимку кандидатов, с переходом в начало
    pub fn advance(len: usize, index: usize) -> usize {
        if len == 0 { 0 } else { (index + 1) % len }
    }

    pub fn retreat(len: usize, index: usize) -> usize {
        if len == 0 { 0 } else { (index + len - 1) % len }
    }

    /// Итоговый порядок MRU после выбора `selected`
    pub fn committed_order(group: &Group, selected: &InstanceId, capacity: usize) -> Vec<String> {
        promote(&group.mru, selected, capacity)
    }

    fn preview_rule(ctx: &DecisionContext<'_>) -> Option<usize> {
        ctx.preview_selection.filter(|&idx| idx < ctx.candidates.len())
    }

    fn frontmost_rule(ctx: &DecisionContext<'_>) -> Option<usize> {
        // Приложение на переднем плане поставила другая группа: решает собственное состояние этой
        let cross_group = ctx
            .last_activation_group
            .is_some_and(|group| group != &ctx.group.id);
        if cross_group {
            return None;
        }

        // Только если MRU ставит передний экземпляр первым
        let frontmost = ctx.frontmost?;
        let first = ctx.candidates.first()?;
        if first.running.as_ref() != Some(frontmost) {
            return None;
        }
        Some(Self::advance(ctx.candidates.len(), 0))
    }

    fn last_active_rule(ctx: &DecisionContext<'_>) -> Option<usize> {
        let last_active = ctx.last_active?;
        let running: Vec<RunningApp> = ctx
            .candidates
            .iter()
            .filter_map(|candidate| candidate.running.clone())
            .collect();
        let (instance, _) = resolve_running(last_active.as_str(), &running)?;
        let idx = ctx
            .candidates
            .iter()
            .position(|candidate| candidate.running.as_ref() == Some(instance))?;
        Some(Self::advance(ctx.candidates.len(), idx))
    }

    fn first_member_rule(ctx: &DecisionContext<'_>) -> usize {
        ctx.group
            .apps
            .first()
            .and_then(|first| {
                ctx.candidates
                    .iter()
                    .position(|candidate| candidate.app.id == first.id)
            })
            .unwrap_or(0)
    }
}
