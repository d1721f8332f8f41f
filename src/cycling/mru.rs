use super::group::{Group, RunningApp};
use super::instance::{resolve_rank, split_composite, InstanceId};
use std::cmp::Ordering;

/// Поднять экземпляр на ранг 0, остальные сдвигаются на одну позицию.
///
/// Удаляются прежняя запись этого экземпляра и голая запись того же приложения
/// (старый формат переезжает в составной). Хвост сверх `capacity` отрезается.
pub fn promote(order: &[String], selected: &InstanceId, capacity: usize) -> Vec<String> {
    let (bundle, _) = selected.split();
    let mut promoted = Vec::with_capacity(order.len() + 1);
    promoted.push(selected.as_str().to_string());
    promoted.extend(
        order
            .iter()
            .filter(|entry| entry.as_str() != selected.as_str() && entry.as_str() != bundle)
            .cloned(),
    );
    promoted.truncate(capacity.max(1));
    promoted
}

/// Сравнение двух запущенных экземпляров по MRU группы.
/// Без ранга - после всех ранжированных, между собой по порядку в группе, затем по pid.
pub fn compare_instances(group: &Group, a: &RunningApp, b: &RunningApp) -> Ordering {
    let rank_a = resolve_rank(&group.mru, a).map(|(idx, _)| idx);
    let rank_b = resolve_rank(&group.mru, b).map(|(idx, _)| idx);

    let by_rank = match (rank_a, rank_b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_rank
        .then_with(|| {
            let idx_a = group.member_index(&a.bundle_id).unwrap_or(usize::MAX);
            let idx_b = group.member_index(&b.bundle_id).unwrap_or(usize::MAX);
            idx_a.cmp(&idx_b)
        })
        .then_with(|| a.pid.cmp(&b.pid))
}

/// Запущенные участники группы в порядке MRU
pub fn order_running(group: &Group, running: &[RunningApp]) -> Vec<RunningApp> {
    let mut members: Vec<RunningApp> = running
        .iter()
        .filter(|app| group.contains_app(&app.bundle_id))
        .cloned()
        .collect();
    members.sort_by(|a, b| compare_instances(group, a, b));
    members
}

/// Приложения из MRU, которых уже нет в группе (остаются инертными)
pub fn stale_entries<'a>(group: &'a Group) -> impl Iterator<Item = &'a String> + 'a {
    group
        .mru
        .iter()
        .filter(move |entry| !group.contains_app(split_composite(entry).0))
}

/// Локальный взгляд сессии на MRU: меняется на каждом шаге, но не сохраняется
#[derive(Debug, Clone, PartialEq)]
pub struct MruView {
    order: Vec<String>,
    capacity: usize,
}

impl MruView {
    pub fn new(order: Vec<String>, capacity: usize) -> Self {
        Self { order, capacity }
    }

    pub fn touch(&mut self, instance: &InstanceId) {
        self.order = promote(&self.order, instance, self.capacity);
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn into_order(self) -> Vec<String> {
        self.order
    }
}
