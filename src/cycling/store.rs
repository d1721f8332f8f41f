use super::group::{Group, GroupId};
use super::instance::InstanceId;
use super::mru::stale_entries;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

/// Хранилище групп и их MRU. Сохранение на диск - забота внешней стороны;
/// сессия вызывает запись только при завершении.
pub trait GroupStore: Send + Sync {
    fn groups(&self) -> Vec<Group>;
    fn group(&self, id: &GroupId) -> Option<Group>;
    fn update_mru_order(&self, id: &GroupId, order: Vec<String>);
    fn last_active_instance(&self, id: &GroupId) -> Option<InstanceId>;
    fn set_last_active(&self, id: &GroupId, instance: InstanceId);
}

struct StoredGroup {
    group: Group,
    last_active: Option<InstanceId>,
}

/// Хранилище в памяти, заполняется из конфигурации
pub struct MemoryGroupStore {
    groups: RwLock<Vec<StoredGroup>>,
    mru_writes: RwLock<HashMap<GroupId, usize>>,
}

impl MemoryGroupStore {
    pub fn new(groups: Vec<Group>) -> Self {
        info!("Загружено групп: {}", groups.len());
        let groups = groups
            .into_iter()
            .map(|group| StoredGroup {
                // До первого завершения сессии последним активным считаем голову MRU
                last_active: group.mru.first().map(|raw| InstanceId::from_stored(raw.clone())),
                group,
            })
            .collect();

        Self {
            groups: RwLock::new(groups),
            mru_writes: RwLock::new(HashMap::new()),
        }
    }

    /// Сколько раз MRU группы перезаписывался
    pub fn mru_write_count(&self, id: &GroupId) -> usize {
        self.mru_writes.read().get(id).copied().unwrap_or(0)
    }
}

impl GroupStore for MemoryGroupStore {
    fn groups(&self) -> Vec<Group> {
        self.groups.read().iter().map(|stored| stored.group.clone()).collect()
    }

    fn group(&self, id: &GroupId) -> Option<Group> {
        self.groups
            .read()
            .iter()
            .find(|stored| &stored.group.id == id)
            .map(|stored| stored.group.clone())
    }

    fn update_mru_order(&self, id: &GroupId, order: Vec<String>) {
        let mut groups = self.groups.write();
        if let Some(stored) = groups.iter_mut().find(|stored| &stored.group.id == id) {
            debug!("MRU группы [{}]: {:?} -> {:?}", id, stored.group.mru, order);
            stored.group.mru = order;
            let inert = stale_entries(&stored.group).count();
            if inert > 0 {
                debug!("В MRU группы [{}] записей удалённых приложений: {}", id, inert);
            }
            *self.mru_writes.write().entry(id.clone()).or_insert(0) += 1;
        }
    }

    fn last_active_instance(&self, id: &GroupId) -> Option<InstanceId> {
        self.groups
            .read()
            .iter()
            .find(|stored| &stored.group.id == id)
            .and_then(|stored| stored.last_active.clone())
    }

    fn set_last_active(&self, id: &GroupId, instance: InstanceId) {
        if let Some(stored) = self.groups.write().iter_mut().find(|stored| &stored.group.id == id) {
            stored.last_active = Some(instance);
        }
    }
}
