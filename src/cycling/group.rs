use super::instance::InstanceId;
use crate::events::Hotkey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор группы приложений
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Режим цикла группы
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclingMode {
    /// Перебираются только запущенные экземпляры
    RunningOnly,
    /// Незапущенные участники запускаются
    #[default]
    LaunchIfNeeded,
}

impl CyclingMode {
    pub fn may_launch(&self) -> bool {
        matches!(self, CyclingMode::LaunchIfNeeded)
    }
}

/// Ссылка на приложение в группе
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppRef {
    /// Идентификатор приложения (на Linux - имя исполняемого файла)
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Команда запуска; по умолчанию совпадает с `id`
    #[serde(default)]
    pub exec: Option<String>,
}

impl AppRef {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self { name: id.clone(), id, exec: None }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }

    pub fn launch_command(&self) -> &str {
        self.exec.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub apps: Vec<AppRef>,
    pub hotkey: Option<Hotkey>,
    pub mode: CyclingMode,
    /// Идентификаторы экземпляров, самый свежий первым
    pub mru: Vec<String>,
}

impl Group {
    pub fn new(id: impl Into<String>, apps: Vec<AppRef>) -> Self {
        let id = GroupId::new(id);
        Self {
            name: id.0.clone(),
            id,
            apps,
            hotkey: None,
            mode: CyclingMode::default(),
            mru: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: CyclingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mru<S: Into<String>>(mut self, mru: impl IntoIterator<Item = S>) -> Self {
        self.mru = mru.into_iter().map(Into::into).collect();
        self
    }

    /// Позиция приложения в определении группы
    pub fn member_index(&self, bundle_id: &str) -> Option<usize> {
        self.apps.iter().position(|app| app.id == bundle_id)
    }

    pub fn contains_app(&self, bundle_id: &str) -> bool {
        self.member_index(bundle_id).is_some()
    }
}

/// Запущенный процесс приложения
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunningApp {
    pub bundle_id: String,
    pub pid: u32,
}

impl RunningApp {
    pub fn new(bundle_id: impl Into<String>, pid: u32) -> Self {
        Self { bundle_id: bundle_id.into(), pid }
    }

    pub fn instance_id(&self) -> InstanceId {
        InstanceId::composite(&self.bundle_id, self.pid)
    }
}

impl fmt::Display for RunningApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {})", self.bundle_id, self.pid)
    }
}
