use crate::cycling::{AppRef, CyclingMode, Group, GroupId, SessionSettings};
use crate::events::Hotkey;
use crate::services::window_activator::ActivationSettings;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub input: InputConfig,
    pub session: SessionConfig,
    pub activation: ActivationConfig,
    pub mru: MruConfig,
    pub permissions: PermissionsConfig,
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub device_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub hud_enabled: bool,
    pub hold_threshold_ms: u64,
    pub chain_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivationConfig {
    pub verify_delay_ms: u64,
    pub click_fallback: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MruConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// `"ctrl+alt+1"`
    #[serde(default)]
    pub hotkey: Option<String>,
    #[serde(default)]
    pub mode: CyclingMode,
    pub apps: Vec<AppRef>,
    /// Сохранённый порядок MRU, самый свежий первым
    #[serde(default)]
    pub mru: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            filter: String::new(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_path: "auto".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hud_enabled: true,
            hold_threshold_ms: 250,
            chain_timeout_ms: 800,
        }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            verify_delay_ms: 50,
            click_fallback: true,
        }
    }
}

impl Default for MruConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 1000 }
    }
}

impl LoggingConfig {
    /// Директива EnvFilter: явный `filter`, иначе `level` для этого крейта
    pub fn directive(&self) -> String {
        if self.filter.trim().is_empty() {
            format!("shortcut_cycle={}", self.level)
        } else {
            self.filter.clone()
        }
    }
}

impl GroupConfig {
    pub fn parsed_hotkey(&self) -> Result<Option<Hotkey>> {
        self.hotkey
            .as_deref()
            .map(|raw| {
                raw.parse::<Hotkey>()
                    .map_err(|e| anyhow::anyhow!("Группа '{}': {}", self.id, e))
            })
            .transpose()
    }

    pub fn to_group(&self) -> Result<Group> {
        let mut group = Group::new(self.id.clone(), self.apps.clone())
            .with_mode(self.mode)
            .with_mru(self.mru.iter().cloned());
        if let Some(name) = &self.name {
            group.name = name.clone();
        }
        group.hotkey = self.parsed_hotkey()?;
        Ok(group)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CYCLE_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.session.hold_threshold_ms == 0 {
            anyhow::bail!("hold_threshold_ms должно быть больше 0");
        }
        if self.session.chain_timeout_ms == 0 {
            anyhow::bail!("chain_timeout_ms должно быть больше 0");
        }
        if self.mru.capacity == 0 {
            anyhow::bail!("mru.capacity должно быть больше 0");
        }
        if self.permissions.poll_interval_ms < 100 {
            anyhow::bail!("poll_interval_ms должно быть минимум 100");
        }

        let mut ids = HashSet::new();
        let mut hotkeys = HashSet::new();
        for (i, group) in self.groups.iter().enumerate() {
            if group.id.trim().is_empty() {
                anyhow::bail!("Пустой id у группы #{}", i + 1);
            }
            if !ids.insert(group.id.as_str()) {
                anyhow::bail!("Повторяющийся id группы '{}'", group.id);
            }
            if group.apps.is_empty() {
                anyhow::bail!("В группе '{}' нет приложений", group.id);
            }
            if let Some(app) = group.apps.iter().find(|app| app.id.trim().is_empty()) {
                anyhow::bail!("Пустой id приложения '{}' в группе '{}'", app.display_name(), group.id);
            }
            if let Some(hotkey) = group.parsed_hotkey()? {
                if !hotkeys.insert(hotkey) {
                    anyhow::bail!("Хоткей {} назначен нескольким группам", hotkey);
                }
            }
        }

        Ok(())
    }

    pub fn groups(&self) -> Result<Vec<Group>> {
        self.groups.iter().map(GroupConfig::to_group).collect()
    }

    /// Хоткеи групп; группы без хоткея и с ошибочным хоткеем пропускаются
    pub fn hotkey_bindings(&self) -> Vec<(Hotkey, GroupId)> {
        self.groups
            .iter()
            .filter_map(|group| {
                let hotkey = group.parsed_hotkey().ok().flatten()?;
                Some((hotkey, GroupId::new(group.id.clone())))
            })
            .collect()
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            hud_enabled: self.session.hud_enabled,
            hold_threshold: Duration::from_millis(self.session.hold_threshold_ms),
            chain_timeout: Duration::from_millis(self.session.chain_timeout_ms),
            mru_capacity: self.mru.capacity,
        }
    }

    pub fn activation_settings(&self) -> ActivationSettings {
        ActivationSettings {
            verify_delay: Duration::from_millis(self.activation.verify_delay_ms),
            click_fallback: self.activation.click_fallback,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.permissions.poll_interval_ms)
    }
}
