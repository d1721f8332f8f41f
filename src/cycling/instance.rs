//! Instance identifiers and their tiered matching.
//!
//! A running instance is identified by `"{bundle}-{pid}"`. Stored MRU entries and
//! last-active records may be older than that scheme (a bare bundle id) or may
//! refer to a previous run of the same app (same bundle, dead pid). Matching
//! therefore runs three explicit tiers, each a separate function:
//!
//! 1. exact composite,
//! 2. bare bundle id,
//! 3. bundle prefix (`"{bundle}-<digits>"`).

use super::group::RunningApp;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn composite(bundle_id: &str, pid: u32) -> Self {
        Self(format!("{}-{}", bundle_id, pid))
    }

    /// Голый идентификатор приложения (старый формат, либо ещё не запущенное приложение)
    pub fn bare(bundle_id: &str) -> Self {
        Self(bundle_id.to_string())
    }

    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Разбор на (bundle, pid); pid есть только у составного идентификатора
    pub fn split(&self) -> (&str, Option<u32>) {
        split_composite(&self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Уровень, на котором сработало сопоставление
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchTier {
    Exact,
    Bare,
    Prefix,
}

pub fn split_composite(raw: &str) -> (&str, Option<u32>) {
    match raw.rsplit_once('-') {
        Some((bundle, pid)) if !bundle.is_empty() && is_pid(pid) => (bundle, pid.parse().ok()),
        _ => (raw, None),
    }
}

fn is_pid(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Уровень 1: запись совпадает с составным идентификатором экземпляра
pub fn matches_exact(entry: &str, instance: &RunningApp) -> bool {
    split_composite(entry) == (instance.bundle_id.as_str(), Some(instance.pid))
}

/// Уровень 2: запись - голый идентификатор приложения экземпляра
pub fn matches_bare(entry: &str, instance: &RunningApp) -> bool {
    entry == instance.bundle_id
}

/// Уровень 3: запись - составной идентификатор того же приложения с другим pid
pub fn matches_prefix(entry: &str, instance: &RunningApp) -> bool {
    entry
        .strip_prefix(instance.bundle_id.as_str())
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(is_pid)
}

/// Позиция экземпляра в MRU: первый уровень, давший совпадение, определяет ранг
pub fn resolve_rank(entries: &[String], instance: &RunningApp) -> Option<(usize, MatchTier)> {
    let tiers: [(MatchTier, fn(&str, &RunningApp) -> bool); 3] = [
        (MatchTier::Exact, matches_exact),
        (MatchTier::Bare, matches_bare),
        (MatchTier::Prefix, matches_prefix),
    ];

    tiers.iter().find_map(|(tier, matcher)| {
        entries
            .iter()
            .position(|entry| matcher(entry, instance))
            .map(|idx| (idx, *tier))
    })
}

/// Найти запущенный экземпляр по сохранённому идентификатору.
/// Уровни проверяются по очереди на всём списке, а не для каждого экземпляра отдельно.
pub fn resolve_running<'a>(stored: &str, running: &'a [RunningApp]) -> Option<(&'a RunningApp, MatchTier)> {
    let tiers: [(MatchTier, fn(&str, &RunningApp) -> bool); 3] = [
        (MatchTier::Exact, matches_exact),
        (MatchTier::Bare, matches_bare),
        (MatchTier::Prefix, matches_prefix),
    ];

    tiers.iter().find_map(|(tier, matcher)| {
        running
            .iter()
            .find(|instance| matcher(stored, instance))
            .map(|instance| (instance, *tier))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_composite() {
        assert_eq!(split_composite("firefox-123"), ("firefox", Some(123)));
        assert_eq!(split_composite("gnome-terminal-server-77"), ("gnome-terminal-server", Some(77)));
        assert_eq!(split_composite("gnome-terminal-server"), ("gnome-terminal-server", None));
        assert_eq!(split_composite("-12"), ("-12", None));
        assert_eq!(split_composite("app-"), ("app-", None));
    }

    #[test]
    fn test_exact_tier() {
        let firefox = RunningApp::new("firefox", 10);
        assert!(matches_exact("firefox-10", &firefox));
        assert!(!matches_exact("firefox-11", &firefox));
        assert!(!matches_exact("firefox", &firefox));
    }

    #[test]
    fn test_bare_tier() {
        let firefox = RunningApp::new("firefox", 10);
        assert!(matches_bare("firefox", &firefox));
        assert!(!matches_bare("firefox-10", &firefox));
        assert!(!matches_bare("fire", &firefox));
    }

    #[test]
    fn test_prefix_tier() {
        let firefox = RunningApp::new("firefox", 10);
        assert!(matches_prefix("firefox-99", &firefox));
        assert!(matches_prefix("firefox-10", &firefox));
        assert!(!matches_prefix("firefox-esr-99", &firefox));
        assert!(!matches_prefix("firefox", &firefox));
        assert!(!matches_prefix("firefox-", &firefox));
    }

    #[test]
    fn test_rank_prefers_exact_over_earlier_bare_entry() {
        let firefox = RunningApp::new("firefox", 10);
        let mru = entries(&["firefox", "code-5", "firefox-10"]);
        assert_eq!(resolve_rank(&mru, &firefox), Some((2, MatchTier::Exact)));
    }

    #[test]
    fn test_bare_entry_matches_composite_instance() {
        let firefox = RunningApp::new("firefox", 10);
        let mru = entries(&["code-5", "firefox", "firefox-99"]);
        assert_eq!(resolve_rank(&mru, &firefox), Some((1, MatchTier::Bare)));
    }

    #[test]
    fn test_prefix_is_last_resort() {
        let firefox = RunningApp::new("firefox", 10);
        let mru = entries(&["code-5", "firefox-99"]);
        assert_eq!(resolve_rank(&mru, &firefox), Some((1, MatchTier::Prefix)));
        assert_eq!(resolve_rank(&entries(&["code-5"]), &firefox), None);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let firefox = RunningApp::new("firefox", 10);
        let mru = entries(&["firefox"]);
        let first = resolve_rank(&mru, &firefox);
        assert_eq!(first, resolve_rank(&mru, &firefox));
        assert_eq!(first, Some((0, MatchTier::Bare)));
    }

    #[test]
    fn test_resolve_running_checks_tiers_across_all_instances() {
        let running = vec![RunningApp::new("firefox", 10), RunningApp::new("firefox", 20)];
        let (found, tier) = resolve_running("firefox-20", &running).unwrap();
        assert_eq!((found.pid, tier), (20, MatchTier::Exact));

        let (found, tier) = resolve_running("firefox", &running).unwrap();
        assert_eq!((found.pid, tier), (10, MatchTier::Bare));

        let (found, tier) = resolve_running("firefox-30", &running).unwrap();
        assert_eq!((found.pid, tier), (10, MatchTier::Prefix));

        assert!(resolve_running("code", &running).is_none());
    }
}
