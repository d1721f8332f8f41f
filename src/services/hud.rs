//! HUD channel. Rendering is someone else's job: the session emits
//! [`HudMessage`]s and the presenter here only logs them.

use crate::cycling::GroupId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HudItem {
    pub label: String,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HudMessage {
    Show { group: GroupId, items: Vec<HudItem>, selection: usize },
    Select { selection: usize },
    Hide,
}

pub type HudSender = mpsc::UnboundedSender<HudMessage>;

pub fn hud_channel() -> (HudSender, mpsc::UnboundedReceiver<HudMessage>) {
    mpsc::unbounded_channel()
}

/// Презентер, который пишет состояние HUD в лог
pub fn spawn_log_presenter(mut rx: mpsc::UnboundedReceiver<HudMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut items: Vec<HudItem> = Vec::new();
        while let Some(message) = rx.recv().await {
            match message {
                HudMessage::Show { group, items: shown, selection } => {
                    info!("HUD [{}]: {}", group, render_line(&shown, selection));
                    items = shown;
                }
                HudMessage::Select { selection } => {
                    info!("HUD: {}", render_line(&items, selection));
                }
                HudMessage::Hide => {
                    debug!("HUD скрыт");
                    items.clear();
                }
            }
        }
        debug!("Канал HUD закрыт");
    })
}

/// `[a (12)]  b (13)  c (не запущено)`
pub fn render_line(items: &[HudItem], selection: usize) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if i == selection {
                format!("[{}]", item.label)
            } else {
                item.label.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}
