use crate::config::ScaleConfig;
use uuid::Uuid;

/// The active connection, as seen by the local client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Stable ID of the locally controlled entity.
    pub self_id: Uuid,
    /// Remote address, absent for local/integrated sessions.
    pub address: Option<String>,
}

impl SessionInfo {
    pub fn new(self_id: Uuid) -> Self {
        Self { self_id, address: None }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// Free text the host scraped from its UI. Each field is empty when unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSnapshot {
    pub scoreboard_title: String,
    pub tab_header: String,
    pub tab_footer: String,
    pub location: String,
}

impl TextSnapshot {
    pub fn from_scoreboard(title: impl Into<String>) -> Self {
        Self { scoreboard_title: title.into(), ..Self::default() }
    }

    /// Lower-cased concatenation of every text source.
    pub fn haystack(&self) -> String {
        [&self.scoreboard_title, &self.tab_header, &self.tab_footer, &self.location]
            .iter()
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// Narrow interface the host implements so the engine never touches world state directly.
pub trait ScaleHost {
    /// Current session, or `None` while on a menu / disconnected.
    fn session(&self) -> Option<SessionInfo>;

    /// Best-known display name for an entity.
    fn display_name(&self, _entity: Uuid) -> Option<String> {
        None
    }

    /// Scoreboard and tab-list text.
    fn text_snapshot(&self) -> TextSnapshot {
        TextSnapshot::default()
    }

    /// Options as currently configured by the user.
    fn config(&self) -> ScaleConfig;
}
