use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum ScaleEvent {
    PlatformJoined,
    PlatformLeft,
    RestrictedEntered { mode: String },
    RestrictedLeft,
    PresetAdded { identifier: String, scale: f32 },
    PresetRemoved { identifier: String },
    PresetRejected { reason: String },
    PresetsLoaded { count: usize },
    PresetSaveFailed { message: String },
}

impl ScaleEvent {
    /// True for transitions that change whether scaling is suppressed.
    pub fn affects_gate(&self) -> bool {
        matches!(
            self,
            ScaleEvent::PlatformJoined
                | ScaleEvent::PlatformLeft
                | ScaleEvent::RestrictedEntered { .. }
                | ScaleEvent::RestrictedLeft
        )
    }
}

impl fmt::Display for ScaleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleEvent::PlatformJoined => write!(f, "PlatformJoined"),
            ScaleEvent::PlatformLeft => write!(f, "PlatformLeft"),
            ScaleEvent::RestrictedEntered { mode } => write!(f, "RestrictedEntered mode={mode}"),
            ScaleEvent::RestrictedLeft => write!(f, "RestrictedLeft"),
            ScaleEvent::PresetAdded { identifier, scale } => {
                write!(f, "PresetAdded identifier={identifier} scale={scale:.2}")
            }
            ScaleEvent::PresetRemoved { identifier } => write!(f, "PresetRemoved identifier={identifier}"),
            ScaleEvent::PresetRejected { reason } => write!(f, "PresetRejected {reason}"),
            ScaleEvent::PresetsLoaded { count } => write!(f, "PresetsLoaded count={count}"),
            ScaleEvent::PresetSaveFailed { message } => write!(f, "PresetSaveFailed {message}"),
        }
    }
}

/// Collects events from any thread until the host drains them.
#[derive(Debug, Default)]
pub struct EventBus {
    events: Mutex<Vec<ScaleEvent>>,
}

impl EventBus {
    pub fn push(&self, event: ScaleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    pub fn drain(&self) -> Vec<ScaleEvent> {
        match self.events.lock() {
            Ok(mut events) => events.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
