use crate::events::ScaleEvent;
use crate::host::{SessionInfo, TextSnapshot};
use crate::time::Throttle;
use std::time::Duration;

/// Address fragments identifying the platform whose competitive modes are gated.
pub const PLATFORM_DOMAINS: [&str; 3] = ["hypixel.net", "mc.hypixel.net", "alpha.hypixel.net"];

/// Modes where a scaled model would be an unfair advantage. Order decides the
/// reported mode label, so full names precede their abbreviations.
pub const COMPETITIVE_KEYWORDS: &[&str] = &[
    "bed wars",
    "bedwars",
    "bw",
    "sky wars",
    "skywars",
    "sw",
    "the bridge",
    "bridge",
    "duels",
    "mega walls",
    "megawalls",
    "mw",
    "crazy walls",
    "crazywalls",
    "cw",
    "uhc champions",
    "uhc",
    "champions",
    "smash heroes",
    "smash",
    "sh",
    "blitz survival games",
    "blitz",
    "bsg",
    "tnt games",
    "tnt",
    "bow spleef",
    "tnt tag",
    "tnt run",
    "arena brawl",
    "arena",
    "warlords",
    "murder mystery",
    "mm",
    "cops and crims",
    "cvc",
    "build battle",
    "bb",
    "speed uhc",
    "speed",
    "prototype",
    "tournament",
    "ranked",
    "guild",
    "hide and seek",
    "party games",
    "mini walls",
];

/// Free-roam areas where scaling stays allowed even if a competitive keyword shows up.
pub const SAFE_AREA_KEYWORDS: &[&str] = &[
    "private island",
    "garden",
    "hub",
    "barn",
    "mushroom desert",
    "gold mine",
    "deep caverns",
    "dwarven mines",
    "crystal hollows",
    "farming islands",
    "the end",
    "crimson isle",
    "jerry's workshop",
    "winter island",
    "rift",
    "kuudra",
    "instanced area",
];

pub const FREE_ROAM_KEYWORD: &str = "skyblock";

/// Structured competitive sub-modes inside the free-roam game.
pub const ALWAYS_RESTRICTED_KEYWORDS: [&str; 4] = ["dungeon", "catacombs", "master mode", "floor"];

pub const UNKNOWN_MODE: &str = "unknown";

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

pub fn is_platform_address(address: &str) -> bool {
    contains_any(&address.to_lowercase(), &PLATFORM_DOMAINS)
}

/// First competitive keyword in the lower-cased haystack, or `"unknown"`.
pub fn extract_mode(haystack: &str) -> &'static str {
    COMPETITIVE_KEYWORDS.iter().copied().find(|keyword| haystack.contains(keyword)).unwrap_or(UNKNOWN_MODE)
}

/// Decides whether the lower-cased haystack describes a restricted mode.
///
/// Safe areas always win over competitive keywords, which win over the free-roam rule.
pub fn is_restricted_text(haystack: &str) -> bool {
    if contains_any(haystack, SAFE_AREA_KEYWORDS) {
        return false;
    }
    if contains_any(haystack, COMPETITIVE_KEYWORDS) {
        return true;
    }
    if haystack.contains(FREE_ROAM_KEYWORD) {
        return contains_any(haystack, &ALWAYS_RESTRICTED_KEYWORDS);
    }
    false
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub on_platform: bool,
    pub restricted: bool,
    pub mode: String,
    pub location: String,
}

impl Classification {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Classifies one session/text pair without any rate limiting.
    pub fn evaluate(session: Option<&SessionInfo>, text: impl FnOnce() -> TextSnapshot) -> Self {
        let Some(session) = session else {
            return Self::idle();
        };
        let on_platform = session.address.as_deref().is_some_and(is_platform_address);
        if !on_platform {
            return Self::idle();
        }
        let snapshot = text();
        let haystack = snapshot.haystack();
        Self {
            on_platform,
            restricted: is_restricted_text(&haystack),
            mode: extract_mode(&haystack).to_string(),
            location: snapshot.location.to_lowercase(),
        }
    }

    pub fn is_gated(&self) -> bool {
        self.on_platform && self.restricted
    }
}

/// Cached environment verdict refreshed at most once per interval.
#[derive(Debug)]
pub struct EnvironmentClassifier {
    state: Classification,
    throttle: Throttle,
    last_classified_ms: Option<u64>,
}

impl Default for EnvironmentClassifier {
    fn default() -> Self {
        Self::new(Duration::from_millis(1_000))
    }
}

impl EnvironmentClassifier {
    pub fn new(interval: Duration) -> Self {
        Self { state: Classification::idle(), throttle: Throttle::new(interval), last_classified_ms: None }
    }

    /// Runs the transition function when due. Returns the gate-related transitions it caused.
    pub fn update(
        &mut self,
        now_ms: u64,
        session: Option<&SessionInfo>,
        text: impl FnOnce() -> TextSnapshot,
    ) -> Vec<ScaleEvent> {
        if !self.try_claim(now_ms) {
            return Vec::new();
        }
        self.apply(now_ms, Classification::evaluate(session, text))
    }

    /// Claims the next classification slot without evaluating anything.
    ///
    /// Pair with [`EnvironmentClassifier::apply`] when the text snapshot must be built
    /// outside whatever lock guards the classifier.
    pub fn try_claim(&self, now_ms: u64) -> bool {
        self.throttle.try_claim(now_ms)
    }

    /// Stores a classification made for a claimed slot and returns the transitions it caused.
    pub fn apply(&mut self, now_ms: u64, next: Classification) -> Vec<ScaleEvent> {
        self.last_classified_ms = Some(now_ms);
        let events = self.transitions(&next);
        self.state = next;
        events
    }

    fn transitions(&self, next: &Classification) -> Vec<ScaleEvent> {
        let mut events = Vec::new();
        match (self.state.on_platform, next.on_platform) {
            (false, true) => {
                log::info!("Detected platform server - enabling game mode detection");
                events.push(ScaleEvent::PlatformJoined);
            }
            (true, false) => {
                log::info!("Left platform server - disabling restrictions");
                events.push(ScaleEvent::PlatformLeft);
            }
            _ => {}
        }
        match (self.state.restricted, next.restricted) {
            (false, true) => {
                log::warn!("Entered competitive game mode: {} - scaling disabled", next.mode);
                events.push(ScaleEvent::RestrictedEntered { mode: next.mode.clone() });
            }
            (true, false) => {
                log::info!("Left competitive game mode - scaling re-enabled");
                events.push(ScaleEvent::RestrictedLeft);
            }
            _ => {}
        }
        events
    }

    pub fn reset(&mut self) {
        self.state = Classification::idle();
        self.throttle.reset();
        self.last_classified_ms = None;
    }

    pub fn classification(&self) -> &Classification {
        &self.state
    }

    pub fn is_gated(&self) -> bool {
        self.state.is_gated()
    }

    pub fn is_on_platform(&self) -> bool {
        self.state.on_platform
    }

    pub fn is_restricted(&self) -> bool {
        self.state.restricted
    }

    pub fn current_mode(&self) -> &str {
        &self.state.mode
    }

    pub fn current_location(&self) -> &str {
        &self.state.location
    }

    pub fn last_classified_ms(&self) -> Option<u64> {
        self.last_classified_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn platform_session() -> SessionInfo {
        SessionInfo::new(Uuid::new_v4()).with_address("MC.Hypixel.NET:25565")
    }

    #[test]
    fn competitive_text_is_restricted() {
        assert!(is_restricted_text("bed wars fun mode"));
        assert_eq!(extract_mode("bed wars fun mode"), "bed wars");
    }

    #[test]
    fn safe_area_overrides_competitive_keywords() {
        assert!(!is_restricted_text("private island"));
        assert!(!is_restricted_text("private island bed wars"));
        assert!(!is_restricted_text("skyblock dungeon hub"));
    }

    #[test]
    fn free_roam_is_restricted_only_for_structured_sub_modes() {
        assert!(is_restricted_text("skyblock catacombs floor 7"));
        assert!(!is_restricted_text("skyblock spider's den"));
        assert!(!is_restricted_text("main menu"));
    }

    #[test]
    fn unknown_mode_when_nothing_matches() {
        assert_eq!(extract_mode("main menu"), UNKNOWN_MODE);
        // Short abbreviations match inside words.
        assert_eq!(extract_mode("lobby"), "bb");
    }

    #[test]
    fn platform_detection_is_case_insensitive() {
        assert!(is_platform_address("ALPHA.hypixel.net"));
        assert!(!is_platform_address("play.example.org"));
    }

    #[test]
    fn off_platform_sessions_are_never_restricted() {
        let session = SessionInfo::new(Uuid::new_v4()).with_address("localhost");
        let verdict = Classification::evaluate(Some(&session), || TextSnapshot::from_scoreboard("BED WARS"));
        assert_eq!(verdict, Classification::idle());
        let verdict = Classification::evaluate(None, || TextSnapshot::from_scoreboard("BED WARS"));
        assert_eq!(verdict, Classification::idle());
    }

    #[test]
    fn classifier_is_rate_limited_and_reports_transitions() {
        let mut classifier = EnvironmentClassifier::default();
        let session = platform_session();
        let events = classifier.update(0, Some(&session), || TextSnapshot::from_scoreboard("BED WARS"));
        assert_eq!(
            events,
            vec![ScaleEvent::PlatformJoined, ScaleEvent::RestrictedEntered { mode: "bed wars".into() }]
        );
        assert!(classifier.is_gated());
        assert_eq!(classifier.current_mode(), "bed wars");

        let events = classifier.update(999, None, TextSnapshot::default);
        assert!(events.is_empty(), "too soon to reclassify");
        assert!(classifier.is_gated());

        let events = classifier.update(1_000, None, TextSnapshot::default);
        assert_eq!(events, vec![ScaleEvent::PlatformLeft, ScaleEvent::RestrictedLeft]);
        assert!(!classifier.is_gated());
        assert_eq!(classifier.current_mode(), "");
        assert_eq!(classifier.last_classified_ms(), Some(1_000));
    }

    #[test]
    fn location_label_is_lowercased() {
        let mut classifier = EnvironmentClassifier::default();
        let snapshot = TextSnapshot { location: "Private Island".into(), ..TextSnapshot::default() };
        classifier.update(0, Some(&platform_session()), || snapshot);
        assert_eq!(classifier.current_location(), "private island");
        assert!(!classifier.is_restricted());
        assert!(classifier.is_on_platform());
    }
}
