use crate::config::{EngineSettings, ScaleConfig};
use crate::environment::{Classification, EnvironmentClassifier};
use crate::events::{EventBus, ScaleEvent};
use crate::host::ScaleHost;
use crate::preset::clamp_scale;
use crate::preset_store::PresetStore;
use crate::time::{Clock, SystemClock, Throttle};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub const NEUTRAL_SCALE: f32 = 1.0;

/// One exponential-approach step toward `target`.
pub fn approach(current: f32, target: f32, smoothing: bool, settings: &EngineSettings) -> f32 {
    if !smoothing {
        return target;
    }
    let delta = target - current;
    if delta.abs() > settings.snap_epsilon {
        current + delta * settings.smoothing_factor
    } else {
        target
    }
}

#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Manual retarget that holds while the configured target stays at `basis`.
#[derive(Debug, Clone, Copy)]
struct PinnedTarget {
    basis: f32,
    target: f32,
}

/// A designated scale (self or others) with its own current/target pair.
/// The first target it sees becomes its current value.
#[derive(Debug)]
struct ScaleSlot {
    current: AtomicF32,
    target: AtomicF32,
    configured: AtomicF32,
    seeded: AtomicBool,
    pinned: Mutex<Option<PinnedTarget>>,
}

impl ScaleSlot {
    fn new() -> Self {
        Self {
            current: AtomicF32::new(NEUTRAL_SCALE),
            target: AtomicF32::new(NEUTRAL_SCALE),
            configured: AtomicF32::new(NEUTRAL_SCALE),
            seeded: AtomicBool::new(false),
            pinned: Mutex::new(None),
        }
    }

    fn track(&self, configured: f32) -> f32 {
        self.configured.store(configured);
        let target = self.pinned_or(configured);
        self.target.store(target);
        if !self.seeded.swap(true, Ordering::AcqRel) {
            self.current.store(target);
        }
        self.current.load()
    }

    /// The pinned target while `configured` still matches its basis; any change drops the pin.
    fn pinned_or(&self, configured: f32) -> f32 {
        let mut pinned = self.pinned.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match *pinned {
            Some(pin) if pin.basis == configured => pin.target,
            Some(_) => {
                *pinned = None;
                configured
            }
            None => configured,
        }
    }

    fn advance(&self, smoothing: bool, settings: &EngineSettings) {
        let next = approach(self.current.load(), self.target.load(), smoothing, settings);
        self.current.store(next);
    }

    fn retarget(&self, target: f32) {
        let pin = PinnedTarget { basis: self.configured.load(), target };
        *self.pinned.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(pin);
        self.target.store(target);
    }

    fn target(&self) -> f32 {
        self.target.load()
    }

    fn reset(&self) {
        self.seeded.store(false, Ordering::Release);
        self.current.store(NEUTRAL_SCALE);
        self.target.store(NEUTRAL_SCALE);
        self.configured.store(NEUTRAL_SCALE);
        *self.pinned.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// Snapshot of the safety gate for status displays.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleStatus {
    pub on_platform: bool,
    pub restricted: bool,
    pub mode: String,
    pub location: String,
    pub scaling_allowed: bool,
    pub restriction_reason: Option<String>,
}

impl fmt::Display for ScaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |flag: bool| if flag { "Yes" } else { "No" };
        writeln!(f, "=== Scale Status ===")?;
        writeln!(f, "On platform: {}", yes_no(self.on_platform))?;
        if self.on_platform {
            writeln!(f, "In competitive game: {}", yes_no(self.restricted))?;
            if self.restricted && !self.mode.is_empty() {
                writeln!(f, "Current game: {}", self.mode)?;
            }
        }
        write!(f, "Scaling allowed: {}", yes_no(self.scaling_allowed))?;
        if let Some(reason) = &self.restriction_reason {
            write!(f, "\nReason: {reason}")?;
        }
        Ok(())
    }
}

/// Per-session scale engine: resolves each entity's target and smooths toward it.
///
/// All methods take `&self`; the engine can be shared behind an `Arc` between the
/// tick driver, the render pass and preset menus.
pub struct ScaleEngine {
    settings: EngineSettings,
    clock: Arc<dyn Clock>,
    presets: Arc<PresetStore>,
    classifier: Mutex<EnvironmentClassifier>,
    gated: AtomicBool,
    tick_throttle: Throttle,
    self_slot: ScaleSlot,
    others_slot: ScaleSlot,
    self_entity: Mutex<Option<Uuid>>,
    current: DashMap<Uuid, f32>,
    targets: DashMap<Uuid, f32>,
    events: EventBus,
}

impl ScaleEngine {
    pub fn new(presets: Arc<PresetStore>) -> Self {
        Self::with_clock(presets, Arc::new(SystemClock::new()), EngineSettings::default())
    }

    pub fn with_clock(presets: Arc<PresetStore>, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        Self {
            settings,
            clock,
            presets,
            classifier: Mutex::new(EnvironmentClassifier::new(settings.classify_interval)),
            gated: AtomicBool::new(false),
            tick_throttle: Throttle::new(settings.tick_interval),
            self_slot: ScaleSlot::new(),
            others_slot: ScaleSlot::new(),
            self_entity: Mutex::new(None),
            current: DashMap::new(),
            targets: DashMap::new(),
            events: EventBus::default(),
        }
    }

    pub fn presets(&self) -> &Arc<PresetStore> {
        &self.presets
    }

    /// Advances every tracked scale one step. Returns false when rate-limited.
    pub fn tick(&self, host: &dyn ScaleHost) -> bool {
        if !self.tick_throttle.try_claim(self.clock.now_millis()) {
            return false;
        }
        let config = host.config().sanitized();
        if config.gating_enabled {
            self.refresh_environment(host);
        }

        self.self_slot.track(self.global_target(&config, true));
        self.others_slot.track(self.global_target(&config, false));
        self.self_slot.advance(config.self_smoothing, &self.settings);
        self.others_slot.advance(config.others_smoothing, &self.settings);

        for mut entry in self.current.iter_mut() {
            let target = self.targets.get(entry.key()).map(|target| *target).unwrap_or(NEUTRAL_SCALE);
            let next = approach(*entry.value(), target, config.others_smoothing, &self.settings);
            *entry.value_mut() = next;
        }
        true
    }

    /// Re-runs the environment classifier if its interval has elapsed.
    ///
    /// The host's text snapshot is taken without holding the classifier lock, so a host
    /// may query `status()` or `classification()` from inside `text_snapshot`.
    pub fn refresh_environment(&self, host: &dyn ScaleHost) {
        let now = self.clock.now_millis();
        if !self.lock_classifier().try_claim(now) {
            return;
        }
        let session = host.session();
        let next = Classification::evaluate(session.as_ref(), || host.text_snapshot());
        let mut classifier = self.lock_classifier();
        let transitions = classifier.apply(now, next);
        self.gated.store(classifier.is_gated(), Ordering::Release);
        drop(classifier);
        for event in transitions {
            self.events.push(event);
        }
    }

    fn lock_classifier(&self) -> MutexGuard<'_, EnvironmentClassifier> {
        self.classifier.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn gate_active(&self, config: &ScaleConfig) -> bool {
        config.gating_enabled && self.gated.load(Ordering::Acquire)
    }

    /// Target for an entity with no applicable preset.
    fn global_target(&self, config: &ScaleConfig, is_self: bool) -> f32 {
        if self.gate_active(config) {
            return NEUTRAL_SCALE;
        }
        if config.apply_to_all && config.others_scaling_enabled {
            return config.others_scale;
        }
        if is_self {
            return config.self_scale;
        }
        if config.others_scaling_enabled {
            return config.others_scale;
        }
        NEUTRAL_SCALE
    }

    /// Scale an entity should be heading toward, by source priority:
    /// gate, preset (others only), apply-to-all, self scale, others scale, neutral.
    pub fn resolve_target(&self, host: &dyn ScaleHost, entity: Uuid, is_self: bool) -> f32 {
        let config = host.config().sanitized();
        self.resolve_target_with(host, &config, entity, is_self)
    }

    fn resolve_target_with(&self, host: &dyn ScaleHost, config: &ScaleConfig, entity: Uuid, is_self: bool) -> f32 {
        if self.gate_active(config) {
            return NEUTRAL_SCALE;
        }
        if config.presets_enabled && !is_self {
            if let Some(record) = self.presets.resolve(entity, |id| host.display_name(id)) {
                return record.scale;
            }
        }
        self.global_target(config, is_self)
    }

    /// The smoothed scale to render `entity` with this frame.
    ///
    /// Without a session there is no way to tell the local entity apart, so the
    /// answer is the neutral scale.
    pub fn current_scale(&self, host: &dyn ScaleHost, entity: Uuid) -> f32 {
        self.tick(host);
        let Some(session) = host.session() else {
            return NEUTRAL_SCALE;
        };
        let config = host.config().sanitized();
        let is_self = entity == session.self_id;
        let target = self.resolve_target_with(host, &config, entity, is_self);
        if is_self {
            self.remember_self(entity);
            return self.self_slot.track(target);
        }
        self.targets.insert(entity, target);
        let current = *self.current.entry(entity).or_insert(target);
        current
    }

    fn remember_self(&self, entity: Uuid) {
        *self.self_entity.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(entity);
    }

    /// Tracked (current, target) pair for a non-self entity.
    pub fn tracked(&self, entity: Uuid) -> Option<(f32, f32)> {
        let current = *self.current.get(&entity)?;
        let target = self.targets.get(&entity).map(|target| *target).unwrap_or(NEUTRAL_SCALE);
        Some((current, target))
    }

    pub fn tracked_count(&self) -> usize {
        self.current.len()
    }

    /// Forgets one entity; its next query is seeded like a first sighting.
    /// Clearing the local entity resets the self slot.
    pub fn clear(&self, entity: Uuid) {
        self.current.remove(&entity);
        self.targets.remove(&entity);
        let known_self = *self.self_entity.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if known_self == Some(entity) {
            self.self_slot.reset();
        }
    }

    /// Drops every tracked entity, including the local one.
    pub fn clear_all(&self) {
        self.current.clear();
        self.targets.clear();
        self.self_slot.reset();
    }

    pub fn self_scale(&self) -> f32 {
        self.self_slot.current.load()
    }

    pub fn others_scale(&self) -> f32 {
        self.others_slot.current.load()
    }

    /// Retargets the self slot. The new target holds until the configured self target changes.
    pub fn set_self_target(&self, scale: f32) {
        self.self_slot.retarget(clamp_scale(scale));
    }

    pub fn set_others_target(&self, scale: f32) {
        self.others_slot.retarget(clamp_scale(scale));
    }

    pub fn self_target(&self) -> f32 {
        self.self_slot.target()
    }

    pub fn others_target(&self) -> f32 {
        self.others_slot.target()
    }

    pub fn is_gated(&self) -> bool {
        self.gated.load(Ordering::Acquire)
    }

    pub fn classification(&self) -> Classification {
        self.lock_classifier().classification().clone()
    }

    pub fn is_scaling_active(&self, config: &ScaleConfig) -> bool {
        !self.gate_active(config)
    }

    pub fn restriction_reason(&self, config: &ScaleConfig) -> Option<String> {
        if !config.gating_enabled {
            return None;
        }
        let classification = self.classification();
        classification
            .is_gated()
            .then(|| format!("Disabled in competitive game: {}", classification.mode))
    }

    pub fn status(&self, config: &ScaleConfig) -> ScaleStatus {
        let classification = self.classification();
        ScaleStatus {
            on_platform: classification.on_platform,
            restricted: classification.restricted,
            mode: classification.mode,
            location: classification.location,
            scaling_allowed: self.is_scaling_active(config),
            restriction_reason: self.restriction_reason(config),
        }
    }

    /// Engine and preset-store events since the last drain, engine events first.
    pub fn drain_events(&self) -> Vec<ScaleEvent> {
        let mut events = self.events.drain();
        events.extend(self.presets.events().drain());
        events
    }
}
