//! Per-category cooldown timers.
//!
//! Discrete gestures (click, scroll, media) are debounced so a held
//! gesture fires once per deliberate hold.  Continuous controls
//! (volume, brightness) use the same mechanism with short windows,
//! which throttles OS calls instead of suppressing repeats.

use tracing::debug;

/// Cooldown categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownCategory {
    Click,
    Scroll,
    Media,
    Volume,
    Brightness,
}

impl CooldownCategory {
    pub const ALL: [CooldownCategory; 5] = [
        CooldownCategory::Click,
        CooldownCategory::Scroll,
        CooldownCategory::Media,
        CooldownCategory::Volume,
        CooldownCategory::Brightness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::Media => "media",
            Self::Volume => "volume",
            Self::Brightness => "brightness",
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

/// Cooldown durations in milliseconds.
#[derive(Debug, Clone)]
pub struct CooldownConfig {
    pub click_ms: f64,
    pub scroll_ms: f64,
    pub media_ms: f64,
    pub volume_ms: f64,
    pub brightness_ms: f64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            click_ms: 1000.0,
            scroll_ms: 300.0,
            media_ms: 2000.0,
            volume_ms: 100.0,
            brightness_ms: 200.0,
        }
    }
}

impl CooldownConfig {
    pub fn duration_ms(&self, category: CooldownCategory) -> f64 {
        match category {
            CooldownCategory::Click => self.click_ms,
            CooldownCategory::Scroll => self.scroll_ms,
            CooldownCategory::Media => self.media_ms,
            CooldownCategory::Volume => self.volume_ms,
            CooldownCategory::Brightness => self.brightness_ms,
        }
    }

    pub fn set_duration_ms(&mut self, category: CooldownCategory, ms: f64) {
        match category {
            CooldownCategory::Click => self.click_ms = ms,
            CooldownCategory::Scroll => self.scroll_ms = ms,
            CooldownCategory::Media => self.media_ms = ms,
            CooldownCategory::Volume => self.volume_ms = ms,
            CooldownCategory::Brightness => self.brightness_ms = ms,
        }
    }
}

/// Last-fire timestamps for every category.
#[derive(Debug, Clone, Default)]
pub struct CooldownRegistry {
    /// Durations.
    pub config: CooldownConfig,
    /// Timestamp (ms) of the last fire; `None` = never fired.
    last_fire_ms: [Option<f64>; 5],
    /// Attempts rejected because the category was still cooling down.
    suppressed: u64,
}

impl CooldownRegistry {
    pub fn new(config: CooldownConfig) -> Self {
        Self {
            config,
            last_fire_ms: [None; 5],
            suppressed: 0,
        }
    }

    /// Whether `category` may fire at `now_ms`.  Does not update state.
    pub fn is_ready(&self, category: CooldownCategory, now_ms: f64) -> bool {
        match self.last_fire_ms[category.slot()] {
            None => true,
            Some(last) => now_ms - last > self.config.duration_ms(category),
        }
    }

    /// Fire `category` if its cooldown has elapsed.
    ///
    /// Returns true and records `now_ms` only when the action may fire.
    pub fn try_fire(&mut self, category: CooldownCategory, now_ms: f64) -> bool {
        if self.is_ready(category, now_ms) {
            self.last_fire_ms[category.slot()] = Some(now_ms);
            true
        } else {
            self.suppressed += 1;
            debug!(category = category.as_str(), now_ms, "suppressed by cooldown");
            false
        }
    }

    /// Timestamp of the last fire, if any.
    pub fn last_fire_ms(&self, category: CooldownCategory) -> Option<f64> {
        self.last_fire_ms[category.slot()]
    }

    /// Milliseconds until `category` is ready again (0 when ready).
    pub fn remaining_ms(&self, category: CooldownCategory, now_ms: f64) -> f64 {
        match self.last_fire_ms[category.slot()] {
            None => 0.0,
            Some(last) => (self.config.duration_ms(category) - (now_ms - last)).max(0.0),
        }
    }

    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    /// Generate s-expression for IPC status.
    pub fn status_sexp(&self, now_ms: f64) -> String {
        let mut s = String::from("(");
        for (i, category) in CooldownCategory::ALL.iter().enumerate() {
            if i > 0 {
                s.push(' ');
            }
            s.push_str(&format!(
                "(:category :{} :cooldown-ms {:.0} :remaining-ms {:.0} :ready {})",
                category.as_str(),
                self.config.duration_ms(*category),
                self.remaining_ms(*category, now_ms),
                if self.is_ready(*category, now_ms) { "t" } else { "nil" },
            ));
        }
        s.push(')');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_fired_is_ready() {
        let mut reg = CooldownRegistry::default();
        for category in CooldownCategory::ALL {
            assert!(reg.is_ready(category, 0.0));
        }
        assert!(reg.try_fire(CooldownCategory::Click, 0.0));
        assert_eq!(reg.last_fire_ms(CooldownCategory::Click), Some(0.0));
    }

    #[test]
    fn test_click_debounce_window() {
        let mut reg = CooldownRegistry::default();
        assert!(reg.try_fire(CooldownCategory::Click, 0.0));
        assert!(!reg.try_fire(CooldownCategory::Click, 500.0));
        assert!(!reg.try_fire(CooldownCategory::Click, 999.0));
        assert!(reg.try_fire(CooldownCategory::Click, 1010.0));
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let mut reg = CooldownRegistry::default();
        assert!(reg.try_fire(CooldownCategory::Scroll, 100.0));
        assert!(!reg.try_fire(CooldownCategory::Scroll, 400.0), "exactly 300ms must not fire");
        assert!(reg.try_fire(CooldownCategory::Scroll, 400.5));
    }

    #[test]
    fn test_suppressed_does_not_extend_window() {
        let mut reg = CooldownRegistry::default();
        assert!(reg.try_fire(CooldownCategory::Media, 0.0));
        assert!(!reg.try_fire(CooldownCategory::Media, 1500.0));
        assert_eq!(reg.last_fire_ms(CooldownCategory::Media), Some(0.0));
        assert!(reg.try_fire(CooldownCategory::Media, 2001.0));
        assert_eq!(reg.suppressed_count(), 1);
    }

    #[test]
    fn test_categories_independent() {
        let mut reg = CooldownRegistry::default();
        assert!(reg.try_fire(CooldownCategory::Click, 0.0));
        assert!(reg.try_fire(CooldownCategory::Media, 10.0));
        assert!(reg.try_fire(CooldownCategory::Scroll, 20.0));
        assert!(reg.try_fire(CooldownCategory::Volume, 30.0));
        assert!(reg.try_fire(CooldownCategory::Brightness, 40.0));
    }

    #[test]
    fn test_brightness_throttle() {
        let mut reg = CooldownRegistry::default();
        let fired = (0..30)
            .filter(|i| reg.try_fire(CooldownCategory::Brightness, *i as f64 * 33.0))
            .count();
        // 0..957ms at 33ms steps with a 200ms throttle: fires at 0, 231, 462, 693, 924.
        assert_eq!(fired, 5);
    }

    #[test]
    fn test_remaining_ms() {
        let mut reg = CooldownRegistry::default();
        assert_eq!(reg.remaining_ms(CooldownCategory::Click, 0.0), 0.0);
        reg.try_fire(CooldownCategory::Click, 0.0);
        assert_eq!(reg.remaining_ms(CooldownCategory::Click, 250.0), 750.0);
        assert_eq!(reg.remaining_ms(CooldownCategory::Click, 5000.0), 0.0);
    }

    #[test]
    fn test_custom_duration() {
        let mut config = CooldownConfig::default();
        config.set_duration_ms(CooldownCategory::Click, 50.0);
        let mut reg = CooldownRegistry::new(config);
        assert!(reg.try_fire(CooldownCategory::Click, 0.0));
        assert!(reg.try_fire(CooldownCategory::Click, 51.0));
    }

    #[test]
    fn test_status_sexp() {
        let mut reg = CooldownRegistry::default();
        reg.try_fire(CooldownCategory::Click, 0.0);
        let sexp = reg.status_sexp(100.0);
        assert!(sexp.contains("(:category :click :cooldown-ms 1000 :remaining-ms 900 :ready nil)"));
        assert!(sexp.contains("(:category :media :cooldown-ms 2000 :remaining-ms 0 :ready t)"));
        assert!(lexpr::from_str(&sexp).is_ok());
    }
}
