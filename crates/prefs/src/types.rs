//! Domain value types carried by the settings schema.

use crate::error::PrefsError;
use crate::persist::{child, put_field, Persist};
use serde_json::Value;

/// Modifier bit meaning "match any modifier state".
pub const ANY_MODIFIER: u32 = 1 << 15;
/// Caps-lock modifier bit, ignored when comparing bindings.
const LOCK_MASK: u32 = 1 << 1;
/// Num-lock modifier bit, ignored when comparing bindings.
const NUM_MASK: u32 = 1 << 4;

/// A pointer-button binding: button number plus modifier state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonBinding {
    pub button: u32,
    pub modifiers: u32,
    /// Fire the action on press instead of waiting for a gesture.
    pub instant: bool,
    /// Treat press-and-hold as a click.
    pub click_hold: bool,
}

impl Default for ButtonBinding {
    fn default() -> Self {
        // Middle button, no modifiers.
        Self {
            button: 2,
            modifiers: 0,
            instant: false,
            click_hold: false,
        }
    }
}

impl ButtonBinding {
    pub fn new(button: u32, modifiers: u32) -> Self {
        Self {
            button,
            modifiers,
            ..Self::default()
        }
    }

    /// Whether two bindings can match the same physical press.
    ///
    /// Lock-style modifiers (caps lock, num lock) never distinguish
    /// bindings; the any-modifier sentinel overlaps everything on the
    /// same button.
    pub fn overlap(&self, other: &ButtonBinding) -> bool {
        if self.button != other.button {
            return false;
        }
        if self.modifiers == ANY_MODIFIER || other.modifiers == ANY_MODIFIER {
            return true;
        }
        (self.modifiers ^ other.modifiers) & !LOCK_MASK & !NUM_MASK == 0
    }
}

impl Persist for ButtonBinding {
    fn store(&self, out: &mut Value) {
        let mut fields = serde_json::Map::new();
        put_field(&mut fields, "button", &self.button);
        put_field(&mut fields, "modifiers", &self.modifiers);
        put_field(&mut fields, "instant", &self.instant);
        put_field(&mut fields, "click_hold", &self.click_hold);
        *out = Value::Object(fields);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        self.button.load(child(node, "button")?)?;
        self.modifiers.load(child(node, "modifiers")?)?;
        self.instant.load(child(node, "instant")?)?;
        self.click_hold.load(child(node, "click_hold")?)?;
        Ok(())
    }
}

/// Trace color, 16 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl Default for Rgb {
    fn default() -> Self {
        // #980101
        Self::from_packed(0x980101)
    }
}

impl Rgb {
    /// Expand a packed 8-bit-per-channel `0xRRGGBB` value.
    ///
    /// Each channel is scaled by 257 so that 0xFF maps to 0xFFFF.
    pub fn from_packed(packed: u32) -> Self {
        Self {
            r: 257 * ((packed >> 16) & 0xff) as u16,
            g: 257 * ((packed >> 8) & 0xff) as u16,
            b: 257 * (packed & 0xff) as u16,
        }
    }
}

impl Persist for Rgb {
    fn store(&self, out: &mut Value) {
        let mut fields = serde_json::Map::new();
        put_field(&mut fields, "r", &(self.r as u32));
        put_field(&mut fields, "g", &(self.g as u32));
        put_field(&mut fields, "b", &(self.b as u32));
        *out = Value::Object(fields);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        let mut channel = |name: &str| -> Result<u16, PrefsError> {
            let mut wide = 0u32;
            wide.load(child(node, name)?)?;
            u16::try_from(wide)
                .map_err(|_| PrefsError::decode(format!("color channel '{name}' out of range")))
        };
        self.r = channel("r")?;
        self.g = channel("g")?;
        self.b = channel("b")?;
        Ok(())
    }
}

/// Gesture timeout tuning profile, persisted as an integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutProfile {
    Off = 0,
    Conservative = 1,
    #[default]
    Default = 2,
    Medium = 3,
    Aggressive = 4,
    Flick = 5,
    Custom = 6,
}

impl TimeoutProfile {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::Conservative),
            2 => Some(Self::Default),
            3 => Some(Self::Medium),
            4 => Some(Self::Aggressive),
            5 => Some(Self::Flick),
            6 => Some(Self::Custom),
            _ => None,
        }
    }
}

impl Persist for TimeoutProfile {
    fn store(&self, out: &mut Value) {
        *out = Value::from(*self as i64);
    }

    fn load(&mut self, node: &Value) -> Result<(), PrefsError> {
        let code = node
            .as_i64()
            .ok_or_else(|| PrefsError::decode("timeout profile is not an integer"))?;
        *self = Self::from_code(code)
            .ok_or_else(|| PrefsError::decode(format!("unknown timeout profile {code}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_ignores_lock_modifiers() {
        let plain = ButtonBinding::new(2, 0);
        let caps = ButtonBinding::new(2, LOCK_MASK);
        let num = ButtonBinding::new(2, NUM_MASK);
        assert!(plain.overlap(&caps));
        assert!(plain.overlap(&num));
    }

    #[test]
    fn overlap_distinguishes_buttons_and_real_modifiers() {
        let a = ButtonBinding::new(2, 0);
        let b = ButtonBinding::new(3, 0);
        let ctrl = ButtonBinding::new(2, 1 << 2);
        assert!(!a.overlap(&b));
        assert!(!a.overlap(&ctrl));
    }

    #[test]
    fn any_modifier_overlaps_everything_on_same_button() {
        let any = ButtonBinding::new(2, ANY_MODIFIER);
        let ctrl = ButtonBinding::new(2, 1 << 2);
        let other_button = ButtonBinding::new(3, ANY_MODIFIER);
        assert!(any.overlap(&ctrl));
        assert!(ctrl.overlap(&any));
        assert!(!any.overlap(&other_button));
    }

    #[test]
    fn packed_color_expands_channels() {
        let c = Rgb::from_packed(0xff8001);
        assert_eq!(c.r, 0xffff);
        assert_eq!(c.g, 0x80 * 257);
        assert_eq!(c.b, 257);
    }

    #[test]
    fn default_color_is_dark_red() {
        let c = Rgb::default();
        assert_eq!(c.r, 0x98 * 257);
        assert_eq!(c.g, 257);
        assert_eq!(c.b, 257);
    }
}
