//! Effect templates from song mappings
//!
//! A template describes how a channel's notes light their zone. The only
//! supported form is a literal RGB color (`0xRRGGBB`) scaled by velocity;
//! anything else produces the "off" effect.

/// Effect value that turns a zone off
pub const EFFECT_OFF: u32 = 0;

/// A parsed effect template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTemplate {
    /// RGB color scaled by note velocity
    Color(u32),
    /// Unrecognized template text
    Unsupported,
}

impl EffectTemplate {
    /// Parse template text such as `"0xFF8800"`
    pub fn parse(template: &str) -> Self {
        let Some(digits) = template.strip_prefix("0x") else {
            return EffectTemplate::Unsupported;
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return EffectTemplate::Unsupported;
        }
        match u32::from_str_radix(digits, 16) {
            Ok(color) if color <= i32::MAX as u32 => EffectTemplate::Color(color),
            _ => EffectTemplate::Unsupported,
        }
    }

    /// Effect value for a note played at `velocity`
    pub fn effect(&self, velocity: u8) -> u32 {
        match *self {
            EffectTemplate::Color(color) => scale_color(color, velocity),
            EffectTemplate::Unsupported => EFFECT_OFF,
        }
    }
}

/// Effect value for a template string and velocity
pub fn effect_from_template(template: &str, velocity: u8) -> u32 {
    EffectTemplate::parse(template).effect(velocity)
}

/// Scale each 8-bit RGB channel by `velocity / 128`, truncating
fn scale_color(color: u32, velocity: u8) -> u32 {
    let velocity = velocity as u32;
    let scale = |mask: u32| (((color & mask) * velocity) >> 7) & mask;
    scale(0xFF0000) | scale(0x00FF00) | scale(0x0000FF)
}
