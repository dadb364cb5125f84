//! Light show playback: effect templates and the real-time player

mod effect;
mod player;

pub use effect::{effect_from_template, EffectTemplate, EFFECT_OFF};
pub use player::{LightPlayer, LightShow, PlaybackSummary, PlayerConfig};
