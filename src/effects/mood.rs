use serde::{Deserialize, Serialize};

/// Named bundle of the maximum pitch, speed and gain a mood applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoodProfile {
    pub name: &'static str,
    /// Pitch shift in semitones at full intensity.
    pub pitch_max_semitones: f32,
    /// Playback speed ratio at full intensity.
    pub speed_max_ratio: f32,
    /// Gain in dB at full intensity.
    pub gain_max_db: f32,
}

/// The fixed mood catalog. The first entry is the fallback for unknown names.
pub const MOOD_CATALOG: [MoodProfile; 4] = [
    MoodProfile {
        name: "normal",
        pitch_max_semitones: 0.0,
        speed_max_ratio: 1.0,
        gain_max_db: 0.0,
    },
    MoodProfile {
        name: "upbeat",
        pitch_max_semitones: 2.5,
        speed_max_ratio: 1.18,
        gain_max_db: 1.5,
    },
    MoodProfile {
        name: "angry",
        pitch_max_semitones: -1.5,
        speed_max_ratio: 1.12,
        gain_max_db: 3.0,
    },
    MoodProfile {
        name: "excited",
        pitch_max_semitones: 3.5,
        speed_max_ratio: 1.22,
        gain_max_db: 2.0,
    },
];

pub const MIN_INTENSITY: i32 = 1;
pub const MAX_INTENSITY: i32 = 5;

impl MoodProfile {
    /// Look up a mood by name. Unknown names resolve to `normal`.
    pub fn resolve(name: &str) -> &'static MoodProfile {
        MOOD_CATALOG
            .iter()
            .find(|p| p.name == name)
            .unwrap_or(&MOOD_CATALOG[0])
    }

    pub fn is_known(name: &str) -> bool {
        MOOD_CATALOG.iter().any(|p| p.name == name)
    }

    /// Concrete stage parameters for this mood at the given intensity.
    pub fn parameters(&self, intensity: i32) -> EffectParameters {
        let factor = intensity_factor(intensity);
        EffectParameters {
            factor,
            pitch_steps: self.pitch_max_semitones * factor,
            speed_rate: 1.0 + (self.speed_max_ratio - 1.0) * factor,
            gain_linear: 10f32.powf(self.gain_max_db * factor / 20.0),
        }
    }
}

/// Map an intensity to `[0, 1]`: 1 applies nothing, 5 applies the full profile.
pub fn intensity_factor(intensity: i32) -> f32 {
    (intensity.clamp(MIN_INTENSITY, MAX_INTENSITY) - MIN_INTENSITY) as f32
        / (MAX_INTENSITY - MIN_INTENSITY) as f32
}

/// Per-request stage parameters derived from a [`MoodProfile`] and an intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectParameters {
    pub factor: f32,
    pub pitch_steps: f32,
    pub speed_rate: f32,
    pub gain_linear: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_is_clamped_and_monotonic() {
        let mut previous = -1.0;
        for intensity in -3..=9 {
            let factor = intensity_factor(intensity);
            assert!((0.0..=1.0).contains(&factor));
            assert!(factor >= previous);
            previous = factor;
        }
        assert_eq!(intensity_factor(1), 0.0);
        assert_eq!(intensity_factor(3), 0.5);
        assert_eq!(intensity_factor(5), 1.0);
        assert_eq!(intensity_factor(42), 1.0);
    }

    #[test]
    fn unknown_mood_resolves_to_normal() {
        assert_eq!(MoodProfile::resolve("melancholic").name, "normal");
        assert_eq!(MoodProfile::resolve("").name, "normal");
        assert_eq!(MoodProfile::resolve("angry").name, "angry");
        assert!(!MoodProfile::is_known("Angry"));
    }

    #[test]
    fn normal_mood_is_identity_at_every_intensity() {
        for intensity in 1..=5 {
            let p = MoodProfile::resolve("normal").parameters(intensity);
            assert_eq!(p.pitch_steps, 0.0);
            assert_eq!(p.speed_rate, 1.0);
            assert_eq!(p.gain_linear, 1.0);
        }
    }

    #[test]
    fn upbeat_at_intensity_three() {
        let p = MoodProfile::resolve("upbeat").parameters(3);
        assert_eq!(p.factor, 0.5);
        assert!((p.pitch_steps - 1.25).abs() < 1e-6);
        assert!((p.speed_rate - 1.09).abs() < 1e-6);
        assert!((p.gain_linear - 10f32.powf(0.75 / 20.0)).abs() < 1e-6);
        assert!((p.gain_linear - 1.0902).abs() < 1e-3);
    }

    #[test]
    fn angry_at_full_intensity() {
        let p = MoodProfile::resolve("angry").parameters(5);
        assert_eq!(p.factor, 1.0);
        assert!((p.pitch_steps + 1.5).abs() < 1e-6);
        assert!((p.speed_rate - 1.12).abs() < 1e-6);
        assert!((p.gain_linear - 1.4125).abs() < 1e-3);
    }
}
