//! Named parameter bundles
//!
//! Each preset carries the twelve effect values and the crackle loop that
//! goes with them. Selecting one copies the values into the live engine.

use crate::params::EffectParameters;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Crackle asset under `/crackle/`
    pub noise_file: &'static str,
    pub params: EffectParameters,
}

const fn values(v: [f32; 12]) -> EffectParameters {
    EffectParameters::from_array(v)
}

pub const PRESETS: [Preset; 9] = [
    Preset {
        id: "untouched",
        name: "Untouched Tracks",
        description: "Pristine vinyl with minimal aging",
        noise_file: "crackle01.wav",
        params: values([0.0, 0.0, 0.05, 0.0, 200.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    },
    Preset {
        id: "mellow-vintage",
        name: "Mellow Vintage",
        description: "Warm, well-preserved record",
        noise_file: "crackle13.wav",
        params: values([0.0, 0.35, 0.21, 0.29, 1200.0, 0.07, 0.0, 0.18, 0.0, 0.08, 0.01, 0.01]),
    },
    Preset {
        id: "dusty-basement",
        name: "Dusty Basement Archive",
        description: "Heavy wear and surface noise",
        noise_file: "crackle21.wav",
        params: values([0.5, 0.5, 0.7, 0.3, 3400.0, 0.28, 0.2, 0.3, 0.29, 0.51, 0.18, 0.0]),
    },
    Preset {
        id: "midnight-jazz",
        name: "Midnight Jazz Vinyl",
        description: "Smoky jazz club atmosphere",
        noise_file: "crackle09.wav",
        params: values([0.15, 0.25, 0.35, 0.15, 2800.0, 0.15, 0.12, 0.2, 0.18, 0.22, 0.08, 0.05]),
    },
    Preset {
        id: "parlor-melodies",
        name: "Parlor Melodies",
        description: "Early 1900s phonograph character",
        noise_file: "crackle17.wav",
        params: values([0.4, 0.6, 0.8, 0.45, 5200.0, 0.5, 0.35, 0.4, 0.15, 0.65, 0.25, 0.12]),
    },
    Preset {
        id: "experimental",
        name: "Experimental Transmission",
        description: "Heavily degraded, lo-fi character",
        noise_file: "crackle23.wav",
        params: values([0.7, 0.75, 0.9, 0.6, 6800.0, 0.65, 0.45, 0.55, 0.42, 0.8, 0.5, 0.25]),
    },
    Preset {
        id: "greenwich-loft",
        name: "Greenwich Village Loft",
        description: "Vintage folk recording aesthetic",
        noise_file: "crackle05.wav",
        params: values([0.2, 0.3, 0.4, 0.2, 3200.0, 0.22, 0.15, 0.25, 0.12, 0.28, 0.1, 0.08]),
    },
    Preset {
        id: "los-pamperos",
        name: "Los Pamperos",
        description: "South American vinyl archive",
        noise_file: "crackle11.wav",
        params: values([0.35, 0.45, 0.6, 0.35, 4100.0, 0.35, 0.25, 0.35, 0.25, 0.42, 0.2, 0.15]),
    },
    Preset {
        id: "vinyl-erosion",
        name: "Vinyl Erosion",
        description: "Maximum deterioration and character",
        noise_file: "crackle19.wav",
        params: values([0.85, 0.9, 1.0, 0.75, 7800.0, 0.8, 0.6, 0.7, 0.55, 0.95, 0.65, 0.35]),
    },
];

/// Look up a preset by id
pub fn find(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id == id)
}

pub fn all() -> &'static [Preset] {
    &PRESETS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamId;

    #[test]
    fn test_ids_unique() {
        for (i, a) in PRESETS.iter().enumerate() {
            for b in &PRESETS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_values_in_range() {
        for preset in all() {
            for id in ParamId::ALL {
                let v = preset.params.get(id);
                assert_eq!(id.clamp(v), v, "{} {}", preset.id, id);
            }
        }
    }

    #[test]
    fn test_untouched_matches_defaults() {
        assert_eq!(find("untouched").map(|p| p.params), Some(EffectParameters::default()));
    }

    #[test]
    fn test_find() {
        let erosion = find("vinyl-erosion").unwrap();
        assert_eq!(erosion.noise_file, "crackle19.wav");
        assert_eq!(erosion.params.age, 7800.0);
        assert!(find("brand-new").is_none());
    }
}
