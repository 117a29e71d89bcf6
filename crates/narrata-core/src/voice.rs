//! Narrator voice catalog.
//!
//! Friendly names for the neural voices the default synthesizer backend
//! ships with. The pipeline itself only ever sees the opaque `voice_id`;
//! the catalog exists so the CLI can offer human-sized names.

/// A narrator voice: friendly name plus the backend voice identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    /// Short name used on the command line.
    pub name: &'static str,

    /// Backend voice identifier.
    pub voice_id: &'static str,

    /// One-line description shown by `narrata voices`.
    pub description: &'static str,
}

/// Default narrator voice.
pub const DEFAULT_VOICE: VoiceProfile = VoiceProfile {
    name: "francisca",
    voice_id: "pt-BR-FranciscaNeural",
    description: "Female, Brazilian Portuguese — calm",
};

const CATALOG: &[VoiceProfile] = &[
    DEFAULT_VOICE,
    VoiceProfile {
        name: "thalita",
        voice_id: "pt-BR-ThalitaMultilingualNeural",
        description: "Female, Brazilian Portuguese — multilingual",
    },
    VoiceProfile {
        name: "antonio",
        voice_id: "pt-BR-AntonioNeural",
        description: "Male, Brazilian Portuguese",
    },
    VoiceProfile {
        name: "raquel",
        voice_id: "pt-PT-RaquelNeural",
        description: "Female, European Portuguese",
    },
    VoiceProfile {
        name: "duarte",
        voice_id: "pt-PT-DuarteNeural",
        description: "Male, European Portuguese",
    },
];

/// All known voices.
#[must_use]
pub const fn voice_catalog() -> &'static [VoiceProfile] {
    CATALOG
}

/// Look up a voice by friendly name, case-insensitively.
#[must_use]
pub fn find_voice(name: &str) -> Option<&'static VoiceProfile> {
    CATALOG.iter().find(|v| v.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find_voice("Antonio").map(|v| v.voice_id), Some("pt-BR-AntonioNeural"));
        assert_eq!(find_voice("ANTONIO").map(|v| v.voice_id), Some("pt-BR-AntonioNeural"));
        assert!(find_voice("nobody").is_none());
    }

    #[test]
    fn default_voice_is_in_catalog() {
        assert!(voice_catalog().contains(&DEFAULT_VOICE));
    }
}
