//! Language, prebuilt voice and clone model definitions.
//!
//! The simple synthesis flow picks one of a fixed set of prebuilt voices per
//! language. The clone flow picks a model, and the language follows from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Hindi,
}

impl Language {
    /// Returns the lowercase name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Hindi => "hindi",
        }
    }

    /// Returns the one-letter language code passed to the synthesis tool.
    pub fn code(self) -> char {
        match self {
            Self::English => 'a',
            Self::Hindi => 'h',
        }
    }

    /// Returns the clone model used for this language.
    pub fn clone_model(self) -> CloneModel {
        match self {
            Self::English => CloneModel::F5Tts,
            Self::Hindi => CloneModel::F5TtsSmall,
        }
    }

    /// Returns the prebuilt voices available for this language.
    pub fn voices(self) -> &'static [PrebuiltVoice] {
        match self {
            Self::English => ENGLISH_VOICES,
            Self::Hindi => HINDI_VOICES,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" => Ok(Self::English),
            "hindi" => Ok(Self::Hindi),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// Voice gender, encoded as the second letter of a voice code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn letter(self) -> char {
        match self {
            Self::Female => 'f',
            Self::Male => 'm',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }
}

/// A voice shipped with the simple synthesis tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrebuiltVoice {
    /// Base voice name, e.g. `bella`.
    pub name: &'static str,
    pub gender: Gender,
    pub language: Language,
}

impl PrebuiltVoice {
    const fn new(name: &'static str, gender: Gender, language: Language) -> Self {
        Self {
            name,
            gender,
            language,
        }
    }

    /// Returns the label shown in the client, e.g. `bella (female)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.gender.as_str())
    }

    /// Returns the voice code understood by the synthesis tool.
    ///
    /// The code is the language letter, the gender letter, an underscore and
    /// the base name: `bella` in English is `af_bella`.
    pub fn voice_code(&self) -> String {
        format!(
            "{}{}_{}",
            self.language.code(),
            self.gender.letter(),
            self.name
        )
    }

    /// Returns true if `selector` names this voice, either by its label or by
    /// its base name. Comparison ignores ASCII case and surrounding spaces.
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        selector.eq_ignore_ascii_case(self.name) || selector.eq_ignore_ascii_case(&self.label())
    }
}

pub const ENGLISH_VOICES: &[PrebuiltVoice] = &[
    PrebuiltVoice::new("heart", Gender::Female, Language::English),
    PrebuiltVoice::new("bella", Gender::Female, Language::English),
    PrebuiltVoice::new("adam", Gender::Male, Language::English),
    PrebuiltVoice::new("echo", Gender::Male, Language::English),
];

pub const HINDI_VOICES: &[PrebuiltVoice] = &[
    PrebuiltVoice::new("alpha", Gender::Female, Language::Hindi),
    PrebuiltVoice::new("beta", Gender::Female, Language::Hindi),
    PrebuiltVoice::new("omega", Gender::Male, Language::Hindi),
    PrebuiltVoice::new("psi", Gender::Male, Language::Hindi),
];

/// Looks up a prebuilt voice within a single language.
pub fn find_voice(language: Language, selector: &str) -> Option<&'static PrebuiltVoice> {
    language.voices().iter().find(|voice| voice.matches(selector))
}

/// Voice-cloning models understood by the clone tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloneModel {
    #[serde(rename = "F5-TTS")]
    F5Tts,
    #[serde(rename = "F5-TTS-small")]
    F5TtsSmall,
}

impl CloneModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::F5Tts => "F5-TTS",
            Self::F5TtsSmall => "F5-TTS-small",
        }
    }

    /// Returns the language this model synthesizes.
    pub fn language(self) -> Language {
        match self {
            Self::F5Tts => Language::English,
            Self::F5TtsSmall => Language::Hindi,
        }
    }
}

impl fmt::Display for CloneModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloneModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "F5-TTS" => Ok(Self::F5Tts),
            "F5-TTS-small" => Ok(Self::F5TtsSmall),
            other => Err(format!("unsupported model: {}", other)),
        }
    }
}
