//! Languages and voices offered by the synthesis provider.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Female,
    Male,
}

#[derive(Debug, Serialize)]
pub struct Voice {
    pub name: &'static str,
    pub gender: Gender,
    pub natural: bool,
}

#[derive(Debug)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub voices: &'static [Voice],
}

impl Language {
    pub fn default_voice(&self) -> &'static Voice {
        &self.voices[0]
    }

    pub fn voice(&self, name: &str) -> Option<&'static Voice> {
        self.voices.iter().find(|voice| voice.name == name)
    }
}

const fn voice(name: &'static str, gender: Gender, natural: bool) -> Voice {
    Voice {
        name,
        gender,
        natural,
    }
}

// Every language must list at least one voice; the first one is the default.
pub static LANGUAGES: &[Language] = &[
    Language {
        code: "en-GB",
        name: "English (Great Britain)",
        voices: &[
            voice("en-GB-Journey-D", Gender::Female, true),
            voice("en-GB-Neural2-A", Gender::Female, true),
            voice("en-GB-Neural2-B", Gender::Male, true),
            voice("en-GB-Neural2-C", Gender::Female, true),
            voice("en-GB-Neural2-D", Gender::Male, true),
            voice("en-GB-Neural2-F", Gender::Female, true),
        ],
    },
    Language {
        code: "zh-CN",
        name: "Chinese (Mandarin)",
        voices: &[
            voice("cmn-CN-Standard-A", Gender::Female, false),
            voice("cmn-CN-Standard-B", Gender::Male, false),
            voice("cmn-CN-Standard-C", Gender::Male, false),
            voice("cmn-CN-Standard-D", Gender::Female, false),
        ],
    },
];

/// Looks up a language by code, accepting the short forms `en`, `zh` and
/// `zh-cn` as well as any casing of the canonical codes.
pub fn find_language(code: &str) -> Option<&'static Language> {
    let code = code.trim();
    let canonical = match code.to_ascii_lowercase().as_str() {
        "en" => "en-GB",
        "zh" | "zh-cn" => "zh-CN",
        _ => code,
    };

    LANGUAGES
        .iter()
        .find(|language| language.code.eq_ignore_ascii_case(canonical))
}

pub fn supported_codes() -> Vec<&'static str> {
    LANGUAGES.iter().map(|language| language.code).collect()
}
