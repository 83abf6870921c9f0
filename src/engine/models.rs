use tracing::warn;

use crate::job::LanguageHint;

/// One entry in the whisper model catalog.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: &'static str,
    pub size_mb: f64,
    pub english_only: bool,
}

/// Models the whisper CLI knows how to fetch on its own. Download and
/// storage are the CLI's business; we only validate names against this
/// list.
pub fn available_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            name: "tiny",
            size_mb: 39.0,
            english_only: false,
        },
        ModelInfo {
            name: "tiny.en",
            size_mb: 39.0,
            english_only: true,
        },
        ModelInfo {
            name: "base",
            size_mb: 142.0,
            english_only: false,
        },
        ModelInfo {
            name: "base.en",
            size_mb: 142.0,
            english_only: true,
        },
        ModelInfo {
            name: "small",
            size_mb: 244.0,
            english_only: false,
        },
        ModelInfo {
            name: "small.en",
            size_mb: 244.0,
            english_only: true,
        },
        ModelInfo {
            name: "medium",
            size_mb: 769.0,
            english_only: false,
        },
        ModelInfo {
            name: "medium.en",
            size_mb: 769.0,
            english_only: true,
        },
        ModelInfo {
            name: "large-v1",
            size_mb: 1550.0,
            english_only: false,
        },
        ModelInfo {
            name: "large-v2",
            size_mb: 1550.0,
            english_only: false,
        },
        ModelInfo {
            name: "large-v3",
            size_mb: 1550.0,
            english_only: false,
        },
        ModelInfo {
            name: "large",
            size_mb: 1550.0,
            english_only: false,
        },
        ModelInfo {
            name: "turbo",
            size_mb: 809.0,
            english_only: false,
        },
    ]
}

pub fn is_known_model(name: &str) -> bool {
    available_models().iter().any(|model| model.name == name)
}

pub fn is_english_only(name: &str) -> bool {
    name.ends_with(".en")
}

/// Resolve the language actually sent to the engine. English-only models
/// always transcribe English, whatever the job asked for.
pub fn effective_language(model: &str, hint: &LanguageHint) -> Option<String> {
    if is_english_only(model) {
        warn!(
            "{} is an English-only model, forcing English detection.",
            model
        );
        return Some("en".to_string());
    }
    hint.as_code().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names() {
        assert!(is_known_model("tiny.en"));
        assert!(is_known_model("large-v3"));
        assert!(is_known_model("turbo"));
        assert!(!is_known_model("gigantic"));
        assert!(!is_known_model(""));
    }

    #[test]
    fn test_catalog_flags_match_names() {
        for model in available_models() {
            assert_eq!(model.english_only, model.name.ends_with(".en"));
        }
    }

    #[test]
    fn test_effective_language_forces_english() {
        let hint = LanguageHint::Code("ja".to_string());
        assert_eq!(effective_language("tiny.en", &hint).as_deref(), Some("en"));
        assert_eq!(
            effective_language("base.en", &LanguageHint::Auto).as_deref(),
            Some("en")
        );
    }

    #[test]
    fn test_effective_language_passes_hint_through() {
        let hint = LanguageHint::Code("de".to_string());
        assert_eq!(effective_language("medium", &hint).as_deref(), Some("de"));
        assert_eq!(effective_language("medium", &LanguageHint::Auto), None);
    }
}
