use anyhow::{Context, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{error, warn};
use unic_langid::LanguageIdentifier;

/// Languages with a bundled `main.ftl`, first one is the default
pub const SUPPORTED_LANGUAGES: &[&str] = &["ar", "en"];

const DEFAULT_LANGUAGE: &str = "ar";

const RESOURCES: &[(&str, &str)] = &[
    ("ar", include_str!("../locales/ar/main.ftl")),
    ("en", include_str!("../locales/en/main.ftl")),
];

/// Localization manager for the purchases bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
    fallback: String,
}

impl LocalizationManager {
    /// Create a manager with Arabic as the fallback language
    pub fn new() -> Result<Self> {
        Self::with_fallback(DEFAULT_LANGUAGE)
    }

    /// Create a manager answering in `fallback` when a language is unsupported
    pub fn with_fallback(fallback: &str) -> Result<Self> {
        let mut bundles = HashMap::new();
        for (language, source) in RESOURCES {
            let locale: LanguageIdentifier = language
                .parse()
                .with_context(|| format!("Invalid language identifier {language}"))?;
            bundles.insert(language.to_string(), Self::create_bundle(locale, source)?);
        }

        let fallback = if bundles.contains_key(fallback) {
            fallback.to_string()
        } else {
            warn!(language = %fallback, "Unsupported fallback language, using {DEFAULT_LANGUAGE}");
            DEFAULT_LANGUAGE.to_string()
        };

        Ok(Self { bundles, fallback })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        locale: LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Bidi isolation marks end up verbatim in Telegram messages.
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow::anyhow!("Invalid {locale} resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Duplicate messages in {locale}: {errors:?}"))?;

        Ok(bundle)
    }

    pub fn fallback_language(&self) -> &str {
        &self.fallback
    }

    /// Check if a language is supported
    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Get a localized message in a specific language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, String>>,
    ) -> String {
        let Some(bundle) = self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(&self.fallback))
        else {
            return format!("Missing translation: {key}");
        };

        let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) else {
            return format!("Missing translation: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(value.as_str()));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            warn!(key, language, ?errors, "Errors while formatting message");
        }
        value.into_owned()
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager
pub fn init_localization(fallback: &str) -> Result<()> {
    let manager = LocalizationManager::with_fallback(fallback)?;
    if LOCALIZATION_MANAGER.set(manager).is_err() {
        warn!("Localization manager already initialized");
    }
    Ok(())
}

/// Get the global localization manager, initializing it with defaults if needed
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().unwrap_or_else(|e| {
            error!(error = %e, "Failed to load bundled translations");
            LocalizationManager {
                bundles: HashMap::new(),
                fallback: DEFAULT_LANGUAGE.to_string(),
            }
        })
    })
}

/// Map a Telegram `language_code` (`ar`, `ar-EG`, `en-US`, ...) to a supported language
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    let manager = get_localization_manager();
    let primary = language_code
        .and_then(|code| code.split(['-', '_']).next())
        .map(str::to_lowercase);

    if let Some(primary) = primary {
        if let Some(language) = SUPPORTED_LANGUAGES.iter().find(|l| **l == primary) {
            return *language;
        }
    }

    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| **l == manager.fallback_language())
        .copied()
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// Localized message for a Telegram `language_code`
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    get_localization_manager().get_message_in_language(key, detect_language(language_code), None)
}

/// Localized message for a Telegram `language_code` with arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let args: HashMap<&str, String> = args
        .iter()
        .map(|(name, value)| (*name, value.to_string()))
        .collect();
    get_localization_manager().get_message_in_language(
        key,
        detect_language(language_code),
        Some(&args),
    )
}
