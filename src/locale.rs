//! Active locale lookup.

/// Source of the locale string used for `accept-language`.
pub trait LocaleProvider: Send + Sync {
    /// Returns the active locale, or `None` when it is not known.
    fn locale(&self) -> Option<String>;
}

/// Provider returning a fixed locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedLocale(String);

impl FixedLocale {
    /// Creates a provider that always answers `locale`.
    #[must_use]
    pub fn new(locale: impl Into<String>) -> Self {
        Self(locale.into())
    }
}

impl LocaleProvider for FixedLocale {
    fn locale(&self) -> Option<String> {
        let locale = self.0.trim();
        if locale.is_empty() {
            None
        } else {
            Some(locale.to_string())
        }
    }
}
