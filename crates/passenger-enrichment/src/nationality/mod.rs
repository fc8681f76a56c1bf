//! Surname nationality inference.
//!
//! This module defines the [`NationalityProvider`] trait that abstracts the
//! external name-classification service, the persisted [`SurnameTable`]
//! cache, and the [`NationalityResolver`] that fills the cache.
//!
//! # Implementing a New Provider
//!
//! Implement [`NationalityProvider`] for a `Send + Sync` struct. The resolver
//! calls [`NationalityProvider::lookup`] from several worker threads at once.
//!
//! ```rust,ignore
//! use passenger_enrichment::nationality::{NationalityProvider, NamsorProvider};
//!
//! let provider = NamsorProvider::from_env()?;
//! let country = provider.lookup("Braund")?;
//! ```

#[cfg(feature = "namsor")]
mod namsor;
mod resolver;
mod table;

#[cfg(feature = "namsor")]
pub use namsor::{
    API_KEY_ENV, NamsorConfig, NamsorConfigBuilder, NamsorProvider, SurnamePlacement, parse_country,
};
pub use resolver::NationalityResolver;
pub use table::SurnameTable;

use crate::error::LookupError;
use once_cell::sync::Lazy;
use regex::Regex;

static COUNTRY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2}$").expect("Invalid regex: country code"));

/// Trait for services that infer a country of origin from a surname.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; lookups run concurrently.
///
/// # Error Handling
///
/// A failed lookup returns a [`LookupError`]. The resolver skips that
/// surname and carries on.
pub trait NationalityProvider: Send + Sync {
    /// Infer the country of `surname`.
    ///
    /// Returns `Ok(Some(code))` with an upper-case ISO 3166 alpha-2 code,
    /// `Ok(None)` when the service answered but could not place the name.
    fn lookup(&self, surname: &str) -> Result<Option<String>, LookupError>;

    /// Get the name of this provider for logging purposes.
    fn name(&self) -> &str;
}

/// Normalize a 2-letter country code to upper case.
///
/// Returns `None` for anything that is not exactly two ASCII letters.
pub fn normalize_country_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    COUNTRY_CODE
        .is_match(trimmed)
        .then(|| trimmed.to_ascii_uppercase())
}
