use rust_stemmers::{Algorithm as SnowballAlgorithm, Stemmer};
use std::sync::OnceLock;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    English,
    Identity,
}

fn english() -> &'static Stemmer {
    static STEMMER: OnceLock<Stemmer> = OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(SnowballAlgorithm::English))
}

/// A word stemmer selected by language name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stem {
    language: String,
    algorithm: Algorithm,
}

impl Default for Stem {
    fn default() -> Self {
        Self {
            language: "none".to_string(),
            algorithm: Algorithm::Identity,
        }
    }
}

impl Stem {
    pub fn new(language: &str) -> Result<Self> {
        let language = language.to_ascii_lowercase();
        let algorithm = match language.as_str() {
            "english" | "en" | "porter" => Algorithm::English,
            "none" | "" => Algorithm::Identity,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "Language code {other} unknown"
                )));
            }
        };
        Ok(Self {
            language,
            algorithm,
        })
    }

    /// Supported language names.
    pub fn languages() -> &'static [&'static str] {
        &["english", "porter", "none"]
    }

    pub fn is_none(&self) -> bool {
        self.algorithm == Algorithm::Identity
    }

    /// Stem a lowercase word.
    pub fn stem(&self, word: &str) -> String {
        match self.algorithm {
            Algorithm::Identity => word.to_string(),
            Algorithm::English => english().stem(word).into_owned(),
        }
    }

    pub fn description(&self) -> String {
        if self.is_none() {
            "Stem(none)".to_string()
        } else {
            format!("Stem({})", self.language)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english_stem() -> Stem {
        Stem::new("english").unwrap()
    }

    #[test]
    fn test_plurals() {
        let s = english_stem();
        assert_eq!(s.stem("caresses"), "caress");
        assert_eq!(s.stem("cats"), "cat");
        assert_eq!(s.stem("skies"), "sky");
        assert_eq!(s.stem("apples"), "appl");
        assert_eq!(s.stem("foxes"), "fox");
    }

    #[test]
    fn test_ed_and_ing() {
        let s = english_stem();
        assert_eq!(s.stem("running"), "run");
        assert_eq!(s.stem("hopping"), "hop");
        assert_eq!(s.stem("searching"), "search");
        assert_eq!(s.stem("dying"), "die");
        assert_eq!(s.stem("connected"), "connect");
    }

    #[test]
    fn test_adverbs_share_a_stem_with_adjectives() {
        let s = english_stem();
        assert_eq!(s.stem("fairly"), "fair");
        assert_eq!(s.stem("fair"), "fair");
        assert_eq!(s.stem("lazy"), "lazi");
    }

    #[test]
    fn test_aliases() -> Result<()> {
        assert_eq!(Stem::new("EN")?.stem("dying"), "die");
        assert_eq!(Stem::new("porter")?.stem("fairly"), "fair");
        Ok(())
    }

    #[test]
    fn test_identity_stemmer() -> Result<()> {
        let s = Stem::new("none")?;
        assert!(s.is_none());
        assert_eq!(s.stem("running"), "running");
        assert_eq!(s.description(), "Stem(none)");
        assert!(Stem::default().is_none());
        Ok(())
    }

    #[test]
    fn test_unknown_language() {
        let err = Stem::new("klingon").unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentError");
    }

    #[test]
    fn test_description() {
        assert_eq!(english_stem().description(), "Stem(english)");
    }
}
