//! Scoring policy for worksheet candidates.

use regex::Regex;

/// Style-code prefixes recognised when none are configured
pub const DEFAULT_STYLE_CODE_PREFIXES: &[&str] = &["BOM", "STY", "SKU", "ART", "REF", "PN"];

const IDENTIFIER_POINTS: u32 = 30;

/// Converts per-sheet signals into points.
///
/// The image and fill thresholds are fixed; the style-code prefixes are
/// supplied by configuration.
#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    style_codes: Option<Regex>,
}

impl ScoringPolicy {
    /// Build a policy recognising `<PREFIX><digits>` for each prefix.
    ///
    /// Prefixes are trimmed and upper-cased; blank entries are ignored. An
    /// empty list disables the identifier signal.
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = prefixes
            .iter()
            .map(|p| p.as_ref().trim().to_uppercase())
            .filter(|p| !p.is_empty())
            .map(|p| regex::escape(&p))
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { style_codes: None });
        }

        let pattern = format!(r"\b(?:{})\d+", alternatives.join("|"));
        Ok(Self {
            style_codes: Some(Regex::new(&pattern)?),
        })
    }

    /// Points for the number of images in the sheet's drawing.
    pub fn image_points(&self, images: usize) -> u32 {
        match images {
            0 => 0,
            1 => 20,
            2 => 40,
            3 => 75,
            _ => 100,
        }
    }

    /// Points for the number of literal cell values in the sheet.
    pub fn fill_points(&self, values: usize) -> u32 {
        if values > 100 {
            20
        } else if values > 50 {
            10
        } else {
            0
        }
    }

    /// Whether the upper-cased sheet content carries a populated style code.
    pub fn has_style_code(&self, upper_content: &str) -> bool {
        self.style_codes
            .as_ref()
            .is_some_and(|re| re.is_match(upper_content))
    }

    pub fn identifier_points(&self, has_style_code: bool) -> u32 {
        if has_style_code { IDENTIFIER_POINTS } else { 0 }
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_STYLE_CODE_PREFIXES).expect("default style-code pattern is valid")
    }
}
