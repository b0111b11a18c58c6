//! Context windows: a unit's text plus its immediate neighbors.
//!
//! The window gives the summarization service disambiguating context around the unit
//! being enriched. Boundary units get an empty string on the missing side; the prompt
//! treats empty context as "no additional context", so no padding token is inserted.

use crate::pipeline::segment::ContentUnit;

/// A text unit together with the text of its immediate neighbors.
#[derive(Debug, Clone)]
pub struct ContextWindow<'a> {
    /// The unit being enriched.
    pub center: &'a ContentUnit,
    /// Text of the preceding unit, empty if absent or textless.
    pub preceding_text: &'a str,
    /// Text of the following unit, empty if absent or textless.
    pub following_text: &'a str,
}

impl ContextWindow<'_> {
    /// The combined context handed to the summarization prompt.
    ///
    /// Always joined with blank-line separators, even at document boundaries.
    pub fn context_text(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            self.preceding_text,
            self.center.text_or_empty(),
            self.following_text
        )
    }
}

/// Build the context window for the unit at `index`, reading only the frozen sequence.
///
/// Returns `None` for units that are not enrichable (non-text or blank), per the
/// window invariant.
pub fn window_at(units: &[ContentUnit], index: usize) -> Option<ContextWindow<'_>> {
    let center = units.get(index)?;
    if !center.is_enrichable() {
        return None;
    }

    let preceding_text = index
        .checked_sub(1)
        .and_then(|prev| units.get(prev))
        .map_or("", ContentUnit::text_or_empty);
    let following_text = units
        .get(index + 1)
        .map_or("", ContentUnit::text_or_empty);

    Some(ContextWindow {
        center,
        preceding_text,
        following_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::segment::{RawBlock, adapt_blocks};

    fn units(texts: &[Option<&str>]) -> Vec<ContentUnit> {
        adapt_blocks(
            texts
                .iter()
                .map(|text| RawBlock {
                    element_type: if text.is_some() {
                        "NarrativeText".into()
                    } else {
                        "Image".into()
                    },
                    text: text.map(str::to_string),
                    page_number: None,
                })
                .collect(),
        )
    }

    #[test]
    fn middle_unit_sees_both_neighbors() {
        let units = units(&[Some("alpha"), Some("bravo"), Some("charlie")]);
        let window = window_at(&units, 1).expect("window");
        assert_eq!(window.preceding_text, "alpha");
        assert_eq!(window.following_text, "charlie");
        assert_eq!(window.context_text(), "alpha\n\nbravo\n\ncharlie");
    }

    #[test]
    fn first_unit_has_empty_preceding_side() {
        let units = units(&[Some("alpha"), Some("bravo")]);
        let window = window_at(&units, 0).expect("window");
        assert_eq!(window.preceding_text, "");
        assert_eq!(window.context_text(), "\n\nalpha\n\nbravo");
    }

    #[test]
    fn last_unit_has_empty_following_side() {
        let units = units(&[Some("alpha"), Some("bravo")]);
        let window = window_at(&units, 1).expect("window");
        assert_eq!(window.following_text, "");
        assert_eq!(window.context_text(), "alpha\n\nbravo\n\n");
    }

    #[test]
    fn textless_neighbors_contribute_empty_strings() {
        let units = units(&[None, Some("bravo"), None]);
        let window = window_at(&units, 1).expect("window");
        assert_eq!(window.preceding_text, "");
        assert_eq!(window.following_text, "");
    }

    #[test]
    fn non_text_units_get_no_window() {
        let units = units(&[Some("alpha"), None, Some("charlie")]);
        assert!(window_at(&units, 1).is_none());
        assert!(window_at(&units, 99).is_none());
    }
}
