//! Prefix-driven autocomplete for the assistant input.
//!
//! # Invariants
//! - At most `MAX_SUGGESTIONS` entries, flats before parties.
//! - Every recomputation resets the highlighted index to 0.
//! - Navigation wraps around in both directions.

use crate::model::flat::Flat;
use crate::model::party::Party;

pub const MAX_SUGGESTIONS: usize = 10;

/// One autocomplete entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Label shown in the list, e.g. `Flat : A1`.
    pub display: String,
    /// Text that replaces the input when applied.
    pub value: String,
}

/// Computes suggestions for the current input text.
pub fn suggest(input: &str, flats: &[Flat], parties: &[Party]) -> Vec<Suggestion> {
    if input.is_empty() {
        return Vec::new();
    }
    let lower = input.to_lowercase();

    let mut suggestions = Vec::new();
    if let Some(term) = search_term(&lower, "flat") {
        suggestions.extend(
            flats
                .iter()
                .filter(|flat| term.is_empty() || flat.flat_no.to_lowercase().contains(term))
                .map(|flat| Suggestion {
                    display: format!("Flat : {}", flat.flat_no),
                    value: flat.flat_no.clone(),
                }),
        );
    }
    if let Some(term) = search_term(&lower, "party") {
        suggestions.extend(
            parties
                .iter()
                .filter(|party| term.is_empty() || party.name.to_lowercase().contains(term))
                .map(|party| Suggestion {
                    display: format!("Party : {}", party.name),
                    value: party.name.clone(),
                }),
        );
    }
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

fn search_term<'a>(lower: &'a str, keyword: &str) -> Option<&'a str> {
    lower.strip_prefix(keyword).map(|rest| rest.trim())
}

/// Suggestion list with a keyboard-driven highlight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionList {
    items: Vec<Suggestion>,
    highlighted: usize,
}

impl SuggestionList {
    /// Recomputes entries for `input` and resets the highlight.
    pub fn refresh(&mut self, input: &str, flats: &[Flat], parties: &[Party]) {
        self.items = suggest(input, flats, parties);
        self.highlighted = 0;
    }

    pub fn items(&self) -> &[Suggestion] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn highlighted_index(&self) -> usize {
        self.highlighted
    }

    pub fn highlighted(&self) -> Option<&Suggestion> {
        self.items.get(self.highlighted)
    }

    /// Down arrow.
    pub fn move_down(&mut self) {
        if !self.items.is_empty() {
            self.highlighted = (self.highlighted + 1) % self.items.len();
        }
    }

    /// Up arrow.
    pub fn move_up(&mut self) {
        let len = self.items.len();
        if len > 0 {
            self.highlighted = (self.highlighted + len - 1) % len;
        }
    }

    /// Enter: returns the fill value of the highlighted entry and clears the
    /// list.
    pub fn apply(&mut self) -> Option<String> {
        let value = self.highlighted().map(|suggestion| suggestion.value.clone())?;
        self.clear();
        Some(value)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.highlighted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{suggest, SuggestionList, MAX_SUGGESTIONS};
    use crate::model::flat::Flat;
    use crate::model::party::Party;
    use uuid::Uuid;

    fn flats(numbers: &[&str]) -> Vec<Flat> {
        let project = Uuid::new_v4();
        numbers
            .iter()
            .map(|number| Flat::new(project, *number, 100.0, 10.0))
            .collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(suggest("", &flats(&["A1"]), &[Party::new("John")]).is_empty());
    }

    #[test]
    fn bare_flat_keyword_lists_all_flats_capped() {
        let numbers: Vec<String> = (1..=12).map(|n| format!("A{n}")).collect();
        let refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
        let all = flats(&refs);

        let suggestions = suggest("flat", &all, &[]);

        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
        assert_eq!(suggestions[0].display, "Flat : A1");
        assert_eq!(suggestions[0].value, "A1");
    }

    #[test]
    fn term_filters_by_case_insensitive_substring() {
        let all = flats(&["A101", "B202", "a102"]);
        let values: Vec<String> = suggest("FLAT a1", &all, &[])
            .into_iter()
            .map(|suggestion| suggestion.value)
            .collect();
        assert_eq!(values, vec!["A101".to_string(), "a102".to_string()]);
    }

    #[test]
    fn party_prefix_matches_names() {
        let parties = vec![Party::new("John Doe"), Party::new("Jane Roe")];
        let suggestions = suggest("party doe", &[], &parties);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].display, "Party : John Doe");
    }

    #[test]
    fn text_without_keyword_yields_nothing() {
        assert!(suggest("A1", &flats(&["A1"]), &[]).is_empty());
    }

    #[test]
    fn navigation_wraps_and_enter_applies() {
        let all = flats(&["A1", "A2", "A3"]);
        let mut list = SuggestionList::default();
        list.refresh("flat", &all, &[]);

        list.move_up();
        assert_eq!(list.highlighted_index(), 2);
        list.move_down();
        assert_eq!(list.highlighted_index(), 0);
        list.move_down();

        assert_eq!(list.apply().as_deref(), Some("A2"));
        assert!(list.is_empty());
        assert_eq!(list.apply(), None);
    }

    #[test]
    fn refresh_resets_highlight() {
        let all = flats(&["A1", "A2"]);
        let mut list = SuggestionList::default();
        list.refresh("flat", &all, &[]);
        list.move_down();
        list.refresh("flat a", &all, &[]);
        assert_eq!(list.highlighted_index(), 0);
    }
}
