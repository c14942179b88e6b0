//! Newtype wrappers that render lists of models.
//!
//! Each wrapper prints its elements one after another and falls back to a
//! "No ... found." line when empty.

use std::{fmt, ops::Index};

use crate::models::{CaseSummary, DeployedDefinition, HistoryEntry, PlanItemInstance};

macro_rules! display_collection {
    ($(#[$meta:meta])* $name:ident, $item:ty, $empty:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        pub struct $name(pub Vec<$item>);

        impl $name {
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn get(&self, index: usize) -> Option<&$item> {
                self.0.get(index)
            }

            pub fn iter(&self) -> std::slice::Iter<'_, $item> {
                self.0.iter()
            }
        }

        impl Index<usize> for $name {
            type Output = $item;

            fn index(&self, index: usize) -> &Self::Output {
                &self.0[index]
            }
        }

        impl IntoIterator for $name {
            type Item = $item;
            type IntoIter = std::vec::IntoIter<$item>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }

        impl<'a> IntoIterator for &'a $name {
            type Item = &'a $item;
            type IntoIter = std::slice::Iter<'a, $item>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.iter()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.0.is_empty() {
                    return writeln!(f, $empty);
                }
                for element in &self.0 {
                    write!(f, "{element}")?;
                }
                Ok(())
            }
        }
    };
}

display_collection!(
    /// Case summaries as returned by case listings.
    CaseSummaries,
    CaseSummary,
    "No cases found."
);

display_collection!(
    /// Plan item instances, e.g. the items of one case or the open work
    /// items across cases.
    ///
    /// ```rust
    /// use casework_core::display::PlanItems;
    ///
    /// assert_eq!(PlanItems(vec![]).to_string(), "No plan items found.\n");
    /// ```
    PlanItems,
    PlanItemInstance,
    "No plan items found."
);

display_collection!(
    /// Deployed definitions, one entry per key.
    Definitions,
    DeployedDefinition,
    "No definitions deployed."
);

display_collection!(
    /// The lifecycle history of one case in sequence order.
    History,
    HistoryEntry,
    "No history recorded."
);

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::models::CaseState;

    fn summary(id: u64) -> CaseSummary {
        CaseSummary {
            id,
            definition_key: "review".to_string(),
            definition_version: 1,
            state: CaseState::Active,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
            live_items: 3,
            open_tasks: 1,
        }
    }

    #[test]
    fn test_empty_collections_print_message() {
        assert_eq!(CaseSummaries::default().to_string(), "No cases found.\n");
        assert_eq!(History::default().to_string(), "No history recorded.\n");
    }

    #[test]
    fn test_collection_renders_every_element() {
        let cases = CaseSummaries(vec![summary(2), summary(1)]);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].id, 1);
        let output = cases.to_string();
        assert!(output.contains("## Case 2: review v1 (active)"));
        assert!(output.contains("## Case 1: review v1 (active)"));
        assert!(output.contains("1 of 3 live items"));
    }
}
