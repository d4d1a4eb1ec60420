//! Items, their category labels, and the category registry.

use std::collections::{BTreeMap, BTreeSet};

use crate::{Error, Result};

/// Label carried by items that have no category at all. Never scored.
pub const NO_CATEGORY: &str = "(no genres listed)";

/// Separator inside a packed label string, e.g. `"Comedy|Drama"`.
pub const LABEL_DELIMITER: char = '|';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Item {
    pub categories: Vec<String>,
    /// Held out of every teleport set. The item stays in the graph and still receives rank.
    pub unlabeled: bool,
}

impl Item {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { categories: categories.into_iter().map(Into::into).collect(), unlabeled: false }
    }

    /// Parse a packed label string. Empty fragments are dropped; the [`NO_CATEGORY`] sentinel is
    /// kept as-is so callers can count uncategorized items.
    pub fn from_labels(labels: &str) -> Self {
        Self::new(labels.split(LABEL_DELIMITER).map(str::trim).filter(|s| !s.is_empty()))
    }

    pub fn with_unlabeled(mut self, unlabeled: bool) -> Self {
        self.unlabeled = unlabeled;
        self
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    fn is_uncategorized(&self) -> bool {
        self.categories.iter().all(|c| c == NO_CATEGORY)
    }
}

/// The fixed, id-ordered set of items for one run. Item ids are positions `0..len`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemRoster {
    items: Vec<Item>,
}

impl ItemRoster {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn from_label_strings<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(labels.into_iter().map(|l| Item::from_labels(l.as_ref())).collect())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Hold the given items out of teleport sets.
    pub fn mark_unlabeled<I>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = usize>,
    {
        let n = self.items.len();
        for id in ids {
            let item = self.items.get_mut(id).ok_or_else(|| {
                Error::InvalidConfig(format!("unlabeled item {id} out of range for {n} items"))
            })?;
            item.unlabeled = true;
        }
        Ok(())
    }

    pub fn unlabeled_count(&self) -> usize {
        self.items.iter().filter(|i| i.unlabeled).count()
    }

    /// Teleport set of `category`: ids carrying the label, minus unlabeled items. Ascending.
    pub fn members(&self, category: &str) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.unlabeled && item.has_category(category))
            .map(|(id, _)| id)
            .collect()
    }
}

/// The valid category vocabulary. Never contains [`NO_CATEGORY`] or the empty label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CategoryRegistry {
    categories: BTreeSet<String>,
}

impl CategoryRegistry {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let categories = categories
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| !c.is_empty() && c != NO_CATEGORY)
            .collect();
        Self { categories }
    }

    /// Collect every label used by the roster, minus `ignored`.
    pub fn discover(roster: &ItemRoster, ignored: &BTreeSet<String>) -> Self {
        let all = Self::new(roster.items().iter().flat_map(|i| i.categories.iter().cloned()));
        let uncategorized = roster.items().iter().filter(|i| i.is_uncategorized()).count();
        log::info!(
            "discovered {} categories ({} items without a category)",
            all.len(),
            uncategorized
        );
        all.without(ignored)
    }

    pub fn without(&self, ignored: &BTreeSet<String>) -> Self {
        Self { categories: self.categories.difference(ignored).cloned().collect() }
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    /// Teleport set of every registered category.
    pub fn members(&self, roster: &ItemRoster) -> BTreeMap<String, Vec<usize>> {
        let mut sets: BTreeMap<String, Vec<usize>> =
            self.categories.iter().map(|c| (c.clone(), Vec::new())).collect();
        for (id, item) in roster.items().iter().enumerate() {
            if item.unlabeled {
                continue;
            }
            for c in &item.categories {
                if let Some(set) = sets.get_mut(c) {
                    // A label repeated on one item still counts once.
                    if set.last() != Some(&id) {
                        set.push(id);
                    }
                }
            }
        }
        sets
    }

    pub fn counts(&self, roster: &ItemRoster) -> BTreeMap<String, usize> {
        self.members(roster).into_iter().map(|(c, m)| (c, m.len())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> ItemRoster {
        ItemRoster::from_label_strings([
            "Comedy|Drama",
            "Drama",
            "(no genres listed)",
            "Comedy|IMAX",
            "Drama||Comedy",
        ])
    }

    #[test]
    fn parses_packed_labels() {
        let item = Item::from_labels("Action| Sci-Fi ||");
        assert_eq!(item.categories, vec!["Action", "Sci-Fi"]);
        assert!(!item.unlabeled);
        assert!(Item::from_labels("").categories.is_empty());
    }

    #[test]
    fn discover_drops_sentinel_and_ignored() {
        let ignored: BTreeSet<String> = ["IMAX".to_string()].into();
        let reg = CategoryRegistry::discover(&roster(), &ignored);
        assert_eq!(reg.iter().collect::<Vec<_>>(), vec!["Comedy", "Drama"]);
        assert!(!reg.contains(NO_CATEGORY));
    }

    #[test]
    fn members_skip_unlabeled_items() {
        let mut r = roster();
        r.mark_unlabeled([1]).unwrap();
        assert_eq!(r.unlabeled_count(), 1);
        assert_eq!(r.members("Drama"), vec![0, 4]);

        let reg = CategoryRegistry::new(["Comedy", "Drama", "Western"]);
        let counts = reg.counts(&r);
        assert_eq!(counts["Comedy"], 3);
        assert_eq!(counts["Drama"], 2);
        assert_eq!(counts["Western"], 0);
    }

    #[test]
    fn repeated_label_on_one_item_counts_once() {
        let r = ItemRoster::new(vec![Item::new(["A", "A"]), Item::new(["A"])]);
        let reg = CategoryRegistry::new(["A"]);
        assert_eq!(reg.members(&r)["A"], vec![0, 1]);
    }

    #[test]
    fn unlabeled_flag_on_construction_matches_marking() {
        let built = ItemRoster::new(vec![
            Item::new(["A"]),
            Item::new(["A"]).with_unlabeled(true),
            Item::new(["A"]),
        ]);
        let mut marked = ItemRoster::from_label_strings(["A", "A", "A"]);
        marked.mark_unlabeled([1]).unwrap();
        assert_eq!(built, marked);
        assert_eq!(built.members("A"), vec![0, 2]);
    }

    #[test]
    fn mark_unlabeled_rejects_unknown_item() {
        let mut r = roster();
        assert!(matches!(r.mark_unlabeled([5]), Err(Error::InvalidConfig(_))));
    }
}
