//! The quiz content catalog
//!
//! A catalog is the fixed set of items a game draws its questions from.
//! Each item carries four facets of the same animal: the kanji (which also
//! serves as the item's unique id), its hiragana reading, its english
//! meaning, and an emoji picture. Items are immutable reference data; the
//! session never mutates them after construction.

use garde::Validate;
use serde::{Deserialize, Serialize};

/// A single quiz item with all of its representational facets
///
/// The kanji doubles as the item's unique identifier: answers are submitted
/// and checked against it, and the used-item bookkeeping is keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CatalogItem {
    /// Symbolic form, also the item's unique id
    #[garde(length(min = 1))]
    pub kanji: String,
    /// Phonetic reading
    #[garde(length(min = 1))]
    pub hiragana: String,
    /// Meaning in english
    #[garde(length(min = 1))]
    pub english: String,
    /// Pictorial form
    #[garde(length(min = 1))]
    pub emoji: String,
}

impl CatalogItem {
    /// Returns the item's unique identifier (its kanji)
    pub fn id(&self) -> &str {
        &self.kanji
    }
}

/// An immutable set of quiz items
///
/// The catalog must hold at least [`crate::constants::catalog::CHOICE_COUNT`]
/// items so that every question can draw a full option set; this is the one
/// invariant the rest of the crate relies on, checked by [`Validate`] at
/// construction time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Catalog {
    /// The quiz items, in no particular order
    #[garde(length(min = crate::constants::catalog::CHOICE_COUNT), dive)]
    items: Vec<CatalogItem>,
}

impl Catalog {
    /// Creates a catalog from the given items
    ///
    /// The caller is expected to run [`Validate::validate`] on the result
    /// before handing it to a game; the constructor itself does not reject
    /// undersized catalogs.
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    /// Returns all items in the catalog
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    /// Returns the number of items in the catalog
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the catalog holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up an item by its id
    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.kanji == id)
    }
}

/// One entry of the built-in animal catalog
macro_rules! animal {
    ($kanji:literal, $hiragana:literal, $english:literal, $emoji:literal) => {
        CatalogItem {
            kanji: $kanji.to_owned(),
            hiragana: $hiragana.to_owned(),
            english: $english.to_owned(),
            emoji: $emoji.to_owned(),
        }
    };
}

impl Default for Catalog {
    /// The built-in animal catalog
    fn default() -> Self {
        Self::new(vec![
            animal!("犬", "いぬ", "dog", "🐕"),
            animal!("猫", "ねこ", "cat", "🐱"),
            animal!("鳥", "とり", "bird", "🐦"),
            animal!("魚", "さかな", "fish", "🐟"),
            animal!("馬", "うま", "horse", "🐴"),
            animal!("牛", "うし", "cow", "🐄"),
            animal!("虫", "むし", "insect", "🐛"),
            animal!("羊", "ひつじ", "sheep", "🐑"),
            animal!("熊", "くま", "bear", "🐻"),
            animal!("豚", "ぶた", "pig", "🐷"),
            animal!("兎", "うさぎ", "rabbit", "🐰"),
            animal!("象", "ぞう", "elephant", "🐘"),
        ])
    }
}
