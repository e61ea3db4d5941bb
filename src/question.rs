//! Question generation
//!
//! Every catalog item is covered by two rounds: a kanji round (kanji shown,
//! pick the animal — or the reverse orientation, chosen by coin flip) and a
//! follow-up hiragana round reusing the same item (kanji shown, pick the
//! reading). The generator owns the used-item bookkeeping that prevents
//! immediate repetition and remembers the current subject between the two
//! rounds of an item.

use std::collections::HashSet;

use itertools::Itertools;
use serde::Serialize;

use super::catalog::{Catalog, CatalogItem};
use crate::constants::catalog::CHOICE_COUNT;

/// The orientation of a round's prompt and options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuestionKind {
    /// Kanji prompt, emoji options
    KanjiToAnimal,
    /// Emoji prompt, kanji options
    AnimalToKanji,
    /// Kanji prompt, hiragana options
    Hiragana,
}

/// One selectable answer option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    /// The id submitted when this option is picked (the item's kanji)
    pub id: String,
    /// The facet shown on the option button
    pub display: String,
}

/// A fully built question, owned by the session for the round's lifetime
///
/// Invariant: `options` holds exactly [`CHOICE_COUNT`] entries with unique
/// ids, exactly one of which equals `correct_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    /// The round orientation
    pub kind: QuestionKind,
    /// The facet shown as the prompt
    pub prompt: String,
    /// The shuffled answer options
    pub options: Vec<AnswerOption>,
    /// The id of the correct option
    pub correct_id: String,
}

/// Builds rounds and tracks which items a game has already covered
#[derive(Debug, Default)]
pub struct QuestionGenerator {
    /// Ids of items already used this cycle; cleared when exhausted
    used: HashSet<String>,
    /// The item the current round pair is about
    subject: Option<String>,
}

impl QuestionGenerator {
    /// Clears the used-item set and the current subject
    pub fn reset(&mut self) {
        self.used.clear();
        self.subject = None;
    }

    /// Returns the item the current round pair is about
    pub fn subject_item<'a>(&self, catalog: &'a Catalog) -> Option<&'a CatalogItem> {
        self.subject.as_deref().and_then(|id| catalog.get(id))
    }

    /// Builds a kanji round for a freshly drawn item
    ///
    /// Draws the subject uniformly from items not yet used, clearing the
    /// used set first if every item has appeared once (repetition is allowed
    /// from then on). The orientation is a fair coin flip. Returns `None`
    /// only for an empty catalog, which validated catalogs rule out.
    pub fn kanji_round(&mut self, catalog: &Catalog) -> Option<Question> {
        let items = catalog.items();

        let mut available = items
            .iter()
            .filter(|item| !self.used.contains(item.id()))
            .collect_vec();
        if available.is_empty() {
            self.used.clear();
            available = items.iter().collect_vec();
        }
        if available.is_empty() {
            return None;
        }

        let subject = available[fastrand::usize(..available.len())];
        self.used.insert(subject.id().to_owned());
        self.subject = Some(subject.id().to_owned());

        let kanji_to_animal = fastrand::bool();
        let kind = if kanji_to_animal {
            QuestionKind::KanjiToAnimal
        } else {
            QuestionKind::AnimalToKanji
        };
        let prompt = if kanji_to_animal {
            subject.kanji.clone()
        } else {
            subject.emoji.clone()
        };

        Some(build_question(catalog, subject, kind, prompt, |item| {
            if kanji_to_animal {
                item.emoji.clone()
            } else {
                item.kanji.clone()
            }
        }))
    }

    /// Builds the hiragana round for the current subject
    ///
    /// Reuses the item drawn by the preceding [`Self::kanji_round`]; the
    /// caller sequences the two calls. Returns `None` when no subject is
    /// recorded.
    pub fn hiragana_round(&self, catalog: &Catalog) -> Option<Question> {
        let subject = self.subject_item(catalog)?;

        Some(build_question(
            catalog,
            subject,
            QuestionKind::Hiragana,
            subject.kanji.clone(),
            |item| item.hiragana.clone(),
        ))
    }
}

/// Assembles the shuffled option set around a subject item
///
/// Draws `CHOICE_COUNT - 1` distinct distractors uniformly without
/// replacement from the catalog's other items, then shuffles the full set.
fn build_question<F>(
    catalog: &Catalog,
    subject: &CatalogItem,
    kind: QuestionKind,
    prompt: String,
    display: F,
) -> Question
where
    F: Fn(&CatalogItem) -> String,
{
    let mut distractors = catalog
        .items()
        .iter()
        .filter(|item| item.id() != subject.id())
        .collect_vec();
    fastrand::shuffle(&mut distractors);

    let mut choices = distractors;
    choices.truncate(CHOICE_COUNT - 1);
    choices.push(subject);
    fastrand::shuffle(&mut choices);

    Question {
        kind,
        prompt,
        options: choices
            .into_iter()
            .map(|item| AnswerOption {
                id: item.id().to_owned(),
                display: display(item),
            })
            .collect_vec(),
        correct_id: subject.id().to_owned(),
    }
}
