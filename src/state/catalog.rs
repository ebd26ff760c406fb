//! Deck catalog: the resolved decks offered on the picker, loaded from JSON files.

use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::state::session::{Card, CardKind, Deck, DeckId};

/// Errors raised while loading decks or resolving a playable pile.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A deck file or the deck directory could not be read.
    #[error("failed to read deck data at {path}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A deck file is not valid JSON or misses required fields.
    #[error("invalid deck file {path}")]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// No deck with this identifier exists.
    #[error("deck `{0}` not found")]
    NotFound(DeckId),
    /// The deck exists but is disabled.
    #[error("deck `{0}` is disabled")]
    Disabled(DeckId),
    /// The deck has no card to play.
    #[error("deck `{0}` has no playable cards")]
    EmptyPile(DeckId),
}

#[derive(Debug, Deserialize)]
struct DeckFile {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    play_instructions: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    cards: Vec<CardEntry>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CardEntry {
    Text(String),
    Detailed {
        value: String,
        #[serde(rename = "type", default)]
        kind: CardKind,
    },
}

impl CardEntry {
    fn into_card(self, id: u32) -> Card {
        match self {
            CardEntry::Text(value) => Card::text(id, value),
            CardEntry::Detailed { value, kind } => Card { id, value, kind },
        }
    }
}

/// In-memory catalog of decks keyed by id, in load order.
#[derive(Debug, Clone, Default)]
pub struct DeckCatalog {
    decks: IndexMap<DeckId, Deck>,
}

impl DeckCatalog {
    /// Build a catalog from already resolved decks.
    pub fn new(decks: impl IntoIterator<Item = Deck>) -> Self {
        Self {
            decks: decks
                .into_iter()
                .map(|deck| (deck.id.clone(), deck))
                .collect(),
        }
    }

    /// Load every `*.json` deck found in `dir`, sorted by file name.
    ///
    /// A missing directory yields an empty catalog.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %dir.display(), "deck directory not found; starting with no decks");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CatalogError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let decks = paths
            .iter()
            .map(|path| load_deck(path))
            .collect::<Result<Vec<_>, _>>()?;
        info!(path = %dir.display(), count = decks.len(), "loaded deck catalog");

        Ok(Self::new(decks))
    }

    /// All decks in load order.
    pub fn decks(&self) -> impl Iterator<Item = &Deck> {
        self.decks.values()
    }

    /// Look up a deck by id.
    pub fn get(&self, id: &str) -> Option<&Deck> {
        self.decks.get(id)
    }

    /// Cards of a deck that can start a session.
    pub fn playable_pile(&self, id: &str) -> Result<Vec<Card>, CatalogError> {
        let deck = self
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_owned()))?;
        if !deck.enabled {
            return Err(CatalogError::Disabled(deck.id.clone()));
        }
        if deck.cards.is_empty() {
            return Err(CatalogError::EmptyPile(deck.id.clone()));
        }

        Ok(deck.cards.clone())
    }

    /// Mark a deck as tentatively selected. Flipping one deck up flips every other one down.
    pub fn set_flipped(&mut self, id: &str, flipped: bool) -> Result<&Deck, CatalogError> {
        if !self.decks.contains_key(id) {
            return Err(CatalogError::NotFound(id.to_owned()));
        }

        for (deck_id, deck) in self.decks.iter_mut() {
            if deck_id == id {
                deck.flipped = flipped;
            } else if flipped {
                deck.flipped = false;
            }
        }

        self.decks
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_owned()))
    }

    /// The currently flipped deck, if any.
    pub fn flipped(&self) -> Option<&Deck> {
        self.decks.values().find(|deck| deck.flipped)
    }
}

fn load_deck(path: &Path) -> Result<Deck, CatalogError> {
    let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: DeckFile = serde_json::from_str(&contents).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cards = file
        .cards
        .into_iter()
        .zip(0u32..)
        .map(|(entry, index)| entry.into_card(index))
        .collect();

    Ok(Deck {
        id,
        name: file.name,
        description: file.description,
        play_instructions: file.play_instructions,
        cards,
        enabled: file.enabled,
        flipped: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("heads-up-decks-{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn write(&self, name: &str, contents: &str) {
            fs::write(self.0.join(name), contents).unwrap();
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn deck(id: &str, cards: usize) -> Deck {
        Deck {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            play_instructions: String::new(),
            cards: (0..cards as u32).map(|i| Card::text(i, format!("{id}-{i}"))).collect(),
            enabled: true,
            flipped: false,
        }
    }

    #[test]
    fn loads_json_decks_in_file_order() {
        let dir = TempDir::new();
        dir.write(
            "movies.json",
            r#"{"name":"Movies","cards":["Alien",{"value":"posters/jaws.png","type":"image"}]}"#,
        );
        dir.write(
            "animals.json",
            r#"{"name":"Animals","description":"Zoo","enabled":false,"cards":["Cat"]}"#,
        );
        dir.write("notes.txt", "ignored");

        let catalog = DeckCatalog::load_dir(&dir.0).unwrap();

        let ids: Vec<_> = catalog.decks().map(|deck| deck.id.as_str()).collect();
        assert_eq!(ids, vec!["animals", "movies"]);

        let movies = catalog.get("movies").unwrap();
        assert!(movies.enabled);
        assert_eq!(movies.cards[0], Card::text(0, "Alien"));
        assert_eq!(movies.cards[1].id, 1);
        assert_eq!(movies.cards[1].kind, CardKind::Image);

        let animals = catalog.get("animals").unwrap();
        assert_eq!(animals.description, "Zoo");
        assert!(!animals.enabled);
    }

    #[test]
    fn missing_directory_yields_empty_catalog() {
        let path = std::env::temp_dir().join(format!("heads-up-missing-{}", uuid::Uuid::new_v4()));
        let catalog = DeckCatalog::load_dir(&path).unwrap();
        assert_eq!(catalog.decks().count(), 0);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = TempDir::new();
        dir.write("broken.json", r#"{"cards":[]}"#);

        let err = DeckCatalog::load_dir(&dir.0).unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[test]
    fn playable_pile_enforces_preconditions() {
        let mut disabled = deck("disabled", 2);
        disabled.enabled = false;
        let catalog = DeckCatalog::new([deck("full", 3), deck("empty", 0), disabled]);

        assert_eq!(catalog.playable_pile("full").unwrap().len(), 3);
        assert!(matches!(
            catalog.playable_pile("empty"),
            Err(CatalogError::EmptyPile(id)) if id == "empty"
        ));
        assert!(matches!(
            catalog.playable_pile("disabled"),
            Err(CatalogError::Disabled(_))
        ));
        assert!(matches!(
            catalog.playable_pile("unknown"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn at_most_one_deck_is_flipped() {
        let mut catalog = DeckCatalog::new([deck("a", 1), deck("b", 1), deck("c", 1)]);

        catalog.set_flipped("a", true).unwrap();
        catalog.set_flipped("b", true).unwrap();
        assert_eq!(catalog.flipped().map(|deck| deck.id.as_str()), Some("b"));
        assert_eq!(catalog.decks().filter(|deck| deck.flipped).count(), 1);

        catalog.set_flipped("a", false).unwrap();
        assert_eq!(catalog.flipped().map(|deck| deck.id.as_str()), Some("b"));

        catalog.set_flipped("b", false).unwrap();
        assert!(catalog.flipped().is_none());

        assert!(matches!(
            catalog.set_flipped("zzz", true),
            Err(CatalogError::NotFound(_))
        ));
    }
}
