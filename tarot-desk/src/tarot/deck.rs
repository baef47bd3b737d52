// Fixed tarot deck and card draws.
//
// The deck is an ordered list of 22 major arcana followed (for the full deck)
// by 56 minor arcana, suit by suit. A draw samples uniformly without
// replacement, so the cards in a single draw are always pairwise distinct.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Canonical major arcana names, indexed 0 (The Fool) through 21 (The World).
pub const MAJOR_ARCANA: [&str; 22] = [
    "The Fool",
    "The Magician",
    "The High Priestess",
    "The Empress",
    "The Emperor",
    "The Hierophant",
    "The Lovers",
    "The Chariot",
    "Strength",
    "The Hermit",
    "Wheel of Fortune",
    "Justice",
    "The Hanged Man",
    "Death",
    "Temperance",
    "The Devil",
    "The Tower",
    "The Star",
    "The Moon",
    "The Sun",
    "Judgement",
    "The World",
];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum DeckError {
    #[error("cannot draw {requested} cards from a deck of {available}")]
    NotEnoughCards { requested: usize, available: usize },

    #[error("a draw must contain at least one card")]
    EmptyDraw,
}

// ---------------------------------------------------------------------------
// Card types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Wands,
    Cups,
    Swords,
    Pentacles,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Wands, Suit::Cups, Suit::Swords, Suit::Pentacles];

    pub fn name(self) -> &'static str {
        match self {
            Suit::Wands => "Wands",
            Suit::Cups => "Cups",
            Suit::Swords => "Swords",
            Suit::Pentacles => "Pentacles",
        }
    }

    /// Parse a suit token. Accepts the common aliases used by scanned decks
    /// (`coins`, `disks` for Pentacles; `batons`, `rods` for Wands).
    pub fn from_token(token: &str) -> Option<Suit> {
        match token.to_ascii_lowercase().as_str() {
            "wands" | "wand" | "batons" | "rods" => Some(Suit::Wands),
            "cups" | "cup" | "chalices" => Some(Suit::Cups),
            "swords" | "sword" => Some(Suit::Swords),
            "pentacles" | "pentacle" | "coins" | "disks" => Some(Suit::Pentacles),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Page,
    Knight,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; 14] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Page,
        Rank::Knight,
        Rank::Queen,
        Rank::King,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Rank::Ace => "Ace",
            Rank::Two => "Two",
            Rank::Three => "Three",
            Rank::Four => "Four",
            Rank::Five => "Five",
            Rank::Six => "Six",
            Rank::Seven => "Seven",
            Rank::Eight => "Eight",
            Rank::Nine => "Nine",
            Rank::Ten => "Ten",
            Rank::Page => "Page",
            Rank::Knight => "Knight",
            Rank::Queen => "Queen",
            Rank::King => "King",
        }
    }

    /// Parse a rank token: a number 1-14 (11-14 being the court cards), a
    /// spelled-out number, or a court name.
    pub fn from_token(token: &str) -> Option<Rank> {
        let lower = token.to_ascii_lowercase();
        if let Ok(n) = lower.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| Rank::ALL.get(i).copied());
        }
        Rank::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(&lower))
            .or(match lower.as_str() {
                "one" => Some(Rank::Ace),
                "princess" => Some(Rank::Page),
                "prince" => Some(Rank::Knight),
                _ => None,
            })
    }
}

/// A single tarot card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Card {
    /// Major arcana by canonical index (0..=21).
    Major(u8),
    Minor { suit: Suit, rank: Rank },
}

impl Card {
    /// Human-readable card name, e.g. "The Fool" or "Queen of Cups".
    pub fn name(&self) -> String {
        match self {
            Card::Major(idx) => MAJOR_ARCANA
                .get(*idx as usize)
                .copied()
                .unwrap_or("Unknown Arcanum")
                .to_string(),
            Card::Minor { suit, rank } => format!("{} of {}", rank.name(), suit.name()),
        }
    }

    pub fn is_major(&self) -> bool {
        matches!(self, Card::Major(_))
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Which cards make up the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeckKind {
    /// All 78 cards.
    #[default]
    Full,
    /// Only the 22 major arcana.
    Major,
}

impl DeckKind {
    pub fn size(self) -> usize {
        match self {
            DeckKind::Full => 78,
            DeckKind::Major => 22,
        }
    }
}

// ---------------------------------------------------------------------------
// Deck construction and draws
// ---------------------------------------------------------------------------

/// Build the deck in canonical order.
pub fn build_deck(kind: DeckKind) -> Vec<Card> {
    let mut deck: Vec<Card> = (0..MAJOR_ARCANA.len() as u8).map(Card::Major).collect();
    if kind == DeckKind::Full {
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                deck.push(Card::Minor { suit, rank });
            }
        }
    }
    deck
}

/// Draw `count` distinct cards from `deck`, uniformly without replacement.
pub fn draw<R: Rng + ?Sized>(
    deck: &[Card],
    count: usize,
    rng: &mut R,
) -> Result<Vec<Card>, DeckError> {
    if count == 0 {
        return Err(DeckError::EmptyDraw);
    }
    if count > deck.len() {
        return Err(DeckError::NotEnoughCards {
            requested: count,
            available: deck.len(),
        });
    }
    let picked = rand::seq::index::sample(rng, deck.len(), count);
    Ok(picked.into_iter().map(|i| deck[i]).collect())
}

/// Render a list of cards as the stringified list stored in history rows.
pub fn cards_to_list_string(cards: &[Card]) -> String {
    let names: Vec<String> = cards.iter().map(Card::name).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| names.join(", "))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
