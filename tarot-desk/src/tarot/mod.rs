// Tarot deck, card draws, and card art lookup.

pub mod art;
pub mod deck;
