// Card art lookup: maps card names to a local image file or a remote URL.
//
// Local decks are scanned from a directory; each file name is turned into a
// card display name by matching a handful of known naming schemes. Files
// that match none of them fall back to a title-cased version of the stem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use super::deck::{Card, Rank, Suit, MAJOR_ARCANA};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Where the art for a card lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtSource {
    Local(PathBuf),
    Remote(String),
    Missing,
}

impl ArtSource {
    /// Short label for display in the card panel.
    pub fn label(&self) -> String {
        match self {
            ArtSource::Local(path) => path.display().to_string(),
            ArtSource::Remote(url) => url.clone(),
            ArtSource::Missing => "(no art)".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Filename parsing
// ---------------------------------------------------------------------------

fn major_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:major|maj|m|ar|trump)?[-_ ]?(\d{1,2})(?:[-_ .].*)?$")
            .expect("major arcana pattern is valid")
    })
}

fn suit_rank_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(wands|wand|batons|rods|cups|cup|chalices|swords|sword|pentacles|pentacle|coins|disks)[-_ ]?(\d{1,2}|[a-z]+)$",
        )
        .expect("suit/rank pattern is valid")
    })
}

fn rank_of_suit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(\d{1,2}|[a-z]+)[-_ ]+of[-_ ]+([a-z]+)$")
            .expect("rank-of-suit pattern is valid")
    })
}

/// Turn an image file name into the display name of the card it depicts.
///
/// Recognised shapes, tried in order:
/// - major arcana index: `00-the-fool.jpg`, `m05.png`, `major_21.webp`
/// - suit then rank: `cups02.jpg`, `wands_king.png`, `coins-10.jpg`
/// - rank of suit: `two-of-cups.jpg`, `king_of_pentacles.png`
///
/// Anything else becomes a title-cased version of the stem, snapped to the
/// canonical spelling when it names a major arcanum (`wheel-of-fortune`).
pub fn display_name_from_filename(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .trim();

    // "3 of swords" would otherwise read as major arcana index 3.
    if let Some(caps) = rank_of_suit_pattern().captures(stem) {
        if let (Some(rank), Some(suit)) = (Rank::from_token(&caps[1]), Suit::from_token(&caps[2])) {
            return Card::Minor { suit, rank }.name();
        }
    }

    if let Some(caps) = major_pattern().captures(stem) {
        if let Some(name) = caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|idx| MAJOR_ARCANA.get(idx))
        {
            return name.to_string();
        }
    }

    if let Some(caps) = suit_rank_pattern().captures(stem) {
        if let (Some(suit), Some(rank)) = (Suit::from_token(&caps[1]), Rank::from_token(&caps[2])) {
            return Card::Minor { suit, rank }.name();
        }
    }

    let fallback = title_case(stem);
    MAJOR_ARCANA
        .iter()
        .find(|name| name.eq_ignore_ascii_case(&fallback))
        .map(|name| name.to_string())
        .unwrap_or(fallback)
}

/// Replace separators with spaces and capitalise each word.
fn title_case(stem: &str) -> String {
    stem.split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// URL-friendly slug for a card name: "Queen of Cups" -> "queen-of-cups".
pub fn slug(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

// ---------------------------------------------------------------------------
// CardArtIndex
// ---------------------------------------------------------------------------

/// Lookup table from card display name to art source.
#[derive(Debug, Clone, Default)]
pub struct CardArtIndex {
    local: HashMap<String, PathBuf>,
    remote_base_url: Option<String>,
}

impl CardArtIndex {
    pub fn new(remote_base_url: Option<String>) -> Self {
        CardArtIndex {
            local: HashMap::new(),
            remote_base_url: remote_base_url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Build an index from the image files in `dir`. A missing or unreadable
    /// directory produces an index with no local entries.
    pub fn scan(dir: &Path, remote_base_url: Option<String>) -> Self {
        let mut index = CardArtIndex::new(remote_base_url);

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Card art directory {} unavailable: {}", dir.display(), e);
                return index;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !is_image(&path) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let name = display_name_from_filename(file_name);
            debug!("Indexed card art {} -> {}", name, path.display());
            index.insert(name, path);
        }

        index
    }

    pub fn insert(&mut self, name: String, path: PathBuf) {
        self.local.insert(name, path);
    }

    pub fn local_count(&self) -> usize {
        self.local.len()
    }

    /// Resolve the art source for a card: local file first, then remote.
    pub fn lookup(&self, card: &Card) -> ArtSource {
        let name = card.name();
        if let Some(path) = self.local.get(&name) {
            return ArtSource::Local(path.clone());
        }
        match &self.remote_base_url {
            Some(base) => ArtSource::Remote(format!(
                "{}/{}.jpg",
                base.trim_end_matches('/'),
                slug(&name)
            )),
            None => ArtSource::Missing,
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|i| i.eq_ignore_ascii_case(ext)))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn major_index_shapes() {
        assert_eq!(display_name_from_filename("00-the-fool.jpg"), "The Fool");
        assert_eq!(display_name_from_filename("m05.png"), "The Hierophant");
        assert_eq!(display_name_from_filename("major_21.webp"), "The World");
        assert_eq!(display_name_from_filename("AR13.jpg"), "Death");
        assert_eq!(display_name_from_filename("10.jpg"), "Wheel of Fortune");
    }

    #[test]
    fn major_index_out_of_range_falls_back() {
        assert_eq!(display_name_from_filename("m99.png"), "M99");
        assert_eq!(display_name_from_filename("22-extra.png"), "22 Extra");
    }

    #[test]
    fn suit_then_rank_shapes() {
        assert_eq!(display_name_from_filename("cups02.jpg"), "Two of Cups");
        assert_eq!(display_name_from_filename("wands_king.png"), "King of Wands");
        assert_eq!(display_name_from_filename("coins-10.jpg"), "Ten of Pentacles");
        assert_eq!(display_name_from_filename("Swords01.jpg"), "Ace of Swords");
        assert_eq!(display_name_from_filename("cupsking.jpg"), "King of Cups");
        assert_eq!(display_name_from_filename("pents14.jpg"), "Pents14");
    }

    #[test]
    fn rank_of_suit_shapes() {
        assert_eq!(display_name_from_filename("two-of-cups.jpg"), "Two of Cups");
        assert_eq!(
            display_name_from_filename("king_of_pentacles.png"),
            "King of Pentacles"
        );
        assert_eq!(display_name_from_filename("3 of swords.gif"), "Three of Swords");
    }

    #[test]
    fn fallback_title_cases() {
        assert_eq!(display_name_from_filename("card_back.png"), "Card Back");
        assert_eq!(display_name_from_filename("HELLO-world.jpg"), "Hello World");
        assert_eq!(display_name_from_filename("readme"), "Readme");
        assert_eq!(
            display_name_from_filename("wheel-of-fortune.jpg"),
            "Wheel of Fortune"
        );
        assert_eq!(display_name_from_filename("the_hanged_man.png"), "The Hanged Man");
    }

    #[test]
    fn slug_lowercases_and_hyphenates() {
        assert_eq!(slug("Queen of Cups"), "queen-of-cups");
        assert_eq!(slug("The Fool"), "the-fool");
    }

    #[test]
    fn lookup_prefers_local_then_remote_then_missing() {
        let fool = Card::Major(0);
        let queen = Card::Minor {
            suit: Suit::Cups,
            rank: Rank::Queen,
        };

        let mut index = CardArtIndex::new(Some("https://cdn.example.com/deck/".into()));
        index.insert("The Fool".into(), PathBuf::from("/art/00.jpg"));

        assert_eq!(index.lookup(&fool), ArtSource::Local(PathBuf::from("/art/00.jpg")));
        assert_eq!(
            index.lookup(&queen),
            ArtSource::Remote("https://cdn.example.com/deck/queen-of-cups.jpg".into())
        );

        let bare = CardArtIndex::new(Some("   ".into()));
        assert_eq!(bare.lookup(&queen), ArtSource::Missing);
    }

    #[test]
    fn scan_indexes_only_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("00-the-fool.jpg"), b"img").unwrap();
        fs::write(dir.path().join("cups03.PNG"), b"img").unwrap();
        fs::write(dir.path().join("notes.txt"), b"text").unwrap();
        fs::create_dir(dir.path().join("m01.jpg")).unwrap();

        let index = CardArtIndex::scan(dir.path(), None);
        assert_eq!(index.local_count(), 2);
        assert!(matches!(index.lookup(&Card::Major(0)), ArtSource::Local(_)));
        assert!(matches!(
            index.lookup(&Card::Minor {
                suit: Suit::Cups,
                rank: Rank::Three
            }),
            ArtSource::Local(_)
        ));
        assert_eq!(index.lookup(&Card::Major(1)), ArtSource::Missing);
    }

    #[test]
    fn scan_missing_directory_is_empty() {
        let index = CardArtIndex::scan(Path::new("/definitely/not/here"), None);
        assert_eq!(index.local_count(), 0);
    }
}
