//! Book and version alias tables.
//!
//! A [`Catalog`] holds one [`BookTable`] per book type (`"bible"` ships by
//! default) and one [`VersionTable`] shared by all types. Lookups are
//! case-insensitive and tolerant of punctuation and ordinal spellings:
//! `"1 Cor."`, `"1Cor"`, `"I Corinthians"` and `"First Corinthians"` all
//! resolve to `"1 Corinthians"`.
//!
//! Applications extend the defaults from configuration with
//! [`Catalog::add_book`] and [`Catalog::add_version`].

use std::collections::HashMap;
use std::sync::OnceLock;

/// Alias table for one book type.
#[derive(Debug, Clone, Default)]
pub struct BookTable {
    canonical: Vec<String>,
    aliases: HashMap<String, usize>,
    /// Registered spellings per canonical entry, canonical name first.
    spellings: Vec<Vec<String>>,
}

impl BookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canonical name and its aliases. The canonical name is
    /// itself an alias. Re-registering a canonical name merges aliases.
    pub fn insert(&mut self, canonical: &str, aliases: &[&str]) {
        let idx = match self.canonical.iter().position(|c| c == canonical) {
            Some(idx) => idx,
            None => {
                self.canonical.push(canonical.to_string());
                self.spellings.push(vec![canonical.to_string()]);
                self.canonical.len() - 1
            }
        };
        self.aliases.insert(alias_key(canonical), idx);
        for alias in aliases {
            let key = alias_key(alias);
            if key.is_empty() {
                continue;
            }
            self.aliases.insert(key, idx);
            let spelling = alias.trim().to_string();
            if !self.spellings[idx].contains(&spelling) {
                self.spellings[idx].push(spelling);
            }
        }
    }

    /// Every registered spelling of `canonical`, canonical name first.
    /// Empty when the name is not in the table.
    pub fn spellings(&self, canonical: &str) -> &[String] {
        self.canonical
            .iter()
            .position(|c| c == canonical)
            .map(|idx| self.spellings[idx].as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a name or abbreviation to its canonical form.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.aliases
            .get(&alias_key(name))
            .map(|&idx| self.canonical[idx].as_str())
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.canonical.iter().map(String::as_str)
    }

    /// The Protestant 66-book canon with common abbreviations.
    pub fn bible() -> Self {
        let mut table = Self::new();
        for (canonical, aliases) in BIBLE_BOOKS {
            table.insert(canonical, aliases);
        }
        table
    }
}

/// Edition alias table. Unknown editions are preserved verbatim.
#[derive(Debug, Clone, Default)]
pub struct VersionTable {
    aliases: HashMap<String, String>,
}

impl VersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, canonical: &str, aliases: &[&str]) {
        self.aliases
            .insert(version_key(canonical), canonical.to_string());
        for alias in aliases {
            self.aliases.insert(version_key(alias), canonical.to_string());
        }
    }

    pub fn resolve(&self, token: &str) -> Option<&str> {
        self.aliases.get(&version_key(token)).map(String::as_str)
    }

    /// Canonical edition name, or the trimmed token itself when unknown.
    pub fn normalize(&self, token: &str) -> String {
        match self.resolve(token) {
            Some(canonical) => canonical.to_string(),
            None => token.trim().to_string(),
        }
    }

    /// Case-insensitive equality after normalisation.
    pub fn same(&self, a: &str, b: &str) -> bool {
        self.normalize(a).to_lowercase() == self.normalize(b).to_lowercase()
    }

    pub fn defaults() -> Self {
        let mut table = Self::new();
        for (canonical, aliases) in DEFAULT_VERSIONS {
            table.insert(canonical, aliases);
        }
        table
    }
}

/// Book tables keyed by book type, plus the shared version table.
#[derive(Debug, Clone)]
pub struct Catalog {
    books: HashMap<String, BookTable>,
    versions: VersionTable,
}

impl Catalog {
    /// A catalog with no book types and no known versions.
    pub fn empty() -> Self {
        Self {
            books: HashMap::new(),
            versions: VersionTable::new(),
        }
    }

    /// The `"bible"` book type and the common English editions.
    pub fn with_defaults() -> Self {
        let mut books = HashMap::new();
        books.insert("bible".to_string(), BookTable::bible());
        Self {
            books,
            versions: VersionTable::defaults(),
        }
    }

    pub fn books(&self, book_type: &str) -> Option<&BookTable> {
        self.books.get(&book_type.trim().to_lowercase())
    }

    pub fn book_types(&self) -> impl Iterator<Item = &str> {
        self.books.keys().map(String::as_str)
    }

    pub fn versions(&self) -> &VersionTable {
        &self.versions
    }

    /// Add a canonical book (and aliases) to a book type, creating the type
    /// when it does not exist yet.
    pub fn add_book(&mut self, book_type: &str, canonical: &str, aliases: &[&str]) {
        self.books
            .entry(book_type.trim().to_lowercase())
            .or_default()
            .insert(canonical, aliases);
    }

    pub fn add_version(&mut self, canonical: &str, aliases: &[&str]) {
        self.versions.insert(canonical, aliases);
    }

    /// Canonical book name for `name`, or the trimmed input when the type
    /// has no table or the name is unknown.
    pub fn canonical_book(&self, book_type: &str, name: &str) -> String {
        self.books(book_type)
            .and_then(|t| t.resolve(name))
            .map(str::to_string)
            .unwrap_or_else(|| name.trim().to_string())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Process-wide default catalog used by the free-function entry points.
pub fn default_catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(Catalog::with_defaults)
}

/// Normalise a book name for alias lookup.
///
/// Lowercases, drops periods, collapses whitespace, splits a leading
/// ordinal digit from the name (`1john` → `1 john`), and maps roman and
/// word ordinals to digits.
pub fn alias_key(name: &str) -> String {
    let lowered = name.to_lowercase().replace('.', " ");
    let mut words: Vec<String> = lowered.split_whitespace().map(str::to_string).collect();
    if words.is_empty() {
        return String::new();
    }

    let first = words[0].clone();
    let split_at = first
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i);
    if let Some(i) = split_at {
        let suffix = &first[i..];
        let is_ordinal_suffix = matches!(suffix, "st" | "nd" | "rd" | "th");
        if i > 0 && !is_ordinal_suffix && suffix.starts_with(|c: char| c.is_alphabetic()) {
            let (digits, rest) = first.split_at(i);
            words.splice(0..1, [digits.to_string(), rest.to_string()]);
        }
    }

    if words.len() > 1 {
        let ordinal = match words[0].as_str() {
            "i" | "1st" | "first" => Some("1"),
            "ii" | "2nd" | "second" => Some("2"),
            "iii" | "3rd" | "third" => Some("3"),
            _ => None,
        };
        if let Some(o) = ordinal {
            words[0] = o.to_string();
        }
    }

    words.join(" ")
}

fn version_key(token: &str) -> String {
    token
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

const BIBLE_BOOKS: &[(&str, &[&str])] = &[
    ("Genesis", &["gen", "ge", "gn"]),
    ("Exodus", &["exod", "exo", "ex"]),
    ("Leviticus", &["lev", "le", "lv"]),
    ("Numbers", &["num", "nu", "nm", "nb"]),
    ("Deuteronomy", &["deut", "de", "dt"]),
    ("Joshua", &["josh", "jos", "jsh"]),
    ("Judges", &["judg", "jdg", "jg", "jdgs"]),
    ("Ruth", &["rth", "ru"]),
    ("1 Samuel", &["1 sam", "1 sa", "1 sm"]),
    ("2 Samuel", &["2 sam", "2 sa", "2 sm"]),
    ("1 Kings", &["1 kgs", "1 ki", "1 kin"]),
    ("2 Kings", &["2 kgs", "2 ki", "2 kin"]),
    ("1 Chronicles", &["1 chr", "1 chron", "1 ch"]),
    ("2 Chronicles", &["2 chr", "2 chron", "2 ch"]),
    ("Ezra", &["ezr"]),
    ("Nehemiah", &["neh", "ne"]),
    ("Esther", &["esth", "est", "es"]),
    ("Job", &["jb"]),
    ("Psalms", &["ps", "psa", "psalm", "pss", "psm"]),
    ("Proverbs", &["prov", "pro", "prv", "pr"]),
    ("Ecclesiastes", &["eccl", "eccles", "ecc", "qoh"]),
    ("Song of Solomon", &["song", "sos", "song of songs", "canticles", "sg"]),
    ("Isaiah", &["isa", "is"]),
    ("Jeremiah", &["jer", "je", "jr"]),
    ("Lamentations", &["lam", "la"]),
    ("Ezekiel", &["ezek", "eze", "ezk"]),
    ("Daniel", &["dan", "da", "dn"]),
    ("Hosea", &["hos", "ho"]),
    ("Joel", &["jl"]),
    ("Amos", &["am"]),
    ("Obadiah", &["obad", "ob"]),
    ("Jonah", &["jon", "jnh"]),
    ("Micah", &["mic", "mc"]),
    ("Nahum", &["nah", "na"]),
    ("Habakkuk", &["hab", "hb"]),
    ("Zephaniah", &["zeph", "zep", "zp"]),
    ("Haggai", &["hag", "hg"]),
    ("Zechariah", &["zech", "zec", "zc"]),
    ("Malachi", &["mal", "ml"]),
    ("Matthew", &["matt", "mat", "mt"]),
    ("Mark", &["mrk", "mar", "mk", "mr"]),
    ("Luke", &["luk", "lk"]),
    ("John", &["jhn", "jn", "joh"]),
    ("Acts", &["act", "ac"]),
    ("Romans", &["rom", "ro", "rm"]),
    ("1 Corinthians", &["1 cor", "1 co"]),
    ("2 Corinthians", &["2 cor", "2 co"]),
    ("Galatians", &["gal", "ga"]),
    ("Ephesians", &["eph", "ephes"]),
    ("Philippians", &["phil", "php", "pp"]),
    ("Colossians", &["col"]),
    ("1 Thessalonians", &["1 thess", "1 thes", "1 th"]),
    ("2 Thessalonians", &["2 thess", "2 thes", "2 th"]),
    ("1 Timothy", &["1 tim", "1 ti"]),
    ("2 Timothy", &["2 tim", "2 ti"]),
    ("Titus", &["tit", "ti"]),
    ("Philemon", &["philem", "phm", "pm"]),
    ("Hebrews", &["heb"]),
    ("James", &["jas", "jm"]),
    ("1 Peter", &["1 pet", "1 pe", "1 pt"]),
    ("2 Peter", &["2 pet", "2 pe", "2 pt"]),
    ("1 John", &["1 jn", "1 jhn", "1 jo"]),
    ("2 John", &["2 jn", "2 jhn", "2 jo"]),
    ("3 John", &["3 jn", "3 jhn", "3 jo"]),
    ("Jude", &["jud", "jd"]),
    ("Revelation", &["rev", "re", "revelations", "apocalypse"]),
];

const DEFAULT_VERSIONS: &[(&str, &[&str])] = &[
    ("KJV", &["king james", "king james version", "authorized version", "av"]),
    ("NKJV", &["new king james", "new king james version"]),
    ("ESV", &["english standard version"]),
    ("NIV", &["new international version"]),
    ("NASB", &["new american standard", "new american standard bible"]),
    ("NLT", &["new living translation"]),
    ("RSV", &["revised standard version"]),
    ("NRSV", &["new revised standard version"]),
    ("ASV", &["american standard version"]),
    ("WEB", &["world english bible"]),
    ("YLT", &["young's literal translation", "youngs literal"]),
    ("DRA", &["douay-rheims", "douay rheims", "drb"]),
    ("CSB", &["christian standard bible", "hcsb"]),
    ("LSB", &["legacy standard bible"]),
];
