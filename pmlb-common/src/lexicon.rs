//! Keyword lexicon
//!
//! Static, process-wide table of weighted terms used by the scoring engine.
//! Terms are lowercase and matched as raw substrings; declaration order is the
//! order in which matches are reported.

/// One weighted lexicon term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexiconEntry {
    /// Lowercase term
    pub term: &'static str,
    /// Contribution to the raw score when the term is found
    pub weight: u32,
}

const fn entry(term: &'static str, weight: u32) -> LexiconEntry {
    LexiconEntry { term, weight }
}

/// Read-only view over the keyword table
#[derive(Debug, Clone, Copy)]
pub struct KeywordLexicon {
    entries: &'static [LexiconEntry],
}

impl KeywordLexicon {
    /// The built-in lexicon
    pub const fn standard() -> Self {
        Self { entries: KEYWORDS }
    }

    pub fn entries(&self) -> &'static [LexiconEntry] {
        self.entries
    }

    /// Weight of a term, if it belongs to the lexicon
    pub fn weight_of(&self, term: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.term == term)
            .map(|e| e.weight)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.weight_of(term).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for KeywordLexicon {
    fn default() -> Self {
        Self::standard()
    }
}

static KEYWORDS: &[LexiconEntry] = &[
    // Fashion & style
    entry("tote bag", 4),
    entry("tote-bag", 4),
    entry("tote", 1),
    entry("canvas tote", 3),
    entry("graphic tee", 2),
    entry("ironic t-shirt", 2),
    entry("oversized shirt", 2),
    entry("oversized flannel", 3),
    entry("denim jacket", 2),
    entry("baggy pants", 2),
    entry("cargo pants", 3),
    entry("workwear pants", 2),
    entry("cuffed jeans", 2),
    entry("long shorts", 2),
    entry("mesh shorts", 2),
    entry("beanie", 2),
    entry("baseball cap", 2),
    entry("mustache", 3),
    entry("moustache", 3),
    entry("painted nails", 3),
    entry("thrift", 2),
    entry("eyeliner", 2),
    entry("eye shadow", 2),
    entry("lipstick", 2),
    entry("curly hair", 2),
    entry("tattoo", 2),
    entry("balaclava", 3),
    entry("cigarette", 2),
    // Footwear
    entry("birkenstock", 3),
    entry("crocs", 2),
    entry("loafers", 3),
    entry("retro sneakers", 2),
    entry("new balance", 3),
    // Brands
    entry("nike", 2),
    entry("lululemon", 2),
    entry("arc'teryx", 3),
    entry("trader joe's", 2),
    entry("erewhon", 3),
    // Accessories
    entry("carabiner", 2),
    entry("silver ring", 2),
    entry("chain necklace", 2),
    entry("fanny pack", 2),
    entry("apple watch", 2),
    entry("plushie", 2),
    entry("labubu", 5),
    entry("ring", 1),
    entry("bracelet", 1),
    entry("lanyard", 1),
    // Tech & gadgets
    entry("wired headphones", 3),
    entry("wired earbuds", 3),
    entry("mp3 player", 2),
    entry("cable", 2),
    entry("usb-c cable", 2),
    entry("earbuds", 2),
    entry("earphones", 2),
    entry("earpiece", 2),
    entry("airpod", 3),
    entry("flip phone", 2),
    entry("film camera", 3),
    entry("disposable camera", 3),
    entry("polaroid", 2),
    entry("lav mic", 3),
    // Food & drink
    entry("iced coffee", 3),
    entry("cold brew", 3),
    entry("iced matcha", 4),
    entry("matcha latte", 4),
    entry("matcha", 1),
    entry("stanley cup", 3),
    entry("stanley tumbler", 3),
    entry("erewhon smoothie", 4),
    entry("kombucha", 2),
    entry("single-origin coffee", 3),
    entry("avocado toast", 2),
    entry("sourdough", 3),
    entry("baguette", 2),
    // Hobbies & props
    entry("vinyl", 3),
    entry("picnic blanket", 2),
    entry("selfie", 3),
    entry("mirror selfie", 3),
    entry("vape", 2),
    entry("tampon", 4),
    entry("teacup pig", 7),
    // Books, authors, music
    entry("bell hooks", 3),
    entry("joan didion", 3),
    entry("patti smith", 3),
    entry("sylvia plath", 3),
    entry("phoebe bridgers", 2),
    entry("clairo", 2),
    entry("mitski", 2),
    entry("laufey", 2),
    entry("lana del rey", 2),
    entry("booktok", 2),
    entry("book", 3),
    entry("feminist literature", 3),
];
