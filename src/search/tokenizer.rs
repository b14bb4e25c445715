//! Lowercasing word tokenizer with English stopword removal and Snowball
//! stemming.
use std::sync::OnceLock;

use rust_stemmers::{Algorithm, Stemmer};

/// English stopwords dropped from both documents and queries.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Split `text` on anything that is not alphanumeric, lowercase the pieces,
/// drop stopwords and reduce what is left to English stems.
///
/// `get_forecast` and `list-events` yield two terms each; `meetings` and
/// `meeting` share a term.
pub fn tokenize(text: &str) -> Vec<String> {
    let stemmer = english_stemmer();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|piece| !piece.is_empty())
        .map(str::to_lowercase)
        .filter(|term| !is_stopword(term))
        .map(|term| stemmer.stem(&term).into_owned())
        .collect()
}

fn english_stemmer() -> &'static Stemmer {
    static STEMMER: OnceLock<Stemmer> = OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

fn is_stopword(term: &str) -> bool {
    STOPWORDS.binary_search(&term).is_ok()
}
