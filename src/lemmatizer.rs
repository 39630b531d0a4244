//! Tokenizer and lemmatizer / 分词与词形还原
//!
//! Supports / 支持：
//! - Russian (Cyrillic) words via the Snowball Russian stemmer / 俄语
//! - English (Latin) words via the Snowball English stemmer / 英语
//! - Function words, numbers and mixed-script tokens yield no lemma / 虚词、数字、混合脚本不产生词元

use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{BTreeMap, HashSet};

/// Narrow lemmatizer contract: lowercase token → normal forms.
/// Must never panic; unrecognized input yields an empty list.
pub trait Lemmatizer: Send + Sync {
    fn normal_forms(&self, token: &str) -> Vec<String>;
}

static ENGLISH_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "if", "in", "into",
        "is", "it", "its", "of", "on", "or", "so", "such", "that", "the", "their", "then",
        "there", "these", "they", "this", "to", "was", "were", "will", "with",
    ]
    .into_iter()
    .collect()
});

// Prepositions, conjunctions, particles and interjections / 介词、连词、语气词、感叹词
static RUSSIAN_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "и", "в", "во", "не", "что", "он", "на", "я", "с", "со", "как", "а", "то", "все", "она",
        "так", "его", "но", "да", "ты", "к", "у", "же", "вы", "за", "бы", "по", "только", "ее",
        "мне", "было", "вот", "от", "меня", "еще", "нет", "о", "из", "ему", "ли", "если", "или",
        "ни", "быть", "был", "до", "вас", "нибудь", "уж", "вам", "ведь", "там", "потом", "себя",
        "ничего", "ей", "может", "они", "тут", "где", "есть", "надо", "ней", "для", "мы", "тебя",
        "их", "чем", "была", "сам", "чтоб", "без", "будто", "чего", "раз", "тоже", "себе", "под",
        "ж", "тогда", "кто", "этот", "того", "потому", "этого", "какой", "ним", "здесь", "этом",
        "один", "почти", "мой", "тем", "чтобы", "нее", "были", "куда", "зачем", "всех", "можно",
        "при", "об", "ах", "ох", "ой", "эх", "ну", "ага", "при", "над", "через", "между",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq)]
enum Script {
    Cyrillic,
    Latin,
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}

fn detect_script(word: &str) -> Option<Script> {
    if word.chars().all(is_cyrillic) {
        Some(Script::Cyrillic)
    } else if word.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(Script::Latin)
    } else {
        None
    }
}

/// Snowball-based lemmatizer for Russian and English / 基于 Snowball 的词形还原
pub struct SnowballLemmatizer {
    russian: Stemmer,
    english: Stemmer,
}

impl SnowballLemmatizer {
    pub fn new() -> Self {
        Self {
            russian: Stemmer::create(Algorithm::Russian),
            english: Stemmer::create(Algorithm::English),
        }
    }
}

impl Default for SnowballLemmatizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lemmatizer for SnowballLemmatizer {
    fn normal_forms(&self, token: &str) -> Vec<String> {
        let word = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase()
            .replace('ё', "е");
        if word.chars().count() < 2 {
            return Vec::new();
        }

        let stemmed = match detect_script(&word) {
            Some(Script::Cyrillic) if !RUSSIAN_STOP_WORDS.contains(word.as_str()) => {
                self.russian.stem(&word).into_owned()
            }
            Some(Script::Latin) if !ENGLISH_STOP_WORDS.contains(word.as_str()) => {
                self.english.stem(&word).into_owned()
            }
            _ => return Vec::new(),
        };

        if stemmed.is_empty() {
            Vec::new()
        } else {
            vec![stemmed]
        }
    }
}

/// Tokenize text: split on whitespace and punctuation, lowercase / 分词
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_lowercase())
        .collect()
}

/// Occurrences of every lemma in a text, sorted by lemma / 统计词元出现次数
pub fn count_lemmas(text: &str, lemmatizer: &dyn Lemmatizer) -> Vec<(String, i64)> {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for token in tokenize(text) {
        for form in lemmatizer.normal_forms(&token) {
            *counts.entry(form).or_default() += 1;
        }
    }
    counts.into_iter().collect()
}

/// Distinct query lemmas in first-seen order / 查询词元（去重，保持顺序）
pub fn query_lemmas(query: &str, lemmatizer: &dyn Lemmatizer) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut lemmas = Vec::new();
    for token in tokenize(query) {
        for form in lemmatizer.normal_forms(&token) {
            if seen.insert(form.clone()) {
                lemmas.push(form);
            }
        }
    }
    lemmas
}
