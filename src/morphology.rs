//! Morphological analyzer - maps surface words to normal forms and grammatical tags
//! 词形分析器 - 词形到原形及语法标记的映射
//!
//! The core only depends on the [`Morphology`] trait. [`RussianMorphology`] is the
//! built-in implementation, backed by an OpenCorpora text dictionary
//! (`dict.opcorpora.txt`): every word form maps to the lemmas it belongs to,
//! so one form may have several normal forms ("стали" → сталь, стать).
//!
//! Words missing from the dictionary fall back to a closed-class word list
//! and then to the Snowball Russian stemmer.

use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Tag of prepositions
pub const TAG_PREPOSITION: &str = "ПРЕДЛ";
/// Tag of conjunctions
pub const TAG_CONJUNCTION: &str = "СОЮЗ";
/// Tag of interjections
pub const TAG_INTERJECTION: &str = "МЕЖД";
/// Tag of particles
pub const TAG_PARTICLE: &str = "ЧАСТ";

/// Tags marking a word as a function word that is never indexed
pub const FUNCTION_WORD_TAGS: [&str; 3] = [TAG_PREPOSITION, TAG_CONJUNCTION, TAG_INTERJECTION];

#[derive(Debug, Error)]
pub enum MorphologyError {
    #[error("word is empty")]
    EmptyWord,
    #[error("word '{0}' contains characters outside the Cyrillic alphabet")]
    UnsupportedAlphabet(String),
}

/// Dictionary-backed morphological analyzer
pub trait Morphology: Send + Sync {
    /// Normal (dictionary) forms of a lowercase word
    fn normal_forms(&self, word: &str) -> Result<Vec<String>, MorphologyError>;

    /// Grammatical-class tags of a normal form
    fn grammatical_tags(&self, normal_form: &str) -> Result<Vec<String>, MorphologyError>;
}

/// True if any tag marks a preposition, conjunction or interjection
pub fn is_function_word(tags: &[String]) -> bool {
    tags.iter().any(|tag| {
        let upper = tag.to_uppercase();
        FUNCTION_WORD_TAGS.iter().any(|t| upper.contains(t))
    })
}

/// Cyrillic letter check (а-я, А-Я, ё, Ё)
pub fn is_cyrillic_letter(c: char) -> bool {
    matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
}

static STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::Russian));

static CLOSED_CLASSES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    const PREPOSITIONS: &[&str] = &[
        "в", "во", "на", "с", "со", "к", "ко", "о", "об", "обо", "от", "ото", "до", "из", "изо",
        "у", "по", "за", "над", "надо", "под", "подо", "при", "про", "для", "без", "безо",
        "через", "перед", "передо", "между", "среди", "около", "вокруг", "после", "кроме",
        "вместо", "вдоль", "против", "сквозь", "ради", "мимо", "возле", "внутри", "вне",
        "насчет", "насчёт", "благодаря", "согласно", "вследствие",
    ];
    const CONJUNCTIONS: &[&str] = &[
        "и", "а", "но", "или", "либо", "да", "что", "чтобы", "чтоб", "если", "когда", "хотя",
        "хоть", "потому", "поэтому", "зато", "однако", "также", "тоже", "как", "будто",
        "словно", "ибо", "пока", "едва", "раз", "причем", "причём", "затем", "то", "ни",
    ];
    const INTERJECTIONS: &[&str] = &[
        "ах", "ох", "эх", "ой", "ай", "ух", "увы", "ура", "алло", "эй", "ого", "ага", "фу",
        "тьфу", "браво", "ишь", "батюшки", "караул",
    ];
    const PARTICLES: &[&str] = &[
        "не", "бы", "ли", "же", "ведь", "вот", "вон", "даже", "лишь", "только", "уже", "ещё",
        "еще", "разве", "неужели", "пусть", "пускай", "именно",
    ];

    let mut map = HashMap::new();
    for word in PARTICLES {
        map.insert(*word, TAG_PARTICLE);
    }
    for word in INTERJECTIONS {
        map.insert(*word, TAG_INTERJECTION);
    }
    for word in CONJUNCTIONS {
        map.insert(*word, TAG_CONJUNCTION);
    }
    for word in PREPOSITIONS {
        map.insert(*word, TAG_PREPOSITION);
    }
    map
});

/// OpenCorpora part-of-speech → analyzer tag
fn part_of_speech_tag(pos: &str) -> String {
    match pos {
        "PREP" => TAG_PREPOSITION.to_string(),
        "CONJ" => TAG_CONJUNCTION.to_string(),
        "INTJ" => TAG_INTERJECTION.to_string(),
        "PRCL" => TAG_PARTICLE.to_string(),
        other => other.to_string(),
    }
}

/// Russian analyzer over an OpenCorpora dictionary
#[derive(Debug, Default)]
pub struct RussianMorphology {
    /// word form → lemma ids
    forms: HashMap<String, Vec<u32>>,
    /// lemma id → normal form
    lemmas: Vec<String>,
    /// lemma id → part-of-speech tag
    tags: Vec<String>,
    /// normal form → lemma ids
    by_normal_form: HashMap<String, Vec<u32>>,
}

impl RussianMorphology {
    /// Analyzer without a dictionary: closed-class words and stems only
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `dict.opcorpora.txt`
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse the OpenCorpora plain-text format: a numeric lemma id line,
    /// then `FORM<TAB>POS,grammemes ...` lines (the first one is the lemma),
    /// then a blank line.
    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let mut morph = Self::new();
        let mut current: Option<u32> = None;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.chars().all(|c| c.is_ascii_digit()) {
                current = None;
                continue;
            }
            let Some((form, grammemes)) = line.split_once('\t') else {
                continue;
            };
            let form = form.trim().to_lowercase();

            let id = match current {
                Some(id) => id,
                None => {
                    let id = morph.lemmas.len() as u32;
                    let pos = grammemes
                        .split(|c: char| c == ',' || c.is_whitespace())
                        .next()
                        .unwrap_or_default();
                    morph.lemmas.push(form.clone());
                    morph.tags.push(part_of_speech_tag(pos));
                    morph.by_normal_form.entry(form.clone()).or_default().push(id);
                    current = Some(id);
                    id
                }
            };

            morph.add_form(&form, id);
            if form.contains('ё') {
                morph.add_form(&form.replace('ё', "е"), id);
            }
        }

        tracing::info!(
            "Morphology dictionary loaded: {} lemmas, {} word forms",
            morph.lemmas.len(),
            morph.forms.len()
        );
        Ok(morph)
    }

    fn add_form(&mut self, form: &str, id: u32) {
        let ids = self.forms.entry(form.to_string()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn lemma_count(&self) -> usize {
        self.lemmas.len()
    }

    fn check_word(word: &str) -> Result<(), MorphologyError> {
        if word.is_empty() {
            return Err(MorphologyError::EmptyWord);
        }
        if !word.chars().all(is_cyrillic_letter) {
            return Err(MorphologyError::UnsupportedAlphabet(word.to_string()));
        }
        Ok(())
    }

    fn dictionary_forms(&self, word: &str) -> Vec<String> {
        let ids = self
            .forms
            .get(word)
            .or_else(|| self.forms.get(&word.replace('ё', "е")));
        let mut normal = Vec::new();
        for &id in ids.into_iter().flatten() {
            if let Some(lemma) = self.lemmas.get(id as usize) {
                if !normal.contains(lemma) {
                    normal.push(lemma.clone());
                }
            }
        }
        normal
    }
}

impl Morphology for RussianMorphology {
    fn normal_forms(&self, word: &str) -> Result<Vec<String>, MorphologyError> {
        Self::check_word(word)?;
        let word = word.to_lowercase();

        let known = self.dictionary_forms(&word);
        if !known.is_empty() {
            return Ok(known);
        }
        if CLOSED_CLASSES.contains_key(word.as_str()) {
            return Ok(vec![word]);
        }

        let stem = STEMMER.stem(&word.replace('ё', "е")).into_owned();
        if stem.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![stem])
    }

    fn grammatical_tags(&self, normal_form: &str) -> Result<Vec<String>, MorphologyError> {
        Self::check_word(normal_form)?;
        let normal_form = normal_form.to_lowercase();

        let mut tags: Vec<String> = Vec::new();
        for &id in self.by_normal_form.get(&normal_form).into_iter().flatten() {
            if let Some(tag) = self.tags.get(id as usize) {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        if tags.is_empty() {
            if let Some(tag) = CLOSED_CLASSES.get(normal_form.as_str()) {
                tags.push(tag.to_string());
            }
        }
        Ok(tags)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const DICTIONARY: &str = "1
СТАЛЬ\tNOUN,inan,femn sing,nomn
СТАЛИ\tNOUN,inan,femn sing,gent
СТАЛИ\tNOUN,inan,femn plur,nomn

2
СТАТЬ\tINFN,perf,intr
СТАЛИ\tVERB,perf,intr plur,past,indc

3
СОБАКА\tNOUN,anim,femn sing,nomn
СОБАКИ\tNOUN,anim,femn sing,gent
СОБАКОЙ\tNOUN,anim,femn sing,ablt

4
И\tCONJ

5
НЕ\tPRCL

6
ЁЖ\tNOUN,anim,masc sing,nomn
ЕЖА\tNOUN,anim,masc sing,gent

";

    fn dictionary() -> RussianMorphology {
        RussianMorphology::from_reader(DICTIONARY.as_bytes()).unwrap()
    }

    #[test]
    fn test_dictionary_normal_forms() {
        let morph = dictionary();
        assert_eq!(morph.lemma_count(), 6);
        assert_eq!(morph.normal_forms("собакой").unwrap(), vec!["собака".to_string()]);
        assert_eq!(morph.normal_forms("ежа").unwrap(), vec!["ёж".to_string()]);
        assert_eq!(morph.normal_forms("еж").unwrap(), vec!["ёж".to_string()]);
    }

    #[test]
    fn test_ambiguous_form_has_every_normal_form() {
        let morph = dictionary();
        assert_eq!(
            morph.normal_forms("стали").unwrap(),
            vec!["сталь".to_string(), "стать".to_string()]
        );
        assert_eq!(morph.grammatical_tags("стать").unwrap(), vec!["INFN".to_string()]);
    }

    #[test]
    fn test_dictionary_tags_function_words() {
        let morph = dictionary();
        let tags = morph.grammatical_tags("и").unwrap();
        assert_eq!(tags, vec![TAG_CONJUNCTION.to_string()]);
        assert!(is_function_word(&tags));
        assert!(!is_function_word(&morph.grammatical_tags("не").unwrap()));
        assert!(!is_function_word(&morph.grammatical_tags("собака").unwrap()));
    }

    #[test]
    fn test_unknown_words_fall_back_to_stems() {
        let morph = dictionary();
        let a = morph.normal_forms("кошками").unwrap();
        let b = morph.normal_forms("кошки").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_function_words_are_tagged() {
        let morph = RussianMorphology::new();
        for word in ["в", "и", "ой"] {
            let forms = morph.normal_forms(word).unwrap();
            assert_eq!(forms, vec![word.to_string()]);
            let tags = morph.grammatical_tags(&forms[0]).unwrap();
            assert!(is_function_word(&tags), "{} should be a function word", word);
        }
    }

    #[test]
    fn test_particles_are_not_function_words() {
        let morph = RussianMorphology::new();
        let tags = morph.grammatical_tags("не").unwrap();
        assert_eq!(tags, vec![TAG_PARTICLE.to_string()]);
        assert!(!is_function_word(&tags));
    }

    #[test]
    fn test_inflected_forms_share_normal_form() {
        let morph = RussianMorphology::new();
        let a = morph.normal_forms("собака").unwrap();
        let b = morph.normal_forms("собаки").unwrap();
        assert_eq!(a, b);
        assert!(morph.grammatical_tags(&a[0]).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_cyrillic() {
        let morph = RussianMorphology::new();
        assert!(matches!(
            morph.normal_forms("hello"),
            Err(MorphologyError::UnsupportedAlphabet(_))
        ));
        assert!(matches!(morph.normal_forms(""), Err(MorphologyError::EmptyWord)));
    }
}
