use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use crate::config::GenerationSettings;
use crate::models::question::{Answer, ParsedRecord, QuestionType};

const OPTION_LETTERS: [&str; 4] = ["A", "B", "C", "D"];
const ZERO_WIDTH: [char; 4] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}'];

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn answer_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;\s]+").expect("static regex"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuestion {
    pub question_type: QuestionType,
    pub question: String,
    pub options: Vec<String>,
    pub answer: Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TextTooShort,
    BannedPhrase,
    OptionCount(usize),
    BadAnswer,
}

/// A content rule applied to cleaned question text.
pub trait TextRule: Send + Sync {
    fn check(&self, cleaned: &str) -> Result<(), Rejection>;
}

pub struct MinLength(pub usize);

impl TextRule for MinLength {
    fn check(&self, cleaned: &str) -> Result<(), Rejection> {
        if cleaned.chars().count() < self.0 {
            Err(Rejection::TextTooShort)
        } else {
            Ok(())
        }
    }
}

/// Case-insensitive substring denylist. Keeps questions analytical rather than
/// definitional.
pub struct Denylist(pub Vec<String>);

impl TextRule for Denylist {
    fn check(&self, cleaned: &str) -> Result<(), Rejection> {
        let lowered = cleaned.to_lowercase();
        if self.0.iter().any(|phrase| lowered.contains(phrase.as_str())) {
            Err(Rejection::BannedPhrase)
        } else {
            Ok(())
        }
    }
}

pub struct QuestionValidator {
    rules: Vec<Box<dyn TextRule>>,
}

impl QuestionValidator {
    pub fn new(settings: &GenerationSettings) -> Self {
        Self::with_rules(vec![
            Box::new(MinLength(settings.min_question_chars)),
            Box::new(Denylist(
                settings.banned_phrases.iter().map(|p| p.to_lowercase()).collect(),
            )),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn TextRule>>) -> Self {
        Self { rules }
    }

    /// Strips zero-width characters, collapses whitespace runs, trims.
    pub fn clean(text: &str) -> String {
        let stripped: String = text.chars().filter(|c| !ZERO_WIDTH.contains(c)).collect();
        whitespace_re().replace_all(&stripped, " ").trim().to_string()
    }

    pub fn is_acceptable_text(&self, text: &str) -> bool {
        self.check_text(&Self::clean(text)).is_ok()
    }

    fn check_text(&self, cleaned: &str) -> Result<(), Rejection> {
        self.rules.iter().try_for_each(|rule| rule.check(cleaned))
    }

    pub fn validate(
        &self,
        record: &ParsedRecord,
        question_type: QuestionType,
    ) -> Result<ValidatedQuestion, Rejection> {
        let question = Self::clean(&record.question);
        self.check_text(&question)?;

        if matches!(question_type, QuestionType::Mcq | QuestionType::Msq) && record.options.len() != 4 {
            return Err(Rejection::OptionCount(record.options.len()));
        }

        let answer = match question_type {
            QuestionType::Mcq => match &record.answer {
                Answer::Single(a) if OPTION_LETTERS.contains(&a.as_str()) => Answer::Single(a.clone()),
                _ => return Err(Rejection::BadAnswer),
            },
            QuestionType::Msq => {
                let letters = normalize_msq_answer(&record.answer);
                if letters.len() < 2 {
                    return Err(Rejection::BadAnswer);
                }
                Answer::Multiple(letters)
            }
            QuestionType::Nat => match &record.answer {
                Answer::Single(a) if is_real_number(a.trim()) => Answer::Single(a.trim().to_string()),
                _ => return Err(Rejection::BadAnswer),
            },
        };

        Ok(ValidatedQuestion {
            question_type,
            question,
            options: record.options.clone(),
            answer,
        })
    }
}

/// Uppercased option letters, sorted and de-duplicated. Unknown tokens are dropped.
pub fn normalize_msq_answer(answer: &Answer) -> Vec<String> {
    let tokens: Vec<String> = match answer {
        Answer::Multiple(items) => items.iter().map(|s| s.trim().to_uppercase()).collect(),
        Answer::Single(s) => answer_split_re()
            .split(&s.trim().to_uppercase())
            .map(str::to_string)
            .collect(),
    };
    tokens
        .into_iter()
        .filter(|t| OPTION_LETTERS.contains(&t.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn is_real_number(s: &str) -> bool {
    !s.is_empty() && s.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Case-folded question texts already accepted in the current generation run.
#[derive(Debug, Default)]
pub struct SeenQuestions(HashSet<String>);

impl SeenQuestions {
    /// Returns true the first time a text is offered.
    pub fn insert(&mut self, cleaned_question: &str) -> bool {
        self.0.insert(cleaned_question.to_lowercase())
    }
}
