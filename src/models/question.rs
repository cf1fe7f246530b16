use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionType {
    Mcq,
    Msq,
    Nat,
}

impl QuestionType {
    /// Phase order of an authoritative quiz.
    pub const ORDER: [QuestionType; 3] = [QuestionType::Mcq, QuestionType::Msq, QuestionType::Nat];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::Msq => "MSQ",
            QuestionType::Nat => "NAT",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MCQ" => Ok(QuestionType::Mcq),
            "MSQ" => Ok(QuestionType::Msq),
            "NAT" => Ok(QuestionType::Nat),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// A single letter/number for MCQ and NAT, a letter set for MSQ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multiple(Vec<String>),
}

impl Answer {
    /// Lenient conversion used for backend output and bank files alike.
    /// Numbers keep their JSON rendering; null and empty values yield `None`.
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) if !s.trim().is_empty() => Some(Answer::Single(s.clone())),
            JsonValue::Number(n) => Some(Answer::Single(n.to_string())),
            JsonValue::Array(items) if !items.is_empty() => Some(Answer::Multiple(
                items.iter().filter_map(scalar_to_string).collect(),
            )),
            _ => None,
        }
    }
}

/// A record recovered from generation output, before type-specific checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub question: String,
    pub options: Vec<String>,
    pub answer: Answer,
    pub question_type: Option<QuestionType>,
}

impl ParsedRecord {
    /// Returns `None` unless the object carries a non-empty `question` and `answer`.
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        let obj = value.as_object()?;
        let question = obj.get("question")?.as_str()?;
        if question.trim().is_empty() {
            return None;
        }
        let answer = Answer::from_value(obj.get("answer")?)?;
        Some(Self {
            question: question.to_string(),
            options: obj.get("options").map(options_from_value).unwrap_or_default(),
            answer,
            question_type: obj
                .get("type")
                .and_then(|t| t.as_str())
                .and_then(|t| t.parse().ok()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    pub options: Vec<String>,
    pub answer: Option<Answer>,
    pub topic: String,
    pub difficulty: Difficulty,
}

/// Flattens an options value into an ordered list. A keyed mapping is sorted by
/// key with empty values dropped; anything else that is not a list yields nothing.
pub fn options_from_value(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.into_iter()
                .filter_map(|k| scalar_to_string(&map[k.as_str()]))
                .filter(|s| !s.is_empty())
                .collect()
        }
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_requires_question_and_answer() {
        assert!(ParsedRecord::from_value(&json!({"question": "x"})).is_none());
        assert!(ParsedRecord::from_value(&json!({"answer": "A"})).is_none());
        assert!(ParsedRecord::from_value(&json!({"question": "  ", "answer": "A"})).is_none());
        assert!(ParsedRecord::from_value(&json!({"question": "q", "answer": ""})).is_none());
        assert!(ParsedRecord::from_value(&json!({"question": "q", "answer": null})).is_none());

        let rec = ParsedRecord::from_value(&json!({
            "question": "q",
            "options": ["1", "2"],
            "answer": 4.5,
            "type": "nat"
        }))
        .expect("record");
        assert_eq!(rec.answer, Answer::Single("4.5".into()));
        assert_eq!(rec.options, vec!["1", "2"]);
        assert_eq!(rec.question_type, Some(QuestionType::Nat));
    }

    #[test]
    fn mapping_options_are_sorted_and_compacted() {
        let opts = options_from_value(&json!({"D": "four", "B": "two", "A": "one", "C": ""}));
        assert_eq!(opts, vec!["one", "two", "four"]);
    }

    #[test]
    fn question_type_serializes_uppercase() {
        assert_eq!(serde_json::to_value(QuestionType::Msq).unwrap(), json!("MSQ"));
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("Extreme".parse::<Difficulty>().is_err());
    }
}
