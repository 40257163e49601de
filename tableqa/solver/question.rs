use serde::{Deserialize, Serialize};
use tableqa_tables::Tokenizer;

/// Interrogatives recognised as single words.
const WH_WORDS: [&str; 9] = [
    "what", "which", "where", "when", "who", "whom", "whose", "why", "how",
];

/// Interrogatives recognised as `how` + quantifier bigrams.
const WH_QUANTIFIERS: [&str; 2] = ["many", "much"];

/// One offered answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerChoice {
    /// Display label (`A`, `B`, ...).
    pub label: String,
    /// Choice text.
    pub text: String,
}

impl AnswerChoice {
    /// Creates a choice.
    #[must_use]
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// Shape of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "choices", rename_all = "snake_case")]
pub enum QuestionFormat {
    /// Pick one of the offered choices.
    MultipleChoice(Vec<AnswerChoice>),
    /// No choices offered.
    FreeResponse,
}

/// A question as submitted to the solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question text.
    pub text: String,
    /// Format and, for multiple choice, the choices.
    pub format: QuestionFormat,
}

impl Question {
    /// Multiple-choice question; choices are labelled `A`, `B`, ... in order.
    #[must_use]
    pub fn multiple_choice<S: AsRef<str>>(text: impl Into<String>, choices: &[S]) -> Self {
        let choices = choices
            .iter()
            .zip(labels())
            .map(|(choice, label)| AnswerChoice::new(label, choice.as_ref()))
            .collect();
        Self {
            text: text.into(),
            format: QuestionFormat::MultipleChoice(choices),
        }
    }

    /// Free-response question.
    #[must_use]
    pub fn free_response(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: QuestionFormat::FreeResponse,
        }
    }

    /// Choices when the question is multiple choice.
    #[must_use]
    pub fn choices(&self) -> Option<&[AnswerChoice]> {
        match &self.format {
            QuestionFormat::MultipleChoice(choices) => Some(choices),
            QuestionFormat::FreeResponse => None,
        }
    }
}

fn labels() -> impl Iterator<Item = String> {
    ('A'..='Z')
        .map(String::from)
        .chain((27usize..).map(|n| n.to_string()))
}

/// Question representation consumed by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableQuestion {
    /// Original text.
    pub text: String,
    /// Offered choices.
    pub choices: Vec<AnswerChoice>,
    /// Keyword constituents of the question text.
    pub constituents: Vec<String>,
    /// Interrogatives found in the text, first occurrence order.
    pub wh_terms: Vec<String>,
}

impl TableQuestion {
    /// Splits `text` into constituents and wh-terms.
    #[must_use]
    pub fn new(text: &str, choices: Vec<AnswerChoice>, tokenizer: &dyn Tokenizer) -> Self {
        Self {
            text: text.to_string(),
            choices,
            constituents: tokenizer.keyword_tokenize(text),
            wh_terms: wh_terms(text),
        }
    }
}

/// Interrogatives in `text`; `how many` / `how much` are kept as bigrams.
#[must_use]
pub fn wh_terms(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    let mut terms: Vec<String> = Vec::new();
    let mut position = 0;
    while position < words.len() {
        let word = words[position];
        let term = match words.get(position + 1) {
            Some(next) if word == "how" && WH_QUANTIFIERS.contains(next) => {
                position += 1;
                Some(format!("how {next}"))
            }
            _ if WH_WORDS.contains(&word) => Some(word.to_string()),
            _ => None,
        };
        if let Some(term) = term.filter(|term| !terms.contains(term)) {
            terms.push(term);
        }
        position += 1;
    }
    terms
}
