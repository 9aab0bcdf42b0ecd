//! Quiz file loading.
//!
//! A quiz file is a flat sequence of five-line blocks. Blank lines are
//! ignored anywhere in the file:
//!
//! ```text
//! What is 2 + 2?
//! A - 3
//! B - 4
//! C - 5
//! Answer: B
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const LINES_PER_QUESTION: usize = 5;
const ANSWER_PREFIX: &str = "answer:";

/// One of the three labelled options of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
    C,
}

impl Choice {
    pub fn label(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Choice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Choice::A),
            "B" => Ok(Choice::B),
            "C" => Ok(Choice::C),
            _ => Err(()),
        }
    }
}

/// A parsed quiz question. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub text: String,
    pub a: String,
    pub b: String,
    pub c: String,
    pub correct: Choice,
}

impl QuestionRecord {
    pub fn option(&self, choice: Choice) -> &str {
        match choice {
            Choice::A => &self.a,
            Choice::B => &self.b,
            Choice::C => &self.c,
        }
    }

    pub fn is_correct(&self, choice: Choice) -> bool {
        self.correct == choice
    }
}

/// Errors raised while loading a quiz file. Line numbers are 1-based and
/// refer to physical lines, blank lines included.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to read quiz file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("quiz has {count} non-blank lines, expected a multiple of 5")]
    LineCount { count: usize },

    #[error("line {line}: expected option starting with '{expected} -', got: {found}")]
    OptionPrefix {
        line: usize,
        expected: Choice,
        found: String,
    },

    #[error("line {line}: expected answer line like 'Answer: X', got: {found}")]
    AnswerLine { line: usize, found: String },

    #[error("line {line}: invalid correct answer '{answer}' for question: {question}")]
    InvalidAnswer {
        line: usize,
        answer: String,
        question: String,
    },
}

/// Reads and parses the quiz file at `path`.
pub fn load_questions(path: impl AsRef<Path>) -> Result<Vec<QuestionRecord>, FormatError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| FormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_questions(&contents)
}

/// Parses quiz text. Either every block is valid or nothing is returned.
pub fn parse_questions(contents: &str) -> Result<Vec<QuestionRecord>, FormatError> {
    let lines: Vec<(usize, &str)> = contents
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    if lines.len() % LINES_PER_QUESTION != 0 {
        return Err(FormatError::LineCount { count: lines.len() });
    }

    lines
        .chunks_exact(LINES_PER_QUESTION)
        .map(parse_block)
        .collect()
}

fn parse_block(block: &[(usize, &str)]) -> Result<QuestionRecord, FormatError> {
    let (_, text) = block[0];
    let a = parse_option(block[1], Choice::A)?;
    let b = parse_option(block[2], Choice::B)?;
    let c = parse_option(block[3], Choice::C)?;
    let correct = parse_answer(block[4], text)?;

    Ok(QuestionRecord {
        text: text.to_string(),
        a,
        b,
        c,
        correct,
    })
}

fn parse_option((line, content): (usize, &str), expected: Choice) -> Result<String, FormatError> {
    let prefix = format!("{} -", expected.label());
    content
        .strip_prefix(prefix.as_str())
        .map(|option| option.trim().to_string())
        .ok_or_else(|| FormatError::OptionPrefix {
            line,
            expected,
            found: content.to_string(),
        })
}

fn parse_answer((line, content): (usize, &str), question: &str) -> Result<Choice, FormatError> {
    let has_prefix = content
        .get(..ANSWER_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(ANSWER_PREFIX));
    if !has_prefix {
        return Err(FormatError::AnswerLine {
            line,
            found: content.to_string(),
        });
    }

    let answer = content[ANSWER_PREFIX.len()..].trim().to_uppercase();
    answer.parse().map_err(|_| FormatError::InvalidAnswer {
        line,
        answer,
        question: question.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
What is 2 + 2?
A - 3
B - 4
C - 5
Answer: B

Capital of France?
A - Paris
B - Rome
C - Madrid
answer: a
";

    #[test]
    fn test_parse_sample() {
        let questions = parse_questions(SAMPLE).unwrap();
        assert_eq!(questions.len(), 2);

        assert_eq!(questions[0].text, "What is 2 + 2?");
        assert_eq!(questions[0].option(Choice::B), "4");
        assert_eq!(questions[0].correct, Choice::B);
        assert!(questions[0].is_correct(Choice::B));
        assert!(!questions[0].is_correct(Choice::A));

        assert_eq!(questions[1].a, "Paris");
        assert_eq!(questions[1].correct, Choice::A);
    }

    #[test]
    fn test_parse_is_repeatable() {
        assert_eq!(parse_questions(SAMPLE).unwrap(), parse_questions(SAMPLE).unwrap());
    }

    #[test]
    fn test_empty_input_has_no_questions() {
        assert!(parse_questions("").unwrap().is_empty());
        assert!(parse_questions("\n   \n").unwrap().is_empty());
    }

    #[test]
    fn test_line_count_not_multiple_of_five() {
        let truncated: String = SAMPLE.lines().take(9).map(|l| format!("{l}\n")).collect();
        match parse_questions(&truncated) {
            Err(FormatError::LineCount { count }) => assert_eq!(count, 8),
            other => panic!("expected LineCount error, got {other:?}"),
        }
    }

    #[test]
    fn test_option_prefix_out_of_order() {
        let text = "Q?\nB - 1\nA - 2\nC - 3\nAnswer: A\n";
        match parse_questions(text) {
            Err(FormatError::OptionPrefix {
                line,
                expected,
                found,
            }) => {
                assert_eq!(line, 2);
                assert_eq!(expected, Choice::A);
                assert_eq!(found, "B - 1");
            }
            other => panic!("expected OptionPrefix error, got {other:?}"),
        }
    }

    #[test]
    fn test_option_without_dash_rejected() {
        let text = "Q?\nA 1\nB - 2\nC - 3\nAnswer: A\n";
        assert!(matches!(
            parse_questions(text),
            Err(FormatError::OptionPrefix { line: 2, .. })
        ));
    }

    #[test]
    fn test_answer_line_rejected() {
        let text = "Q?\nA - 1\nB - 2\nC - 3\nCorrect: A\n";
        assert!(matches!(
            parse_questions(text),
            Err(FormatError::AnswerLine { line: 5, .. })
        ));
    }

    #[test]
    fn test_invalid_answer_letter() {
        let text = "\nQ?\nA - 1\nB - 2\nC - 3\nAnswer: D\n";
        match parse_questions(text) {
            Err(FormatError::InvalidAnswer {
                line,
                answer,
                question,
            }) => {
                assert_eq!(line, 6);
                assert_eq!(answer, "D");
                assert_eq!(question, "Q?");
            }
            other => panic!("expected InvalidAnswer error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_in_later_block_discards_earlier_records() {
        let text = format!("{SAMPLE}Q3?\nA - x\nB - y\nC - z\nAnswer: Z\n");
        assert!(parse_questions(&text).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let questions = load_questions(file.path()).unwrap();
        assert_eq!(questions.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");

        match load_questions(&missing) {
            Err(FormatError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
