//! Study notes to flashcard pairs
//!
//! Deterministic extraction of front/back pairs from free-form study notes.
//! Recognized shapes, in order of precedence per line:
//!
//! - `Q:` / `A:` blocks (the answer may span following lines)
//! - `Term: definition` lines
//! - `term - definition` bullets
//!
//! Lines that match nothing are ignored. Pair order follows the order of
//! appearance in the notes.

use serde::{Deserialize, Serialize};

/// One flashcard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPair {
    pub front: String,
    pub back: String,
}

/// Extract flashcard pairs from free-form notes.
///
/// Returns an empty vec when nothing usable is found; the caller decides
/// whether that is an error.
pub fn convert_notes(notes: &str) -> Vec<CardPair> {
    let mut cards = Vec::new();
    let mut pending_question: Option<String> = None;
    let mut pending_answer: Vec<String> = Vec::new();

    for raw_line in notes.lines() {
        let line = strip_bullet(raw_line);

        if line.is_empty() {
            flush_pending(&mut cards, &mut pending_question, &mut pending_answer);
            continue;
        }

        if let Some(question) = strip_prefix_ci(line, "q:") {
            flush_pending(&mut cards, &mut pending_question, &mut pending_answer);
            pending_question = Some(question.trim().to_string());
            continue;
        }

        if let Some(answer) = strip_prefix_ci(line, "a:") {
            if pending_question.is_some() {
                pending_answer.push(answer.trim().to_string());
            }
            continue;
        }

        // Continuation lines extend a started answer
        if pending_question.is_some() && !pending_answer.is_empty() {
            pending_answer.push(line.to_string());
            continue;
        }

        // "Term: definition" -- the term side stays short so prose with a
        // stray colon does not turn into a card
        if let Some((term, definition)) = line.split_once(':') {
            let term = term.trim();
            let definition = definition.trim();
            if !term.is_empty() && term.len() <= 80 && !definition.is_empty() {
                cards.push(CardPair {
                    front: term.to_string(),
                    back: definition.to_string(),
                });
                continue;
            }
        }

        // "term - definition"
        if let Some((term, definition)) = line.split_once(" - ") {
            let term = term.trim();
            let definition = definition.trim();
            if !term.is_empty() && term.len() <= 80 && !definition.is_empty() {
                cards.push(CardPair {
                    front: term.to_string(),
                    back: definition.to_string(),
                });
            }
        }
    }

    flush_pending(&mut cards, &mut pending_question, &mut pending_answer);
    cards
}

fn flush_pending(
    cards: &mut Vec<CardPair>,
    question: &mut Option<String>,
    answer: &mut Vec<String>,
) {
    if let Some(q) = question.take() {
        if !answer.is_empty() {
            cards.push(CardPair {
                front: q,
                back: answer.join(" "),
            });
        }
    }
    answer.clear();
}

fn strip_bullet(line: &str) -> &str {
    line.trim_start()
        .trim_start_matches(['-', '*', '•'])
        .trim()
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}
