use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::prompt::{MAX_PARAMETERS, MAX_PROMPT_CHARS, MAX_QUESTION_CHARS};
use crate::types::AdvisoryContext;

const PREAMBLE: &str = "You are an analyst advising on the regional sugar market. \
Answer the question using the current dashboard parameters below.";

/// Render the prompt forwarded to the advisory service.
///
/// Returns `None` for a blank question: the caller should not contact the
/// service at all. Parameters are rendered as `name=value` lines in key order,
/// then the question. Output is bounded: the question is cut to
/// `MAX_QUESTION_CHARS`, at most `MAX_PARAMETERS` are kept, and trailing
/// parameter lines are dropped until the prompt fits in `MAX_PROMPT_CHARS`.
pub fn build_context(question: &str, parameters: &BTreeMap<String, Decimal>) -> Option<AdvisoryContext> {
    let question: String = question.trim().chars().take(MAX_QUESTION_CHARS).collect();
    if question.is_empty() {
        return None;
    }

    let mut kept: BTreeMap<String, Decimal> = parameters
        .iter()
        .filter(|(name, _)| !name.trim().is_empty())
        .take(MAX_PARAMETERS)
        .map(|(name, value)| (single_line(name), value.normalize()))
        .collect();

    let mut prompt_text = render(&kept, &question);
    while prompt_text.chars().count() > MAX_PROMPT_CHARS {
        if kept.pop_last().is_none() {
            break;
        }
        prompt_text = render(&kept, &question);
    }

    Some(AdvisoryContext {
        parameters: kept,
        question,
        prompt_text,
    })
}

fn render(parameters: &BTreeMap<String, Decimal>, question: &str) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(PREAMBLE);
    out.push_str("\n\nParameters:\n");
    for (name, value) in parameters {
        out.push_str(&format!("{name}={value}\n"));
    }
    out.push_str("\nQuestion: ");
    out.push_str(question);
    out
}

fn single_line(name: &str) -> String {
    name.trim().replace(['\n', '\r'], " ")
}
