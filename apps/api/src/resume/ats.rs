use serde::Serialize;
use tracing::info;

use super::prompts::{ats_user_prompt, ATS_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::LlmClient;

pub const MIN_RESUME_CHARS: usize = 50;
/// Longer résumés are cut before being sent to the model.
pub const MAX_RESUME_CHARS: usize = 12_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtsReport {
    pub success: bool,
    pub score: u32,
    pub grade: String,
    pub full_analysis: String,
}

pub fn validate_resume_text(text: &str) -> Result<&str, AppError> {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_RESUME_CHARS {
        return Err(AppError::Validation(format!(
            "Please provide resume text with at least {MIN_RESUME_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

/// First `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Finds `label` case-insensitively and returns what follows it, minus leading whitespace.
fn after_label<'a>(analysis: &'a str, label: &str) -> Option<&'a str> {
    let lower = analysis.to_ascii_lowercase();
    let start = lower.find(&label.to_ascii_lowercase())? + label.len();
    Some(analysis[start..].trim_start())
}

/// Number after `ATS SCORE:`, capped at 100; 0 when the line is missing.
pub fn parse_score(analysis: &str) -> u32 {
    let Some(rest) = after_label(analysis, "ATS SCORE:") else {
        return 0;
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().map_or(0, |n| n.min(100) as u32)
}

/// Letter grade after `GRADE:` (`A`-`F`, optionally followed by `+`).
pub fn parse_grade(analysis: &str) -> Option<String> {
    let rest = after_label(analysis, "GRADE:")?;
    let mut chars = rest.chars();
    let letter = chars.next().filter(|c| matches!(c.to_ascii_uppercase(), 'A'..='F'))?;
    let mut grade = letter.to_string();
    if chars.next() == Some('+') {
        grade.push('+');
    }
    Some(grade)
}

pub fn report_from_analysis(analysis: String) -> AtsReport {
    AtsReport {
        success: true,
        score: parse_score(&analysis),
        grade: parse_grade(&analysis).unwrap_or_else(|| "N/A".to_string()),
        full_analysis: analysis,
    }
}

/// Scores résumé text with the configured model.
pub async fn score_resume(llm: &LlmClient, resume_text: &str) -> Result<AtsReport, AppError> {
    let text = validate_resume_text(resume_text)?;
    info!("Analyzing resume for ATS ({} chars)", text.chars().count());

    let prompt = ats_user_prompt(truncate_chars(text, MAX_RESUME_CHARS));
    let analysis = llm.complete(ATS_SYSTEM, &prompt).await?;
    Ok(report_from_analysis(analysis))
}
