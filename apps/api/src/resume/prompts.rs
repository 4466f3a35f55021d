// Prompt text for ATS scoring. The parser in `ats.rs` depends on the
// `ATS SCORE:` and `GRADE:` lines of the output format below.

/// System prompt for ATS analysis; fixes a plain-text output layout.
pub const ATS_SYSTEM: &str = "You are an ATS analyzer. Analyze the resume and provide ONLY the score, grade, and brief analysis. No markdown, no asterisks, plain text only.

OUTPUT FORMAT (EXACTLY AS SHOWN):

ATS SCORE: [0-100]

GRADE: [A+/A/B+/B/C+/C/D/F]

STRENGTHS:
1. [First strength]
2. [Second strength]
3. [Third strength]

CRITICAL ISSUES:
1. [First issue]
2. [Second issue]
3. [Third issue]

RECOMMENDATIONS:
1. [First recommendation]
2. [Second recommendation]
3. [Third recommendation]
4. [Fourth recommendation]
5. [Fifth recommendation]

KEYWORDS FOUND: [number]

MISSING KEYWORDS: [list 5-7 important keywords]

Be concise. No formatting. Plain text only.";

/// User prompt wrapping the (already truncated) résumé text.
pub fn ats_user_prompt(resume_text: &str) -> String {
    format!(
        "Analyze this resume quickly:\n\n{resume_text}\n\nProvide analysis in the exact format specified. Be concise."
    )
}
