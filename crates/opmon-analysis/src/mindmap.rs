//! Mermaid `mindmap` rendering of the analysis, with a deterministic
//! fallback that is valid for any opinion list.

use std::time::Duration;

use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompts;
use crate::repair::generate_validated;
use crate::text::{extract_points, normalize_whitespace, truncate_chars};
use crate::types::{Opinion, Outcome};

const KEYWORD_MAX_CHARS: usize = 40;
const SENTIMENT_LABEL_MAX_CHARS: usize = 20;
const LABEL_MAX_CHARS: usize = 30;
const MAX_OPINION_BRANCHES: usize = 6;
const MAX_POINTS_PER_BRANCH: usize = 3;

/// Label placed under the `Sentiment` branch.
#[must_use]
pub fn sentiment_label(score: u8) -> &'static str {
    match score {
        80.. => "Very Positive",
        60..=79 => "Positive",
        40..=59 => "Neutral",
        20..=39 => "Negative",
        _ => "Very Negative",
    }
}

/// Plain-text node label: no quotes, brackets, colons, semicolons or pipes,
/// a single line, at most `max_chars` characters. Blank input becomes `Point`.
#[must_use]
pub fn sanitize_label(label: &str, max_chars: usize) -> String {
    let replaced: String = label
        .chars()
        .map(|c| match c {
            '"' | '\'' | '(' | ')' | '[' | ']' | '{' | '}' | ':' | ';' | '|' => ' ',
            c => c,
        })
        .collect();
    let cleaned = normalize_whitespace(&replaced);
    let cleaned = truncate_chars(&cleaned, max_chars).trim_end();
    if cleaned.is_empty() {
        "Point".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Pull mindmap source out of a model response: the body of a
/// ```` ```mermaid ```` fence if present, else everything from `mindmap` on.
#[must_use]
pub fn extract_mermaid(response: &str) -> &str {
    const FENCE: &str = "```mermaid";
    if let Some(start) = response.find(FENCE) {
        let body = &response[start + FENCE.len()..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    match response.find("mindmap") {
        Some(start) => response[start..].trim(),
        None => response.trim(),
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Structural check of mindmap source.
///
/// `min_branches` is the number of opinion branches required under the root.
pub(crate) fn validate_mindmap(code: &str, keyword: &str, min_branches: usize) -> Result<(), String> {
    let lines: Vec<&str> = code
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    let Some((first, rest)) = lines.split_first() else {
        return Err("mindmap is empty".to_string());
    };
    if *first != "mindmap" {
        return Err("first line must be exactly \"mindmap\"".to_string());
    }
    if rest.iter().any(|l| l.contains('\t')) {
        return Err("use spaces for indentation, not tabs".to_string());
    }
    if let Some(bad) = rest.iter().find(|l| indent_of(l) < 2 || indent_of(l) % 2 != 0) {
        return Err(format!("line {bad:?} must be indented by a positive multiple of two spaces"));
    }

    let roots: Vec<&&str> = rest
        .iter()
        .filter(|l| indent_of(l) == 2)
        .collect();
    if roots.len() != 1 {
        return Err("expected exactly one root node \"root((keyword))\" at two-space indentation".to_string());
    }
    let root = roots[0].trim();
    if !(root.starts_with("root((") && root.ends_with("))")) {
        return Err("root node must have the form root((keyword))".to_string());
    }
    let keyword = sanitize_label(keyword, KEYWORD_MAX_CHARS).to_lowercase();
    if !root.to_lowercase().contains(&keyword) {
        return Err(format!("root node must contain the keyword {keyword:?}"));
    }

    for line in rest.iter().filter(|l| indent_of(l) > 2) {
        if line.contains(['(', ')', '[', ']', '{', '}']) {
            return Err(format!("label {:?} contains shape brackets", line.trim()));
        }
    }

    let sentiment_at: Vec<usize> = rest
        .iter()
        .enumerate()
        .filter(|(_, l)| indent_of(l) == 4 && l.trim() == "Sentiment")
        .map(|(i, _)| i)
        .collect();
    if sentiment_at.len() != 1 {
        return Err("expected exactly one \"Sentiment\" branch under the root".to_string());
    }
    let has_label = rest
        .get(sentiment_at[0] + 1)
        .is_some_and(|l| indent_of(l) == 6);
    if !has_label {
        return Err("expected a sentiment label under \"Sentiment\"".to_string());
    }

    let branches = rest
        .iter()
        .filter(|l| indent_of(l) == 4 && l.trim() != "Sentiment")
        .count();
    if branches < min_branches {
        return Err(format!(
            "expected at least {min_branches} opinion branches under the root, found {branches}"
        ));
    }
    Ok(())
}

fn branch_points(opinion: &Opinion) -> Vec<String> {
    let points: Vec<String> = opinion
        .points
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| sanitize_label(p, LABEL_MAX_CHARS))
        .collect();
    if points.is_empty() {
        extract_points(&opinion.description, MAX_POINTS_PER_BRANCH, LABEL_MAX_CHARS)
            .iter()
            .map(|p| sanitize_label(p, LABEL_MAX_CHARS))
            .collect()
    } else {
        points
    }
}

/// Deterministic mindmap for up to six opinions (extra ones are dropped).
#[must_use]
pub fn fallback_mindmap(keyword: &str, opinions: &[Opinion], score: u8) -> String {
    let mut lines = vec![
        "mindmap".to_string(),
        format!("  root(({}))", sanitize_label(keyword, KEYWORD_MAX_CHARS)),
        "    Sentiment".to_string(),
        format!(
            "      {}",
            sanitize_label(sentiment_label(score), SENTIMENT_LABEL_MAX_CHARS)
        ),
    ];
    for opinion in opinions.iter().take(MAX_OPINION_BRANCHES) {
        let title = sanitize_label(&opinion.title, LABEL_MAX_CHARS);
        // A branch titled like the sentiment node would be miscounted.
        let title = if title == "Sentiment" {
            "Sentiment view".to_string()
        } else {
            title
        };
        lines.push(format!("    {title}"));
        let points = branch_points(opinion);
        if !points.is_empty() {
            lines.push("      Points".to_string());
            for point in points.iter().take(MAX_POINTS_PER_BRANCH) {
                lines.push(format!("        {point}"));
            }
        }
    }
    lines.join("\n")
}

pub struct MindmapGenerator<'a> {
    llm: &'a dyn TextGenerator,
    timeout: Duration,
}

impl<'a> MindmapGenerator<'a> {
    #[must_use]
    pub fn new(llm: &'a dyn TextGenerator, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Always yields valid mindmap source; `Degraded` when the fallback was used.
    pub async fn generate(&self, keyword: &str, opinions: &[Opinion], score: u8) -> Outcome<String> {
        let opinions = &opinions[..opinions.len().min(MAX_OPINION_BRANCHES)];
        let min_branches = opinions.len().min(2);
        let label = sentiment_label(score);

        let request = GenerationRequest::new(
            prompts::MINDMAP_SYSTEM,
            prompts::mindmap_user(keyword, opinions, label, score),
        )
        .with_temperature(0.5)
        .with_max_tokens(1_000);

        let validate = |raw: &str| {
            let code = extract_mermaid(raw);
            validate_mindmap(code, keyword, min_branches).map(|()| code.to_string())
        };

        match generate_validated(
            self.llm,
            &request,
            prompts::MINDMAP_REPAIR_SYSTEM,
            self.timeout,
            "mindmap generation",
            validate,
        )
        .await
        {
            Ok(code) => {
                tracing::info!(lines = code.lines().count(), "mindmap generated");
                Outcome::Trusted(code)
            }
            Err(e) => {
                tracing::warn!(error = %e, "mindmap fell back to deterministic layout");
                Outcome::Degraded(fallback_mindmap(keyword, opinions, score))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opinion(title: &str, description: &str, points: &[&str]) -> Opinion {
        Opinion {
            title: title.to_string(),
            description: description.to_string(),
            points: points.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    #[test]
    fn labels_follow_score_bands() {
        assert_eq!(sentiment_label(100), "Very Positive");
        assert_eq!(sentiment_label(80), "Very Positive");
        assert_eq!(sentiment_label(79), "Positive");
        assert_eq!(sentiment_label(40), "Neutral");
        assert_eq!(sentiment_label(20), "Negative");
        assert_eq!(sentiment_label(0), "Very Negative");
    }

    #[test]
    fn sanitize_strips_markup_characters() {
        assert_eq!(sanitize_label("Price: \"too (high)\"; [really]", 30), "Price too high really");
        assert_eq!(sanitize_label("  ", 30), "Point");
        assert_eq!(sanitize_label("abcdefghij", 4), "abcd");
    }

    #[test]
    fn extracts_fenced_and_prefixed_code() {
        let fenced = "Here you go:\n```mermaid\nmindmap\n  root((x))\n```\nthanks";
        assert_eq!(extract_mermaid(fenced), "mindmap\n  root((x))");
        let prefixed = "Sure! mindmap\n  root((x))";
        assert_eq!(extract_mermaid(prefixed), "mindmap\n  root((x))");
    }

    #[test]
    fn fallback_is_valid_for_every_opinion_count() {
        let all: Vec<Opinion> = (0..8)
            .map(|i| opinion(&format!("View {i}: \"quoted\""), "First clause. Second clause", &[]))
            .collect();
        for n in 0..=8 {
            let opinions = &all[..n];
            let code = fallback_mindmap("Phone (2024)", opinions, 65);
            let required = n.min(MAX_OPINION_BRANCHES).min(2);
            validate_mindmap(&code, "Phone (2024)", required)
                .unwrap_or_else(|e| panic!("{n} opinions: {e}\n{code}"));
        }
    }

    #[test]
    fn fallback_layout_matches_expected_shape() {
        let code = fallback_mindmap(
            "phone",
            &[
                opinion("Battery", "d", &["lasts long", "charges fast", "gets warm", "heavy"]),
                opinion("Price", "Too high. Rarely discounted", &[]),
            ],
            85,
        );
        let expected = "mindmap\n  root((phone))\n    Sentiment\n      Very Positive\n    Battery\n      Points\n        lasts long\n        charges fast\n        gets warm\n    Price\n      Points\n        Too high\n        Rarely discounted";
        assert_eq!(code, expected);
    }

    #[test]
    fn validation_catches_broken_structure() {
        let good = "mindmap\n  root((phone))\n    Sentiment\n      Positive\n    A\n    B";
        assert!(validate_mindmap(good, "phone", 2).is_ok());
        assert!(validate_mindmap("graph TD\n  a-->b", "phone", 2).is_err());
        assert!(validate_mindmap("mindmap\n    Sentiment\n      Positive", "phone", 0).is_err());
        let missing_label = "mindmap\n  root((phone))\n    Sentiment\n    A\n    B";
        assert!(validate_mindmap(missing_label, "phone", 2).is_err());
        let one_branch = "mindmap\n  root((phone))\n    Sentiment\n      Positive\n    A";
        assert!(validate_mindmap(one_branch, "phone", 2).is_err());
        let wrong_root = "mindmap\n  root((laptop))\n    Sentiment\n      Positive\n    A\n    B";
        assert!(validate_mindmap(wrong_root, "phone", 2).is_err());
        let brackets = "mindmap\n  root((phone))\n    Sentiment\n      Positive\n    A[x]\n    B";
        assert!(validate_mindmap(brackets, "phone", 2).is_err());
    }
}
