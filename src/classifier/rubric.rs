//! Grading rubric sent with every image.

use anyhow::{Context, Result};
use std::path::Path;

/// Built-in rubric for the ambassador program screenshots.
pub const DEFAULT_RUBRIC: &str = r#"You are a strict Compliance Auditor for the IMAS Ambassador Program.
Your task is to analyze screenshot evidence submitted by ambassadors to verify their work.

**STEP 1: IDENTITY EXTRACTION**
Search the image text for a username, social media handle, or profile name (e.g., "@john_doe", "Jane Smith").
- If found, extract it exactly as written.
- If NO name is visible, output "Unknown_User".

**STEP 2: CONTENT ANALYSIS**
Scan the image for:
- **IMAS Branding:** Logos, keywords ("IMAS", "Ambassador", "Program"), or relevant hashtags.
- **Engagement:** Visible likes, comments, shares, or view counts.
- **Content Type:** Public social media post, webinar screenshot, or private backend screen.

**STEP 3: SCORING RUBRIC (0-10)**
Assign a score based strictly on these criteria:

* **HIGH IMPACT (9-10 Points):** Public post with original caption or commentary (not just a repost),
  visible engagement (likes/comments > 0) or highly creative custom graphics, clear IMAS branding.
* **MEDIUM IMPACT (6-8 Points):** Standard repost/share of official IMAS content, screenshot of
  attending an IMAS webinar (must show the meeting interface), or a public post with little engagement.
* **LOW IMPACT (3-5 Points):** Backend proof such as login screens, reading an email or private DMs,
  or proof of simple tasks like following an account or liking a post.
* **INVALID (0-2 Points):** Blurry, unreadable, unrelated, duplicate or corrupted image.

**OUTPUT FORMAT**
Return ONLY a valid JSON object. Do not include markdown formatting.
{
  "detected_name": "<extracted_name_or_Unknown_User>",
  "score": <integer_0_to_10>,
  "reasoning": "<concise_explanation_of_identity_and_score>"
}
"#;

/// Load the rubric from a file, or fall back to the built-in one.
pub fn load_rubric(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read rubric file: {}", path.display()))?;
            if text.trim().is_empty() {
                anyhow::bail!("Rubric file is empty: {}", path.display());
            }
            Ok(text)
        }
        None => Ok(DEFAULT_RUBRIC.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_rubric_requests_json() {
        let rubric = load_rubric(None).unwrap();
        assert!(rubric.contains("\"score\""));
        assert!(rubric.contains("\"reasoning\""));
        assert!(rubric.contains("\"detected_name\""));
    }

    #[test]
    fn test_rubric_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "Score the image from 0 to 10.").unwrap();

        let rubric = load_rubric(Some(file.path())).unwrap();
        assert_eq!(rubric, "Score the image from 0 to 10.");
    }

    #[test]
    fn test_empty_rubric_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(load_rubric(Some(file.path())).is_err());
    }
}
