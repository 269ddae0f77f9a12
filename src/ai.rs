//! Prompt construction and response parsing for AI-backed posts.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::filler::CREDIT_CLASS;
use crate::models::ContentBlock;

pub const DEFAULT_TITLE: &str = "AI Generated Post";
pub const DEFAULT_CONTENT: &str = "AI generated content.";

static TITLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^TITLE:\s*").unwrap());
static CONTENT_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^CONTENT:\s*").unwrap());

/// Writing style requested for an AI post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Informative,
    Casual,
    Professional,
    Creative,
    Technical,
}

impl Style {
    /// Unknown or empty names fall back to `Informative`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "casual" => Style::Casual,
            "professional" => Style::Professional,
            "creative" => Style::Creative,
            "technical" => Style::Technical,
            _ => Style::Informative,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Style::Informative => "educational and fact-based",
            Style::Casual => "conversational and friendly",
            Style::Professional => "formal and business-oriented",
            Style::Creative => "imaginative and engaging",
            Style::Technical => "detailed and technical",
        }
    }
}

/// Prompt for post `index` (1-based) of `total`.
pub fn build_prompt(
    topic: &str,
    style: Style,
    title_words: u32,
    paragraphs: u32,
    index: usize,
    total: usize,
) -> String {
    let style_description = style.description();

    let uniqueness = if total > 1 {
        format!(
            "\n\nIMPORTANT: This is post {index} of {total} posts about the same topic. \
             Please ensure the title and content are unique and approach the topic from a different angle, \
             perspective, or focus area to avoid duplication."
        )
    } else {
        String::new()
    };

    format!(
        "Create a blog post about \"{topic}\" in a {style_description} style.{uniqueness}

Please format your response EXACTLY like this:

TITLE: [Write a compelling title of approximately {title_words} words]

CONTENT:
[Write {paragraphs} well-structured paragraphs that are engaging and informative. Each paragraph should be substantial and flow naturally into the next. Separate paragraphs with a blank line.]

Guidelines:
- Make the title catchy and SEO-friendly
- Ensure content is original and engaging
- Use a {style_description} tone throughout
- Structure the content with clear paragraphs
- Make it suitable for a blog post
- Do not use markdown formatting, just plain text with paragraph breaks"
    )
}

/// Title and body blocks extracted from a provider reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPost {
    pub title: String,
    pub blocks: Vec<ContentBlock>,
}

/// Extract `TITLE:` / `CONTENT:` sections, falling back to first line / rest.
/// Never returns an empty title or an empty body.
pub fn parse_response(raw: &str) -> ParsedPost {
    let mut title = marked_title(raw).unwrap_or_default();
    let mut content = marked_content(raw).unwrap_or_default();

    if title.is_empty() || content.is_empty() {
        let trimmed = raw.trim();
        match trimmed.split_once('\n') {
            Some((first, rest)) => {
                title = first.trim().to_string();
                content = rest.trim().to_string();
            }
            None => {
                title = trimmed.to_string();
                content = raw.to_string();
            }
        }
    }

    let title = TITLE_PREFIX.replace(&title, "").trim().to_string();
    let content = CONTENT_PREFIX.replace(&content, "").to_string();

    let mut blocks: Vec<ContentBlock> = split_paragraphs(&content)
        .into_iter()
        .map(|p| ContentBlock::paragraph(escape_html(p)))
        .collect();
    if blocks.is_empty() {
        blocks.push(ContentBlock::paragraph(DEFAULT_CONTENT));
    }

    ParsedPost {
        title: if title.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            title
        },
        blocks,
    }
}

/// Text after the first `TITLE:` up to a blank line, `CONTENT:` or the end.
fn marked_title(raw: &str) -> Option<String> {
    let start = raw.find("TITLE:")? + "TITLE:".len();
    let rest = raw[start..].trim_start();
    let end = [rest.find("\n\n"), rest.find("CONTENT:")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

/// Everything after the first `CONTENT:`.
fn marked_content(raw: &str) -> Option<String> {
    let start = raw.find("CONTENT:")? + "CONTENT:".len();
    Some(raw[start..].trim().to_string())
}

/// Split on blank lines; if that yields one paragraph or fewer, split on single newlines.
pub fn split_paragraphs(content: &str) -> Vec<&str> {
    let by_blank: Vec<&str> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if by_blank.len() > 1 {
        return by_blank;
    }
    content
        .split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Escape HTML special characters so provider text cannot inject markup.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Attribution block appended to AI posts when credit is enabled.
pub fn ai_credit_block(url: &str) -> ContentBlock {
    ContentBlock::with_class(
        CREDIT_CLASS,
        format!("<em>Generated by <a href=\"{url}\" target=\"_blank\">Fake Post AI</a> using Google Gemini AI</em>"),
    )
}
