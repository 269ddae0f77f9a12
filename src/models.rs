use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How a content size is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentUnit {
    /// Total words, split into paragraphs of roughly thirty words.
    #[default]
    Words,
    /// Whole paragraphs.
    Paragraphs,
}

/// Persisted generation configuration. Overwritten wholesale on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub posts_min: u32,
    pub posts_max: u32,
    pub title_min: u32,
    pub title_max: u32,
    pub content_min: u32,
    pub content_max: u32,
    #[serde(default)]
    pub content_unit: ContentUnit,
    #[serde(default)]
    pub credit: bool,
    #[serde(default)]
    pub selected_categories: BTreeSet<i64>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            posts_min: 1,
            posts_max: 5,
            title_min: 3,
            title_max: 8,
            content_min: 30,
            content_max: 100,
            content_unit: ContentUnit::Words,
            credit: false,
            selected_categories: BTreeSet::new(),
        }
    }
}

/// A closed integer range. `min == max` collapses to an exact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeRange {
    pub min: u32,
    pub max: u32,
}

impl SizeRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn exact(value: u32) -> Self {
        Self { min: value, max: value }
    }

    /// Draw one value from the closed range. Callers must have checked `min <= max`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.min >= self.max {
            self.min
        } else {
            rng.random_range(self.min..=self.max)
        }
    }
}

/// A size parameter as sent by a client: either `5` or `{"min": 3, "max": 8}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Exact(u32),
    Range { min: u32, max: u32 },
}

impl From<SizeSpec> for SizeRange {
    fn from(spec: SizeSpec) -> Self {
        match spec {
            SizeSpec::Exact(n) => SizeRange::exact(n),
            SizeSpec::Range { min, max } => SizeRange::new(min, max),
        }
    }
}

impl std::str::FromStr for SizeSpec {
    type Err = String;

    /// Parses `"5"` or `"3-8"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid size '{s}': expected N or MIN-MAX"))
        };
        match s.split_once('-') {
            Some((min, max)) => Ok(SizeSpec::Range {
                min: parse(min)?,
                max: parse(max)?,
            }),
            None => Ok(SizeSpec::Exact(parse(s)?)),
        }
    }
}

/// One paragraph block of a post body, persisted as its own formatting unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub class_name: Option<String>,
    /// Already-escaped inner HTML of the `<p>` element.
    pub inner_html: String,
}

impl ContentBlock {
    pub fn paragraph(inner_html: impl Into<String>) -> Self {
        Self {
            class_name: None,
            inner_html: inner_html.into(),
        }
    }

    pub fn with_class(class_name: &str, inner_html: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.to_string()),
            inner_html: inner_html.into(),
        }
    }

    /// Block-comment markup for a single paragraph block.
    pub fn to_markup(&self) -> String {
        match &self.class_name {
            Some(class) => {
                let attrs = serde_json::json!({ "className": class });
                format!(
                    "<!-- wp:paragraph {attrs} -->\n<p class=\"{class}\">{}</p>\n<!-- /wp:paragraph -->",
                    self.inner_html
                )
            }
            None => format!(
                "<!-- wp:paragraph -->\n<p>{}</p>\n<!-- /wp:paragraph -->",
                self.inner_html
            ),
        }
    }
}

/// Serialize blocks into a post body, one blank line between blocks.
pub fn serialize_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(ContentBlock::to_markup)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A generated title and body that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub blocks: Vec<ContentBlock>,
}

/// Input to `ContentStore::create_post`.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub categories: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub count: i64,
}

/// A post as returned to clients after creation.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPost {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_uses_camel_case() {
        let settings = GenerationSettings {
            selected_categories: [3, 1].into_iter().collect(),
            credit: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["postsMin"], 1);
        assert_eq!(json["contentUnit"], "words");
        assert_eq!(json["selectedCategories"], serde_json::json!([1, 3]));
        let back: GenerationSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn size_spec_accepts_number_or_range() {
        let exact: SizeSpec = serde_json::from_str("5").unwrap();
        assert_eq!(SizeRange::from(exact), SizeRange::exact(5));
        let range: SizeSpec = serde_json::from_str(r#"{"min": 3, "max": 8}"#).unwrap();
        assert_eq!(SizeRange::from(range), SizeRange::new(3, 8));

        assert_eq!("7".parse::<SizeSpec>().unwrap(), SizeSpec::Exact(7));
        assert_eq!("2-4".parse::<SizeSpec>().unwrap(), SizeSpec::Range { min: 2, max: 4 });
        assert!("a-4".parse::<SizeSpec>().is_err());
    }

    #[test]
    fn draw_stays_in_range() {
        let mut rng = rand::rng();
        let range = SizeRange::new(3, 8);
        for _ in 0..200 {
            let v = range.draw(&mut rng);
            assert!((3..=8).contains(&v));
        }
        assert_eq!(SizeRange::exact(4).draw(&mut rng), 4);
    }

    #[test]
    fn block_markup() {
        let plain = ContentBlock::paragraph("Hello");
        assert_eq!(
            plain.to_markup(),
            "<!-- wp:paragraph -->\n<p>Hello</p>\n<!-- /wp:paragraph -->"
        );
        let credit = ContentBlock::with_class("fakepost-credit", "<em>x</em>");
        assert_eq!(
            credit.to_markup(),
            "<!-- wp:paragraph {\"className\":\"fakepost-credit\"} -->\n<p class=\"fakepost-credit\"><em>x</em></p>\n<!-- /wp:paragraph -->"
        );
        let body = serialize_blocks(&[plain.clone(), plain]);
        assert_eq!(body.matches("<!-- wp:paragraph -->").count(), 2);
        assert!(body.contains("-->\n\n<!--"));
    }
}
