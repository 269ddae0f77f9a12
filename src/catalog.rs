use serde::Serialize;

use crate::gemini::{GENERATE_CONTENT, RawModel};

/// Sort key for models missing from the priority table.
const UNLISTED_PRIORITY: u32 = 10;

/// A model offered to clients for AI post generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub full_name: String,
}

/// Keep generation-capable models, label them, and order by preference.
/// The sort is stable, so equal priorities keep catalog order.
pub fn rank_models(raw: Vec<RawModel>) -> Vec<ModelInfo> {
    let mut models: Vec<ModelInfo> = raw
        .into_iter()
        .filter(|m| m.supported_generation_methods.iter().any(|g| g == GENERATE_CONTENT))
        .map(|m| {
            let id = m.name.strip_prefix("models/").unwrap_or(&m.name).to_string();
            ModelInfo {
                name: display_name(&id),
                description: description(&id).to_string(),
                full_name: m.name,
                id,
            }
        })
        .collect();

    models.sort_by_key(|m| priority(&m.id));
    models
}

fn display_name(id: &str) -> String {
    match id {
        "gemini-1.5-pro-latest" => "Gemini 1.5 Pro (Latest)".to_string(),
        "gemini-1.5-pro" => "Gemini 1.5 Pro".to_string(),
        "gemini-1.5-flash-latest" => "Gemini 1.5 Flash (Latest)".to_string(),
        "gemini-1.5-flash" => "Gemini 1.5 Flash".to_string(),
        "gemini-pro" => "Gemini Pro".to_string(),
        "gemini-1.0-pro" => "Gemini 1.0 Pro".to_string(),
        other => titleize(other),
    }
}

fn description(id: &str) -> &'static str {
    match id {
        "gemini-1.5-pro-latest" => "Most capable model with latest improvements",
        "gemini-1.5-pro" => "Most capable model for complex tasks",
        "gemini-1.5-flash-latest" => "Fast and efficient with latest updates",
        "gemini-1.5-flash" => "Fast and efficient for most tasks",
        "gemini-pro" => "Balanced performance and capability",
        "gemini-1.0-pro" => "Original Gemini Pro model",
        _ => "Google Gemini AI model",
    }
}

/// Lower sorts first.
fn priority(id: &str) -> u32 {
    match id {
        "gemini-1.5-flash-latest" => 1,
        "gemini-1.5-flash" => 2,
        "gemini-1.5-pro-latest" => 3,
        "gemini-1.5-pro" => 4,
        "gemini-pro" => 5,
        "gemini-1.0-pro" => 6,
        _ => UNLISTED_PRIORITY,
    }
}

/// `gemini-2.0-flash` -> `Gemini 2.0 Flash`
fn titleize(id: &str) -> String {
    id.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, methods: &[&str]) -> RawModel {
        RawModel {
            name: name.to_string(),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn sorts_by_priority_with_unknown_last() {
        let ranked = rank_models(vec![
            raw("models/gemini-pro", &["generateContent"]),
            raw("models/gemini-1.5-flash-latest", &["generateContent"]),
            raw("models/unknown-model", &["generateContent"]),
        ]);
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["gemini-1.5-flash-latest", "gemini-pro", "unknown-model"]);
    }

    #[test]
    fn unlisted_models_keep_catalog_order() {
        let ranked = rank_models(vec![
            raw("models/zeta", &["generateContent"]),
            raw("models/alpha", &["generateContent"]),
            raw("models/gemini-1.0-pro", &["generateContent"]),
        ]);
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["gemini-1.0-pro", "zeta", "alpha"]);
    }

    #[test]
    fn filters_out_models_without_generate_content() {
        let ranked = rank_models(vec![
            raw("models/embedding-001", &["embedContent"]),
            raw("models/aqa", &[]),
            raw("models/gemini-1.5-pro", &["countTokens", "generateContent"]),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "gemini-1.5-pro");
        assert_eq!(ranked[0].full_name, "models/gemini-1.5-pro");
    }

    #[test]
    fn labels_known_and_unknown_models() {
        let ranked = rank_models(vec![
            raw("models/gemini-1.5-flash", &["generateContent"]),
            raw("models/gemini-2.0-flash-exp", &["generateContent"]),
        ]);
        assert_eq!(ranked[0].name, "Gemini 1.5 Flash");
        assert_eq!(ranked[0].description, "Fast and efficient for most tasks");
        assert_eq!(ranked[1].name, "Gemini 2.0 Flash Exp");
        assert_eq!(ranked[1].description, "Google Gemini AI model");
    }
}
