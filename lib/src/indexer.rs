//! Tokenization and inverted-index construction (SPEC_FULL.md §4.3). Fully
//! deterministic from the graph state; never maintained incrementally.

use crate::model::Entity;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn non_token_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Word characters, whitespace, and hyphen survive; everything else
    // becomes a space. Hyphens are deliberately kept inside tokens, so
    // "docker-compose" tokenizes as one token.
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("tokenizer regex is valid"))
}

/// Normative tokenization rule: lowercase, collapse non-word/non-hyphen
/// characters to spaces, split on whitespace, drop tokens of length <= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = non_token_chars().replace_all(&lowered, " ");
    cleaned
        .split_whitespace()
        .filter(|token| token.len() > 2)
        .map(|token| token.to_string())
        .collect()
}

/// The text indexed for an entity: name, type, and every observation,
/// space-joined, in that order.
pub fn indexed_text(entity: &Entity) -> String {
    let mut parts = Vec::with_capacity(2 + entity.observations.len());
    parts.push(entity.name.as_str());
    parts.push(entity.entity_type.as_str());
    for observation in &entity.observations {
        parts.push(observation.as_str());
    }
    parts.join(" ")
}

/// Rebuild the name index and inverted index from scratch.
pub fn build(
    entities: &[Entity],
) -> (HashMap<String, usize>, HashMap<String, HashSet<String>>) {
    let mut name_index = HashMap::with_capacity(entities.len());
    let mut inverted_index: HashMap<String, HashSet<String>> = HashMap::new();

    for (idx, entity) in entities.iter().enumerate() {
        name_index.insert(entity.name.clone(), idx);
        let text = indexed_text(entity);
        for token in tokenize(&text) {
            inverted_index
                .entry(token)
                .or_default()
                .insert(entity.name.clone());
        }
    }

    (name_index, inverted_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits() {
        let tokens = tokenize("Docker Compose And Kubernetes");
        assert_eq!(tokens, vec!["docker", "compose", "and", "kubernetes"]);
    }

    #[test]
    fn tokenize_keeps_hyphenated_tokens_whole() {
        let tokens = tokenize("Uses docker-compose for orchestration");
        assert!(tokens.contains(&"docker-compose".to_string()));
    }

    #[test]
    fn tokenize_drops_short_tokens() {
        let tokens = tokenize("a an to it container");
        assert_eq!(tokens, vec!["container"]);
    }

    #[test]
    fn tokenize_replaces_punctuation_with_spaces() {
        let tokens = tokenize("scope_management, timeline-feature! zoom/api");
        assert_eq!(
            tokens,
            vec!["scope_management", "timeline-feature", "zoom", "api"]
        );
    }

    #[test]
    fn build_indexes_name_type_and_observations() {
        let mut entity = Entity::new("zoom-api-integration", "service");
        entity.observations.push("handles oauth tokens".to_string());
        let (names, inverted) = build(&[entity]);
        assert_eq!(names.get("zoom-api-integration"), Some(&0));
        assert!(inverted
            .get("oauth")
            .unwrap()
            .contains("zoom-api-integration"));
        assert!(inverted
            .get("service")
            .unwrap()
            .contains("zoom-api-integration"));
    }
}
