//! Locale-aware generation over `.lg` resources
//!
//! Template files are named `{prefix}.{locale}.lg`, with `{prefix}.lg` as the
//! neutral fallback. [`LanguageGeneratorManager`] owns the parsed generators
//! and is handed to the host explicitly; calling
//! [`invalidate`](LanguageGeneratorManager::invalidate) after a resource change
//! forces the next lookup to reload.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{GenerationRequest, LanguageGenerator, TemplateGenerator};
use crate::errors::{DialogError, DialogResult};
use crate::resources::ResourceProvider;

/// Split `main.en-us.lg` into `("main", "en-us")`; neutral files yield `""`
pub fn parse_lg_file_name(file_name: &str) -> (String, String) {
    let Some(stem) = file_name.strip_suffix(".lg") else {
        return (file_name.to_string(), String::new());
    };
    match stem.rfind('.') {
        Some(dot) if dot > 0 => (stem[..dot].to_string(), stem[dot + 1..].to_lowercase()),
        _ => (stem.to_string(), String::new()),
    }
}

/// Fallback order used to pick a generator for a locale
#[derive(Debug, Clone, Default)]
pub struct LanguagePolicy {
    overrides: HashMap<String, Vec<String>>,
}

impl LanguagePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the fallback chain for one locale
    pub fn with_fallback(mut self, locale: &str, chain: Vec<String>) -> Self {
        self.overrides.insert(locale.to_lowercase(), chain);
        self
    }

    /// Locales to try, most specific first, ending with the neutral `""`
    ///
    /// `zh-hans-cn` yields `["zh-hans-cn", "zh-hans", "zh", ""]`.
    pub fn fallback_chain(&self, locale: &str) -> Vec<String> {
        let locale = locale.to_lowercase();
        if let Some(chain) = self.overrides.get(&locale) {
            return chain.clone();
        }
        let mut chain = Vec::new();
        let mut current = locale.as_str();
        while !current.is_empty() {
            chain.push(current.to_string());
            current = match current.rfind('-') {
                Some(dash) => &current[..dash],
                None => "",
            };
        }
        chain.push(String::new());
        chain
    }

    /// First locale of the chain that is available
    pub fn resolve<'a>(&self, locale: &str, available: impl IntoIterator<Item = &'a str> + Clone) -> Option<String> {
        self.fallback_chain(locale)
            .into_iter()
            .find(|candidate| available.clone().into_iter().any(|a| a == candidate))
    }
}

/// Dispatches to a per-locale generator through a [`LanguagePolicy`]
#[derive(Default, Clone)]
pub struct MultiLanguageGenerator {
    generators: HashMap<String, Arc<dyn LanguageGenerator>>,
    policy: LanguagePolicy,
}

impl MultiLanguageGenerator {
    pub fn new(policy: LanguagePolicy) -> Self {
        Self {
            generators: HashMap::new(),
            policy,
        }
    }

    /// Register the generator for a locale; `""` is the neutral fallback
    pub fn with_language(mut self, locale: &str, generator: Arc<dyn LanguageGenerator>) -> Self {
        self.generators.insert(locale.to_lowercase(), generator);
        self
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.generators.keys().map(String::as_str)
    }

    fn select(&self, locale: &str) -> Option<&Arc<dyn LanguageGenerator>> {
        let chosen = self.policy.resolve(locale, self.generators.keys().map(String::as_str))?;
        self.generators.get(&chosen)
    }
}

#[async_trait]
impl LanguageGenerator for MultiLanguageGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>, template: &str) -> DialogResult<String> {
        let generator = self.select(request.locale).ok_or_else(|| {
            DialogError::Generation(format!("no language generator for locale '{}'", request.locale))
        })?;
        generator.generate(request, template).await
    }
}

/// Loads and caches generators built from `.lg` resources
pub struct LanguageGeneratorManager {
    provider: Arc<dyn ResourceProvider>,
    policy: LanguagePolicy,
    cache: RwLock<HashMap<String, Arc<MultiLanguageGenerator>>>,
}

impl LanguageGeneratorManager {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        Self {
            provider,
            policy: LanguagePolicy::default(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: LanguagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Generator for every locale variant of `{prefix}.*.lg`
    pub async fn generator(&self, prefix: &str) -> DialogResult<Arc<MultiLanguageGenerator>> {
        if let Some(cached) = self.cache.read().await.get(prefix) {
            return Ok(cached.clone());
        }

        let mut generator = MultiLanguageGenerator::new(self.policy.clone());
        for resource in self.provider.get_resources("lg").await? {
            let (resource_prefix, locale) = parse_lg_file_name(resource.id());
            if resource_prefix != prefix {
                continue;
            }
            let text = resource.read_text().await?;
            let templates = TemplateGenerator::from_lg(&text)?;
            debug!(resource = resource.id(), locale = %locale, "loaded language resource");
            generator = generator.with_language(&locale, Arc::new(templates));
        }
        if generator.generators.is_empty() {
            return Err(DialogError::Resource(format!("no '.lg' resources found for '{prefix}'")));
        }

        let generator = Arc::new(generator);
        self.cache
            .write()
            .await
            .insert(prefix.to_string(), generator.clone());
        Ok(generator)
    }

    /// Drop every cached generator
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        info!(count = cache.len(), "invalidating language generators");
        cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::ExpressionEngine;
    use crate::resources::MemoryResourceProvider;
    use serde_json::json;

    #[test]
    fn test_parse_lg_file_name() {
        assert_eq!(parse_lg_file_name("main.en-US.lg"), ("main".into(), "en-us".into()));
        assert_eq!(parse_lg_file_name("main.lg"), ("main".into(), String::new()));
        assert_eq!(parse_lg_file_name("a.b.fr.lg"), ("a.b".into(), "fr".into()));
        assert_eq!(parse_lg_file_name("notes.txt"), ("notes.txt".into(), String::new()));
    }

    #[test]
    fn test_fallback_chain_shortens_tags() {
        let policy = LanguagePolicy::new();
        assert_eq!(policy.fallback_chain("zh-Hans-CN"), vec!["zh-hans-cn", "zh-hans", "zh", ""]);
        assert_eq!(policy.fallback_chain(""), vec![""]);
        assert_eq!(policy.resolve("en-gb", ["en", ""]), Some("en".to_string()));
        assert_eq!(policy.resolve("de-de", ["en"]), None);
    }

    #[tokio::test]
    async fn test_manager_loads_and_invalidates() {
        let provider = Arc::new(MemoryResourceProvider::new());
        provider.insert("main.lg", "# Hi\n- hello").await;
        provider.insert("main.fr.lg", "# Hi\n- bonjour").await;
        let manager = LanguageGeneratorManager::new(provider.clone());

        let generator = manager.generator("main").await.unwrap();
        let data = json!({});
        fn request<'a>(locale: &'a str, data: &'a serde_json::Value) -> GenerationRequest<'a> {
            GenerationRequest {
                locale,
                data,
                expressions: &ExpressionEngine,
            }
        }
        assert_eq!(generator.generate(&request("fr-ca", &data), "${Hi()}").await.unwrap(), "bonjour");
        assert_eq!(generator.generate(&request("en-us", &data), "${Hi()}").await.unwrap(), "hello");

        provider.insert("main.en.lg", "# Hi\n- hi there").await;
        let stale = manager.generator("main").await.unwrap();
        assert_eq!(stale.generate(&request("en-us", &data), "${Hi()}").await.unwrap(), "hello");

        manager.invalidate().await;
        let fresh = manager.generator("main").await.unwrap();
        assert_eq!(fresh.generate(&request("en-us", &data), "${Hi()}").await.unwrap(), "hi there");
        assert!(manager.generator("missing").await.is_err());
    }
}
