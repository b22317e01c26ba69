use std::collections::BTreeMap;
use std::sync::Arc;

use catalog::viz;
use tracing::warn;

use crate::choropleth::ChoroplethFactory;
use crate::feed::FeedFactory;
use crate::layer::Layer;
use crate::options::LayerOptions;

/// Turns one slice's options into zero or more layers.
///
/// Implementations must be pure with respect to `options`; side effects go
/// through `options.callbacks` only.
pub trait LayerFactory: Send + Sync {
    fn produce(&self, options: &LayerOptions) -> Vec<Layer>;
}

/// Dispatch table keyed by visualization-type tag.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: BTreeMap<String, Arc<dyn LayerFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the region-choropleth and region-feed entries.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        r.register(viz::REGION_CHOROPLETH, Arc::new(ChoroplethFactory));
        r.register(viz::REGION_FEED, Arc::new(FeedFactory));
        r
    }

    /// Registers `factory` under `tag`, replacing any previous entry.
    pub fn register(&mut self, tag: impl Into<String>, factory: Arc<dyn LayerFactory>) {
        self.factories.insert(tag.into(), factory);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Unknown tags produce no layers.
    pub fn produce(&self, tag: &str, options: &LayerOptions) -> Vec<Layer> {
        match self.factories.get(tag) {
            Some(f) => f.produce(options),
            None => {
                warn!(tag, slice = %options.slice_id, "no layer factory for visualization type");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerData, LayerId, LayerKind};
    use catalog::SliceConfig;
    use foundation::ids::SliceId;
    use serde_json::Value;

    struct Fixed;

    impl LayerFactory for Fixed {
        fn produce(&self, options: &LayerOptions) -> Vec<Layer> {
            vec![Layer::new(
                LayerId::new(options.slice_id, "text"),
                options.slice_id,
                LayerKind::Text,
                "fixed",
                LayerData::Text(Vec::new()),
            )]
        }
    }

    fn options() -> LayerOptions {
        LayerOptions::new(
            SliceId(1),
            SliceConfig::default(),
            Arc::new(Value::Null),
            Arc::new(Vec::new()),
        )
    }

    #[test]
    fn unknown_tag_yields_nothing() {
        let r = FactoryRegistry::with_defaults();
        assert!(r.produce("sankey", &options()).is_empty());
        assert!(!r.contains("sankey"));
        assert_eq!(r.tags().collect::<Vec<_>>(), vec!["region_choropleth", "region_feed"]);
    }

    #[test]
    fn registry_is_open_for_new_tags() {
        let mut r = FactoryRegistry::new();
        r.register("fixed", Arc::new(Fixed));
        assert_eq!(r.produce("fixed", &options()).len(), 1);
    }
}
