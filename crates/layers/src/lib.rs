//! Layer production: the immutable `Layer` value, symbology, the factory
//! registry with its two region factories, and legend derivation.

pub mod choropleth;
pub mod feed;
pub mod labels;
pub mod layer;
pub mod legend;
pub mod options;
pub mod registry;
pub mod symbology;

pub use choropleth::ChoroplethFactory;
pub use feed::{FeedFactory, feed_entries, region_entries};
pub use labels::*;
pub use layer::*;
pub use legend::*;
pub use options::*;
pub use registry::*;
pub use symbology::*;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use catalog::Record;
    use serde_json::{Value, json};
    use streaming::{RegionGeometry, parse_region_geometry};

    /// Collects callback arguments.
    #[derive(Clone)]
    pub struct Recorder<T>(Arc<Mutex<Vec<T>>>);

    impl<T> Default for Recorder<T> {
        fn default() -> Self {
            Recorder(Arc::new(Mutex::new(Vec::new())))
        }
    }

    impl<T> Recorder<T> {
        pub fn push(&self, v: T) {
            self.0.lock().unwrap().push(v);
        }

        pub fn take(&self) -> Vec<T> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    fn square(key: &str, x0: f64) -> Value {
        json!({
            "type": "Feature",
            "properties": {"iso": key, "name": format!("Region {key}")},
            "geometry": {"type": "Polygon", "coordinates": [[
                [x0, 0.0], [x0 + 2.0, 0.0], [x0 + 2.0, 2.0], [x0, 2.0]
            ]]}
        })
    }

    /// Three 2x2 squares keyed A, B, C at x = 0, 10, 20.
    pub fn geometry() -> Arc<RegionGeometry> {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [square("A", 0.0), square("B", 10.0), square("C", 20.0)]
        });
        Arc::new(parse_region_geometry("xx", &doc).unwrap())
    }

    pub fn rows(v: Value) -> Arc<Vec<Record>> {
        Arc::new(
            v.as_array()
                .unwrap()
                .iter()
                .map(|r| r.as_object().cloned().unwrap())
                .collect(),
        )
    }
}
