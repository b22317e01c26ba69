//! Dashboard slice catalog: the configuration records the scene is built from.

pub mod config;
pub mod record;
pub mod slice;
pub mod store;

pub use config::*;
pub use record::*;
pub use slice::*;
pub use store::*;

/// Content fingerprint of any serializable value (hex blake3 of its JSON form).
///
/// Used to detect configuration changes without deep comparisons.
pub fn fingerprint<T: serde::Serialize>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::fingerprint;
    use serde_json::json;

    #[test]
    fn fingerprint_tracks_content() {
        let a = fingerprint(&json!({"metric": "cases"}));
        let b = fingerprint(&json!({"metric": "cases"}));
        let c = fingerprint(&json!({"metric": "deaths"}));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
