//! Interaction events raised by layer callbacks.
//!
//! Factories only see `LayerCallbacks`; the dashboard wires those to an
//! unbounded channel and drains it explicitly, so no callback touches scene
//! state directly.

use catalog::Filter;
use foundation::ids::SliceId;
use layers::{LayerCallbacks, RegionClick, Tooltip};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    RegionClicked(RegionClick),
    Tooltip(Option<Tooltip>),
    AddFilter { slice_id: SliceId, filter: Filter },
}

/// Callbacks that forward into `tx`. Sends after the receiver is gone are dropped.
pub fn channel_callbacks(tx: &UnboundedSender<SceneEvent>) -> LayerCallbacks {
    let (filters, tooltips, clicks) = (tx.clone(), tx.clone(), tx.clone());
    LayerCallbacks {
        add_filter: Some(std::sync::Arc::new(move |slice_id: SliceId, filter: Filter| {
            let _ = filters.send(SceneEvent::AddFilter { slice_id, filter });
        })),
        set_tooltip: Some(std::sync::Arc::new(move |tip: Option<Tooltip>| {
            let _ = tooltips.send(SceneEvent::Tooltip(tip));
        })),
        on_click: Some(std::sync::Arc::new(move |click: RegionClick| {
            let _ = clicks.send(SceneEvent::RegionClicked(click));
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn callbacks_forward_in_order() {
        let (tx, mut rx) = unbounded_channel();
        let cb = channel_callbacks(&tx);
        cb.set_tooltip(None);
        cb.add_filter(SliceId(1), Filter::eq("region", "A"));
        cb.click(RegionClick {
            slice_id: SliceId(1),
            region_key: "A".into(),
            region_name: None,
        });

        assert_eq!(rx.try_recv().unwrap(), SceneEvent::Tooltip(None));
        assert!(matches!(rx.try_recv().unwrap(), SceneEvent::AddFilter { .. }));
        assert!(matches!(rx.try_recv().unwrap(), SceneEvent::RegionClicked(_)));
        assert!(rx.try_recv().is_err());

        drop(rx);
        cb.set_tooltip(None);
    }
}
