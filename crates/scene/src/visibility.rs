//! User-controlled z-order and visibility.

use std::collections::BTreeMap;

use foundation::ids::SliceId;

/// Z-order of slice ids; index 0 is the first entry and is drawn topmost
/// within its band by the compositor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerOrder {
    ids: Vec<SliceId>,
}

impl LayerOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id` unless present; existing entries never move.
    pub fn append_if_absent(&mut self, id: SliceId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Moves the entry at `from` to `to`, returning the moved id.
    pub fn move_slice(&mut self, from: usize, to: usize) -> Option<SliceId> {
        if from >= self.ids.len() || to >= self.ids.len() {
            return None;
        }
        let id = self.ids.remove(from);
        self.ids.insert(to, id);
        Some(id)
    }

    pub fn remove(&mut self, id: SliceId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|x| *x != id);
        self.ids.len() != before
    }

    pub fn position(&self, id: SliceId) -> Option<usize> {
        self.ids.iter().position(|x| *x == id)
    }

    pub fn as_slice(&self) -> &[SliceId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Slices affected by one visibility change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityChange {
    pub shown: Vec<SliceId>,
    pub hidden: Vec<SliceId>,
}

impl VisibilityChange {
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty() && self.hidden.is_empty()
    }
}

/// Visibility per slice with optional radio groups: showing a grouped slice
/// hides the other visible members of its group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilitySet {
    visible: BTreeMap<SliceId, bool>,
    groups: BTreeMap<SliceId, String>,
}

impl VisibilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// New slices start visible unless their group already has a visible member.
    pub fn register(&mut self, id: SliceId, group: Option<&str>) {
        match group {
            Some(g) => {
                self.groups.insert(id, g.to_string());
            }
            None => {
                self.groups.remove(&id);
            }
        }
        if self.visible.contains_key(&id) {
            return;
        }
        let taken = group.is_some_and(|g| self.visible_members(g).any(|other| other != id));
        self.visible.insert(id, !taken);
    }

    pub fn unregister(&mut self, id: SliceId) {
        self.visible.remove(&id);
        self.groups.remove(&id);
    }

    pub fn is_visible(&self, id: SliceId) -> bool {
        self.visible.get(&id).copied().unwrap_or(false)
    }

    fn visible_members<'a>(&'a self, group: &'a str) -> impl Iterator<Item = SliceId> + 'a {
        self.groups
            .iter()
            .filter(move |(id, g)| g.as_str() == group && self.is_visible(**id))
            .map(|(id, _)| *id)
    }

    pub fn set_visible(&mut self, id: SliceId, visible: bool) -> VisibilityChange {
        let mut change = VisibilityChange::default();
        if !self.visible.contains_key(&id) || self.is_visible(id) == visible {
            return change;
        }
        if visible {
            if let Some(group) = self.groups.get(&id) {
                let others: Vec<SliceId> = self
                    .visible_members(group)
                    .filter(|other| *other != id)
                    .collect();
                for other in others {
                    self.visible.insert(other, false);
                    change.hidden.push(other);
                }
            }
            change.shown.push(id);
        } else {
            change.hidden.push(id);
        }
        self.visible.insert(id, visible);
        change
    }

    pub fn toggle(&mut self, id: SliceId) -> VisibilityChange {
        let next = !self.is_visible(id);
        self.set_visible(id, next)
    }

    /// Visible ids in `order`.
    pub fn visible_in(&self, order: &LayerOrder) -> Vec<SliceId> {
        order
            .as_slice()
            .iter()
            .copied()
            .filter(|id| self.is_visible(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn order_is_append_only_and_movable() {
        let mut order = LayerOrder::new();
        assert!(order.append_if_absent(SliceId(1)));
        assert!(order.append_if_absent(SliceId(2)));
        assert!(!order.append_if_absent(SliceId(1)));
        order.append_if_absent(SliceId(3));
        assert_eq!(order.move_slice(2, 0), Some(SliceId(3)));
        assert_eq!(order.as_slice(), &[SliceId(3), SliceId(1), SliceId(2)]);
        assert_eq!(order.move_slice(5, 0), None);
    }

    #[test]
    fn radio_group_hides_siblings() {
        let mut vis = VisibilitySet::new();
        vis.register(SliceId(1), Some("g"));
        vis.register(SliceId(2), Some("g"));
        vis.register(SliceId(3), None);
        assert!(vis.is_visible(SliceId(1)));
        assert!(!vis.is_visible(SliceId(2)));
        assert!(vis.is_visible(SliceId(3)));

        let change = vis.set_visible(SliceId(2), true);
        assert_eq!(
            change,
            VisibilityChange {
                shown: vec![SliceId(2)],
                hidden: vec![SliceId(1)],
            }
        );
        assert!(!vis.is_visible(SliceId(1)));
        assert!(vis.is_visible(SliceId(3)));
    }

    #[test]
    fn ungrouped_toggles_are_independent() {
        let mut vis = VisibilitySet::new();
        vis.register(SliceId(1), None);
        vis.register(SliceId(2), None);
        assert_eq!(vis.toggle(SliceId(1)).hidden, vec![SliceId(1)]);
        assert!(vis.set_visible(SliceId(1), false).is_empty());
        assert!(vis.is_visible(SliceId(2)));

        let mut order = LayerOrder::new();
        order.append_if_absent(SliceId(1));
        order.append_if_absent(SliceId(2));
        assert_eq!(vis.visible_in(&order), vec![SliceId(2)]);
    }
}
