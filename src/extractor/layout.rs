//! Site and page layout walk: sections → rows → cards.
//!
//! Only the card kinds listed in [`CardKind`] reference other items. Any other
//! component name is [`CardKind::Unknown`] and contributes nothing, so layouts
//! written by newer site editors still extract cleanly.

use serde::Deserialize;
use serde_json::Value;

use super::{push_str_id, push_unique};
use crate::core::ExtendedId;

/// A layout document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Layout {
    /// Top-level sections, in display order
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// One layout section. Section backgrounds never reference items.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    /// Rows of the section
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// One row of cards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Row {
    /// Cards of the row
    #[serde(default)]
    pub cards: Vec<Card>,
}

/// One card.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Card {
    /// The card's component
    #[serde(default)]
    pub component: Component,
}

/// Component name and its settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Component {
    /// Component name, e.g. `webmap-card`
    #[serde(default)]
    pub name: String,
    /// Component settings
    #[serde(default)]
    pub settings: Value,
}

/// Card kinds that carry item references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    /// `settings.itemId`
    ItemCard,
    /// `settings.webmap`
    MapCard,
    /// `settings.ids[]`
    Gallery,
    /// `settings.initiativeId`
    FollowButton,
    /// `settings.initiativeIds[]`
    EventList,
    /// Anything else
    Unknown,
}

impl CardKind {
    /// Classify a component name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "chart-card" | "summary-statistic-card" | "app-card" => Self::ItemCard,
            "webmap-card" | "map-card" => Self::MapCard,
            "items/gallery-card" => Self::Gallery,
            "follow-initiative-button" => Self::FollowButton,
            "event-list-card" => Self::EventList,
            _ => Self::Unknown,
        }
    }
}

fn push_id_list(ids: &mut Vec<ExtendedId>, list: Option<&Value>) {
    for value in list.and_then(Value::as_array).into_iter().flatten() {
        push_str_id(ids, Some(value));
    }
}

impl Card {
    fn collect(&self, ids: &mut Vec<ExtendedId>) {
        let settings = &self.component.settings;
        match CardKind::from_name(&self.component.name) {
            CardKind::ItemCard => push_str_id(ids, settings.get("itemId")),
            CardKind::MapCard => push_str_id(ids, settings.get("webmap")),
            CardKind::Gallery => push_id_list(ids, settings.get("ids")),
            CardKind::FollowButton => push_str_id(ids, settings.get("initiativeId")),
            CardKind::EventList => push_id_list(ids, settings.get("initiativeIds")),
            CardKind::Unknown => {}
        }
    }
}

impl Layout {
    /// Item ids referenced by the layout's cards, deduplicated in encounter order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<ExtendedId> {
        let mut ids = Vec::new();
        for card in self.sections.iter().flat_map(|s| &s.rows).flat_map(|r| &r.cards) {
            card.collect(&mut ids);
        }
        ids
    }
}

/// Dependencies of a raw layout document.
///
/// Sections that do not have the expected shape are skipped individually.
#[must_use]
pub fn extract_layout_dependencies(layout: &Value) -> Vec<ExtendedId> {
    let mut ids = Vec::new();
    for raw in layout.get("sections").and_then(Value::as_array).into_iter().flatten() {
        match Section::deserialize(raw) {
            Ok(section) => {
                let layout = Layout { sections: vec![section] };
                for id in layout.dependencies() {
                    push_unique(&mut ids, id);
                }
            }
            Err(e) => tracing::debug!("Skipping malformed layout section: {e}"),
        }
    }
    ids
}
