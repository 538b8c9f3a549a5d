pub mod adapter;
pub mod cex;
pub mod dex;
pub mod http;
pub mod types;

use std::sync::Arc;

use crate::venue::adapter::VenueAdapter;
use crate::venue::cex::CexAdapter;
use crate::venue::dex::DexAdapter;

/// Enumerated variant registry replacing dynamic dispatch-by-class-name.
/// Adding a new venue family means adding a variant here, not reflecting
/// over a class hierarchy.
#[derive(Clone)]
pub enum AnyVenueAdapter {
    Cex(Arc<CexAdapter>),
    Dex(Arc<DexAdapter>),
}

impl AnyVenueAdapter {
    pub fn as_trait(&self) -> Arc<dyn VenueAdapter> {
        match self {
            AnyVenueAdapter::Cex(a) => a.clone() as Arc<dyn VenueAdapter>,
            AnyVenueAdapter::Dex(a) => a.clone() as Arc<dyn VenueAdapter>,
        }
    }
}

/// Registry of every configured adapter, keyed by venue_id.
#[derive(Clone, Default)]
pub struct VenueRegistry {
    adapters: std::collections::HashMap<String, AnyVenueAdapter>,
}

impl VenueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, venue_id: impl Into<String>, adapter: AnyVenueAdapter) {
        self.adapters.insert(venue_id.into(), adapter);
    }

    pub fn get(&self, venue_id: &str) -> Option<Arc<dyn VenueAdapter>> {
        self.adapters.get(venue_id).map(AnyVenueAdapter::as_trait)
    }

    pub fn all(&self) -> impl Iterator<Item = (&String, Arc<dyn VenueAdapter>)> {
        self.adapters.iter().map(|(id, a)| (id, a.as_trait()))
    }

    pub fn dex_adapters(&self) -> impl Iterator<Item = Arc<DexAdapter>> + '_ {
        self.adapters.values().filter_map(|a| match a {
            AnyVenueAdapter::Dex(d) => Some(d.clone()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
