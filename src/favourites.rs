//! Session-scoped favourites. Nothing here survives a restart.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FavouriteTarget {
    Stop {
        #[serde(rename = "stopId")]
        stop_id: String,
    },
    Bus {
        line: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favourite {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub target: FavouriteTarget,
}

impl Favourite {
    pub fn stop(id: impl Into<String>, title: impl Into<String>, stop_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            icon: None,
            target: FavouriteTarget::Stop {
                stop_id: stop_id.into(),
            },
        }
    }

    pub fn bus(id: impl Into<String>, title: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            icon: None,
            target: FavouriteTarget::Bus { line: line.into() },
        }
    }
}

/// Favourites in the order they were added, unique by id.
#[derive(Debug, Default, Clone)]
pub struct Favourites {
    items: Vec<Favourite>,
}

impl Favourites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> &[Favourite] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|f| f.id == id)
    }

    /// Returns false and leaves the list alone if the id is already present.
    pub fn add(&mut self, favourite: Favourite) -> bool {
        if self.contains(&favourite.id) {
            return false;
        }
        self.items.push(favourite);
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|f| f.id != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
