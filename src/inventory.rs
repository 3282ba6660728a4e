// src/inventory.rs

//! Image inventory indexing
//!
//! Converts the raw decoded response of the NFVIS image-listing query into a
//! lookup keyed by image name. The listing shape is
//! `{"vmlc:images": {"image": [{"name": ..., "src": ...}, ...]}}`, but a host
//! with zero images may omit the nested field entirely or report it with an
//! unexpected type. Every structural surprise degrades to an empty index —
//! on this API an absent field is indistinguishable from "no images", so a
//! malformed listing is never an error.

use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// A single image registration as reported by the host
///
/// Owned by the remote management system; the reconciler only reads these
/// and requests mutation through the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub name: String,
    /// URI locating the backing file on the host, e.g.
    /// `file:///data/intdatastore/uploads/asav.tar.gz`
    pub src: String,
}

impl ImageRecord {
    /// Path of the backing file on the host, with the URI scheme stripped
    ///
    /// Returns the substring after the first `://`, or the whole value when
    /// no scheme is present.
    pub fn backing_file(&self) -> &str {
        match self.src.split_once("://") {
            Some((_, path)) => path,
            None => &self.src,
        }
    }
}

/// Name-keyed index over the host's image inventory
///
/// Built fresh from a live listing on every run. Keys are unique; if the
/// host ever reported a duplicate name the last entry would win.
#[derive(Debug, Default)]
pub struct InventoryIndex {
    images: HashMap<String, ImageRecord>,
}

impl InventoryIndex {
    /// Build an index from a decoded listing response
    ///
    /// This parse is total: entries missing a string `name` are skipped, and
    /// a listing that is not a mapping or lacks the nested image array yields
    /// an empty index.
    pub fn from_listing(listing: &Value) -> Self {
        let mut images = HashMap::new();

        let entries = listing
            .get("vmlc:images")
            .and_then(|v| v.get("image"))
            .and_then(Value::as_array);

        if let Some(entries) = entries {
            for entry in entries {
                let Some(name) = entry.get("name").and_then(Value::as_str) else {
                    debug!("skipping inventory entry without a name: {}", entry);
                    continue;
                };
                let src = entry
                    .get("src")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                images.insert(
                    name.to_string(),
                    ImageRecord {
                        name: name.to_string(),
                        src,
                    },
                );
            }
        } else {
            debug!("listing has no interpretable image array, treating as empty inventory");
        }

        Self { images }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ImageRecord> {
        self.images.get(name)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
