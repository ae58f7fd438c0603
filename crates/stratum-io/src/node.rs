//! JSON description of a geometry: a tree of tagged object nodes.
//!
//! ```json
//! {
//!   "settings": { "draft": false },
//!   "geometries": [
//!     { "type": "cartesian2d", "name": "main", "length": 10.0,
//!       "root": { "type": "stack", "children": [
//!         { "type": "rectangle", "size": [1.0, 0.2], "material": "GaAs", "path": "top" },
//!         { "type": "rectangle", "size": [1.0, 1.0], "material": "AlAs",
//!           "item": { "align": "center" } }
//!       ] } }
//!   ]
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ReaderError, Result};

/// Options of one reading session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Replace unknown materials with dummy ones and allow leaves without material.
    pub draft: bool,
    /// Default for arrange containers without their own `warn` attribute.
    pub warn_overlapping: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            draft: false,
            warn_overlapping: true,
        }
    }
}

/// A geometry object: its tag, common attributes and children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectNode {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Comma separated roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildNode>,
    /// Kind-specific attributes.
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

/// A child together with what its parent needs to place it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildNode {
    /// Name of the path hints the placement is registered in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Placement attributes read by the parent (translation, aligner).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub item: Map<String, Value>,
    #[serde(flatten)]
    pub object: ObjectNode,
}

fn parse_attr<T: DeserializeOwned>(tag: &str, map: &Map<String, Value>, key: &str) -> Result<Option<T>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ReaderError::bad_attribute(tag, key, e)),
    }
}

impl ObjectNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            name: None,
            role: None,
            children: Vec::new(),
            attrs: Map::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_child(mut self, child: ObjectNode) -> Self {
        self.children.push(ChildNode::new(child));
        self
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn attr<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        parse_attr(&self.tag, &self.attrs, key)
    }

    pub fn attr_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.attr(key)?.unwrap_or(default))
    }

    pub fn require_attr<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.attr(key)?.ok_or_else(|| ReaderError::MissingAttribute {
            tag: self.tag.clone(),
            attr: key.to_string(),
        })
    }

    /// Roles listed in the `role` attribute.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.role
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

impl ChildNode {
    pub fn new(object: ObjectNode) -> Self {
        Self {
            path: None,
            item: Map::new(),
            object,
        }
    }

    pub fn item_attr<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        parse_attr(&self.object.tag, &self.item, key)
    }
}

/// Kind of a top-level geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    /// 2D object extruded along the longitudinal axis.
    Cartesian2d,
    /// 2D object revolved around the vertical axis.
    Cylindrical,
    Cartesian3d,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryNode {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Extrusion length of a `cartesian2d` geometry; infinite when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    pub root: ObjectNode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryDocument {
    #[serde(default)]
    pub settings: ReaderSettings,
    #[serde(default)]
    pub geometries: Vec<GeometryNode>,
}
