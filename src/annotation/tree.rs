//! Annotation trees and VesselVio annotation files.
//!
//! A tree is nested JSON: every region has an id, a name, a hex colour and a
//! list of children (the Allen Institute ontology layout). Selecting a region
//! selects its whole family, i.e. the region and all of its descendants.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Top-level key of a saved annotation file.
pub const ANNOTATION_FILE_KEY: &str = "VesselVio Annotations";

/// JSON keys used to read an annotation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeKeys {
    pub name: String,
    pub children: String,
    pub color: String,
    pub id: String,
}

impl Default for TreeKeys {
    fn default() -> Self {
        Self {
            name: "name".into(),
            children: "children".into(),
            color: "color_hex_triplet".into(),
            id: "id".into(),
        }
    }
}

/// Ids and colours of a region and its descendants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiFamily {
    pub colors: Vec<String>,
    pub ids: Vec<i64>,
}

/// Selected regions, in selection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationData {
    pub regions: Vec<(String, RoiFamily)>,
}

impl AnnotationData {
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|(n, _)| n.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&RoiFamily> {
        self.regions.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }
}

fn node_children<'a>(node: &'a Value, keys: &TreeKeys) -> &'a [Value] {
    node.get(&keys.children)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn node_id(node: &Value, keys: &TreeKeys) -> Result<i64> {
    let v = node
        .get(&keys.id)
        .ok_or_else(|| Error::Annotation(format!("region without '{}'", keys.id)))?;
    v.as_i64()
        .or_else(|| v.as_f64().map(|f| f as i64))
        .ok_or_else(|| Error::Annotation(format!("invalid region id {}", v)))
}

fn node_color(node: &Value, keys: &TreeKeys) -> String {
    node.get(&keys.color)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Append the ids and colours of every descendant of `children`.
pub fn find_children(children: &[Value], family: &mut RoiFamily, keys: &TreeKeys) -> Result<()> {
    for child in children {
        family.ids.push(node_id(child, keys)?);
        family.colors.push(node_color(child, keys));
        find_children(node_children(child, keys), family, keys)?;
    }
    Ok(())
}

/// Depth-first search for `region_name`; returns the family of the first
/// match. Colours are deduplicated.
pub fn find_family(tree: &[Value], region_name: &str, keys: &TreeKeys) -> Result<Option<RoiFamily>> {
    for node in tree {
        if node.get(&keys.name).and_then(Value::as_str) == Some(region_name) {
            let mut family = RoiFamily {
                ids: vec![node_id(node, keys)?],
                colors: vec![node_color(node, keys)],
            };
            find_children(node_children(node, keys), &mut family, keys)?;
            let mut unique: Vec<String> = Vec::with_capacity(family.colors.len());
            for c in family.colors.drain(..) {
                if !unique.contains(&c) {
                    unique.push(c);
                }
            }
            family.colors = unique;
            return Ok(Some(family));
        }
        if let Some(found) = find_family(node_children(node, keys), region_name, keys)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Top-level regions of a tree file. Accepts the Allen API envelope
/// (`{"msg": [root]}`), a root node, or a bare list of regions.
pub fn load_tree(path: &Path, keys: &TreeKeys) -> Result<Vec<Value>> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let root = match &value {
        Value::Object(obj) => match obj.get("msg").and_then(Value::as_array) {
            Some(msg) => msg.first().cloned().unwrap_or(Value::Null),
            None => value.clone(),
        },
        Value::Array(list) => return Ok(list.clone()),
        _ => return Err(Error::Annotation("annotation tree must be a JSON object".into())),
    };
    Ok(node_children(&root, keys).to_vec())
}

/// Resolve region names against a tree file.
pub fn convert_annotation_data(regions: &[String], tree_file: &Path, keys: &TreeKeys) -> Result<AnnotationData> {
    let tree = load_tree(tree_file, keys)?;
    let mut data = AnnotationData::default();
    for region in regions {
        let family = find_family(&tree, region, keys)?
            .ok_or_else(|| Error::Annotation(format!("region '{}' not found in annotation tree", region)))?;
        data.regions.push((region.clone(), family));
    }
    Ok(data)
}

/// Load a saved annotation file (`{"VesselVio Annotations": {...}}`).
pub fn load_vesselvio_annotation_file(path: &Path) -> Result<AnnotationData> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let regions = value
        .get(ANNOTATION_FILE_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Annotation(format!("missing '{}' key", ANNOTATION_FILE_KEY)))?;
    let mut data = AnnotationData::default();
    for (name, family) in regions {
        data.regions
            .push((name.clone(), serde_json::from_value(family.clone())?));
    }
    Ok(data)
}

/// True when `path` is a saved annotation file rather than a tree.
pub fn is_vesselvio_annotation_file(path: &Path) -> bool {
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    is_json
        && fs::read_to_string(path)
            .ok()
            .and_then(|t| serde_json::from_str::<Value>(&t).ok())
            .map_or(false, |v| v.get(ANNOTATION_FILE_KEY).is_some())
}

pub fn save_vesselvio_annotation_file(data: &AnnotationData, path: &Path) -> Result<()> {
    let mut regions = Map::new();
    for (name, family) in &data.regions {
        regions.insert(name.clone(), serde_json::to_value(family)?);
    }
    let mut root = Map::new();
    root.insert(ANNOTATION_FILE_KEY.to_string(), Value::Object(regions));
    fs::write(path, serde_json::to_string_pretty(&Value::Object(root))?)?;
    Ok(())
}

/// Hex colours used by more than one selected region. RGB analyses of such
/// regions would mix their vessels.
pub fn rgb_duplicates_check(data: &AnnotationData) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut duplicates: Vec<String> = Vec::new();
    for (_, family) in &data.regions {
        for color in &family.colors {
            if seen.contains(&color.as_str()) {
                if !duplicates.contains(color) {
                    duplicates.push(color.clone());
                }
            } else {
                seen.push(color);
            }
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_tree() -> Value {
        json!({
            "id": 997, "name": "root", "color_hex_triplet": "FFFFFF",
            "children": [
                {
                    "id": 8, "name": "Brain", "color_hex_triplet": "BFDAE3",
                    "children": [
                        {"id": 567, "name": "Cerebrum", "color_hex_triplet": "B0F0FF", "children": [
                            {"id": 688, "name": "Cortex", "color_hex_triplet": "B0FFB8", "children": []}
                        ]},
                        {"id": 343, "name": "Brain stem", "color_hex_triplet": "FF7080", "children": []}
                    ]
                },
                {"id": 73, "name": "Ventricles", "color_hex_triplet": "B0FFB8", "children": []}
            ]
        })
    }

    #[test]
    fn test_find_family_collects_descendants() {
        let keys = TreeKeys::default();
        let tree = node_children(&sample_tree(), &keys).to_vec();
        let family = find_family(&tree, "Brain", &keys).unwrap().unwrap();
        assert_eq!(family.ids, vec![8, 567, 688, 343]);
        assert_eq!(family.colors.len(), 4);

        let leaf = find_family(&tree, "Cortex", &keys).unwrap().unwrap();
        assert_eq!(leaf.ids, vec![688]);
        assert!(find_family(&tree, "Spleen", &keys).unwrap().is_none());
    }

    #[test]
    fn test_convert_and_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tree.json");
        fs::write(&path, json!({"msg": [sample_tree()]}).to_string()).unwrap();

        let regions = vec!["Cerebrum".to_string(), "Ventricles".to_string()];
        let data = convert_annotation_data(&regions, &path, &TreeKeys::default()).unwrap();
        assert_eq!(data.names().collect::<Vec<_>>(), vec!["Cerebrum", "Ventricles"]);
        assert_eq!(rgb_duplicates_check(&data), vec!["B0FFB8".to_string()]);

        let missing = convert_annotation_data(&["Nope".to_string()], &path, &TreeKeys::default());
        assert!(matches!(missing, Err(Error::Annotation(_))));
    }

    #[test]
    fn test_annotation_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("annotations.json");
        let data = AnnotationData {
            regions: vec![
                ("Eye".to_string(), RoiFamily { colors: vec!["190000".into()], ids: vec![1] }),
                ("Arm".to_string(), RoiFamily { colors: vec!["00FF00".into()], ids: vec![2, 3] }),
            ],
        };
        save_vesselvio_annotation_file(&data, &path).unwrap();
        assert!(is_vesselvio_annotation_file(&path));
        let loaded = load_vesselvio_annotation_file(&path).unwrap();
        assert_eq!(loaded, data);
    }
}
