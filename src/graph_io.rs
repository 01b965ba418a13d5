//! Loading pre-built vessel graphs and saving analysed ones.
//!
//! Graphs come either as GraphML or as a pair of delimited files (one row per
//! vertex, one row per edge). Input coordinates are `X, Y, Z`; internally they
//! are stored as `[z, y, x]`.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use roxmltree::Document;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::features::GraphType;
use crate::graph::{EdgeAttrs, Vertex, VesselGraph};
use crate::volume::Resolution;

/// Names of the vertex and edge attributes (or CSV columns) to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeKey {
    pub x: String,
    pub y: String,
    pub z: String,
    pub vertex_radius: String,
    pub edge_radius: String,
    pub length: String,
    pub volume: String,
    pub surface_area: String,
    pub tortuosity: String,
    /// CSV only.
    pub edge_source: String,
    /// CSV only.
    pub edge_target: String,
    pub edge_hex: Option<String>,
}

impl Default for AttributeKey {
    fn default() -> Self {
        Self {
            x: "X".into(),
            y: "Y".into(),
            z: "Z".into(),
            vertex_radius: "radius".into(),
            edge_radius: "radius_avg".into(),
            length: "length".into(),
            volume: "volume".into(),
            surface_area: "surface_area".into(),
            tortuosity: "tortuosity".into(),
            edge_source: "Source ID".into(),
            edge_target: "Target ID".into(),
            edge_hex: None,
        }
    }
}

// Attribute names that are always written and read back verbatim.
const RADIUS_MAX: &str = "radius_max";
const RADIUS_MIN: &str = "radius_min";
const RADIUS_SD: &str = "radius_SD";
const VIS_RADIUS: &str = "vis_radius";
const ROI_ID: &str = "ROI_ID";

/// Attribute values of one node or edge, by attribute name.
type Record = HashMap<String, String>;

fn parse_f64(record: &Record, name: &str) -> Result<Option<f64>> {
    match record.get(name) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::GraphLoad(format!("invalid value '{}' for attribute '{}'", s, name))),
    }
}

fn require_f64(record: &Record, name: &str) -> Result<f64> {
    parse_f64(record, name)?.ok_or_else(|| Error::GraphLoad(format!("missing attribute '{}'", name)))
}

/// A vertex number: a non-negative integer, possibly written as `3.0`.
fn require_index(record: &Record, name: &str) -> Result<usize> {
    let value = require_f64(record, name)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(Error::GraphLoad(format!("invalid vertex id '{}' in column '{}'", value, name)));
    }
    Ok(value as usize)
}

/// Assemble a graph from raw node and edge records.
fn build_graph(
    nodes: &[Record],
    edges: &[(usize, usize, Record)],
    graph_type: GraphType,
    key: &AttributeKey,
    resolution: &Resolution,
) -> Result<VesselGraph> {
    let min_res = resolution.min();
    let mut g = VesselGraph::new();
    for node in nodes {
        let coords = [
            require_f64(node, &key.z)?,
            require_f64(node, &key.y)?,
            require_f64(node, &key.x)?,
        ];
        let mut vertex = Vertex::new(coords, 0.0);
        if graph_type == GraphType::Centerlines {
            vertex.radius = require_f64(node, &key.vertex_radius)?;
            vertex.vis_radius = Some(vertex.radius / min_res);
        }
        g.add_vertex(vertex);
    }

    for (source, target, record) in edges {
        if *source >= g.vcount() || *target >= g.vcount() {
            return Err(Error::GraphLoad(format!(
                "edge ({}, {}) references a missing vertex",
                source, target
            )));
        }
        let mut attrs = EdgeAttrs::default();
        if graph_type == GraphType::Branches {
            let radius = require_f64(record, &key.edge_radius)?;
            attrs.radius_avg = Some(radius);
            attrs.vis_radius = Some(radius / min_res);
            attrs.length = Some(require_f64(record, &key.length)?);
            attrs.volume = parse_f64(record, &key.volume)?;
            attrs.surface_area = parse_f64(record, &key.surface_area)?;
            attrs.tortuosity = parse_f64(record, &key.tortuosity)?;
            attrs.radius_max = parse_f64(record, RADIUS_MAX)?;
            attrs.radius_min = parse_f64(record, RADIUS_MIN)?;
            attrs.radius_sd = parse_f64(record, RADIUS_SD)?;
            if let Some(hex_key) = &key.edge_hex {
                attrs.hex = record.get(hex_key).cloned();
                attrs.roi_id = parse_f64(record, ROI_ID)?.map(|v| v as usize);
            }
        }
        g.add_edge_with(*source, *target, attrs);
    }

    let isolated = g.delete_isolated();
    debug!(
        "Loaded graph: {} vertices, {} edges ({} isolated vertices dropped)",
        g.vcount(),
        g.ecount(),
        isolated
    );
    Ok(g)
}

// ---------------------------------------------------------------------------
// GraphML
// ---------------------------------------------------------------------------

/// Load a GraphML graph.
pub fn load_graphml(path: &Path, graph_type: GraphType, key: &AttributeKey, resolution: &Resolution) -> Result<VesselGraph> {
    let text = fs::read_to_string(path)?;
    let doc = Document::parse(&text)?;

    // <key id="v_X" for="node" attr.name="X"/>
    let key_names: HashMap<&str, &str> = doc
        .descendants()
        .filter(|n| n.has_tag_name("key"))
        .filter_map(|n| Some((n.attribute("id")?, n.attribute("attr.name")?)))
        .collect();

    let read_data = |element: roxmltree::Node| -> Record {
        element
            .children()
            .filter(|c| c.has_tag_name("data"))
            .filter_map(|c| {
                let id = c.attribute("key")?;
                let name = key_names.get(id).copied().unwrap_or(id);
                Some((name.to_string(), c.text().unwrap_or("").to_string()))
            })
            .collect()
    };

    let mut node_ids: HashMap<&str, usize> = HashMap::new();
    let mut nodes = Vec::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("node")) {
        let id = node
            .attribute("id")
            .ok_or_else(|| Error::GraphLoad("node without an id".into()))?;
        node_ids.insert(id, nodes.len());
        nodes.push(read_data(node));
    }

    let mut edges = Vec::new();
    for edge in doc.descendants().filter(|n| n.has_tag_name("edge")) {
        let endpoint = |attr: &str| -> Result<usize> {
            let id = edge
                .attribute(attr)
                .ok_or_else(|| Error::GraphLoad(format!("edge without a {}", attr)))?;
            node_ids
                .get(id)
                .copied()
                .ok_or_else(|| Error::GraphLoad(format!("edge references unknown node '{}'", id)))
        };
        edges.push((endpoint("source")?, endpoint("target")?, read_data(edge)));
    }

    build_graph(&nodes, &edges, graph_type, key, resolution)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

type EdgeField = (&'static str, fn(&EdgeAttrs) -> Option<f64>);

const EDGE_FIELDS: [EdgeField; 9] = [
    ("radius_avg", |e| e.radius_avg),
    (RADIUS_MAX, |e| e.radius_max),
    (RADIUS_MIN, |e| e.radius_min),
    (RADIUS_SD, |e| e.radius_sd),
    ("length", |e| e.length),
    ("volume", |e| e.volume),
    ("surface_area", |e| e.surface_area),
    ("tortuosity", |e| e.tortuosity),
    (VIS_RADIUS, |e| e.vis_radius),
];

/// Write a graph as GraphML. Vertex coordinates are written as `X, Y, Z`
/// along with the vertex radii; every edge attribute present on at least one
/// edge is written.
pub fn save_graphml(g: &VesselGraph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(fs::File::create(path)?);

    writeln!(w, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(w, r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#)?;

    let has_vis = g.vertices().iter().any(|v| v.vis_radius.is_some());
    let mut vertex_keys = vec!["X", "Y", "Z", "radius"];
    if has_vis {
        vertex_keys.push(VIS_RADIUS);
    }
    for name in &vertex_keys {
        writeln!(
            w,
            r#"  <key id="v_{0}" for="node" attr.name="{0}" attr.type="double"/>"#,
            name
        )?;
    }

    let edge_fields: Vec<&EdgeField> = EDGE_FIELDS
        .iter()
        .filter(|(_, get)| g.edges().any(|(_, e)| get(e).is_some()))
        .collect();
    for (name, _) in &edge_fields {
        writeln!(
            w,
            r#"  <key id="e_{0}" for="edge" attr.name="{0}" attr.type="double"/>"#,
            name
        )?;
    }
    let has_hex = g.edges().any(|(_, e)| e.hex.is_some());
    let has_roi = g.edges().any(|(_, e)| e.roi_id.is_some());
    if has_hex {
        writeln!(w, r#"  <key id="e_hex" for="edge" attr.name="hex" attr.type="string"/>"#)?;
    }
    if has_roi {
        writeln!(
            w,
            r#"  <key id="e_{0}" for="edge" attr.name="{0}" attr.type="long"/>"#,
            ROI_ID
        )?;
    }

    writeln!(w, r#"  <graph id="G" edgedefault="undirected">"#)?;
    for (i, v) in g.vertices().iter().enumerate() {
        write!(w, r#"    <node id="n{}">"#, i)?;
        let [z, y, x] = v.coords;
        for (name, value) in [("X", x), ("Y", y), ("Z", z), ("radius", v.radius)] {
            write!(w, r#"<data key="v_{}">{}</data>"#, name, value)?;
        }
        if let Some(vis) = v.vis_radius {
            write!(w, r#"<data key="v_{}">{}</data>"#, VIS_RADIUS, vis)?;
        }
        writeln!(w, "</node>")?;
    }
    for ((a, b), e) in g.edges() {
        write!(w, r#"    <edge source="n{}" target="n{}">"#, a, b)?;
        for (name, get) in &edge_fields {
            if let Some(value) = get(e) {
                write!(w, r#"<data key="e_{}">{}</data>"#, name, value)?;
            }
        }
        if let Some(hex) = &e.hex {
            write!(w, r#"<data key="e_hex">{}</data>"#, escape(hex))?;
        }
        if let Some(roi) = e.roi_id {
            write!(w, r#"<data key="e_{}">{}</data>"#, ROI_ID, roi)?;
        }
        writeln!(w, "</edge>")?;
    }
    writeln!(w, "  </graph>")?;
    writeln!(w, "</graphml>")?;
    w.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn read_records(path: &Path, delimiter: u8) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut out = Vec::new();
    for row in reader.records() {
        let row = row?;
        out.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }
    Ok(out)
}

/// Load a graph from a vertex file and an edge file. Vertices are numbered
/// by row; edge rows name their endpoints by that number.
pub fn load_csv_graph(
    vertices: &Path,
    edges: &Path,
    delimiter: u8,
    graph_type: GraphType,
    key: &AttributeKey,
    resolution: &Resolution,
) -> Result<VesselGraph> {
    let nodes = read_records(vertices, delimiter)?;
    let edge_rows = read_records(edges, delimiter)?
        .into_iter()
        .map(|record| {
            let source = require_index(&record, &key.edge_source)?;
            let target = require_index(&record, &key.edge_target)?;
            Ok((source, target, record))
        })
        .collect::<Result<Vec<_>>>()?;
    build_graph(&nodes, &edge_rows, graph_type, key, resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_graphml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Graphs").join("g.graphml");

        let mut g = VesselGraph::new();
        g.add_vertex(Vertex::new([1.0, 2.0, 3.0], 1.5));
        g.add_vertex(Vertex::new([1.0, 2.0, 7.0], 2.0));
        g.add_vertex(Vertex::new([9.0, 9.0, 9.0], 0.5));
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        save_graphml(&g, &path).unwrap();

        let loaded = load_graphml(&path, GraphType::Centerlines, &AttributeKey::default(), &Resolution::isotropic(0.5)).unwrap();
        assert_eq!(loaded.vcount(), 3);
        assert_eq!(loaded.ecount(), 2);
        assert_eq!(loaded.vertex(0).coords, [1.0, 2.0, 3.0]);
        assert_eq!(loaded.vertex(1).radius, 2.0);
        assert_eq!(loaded.vertex(1).vis_radius, Some(4.0));
    }

    #[test]
    fn test_graphml_branch_attributes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("b.graphml");
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <key id="d0" for="node" attr.name="X" attr.type="double"/>
  <key id="d1" for="node" attr.name="Y" attr.type="double"/>
  <key id="d2" for="node" attr.name="Z" attr.type="double"/>
  <key id="d3" for="edge" attr.name="radius_avg" attr.type="double"/>
  <key id="d4" for="edge" attr.name="length" attr.type="double"/>
  <graph id="G" edgedefault="undirected">
    <node id="a"><data key="d0">0</data><data key="d1">0</data><data key="d2">0</data></node>
    <node id="b"><data key="d0">4</data><data key="d1">3</data><data key="d2">0</data></node>
    <node id="c"><data key="d0">1</data><data key="d1">1</data><data key="d2">1</data></node>
    <edge source="a" target="b"><data key="d3">1.0</data><data key="d4">6.0</data></edge>
  </graph>
</graphml>"#;
        fs::write(&path, xml).unwrap();

        let g = load_graphml(&path, GraphType::Branches, &AttributeKey::default(), &Resolution::default()).unwrap();
        // The isolated node is dropped.
        assert_eq!(g.vcount(), 2);
        let e = g.edge(0, 1).unwrap();
        assert_eq!(e.radius_avg, Some(1.0));
        assert_eq!(e.length, Some(6.0));
        assert_eq!(e.tortuosity, None);
        assert_eq!(g.vertex(1).coords, [0.0, 3.0, 4.0]);
    }

    #[test]
    fn test_csv_graph_with_delimiter() {
        let dir = TempDir::new().unwrap();
        let vpath = dir.path().join("vertices.csv");
        let epath = dir.path().join("edges.csv");
        fs::write(&vpath, "X;Y;Z;radius\n0;0;0;1.0\n1;0;0;1.0\n2;0;0;2.0\n").unwrap();
        fs::write(&epath, "Source ID;Target ID\n0;1\n1;2\n").unwrap();

        let g = load_csv_graph(&vpath, &epath, b';', GraphType::Centerlines, &AttributeKey::default(), &Resolution::default())
            .unwrap();
        assert_eq!(g.vcount(), 3);
        assert_eq!(g.ecount(), 2);
        assert_eq!(g.vertex(2).coords, [0.0, 0.0, 2.0]);
        assert_eq!(g.vertex(2).radius, 2.0);
    }

    #[test]
    fn test_csv_rejects_bad_vertex_ids() {
        let dir = TempDir::new().unwrap();
        let vpath = dir.path().join("vertices.csv");
        fs::write(&vpath, "X,Y,Z,radius\n0,0,0,1\n1,0,0,1\n").unwrap();

        for edges in ["Source ID,Target ID\n-1,1\n", "Source ID,Target ID\n0,0.5\n"] {
            let epath = dir.path().join("edges.csv");
            fs::write(&epath, edges).unwrap();
            let err = load_csv_graph(&vpath, &epath, b',', GraphType::Centerlines, &AttributeKey::default(), &Resolution::default());
            assert!(matches!(err, Err(Error::GraphLoad(_))), "accepted {:?}", edges);
        }
    }

    #[test]
    fn test_csv_branch_graph_with_roi_columns() {
        let dir = TempDir::new().unwrap();
        let vpath = dir.path().join("vertices.csv");
        let epath = dir.path().join("edges.csv");
        fs::write(&vpath, "X\tY\tZ\n0\t0\t0\n3\t4\t0\n6\t8\t0\n").unwrap();
        fs::write(
            &epath,
            "Source ID\tTarget ID\tradius_avg\tlength\thex\tROI_ID\n0\t1\t1.5\t5.0\t7ED04B\t2\n1\t2\t1.0\t6.0\t7ED04B\t2\n",
        )
        .unwrap();

        let key = AttributeKey {
            edge_hex: Some("hex".into()),
            ..AttributeKey::default()
        };
        let g = load_csv_graph(&vpath, &epath, b'\t', GraphType::Branches, &key, &Resolution::isotropic(0.5)).unwrap();
        assert_eq!(g.ecount(), 2);
        let e = g.edge(0, 1).unwrap();
        assert_eq!(e.radius_avg, Some(1.5));
        assert_eq!(e.vis_radius, Some(3.0));
        assert_eq!(e.length, Some(5.0));
        assert_eq!(e.hex.as_deref(), Some("7ED04B"));
        assert_eq!(e.roi_id, Some(2));
        assert_eq!(g.vertex(2).coords, [0.0, 8.0, 6.0]);
    }

    #[test]
    fn test_csv_missing_radius_column() {
        let dir = TempDir::new().unwrap();
        let vpath = dir.path().join("vertices.csv");
        let epath = dir.path().join("edges.csv");
        fs::write(&vpath, "X,Y,Z\n0,0,0\n1,0,0\n").unwrap();
        fs::write(&epath, "Source ID,Target ID\n0,1\n").unwrap();

        let err = load_csv_graph(&vpath, &epath, b',', GraphType::Centerlines, &AttributeKey::default(), &Resolution::default());
        assert!(matches!(err, Err(Error::GraphLoad(_))));
    }
}
