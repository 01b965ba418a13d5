//! Graph construction from skeleton points and topology cleanup.
//!
//! Skeleton points become vertices; 26-adjacent points are joined by edges.
//! Thick junctions leave small clusters of branch points behind, which
//! [`clique_filter`] collapses. [`prune`] removes short end segments and
//! [`filter`] drops short isolated segments.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::features::{large_segment_path, length_calc, segment_length, small_segment_path, GraphType};
use crate::graph::{Vertex, VesselGraph};
use crate::volume::{Grid, Resolution};
use crate::volume_processing::absolute_points;

/// Forward half of the 26-neighbourhood as `(dz, dy, dx)`. Scanning only
/// these finds every adjacent pair exactly once.
const FORWARD_SCAN: [[isize; 3]; 13] = [
    [1, 1, -1],
    [1, 1, 0],
    [1, 1, 1],
    [0, 1, -1],
    [0, 1, 0],
    [0, 1, 1],
    [1, 0, -1],
    [1, 0, 0],
    [1, 0, 1],
    [0, 0, 1],
    [1, -1, -1],
    [1, -1, 0],
    [1, -1, 1],
];

/// Clusters with more vertices than this are split along their long axis
/// instead of collapsing into one vertex.
const MAX_CLUSTER_COLLAPSE: usize = 50;
/// Number of slice boundaries used to split a large cluster.
const CLUSTER_SLICES: usize = 6;

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Skeleton points of a padded volume together with their radii.
pub struct SkeletonPoints<'a> {
    /// Points in the padded volume, `[z, y, x]`.
    pub points: &'a [[usize; 3]],
    pub radii: &'a [f64],
    pub vis_radii: Option<&'a [f64]>,
    /// Shape of the padded volume.
    pub shape: [usize; 3],
    /// Offset of the bounded volume within the original image.
    pub minima: [usize; 3],
    pub padding: [usize; 3],
}

/// Build the adjacency graph of a set of skeleton points.
pub fn build_graph(skeleton: &SkeletonPoints) -> VesselGraph {
    let [d, h, w] = skeleton.shape;
    let mut lut: Grid<Option<u32>> = Grid::new(d, h, w);
    for (i, p) in skeleton.points.iter().enumerate() {
        lut[(p[0], p[1], p[2])] = Some(i as u32);
    }

    let coords = absolute_points(skeleton.points, skeleton.minima, skeleton.padding);
    let mut g = VesselGraph::new();
    for (i, c) in coords.into_iter().enumerate() {
        let mut v = Vertex::new(c, skeleton.radii[i]);
        v.vis_radius = skeleton.vis_radii.map(|r| r[i]);
        g.add_vertex(v);
    }

    for (i, p) in skeleton.points.iter().enumerate() {
        for off in &FORWARD_SCAN {
            let target = lut
                .get_opt(
                    p[0] as isize + off[0],
                    p[1] as isize + off[1],
                    p[2] as isize + off[2],
                )
                .flatten();
            if let Some(j) = target {
                g.add_edge(i, j as usize);
            }
        }
    }
    g
}

/// Build the graph and collapse spurious branch point clusters.
pub fn create_graph(skeleton: &SkeletonPoints) -> VesselGraph {
    let mut g = build_graph(skeleton);
    debug!("Graph built: {} vertices, {} edges", g.vcount(), g.ecount());
    clique_filter(&mut g);
    g
}

// ---------------------------------------------------------------------------
// Clique filtering
// ---------------------------------------------------------------------------

/// Corrections made by [`clique_filter`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CliqueCounts {
    /// Edges removed from 3- and 4-vertex branch point cliques.
    pub class_one: usize,
    /// Clusters collapsed into a single vertex.
    pub class_two: usize,
    /// Large clusters replaced by a short chain of vertices.
    pub class_three: usize,
}

/// Branch points that sit on cycles of other branch points: the degree > 2
/// subgraph with dangling vertices stripped repeatedly.
fn branch_core(g: &VesselGraph) -> Vec<usize> {
    let mut inside: Vec<bool> = (0..g.vcount()).map(|v| g.degree(v) > 2).collect();
    loop {
        let dangling: Vec<usize> = (0..g.vcount())
            .filter(|&v| inside[v] && g.degree_within(v, |u| inside[u]) < 2)
            .collect();
        if dangling.is_empty() {
            break;
        }
        for v in dangling {
            inside[v] = false;
        }
    }
    (0..g.vcount()).filter(|&v| inside[v]).collect()
}

/// Break small branch point cliques by removing the edge between their two
/// lightest vertices. A vertex weighs its own radius plus the radii of its
/// neighbours.
fn class_one_filter(g: &mut VesselGraph) -> usize {
    let core = branch_core(g);
    let cliques = g.maximal_cliques(&core, 3, 4);

    let mut edges_togo = Vec::new();
    for clique in cliques {
        if clique.iter().any(|&v| g.degree(v) >= 5) {
            continue;
        }
        let mut weighted: Vec<(f64, usize)> = clique
            .iter()
            .map(|&v| {
                let w = g.vertex(v).radius + g.neighbors(v).map(|u| g.vertex(u).radius).sum::<f64>();
                (w, v)
            })
            .collect();
        weighted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        edges_togo.push((weighted[0].1, weighted[1].1));
    }

    edges_togo
        .into_iter()
        .filter(|&(a, b)| g.remove_edge(a, b))
        .count()
}

fn merged_vertex(g: &VesselGraph, members: &[usize]) -> Vertex {
    let n = members.len() as f64;
    let mut coords = [0.0; 3];
    let mut radius = 0.0;
    for &v in members {
        let vx = g.vertex(v);
        for (c, x) in coords.iter_mut().zip(vx.coords) {
            *c += x / n;
        }
        radius += vx.radius / n;
    }
    let vis: Vec<f64> = members.iter().filter_map(|&v| g.vertex(v).vis_radius).collect();
    Vertex {
        coords,
        radius,
        vis_radius: (!vis.is_empty()).then(|| vis.iter().sum::<f64>() / vis.len() as f64),
    }
}

/// Neighbours of `members` that are not branch points themselves.
fn external_neighbors(g: &VesselGraph, members: &[usize], branch: &[bool]) -> Vec<usize> {
    members
        .iter()
        .flat_map(|&v| g.neighbors(v))
        .filter(|&u| !branch[u])
        .collect()
}

/// Split a large cluster into slices along its longest axis.
fn cluster_slices(g: &VesselGraph, cluster: &[usize]) -> Vec<Vec<usize>> {
    let sorted_along = |axis: usize| {
        let mut ids = cluster.to_vec();
        ids.sort_by(|&a, &b| g.vertex(a).coords[axis].total_cmp(&g.vertex(b).coords[axis]));
        ids
    };
    let mut axis = 0;
    let mut longest = f64::NEG_INFINITY;
    for i in 0..3 {
        let ids = sorted_along(i);
        let (first, last) = (g.vertex(ids[0]).coords, g.vertex(ids[ids.len() - 1]).coords);
        let extent: f64 = (0..3).map(|k| (first[k] - last[k]).abs()).sum();
        if extent > longest {
            longest = extent;
            axis = i;
        }
    }

    let ids = sorted_along(axis);
    let n = ids.len();
    let slices = CLUSTER_SLICES.min(n);
    let bounds: Vec<usize> = (0..slices)
        .map(|j| (n as f64 * j as f64 / (slices - 1) as f64) as usize)
        .collect();
    bounds
        .windows(2)
        .map(|b| ids[b[0]..b[1]].to_vec())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Collapse connected clusters of more than three branch points. Small
/// clusters become one vertex; large ones become a chain of slice vertices.
fn class_two_three_filter(g: &mut VesselGraph) -> (usize, usize) {
    let branch: Vec<bool> = (0..g.vcount()).map(|v| g.degree(v) > 2).collect();
    let clusters: Vec<Vec<usize>> = g
        .components_where(|v| branch[v])
        .into_iter()
        .filter(|c| c.len() > 3)
        .collect();
    if clusters.is_empty() {
        return (0, 0);
    }

    let mut vertices_togo = Vec::new();
    let mut new_edges: BTreeSet<(usize, usize)> = BTreeSet::new();
    let (mut class_two, mut class_three) = (0, 0);

    for cluster in &clusters {
        vertices_togo.extend_from_slice(cluster);
        let groups = if cluster.len() <= MAX_CLUSTER_COLLAPSE {
            class_two += 1;
            vec![cluster.clone()]
        } else {
            class_three += 1;
            cluster_slices(g, cluster)
        };

        let mut line: Vec<usize> = Vec::with_capacity(groups.len());
        for group in &groups {
            let vertex = merged_vertex(g, group);
            let neighbors = external_neighbors(g, group, &branch);
            let id = g.add_vertex(vertex);
            new_edges.extend(neighbors.into_iter().map(|n| (n.min(id), n.max(id))));
            line.push(id);
        }
        for pair in line.windows(2) {
            new_edges.insert((pair[0], pair[1]));
        }
    }

    for (a, b) in new_edges {
        g.add_edge(a, b);
    }
    g.delete_vertices(&vertices_togo);
    (class_two, class_three)
}

/// Remove spurious branch point clusters left by thinning thick junctions.
pub fn clique_filter(g: &mut VesselGraph) -> CliqueCounts {
    let class_one = class_one_filter(g);
    let (class_two, class_three) = class_two_three_filter(g);
    let counts = CliqueCounts {
        class_one,
        class_two,
        class_three,
    };
    debug!("Clique filter: {:?}", counts);
    counts
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

fn edge_length(g: &VesselGraph, a: usize, b: usize, resolution: &Resolution) -> f64 {
    g.edge(a, b)
        .and_then(|e| e.length)
        .unwrap_or_else(|| length_calc(&[g.vertex(a).coords, g.vertex(b).coords], resolution))
}

fn centerline_prune_pass(g: &mut VesselGraph, prune_length: f64, resolution: &Resolution, smoothing: bool) -> usize {
    let in_segments: Vec<bool> = (0..g.vcount()).map(|v| g.degree(v) < 3).collect();
    let max_size = prune_length.max(1.0);
    let segments: Vec<Vec<usize>> = g
        .components_where(|v| in_segments[v])
        .into_iter()
        .filter(|s| (s.len() as f64) < max_size)
        .collect();

    let mut vertices_togo = Vec::new();
    let mut pruned = 0;
    for segment in segments {
        let ends = segment.iter().filter(|&&v| g.degree(v) == 1).count();
        if ends != 1 {
            continue;
        }
        let list = if segment.len() == 1 {
            small_segment_path(g, segment[0])
        } else {
            large_segment_path(g, &segment, |v| in_segments[v])
        };
        if segment_length(g, &list, resolution, smoothing) < prune_length {
            vertices_togo.extend(segment);
            pruned += 1;
        }
    }
    g.delete_vertices(&vertices_togo);
    pruned
}

fn branch_prune(g: &mut VesselGraph, prune_length: f64, resolution: &Resolution) -> usize {
    let vertices_togo: Vec<usize> = (0..g.vcount())
        .filter(|&v| g.degree(v) == 1)
        .filter(|&v| {
            g.neighbors(v)
                .next()
                .map_or(false, |u| edge_length(g, v, u, resolution) < prune_length)
        })
        .collect();
    g.delete_vertices(&vertices_togo);
    vertices_togo.len()
}

/// Remove end segments shorter than `prune_length`.
///
/// Centerline graphs get a second pass that removes single-vertex spurs left
/// behind by the first. Isolated segments are left to [`filter`].
pub fn prune(
    g: &mut VesselGraph,
    prune_length: f64,
    resolution: &Resolution,
    smoothing: bool,
    graph_type: GraphType,
) -> usize {
    let pruned = match graph_type {
        GraphType::Centerlines => {
            let first = centerline_prune_pass(g, prune_length, resolution, smoothing);
            first + centerline_prune_pass(g, 1.01, resolution, smoothing)
        }
        GraphType::Branches => branch_prune(g, prune_length, resolution),
    };
    info!("Pruned {} end point segments", pruned);
    pruned
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Remove isolated vertices and, when `filter_length > 0`, isolated segments
/// shorter than it.
pub fn filter(
    g: &mut VesselGraph,
    filter_length: f64,
    resolution: &Resolution,
    smoothing: bool,
    graph_type: GraphType,
) -> usize {
    g.delete_isolated();
    if filter_length <= 0.0 {
        return 0;
    }

    let mut vertices_togo = Vec::new();
    let mut filtered = 0;
    match graph_type {
        GraphType::Centerlines => {
            let max_size = filter_length.max(2.0);
            for cluster in g.components() {
                if cluster.len() as f64 > max_size {
                    continue;
                }
                let ends: Vec<usize> = cluster.iter().copied().filter(|&v| g.degree(v) == 1).collect();
                if ends.len() != 2 {
                    continue;
                }
                let Some(list) = g.shortest_path(ends[0], ends[1]) else {
                    continue;
                };
                if segment_length(g, &list, resolution, smoothing) < filter_length {
                    vertices_togo.extend(cluster);
                    filtered += 1;
                }
            }
        }
        GraphType::Branches => {
            for cluster in g.components() {
                if cluster.len() == 2 && edge_length(g, cluster[0], cluster[1], resolution) < filter_length {
                    vertices_togo.extend(cluster);
                    filtered += 1;
                }
            }
        }
    }
    g.delete_vertices(&vertices_togo);
    info!("Filtered {} isolated segments", filtered);
    filtered
}
