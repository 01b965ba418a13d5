//! Segment and network feature extraction.
//!
//! Centerline graphs are split into segments: runs of vertices with degree
//! below 3 (plus their branch-point neighbours) and edges joining two branch
//! points directly. Each segment yields radius statistics, length (optionally
//! along a smoothed B-spline), tortuosity, lateral surface area and volume.
//! Branch graphs already carry one segment per edge.
//!
//! A simple graph cannot hold self loops, so a loop that starts and ends on
//! the same vertex is reduced to an edge from that vertex to the last loop
//! vertex before it. The edge carries the features of the whole loop.

use std::f64::consts::PI;

use tracing::debug;

use crate::graph::{EdgeAttrs, VesselGraph};
use crate::volume::Resolution;

/// Number of radius histogram bins: `[0,1)` … `[19,20)` and `[20,500]`.
pub const RADIUS_BINS: usize = 21;
const LAST_BIN_EDGE: f64 = 500.0;

/// How vertices of an input graph relate to vessel geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GraphType {
    /// Every skeleton point is a vertex.
    Centerlines,
    /// Vertices are branch and end points; edges carry segment features.
    Branches,
}

impl Default for GraphType {
    fn default() -> Self {
        GraphType::Centerlines
    }
}

#[derive(Debug, Clone)]
pub struct FeatureOptions {
    pub resolution: Resolution,
    /// 2 or 3. 2D analyses report percent area fraction instead of volume.
    pub image_dim: u8,
    /// Shape of the source image, needed for area fractions.
    pub image_shape: Option<Vec<usize>>,
    pub graph_type: GraphType,
    pub smoothing: bool,
    /// Replace the graph's edges with one feature-carrying edge per segment.
    pub reduce_graph: bool,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            image_dim: 3,
            image_shape: None,
            graph_type: GraphType::Centerlines,
            smoothing: true,
            reduce_graph: false,
        }
    }
}

/// Features of a single segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentFeatures {
    /// Volume (3D) or percent area fraction (2D).
    pub volume: Option<f64>,
    pub surface_area: f64,
    pub length: f64,
    pub tortuosity: f64,
    pub radius_avg: f64,
    pub radius_max: f64,
    pub radius_min: f64,
    pub radius_sd: f64,
    pub vis_radius: Option<f64>,
}

/// Whole-network summary of one dataset or ROI.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSummary {
    pub file_name: String,
    pub roi_name: String,
    pub roi_volume: Option<f64>,
    /// Total volume (3D) or percent area fraction (2D).
    pub volume: Option<f64>,
    pub network_length: f64,
    pub surface_area: f64,
    pub branchpoints: usize,
    pub endpoints: usize,
    pub segment_count: usize,
    pub segment_partitioning: f64,
    pub mean_radius: f64,
    pub mean_length: f64,
    pub mean_tortuosity: f64,
    pub mean_volume: Option<f64>,
    pub mean_surface_area: f64,
    pub radius_bins: [usize; RADIUS_BINS],
    pub length_bins: [Option<f64>; RADIUS_BINS],
    pub tortuosity_bins: [Option<f64>; RADIUS_BINS],
    pub surface_area_bins: [Option<f64>; RADIUS_BINS],
}

/// One row of the network results table.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkResult {
    Complete(Box<NetworkSummary>),
    /// Nothing was left to analyse after pruning and filtering.
    Empty { file_name: String, roi_name: String },
    /// The requested ROI has no voxels in the dataset.
    RoiMissing { file_name: String, roi_name: String },
}

// ---------------------------------------------------------------------------
// Geometry helpers
// ---------------------------------------------------------------------------

/// Polyline length in physical units.
pub fn length_calc(coords: &[[f64; 3]], resolution: &Resolution) -> f64 {
    coords
        .windows(2)
        .map(|w| {
            (0..3)
                .map(|k| ((w[1][k] - w[0][k]) * resolution.0[k]).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .sum()
}

/// Mean, max, min and population standard deviation.
pub fn radii_stats(radii: &[f64]) -> (f64, f64, f64, f64) {
    if radii.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let n = radii.len() as f64;
    let mean = radii.iter().sum::<f64>() / n;
    let max = radii.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = radii.iter().cloned().fold(f64::INFINITY, f64::min);
    let var = radii.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    (mean, max, min, var.sqrt())
}

// ---- B-spline smoothing ----

/// Number of samples taken along a smoothed segment.
pub fn delta_calc(num_points: usize, vis_radius: f64) -> usize {
    let n = num_points as f64;
    let mut delta = 3usize.max((n / n.log2()).ceil() as usize);
    if num_points > 100 || (vis_radius > 3.0 && num_points > 20) {
        delta /= 2;
    }
    delta
}

/// Clamped uniform knot vector for `num_ctrl` control points.
pub fn clamped_knots(degree: usize, num_ctrl: usize) -> Vec<f64> {
    let segments = num_ctrl - degree;
    let mut knots = vec![0.0; degree];
    knots.extend((0..=segments).map(|i| i as f64 / segments as f64));
    knots.extend(std::iter::repeat(1.0).take(degree));
    knots
}

fn de_boor(u: f64, degree: usize, knots: &[f64], ctrl: &[[f64; 3]]) -> [f64; 3] {
    let n = ctrl.len();
    let span = if u >= knots[n] {
        n - 1
    } else {
        (degree..n)
            .rev()
            .find(|&k| knots[k] <= u)
            .unwrap_or(degree)
    };

    let mut d: Vec<[f64; 3]> = (0..=degree).map(|j| ctrl[j + span - degree]).collect();
    for r in 1..=degree {
        for j in (r..=degree).rev() {
            let left = knots[j + span - degree];
            let right = knots[j + 1 + span - r];
            let alpha = if right > left { (u - left) / (right - left) } else { 0.0 };
            for k in 0..3 {
                d[j][k] = (1.0 - alpha) * d[j - 1][k] + alpha * d[j][k];
            }
        }
    }
    d[degree]
}

/// Smooth a jagged centerline with a clamped B-spline through its points as
/// control points. Fewer than two points are returned unchanged.
pub fn smooth_centerline(points: &[[f64; 3]], vis_radius: f64) -> Vec<[f64; 3]> {
    let n = points.len();
    if n < 2 {
        return points.to_vec();
    }
    let degree = if n > 4 { 3 } else { (n - 1).max(1) };
    let delta = delta_calc(n, vis_radius);
    let knots = clamped_knots(degree, n);
    (0..delta)
        .map(|i| {
            let u = if delta > 1 { i as f64 / (delta - 1) as f64 } else { 0.0 };
            de_boor(u, degree, &knots, points)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Segment paths
// ---------------------------------------------------------------------------

/// Point list of a single-vertex segment: the vertex between its neighbours.
pub fn small_segment_path(g: &VesselGraph, v: usize) -> Vec<usize> {
    let mut list: Vec<usize> = g.neighbors(v).collect();
    let at = list.len().min(1);
    list.insert(at, v);
    list
}

/// Ordered point list of a multi-vertex segment. `in_segments` selects the
/// vertices that make up segments (degree < 3 for centerline graphs).
///
/// Open segments are extended at both ends by their outside neighbours;
/// closed loops are walked once and closed on their first vertex.
pub fn large_segment_path<F: Fn(usize) -> bool>(
    g: &VesselGraph,
    segment: &[usize],
    in_segments: F,
) -> Vec<usize> {
    let endpoints: Vec<usize> = segment
        .iter()
        .copied()
        .filter(|&v| g.degree_within(v, &in_segments) == 1)
        .collect();

    if endpoints.len() == 2 {
        if let Some(mut list) = g.shortest_path_within(endpoints[0], endpoints[1], &in_segments) {
            let n = list.len();
            let end_neighborhood: Vec<usize> = list[..2.min(n)]
                .iter()
                .chain(list[n.saturating_sub(2)..].iter())
                .copied()
                .collect();
            let head: Vec<usize> = g
                .neighbors(list[0])
                .filter(|u| !end_neighborhood.contains(u))
                .collect();
            let tail: Vec<usize> = g
                .neighbors(list[n - 1])
                .filter(|u| !end_neighborhood.contains(u))
                .collect();
            for u in head {
                list.insert(0, u);
            }
            list.extend(tail);
            return list;
        }
    }
    loop_path(g, segment, in_segments)
}

/// Walk a closed loop of degree-2 vertices.
pub fn loop_path<F: Fn(usize) -> bool>(g: &VesselGraph, segment: &[usize], in_segments: F) -> Vec<usize> {
    let Some(&start) = segment.first() else {
        return Vec::new();
    };
    let mut walk = vec![start];
    let mut previous = start;
    let mut current = start;
    for _ in 0..=segment.len() {
        let next = g
            .neighbors(current)
            .filter(|&u| in_segments(u))
            .find(|&u| u != previous && !(u == start && walk.len() < 3));
        match next {
            Some(u) if u == start => {
                walk.push(start);
                break;
            }
            Some(u) => {
                previous = current;
                current = u;
                walk.push(u);
            }
            None => break,
        }
    }
    walk
}

// ---------------------------------------------------------------------------
// Segment features
// ---------------------------------------------------------------------------

fn segment_coords(g: &VesselGraph, point_list: &[usize], smoothing: bool, radius_avg: f64, min_res: f64) -> Vec<[f64; 3]> {
    let coords: Vec<[f64; 3]> = point_list.iter().map(|&v| g.vertex(v).coords).collect();
    if smoothing && coords.len() >= 2 {
        smooth_centerline(&coords, radius_avg / min_res)
    } else {
        coords
    }
}

/// Length of a segment, as used by pruning and filtering.
pub fn segment_length(g: &VesselGraph, point_list: &[usize], resolution: &Resolution, smoothing: bool) -> f64 {
    let radii: Vec<f64> = point_list.iter().map(|&v| g.vertex(v).radius).collect();
    let (avg, ..) = radii_stats(&radii);
    let coords = segment_coords(g, point_list, smoothing, avg, resolution.min());
    length_calc(&coords, resolution)
}

/// Features of the segment running through `point_list`.
pub fn segment_features(g: &VesselGraph, point_list: &[usize], opts: &FeatureOptions) -> SegmentFeatures {
    let res = &opts.resolution;
    let min_res = res.min();
    let radii: Vec<f64> = point_list.iter().map(|&v| g.vertex(v).radius).collect();
    let (r_avg, r_max, r_min, r_sd) = radii_stats(&radii);

    let vis: Vec<f64> = point_list
        .iter()
        .filter_map(|&v| g.vertex(v).vis_radius)
        .collect();
    let vis_radius = (!vis.is_empty()).then(|| vis.iter().sum::<f64>() / vis.len() as f64);

    let coords = segment_coords(g, point_list, opts.smoothing, r_avg, min_res);
    let length = length_calc(&coords, res);

    let cord = match (coords.first(), coords.last()) {
        (Some(a), Some(b)) => length_calc(&[*a, *b], res),
        _ => 0.0,
    };
    // Loops and near-loops have no meaningful cord.
    let tortuosity = if cord >= min_res { length / cord } else { 0.0 };

    let (surface_area, volume) = if opts.image_dim == 2 {
        let sa = 2.0 * r_avg * length;
        let paf = opts
            .image_shape
            .as_ref()
            .map(|shape| sa / shape.iter().product::<usize>() as f64 * 100.0);
        (sa, paf)
    } else {
        (2.0 * PI * r_avg * length, Some(PI * r_avg * r_avg * length))
    };

    SegmentFeatures {
        volume,
        surface_area,
        length,
        tortuosity,
        radius_avg: r_avg,
        radius_max: r_max,
        radius_min: r_min,
        radius_sd: r_sd,
        vis_radius,
    }
}

/// Extract every segment of a centerline graph. Returns the features and the
/// pair of end vertices of each segment. Closed loops end on their
/// second-to-last vertex.
pub fn centerline_segments(g: &VesselGraph, opts: &FeatureOptions) -> (Vec<SegmentFeatures>, Vec<(usize, usize)>) {
    let in_segments = |v: usize| g.degree(v) < 3;
    let mut features = Vec::new();
    let mut ends = Vec::new();

    for segment in g.components_where(in_segments) {
        let list = if segment.len() == 1 {
            small_segment_path(g, segment[0])
        } else {
            large_segment_path(g, &segment, in_segments)
        };
        let first = list[0];
        let mut last = list[list.len() - 1];
        if last == first && list.len() > 2 {
            last = list[list.len() - 2];
        }
        ends.push((first, last));
        features.push(segment_features(g, &list, opts));
    }

    // Segments joining two branch points directly.
    for ((a, b), _) in g.edges() {
        if g.degree(a) > 2 && g.degree(b) > 2 {
            ends.push((b, a));
            features.push(segment_features(g, &[b, a], opts));
        }
    }
    (features, ends)
}

/// Replace the graph's edges with one edge per segment and drop vertices
/// left without edges.
pub fn reduce_graph(g: &mut VesselGraph, features: &[SegmentFeatures], ends: &[(usize, usize)]) {
    g.clear_edges();
    for (f, &(a, b)) in features.iter().zip(ends) {
        let attrs = EdgeAttrs {
            radius_avg: Some(f.radius_avg),
            radius_max: Some(f.radius_max),
            radius_min: Some(f.radius_min),
            radius_sd: Some(f.radius_sd),
            length: Some(f.length),
            volume: f.volume,
            surface_area: Some(f.surface_area),
            tortuosity: Some(f.tortuosity),
            vis_radius: f.vis_radius,
            ..Default::default()
        };
        g.add_edge_with(a, b, attrs);
    }
    g.delete_isolated();
}

/// Features of a branch graph, filling in whatever its edges lack.
pub fn branch_segments(g: &mut VesselGraph, opts: &FeatureOptions) -> Vec<SegmentFeatures> {
    let res = opts.resolution;
    let coords: Vec<[f64; 3]> = g.vertices().iter().map(|v| v.coords).collect();
    let mut out = Vec::with_capacity(g.ecount());
    for ((a, b), e) in g.edges_mut() {
        let cord = length_calc(&[coords[a], coords[b]], &res);
        let radius = e.radius_avg.unwrap_or(0.0);
        let length = *e.length.get_or_insert(cord);
        let volume = *e.volume.get_or_insert(PI * radius * radius * length);
        let surface_area = *e.surface_area.get_or_insert(2.0 * PI * radius * length);
        let tortuosity = *e
            .tortuosity
            .get_or_insert(if cord > 0.0 { length / cord } else { 0.0 });
        out.push(SegmentFeatures {
            volume: Some(volume),
            surface_area,
            length,
            tortuosity,
            radius_avg: radius,
            radius_max: e.radius_max.unwrap_or(radius),
            radius_min: e.radius_min.unwrap_or(radius),
            radius_sd: e.radius_sd.unwrap_or(0.0),
            vis_radius: e.vis_radius,
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Network summary
// ---------------------------------------------------------------------------

fn radius_bin(r: f64) -> Option<usize> {
    if !(0.0..=LAST_BIN_EDGE).contains(&r) {
        return None;
    }
    Some((r.floor() as usize).min(RADIUS_BINS - 1))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Summarize segment features into one results row.
pub fn summarize(
    g: &VesselGraph,
    segments: &[SegmentFeatures],
    file_name: &str,
    roi_name: &str,
    roi_volume: Option<f64>,
    opts: &FeatureOptions,
) -> NetworkResult {
    if segments.is_empty() {
        return NetworkResult::Empty {
            file_name: file_name.to_string(),
            roi_name: roi_name.to_string(),
        };
    }

    let network_length: f64 = segments.iter().map(|s| s.length).sum();
    let surface_area: f64 = segments.iter().map(|s| s.surface_area).sum();
    let volume = if opts.image_dim == 2 && opts.image_shape.is_none() {
        None
    } else {
        Some(segments.iter().filter_map(|s| s.volume).sum())
    };
    let mean_volume = volume.map(|_| mean(segments.iter().filter_map(|s| s.volume)));
    let segment_count = segments.len();

    let mut radius_bins = [0usize; RADIUS_BINS];
    let mut sums = [[0.0f64; 3]; RADIUS_BINS];
    for s in segments {
        if let Some(bin) = radius_bin(s.radius_avg) {
            radius_bins[bin] += 1;
            sums[bin][0] += s.length;
            sums[bin][1] += s.tortuosity;
            sums[bin][2] += s.surface_area;
        }
    }
    let bin_mean = |k: usize| -> [Option<f64>; RADIUS_BINS] {
        let mut out = [None; RADIUS_BINS];
        for (i, slot) in out.iter_mut().enumerate() {
            if radius_bins[i] > 0 {
                *slot = Some(sums[i][k] / radius_bins[i] as f64);
            }
        }
        out
    };

    let branchpoints = (0..g.vcount()).filter(|&v| g.degree(v) > 2).count();
    let endpoints = (0..g.vcount()).filter(|&v| g.degree(v) == 1).count();

    debug!(
        "{} segments, network length {:.2}, {} branchpoints, {} endpoints",
        segment_count, network_length, branchpoints, endpoints
    );

    NetworkResult::Complete(Box::new(NetworkSummary {
        file_name: file_name.to_string(),
        roi_name: roi_name.to_string(),
        roi_volume,
        volume,
        network_length,
        surface_area,
        branchpoints,
        endpoints,
        segment_count,
        segment_partitioning: if network_length > 0.0 {
            segment_count as f64 / network_length
        } else {
            0.0
        },
        mean_radius: mean(segments.iter().map(|s| s.radius_avg)),
        mean_length: mean(segments.iter().map(|s| s.length)),
        mean_tortuosity: mean(segments.iter().map(|s| s.tortuosity)),
        mean_volume,
        mean_surface_area: mean(segments.iter().map(|s| s.surface_area)),
        radius_bins,
        length_bins: bin_mean(0),
        tortuosity_bins: bin_mean(1),
        surface_area_bins: bin_mean(2),
    }))
}

/// Extract segment features from a graph and summarize the network.
///
/// Branchpoint and endpoint counts are taken before the graph is reduced.
pub fn feature_extraction(
    g: &mut VesselGraph,
    file_name: &str,
    roi_name: &str,
    roi_volume: Option<f64>,
    opts: &FeatureOptions,
) -> (NetworkResult, Vec<SegmentFeatures>) {
    if g.is_empty() {
        let empty = NetworkResult::Empty {
            file_name: file_name.to_string(),
            roi_name: roi_name.to_string(),
        };
        return (empty, Vec::new());
    }

    let segments = match opts.graph_type {
        GraphType::Centerlines => {
            let (features, ends) = centerline_segments(g, opts);
            let result = summarize(g, &features, file_name, roi_name, roi_volume, opts);
            if opts.reduce_graph {
                reduce_graph(g, &features, &ends);
            }
            return (result, features);
        }
        GraphType::Branches => branch_segments(g, opts),
    };
    let result = summarize(g, &segments, file_name, roi_name, roi_volume, opts);
    (result, segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Vertex;

    fn line_graph(n: usize, radius: f64) -> VesselGraph {
        let mut g = VesselGraph::new();
        for i in 0..n {
            g.add_vertex(Vertex::new([0.0, 0.0, i as f64], radius));
        }
        for i in 1..n {
            g.add_edge(i - 1, i);
        }
        g
    }

    fn raw_opts() -> FeatureOptions {
        FeatureOptions {
            smoothing: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_length_calc_uses_resolution() {
        let coords = [[0.0, 0.0, 0.0], [0.0, 0.0, 2.0], [1.0, 0.0, 2.0]];
        assert_eq!(length_calc(&coords, &Resolution([3.0, 1.0, 1.0])), 5.0);
    }

    #[test]
    fn test_radii_stats_population_sd() {
        let (avg, max, min, sd) = radii_stats(&[1.0, 3.0]);
        assert_eq!((avg, max, min, sd), (2.0, 3.0, 1.0, 1.0));
    }

    #[test]
    fn test_knots_and_delta() {
        assert_eq!(clamped_knots(3, 5), vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(clamped_knots(1, 2), vec![0.0, 0.0, 1.0, 1.0]);
        for (degree, n) in [(1, 2), (2, 3), (3, 4), (3, 5), (3, 12)] {
            assert_eq!(clamped_knots(degree, n).len(), n + degree + 1);
        }
        assert_eq!(delta_calc(8, 1.0), 3);
        assert_eq!(delta_calc(64, 1.0), 11);
        assert_eq!(delta_calc(128, 1.0), 9);
    }

    #[test]
    fn test_smoothing_keeps_straight_line_and_ends() {
        let pts: Vec<[f64; 3]> = (0..10).map(|i| [0.0, 0.0, i as f64]).collect();
        let smooth = smooth_centerline(&pts, 1.0);
        assert_eq!(smooth.first(), Some(&[0.0, 0.0, 0.0]));
        let last = smooth.last().unwrap();
        assert!((last[2] - 9.0).abs() < 1e-9);
        let len = length_calc(&smooth, &Resolution::default());
        assert!((len - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_is_one_segment() {
        let mut g = line_graph(6, 1.0);
        let (result, segs) = feature_extraction(&mut g, "line", "None", None, &raw_opts());
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].length, 5.0);
        assert_eq!(segs[0].tortuosity, 1.0);
        assert!((segs[0].volume.unwrap() - PI * 5.0).abs() < 1e-9);
        match result {
            NetworkResult::Complete(s) => {
                assert_eq!(s.segment_count, 1);
                assert_eq!(s.endpoints, 2);
                assert_eq!(s.branchpoints, 0);
                assert_eq!(s.radius_bins[1], 1);
                assert_eq!(s.length_bins[1], Some(5.0));
                assert_eq!(s.length_bins[0], None);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_branching_segments_include_branch_point() {
        // A star: centre 0 with three arms of two vertices each.
        let mut g = VesselGraph::new();
        g.add_vertex(Vertex::new([0.0, 0.0, 0.0], 1.0));
        let dirs = [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        for d in dirs {
            let a = g.add_vertex(Vertex::new(d, 1.0));
            let b = g.add_vertex(Vertex::new([d[0] * 2.0, d[1] * 2.0, d[2] * 2.0], 1.0));
            g.add_edge(0, a);
            g.add_edge(a, b);
        }
        let (features, ends) = centerline_segments(&g, &raw_opts());
        assert_eq!(features.len(), 3);
        assert!(features.iter().all(|f| f.length == 2.0));
        assert!(ends.iter().all(|&(a, b)| a == 0 || b == 0));
    }

    #[test]
    fn test_loop_has_zero_tortuosity() {
        let mut g = VesselGraph::new();
        let square = [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]];
        for c in square {
            g.add_vertex(Vertex::new(c, 0.5));
        }
        for i in 0..4 {
            g.add_edge(i, (i + 1) % 4);
        }
        let (features, ends) = centerline_segments(&g, &raw_opts());
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].length, 4.0);
        assert_eq!(features[0].tortuosity, 0.0);
        assert_ne!(ends[0].0, ends[0].1);
    }

    #[test]
    fn test_lasso_ends_next_to_its_branch_point() {
        // Branch point 0 with a tail 0-1-2 and a loop 0-3-4-5-0.
        let mut g = VesselGraph::new();
        let coords = [
            [0.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [-2.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [0.0, 1.0, 0.0],
        ];
        for c in coords {
            g.add_vertex(Vertex::new(c, 1.0));
        }
        for (a, b) in [(0, 1), (1, 2), (0, 3), (3, 4), (4, 5), (5, 0)] {
            g.add_edge(a, b);
        }

        let (features, ends) = centerline_segments(&g, &raw_opts());
        assert_eq!(features.len(), 2);
        let lasso = features.iter().position(|f| f.length == 4.0).unwrap();
        assert_eq!(features[lasso].tortuosity, 0.0);
        let (start, end) = ends[lasso];
        assert_eq!(start, 0);
        assert!(end == 3 || end == 5);

        // Reduction keeps the loop as an edge off the branch point.
        reduce_graph(&mut g, &features, &ends);
        assert_eq!(g.vcount(), 3);
        assert_eq!(g.ecount(), 2);
        assert_eq!(g.degree(0), 2);
        assert!(g.edges().any(|((a, _), e)| a == 0 && e.length == Some(4.0)));
    }

    #[test]
    fn test_reduce_graph_keeps_segment_ends() {
        let mut g = line_graph(5, 1.0);
        let opts = FeatureOptions {
            reduce_graph: true,
            ..raw_opts()
        };
        feature_extraction(&mut g, "f", "None", None, &opts);
        assert_eq!(g.vcount(), 2);
        assert_eq!(g.ecount(), 1);
        let (_, e) = g.edges().next().unwrap();
        assert_eq!(e.length, Some(4.0));
    }

    #[test]
    fn test_planar_area_fraction() {
        let mut g = line_graph(3, 1.0);
        let opts = FeatureOptions {
            image_dim: 2,
            image_shape: Some(vec![10, 10]),
            ..raw_opts()
        };
        let (_, segs) = feature_extraction(&mut g, "f", "None", None, &opts);
        assert_eq!(segs[0].surface_area, 4.0);
        assert_eq!(segs[0].volume, Some(4.0));
    }

    #[test]
    fn test_branch_graph_fills_missing_features() {
        let mut g = VesselGraph::new();
        g.add_vertex(Vertex::new([0.0, 0.0, 0.0], 0.0));
        g.add_vertex(Vertex::new([0.0, 3.0, 4.0], 0.0));
        g.add_edge_with(
            0,
            1,
            EdgeAttrs {
                radius_avg: Some(1.0),
                length: Some(10.0),
                ..Default::default()
            },
        );
        let opts = FeatureOptions {
            graph_type: GraphType::Branches,
            ..raw_opts()
        };
        let (_, segs) = feature_extraction(&mut g, "f", "None", None, &opts);
        assert_eq!(segs[0].tortuosity, 2.0);
        assert!((segs[0].surface_area - 20.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_empty_graph() {
        let mut g = VesselGraph::new();
        let (result, _) = feature_extraction(&mut g, "f", "None", None, &raw_opts());
        assert!(matches!(result, NetworkResult::Empty { .. }));
    }
}
