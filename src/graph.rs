//! Undirected vessel graph.
//!
//! Vertices carry centerline coordinates and radii; edges carry segment
//! features once a graph has been reduced or loaded from a branch-point
//! file. The graph is simple: no self loops and no parallel edges.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A graph vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Position in voxel space, `[z, y, x]`.
    pub coords: [f64; 3],
    /// Radius in physical units.
    pub radius: f64,
    /// Radius in voxel units, used by rendering and graph exports.
    pub vis_radius: Option<f64>,
}

impl Vertex {
    pub fn new(coords: [f64; 3], radius: f64) -> Self {
        Self {
            coords,
            radius,
            vis_radius: None,
        }
    }
}

/// Segment features attached to an edge. Loaded graphs may lack any of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeAttrs {
    pub radius_avg: Option<f64>,
    pub radius_max: Option<f64>,
    pub radius_min: Option<f64>,
    pub radius_sd: Option<f64>,
    pub length: Option<f64>,
    pub volume: Option<f64>,
    pub surface_area: Option<f64>,
    pub tortuosity: Option<f64>,
    pub vis_radius: Option<f64>,
    /// Display colour as a hex triplet without the leading `#`.
    pub hex: Option<String>,
    /// Row of the ROI this edge was extracted from.
    pub roi_id: Option<usize>,
}

#[inline]
fn key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VesselGraph {
    vertices: Vec<Vertex>,
    adjacency: Vec<BTreeSet<usize>>,
    edges: BTreeMap<(usize, usize), EdgeAttrs>,
}

impl VesselGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vcount(&self) -> usize {
        self.vertices.len()
    }

    pub fn ecount(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        self.vertices.push(vertex);
        self.adjacency.push(BTreeSet::new());
        self.vertices.len() - 1
    }

    pub fn vertex(&self, v: usize) -> &Vertex {
        &self.vertices[v]
    }

    pub fn vertex_mut(&mut self, v: usize) -> &mut Vertex {
        &mut self.vertices[v]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Add an undirected edge. Returns false for self loops, duplicates or
    /// unknown vertices.
    pub fn add_edge(&mut self, a: usize, b: usize) -> bool {
        self.add_edge_with(a, b, EdgeAttrs::default())
    }

    pub fn add_edge_with(&mut self, a: usize, b: usize, attrs: EdgeAttrs) -> bool {
        if a == b || a >= self.vcount() || b >= self.vcount() {
            return false;
        }
        if !self.adjacency[a].insert(b) {
            return false;
        }
        self.adjacency[b].insert(a);
        self.edges.insert(key(a, b), attrs);
        true
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.edges.contains_key(&key(a, b))
    }

    pub fn remove_edge(&mut self, a: usize, b: usize) -> bool {
        if self.edges.remove(&key(a, b)).is_none() {
            return false;
        }
        self.adjacency[a].remove(&b);
        self.adjacency[b].remove(&a);
        true
    }

    pub fn clear_edges(&mut self) {
        self.edges.clear();
        for adj in &mut self.adjacency {
            adj.clear();
        }
    }

    pub fn edge(&self, a: usize, b: usize) -> Option<&EdgeAttrs> {
        self.edges.get(&key(a, b))
    }

    pub fn edge_mut(&mut self, a: usize, b: usize) -> Option<&mut EdgeAttrs> {
        self.edges.get_mut(&key(a, b))
    }

    /// Edges as `((source, target), attrs)` with `source < target`.
    pub fn edges(&self) -> impl Iterator<Item = ((usize, usize), &EdgeAttrs)> {
        self.edges.iter().map(|(k, v)| (*k, v))
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = ((usize, usize), &mut EdgeAttrs)> {
        self.edges.iter_mut().map(|(k, v)| (*k, v))
    }

    pub fn degree(&self, v: usize) -> usize {
        self.adjacency[v].len()
    }

    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[v].iter().copied()
    }

    /// Remove vertices and their incident edges. Remaining vertices keep
    /// their relative order and are renumbered contiguously.
    pub fn delete_vertices(&mut self, to_delete: &[usize]) {
        if to_delete.is_empty() {
            return;
        }
        let mut doomed = vec![false; self.vcount()];
        for &v in to_delete {
            if v < doomed.len() {
                doomed[v] = true;
            }
        }

        let mut remap: Vec<Option<usize>> = vec![None; self.vcount()];
        let mut next = 0usize;
        for (old, slot) in remap.iter_mut().enumerate() {
            if !doomed[old] {
                *slot = Some(next);
                next += 1;
            }
        }

        let old_vertices = std::mem::take(&mut self.vertices);
        self.vertices = old_vertices
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !doomed[*i])
            .map(|(_, v)| v)
            .collect();

        let old_edges = std::mem::take(&mut self.edges);
        self.adjacency = vec![BTreeSet::new(); self.vertices.len()];
        for ((a, b), attrs) in old_edges {
            if let (Some(na), Some(nb)) = (remap[a], remap[b]) {
                self.adjacency[na].insert(nb);
                self.adjacency[nb].insert(na);
                self.edges.insert(key(na, nb), attrs);
            }
        }
    }

    /// Drop all vertices without edges.
    pub fn delete_isolated(&mut self) -> usize {
        let isolated: Vec<usize> = (0..self.vcount()).filter(|&v| self.degree(v) == 0).collect();
        self.delete_vertices(&isolated);
        isolated.len()
    }

    /// Connected components, each sorted ascending, ordered by their
    /// smallest vertex.
    pub fn components(&self) -> Vec<Vec<usize>> {
        self.components_where(|_| true)
    }

    /// Connected components of the subgraph induced by the vertices that
    /// satisfy `keep`.
    pub fn components_where<F: Fn(usize) -> bool>(&self, keep: F) -> Vec<Vec<usize>> {
        let n = self.vcount();
        let inside: Vec<bool> = (0..n).map(&keep).collect();
        let mut seen = vec![false; n];
        let mut out = Vec::new();
        for start in 0..n {
            if seen[start] || !inside[start] {
                continue;
            }
            seen[start] = true;
            let mut comp = vec![start];
            let mut stack = vec![start];
            while let Some(v) = stack.pop() {
                for u in self.neighbors(v) {
                    if inside[u] && !seen[u] {
                        seen[u] = true;
                        comp.push(u);
                        stack.push(u);
                    }
                }
            }
            comp.sort_unstable();
            out.push(comp);
        }
        out
    }

    /// Degree of `v` counting only neighbours that satisfy `keep`.
    pub fn degree_within<F: Fn(usize) -> bool>(&self, v: usize, keep: F) -> usize {
        self.neighbors(v).filter(|&u| keep(u)).count()
    }

    /// Unweighted shortest path from `from` to `to`, restricted to vertices
    /// that satisfy `keep`. Both ends must satisfy it.
    pub fn shortest_path_within<F: Fn(usize) -> bool>(
        &self,
        from: usize,
        to: usize,
        keep: F,
    ) -> Option<Vec<usize>> {
        if !keep(from) || !keep(to) {
            return None;
        }
        let mut prev: Vec<Option<usize>> = vec![None; self.vcount()];
        let mut seen = vec![false; self.vcount()];
        let mut queue = VecDeque::new();
        seen[from] = true;
        queue.push_back(from);
        while let Some(v) = queue.pop_front() {
            if v == to {
                let mut path = vec![to];
                let mut cur = to;
                while let Some(p) = prev[cur] {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                return Some(path);
            }
            for u in self.neighbors(v) {
                if !seen[u] && keep(u) {
                    seen[u] = true;
                    prev[u] = Some(v);
                    queue.push_back(u);
                }
            }
        }
        None
    }

    pub fn shortest_path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        self.shortest_path_within(from, to, |_| true)
    }

    /// Maximal cliques of the subgraph induced by `subset` whose size lies
    /// in `min..=max`. Bron–Kerbosch with pivoting.
    pub fn maximal_cliques(&self, subset: &[usize], min: usize, max: usize) -> Vec<Vec<usize>> {
        let members: BTreeSet<usize> = subset.iter().copied().collect();
        let nbrs = |v: usize| -> BTreeSet<usize> {
            self.adjacency[v]
                .iter()
                .copied()
                .filter(|u| members.contains(u))
                .collect()
        };

        let mut out = Vec::new();
        let mut stack: Vec<(Vec<usize>, BTreeSet<usize>, BTreeSet<usize>)> =
            vec![(Vec::new(), members.clone(), BTreeSet::new())];
        while let Some((r, mut p, mut x)) = stack.pop() {
            if p.is_empty() {
                if x.is_empty() && r.len() >= min && r.len() <= max {
                    let mut clique = r.clone();
                    clique.sort_unstable();
                    out.push(clique);
                }
                continue;
            }
            let pivot = p
                .iter()
                .chain(x.iter())
                .copied()
                .max_by_key(|&u| nbrs(u).intersection(&p).count())
                .unwrap_or(0);
            let pivot_nbrs = nbrs(pivot);
            let candidates: Vec<usize> = p.difference(&pivot_nbrs).copied().collect();
            for v in candidates {
                let nv = nbrs(v);
                let mut r2 = r.clone();
                r2.push(v);
                stack.push((
                    r2,
                    p.intersection(&nv).copied().collect(),
                    x.intersection(&nv).copied().collect(),
                ));
                p.remove(&v);
                x.insert(v);
            }
        }
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph(n: usize) -> VesselGraph {
        let mut g = VesselGraph::new();
        for i in 0..n {
            g.add_vertex(Vertex::new([0.0, 0.0, i as f64], 1.0));
        }
        for i in 1..n {
            g.add_edge(i - 1, i);
        }
        g
    }

    #[test]
    fn test_add_edge_rejects_loops_and_duplicates() {
        let mut g = path_graph(3);
        assert!(!g.add_edge(0, 0));
        assert!(!g.add_edge(1, 0));
        assert_eq!(g.ecount(), 2);
        assert_eq!(g.degree(1), 2);
    }

    #[test]
    fn test_delete_vertices_remaps() {
        let mut g = path_graph(5);
        g.edge_mut(3, 4).unwrap().length = Some(2.0);
        g.delete_vertices(&[1]);
        assert_eq!(g.vcount(), 4);
        assert_eq!(g.ecount(), 2);
        assert!(g.has_edge(1, 2));
        assert_eq!(g.edge(2, 3).unwrap().length, Some(2.0));
        assert_eq!(g.vertex(1).coords[2], 2.0);
    }

    #[test]
    fn test_components_where() {
        let g = path_graph(5);
        let comps = g.components_where(|v| v != 2);
        assert_eq!(comps, vec![vec![0, 1], vec![3, 4]]);
        assert_eq!(g.components().len(), 1);
    }

    #[test]
    fn test_shortest_path() {
        let mut g = path_graph(4);
        g.add_edge(0, 3);
        assert_eq!(g.shortest_path(0, 3), Some(vec![0, 3]));
        assert_eq!(g.shortest_path_within(1, 3, |v| v != 0), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_maximal_cliques() {
        let mut g = path_graph(4);
        g.add_edge(0, 2);
        // Triangle 0-1-2 plus the pendant edge 2-3.
        let all: Vec<usize> = (0..4).collect();
        assert_eq!(g.maximal_cliques(&all, 3, 4), vec![vec![0, 1, 2]]);
        assert_eq!(g.maximal_cliques(&all, 2, 4), vec![vec![0, 1, 2], vec![2, 3]]);
    }

    #[test]
    fn test_delete_isolated() {
        let mut g = path_graph(2);
        g.add_vertex(Vertex::new([5.0, 5.0, 5.0], 1.0));
        assert_eq!(g.delete_isolated(), 1);
        assert_eq!(g.vcount(), 2);
    }
}
