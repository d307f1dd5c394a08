//! Delaunay triangulation and its Voronoi dual
//!
//! Incremental Bowyer-Watson triangulation over the river points, then
//! the Voronoi diagram read off as the dual: every interior Delaunay
//! edge shared by two triangles yields one Voronoi edge between their
//! circumcenters, tagged with the two generating sites.

use std::collections::HashMap;

use geo::Coord;
use riparia_core::{Error, Result};

/// A triangle defined by three site indices
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: usize,
    pub v1: usize,
    pub v2: usize,
}

/// Circumcircle of a triangle
#[derive(Debug, Clone, Copy)]
struct Circumcircle {
    cx: f64,
    cy: f64,
    radius_sq: f64,
}

/// One finite Voronoi edge, dual to the Delaunay edge `(site_a, site_b)`
#[derive(Debug, Clone, Copy)]
pub struct VoronoiEdge {
    pub start: Coord<f64>,
    pub end: Coord<f64>,
    pub site_a: usize,
    pub site_b: usize,
}

/// Compute the circumcircle of three points
fn circumcircle(p0: Coord<f64>, p1: Coord<f64>, p2: Coord<f64>) -> Option<Circumcircle> {
    let (ax, ay) = (p0.x, p0.y);
    let (bx, by) = (p1.x, p1.y);
    let (cx, cy) = (p2.x, p2.y);

    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    if d.abs() < 1e-12 {
        return None; // Degenerate triangle
    }

    let ux = ((ax * ax + ay * ay) * (by - cy)
        + (bx * bx + by * by) * (cy - ay)
        + (cx * cx + cy * cy) * (ay - by))
        / d;

    let uy = ((ax * ax + ay * ay) * (cx - bx)
        + (bx * bx + by * by) * (ax - cx)
        + (cx * cx + cy * cy) * (bx - ax))
        / d;

    let dx = ax - ux;
    let dy = ay - uy;

    Some(Circumcircle {
        cx: ux,
        cy: uy,
        radius_sq: dx * dx + dy * dy,
    })
}

/// Build a Delaunay triangulation using the Bowyer-Watson algorithm.
pub fn delaunay(sites: &[Coord<f64>]) -> Vec<Triangle> {
    if sites.len() < 3 {
        return Vec::new();
    }

    // Find bounding box
    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;

    for p in sites {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let dx = max_x - min_x;
    let dy = max_y - min_y;
    let delta = dx.max(dy).max(1.0);

    // Super-triangle vertices occupy indices 0, 1, 2
    let mut vertices: Vec<Coord<f64>> = vec![
        Coord { x: min_x - 10.0 * delta, y: min_y - delta },
        Coord { x: min_x + 0.5 * dx, y: max_y + 10.0 * delta },
        Coord { x: max_x + 10.0 * delta, y: min_y - delta },
    ];

    let mut triangles: Vec<Triangle> = vec![Triangle { v0: 0, v1: 1, v2: 2 }];

    // Add each site incrementally
    for point in sites {
        let vi = vertices.len();
        vertices.push(*point);

        // Triangles whose circumcircle contains the new site
        let mut bad_triangles: Vec<usize> = Vec::new();

        for (ti, tri) in triangles.iter().enumerate() {
            if let Some(cc) = circumcircle(vertices[tri.v0], vertices[tri.v1], vertices[tri.v2]) {
                let dx = point.x - cc.cx;
                let dy = point.y - cc.cy;
                if dx * dx + dy * dy <= cc.radius_sq {
                    bad_triangles.push(ti);
                }
            }
        }

        // Boundary polygon of the hole (edges not shared by two bad triangles)
        let mut boundary: Vec<(usize, usize)> = Vec::new();

        for &bi in &bad_triangles {
            let tri = &triangles[bi];
            let edges = [(tri.v0, tri.v1), (tri.v1, tri.v2), (tri.v2, tri.v0)];

            for &(ea, eb) in &edges {
                let shared = bad_triangles.iter().any(|&oi| {
                    if oi == bi {
                        return false;
                    }
                    let other = &triangles[oi];
                    let oe = [
                        (other.v0, other.v1),
                        (other.v1, other.v2),
                        (other.v2, other.v0),
                    ];
                    oe.iter()
                        .any(|&(oa, ob)| (oa == ea && ob == eb) || (oa == eb && ob == ea))
                });

                if !shared {
                    boundary.push((ea, eb));
                }
            }
        }

        // Remove bad triangles (in reverse order to preserve indices)
        bad_triangles.sort_unstable_by(|a, b| b.cmp(a));
        for bi in bad_triangles {
            triangles.swap_remove(bi);
        }

        // New triangles from boundary edges to the new vertex
        for &(ea, eb) in &boundary {
            triangles.push(Triangle { v0: ea, v1: eb, v2: vi });
        }
    }

    // Drop triangles that reference super-triangle vertices (0, 1, 2)
    triangles.retain(|tri| tri.v0 >= 3 && tri.v1 >= 3 && tri.v2 >= 3);

    // Remap indices past the super-triangle offset
    for tri in &mut triangles {
        tri.v0 -= 3;
        tri.v1 -= 3;
        tri.v2 -= 3;
    }

    triangles
}

/// Extract the finite Voronoi edges dual to a triangulation.
///
/// Each Delaunay edge shared by exactly two triangles contributes the
/// segment between their circumcenters; edges on the convex hull (one
/// triangle) are unbounded and skipped. The valley boundary is always
/// well inside the hull, so the skipped rays never carry the medial
/// axis.
pub fn voronoi_edges(sites: &[Coord<f64>], triangles: &[Triangle]) -> Result<Vec<VoronoiEdge>> {
    if triangles.is_empty() {
        return Err(Error::GeometryDegeneracy { stage: "voronoi" });
    }

    let centers: Vec<Option<Coord<f64>>> = triangles
        .iter()
        .map(|tri| {
            circumcircle(sites[tri.v0], sites[tri.v1], sites[tri.v2])
                .map(|cc| Coord { x: cc.cx, y: cc.cy })
        })
        .collect();

    // Delaunay edge -> adjacent triangle indices
    let mut adjacency: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (ti, tri) in triangles.iter().enumerate() {
        for (a, b) in [(tri.v0, tri.v1), (tri.v1, tri.v2), (tri.v2, tri.v0)] {
            let key = if a < b { (a, b) } else { (b, a) };
            adjacency.entry(key).or_default().push(ti);
        }
    }

    let mut edges = Vec::new();
    for (&(site_a, site_b), tris) in &adjacency {
        if tris.len() != 2 {
            continue; // Hull edge, unbounded dual
        }
        let (Some(start), Some(end)) = (centers[tris[0]], centers[tris[1]]) else {
            continue;
        };
        if (start.x - end.x).abs() < 1e-12 && (start.y - end.y).abs() < 1e-12 {
            continue; // Cocircular sites collapse the dual edge
        }
        edges.push(VoronoiEdge { start, end, site_a, site_b });
    }

    if edges.is_empty() {
        return Err(Error::GeometryDegeneracy { stage: "voronoi" });
    }
    Ok(edges)
}
