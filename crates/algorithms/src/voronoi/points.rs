//! River point generation and bank classification
//!
//! Densifies the valley polygon rings and the thalweg into the point set
//! that seeds the Voronoi diagram, then labels each boundary point with
//! the bank it belongs to. Bank attributes are what later separates
//! medial-axis edges from the rest of the diagram.

use geo::{BoundingRect, Coord, Densify, LineString, Polygon};
use riparia_core::{Error, Result};

/// Which bank of the thalweg a boundary point falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankSide {
    Left,
    Right,
}

/// Classification of a Voronoi seed point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    /// Thalweg point inside the valley
    Interior,
    /// Valley boundary point; `island` is set for interior-ring points
    Bank { side: BankSide, island: Option<usize> },
}

/// Ephemeral 2D point with bank attributes; produced and consumed within
/// one centerline build, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct RiverPoint {
    pub coord: Coord<f64>,
    pub kind: PointKind,
}

/// Densify one ring into evenly spaced points.
///
/// Original vertices are kept; the closing duplicate vertex is dropped.
pub fn densify_ring(ring: &LineString<f64>, spacing: f64) -> Vec<Coord<f64>> {
    let dense = ring.densify(spacing);
    let mut coords = dense.0;
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

/// Extend a line past both ends along its end bearings.
///
/// Guarantees the thalweg fully crosses the classification rectangle so
/// every boundary point has a defined side.
pub fn extrapolate_ends(line: &LineString<f64>, distance: f64) -> Result<LineString<f64>> {
    if line.0.len() < 2 {
        return Err(Error::GeometryDegeneracy { stage: "densify" });
    }
    let n = line.0.len();
    let head_dir = unit(line.0[0], line.0[1]);
    let tail_dir = unit(line.0[n - 2], line.0[n - 1]);

    let mut coords = Vec::with_capacity(n + 2);
    coords.push(Coord {
        x: line.0[0].x - head_dir.0 * distance,
        y: line.0[0].y - head_dir.1 * distance,
    });
    coords.extend_from_slice(&line.0);
    coords.push(Coord {
        x: line.0[n - 1].x + tail_dir.0 * distance,
        y: line.0[n - 1].y + tail_dir.1 * distance,
    });
    Ok(LineString::from(coords))
}

fn unit(a: Coord<f64>, b: Coord<f64>) -> (f64, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt().max(f64::MIN_POSITIVE);
    (dx / len, dy / len)
}

/// Result of bank classification
pub struct ClassifiedPoints {
    pub points: Vec<RiverPoint>,
    /// Whether the injected thalweg coordinates were reversed to make
    /// the clockwise boundary order consistent
    pub reversed: bool,
}

/// Classify boundary and thalweg points into river points.
///
/// Builds a buffered bounding rectangle, sorts its corners together with
/// the thalweg's endpoints clockwise around the rectangle centroid, and
/// detects whether the thalweg's tail is encountered before its head in
/// that order; if so the injected thalweg coordinates are reversed. Each
/// boundary point is then assigned LEFT or RIGHT by which side of the
/// (oriented) thalweg it falls on.
///
/// The reverse-if-tail-before-head rule is the established contract; it
/// is known to be fragile for unusual thalweg orientations rather than a
/// proven-general algorithm.
pub fn classify_points(
    polygon: &Polygon<f64>,
    thalweg_ext: &LineString<f64>,
    ring_points: &[(Coord<f64>, Option<usize>)],
    thalweg_points: &[Coord<f64>],
    rect_buffer: f64,
) -> Result<ClassifiedPoints> {
    if thalweg_ext.0.len() < 2 {
        return Err(Error::GeometryDegeneracy { stage: "classify" });
    }
    let rect = polygon
        .bounding_rect()
        .ok_or(Error::GeometryDegeneracy { stage: "classify" })?;

    let (min_x, min_y) = (rect.min().x - rect_buffer, rect.min().y - rect_buffer);
    let (max_x, max_y) = (rect.max().x + rect_buffer, rect.max().y + rect_buffer);
    let center = Coord { x: (min_x + max_x) / 2.0, y: (min_y + max_y) / 2.0 };

    // Rectangle corners plus the thalweg head/tail markers, sorted
    // clockwise about the rectangle centroid.
    let head = thalweg_ext.0[0];
    let tail = thalweg_ext.0[thalweg_ext.0.len() - 1];
    let mut markers: Vec<(usize, Coord<f64>)> = vec![
        (0, Coord { x: min_x, y: max_y }),
        (0, Coord { x: max_x, y: max_y }),
        (0, Coord { x: max_x, y: min_y }),
        (0, Coord { x: min_x, y: min_y }),
        (1, head),
        (2, tail),
    ];
    markers.sort_by(|a, b| {
        let aa = (a.1.y - center.y).atan2(a.1.x - center.x);
        let ab = (b.1.y - center.y).atan2(b.1.x - center.x);
        // Descending angle = clockwise scan
        ab.partial_cmp(&aa).unwrap_or(std::cmp::Ordering::Equal)
    });

    let head_pos = markers.iter().position(|(tag, _)| *tag == 1);
    let tail_pos = markers.iter().position(|(tag, _)| *tag == 2);
    let reversed = match (head_pos, tail_pos) {
        (Some(h), Some(t)) => t < h,
        _ => false,
    };

    let oriented: Vec<Coord<f64>> = if reversed {
        thalweg_ext.0.iter().rev().copied().collect()
    } else {
        thalweg_ext.0.clone()
    };

    let mut points = Vec::with_capacity(ring_points.len() + thalweg_points.len());
    for &(coord, island) in ring_points {
        let side = side_of(&oriented, coord);
        points.push(RiverPoint {
            coord,
            kind: PointKind::Bank { side, island },
        });
    }
    for &coord in thalweg_points {
        points.push(RiverPoint { coord, kind: PointKind::Interior });
    }

    Ok(ClassifiedPoints { points, reversed })
}

/// Side of the oriented polyline the point falls on, judged against the
/// nearest segment.
fn side_of(line: &[Coord<f64>], p: Coord<f64>) -> BankSide {
    let mut best_d2 = f64::INFINITY;
    let mut best_cross = 0.0;

    for pair in line.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (abx, aby) = (b.x - a.x, b.y - a.y);
        let (apx, apy) = (p.x - a.x, p.y - a.y);
        let len2 = (abx * abx + aby * aby).max(f64::MIN_POSITIVE);
        let t = ((apx * abx + apy * aby) / len2).clamp(0.0, 1.0);
        let (cx, cy) = (a.x + t * abx, a.y + t * aby);
        let d2 = (p.x - cx).powi(2) + (p.y - cy).powi(2);
        if d2 < best_d2 {
            best_d2 = d2;
            best_cross = abx * apy - aby * apx;
        }
    }

    if best_cross > 0.0 {
        BankSide::Left
    } else {
        BankSide::Right
    }
}
