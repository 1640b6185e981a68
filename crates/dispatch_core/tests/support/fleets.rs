use dispatch_core::point::Point;
use dispatch_core::spatial::{IndexConfig, SpatialIndex};

/// Index that never rebuilds, so structure depends only on insert/delete order.
pub fn plain_index(points: &[Point]) -> SpatialIndex {
    let mut index = SpatialIndex::new(IndexConfig {
        rebuild_height_factor: None,
    });
    for point in points {
        index.insert(*point);
    }
    index
}

/// `side * side` taxis on an integer lattice.
pub fn lattice(side: usize) -> Vec<Point> {
    (0..side)
        .flat_map(|x| (0..side).map(move |y| Point::new(x as f64, y as f64)))
        .collect()
}

pub fn sorted(mut points: Vec<Point>) -> Vec<Point> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points
}
