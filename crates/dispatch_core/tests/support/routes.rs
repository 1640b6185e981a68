use dispatch_core::point::Point;
use dispatch_core::routing::{RoadNetwork, Route};

/// Route starts at `from`, ends at `to`, follows existing edges and its edge
/// weights add up to the reported distance.
pub fn assert_route_is_valid(network: &RoadNetwork, route: &Route, from: Point, to: Point) {
    assert_eq!(route.path.first(), Some(&from), "route must start at {from}");
    assert_eq!(route.path.last(), Some(&to), "route must end at {to}");
    let edges = network.edges();
    let mut total = 0.0;
    for pair in route.path.windows(2) {
        let edge = edges
            .iter()
            .find(|e| (e.from == pair[0] && e.to == pair[1]) || (e.from == pair[1] && e.to == pair[0]))
            .unwrap_or_else(|| panic!("no edge between {} and {}", pair[0], pair[1]));
        total += edge.weight;
    }
    assert!(
        (total - route.distance).abs() < 1e-9,
        "edge weights sum to {total}, route reports {}",
        route.distance
    );
}
