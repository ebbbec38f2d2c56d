//! Rank three vehicles against a corridor.
//!
//! Run with: cargo run --example rank_corridor

use geo::polygon;
use route_rank::{
    Bounds, GpsPoint, Ping, PingCollection, RankingConfig, Route, RouteAndSurroundingFeatures,
    SortField,
};

fn main() {
    // A road heading north out of London
    let route = Route::new(vec![
        GpsPoint::new(51.50, -0.12),
        GpsPoint::new(51.55, -0.12),
        GpsPoint::new(51.60, -0.12),
    ]);
    let corridor = polygon![
        (x: -0.125, y: 51.50),
        (x: -0.115, y: 51.50),
        (x: -0.115, y: 51.60),
        (x: -0.125, y: 51.60),
    ];
    let envelope = Bounds { min_lat: 51.45, max_lat: 51.65, min_lng: -0.22, max_lng: -0.02 };

    let mut pings = Vec::new();

    // Drives the whole road, one ping a minute
    for i in 0..20 {
        pings.push(Ping::new("van-12", 51.50 + i as f64 * 0.005, -0.12, Some(i * 60_000)));
    }

    // Parked on the road all day
    for i in 0..20 {
        pings.push(Ping::new("car-3", 51.55, -0.12, Some(i * 3_600_000)));
    }

    // Drives around town, crossing the road once
    for i in 0..20 {
        pings.push(Ping::new("taxi-8", 51.55, -0.20 + i as f64 * 0.008, Some(i * 60_000)));
    }

    let box_features = PingCollection::from_pings(pings);
    let tube_features = box_features.filter(|p| (p.point.longitude + 0.12).abs() <= 0.005);

    let config = RankingConfig {
        grid_divisions: 40,
        route_divisions: 20,
        ..RankingConfig::default()
    };

    println!("Corridor Ranking Example\n");
    println!(
        "Route length: {:.0}m, grid: {}x{}\n",
        route.length(),
        config.grid_divisions,
        config.grid_divisions
    );

    for sort_by in [SortField::CombinedScore, SortField::CombinedScoreNoMotion] {
        let config = RankingConfig { sort_by, ..config.clone() };
        let ranker = RouteAndSurroundingFeatures::new(&route, &box_features, &tube_features, &config);
        let ranked = ranker.rank_sorted(&envelope, &[corridor.clone()]).unwrap();

        println!("Sorted by {:?}:", sort_by);
        for (i, entity) in ranked.iter().enumerate() {
            println!(
                "   {}. {:<8} score={:>10.3}  tube={:>2} box={:>2} motion={:.2}",
                i + 1,
                entity.key,
                entity.score,
                entity.values.tube_count,
                entity.values.box_count,
                entity.values.motion_evidence.total
            );
        }
        println!();
    }
}
