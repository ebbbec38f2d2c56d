//! Rank two time partitions separately and merge the results.
//!
//! Run with: cargo run --example partition_merge --features parallel

use std::collections::HashMap;
use std::time::Instant;

use geo::polygon;
use route_rank::{
    top_ranked, Bounds, GpsPoint, Ping, PingCollection, RankingConfig, RankingResults, Route,
    RouteAndSurroundingFeatures, SortField,
};

const DAY_MS: i64 = 86_400_000;

fn main() {
    println!("Partition Merge Example\n");

    let route = Route::new(vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(1.0, 0.0)]);
    let corridor = polygon![
        (x: -0.01, y: 0.0),
        (x: 0.01, y: 0.0),
        (x: 0.01, y: 1.0),
        (x: -0.01, y: 1.0),
    ];
    let envelope = Bounds { min_lat: -0.5, max_lat: 1.5, min_lng: -1.0, max_lng: 1.0 };
    let config = RankingConfig::default();

    // 200 entities over two days: every tenth one drives the route each day
    let mut pings = Vec::new();
    for day in 0..2_i64 {
        for entity in 0..200 {
            let key = format!("entity-{:03}", entity);
            for i in 0..50_i64 {
                let t = day * DAY_MS + i * 60_000;
                let (lat, lng) = if entity % 10 == 0 {
                    (i as f64 * 0.02, 0.0)
                } else {
                    let phase = (entity as f64 * 0.37 + i as f64 * 0.11).sin();
                    (0.5 + phase * 0.4, (entity as f64 * 0.01) - 1.0 + 0.005)
                };
                pings.push(Ping::new(key.clone(), lat, lng, Some(t)));
            }
        }
    }
    println!("Generated {} pings", pings.len());

    let rank_day = |day: i64| -> RankingResults {
        let box_features = PingCollection::from_pings(
            pings
                .iter()
                .filter(|p| p.timestamp.map_or(false, |t| t / DAY_MS == day))
                .cloned(),
        );
        let tube_features = box_features.filter(|p| p.point.longitude.abs() <= 0.01);
        RouteAndSurroundingFeatures::new(&route, &box_features, &tube_features, &config)
            .rank(&envelope, &[corridor.clone()])
            .unwrap()
    };

    let start = Instant::now();
    let day_one = rank_day(0);
    let day_two = rank_day(1);
    println!("Ranked both partitions in {:?}", start.elapsed());

    let mut merged: RankingResults = HashMap::new();
    for partition in [day_one, day_two] {
        for (key, values) in partition {
            let combined = match merged.get(&key) {
                Some(existing) => existing.merge(&values).unwrap(),
                None => values,
            };
            merged.insert(key, combined);
        }
    }

    println!("\nTop 5 after merge:");
    for entity in top_ranked(&merged, SortField::CombinedScore, 0, 5) {
        println!(
            "   {}  score={:.3}  tube={}  motion={:.2}",
            entity.key, entity.score, entity.values.tube_count, entity.values.motion_evidence.total
        );
    }
}
