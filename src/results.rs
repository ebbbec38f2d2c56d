//! Sorting and paging of ranking results.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::ranking::RankingValues;

/// Score used to order ranked entities, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SortField {
    #[default]
    CombinedScore,
    CombinedScoreNoMotion,
    TfIdf,
    ScaledTfIdf,
    TubeCount,
    BoxCount,
    PercentageOfTubeCellsCovered,
    TubeCellDeviationScore,
    MotionEvidenceTotal,
    MotionEvidenceMax,
}

impl SortField {
    /// The value this field sorts by.
    pub fn score(&self, values: &RankingValues) -> f64 {
        match self {
            SortField::CombinedScore => values.combined_score(),
            SortField::CombinedScoreNoMotion => values.combined_score_no_motion(),
            SortField::TfIdf => values.tf_idf(),
            SortField::ScaledTfIdf => values.scaled_tf_idf(),
            SortField::TubeCount => values.tube_count as f64,
            SortField::BoxCount => values.box_count as f64,
            SortField::PercentageOfTubeCellsCovered => values.percentage_of_tube_cells_covered(),
            SortField::TubeCellDeviationScore => values.tube_cell_deviation_score(),
            SortField::MotionEvidenceTotal => values.motion_evidence.total,
            SortField::MotionEvidenceMax => values.motion_evidence.max,
        }
    }
}

/// One entry of a sorted result page.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankedEntity {
    pub key: String,
    pub values: RankingValues,
    /// Value of the sort field for this entity
    pub score: f64,
}

/// Sort `results` by `sort_by` (descending), then skip `skip` entries and
/// return at most `max` of the rest.
///
/// Ties are broken by key so the order is deterministic. NaN scores sort
/// last.
pub fn top_ranked(
    results: &HashMap<String, RankingValues>,
    sort_by: SortField,
    skip: usize,
    max: usize,
) -> Vec<RankedEntity> {
    let mut ranked: Vec<RankedEntity> = results
        .iter()
        .map(|(key, values)| RankedEntity {
            key: key.clone(),
            values: *values,
            score: sort_by.score(values),
        })
        .collect();

    ranked.sort_by(|a, b| descending(a.score, b.score).then_with(|| a.key.cmp(&b.key)));

    ranked.into_iter().skip(skip).take(max).collect()
}

fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
