use super::threshold::ThresholdSpec;
use crate::core::models::consensus::{Classification, ConsensusAnnotation};
use crate::core::models::prediction::PredictionResult;
use crate::core::models::predictor::PredictorKind;
use crate::core::models::structure::{Exposure, StructureContext};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Merges the thresholded predictions of all successful predictors into one consensus.
///
/// Only exposed residues may carry a vote. A residue is active if any predictor marks it
/// active and passive if it is not active but some predictor marks it passive. Exposed
/// residues without any vote become passive when they lie within `passive_radius` of a
/// consensus active residue.
pub struct Aggregator {
    passive_radius: f64,
}

impl Aggregator {
    pub fn new(passive_radius: f64) -> Self {
        Self { passive_radius }
    }

    pub fn aggregate(
        &self,
        context: &StructureContext,
        results: &[PredictionResult],
        thresholds: &BTreeMap<PredictorKind, ThresholdSpec>,
    ) -> ConsensusAnnotation {
        let mut votes: BTreeMap<PredictorKind, BTreeMap<isize, Classification>> = BTreeMap::new();

        for result in results {
            let Some(spec) = thresholds.get(&result.predictor) else {
                warn!(predictor = %result.predictor, "No cutoffs for predictor, ignoring its results");
                continue;
            };
            let mut filtered = BTreeMap::new();
            for (residue, class) in spec.classify(result) {
                match context.exposure(residue) {
                    Exposure::Exposed => {
                        filtered.insert(residue, class);
                    }
                    exposure => debug!(
                        predictor = %result.predictor,
                        residue,
                        "Discarding {:?} vote on {:?} residue",
                        class,
                        exposure
                    ),
                }
            }
            votes.entry(result.predictor).or_default().extend(filtered);
        }

        let mut active = BTreeSet::new();
        let mut passive = BTreeSet::new();
        for predictor_votes in votes.values() {
            for (&residue, &class) in predictor_votes {
                match class {
                    Classification::Active => {
                        active.insert(residue);
                    }
                    Classification::Passive => {
                        passive.insert(residue);
                    }
                    Classification::Neutral => {}
                }
            }
        }
        passive.retain(|r| !active.contains(r));

        let voted: BTreeSet<isize> = active.union(&passive).copied().collect();
        let proximity: BTreeSet<isize> = context
            .residue_numbers()
            .filter(|r| !voted.contains(r))
            .filter(|&r| context.exposure(r) == Exposure::Exposed)
            .filter(|&r| {
                active
                    .iter()
                    .any(|&a| context.distances().within(r, a, self.passive_radius))
            })
            .collect();

        let residues: BTreeMap<isize, Classification> = context
            .residue_numbers()
            .map(|r| {
                let class = if active.contains(&r) {
                    Classification::Active
                } else if passive.contains(&r) || proximity.contains(&r) {
                    Classification::Passive
                } else {
                    Classification::Neutral
                };
                (r, class)
            })
            .collect();

        info!(
            active = active.len(),
            passive = passive.len() + proximity.len(),
            proximity = proximity.len(),
            "Consensus built from {} predictor(s)",
            votes.len()
        );

        ConsensusAnnotation::new(residues, votes, proximity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::prediction::ResidueScore;
    use crate::core::models::structure::DistanceTable;

    const RADIUS: f64 = 6.5;

    fn score_spec() -> ThresholdSpec {
        ThresholdSpec::Score {
            active: 0.5,
            passive: 0.2,
        }
    }

    fn result(predictor: PredictorKind, scores: &[(isize, f64)]) -> PredictionResult {
        PredictionResult::new(
            predictor,
            scores
                .iter()
                .map(|&(r, s)| ResidueScore::new(r, Some(s)))
                .collect(),
        )
    }

    fn scenario_context() -> StructureContext {
        StructureContext::builder("scenario", 'A')
            .residues([(10, "LYS"), (11, "LEU"), (12, "ASP"), (13, "GLU")])
            .exposure(10, Exposure::Exposed)
            .exposure(11, Exposure::Buried)
            .exposure(12, Exposure::Exposed)
            .exposure(13, Exposure::Exposed)
            .distances(DistanceTable::from_iter([(10, 12, 4.0), (10, 13, 12.0)]))
            .build()
            .unwrap()
    }

    #[test]
    fn end_to_end_scenario_matches_expected_consensus() {
        let context = scenario_context();
        let results = vec![result(PredictorKind::Psiver, &[(10, 0.9), (11, 0.9)])];
        let thresholds = BTreeMap::from([(PredictorKind::Psiver, score_spec())]);

        let consensus = Aggregator::new(RADIUS).aggregate(&context, &results, &thresholds);

        let expected = BTreeMap::from([
            (10, Classification::Active),
            (11, Classification::Neutral),
            (12, Classification::Passive),
            (13, Classification::Neutral),
        ]);
        assert_eq!(consensus.iter().collect::<BTreeMap<_, _>>(), expected);
        assert!(consensus.is_proximity_passive(12));
        assert!(!consensus.is_proximity_passive(10));
    }

    #[test]
    fn active_dominates_passive_regardless_of_order() {
        let context = StructureContext::builder("t", 'A')
            .residues([(1, "ALA"), (2, "GLY")])
            .exposures([(1, Exposure::Exposed), (2, Exposure::Exposed)].into())
            .build()
            .unwrap();
        let thresholds = BTreeMap::from([
            (PredictorKind::Predus2, score_spec()),
            (PredictorKind::Psiver, score_spec()),
        ]);
        let passive_first = vec![
            result(PredictorKind::Predus2, &[(1, 0.3)]),
            result(PredictorKind::Psiver, &[(1, 0.8)]),
        ];
        let active_first: Vec<_> = passive_first.iter().rev().cloned().collect();

        let aggregator = Aggregator::new(RADIUS);
        let a = aggregator.aggregate(&context, &passive_first, &thresholds);
        let b = aggregator.aggregate(&context, &active_first, &thresholds);

        assert_eq!(a, b);
        assert_eq!(a.get(1), Some(Classification::Active));
        assert!(a.active().is_disjoint(&a.passive()));
        assert_eq!(a.vote(PredictorKind::Predus2, 1), Classification::Passive);
    }

    #[test]
    fn buried_and_unknown_residues_are_never_active() {
        let context = StructureContext::builder("t", 'A')
            .residues([(1, "ALA"), (2, "GLY"), (3, "SER")])
            .exposure(1, Exposure::Buried)
            .exposure(3, Exposure::Exposed)
            .build()
            .unwrap();
        let thresholds = BTreeMap::from([(PredictorKind::Psiver, score_spec())]);
        let results = vec![result(PredictorKind::Psiver, &[(1, 0.99), (2, 0.99), (3, 0.1)])];

        let consensus = Aggregator::new(RADIUS).aggregate(&context, &results, &thresholds);

        assert!(consensus.active().is_empty());
        assert_eq!(consensus.len(), 3);
        assert!(consensus.iter().all(|(_, c)| c == Classification::Neutral));
    }

    #[test]
    fn proximity_rule_is_inclusive_and_skips_buried_neighbours() {
        let context = StructureContext::builder("t", 'A')
            .residues([(1, "ALA"), (2, "GLY"), (3, "SER"), (4, "THR")])
            .exposure(1, Exposure::Exposed)
            .exposure(2, Exposure::Exposed)
            .exposure(3, Exposure::Buried)
            .exposure(4, Exposure::Exposed)
            .distances(DistanceTable::from_iter([
                (1, 2, RADIUS),
                (1, 3, 2.0),
                (1, 4, RADIUS + 0.01),
            ]))
            .build()
            .unwrap();
        let thresholds = BTreeMap::from([(PredictorKind::Psiver, score_spec())]);
        let results = vec![result(PredictorKind::Psiver, &[(1, 0.9)])];

        let consensus = Aggregator::new(RADIUS).aggregate(&context, &results, &thresholds);

        assert_eq!(consensus.get(2), Some(Classification::Passive));
        assert_eq!(consensus.get(3), Some(Classification::Neutral));
        assert_eq!(consensus.get(4), Some(Classification::Neutral));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let context = scenario_context();
        let results = vec![
            result(PredictorKind::Psiver, &[(10, 0.9), (12, 0.3)]),
            result(PredictorKind::ProMate, &[(13, 0.4), (10, 0.1)]),
        ];
        let thresholds = BTreeMap::from([
            (PredictorKind::Psiver, score_spec()),
            (
                PredictorKind::ProMate,
                ThresholdSpec::Rank {
                    active: 1,
                    passive: 2,
                },
            ),
        ]);
        let aggregator = Aggregator::new(RADIUS);

        let first = aggregator.aggregate(&context, &results, &thresholds);
        let second = aggregator.aggregate(&context, &results, &thresholds);

        assert_eq!(first, second);
        assert_eq!(first.get(13), Some(Classification::Active));
        assert_eq!(first.get(10), Some(Classification::Active));
    }

    #[test]
    fn predictors_without_cutoffs_are_ignored() {
        let context = scenario_context();
        let results = vec![result(PredictorKind::Predus2, &[(10, 0.9)])];
        let consensus = Aggregator::new(RADIUS).aggregate(&context, &results, &BTreeMap::new());
        assert!(consensus.active().is_empty());
        assert_eq!(consensus.predictors().count(), 0);
    }
}
