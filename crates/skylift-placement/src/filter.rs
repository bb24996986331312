//! The eligibility filter pipeline.
//!
//! `CandidateFilter` consumes an advertisement snapshot stage by stage.
//! Every stage narrows the working set, never widens it; an empty set
//! short-circuits the remaining stages into "no match". The stage order
//! is load-bearing: zone balancing runs before per-executor instance
//! balancing (an under-loaded executor must not shield its over-loaded
//! zone), and both run before the memory-bias stage, otherwise
//! high-memory executors in over-used zones would beat correctly
//! balanced low-memory ones.

use std::collections::HashMap;

use rand::seq::IndexedRandom;
use tracing::debug;

use skylift_pool::{Advertisement, ExecutorId};

use crate::request::{FeatureDirectory, PlacementRequest};

/// Staged narrowing over a snapshot of advertisements.
///
/// Zone instance totals for the target application are captured from the
/// full, unfiltered snapshot at construction, so zone load is assessed
/// independently of any per-executor filtering that happens later.
pub struct CandidateFilter {
    candidates: Vec<Advertisement>,
    zone_totals: HashMap<String, u64>,
    app_id: String,
}

impl CandidateFilter {
    pub fn new(snapshot: Vec<Advertisement>, app_id: &str) -> Self {
        let mut zone_totals: HashMap<String, u64> = HashMap::new();
        for ad in &snapshot {
            *zone_totals.entry(ad.zone.clone()).or_insert(0) += u64::from(ad.instances_of(app_id));
        }
        Self {
            candidates: snapshot,
            zone_totals,
            app_id: app_id.to_string(),
        }
    }

    /// Keep executors with at least `required_disk` MB free.
    pub fn only_with_disk(mut self, required_disk: u64) -> Self {
        self.candidates.retain(|ad| ad.has_sufficient_disk(required_disk));
        self
    }

    /// Keep executors that support `stack` with at least `memory` MB free.
    pub fn only_meeting_needs(mut self, memory: u64, stack: &str) -> Self {
        self.candidates.retain(|ad| ad.meets_needs(memory, stack));
        self
    }

    /// Keep executors declaring every feature required for (org, space).
    ///
    /// A no-op when no directory is supplied or it has no entry for the
    /// pair; feature requirements are opt-in per tenant space.
    pub fn only_matching_features(
        mut self,
        directory: Option<&FeatureDirectory>,
        org_id: &str,
        space_id: &str,
    ) -> Self {
        let required = directory
            .and_then(|dir| dir.get(org_id))
            .and_then(|spaces| spaces.get(space_id));
        let Some(required) = required else {
            return self;
        };
        self.candidates.retain(|ad| ad.satisfies_features(required));
        self
    }

    /// Keep executors whose zone carries the fewest instances of the app.
    ///
    /// Zone totals are the ones captured from the full snapshot at
    /// construction, so executors filtered out by earlier stages still
    /// count toward their zone's load.
    pub fn only_in_zone_with_fewest_instances(mut self) -> Self {
        let zone_totals = &self.zone_totals;
        if let Some(fewest) = self.candidates.iter().map(|ad| zone_totals[&ad.zone]).min() {
            self.candidates.retain(|ad| zone_totals[&ad.zone] == fewest);
        }
        self
    }

    /// Keep executors tied at the minimum instance count of the app.
    pub fn only_fewest_instances_of_app(mut self) -> Self {
        let app_id = &self.app_id;
        if let Some(fewest) = self.candidates.iter().map(|ad| ad.instances_of(app_id)).min() {
            self.candidates.retain(|ad| ad.instances_of(app_id) == fewest);
        }
        self
    }

    /// Keep the upper half by available memory (boundary rounds up).
    ///
    /// The threshold is the memory of the element at index `len / 2`
    /// after an ascending sort, which biases selection toward
    /// higher-capacity executors while leaving room for randomness among
    /// comparable ones.
    pub fn upper_half_by_memory(mut self) -> Self {
        if !self.candidates.is_empty() {
            self.candidates.sort_by_key(|ad| ad.available_memory);
            let threshold = self.candidates[self.candidates.len() / 2].available_memory;
            self.candidates.retain(|ad| ad.available_memory >= threshold);
        }
        self
    }

    /// Uniformly pick one survivor.
    pub fn sample(self) -> Option<Advertisement> {
        let mut rng = rand::rng();
        self.candidates.choose(&mut rng).cloned()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Run the full pipeline for `request` over `snapshot`.
pub fn select_executor(snapshot: Vec<Advertisement>, request: &PlacementRequest) -> Option<ExecutorId> {
    let selected = CandidateFilter::new(snapshot, &request.app_id)
        .only_with_disk(request.required_disk)
        .only_meeting_needs(request.required_memory, &request.stack)
        .only_matching_features(
            request.feature_requirements.as_ref(),
            &request.org_id,
            &request.space_id,
        )
        .only_in_zone_with_fewest_instances()
        .only_fewest_instances_of_app()
        .upper_half_by_memory()
        .sample()
        .map(|ad| ad.executor_id);

    debug!(app_id = %request.app_id, executor = ?selected, "placement selection");
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylift_pool::{DEFAULT_ZONE, FeatureValue};
    use std::collections::HashSet;
    use std::time::Instant;

    struct AdSpec {
        id: &'static str,
        memory: u64,
        instances: u32,
        zone: Option<&'static str>,
        features: Option<Vec<(&'static str, FeatureValue)>>,
    }

    impl AdSpec {
        fn new(id: &'static str, memory: u64, instances: u32) -> Self {
            Self { id, memory, instances, zone: None, features: None }
        }

        fn zone(mut self, zone: &'static str) -> Self {
            self.zone = Some(zone);
            self
        }

        fn features(mut self, features: Vec<(&'static str, FeatureValue)>) -> Self {
            self.features = Some(features);
            self
        }

        fn build(self) -> Advertisement {
            Advertisement {
                executor_id: self.id.to_string(),
                stacks: vec!["lucid64".to_string()],
                available_memory: self.memory,
                available_disk: 100,
                app_counts: HashMap::from([("app-1".to_string(), self.instances)]),
                zone: self.zone.unwrap_or(DEFAULT_ZONE).to_string(),
                features: self.features.map(|pairs| {
                    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
                }),
                received_at: Instant::now(),
            }
        }
    }

    fn request(memory: u64) -> PlacementRequest {
        PlacementRequest::new("app-1", memory, "lucid64", "org-1", "space-1")
    }

    fn select(snapshot: Vec<Advertisement>, req: &PlacementRequest) -> Option<String> {
        select_executor(snapshot, req)
    }

    /// Run selection repeatedly and collect the distinct winners.
    fn winners(snapshot: &[Advertisement], req: &PlacementRequest, rounds: usize) -> HashSet<String> {
        (0..rounds)
            .filter_map(|_| select(snapshot.to_vec(), req))
            .collect()
    }

    #[test]
    fn empty_snapshot_matches_nothing() {
        assert_eq!(select(Vec::new(), &request(1)), None);
    }

    #[test]
    fn emptied_set_stays_empty_through_the_stages() {
        let snapshot = vec![AdSpec::new("exec-1", 128, 0).build()];
        let filter = CandidateFilter::new(snapshot, "app-1")
            .only_meeting_needs(512, "lucid64")
            .only_in_zone_with_fewest_instances()
            .only_fewest_instances_of_app()
            .upper_half_by_memory();

        assert!(filter.is_empty());
        assert_eq!(filter.len(), 0);
        assert!(filter.sample().is_none());
    }

    #[test]
    fn capacity_filter_rejects_memory_stack_and_disk() {
        let snapshot = vec![AdSpec::new("exec-1", 1024, 0).build()];

        assert_eq!(select(snapshot.clone(), &request(1025)), None);
        assert_eq!(select(snapshot.clone(), &request(1024)).as_deref(), Some("exec-1"));

        let mut other_stack = request(1);
        other_stack.stack = "trusty64".to_string();
        assert_eq!(select(snapshot.clone(), &other_stack), None);

        assert_eq!(select(snapshot.clone(), &request(1).with_disk(101)), None);
        assert_eq!(select(snapshot, &request(1).with_disk(100)).as_deref(), Some("exec-1"));
    }

    #[test]
    fn fewest_instances_of_app_wins() {
        let snapshot = vec![
            AdSpec::new("exec-1", 128, 1).build(),
            AdSpec::new("exec-2", 512, 2).build(),
        ];
        assert_eq!(select(snapshot, &request(1)).as_deref(), Some("exec-1"));
    }

    #[test]
    fn capacity_trumps_instance_balance() {
        // The only executor with enough memory wins even with more instances.
        let snapshot = vec![
            AdSpec::new("exec-1", 128, 1).build(),
            AdSpec::new("exec-2", 512, 2).build(),
        ];
        assert_eq!(select(snapshot, &request(256)).as_deref(), Some("exec-2"));
    }

    #[test]
    fn zone_with_fewest_instances_wins() {
        let snapshot = vec![
            AdSpec::new("exec-1", 128, 1).build(),
            AdSpec::new("exec-2", 512, 2).build(),
            AdSpec::new("exec-5", 1024, 3).zone("zone-1").build(),
            AdSpec::new("exec-6", 1024, 2).zone("zone-1").build(),
        ];
        // Default zone total is 3, zone-1 total is 5.
        assert_eq!(select(snapshot, &request(1)).as_deref(), Some("exec-1"));
    }

    #[test]
    fn zone_totals_come_from_the_full_snapshot() {
        // zone-1 keeps its lower total even though the default zone has
        // more executors surviving the earlier stages.
        let snapshot = vec![
            AdSpec::new("exec-1", 128, 2).build(),
            AdSpec::new("exec-2", 512, 1).build(),
            AdSpec::new("exec-6", 1024, 2).zone("zone-1").build(),
        ];
        assert_eq!(select(snapshot, &request(256)).as_deref(), Some("exec-6"));
    }

    #[test]
    fn ties_across_zones_keep_both() {
        let snapshot = vec![
            AdSpec::new("exec-1", 128, 1).build(),
            AdSpec::new("exec-2", 512, 2).build(),
            AdSpec::new("exec-7", 512, 2).zone("zone-1").build(),
            AdSpec::new("exec-8", 256, 1).zone("zone-1").build(),
        ];
        let found = winners(&snapshot, &request(1), 40);
        assert!(found.is_subset(&HashSet::from(["exec-1".to_string(), "exec-8".to_string()])));
    }

    #[test]
    fn feature_requirements_narrow_candidates() {
        let directory: FeatureDirectory = HashMap::from([(
            "org-1".to_string(),
            HashMap::from([
                (
                    "space-1".to_string(),
                    HashMap::from([
                        ("ssd".to_string(), FeatureValue::Bool(true)),
                        ("security".to_string(), FeatureValue::Bool(true)),
                    ]),
                ),
                (
                    "space-2".to_string(),
                    HashMap::from([
                        ("ssd".to_string(), FeatureValue::Bool(true)),
                        ("security".to_string(), FeatureValue::Bool(false)),
                    ]),
                ),
            ]),
        )]);

        let snapshot = vec![
            AdSpec::new("exec-9", 1024, 2)
                .features(vec![
                    ("ssd", FeatureValue::Bool(true)),
                    ("security", FeatureValue::Bool(true)),
                ])
                .build(),
            AdSpec::new("exec-10", 1024, 2)
                .features(vec![
                    ("ssd", FeatureValue::Bool(true)),
                    ("security", FeatureValue::Bool(false)),
                ])
                .build(),
        ];

        let req = request(256).with_features(directory.clone());
        assert_eq!(select(snapshot.clone(), &req).as_deref(), Some("exec-9"));

        let mut req = request(256).with_features(directory.clone());
        req.space_id = "space-2".to_string();
        assert_eq!(select(snapshot.clone(), &req).as_deref(), Some("exec-10"));

        // No directory entry for the tenant: the stage is a no-op.
        let mut req = request(256).with_features(directory);
        req.org_id = "org-3".to_string();
        let found = winners(&snapshot, &req, 40);
        assert_eq!(found, HashSet::from(["exec-9".to_string(), "exec-10".to_string()]));
    }

    #[test]
    fn unmatched_features_match_nothing() {
        let directory: FeatureDirectory = HashMap::from([(
            "org-2".to_string(),
            HashMap::from([(
                "space-2".to_string(),
                HashMap::from([
                    ("ssd".to_string(), FeatureValue::Bool(false)),
                    ("security".to_string(), FeatureValue::Bool(false)),
                ]),
            )]),
        )]);

        let snapshot = vec![
            AdSpec::new("exec-9", 1024, 2)
                .features(vec![
                    ("ssd", FeatureValue::Bool(true)),
                    ("security", FeatureValue::Bool(true)),
                ])
                .build(),
        ];

        let mut req = request(256).with_features(directory);
        req.org_id = "org-2".to_string();
        req.space_id = "space-2".to_string();
        assert_eq!(select(snapshot, &req), None);
    }

    #[test]
    fn extra_declared_features_are_ignored() {
        let directory: FeatureDirectory = HashMap::from([(
            "org-1".to_string(),
            HashMap::from([(
                "space-1".to_string(),
                HashMap::from([("security".to_string(), FeatureValue::Bool(false))]),
            )]),
        )]);

        let snapshot = vec![
            AdSpec::new("exec-13", 1024, 2)
                .features(vec![
                    ("ssd", FeatureValue::Bool(true)),
                    ("security", FeatureValue::Bool(false)),
                    ("ha", FeatureValue::Bool(false)),
                ])
                .build(),
            AdSpec::new("exec-9", 1024, 2)
                .features(vec![
                    ("ssd", FeatureValue::Bool(true)),
                    ("security", FeatureValue::Bool(true)),
                ])
                .build(),
        ];

        let req = request(256).with_features(directory);
        assert_eq!(select(snapshot, &req).as_deref(), Some("exec-13"));
    }

    #[test]
    fn undeclared_features_lose_to_declared_ones() {
        let directory: FeatureDirectory = HashMap::from([(
            "org-1".to_string(),
            HashMap::from([(
                "space-1".to_string(),
                HashMap::from([("ssd".to_string(), FeatureValue::Bool(true))]),
            )]),
        )]);

        let snapshot = vec![
            AdSpec::new("plain", 2048, 0).build(),
            AdSpec::new("featured", 1024, 1)
                .features(vec![("ssd", FeatureValue::Bool(true))])
                .build(),
        ];

        let req = request(256).with_features(directory);
        assert_eq!(select(snapshot, &req).as_deref(), Some("featured"));
    }

    #[test]
    fn two_candidates_always_pick_the_larger_memory() {
        let snapshot = vec![
            AdSpec::new("exec-1", 1024, 0).build(),
            AdSpec::new("exec-2", 1023, 0).build(),
        ];
        let found = winners(&snapshot, &request(1), 20);
        assert_eq!(found, HashSet::from(["exec-1".to_string()]));
    }

    #[test]
    fn upper_half_rounds_the_boundary_up() {
        let snapshot = vec![
            AdSpec::new("exec-1", 1024, 0).build(),
            AdSpec::new("exec-2", 1023, 0).build(),
            AdSpec::new("exec-3", 1022, 0).build(),
            AdSpec::new("exec-4", 1021, 0).build(),
            AdSpec::new("exec-5", 1020, 0).build(),
        ];
        let found = winners(&snapshot, &request(1), 60);
        assert_eq!(
            found,
            HashSet::from(["exec-1".to_string(), "exec-2".to_string(), "exec-3".to_string()])
        );
    }

    #[test]
    fn equal_memory_candidates_are_picked_randomly() {
        let snapshot = vec![
            AdSpec::new("exec-1", 1024, 0).build(),
            AdSpec::new("exec-2", 1024, 0).build(),
            // Plenty of memory but already hosting the app.
            AdSpec::new("busy", 2048, 1).build(),
        ];
        let found = winners(&snapshot, &request(1), 40);
        assert_eq!(found, HashSet::from(["exec-1".to_string(), "exec-2".to_string()]));
    }
}
