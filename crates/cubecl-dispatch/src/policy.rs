use cubecl_grid::ArchVersion;
use serde::{Deserialize, Serialize};

/// How a histogram tile processor counts samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistogramAlgorithm {
    /// Sort the bin ids of a tile and count runs. Needs no atomics.
    Sort,
    /// Count into group-private counters with atomics.
    SharedAtomic,
    /// Combine every sample directly into the output with device-wide atomics.
    GlobalAtomic,
}

/// The family of computation being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmVariant {
    /// Histogram of samples, privatized per worker group.
    Histogram(HistogramAlgorithm),
    /// Prefix scan, with a lookback on the predecessor tile.
    Scan,
}

impl AlgorithmVariant {
    /// Whether tiles accumulate straight into the outputs with global atomics.
    pub fn is_global_atomic(&self) -> bool {
        matches!(
            self,
            AlgorithmVariant::Histogram(HistogramAlgorithm::GlobalAtomic)
        )
    }

    /// Whether a tile needs the result of its predecessor tile.
    pub fn requires_lookback(&self) -> bool {
        matches!(self, AlgorithmVariant::Scan)
    }
}

/// How tiles are assigned to worker groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridMapping {
    /// Contiguous ranges of tiles computed up front, one per group.
    EvenShare,
    /// Groups claim tiles one at a time from a shared drain counter.
    Dynamic,
}

/// The parameters of a dispatch, selected once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// The number of units in a worker group.
    pub group_size: u32,
    /// The number of items each unit processes per tile.
    pub items_per_unit: u32,
    /// The number of items in a tile, `group_size * items_per_unit`.
    pub tile_size: u64,
    /// How tiles are assigned to groups.
    pub mapping: GridMapping,
    /// How many groups are launched per resident group slot with [GridMapping::EvenShare].
    pub subscription_factor: u32,
    /// The computation the policy is tuned for.
    pub variant: AlgorithmVariant,
}

impl ExecutionPolicy {
    /// Create a policy, items per unit and subscription factor are at least 1.
    pub fn new(
        group_size: u32,
        items_per_unit: u32,
        mapping: GridMapping,
        subscription_factor: u32,
        variant: AlgorithmVariant,
    ) -> Self {
        let items_per_unit = u32::max(items_per_unit, 1);

        Self {
            group_size,
            items_per_unit,
            tile_size: group_size as u64 * items_per_unit as u64,
            mapping,
            subscription_factor: u32::max(subscription_factor, 1),
            variant,
        }
    }

    /// Replace the mapping chosen by the catalog.
    pub fn with_mapping(mut self, mapping: GridMapping) -> Self {
        self.mapping = mapping;
        self
    }
}

impl core::fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:?} groups of {} units x {} items ({} items per tile), {:?} x{}",
            self.variant,
            self.group_size,
            self.items_per_unit,
            self.tile_size,
            self.mapping,
            self.subscription_factor
        )
    }
}

/// What the caller asks the catalog for.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyRequest {
    /// The number of interleaved channels per item.
    pub channels: u32,
    /// The number of channels actually processed, the first ones.
    pub active_channels: u32,
    /// The requested algorithm, tiers may override it.
    pub variant: AlgorithmVariant,
}

/// The architecture tiers the catalog is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArchTier {
    /// Generations below 2.0. Atomics are too slow, histograms always sort.
    Sm10,
    /// Generations 2.0 and up.
    Sm20,
    /// Generations 3.0 and up.
    Sm30,
    /// Generations 3.5 and up, including every newer generation.
    Sm35,
}

impl ArchTier {
    /// The closest tier at or below `generation`.
    pub fn from_generation(generation: ArchVersion) -> Self {
        match generation.0 {
            350.. => ArchTier::Sm35,
            300.. => ArchTier::Sm30,
            200.. => ArchTier::Sm20,
            _ => ArchTier::Sm10,
        }
    }

    /// The policy of this tier for `request`.
    pub fn policy(&self, request: &PolicyRequest) -> ExecutionPolicy {
        match request.variant {
            AlgorithmVariant::Histogram(algorithm) => {
                self.histogram_policy(algorithm, request.active_channels)
            }
            AlgorithmVariant::Scan => self.scan_policy(),
        }
    }

    fn histogram_policy(&self, algorithm: HistogramAlgorithm, active_channels: u32) -> ExecutionPolicy {
        use GridMapping::*;
        use HistogramAlgorithm::*;

        // Atomic variants split the work of a unit between the active channels.
        let per_channel = |items: u32| items / u32::max(active_channels, 1);

        let (group_size, items_per_unit, mapping, subscription, algorithm) = match self {
            ArchTier::Sm35 => match algorithm {
                Sort => (128, 12, Dynamic, 8, Sort),
                _ => (256, per_channel(30), EvenShare, 1, algorithm),
            },
            ArchTier::Sm30 => match algorithm {
                Sort => (128, 20, Dynamic, 1, Sort),
                _ => (128, per_channel(22), EvenShare, 1, algorithm),
            },
            ArchTier::Sm20 => match algorithm {
                Sort => (128, 21, Dynamic, 1, Sort),
                _ => (128, per_channel(23), Dynamic, 1, algorithm),
            },
            ArchTier::Sm10 => (128, 7, EvenShare, 1, Sort),
        };

        // Global atomics have an uneven cost per tile.
        let mapping = match algorithm {
            GlobalAtomic => Dynamic,
            _ => mapping,
        };

        ExecutionPolicy::new(
            group_size,
            items_per_unit,
            mapping,
            subscription,
            AlgorithmVariant::Histogram(algorithm),
        )
    }

    fn scan_policy(&self) -> ExecutionPolicy {
        let (group_size, items_per_unit) = match self {
            ArchTier::Sm35 => (128, 16),
            ArchTier::Sm30 => (256, 9),
            ArchTier::Sm20 => (128, 12),
            ArchTier::Sm10 => (64, 19),
        };

        ExecutionPolicy::new(
            group_size,
            items_per_unit,
            GridMapping::Dynamic,
            1,
            AlgorithmVariant::Scan,
        )
    }
}

/// Select the policy of the tier matching `generation`.
pub fn select_policy(generation: ArchVersion, request: &PolicyRequest) -> ExecutionPolicy {
    ArchTier::from_generation(generation).policy(request)
}

/// A tier known at compile time.
pub trait PolicyTier {
    /// The tier.
    const TIER: ArchTier;

    /// The policy of the tier for `request`.
    fn policy(request: &PolicyRequest) -> ExecutionPolicy {
        Self::TIER.policy(request)
    }
}

macro_rules! policy_tier {
    ($name:ident, $tier:ident) => {
        #[doc = concat!("Compile time selection of [ArchTier::", stringify!($tier), "].")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl PolicyTier for $name {
            const TIER: ArchTier = ArchTier::$tier;
        }
    };
}

policy_tier!(Sm10Policy, Sm10);
policy_tier!(Sm20Policy, Sm20);
policy_tier!(Sm30Policy, Sm30);
policy_tier!(Sm35Policy, Sm35);

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(algorithm: HistogramAlgorithm, active_channels: u32) -> PolicyRequest {
        PolicyRequest::new(4, active_channels, AlgorithmVariant::Histogram(algorithm))
    }

    #[test]
    fn generations_map_to_nearest_lower_tier() {
        assert_eq!(ArchTier::from_generation(ArchVersion(100)), ArchTier::Sm10);
        assert_eq!(ArchTier::from_generation(ArchVersion(130)), ArchTier::Sm10);
        assert_eq!(ArchTier::from_generation(ArchVersion(210)), ArchTier::Sm20);
        assert_eq!(ArchTier::from_generation(ArchVersion(300)), ArchTier::Sm30);
        assert_eq!(ArchTier::from_generation(ArchVersion(320)), ArchTier::Sm30);
        assert_eq!(ArchTier::from_generation(ArchVersion(350)), ArchTier::Sm35);
        assert_eq!(ArchTier::from_generation(ArchVersion(900)), ArchTier::Sm35);
        assert_eq!(ArchTier::from_generation(ArchVersion(0)), ArchTier::Sm10);
    }

    #[test]
    fn earliest_tier_always_sorts() {
        for algorithm in [
            HistogramAlgorithm::Sort,
            HistogramAlgorithm::SharedAtomic,
            HistogramAlgorithm::GlobalAtomic,
        ] {
            let policy = ArchTier::Sm10.policy(&histogram(algorithm, 1));

            assert_eq!(
                policy.variant,
                AlgorithmVariant::Histogram(HistogramAlgorithm::Sort)
            );
            assert_eq!(policy.mapping, GridMapping::EvenShare);
            assert_eq!(policy.tile_size, 128 * 7);
        }
    }

    #[test]
    fn atomic_items_are_split_between_channels() {
        let one = ArchTier::Sm35.policy(&histogram(HistogramAlgorithm::SharedAtomic, 1));
        let three = ArchTier::Sm35.policy(&histogram(HistogramAlgorithm::SharedAtomic, 3));

        assert_eq!(one.group_size, 256);
        assert_eq!(one.items_per_unit, 30);
        assert_eq!(three.items_per_unit, 10);
        assert_eq!(three.mapping, GridMapping::EvenShare);
    }

    #[test]
    fn items_per_unit_is_at_least_one() {
        let policy = ArchTier::Sm30.policy(&histogram(HistogramAlgorithm::SharedAtomic, 64));

        assert_eq!(policy.items_per_unit, 1);
        assert_eq!(policy.tile_size, 128);
    }

    #[test]
    fn global_atomic_is_dynamic() {
        for tier in [ArchTier::Sm20, ArchTier::Sm30, ArchTier::Sm35] {
            let policy = tier.policy(&histogram(HistogramAlgorithm::GlobalAtomic, 1));

            assert_eq!(policy.mapping, GridMapping::Dynamic);
            assert!(policy.variant.is_global_atomic());
        }
    }

    #[test]
    fn sort_oversubscribes_on_newest_tier() {
        let policy = ArchTier::Sm35.policy(&histogram(HistogramAlgorithm::Sort, 1));

        assert_eq!(policy.subscription_factor, 8);
        assert_eq!(policy.mapping, GridMapping::Dynamic);
        assert_eq!(policy.tile_size, 128 * 12);
    }

    #[test]
    fn scan_is_always_dynamic() {
        let request = PolicyRequest::new(1, 1, AlgorithmVariant::Scan);

        let policies = [ArchTier::Sm10, ArchTier::Sm20, ArchTier::Sm30, ArchTier::Sm35]
            .map(|tier| tier.policy(&request));

        assert!(policies.iter().all(|p| p.mapping == GridMapping::Dynamic));
        assert_eq!(policies[1].tile_size, 128 * 12);
        assert_eq!(policies[2].tile_size, 256 * 9);
    }

    #[test]
    fn compile_time_and_runtime_selection_agree() {
        let request = histogram(HistogramAlgorithm::SharedAtomic, 2);

        assert_eq!(
            Sm30Policy::policy(&request),
            select_policy(ArchVersion::new(3, 0), &request)
        );
        assert_eq!(
            Sm10Policy::policy(&request),
            select_policy(ArchVersion::new(1, 3), &request)
        );
    }
}
