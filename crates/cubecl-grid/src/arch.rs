use crate::error::DeviceQueryError;

/// Architecture generation of a device, encoded as `major * 100 + minor * 10`.
///
/// For example `350` is a 3.5 device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ArchVersion(pub u32);

impl ArchVersion {
    /// Create a version from its major and minor numbers.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self(major * 100 + minor * 10)
    }

    /// The major version.
    pub const fn major(&self) -> u32 {
        self.0 / 100
    }

    /// The minor version.
    pub const fn minor(&self) -> u32 {
        (self.0 % 100) / 10
    }
}

impl core::fmt::Display for ArchVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Properties of the hardware that bound how many worker groups can run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareProperties {
    /// The number of units scheduled together (a warp, a wavefront, a SIMD width).
    pub plane_size: u32,
    /// The number of independent compute units.
    pub num_compute_units: u32,
    /// The maximum number of worker groups a single compute unit can host.
    pub max_groups_per_unit: u32,
    /// The maximum number of units resident on a single compute unit.
    pub max_resident_units_per_unit: u32,
    /// The maximum number of units in a worker group.
    pub max_units_per_group: u32,
    /// The maximum number of worker groups in a single launch.
    pub max_group_count: u32,
}

impl HardwareProperties {
    /// The number of worker groups of `group_size` units that can be resident on one compute
    /// unit.
    pub fn groups_per_unit(&self, group_size: u32) -> u32 {
        if group_size == 0 || group_size > self.max_units_per_group {
            return 0;
        }

        u32::min(
            self.max_groups_per_unit,
            self.max_resident_units_per_unit / group_size,
        )
    }
}

/// The architecture query collaborator.
pub trait ArchitectureQuery: Send + Sync {
    /// Probe the generation of the device actually present.
    fn generation(&self) -> Result<ArchVersion, DeviceQueryError>;

    /// Static properties of the device.
    fn hardware(&self) -> &HardwareProperties;

    /// The maximum number of worker groups of `group_size` units concurrently resident on the
    /// whole device.
    fn concurrency_capacity(&self, group_size: u32) -> Result<u32, DeviceQueryError> {
        let hardware = self.hardware();
        let per_unit = hardware.groups_per_unit(group_size);

        if per_unit == 0 {
            return Err(DeviceQueryError::Occupancy {
                group_size,
                reason: format!(
                    "A group of {group_size} units can't be resident, a compute unit holds at most {} units per group",
                    hardware.max_units_per_group.min(hardware.max_resident_units_per_unit)
                ),
            });
        }

        Ok(per_unit * hardware.num_compute_units)
    }
}
