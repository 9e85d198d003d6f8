/// Configuration of the CPU reference device.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DeviceConfig {
    /// The maximum number of host threads used by a launch, defaults to the available
    /// parallelism.
    #[serde(default)]
    pub max_parallelism: Option<usize>,

    /// Optional bound on the number of bytes allocated at once.
    #[serde(default)]
    pub memory_budget: Option<u64>,
}
