use super::logger::{LogLevel, LoggerConfig};

/// Configuration of device-wide dispatches.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DispatchConfig {
    /// Logger configuration for dispatch reports.
    #[serde(default)]
    pub logger: LoggerConfig<DispatchLogLevel>,

    /// Synchronize the stream after every launch to attribute device failures to the launch
    /// that caused them.
    #[serde(default)]
    pub synchronous: bool,

    /// Architecture generation used instead of probing the device, encoded as
    /// `major * 100 + minor * 10`.
    #[serde(default)]
    pub architecture: Option<u32>,
}

/// Log levels for dispatches.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DispatchLogLevel {
    /// Dispatch logging is disabled.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,

    /// One line per dispatch: the policy, the work plan and the execution path.
    #[serde(rename = "basic")]
    Basic,

    /// Every launch is logged as well.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for DispatchLogLevel {}
