use super::{device::DeviceConfig, dispatch::DispatchConfig};
use std::sync::Arc;

/// Static mutex holding the global configuration, initialized as `None`.
static CUBE_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

/// Represents the global configuration for CubeCL grid dispatches.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Configuration of device-wide dispatches.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Configuration of the CPU reference device.
    #[serde(default)]
    pub device: DeviceConfig,
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it from the current directory if not set.
    ///
    /// If no configuration is set, it attempts to load one from `cubecl.toml` or `CubeCL.toml` in the
    /// current directory or its parents. If no file is found, a default configuration is used.
    ///
    /// # Notes
    ///
    /// Calling this function is somewhat expensive, because of a global static lock. Read it once
    /// when creating long lived objects rather than on every dispatch.
    pub fn get() -> Arc<Self> {
        let mut state = CUBE_GLOBAL_CONFIG.lock();

        match state.as_ref() {
            Some(config) => config.clone(),
            None => {
                cfg_if::cfg_if! {
                    if #[cfg(std_io)] {
                        let config = Self::from_current_dir().override_from_env();
                    } else {
                        let config = Self::default().override_from_env();
                    }
                }

                let config = Arc::new(config);
                *state = Some(config.clone());
                config
            }
        }
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    ///
    /// # Warning
    /// This method must be called at the start of the program, before any calls to `get`. Attempting
    /// to set the configuration after it has been initialized will cause a panic.
    pub fn set(config: Self) {
        let mut state = CUBE_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(self) -> Self {
        self.override_from(|key| std::env::var(key).ok())
    }

    /// Overrides configuration fields from the variables returned by `var`.
    pub fn override_from<F: Fn(&str) -> Option<String>>(mut self, var: F) -> Self {
        use super::dispatch::DispatchLogLevel;

        if let Some(val) = var("CUBECL_DEBUG_LOG") {
            self.dispatch.logger.level = DispatchLogLevel::Full;

            match val.as_str() {
                "stdout" => self.dispatch.logger.stdout = true,
                "stderr" => self.dispatch.logger.stderr = true,
                "1" | "true" => {
                    #[cfg(std_io)]
                    {
                        self.dispatch.logger.file = Some("/tmp/cubecl.log".into());
                    }
                }
                "0" | "false" => self.dispatch.logger.level = DispatchLogLevel::Disabled,
                file_path => {
                    #[cfg(std_io)]
                    {
                        self.dispatch.logger.file = Some(file_path.into());
                    }
                    #[cfg(not(std_io))]
                    let _ = file_path;
                }
            }
        }

        if let Some(val) = var("CUBECL_DEBUG_SYNC") {
            self.dispatch.synchronous = matches!(val.as_str(), "1" | "true");
        }

        if let Some(val) = var("CUBECL_ARCH") {
            match val.parse::<u32>() {
                Ok(generation) => self.dispatch.architecture = Some(generation),
                Err(err) => log::warn!("Ignoring CUBECL_ARCH={val}: {err}"),
            }
        }

        self
    }

    /// Parse a configuration from its toml representation.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "std")] {
                toml::from_str(content).map_err(|err| err.to_string())
            } else {
                let _ = content;
                Err("Parsing toml requires the `std` feature".to_string())
            }
        }
    }

    // Loads configuration from `cubecl.toml` or `CubeCL.toml` in the current directory or its parents.
    //
    // Traverses up the directory tree until a valid configuration file is found or the root is reached.
    // Returns a default configuration if no file is found.
    #[cfg(std_io)]
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            for name in ["cubecl.toml", "CubeCL.toml"] {
                if let Some(config) = Self::from_file_path(dir.join(name)) {
                    return config;
                }
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    // Loads configuration from a specified file path.
    #[cfg(std_io)]
    fn from_file_path<P: AsRef<std::path::Path>>(path: P) -> Option<Self> {
        let content = std::fs::read_to_string(path.as_ref()).ok()?;

        match Self::from_toml(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                log::warn!(
                    "Ignoring {}, it doesn't have the right format => {err}",
                    path.as_ref().display()
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::dispatch::DispatchLogLevel;

    #[test]
    fn parse_toml() {
        let config = GlobalConfig::from_toml(
            r#"
            [dispatch]
            synchronous = true
            architecture = 300

            [dispatch.logger]
            level = "basic"
            stdout = true

            [device]
            max_parallelism = 3
            "#,
        )
        .unwrap();

        assert!(config.dispatch.synchronous);
        assert_eq!(config.dispatch.architecture, Some(300));
        assert_eq!(config.dispatch.logger.level, DispatchLogLevel::Basic);
        assert!(config.dispatch.logger.stdout);
        assert_eq!(config.device.max_parallelism, Some(3));
        assert_eq!(config.device.memory_budget, None);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = GlobalConfig::from_toml("").unwrap();

        assert!(!config.dispatch.synchronous);
        assert_eq!(config.dispatch.logger.level, DispatchLogLevel::Disabled);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(GlobalConfig::from_toml("[dispatch\nsynchronous = 1").is_err());
    }

    #[test]
    fn env_overrides() {
        let vars = |key: &str| match key {
            "CUBECL_DEBUG_SYNC" => Some("1".to_string()),
            "CUBECL_ARCH" => Some("200".to_string()),
            "CUBECL_DEBUG_LOG" => Some("stderr".to_string()),
            _ => None,
        };
        let config = GlobalConfig::default().override_from(vars);

        assert!(config.dispatch.synchronous);
        assert_eq!(config.dispatch.architecture, Some(200));
        assert!(config.dispatch.logger.stderr);
        assert_eq!(config.dispatch.logger.level, DispatchLogLevel::Full);
    }

    #[test]
    fn invalid_arch_override_is_ignored() {
        let config = GlobalConfig::default()
            .override_from(|key| (key == "CUBECL_ARCH").then(|| "sm35".to_string()));

        assert_eq!(config.dispatch.architecture, None);
    }
}
