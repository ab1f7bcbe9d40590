//! Writer configuration read from processor options

use std::collections::HashMap;

use crate::codegen::class::JAVA_17;
use crate::error::{Error, Result};

pub const KEEP_CONFIG_PROPS_INJECTION_POINTS: &str = "beanc.keep.config.props.injection.points";
pub const GENERATE_REFERENCES: &str = "beanc.generate.references";
pub const VERIFY: &str = "beanc.verify";
pub const CLASS_VERSION: &str = "beanc.class.version";

/// Lowest version that requires StackMapTable frames; frames are always emitted
const MIN_CLASS_VERSION: u16 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Keep configuration-properties setters as regular method injection points
    pub keep_config_props_injection_points: bool,
    /// Also write the `$Reference` class and its service descriptor
    pub generate_references: bool,
    /// Run the structural verifier on every generated class
    pub verify: bool,
    pub class_version: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keep_config_props_injection_points: true,
            generate_references: true,
            verify: cfg!(debug_assertions),
            class_version: JAVA_17,
        }
    }
}

impl Config {
    /// Reads known keys from processor options. Unknown keys are ignored,
    /// invalid values are errors.
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let mut config = Config::default();
        if let Some(v) = options.get(KEEP_CONFIG_PROPS_INJECTION_POINTS) {
            config.keep_config_props_injection_points = parse_bool(KEEP_CONFIG_PROPS_INJECTION_POINTS, v)?;
        }
        if let Some(v) = options.get(GENERATE_REFERENCES) {
            config.generate_references = parse_bool(GENERATE_REFERENCES, v)?;
        }
        if let Some(v) = options.get(VERIFY) {
            config.verify = parse_bool(VERIFY, v)?;
        }
        if let Some(v) = options.get(CLASS_VERSION) {
            let version: u16 = v
                .trim()
                .parse()
                .map_err(|_| Error::config(CLASS_VERSION, format!("'{}' is not a class file major version", v)))?;
            if version < MIN_CLASS_VERSION {
                return Err(Error::config(
                    CLASS_VERSION,
                    format!("version {} is below the minimum of {}", version, MIN_CLASS_VERSION),
                ));
            }
            config.class_version = version;
        }
        log::debug!("loaded writer configuration: {:?}", config);
        Ok(config)
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_keep_config_props_injection_points(mut self, keep: bool) -> Self {
        self.keep_config_props_injection_points = keep;
        self
    }

    pub fn with_generate_references(mut self, generate: bool) -> Self {
        self.generate_references = generate;
        self
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::config(key, format!("expected true or false, got '{}'", other))),
    }
}
