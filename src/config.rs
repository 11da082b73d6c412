//! Configuration management for the input peer.
//!
//! Defines the structure for user-configurable settings and reads it from the
//! same key/value format as the data sources.

use alloc::string::{String, ToString};
use core::fmt;

use crate::dataset::properties::Properties;
use crate::entropy::{EntropyError, Randomness};
use crate::field::{is_prime, PrimeField, DEFAULT_FIELD_ORDER};
use crate::mpc::SplitterConfig;
use crate::shares::validate_margin;

pub const KEY_INPUT: &str = "mpc.idr.input";
pub const KEY_TOPOLOGY: &str = "mpc.idr.topology";
pub const KEY_OUTPUT_FOLDER: &str = "mpc.outputfolder";
pub const KEY_TIME_SLOTS: &str = "mpc.timeslots";
pub const KEY_MIN_PEERS: &str = "mpc.minpeers";
pub const KEY_FIELD_ORDER: &str = "mpc.fieldorder";
pub const KEY_DEGREE_T: &str = "mpc.degreet";
pub const KEY_MARGIN: &str = "mpc.idr.m";
pub const KEY_RANDOMNESS: &str = "mpc.randomalgorithm";

/// Largest magnitude a plaintext may have: identifiers, `-1` and
/// [`UNCLASSIFIED`](crate::shares::UNCLASSIFIED) all fit in an `i32`. The
/// field's signed range (`p / 2`) must exceed it or values wrap.
pub const MAX_PLAINTEXT: u64 = i32::MAX as u64;

/// Default classification margin `M`.
pub const DEFAULT_MARGIN: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value could not be parsed.
    InvalidValue { key: String, value: String },
    /// Values parsed but are unusable together.
    Invalid(String),
    /// The config file could not be read.
    Unreadable(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{}' for {}", value, key)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::Unreadable(msg) => write!(f, "Cannot read configuration: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Main configuration structure for the input peer.
///
/// Populated by the host application and handed to the
/// [`RoundController`](crate::controller::RoundController).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdrConfig {
    /// Private routing data of this peer.
    pub input_path: String,
    /// Neighbor lists keyed by node identifier.
    pub topology_path: String,
    /// Folder receiving one output artifact per round.
    pub output_folder: String,
    /// Number of rounds to run.
    pub time_slot_count: u32,
    /// Privacy peers that must be connected before a round starts.
    pub min_privacy_peers: usize,
    /// Prime order of the sharing field.
    pub field_order: u64,
    /// Polynomial degree; `None` uses `(n - 1) / 2`.
    pub degree_t: Option<usize>,
    /// Classification margin `M`.
    pub classification_margin: u32,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub randomness: Randomness,
}

impl Default for IdrConfig {
    fn default() -> Self {
        Self {
            input_path: String::from("idr_input.txt"),
            topology_path: String::from("idr_topology.txt"),
            output_folder: String::from("output"),
            time_slot_count: 1,
            min_privacy_peers: 3,
            field_order: DEFAULT_FIELD_ORDER,
            degree_t: None,
            classification_margin: DEFAULT_MARGIN,
            randomness: Randomness::Os,
        }
    }
}

fn parse_value<T: core::str::FromStr>(props: &Properties, key: &str, default: T) -> Result<T, ConfigError> {
    match props.get(key) {
        None => Ok(default),
        Some(raw) if raw.is_empty() => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

impl IdrConfig {
    /// Overlays the keys present in `props` on the defaults. Unknown keys are ignored.
    pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let degree = parse_value(props, KEY_DEGREE_T, 0usize)?;
        let randomness = match props.get(KEY_RANDOMNESS) {
            Some(raw) if !raw.is_empty() => {
                Randomness::parse(raw).map_err(|_: EntropyError| ConfigError::InvalidValue {
                    key: KEY_RANDOMNESS.to_string(),
                    value: raw.to_string(),
                })?
            }
            _ => defaults.randomness.clone(),
        };

        Ok(Self {
            input_path: props.get_or(KEY_INPUT, &defaults.input_path).to_string(),
            topology_path: props.get_or(KEY_TOPOLOGY, &defaults.topology_path).to_string(),
            output_folder: props.get_or(KEY_OUTPUT_FOLDER, &defaults.output_folder).to_string(),
            time_slot_count: parse_value(props, KEY_TIME_SLOTS, defaults.time_slot_count)?,
            min_privacy_peers: parse_value(props, KEY_MIN_PEERS, defaults.min_privacy_peers)?,
            field_order: parse_value(props, KEY_FIELD_ORDER, defaults.field_order)?,
            degree_t: if degree == 0 { None } else { Some(degree) },
            classification_margin: parse_value(props, KEY_MARGIN, defaults.classification_margin)?,
            randomness,
        })
    }

    /// Reads, parses and validates a configuration file.
    #[cfg(feature = "std")]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let props = Properties::load(path).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        let config = Self::from_properties(&props)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_slot_count == 0 {
            return Err(ConfigError::Invalid(String::from("time slot count must be positive")));
        }
        if self.min_privacy_peers == 0 {
            return Err(ConfigError::Invalid(String::from("at least one privacy peer is required")));
        }
        if self.field_order < 3 || !is_prime(self.field_order) {
            return Err(ConfigError::Invalid(alloc::format!(
                "field order {} is not an odd prime",
                self.field_order
            )));
        }
        if self.field_order / 2 <= MAX_PLAINTEXT {
            return Err(ConfigError::Invalid(alloc::format!(
                "field order {} too small to hold identifiers and the unclassified marker",
                self.field_order
            )));
        }
        validate_margin(self.classification_margin)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let Some(t) = self.degree_t {
            if t >= self.min_privacy_peers {
                log::warn!(
                    "Degree {} needs more than the {} peers of the quorum",
                    t,
                    self.min_privacy_peers
                );
            }
        }
        Ok(())
    }

    /// Splitter parameters. Fails only if the field order is not prime.
    pub fn splitter_config(&self) -> Result<SplitterConfig, ConfigError> {
        let field = PrimeField::new(self.field_order)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(SplitterConfig {
            field,
            degree_t: self.degree_t,
            randomness: self.randomness.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IdrConfig::default();
        assert_eq!(config.time_slot_count, 1);
        assert_eq!(config.classification_margin, 16);
        assert_eq!(config.degree_t, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_properties_overlays_defaults() {
        let props = Properties::parse(
            "mpc.timeslots = 4\n\
             mpc.minpeers = 5\n\
             mpc.degreet = 2\n\
             mpc.outputfolder = /tmp/idr\n\
             mpc.unknown = ignored\n",
        );
        let config = IdrConfig::from_properties(&props).unwrap();
        assert_eq!(config.time_slot_count, 4);
        assert_eq!(config.min_privacy_peers, 5);
        assert_eq!(config.degree_t, Some(2));
        assert_eq!(config.output_folder, "/tmp/idr");
        assert_eq!(config.input_path, "idr_input.txt");
    }

    #[test]
    fn test_zero_degree_is_automatic() {
        let props = Properties::parse("mpc.degreet = 0");
        assert_eq!(IdrConfig::from_properties(&props).unwrap().degree_t, None);
    }

    #[test]
    fn test_invalid_values() {
        let props = Properties::parse("mpc.timeslots = many");
        assert_eq!(
            IdrConfig::from_properties(&props),
            Err(ConfigError::InvalidValue {
                key: KEY_TIME_SLOTS.to_string(),
                value: "many".to_string()
            })
        );
        let props = Properties::parse("mpc.randomalgorithm = SHA1PRNG");
        assert!(IdrConfig::from_properties(&props).is_err());
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = IdrConfig::default();
        config.field_order = 100;
        assert!(config.validate().is_err());

        let mut config = IdrConfig::default();
        config.classification_margin = 0;
        assert!(config.validate().is_err());

        let mut config = IdrConfig::default();
        config.time_slot_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_small_prime_fields_rejected() {
        // Both prime, but the unclassified marker or identifiers would wrap.
        for order in [101u64, 2_147_483_647] {
            let mut config = IdrConfig::default();
            config.field_order = order;
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "field order {} accepted",
                order
            );
        }

        let mut config = IdrConfig::default();
        config.field_order = 4_294_967_311;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_splitter_config() {
        let mut config = IdrConfig::default();
        config.field_order = 4_294_967_311;
        config.degree_t = Some(1);
        let splitter = config.splitter_config().unwrap();
        assert_eq!(splitter.field.modulus(), 4_294_967_311);
        assert_eq!(splitter.degree_t, Some(1));
    }
}
