//! Configuration (C9): the subset of node configuration the maintainers
//! need, loaded from compiled-in defaults, an optional TOML file, and
//! `RELAY_`-prefixed environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::redemption::RedemptionTransactionShape;

const ENV_PREFIX: &str = "RELAY";
const ENV_SEPARATOR: &str = "__";

/// Raw, deserializable configuration shape. Durations and the redemption
/// shape are accepted as plain strings/numbers here and validated into
/// their strongly-typed equivalents by [`Settings::load`].
#[derive(Debug, Deserialize)]
struct RawMaintainerSettings {
    history_depth: u64,
    transaction_limit: u32,
    restart_backoff_time_secs: u64,
    idle_backoff_time_secs: u64,
    epoch_proven_back_off_time_secs: u64,
    redemption_shape: String,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    maintainer: RawMaintainerSettings,
}

/// Validated maintainer configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// How many host-chain blocks back to scan for sweep proposals.
    pub history_depth: u64,
    /// Max Bitcoin transactions fetched per wallet in one sweep cycle.
    pub transaction_limit: u32,
    /// Sleep after an outer maintainer error before restarting.
    pub restart_backoff_time: Duration,
    /// Sleep between successful sweep-proving cycles.
    pub idle_backoff_time: Duration,
    /// Sleep after a successful difficulty retarget before the next.
    pub epoch_proven_back_off_time: Duration,
    /// The default shape used when assembling redemption transactions.
    pub redemption_shape: RedemptionTransactionShape,
}

impl Settings {
    /// Loads configuration layered as: compiled-in defaults, an optional
    /// TOML file at `config_path`, then `RELAY_`-prefixed environment
    /// variables (double-underscore separated for nesting, e.g.
    /// `RELAY_MAINTAINER__HISTORY_DEPTH`).
    ///
    /// Talks to neither chain; fails fast with
    /// [`Error::Configuration`] before any maintainer task is spawned.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(Self::defaults());

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR),
        );

        let raw: RawSettings = builder
            .build()
            .map_err(|err| Error::Configuration(err.to_string()))?
            .try_deserialize()
            .map_err(|err| Error::Configuration(err.to_string()))?;

        Self::validate(raw)
    }

    fn defaults() -> config::Config {
        config::Config::builder()
            .set_default("maintainer.history_depth", 2_000i64)
            .expect("default is representable")
            .set_default("maintainer.transaction_limit", 100i64)
            .expect("default is representable")
            .set_default("maintainer.restart_backoff_time_secs", 60i64)
            .expect("default is representable")
            .set_default("maintainer.idle_backoff_time_secs", 60i64)
            .expect("default is representable")
            .set_default("maintainer.epoch_proven_back_off_time_secs", 60i64)
            .expect("default is representable")
            .set_default("maintainer.redemption_shape", "change_first")
            .expect("default is representable")
            .build()
            .expect("default layer has no sources that can fail to build")
    }

    fn validate(raw: RawSettings) -> Result<Self> {
        let maintainer = raw.maintainer;

        if maintainer.transaction_limit == 0 {
            return Err(Error::Configuration("transaction_limit must be nonzero".into()));
        }

        let redemption_shape = match maintainer.redemption_shape.as_str() {
            "change_first" => RedemptionTransactionShape::ChangeFirst,
            "change_last" => RedemptionTransactionShape::ChangeLast,
            other => {
                return Err(Error::Configuration(format!(
                    "unrecognized redemption_shape {other:?}, expected \"change_first\" or \"change_last\""
                )))
            }
        };

        Ok(Settings {
            history_depth: maintainer.history_depth,
            transaction_limit: maintainer.transaction_limit,
            restart_backoff_time: Duration::from_secs(maintainer.restart_backoff_time_secs),
            idle_backoff_time: Duration::from_secs(maintainer.idle_backoff_time_secs),
            epoch_proven_back_off_time: Duration::from_secs(
                maintainer.epoch_proven_back_off_time_secs,
            ),
            redemption_shape,
        })
    }
}
