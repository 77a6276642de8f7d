//! Harness configuration.
//!
//! Values are layered with [figment]: built-in defaults, then the selected `[profile.<name>]`
//! table of `ante.toml`, then `ANTE_`-prefixed environment variables, then anything the caller
//! merges on top (command line flags). A profile inherits every key it does not set from
//! `[profile.default]`.
//!
//! ```toml
//! [profile.default]
//! rpc_url = "http://localhost:8545"
//!
//! [profile.default.probe]
//! ceiling = 256
//! layouts = ["index_first"]
//!
//! [[profile.default.checks]]
//! name = "yearn-withdraw"
//! artifact = "out/AnteYearnWithdrawTest.sol/AnteYearnWithdrawTest.json"
//! args = ["0x5f18c75abdae578b483e5f43f12a39cf75b973a9"]
//! priming = [
//!     { kind = "forge_balance", token = "0x5f18c75abdae578b483e5f43f12a39cf75b973a9", amount = "100000" },
//!     { kind = "invoke", signature = "withdraw()" },
//!     { kind = "advance_time", seconds = 960 },
//!     { kind = "mine", blocks = 1 },
//! ]
//! ```

use crate::{CheckDefinition, PrimingStep, Result, abi::DEFAULT_PREDICATE, load_check};
use alloy_primitives::Address;
use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map, Value},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::slots::ProbeConfig;

/// A check loaded from a compiled artifact.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    /// Foundry or Hardhat artifact JSON, relative to the config file.
    pub artifact: PathBuf,
    /// Constructor arguments, coerced using the artifact ABI.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub priming: Vec<PrimingStep>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory that artifact paths are relative to.
    #[serde(skip)]
    pub root: PathBuf,
    /// JSON-RPC endpoint of the dev node.
    pub rpc_url: String,
    /// Account that deploys and primes checks. Defaults to the node's first unlocked account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,
    /// Signature of the boolean predicate asserted on every check.
    pub predicate: String,
    /// Run every check inside its own snapshot.
    pub isolate_checks: bool,
    pub probe: ProbeConfig,
    pub checks: Vec<CheckConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            rpc_url: "http://localhost:8545".to_string(),
            sender: None,
            predicate: DEFAULT_PREDICATE.to_string(),
            isolate_checks: true,
            probe: ProbeConfig::default(),
            checks: Vec::new(),
        }
    }
}

impl HarnessConfig {
    /// Name of the config file.
    pub const FILE_NAME: &'static str = "ante.toml";

    /// Prefix of environment variables overriding config keys. Nested keys are separated by a
    /// double underscore, e.g. `ANTE_PROBE__CEILING`.
    pub const ENV_PREFIX: &'static str = "ANTE_";

    /// The profile every other profile inherits from.
    pub const DEFAULT_PROFILE: Profile = Profile::Default;

    /// Returns the profile selected by `ANTE_PROFILE`, falling back to `default`.
    pub fn selected_profile() -> Profile {
        Profile::from_env_or("ANTE_PROFILE", Self::DEFAULT_PROFILE)
    }

    /// Builds the layered figment for the config file at `path`, which may not exist.
    pub fn figment(path: &Path, profile: Option<&str>) -> Figment {
        let profile = profile.map(Profile::new).unwrap_or_else(Self::selected_profile);
        Figment::from(Serialized::defaults(Self::default()))
            .merge(ProfileTables::new(path))
            .merge(Env::prefixed(Self::ENV_PREFIX).ignore(&["PROFILE"]).split("__").global())
            .select(profile)
    }

    /// Extracts the config from `figment`, resolving artifact paths against the directory of
    /// `path`.
    pub fn from_figment(figment: &Figment, path: &Path) -> Result<Self> {
        let mut config: Self = figment.extract()?;
        config.root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(config)
    }

    /// Loads the config file at `path` with the given profile.
    pub fn load(path: impl AsRef<Path>, profile: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_figment(&Self::figment(path, profile), path)
    }

    /// Loads every configured check from its artifact.
    pub fn load_checks(&self) -> Result<Vec<CheckDefinition>> {
        self.checks.iter().map(|check| load_check(check, &self.root)).collect()
    }
}

/// Reads `[profile.<name>]` tables of a TOML file as figment profiles.
struct ProfileTables {
    path: PathBuf,
}

impl ProfileTables {
    fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }
}

impl Provider for ProfileTables {
    fn metadata(&self) -> Metadata {
        Toml::file(&self.path).nested().metadata()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        let mut data = Toml::file(&self.path).nested().data()?;
        let Some(tables) = data.remove(&Profile::new("profile")) else {
            return Ok(Map::new());
        };

        let mut profiles = Map::new();
        for (name, value) in tables {
            match value {
                Value::Dict(_, dict) => {
                    profiles.insert(Profile::new(&name), dict);
                }
                bad => {
                    let mut err = figment::Error::from(figment::error::Kind::InvalidType(
                        bad.to_actual(),
                        "table".into(),
                    ));
                    err.metadata = Some(self.metadata());
                    err.profile = Some(Profile::new(&name));
                    return Err(err);
                }
            }
        }
        Ok(profiles)
    }
}
