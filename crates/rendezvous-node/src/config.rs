use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rendezvous_core::DEFAULT_POLL_INTERVAL_MS;
use rendezvous_core::constants::MAX_POLL_INTERVAL_MS;
use rendezvous_core::constants::MIN_POLL_INTERVAL_MS;
use rendezvous_network::Instance;
use rendezvous_network::Role;
use rendezvous_network::Subnet;
use rendezvous_sync::validate_name;
use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;
use snafu::Snafu;

/// Configuration of one test network run.
///
/// Configuration is loaded in layers with the following precedence (lowest to highest):
/// 1. Environment variables (RENDEZVOUS_*)
/// 2. TOML configuration file
/// 3. Command-line arguments
///
/// Every instance of a run must see the same configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Namespace of the run on the coordination backend.
    #[serde(default = "default_run_id")]
    pub run_id: String,

    /// Seed for every random choice of the run (peer windows, start order).
    #[serde(default)]
    pub seed: u64,

    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// Number of validators, the orchestrator included.
    #[serde(default = "default_validators")]
    pub validators: u32,

    #[serde(default)]
    pub seeds: u32,

    #[serde(default = "default_bridges")]
    pub bridges: u32,

    #[serde(default = "default_full_nodes")]
    pub full_nodes: u32,

    #[serde(default)]
    pub light_nodes: u32,

    /// Subnet every instance address is assigned from.
    #[serde(default)]
    pub subnet: Subnet,

    /// Validators with `group_seq <= persistent_peers_cap` publish peer info.
    #[serde(default = "default_persistent_peers_cap")]
    pub persistent_peers_cap: u32,

    /// Size of each validator's persistent peer window.
    #[serde(default = "default_peers_per_node")]
    pub peers_per_node: u32,

    /// Genesis stake of each validator.
    #[serde(default = "default_validator_stake")]
    pub validator_stake: u64,

    /// Amount the orchestrator sends to each funding request.
    #[serde(default = "default_funding_amount")]
    pub funding_amount: u64,

    /// Height an upstream node must reach before announcing itself.
    /// Its hash becomes the trusted checkpoint.
    #[serde(default = "default_initial_height")]
    pub initial_height: u64,

    /// Unconditional wait between reaching the initial height and announcing.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Interval of topic, barrier and height polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deadline of one instance from start to teardown.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Deadline of one coordination stage, capped by `timeout_secs`.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,

    /// Which tier light nodes take their descriptor from.
    #[serde(default)]
    pub light_upstream: LightUpstream,

    #[serde(default = "default_p2p_port")]
    pub p2p_port: u16,

    /// Port bridges and full nodes serve downstream nodes on.
    #[serde(default = "default_service_port")]
    pub service_port: u16,

    /// Root of per-instance node homes.
    /// Defaults to "./data/{run_id}" if not specified.
    pub home_dir: Option<PathBuf>,

    /// Block interval of simulated nodes.
    #[serde(default = "default_block_time_ms")]
    pub block_time_ms: u64,

    /// Upper bound of the random delay before each instance starts.
    #[serde(default = "default_start_jitter_ms")]
    pub start_jitter_ms: u64,
}

/// Tier light nodes resolve their upstream from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LightUpstream {
    #[default]
    Bridge,
    Full,
}

impl FromStr for LightUpstream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bridge" => Ok(LightUpstream::Bridge),
            "full" => Ok(LightUpstream::Full),
            _ => Err(format!("invalid light upstream: {}", s)),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: default_run_id(),
            seed: 0,
            chain_id: default_chain_id(),
            validators: default_validators(),
            seeds: 0,
            bridges: default_bridges(),
            full_nodes: default_full_nodes(),
            light_nodes: 0,
            subnet: Subnet::default(),
            persistent_peers_cap: default_persistent_peers_cap(),
            peers_per_node: default_peers_per_node(),
            validator_stake: default_validator_stake(),
            funding_amount: default_funding_amount(),
            initial_height: default_initial_height(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
            stage_timeout_secs: default_stage_timeout_secs(),
            light_upstream: LightUpstream::default(),
            p2p_port: default_p2p_port(),
            service_port: default_service_port(),
            home_dir: None,
            block_time_ms: default_block_time_ms(),
            start_jitter_ms: default_start_jitter_ms(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        toml::from_str(&content).context(ParseTomlSnafu { path })
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables follow the pattern RENDEZVOUS_<FIELD_NAME> (uppercase).
    pub fn from_env() -> Self {
        Self {
            run_id: parse_env("RENDEZVOUS_RUN_ID").unwrap_or_else(default_run_id),
            seed: parse_env("RENDEZVOUS_SEED").unwrap_or(0),
            chain_id: parse_env("RENDEZVOUS_CHAIN_ID").unwrap_or_else(default_chain_id),
            validators: parse_env("RENDEZVOUS_VALIDATORS").unwrap_or_else(default_validators),
            seeds: parse_env("RENDEZVOUS_SEEDS").unwrap_or(0),
            bridges: parse_env("RENDEZVOUS_BRIDGES").unwrap_or_else(default_bridges),
            full_nodes: parse_env("RENDEZVOUS_FULL_NODES").unwrap_or_else(default_full_nodes),
            light_nodes: parse_env("RENDEZVOUS_LIGHT_NODES").unwrap_or(0),
            subnet: parse_env("RENDEZVOUS_SUBNET").unwrap_or_default(),
            persistent_peers_cap: parse_env("RENDEZVOUS_PERSISTENT_PEERS_CAP")
                .unwrap_or_else(default_persistent_peers_cap),
            peers_per_node: parse_env("RENDEZVOUS_PEERS_PER_NODE").unwrap_or_else(default_peers_per_node),
            validator_stake: parse_env("RENDEZVOUS_VALIDATOR_STAKE").unwrap_or_else(default_validator_stake),
            funding_amount: parse_env("RENDEZVOUS_FUNDING_AMOUNT").unwrap_or_else(default_funding_amount),
            initial_height: parse_env("RENDEZVOUS_INITIAL_HEIGHT").unwrap_or_else(default_initial_height),
            settle_delay_ms: parse_env("RENDEZVOUS_SETTLE_DELAY_MS").unwrap_or_else(default_settle_delay_ms),
            poll_interval_ms: parse_env("RENDEZVOUS_POLL_INTERVAL_MS").unwrap_or_else(default_poll_interval_ms),
            timeout_secs: parse_env("RENDEZVOUS_TIMEOUT_SECS").unwrap_or_else(default_timeout_secs),
            stage_timeout_secs: parse_env("RENDEZVOUS_STAGE_TIMEOUT_SECS")
                .unwrap_or_else(default_stage_timeout_secs),
            light_upstream: parse_env("RENDEZVOUS_LIGHT_UPSTREAM").unwrap_or_default(),
            p2p_port: parse_env("RENDEZVOUS_P2P_PORT").unwrap_or_else(default_p2p_port),
            service_port: parse_env("RENDEZVOUS_SERVICE_PORT").unwrap_or_else(default_service_port),
            home_dir: parse_env("RENDEZVOUS_HOME_DIR"),
            block_time_ms: parse_env("RENDEZVOUS_BLOCK_TIME_MS").unwrap_or_else(default_block_time_ms),
            start_jitter_ms: parse_env("RENDEZVOUS_START_JITTER_MS").unwrap_or_else(default_start_jitter_ms),
        }
    }

    /// Merge configuration from another source.
    ///
    /// Fields in `other` that are `Some` or non-default override fields in `self`.
    /// This is used to implement the layered config precedence.
    pub fn merge(&mut self, other: Self) {
        if other.run_id != default_run_id() {
            self.run_id = other.run_id;
        }
        if other.seed != 0 {
            self.seed = other.seed;
        }
        if other.chain_id != default_chain_id() {
            self.chain_id = other.chain_id;
        }
        if other.validators != default_validators() {
            self.validators = other.validators;
        }
        if other.seeds != 0 {
            self.seeds = other.seeds;
        }
        if other.bridges != default_bridges() {
            self.bridges = other.bridges;
        }
        if other.full_nodes != default_full_nodes() {
            self.full_nodes = other.full_nodes;
        }
        if other.light_nodes != 0 {
            self.light_nodes = other.light_nodes;
        }
        if other.subnet != Subnet::default() {
            self.subnet = other.subnet;
        }
        if other.persistent_peers_cap != default_persistent_peers_cap() {
            self.persistent_peers_cap = other.persistent_peers_cap;
        }
        if other.peers_per_node != default_peers_per_node() {
            self.peers_per_node = other.peers_per_node;
        }
        if other.validator_stake != default_validator_stake() {
            self.validator_stake = other.validator_stake;
        }
        if other.funding_amount != default_funding_amount() {
            self.funding_amount = other.funding_amount;
        }
        if other.initial_height != default_initial_height() {
            self.initial_height = other.initial_height;
        }
        if other.settle_delay_ms != default_settle_delay_ms() {
            self.settle_delay_ms = other.settle_delay_ms;
        }
        if other.poll_interval_ms != default_poll_interval_ms() {
            self.poll_interval_ms = other.poll_interval_ms;
        }
        if other.timeout_secs != default_timeout_secs() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.stage_timeout_secs != default_stage_timeout_secs() {
            self.stage_timeout_secs = other.stage_timeout_secs;
        }
        if other.light_upstream != LightUpstream::default() {
            self.light_upstream = other.light_upstream;
        }
        if other.p2p_port != default_p2p_port() {
            self.p2p_port = other.p2p_port;
        }
        if other.service_port != default_service_port() {
            self.service_port = other.service_port;
        }
        if other.home_dir.is_some() {
            self.home_dir = other.home_dir;
        }
        if other.block_time_ms != default_block_time_ms() {
            self.block_time_ms = other.block_time_ms;
        }
        if other.start_jitter_ms != default_start_jitter_ms() {
            self.start_jitter_ms = other.start_jitter_ms;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error naming the first field that cannot describe a
    /// working network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(err) = validate_name(&self.run_id) {
            return Err(ConfigError::Validation {
                message: format!("run_id is not usable as a key namespace: {err}"),
            });
        }

        if self.chain_id.is_empty() {
            return Err(ConfigError::Validation {
                message: "chain_id must not be empty".into(),
            });
        }

        if self.validators == 0 {
            return Err(ConfigError::Validation {
                message: "validators must be at least 1 (the orchestrator is a validator)".into(),
            });
        }

        if self.full_nodes > 0 && self.bridges == 0 {
            return Err(ConfigError::Validation {
                message: "full nodes need at least one bridge to take their checkpoint from".into(),
            });
        }

        if self.light_nodes > 0 {
            match self.light_upstream {
                LightUpstream::Bridge if self.bridges == 0 => {
                    return Err(ConfigError::Validation {
                        message: "light nodes with light_upstream = \"bridge\" need at least one bridge".into(),
                    });
                }
                LightUpstream::Full if self.full_nodes == 0 => {
                    return Err(ConfigError::Validation {
                        message: "light nodes with light_upstream = \"full\" need at least one full node".into(),
                    });
                }
                _ => {}
            }
        }

        let total = self.total_instances();
        if total == 0 || !self.subnet.can_address(total) {
            return Err(ConfigError::Validation {
                message: format!(
                    "subnet {} addresses at most {} instances but the run has {total}; use a shorter prefix",
                    self.subnet,
                    self.subnet.capacity().saturating_sub(1)
                ),
            });
        }

        if self.persistent_peers_cap == 0 {
            return Err(ConfigError::Validation {
                message: "persistent_peers_cap must be non-zero".into(),
            });
        }

        if self.peers_per_node == 0 {
            return Err(ConfigError::Validation {
                message: "peers_per_node must be non-zero".into(),
            });
        }

        if self.initial_height == 0 {
            return Err(ConfigError::Validation {
                message: "initial_height must be at least 1".into(),
            });
        }

        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::Validation {
                message: format!(
                    "poll_interval_ms must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"
                ),
            });
        }

        if self.block_time_ms == 0 {
            return Err(ConfigError::Validation {
                message: "block_time_ms must be non-zero".into(),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation {
                message: "timeout_secs must be non-zero".into(),
            });
        }

        if self.stage_timeout_secs == 0 || self.stage_timeout_secs > self.timeout_secs {
            return Err(ConfigError::Validation {
                message: "stage_timeout_secs must be non-zero and at most timeout_secs".into(),
            });
        }

        Ok(())
    }

    /// Number of instances across every role.
    ///
    /// Saturates; an overflowing run fails subnet validation.
    pub fn total_instances(&self) -> u32 {
        [self.seeds, self.bridges, self.full_nodes, self.light_nodes]
            .iter()
            .fold(self.validators, |total, count| total.saturating_add(*count))
    }

    /// Number of instances of `role`.
    pub fn count_of(&self, role: Role) -> u32 {
        match role {
            Role::Validator => self.validators,
            Role::Orchestrator => self.validators.min(1),
            Role::Seed => self.seeds,
            Role::Bridge => self.bridges,
            Role::Full => self.full_nodes,
            Role::Light => self.light_nodes,
        }
    }

    /// Every instance of the run in global sequence order.
    ///
    /// Global sequence numbers run validators first, then seeds, bridges,
    /// full nodes and light nodes. Group sequence numbers restart at 1 per
    /// role.
    pub fn instances(&self) -> Vec<Instance> {
        let groups = [
            (Role::Validator, self.validators),
            (Role::Seed, self.seeds),
            (Role::Bridge, self.bridges),
            (Role::Full, self.full_nodes),
            (Role::Light, self.light_nodes),
        ];

        let mut instances = Vec::with_capacity(self.total_instances() as usize);
        let mut global_seq = 0u32;
        for (role, count) in groups {
            for group_seq in 1..=count {
                global_seq = global_seq.saturating_add(1);
                instances.push(Instance::new(global_seq, group_seq, role));
            }
        }
        instances
    }

    /// Funding requests the orchestrator waits for: one per bridge and
    /// light node.
    pub fn expected_funding_requests(&self) -> u32 {
        self.bridges.saturating_add(self.light_nodes)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    /// Get the home root, using the default if not specified.
    pub fn home_dir(&self) -> PathBuf {
        self.home_dir.clone().unwrap_or_else(|| PathBuf::from(format!("./data/{}", self.run_id)))
    }

    /// Home directory of one instance's node.
    pub fn instance_home(&self, instance: &Instance) -> PathBuf {
        self.home_dir().join(instance.label())
    }
}

fn default_run_id() -> String {
    "local".into()
}

fn default_chain_id() -> String {
    "rendezvous-local".into()
}

fn default_validators() -> u32 {
    4
}

fn default_bridges() -> u32 {
    1
}

fn default_full_nodes() -> u32 {
    1
}

fn default_persistent_peers_cap() -> u32 {
    10
}

fn default_peers_per_node() -> u32 {
    3
}

fn default_validator_stake() -> u64 {
    5_000_000
}

fn default_funding_amount() -> u64 {
    1_000_000
}

fn default_initial_height() -> u64 {
    3
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_stage_timeout_secs() -> u64 {
    120
}

fn default_p2p_port() -> u16 {
    26656
}

fn default_service_port() -> u16 {
    2121
}

fn default_block_time_ms() -> u64 {
    25
}

fn default_start_jitter_ms() -> u64 {
    50
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

/// Configuration loading and parsing errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("failed to read config file {}: {source}", path.display()))]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to parse config file {}: {source}", path.display()))]
    ParseToml { path: PathBuf, source: toml::de::Error },

    #[snafu(display("invalid configuration: {message}"))]
    Validation { message: String },
}
