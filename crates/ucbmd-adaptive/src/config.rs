//! Adaptive sampling configuration.
//!
//! Serde-based TOML parsing with per-field defaults, plus a builder for
//! programmatic use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use ucbmd_core::{Result, UcbError};

/// Which dataset plays the role of the state space for Q/N bookkeeping and spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSpace {
    /// Clusters of the projected metric data
    #[default]
    Metric,
    /// Clusters of the goal-projected data
    Goal,
    /// Clusters of the reduced (TICA) data the model was built on
    Tica,
    /// Macrostates of the Markov model, mapped back onto the TICA clusters
    TicaPcca,
}

/// Which state a trajectory's rewards are attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardMode {
    /// One reward per trajectory, credited to the state it was spawned from
    #[default]
    Parent,
    /// One reward per connected frame, credited to that frame's own state
    Frames,
}

/// Statistic applied over the trailing reward window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardMethod {
    Mean,
    #[default]
    Max,
}

impl FromStr for ActionSpace {
    type Err = UcbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "metric" => Ok(Self::Metric),
            "goal" => Ok(Self::Goal),
            "tica" => Ok(Self::Tica),
            "ticapcca" => Ok(Self::TicaPcca),
            other => Err(UcbError::config(format!("Invalid action space {}", other))),
        }
    }
}

impl FromStr for RewardMode {
    type Err = UcbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "parent" => Ok(Self::Parent),
            "frames" => Ok(Self::Frames),
            other => Err(UcbError::config(format!("Invalid reward mode {}", other))),
        }
    }
}

impl FromStr for RewardMethod {
    type Err = UcbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            other => Err(UcbError::config(format!(
                "Reward method {} not available",
                other
            ))),
        }
    }
}

impl fmt::Display for ActionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Metric => "metric",
            Self::Goal => "goal",
            Self::Tica => "tica",
            Self::TicaPcca => "ticapcca",
        };
        f.write_str(s)
    }
}

/// Reclustering of the action space with an independent cluster count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclusterConfig {
    pub n_clusters: usize,
}

/// Configuration for one adaptive UCB campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Keep one frame in `skip` when projecting
    #[serde(default = "default_one")]
    pub skip: usize,

    /// Markov-model lag time in frames
    #[serde(default = "default_one")]
    pub lag: usize,

    /// UCB exploration coefficient `c`
    #[serde(default = "default_exploration")]
    pub exploration: f64,

    /// Temperature in Kelvin for free-energy rewards
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Requested TICA lag in frames (clamped per epoch)
    #[serde(default = "default_tica_lag")]
    pub tica_lag: usize,

    /// TICA dimensions, 0 disables reduction
    #[serde(default = "default_tica_dim")]
    pub tica_dim: usize,

    /// Requested macrostate count
    #[serde(default = "default_macronum")]
    pub macronum: usize,

    /// Persist goal data and the fitted model every epoch
    #[serde(default)]
    pub save: bool,

    /// Persist Q, N, scores and action counts every epoch
    #[serde(default)]
    pub save_qval: bool,

    #[serde(default)]
    pub action_space: ActionSpace,

    #[serde(default)]
    pub recluster: Option<ReclusterConfig>,

    /// Uniform random respawn baseline, bypasses scoring
    #[serde(default)]
    pub random: bool,

    #[serde(default)]
    pub reward_mode: RewardMode,

    #[serde(default)]
    pub reward_method: RewardMethod,

    /// Trailing reward window in frames, whole trajectory when unset
    #[serde(default)]
    pub reward_window: Option<usize>,

    /// Weight the exploration bonus by the per-state goal prior
    #[serde(default)]
    pub pucb: bool,

    /// Goal pseudo-count as a fraction of frames per cluster at the frame budget
    #[serde(default = "default_goal_init")]
    pub goal_init: f64,

    /// Top-scoring states to draw from, 0 means the launch quota
    #[serde(default)]
    pub action_pool: usize,

    /// Maximum number of concurrently running simulations
    #[serde(default = "default_one")]
    pub nmax: usize,

    /// Frame budget of the campaign, 0 disables the stop check
    #[serde(default)]
    pub nframes: usize,

    /// Clustering attempts before escalating transient failures
    #[serde(default = "default_max_cluster_retries")]
    pub max_cluster_retries: usize,

    /// Directory of per-epoch artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Seed for action sampling, entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_one() -> usize {
    1
}

fn default_exploration() -> f64 {
    0.5
}

fn default_temperature() -> f64 {
    300.0
}

fn default_tica_lag() -> usize {
    20
}

fn default_tica_dim() -> usize {
    3
}

fn default_macronum() -> usize {
    8
}

fn default_goal_init() -> f64 {
    0.3
}

fn default_max_cluster_retries() -> usize {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("saveddata")
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            skip: 1,
            lag: 1,
            exploration: default_exploration(),
            temperature: default_temperature(),
            tica_lag: default_tica_lag(),
            tica_dim: default_tica_dim(),
            macronum: default_macronum(),
            save: false,
            save_qval: false,
            action_space: ActionSpace::Metric,
            recluster: None,
            random: false,
            reward_mode: RewardMode::Parent,
            reward_method: RewardMethod::Max,
            reward_window: None,
            pucb: false,
            goal_init: default_goal_init(),
            action_pool: 0,
            nmax: 1,
            nframes: 0,
            max_cluster_retries: default_max_cluster_retries(),
            output_dir: default_output_dir(),
            seed: None,
        }
    }
}

impl AdaptiveConfig {
    /// Creates a builder for adaptive configuration.
    pub fn builder() -> AdaptiveConfigBuilder {
        AdaptiveConfigBuilder::default()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| UcbError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        if self.skip == 0 {
            return Err(UcbError::config("skip must be > 0"));
        }
        if self.lag == 0 {
            return Err(UcbError::config("lag must be > 0"));
        }
        if !(self.temperature > 0.0) {
            return Err(UcbError::config(format!(
                "temperature must be > 0 (got {})",
                self.temperature
            )));
        }
        if !(self.exploration >= 0.0) {
            return Err(UcbError::config(format!(
                "exploration must be >= 0 (got {})",
                self.exploration
            )));
        }
        if !(self.goal_init >= 0.0) {
            return Err(UcbError::config(format!(
                "goal_init must be >= 0 (got {})",
                self.goal_init
            )));
        }
        if self.reward_window == Some(0) {
            return Err(UcbError::config("reward_window must be > 0 when set"));
        }
        if self.max_cluster_retries == 0 {
            return Err(UcbError::config("max_cluster_retries must be > 0"));
        }
        if matches!(self.action_space, ActionSpace::Tica | ActionSpace::TicaPcca)
            && self.tica_dim == 0
        {
            return Err(UcbError::config(format!(
                "action space {} requires tica_dim > 0",
                self.action_space
            )));
        }
        if let Some(rc) = self.recluster {
            if rc.n_clusters == 0 {
                return Err(UcbError::config("recluster.n_clusters must be > 0"));
            }
        }
        Ok(())
    }
}

/// Builder for AdaptiveConfig.
#[derive(Debug, Default)]
pub struct AdaptiveConfigBuilder {
    config: AdaptiveConfig,
}

impl AdaptiveConfigBuilder {
    pub fn skip(mut self, skip: usize) -> Self {
        self.config.skip = skip;
        self
    }

    pub fn lag(mut self, lag: usize) -> Self {
        self.config.lag = lag;
        self
    }

    pub fn exploration(mut self, exploration: f64) -> Self {
        self.config.exploration = exploration;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn tica(mut self, lag: usize, dim: usize) -> Self {
        self.config.tica_lag = lag;
        self.config.tica_dim = dim;
        self
    }

    pub fn macronum(mut self, macronum: usize) -> Self {
        self.config.macronum = macronum;
        self
    }

    pub fn save(mut self, save: bool, save_qval: bool) -> Self {
        self.config.save = save;
        self.config.save_qval = save_qval;
        self
    }

    pub fn action_space(mut self, space: ActionSpace) -> Self {
        self.config.action_space = space;
        self
    }

    pub fn recluster(mut self, n_clusters: usize) -> Self {
        self.config.recluster = Some(ReclusterConfig { n_clusters });
        self
    }

    pub fn random(mut self, random: bool) -> Self {
        self.config.random = random;
        self
    }

    pub fn reward(mut self, mode: RewardMode, method: RewardMethod, window: Option<usize>) -> Self {
        self.config.reward_mode = mode;
        self.config.reward_method = method;
        self.config.reward_window = window;
        self
    }

    pub fn pucb(mut self, pucb: bool) -> Self {
        self.config.pucb = pucb;
        self
    }

    pub fn goal_init(mut self, goal_init: f64) -> Self {
        self.config.goal_init = goal_init;
        self
    }

    pub fn action_pool(mut self, pool: usize) -> Self {
        self.config.action_pool = pool;
        self
    }

    pub fn nmax(mut self, nmax: usize) -> Self {
        self.config.nmax = nmax;
        self
    }

    pub fn nframes(mut self, nframes: usize) -> Self {
        self.config.nframes = nframes;
        self
    }

    pub fn max_cluster_retries(mut self, retries: usize) -> Self {
        self.config.max_cluster_retries = retries;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> AdaptiveConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = AdaptiveConfig::from_toml("").unwrap();
        assert_eq!(config.skip, 1);
        assert_eq!(config.exploration, 0.5);
        assert_eq!(config.temperature, 300.0);
        assert_eq!(config.tica_dim, 3);
        assert_eq!(config.macronum, 8);
        assert_eq!(config.action_space, ActionSpace::Metric);
        assert_eq!(config.reward_mode, RewardMode::Parent);
        assert_eq!(config.reward_method, RewardMethod::Max);
        assert_eq!(config.goal_init, 0.3);
        assert_eq!(config.action_pool, 0);
    }

    #[test]
    fn test_parse_modes() {
        let config = AdaptiveConfig::from_toml(
            r#"
            action_space = "ticapcca"
            reward_mode = "frames"
            reward_method = "mean"
            reward_window = 5
            nmax = 12

            [recluster]
            n_clusters = 40
            "#,
        )
        .unwrap();
        assert_eq!(config.action_space, ActionSpace::TicaPcca);
        assert_eq!(config.reward_mode, RewardMode::Frames);
        assert_eq!(config.reward_method, RewardMethod::Mean);
        assert_eq!(config.reward_window, Some(5));
        assert_eq!(config.recluster, Some(ReclusterConfig { n_clusters: 40 }));
    }

    #[test]
    fn test_unknown_mode_is_configuration_error() {
        let err = AdaptiveConfig::from_toml("reward_method = \"median\"").unwrap_err();
        assert!(matches!(err, UcbError::ConfigurationError(_)));
        assert!(matches!(
            "median".parse::<RewardMethod>(),
            Err(UcbError::ConfigurationError(_))
        ));
        assert!(matches!(
            "trajectory".parse::<RewardMode>(),
            Err(UcbError::ConfigurationError(_))
        ));
        assert!(matches!(
            "pca".parse::<ActionSpace>(),
            Err(UcbError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_tica_space_without_tica() {
        let config = AdaptiveConfig::builder()
            .tica(20, 0)
            .action_space(ActionSpace::Tica)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(AdaptiveConfig::builder().lag(0).build().validate().is_err());
        assert!(AdaptiveConfig::builder()
            .temperature(0.0)
            .build()
            .validate()
            .is_err());
        assert!(AdaptiveConfig::builder()
            .reward(RewardMode::Frames, RewardMethod::Max, Some(0))
            .build()
            .validate()
            .is_err());
        assert!(AdaptiveConfig::builder().build().validate().is_ok());
    }
}
