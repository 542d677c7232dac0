//! Per-epoch adaptive UCB control loop.
//!
//! ```text
//! PROJECT → GOAL_PROJECT? → REDUCE? → CLUSTER → BUILD_MODEL
//!         → SCORE_STATES → SELECT_ACTIONS → SPAWN → DONE
//!
//!   (reduced) dataset holds ≥ nframes frames → STOPPED
//! ```
//!
//! Every stage works on its own snapshot: collaborators return new datasets
//! and nothing is relabelled in place.

use crate::artifacts::{self, ArtifactStore};
use crate::config::{ActionSpace, AdaptiveConfig};
use crate::decision::{DecisionInput, DecisionPass, SpawnPlan};
use crate::heuristics::{self, ClusterCountStrategy, LogFramesHeuristic};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use ucbmd_core::{
    Clusterer, DimensionReducer, MarkovModel, MarkovModeller, Projector, Result, SimRecord,
    TrajectoryDataset, UcbError,
};

/// Goal values post-processing applied before per-state maxima are taken.
pub type GoalPreprocess = Box<dyn Fn(Vec<f64>) -> Vec<f64>>;

/// External services the orchestrator drives.
pub struct Collaborators {
    pub projector: Box<dyn Projector>,
    /// Projects the scalar goal function, one value per frame
    pub goal_projector: Option<Box<dyn Projector>>,
    pub goal_preprocess: Option<GoalPreprocess>,
    pub reducer: Option<Box<dyn DimensionReducer>>,
    pub clusterer: Box<dyn Clusterer>,
    /// Used for action-space reclustering, falls back to `clusterer`
    pub reclusterer: Option<Box<dyn Clusterer>>,
    pub modeller: Box<dyn MarkovModeller>,
}

impl Collaborators {
    pub fn new(
        projector: Box<dyn Projector>,
        clusterer: Box<dyn Clusterer>,
        modeller: Box<dyn MarkovModeller>,
    ) -> Self {
        Self {
            projector,
            goal_projector: None,
            goal_preprocess: None,
            reducer: None,
            clusterer,
            reclusterer: None,
            modeller,
        }
    }

    pub fn with_goal(mut self, projector: Box<dyn Projector>) -> Self {
        self.goal_projector = Some(projector);
        self
    }

    pub fn with_goal_preprocess(mut self, preprocess: GoalPreprocess) -> Self {
        self.goal_preprocess = Some(preprocess);
        self
    }

    pub fn with_reducer(mut self, reducer: Box<dyn DimensionReducer>) -> Self {
        self.reducer = Some(reducer);
        self
    }

    pub fn with_reclusterer(mut self, clusterer: Box<dyn Clusterer>) -> Self {
        self.reclusterer = Some(clusterer);
        self
    }
}

/// What the orchestrator needs to know about the campaign at epoch start.
#[derive(Debug, Clone)]
pub struct EpochInput {
    pub epoch: usize,
    /// Every simulation produced so far, with lineage
    pub sims: Vec<SimRecord>,
    /// Simulations still running; only `nmax - running` slots are filled
    pub running: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EpochOutcome {
    /// Frame budget reached, the campaign ends
    Stopped { num_frames: usize },
    Spawned(SpawnPlan),
}

/// Stage of the epoch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochStage {
    Idle,
    Project,
    GoalProject,
    Reduce,
    Cluster,
    BuildModel,
    ScoreStates,
    SelectActions,
    Spawn,
    Done,
    Stopped,
}

impl fmt::Display for EpochStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Project => "PROJECT",
            Self::GoalProject => "GOAL_PROJECT",
            Self::Reduce => "REDUCE",
            Self::Cluster => "CLUSTER",
            Self::BuildModel => "BUILD_MODEL",
            Self::ScoreStates => "SCORE_STATES",
            Self::SelectActions => "SELECT_ACTIONS",
            Self::Spawn => "SPAWN",
            Self::Done => "DONE",
            Self::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Projected goal function for the current epoch.
struct GoalData {
    dataset: TrajectoryDataset,
    values: Vec<f64>,
}

/// Adaptive sampling orchestrator.
pub struct AdaptiveUcb {
    config: AdaptiveConfig,
    collaborators: Collaborators,
    cluster_count: Box<dyn ClusterCountStrategy>,
    rng: ChaCha8Rng,
    stage: EpochStage,
}

impl AdaptiveUcb {
    /// Validates the configuration against the available collaborators.
    pub fn new(config: AdaptiveConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        if config.tica_dim > 0 && collaborators.reducer.is_none() {
            return Err(UcbError::config(format!(
                "tica_dim = {} needs a dimension reducer",
                config.tica_dim
            )));
        }
        if config.action_space == ActionSpace::Goal && collaborators.goal_projector.is_none() {
            return Err(UcbError::config(
                "the goal action space needs a goal function",
            ));
        }
        if config.pucb && collaborators.goal_projector.is_none() {
            return Err(UcbError::config("PUCB needs a goal function"));
        }

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        log::info!(
            "Adaptive UCB: action space {}, exploration {}, nmax {}",
            config.action_space,
            config.exploration,
            config.nmax
        );
        Ok(Self {
            config,
            collaborators,
            cluster_count: Box::new(LogFramesHeuristic),
            rng,
            stage: EpochStage::Idle,
        })
    }

    /// Replaces the frames → cluster count heuristic.
    pub fn with_cluster_count(mut self, strategy: Box<dyn ClusterCountStrategy>) -> Self {
        self.cluster_count = strategy;
        self
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Last stage entered; `Done` or `Stopped` after a successful epoch.
    pub fn stage(&self) -> EpochStage {
        self.stage
    }

    fn enter(&mut self, stage: EpochStage) {
        log::debug!("[Adaptive] {} → {}", self.stage, stage);
        self.stage = stage;
    }

    /// Runs one analyse-and-respawn iteration.
    pub fn run_epoch(&mut self, input: &EpochInput) -> Result<EpochOutcome> {
        let store = ArtifactStore::new(&self.config.output_dir, input.epoch);
        log::info!("Postprocessing new data (epoch {})", input.epoch);

        self.enter(EpochStage::Project);
        let data = self
            .collaborators
            .projector
            .project(&input.sims, self.config.skip)?
            .drop_empty();
        if data.num_frames() == 0 {
            return Err(UcbError::data("no frames were projected"));
        }
        log::info!(
            "Projected {} trajectories, {} frames",
            data.num_trajectories(),
            data.num_frames()
        );

        let goal = self.project_goal(&data, &store)?;

        let reduced = self.reduce(&data)?;
        let model_data = reduced.as_ref().unwrap_or(&data);
        if self.config.nframes != 0 && model_data.num_frames() >= self.config.nframes {
            log::info!("Reached maximum number of frames. Stopping adaptive.");
            self.enter(EpochStage::Stopped);
            return Ok(EpochOutcome::Stopped {
                num_frames: model_data.num_frames(),
            });
        }

        self.enter(EpochStage::Cluster);
        let k = self.cluster_count.num_clusters(model_data.num_frames());
        let clustered = self.cluster_with_retry(false, model_data, k)?;

        self.enter(EpochStage::BuildModel);
        let model = self.build_model(&clustered)?;
        if self.config.save {
            store.save(artifacts::MODEL, &model)?;
        }
        let statdist = model.conformation_stationary_distribution(&clustered)?;

        let data_q = self.action_space(&data, reduced.is_some(), &clustered, &model, goal.as_ref())?;
        if data_q.traj_lengths() != clustered.traj_lengths() {
            return Err(UcbError::data(
                "action space and model data disagree on trajectory lengths",
            ));
        }

        self.enter(EpochStage::ScoreStates);
        let goal_values = match (goal, self.collaborators.goal_preprocess.as_ref()) {
            (Some(g), Some(preprocess)) => Some(preprocess(g.values)),
            (Some(g), None) => Some(g.values),
            (None, _) => None,
        };
        let n_launch = self.config.nmax.saturating_sub(input.running);
        let decision_input = DecisionInput {
            epoch: input.epoch,
            n_launch,
            data_q: &data_q,
            statdist: &statdist,
            goal: goal_values.as_deref(),
        };
        let scored = DecisionPass::new(&self.config, self.cluster_count.as_ref())
            .with_artifacts(&store)
            .score(decision_input)?;

        self.enter(EpochStage::SelectActions);
        let decision = DecisionPass::new(&self.config, self.cluster_count.as_ref())
            .with_artifacts(&store)
            .select(scored, decision_input, &mut self.rng)?;

        self.enter(EpochStage::Spawn);
        let plan = decision.into_plan(input.epoch, &data_q)?;
        log::info!(
            "Epoch {}: spawning {} simulations over {} states",
            input.epoch,
            plan.num_simulations(),
            plan.allocation.iter().filter(|&&a| a > 0).count()
        );
        self.enter(EpochStage::Done);
        Ok(EpochOutcome::Spawned(plan))
    }

    fn project_goal(
        &mut self,
        data: &TrajectoryDataset,
        store: &ArtifactStore,
    ) -> Result<Option<GoalData>> {
        if self.collaborators.goal_projector.is_none() {
            return Ok(None);
        }
        self.enter(EpochStage::GoalProject);
        log::debug!("Starting projection of directed component");
        let Some(projector) = self.collaborators.goal_projector.as_ref() else {
            return Ok(None);
        };
        let dataset = projector.project(&data.sims(), self.config.skip)?;
        if dataset.num_trajectories() != data.num_trajectories() {
            return Err(UcbError::data(format!(
                "goal function projected {} trajectories, the metric projection {}",
                dataset.num_trajectories(),
                data.num_trajectories()
            )));
        }
        let values = dataset.scalar_values()?;
        if self.config.save {
            store.save(artifacts::GOAL_DATA, &dataset.deconcatenate(&values)?)?;
        }
        log::debug!("Finished calculating directed component");
        Ok(Some(GoalData { dataset, values }))
    }

    fn reduce(&mut self, data: &TrajectoryDataset) -> Result<Option<TrajectoryDataset>> {
        if self.config.tica_dim == 0 {
            return Ok(None);
        }
        self.enter(EpochStage::Reduce);
        let Some(reducer) = self.collaborators.reducer.as_ref() else {
            return Ok(None);
        };
        let min_len = data.traj_lengths().into_iter().min().unwrap_or(0);
        let lag = heuristics::tica_lag(min_len, self.config.tica_lag);
        log::debug!("TICA lag {} (requested {})", lag, self.config.tica_lag);
        reducer.reduce(data, lag, self.config.tica_dim).map(Some)
    }

    /// Clusters `data`, retrying transient failures up to `max_cluster_retries` attempts.
    fn cluster_with_retry(
        &self,
        recluster: bool,
        data: &TrajectoryDataset,
        n_clusters: usize,
    ) -> Result<TrajectoryDataset> {
        let clusterer: &dyn Clusterer = match (recluster, self.collaborators.reclusterer.as_ref()) {
            (true, Some(c)) => c.as_ref(),
            _ => self.collaborators.clusterer.as_ref(),
        };
        let max_attempts = self.config.max_cluster_retries;
        let mut last = String::new();
        for attempt in 1..=max_attempts {
            match clusterer.cluster(data, n_clusters) {
                Ok(assignment) => {
                    log::debug!(
                        "{}: {} clusters on attempt {}",
                        clusterer.name(),
                        assignment.n_clusters,
                        attempt
                    );
                    return data.with_clusters(assignment.labels, assignment.n_clusters);
                }
                Err(e) if e.is_retriable() => {
                    log::warn!(
                        "{} attempt {}/{} failed: {}",
                        clusterer.name(),
                        attempt,
                        max_attempts,
                        e
                    );
                    last = e.to_string();
                }
                Err(e) => return Err(e),
            }
        }
        Err(UcbError::clustering(max_attempts, last))
    }

    fn build_model(&self, clustered: &TrajectoryDataset) -> Result<MarkovModel> {
        let lag = self.config.lag;
        let n_clusters = clustered.n_states().unwrap_or(0);
        let nits = heuristics::macrostate_request(self.config.macronum, n_clusters);
        let timescales = self
            .collaborators
            .modeller
            .implied_timescales(clustered, lag, nits)?;
        let macronum = heuristics::num_macrostates(self.config.macronum, &timescales, lag);
        log::info!(
            "Markov model: {} clusters, lag {}, {} macrostates",
            n_clusters,
            lag,
            macronum
        );
        let model = self.collaborators.modeller.estimate(clustered, lag, macronum)?;
        model.validate()?;
        if model.micro_of_cluster.len() != n_clusters {
            return Err(UcbError::data(format!(
                "model maps {} clusters, data has {}",
                model.micro_of_cluster.len(),
                n_clusters
            )));
        }
        Ok(model)
    }

    /// Dataset whose clusters act as the bandit's states.
    fn action_space(
        &self,
        data: &TrajectoryDataset,
        was_reduced: bool,
        clustered: &TrajectoryDataset,
        model: &MarkovModel,
        goal: Option<&GoalData>,
    ) -> Result<TrajectoryDataset> {
        let space = self.config.action_space;
        let reclustering = self.config.recluster.is_some();
        let data_q = match space {
            ActionSpace::Metric if was_reduced && !reclustering => {
                let k = self.cluster_count.num_clusters(data.num_frames());
                self.cluster_with_retry(false, data, k)?
            }
            ActionSpace::Metric if was_reduced => data.clone(),
            ActionSpace::Metric | ActionSpace::Tica => clustered.clone(),
            ActionSpace::Goal => {
                let goal = goal.ok_or_else(|| {
                    UcbError::config("the goal action space needs a goal function")
                })?;
                if goal.dataset.is_clustered() || reclustering {
                    goal.dataset.clone()
                } else {
                    let k = self.cluster_count.num_clusters(goal.dataset.num_frames());
                    self.cluster_with_retry(false, &goal.dataset, k)?
                }
            }
            ActionSpace::TicaPcca => clustered.map_clusters(&model.macro_of_cluster, model.macronum)?,
        };

        match self.config.recluster {
            Some(rc) => {
                log::info!("Reclustering {} action space into {} clusters", space, rc.n_clusters);
                self.cluster_with_retry(true, &data_q, rc.n_clusters)
            }
            None => Ok(data_q),
        }
    }
}
