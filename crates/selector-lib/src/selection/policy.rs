//! Epsilon-greedy selection with anti-stickiness

use super::RandomSource;
use crate::error::ConfigError;
use crate::models::{SelectionBranch, ServerId};

/// Default exploration probability
pub const DEFAULT_EPSILON: f64 = 0.2;

/// Default penalty added to the previous round's choice
pub const DEFAULT_ANTI_STICK_PENALTY: f64 = 0.03;

/// Floor applied to costs before inverting them for exploration
const MIN_EXPLORATION_COST: f64 = 1e-6;

/// Configuration for the selection policy
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Probability of taking the exploration branch (default: 0.2)
    pub epsilon: f64,
    /// Cost added to the previously chosen server (default: 0.03)
    pub anti_stick_penalty: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            anti_stick_penalty: DEFAULT_ANTI_STICK_PENALTY,
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(ConfigError::InvalidEpsilon(self.epsilon));
        }
        if !self.anti_stick_penalty.is_finite() || self.anti_stick_penalty < 0.0 {
            return Err(ConfigError::InvalidPenalty(self.anti_stick_penalty));
        }
        Ok(())
    }
}

/// A chosen server and how it was chosen
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub server: ServerId,
    pub branch: SelectionBranch,
    /// Cost of the chosen server after the anti-stickiness adjustment
    pub adjusted_score: f64,
}

impl Selection {
    /// Non-viable exploit choice used when no cost could be compared
    pub fn fallback(server: ServerId) -> Self {
        Self {
            server,
            branch: SelectionBranch::Exploit,
            adjusted_score: f64::INFINITY,
        }
    }

    /// False when the choice is the fallback among unscorable servers
    pub fn is_viable(&self) -> bool {
        self.adjusted_score.is_finite()
    }
}

/// Choose one server from `scores`, listed in fixed iteration order
///
/// The previous choice is charged `anti_stick_penalty` in both branches.
/// With probability `epsilon` a server is drawn with probability inversely
/// proportional to its adjusted cost; otherwise the minimum adjusted cost
/// wins, ties going to the first server in order. When every cost is
/// infinite the first server is returned. `None` only for an empty slice.
pub fn select(
    scores: &[(ServerId, f64)],
    previous: Option<&ServerId>,
    epsilon: f64,
    anti_stick_penalty: f64,
    rng: &mut dyn RandomSource,
) -> Option<Selection> {
    if scores.is_empty() {
        return None;
    }

    let adjusted: Vec<f64> = scores
        .iter()
        .map(|(server, score)| {
            let score = if score.is_nan() { f64::INFINITY } else { *score };
            if previous == Some(server) {
                score + anti_stick_penalty
            } else {
                score
            }
        })
        .collect();

    let pick = |idx: usize, branch| Selection {
        server: scores[idx].0.clone(),
        branch,
        adjusted_score: adjusted[idx],
    };

    if epsilon > 0.0 && rng.next_f64() < epsilon {
        if let Some(idx) = sample_inverse(&adjusted, rng) {
            return Some(pick(idx, SelectionBranch::Explore));
        }
    }

    Some(pick(argmin(&adjusted), SelectionBranch::Exploit))
}

/// Index of the strictly smallest cost, first one on ties
fn argmin(costs: &[f64]) -> usize {
    let mut best = 0;
    for (idx, cost) in costs.iter().enumerate().skip(1) {
        if *cost < costs[best] {
            best = idx;
        }
    }
    best
}

/// Draw an index with probability proportional to `1 / max(cost, 1e-6)`
///
/// Infinite costs get zero weight. Returns `None` when nothing has weight.
fn sample_inverse(costs: &[f64], rng: &mut dyn RandomSource) -> Option<usize> {
    let weights: Vec<f64> = costs
        .iter()
        .map(|cost| 1.0 / cost.max(MIN_EXPLORATION_COST))
        .collect();
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    let target = rng.next_f64() * total;
    let mut cumulative = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        if *weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        if target < cumulative {
            return Some(idx);
        }
    }

    // Rounding can leave target just past the final cumulative sum
    weights.iter().rposition(|w| *w > 0.0)
}

/// Selection policy that remembers its previous choice across rounds
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    config: SelectionConfig,
    previous: Option<ServerId>,
}

impl SelectionPolicy {
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn previous(&self) -> Option<&ServerId> {
        self.previous.as_ref()
    }

    /// Select a server and remember it for the next round
    pub fn choose(
        &mut self,
        scores: &[(ServerId, f64)],
        rng: &mut dyn RandomSource,
    ) -> Option<Selection> {
        let selection = select(
            scores,
            self.previous.as_ref(),
            self.config.epsilon,
            self.config.anti_stick_penalty,
            rng,
        )?;
        self.previous = Some(selection.server.clone());
        Some(selection)
    }

    /// Forget the previous choice
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new(SelectionConfig::default())
    }
}
