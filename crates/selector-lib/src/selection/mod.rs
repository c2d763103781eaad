//! Server selection policy
//!
//! Deterministic argmin over adjusted costs, or epsilon-greedy exploration
//! weighted by inverse cost. Randomness is injected through [`RandomSource`].

mod policy;
mod random;

pub use policy::{
    select, Selection, SelectionConfig, SelectionPolicy, DEFAULT_ANTI_STICK_PENALTY,
    DEFAULT_EPSILON,
};
pub use random::{RandomSource, SeededRandom, SequenceRandom};
