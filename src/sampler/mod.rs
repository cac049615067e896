mod selection;
mod weighted;

pub use selection::{candidate_set, pick_weighted};
pub use weighted::WeightedSampler;
