// Core algorithm exports
pub mod contamination;
pub mod distance;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod scoring;
pub mod zones;

pub use contamination::{ContaminationEstimator, FittedSurface};
pub use distance::haversine_distance;
pub use features::FeatureBuilder;
pub use normalizer::{normalize, NormalizedTable};
pub use pipeline::{Ranker, RankingInputs, RankingOptions, RankingRun};
pub use scoring::ScoreAggregator;
pub use zones::ZoneLocator;
