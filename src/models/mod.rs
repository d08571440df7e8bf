// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Candidate, DangerZone, EmployerSet, EmployerSite, ExcludedCandidate, Feature, FeatureRow,
    FeatureVector, GreenTable, GreenZoneEntry, Location, MissingFeaturePolicy, RankedCandidate,
    ScoreWeights, StationReading, ZoneId, ZonePolygon,
};
pub use requests::RankRequest;
pub use responses::{ErrorResponse, HealthResponse, RankResponse};
