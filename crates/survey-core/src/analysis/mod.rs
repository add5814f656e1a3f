//! Household analysis engines and report assembly

pub mod anomaly;
pub mod keywords;
pub mod profile;
pub mod quality;
pub mod report;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use anomaly::{
    AnomalyDetail, AnomalyEngine, AnomalyId, AnomalyKind, AnomalyRecord, AnomalyReport,
    AnomalySeverity, AnomalyStatistics,
};
pub use keywords::{KeywordRules, KeywordSet};
pub use profile::{
    ConsumptionProfile, HouseholdProfile, ProfileEngine, ProfileTag, TagDimension,
};
pub use quality::{
    QualityEngine, QualityLevel, QualityPopulationReport, QualityReport, QualityScores,
    QualityWeights,
};
pub use report::{
    AnalysisReportGenerator, AreaInfo, BatchAnalysisReport, BatchStatistics,
    ComprehensiveAssessment, DetailedResults, HouseholdAnalysisReport, ReportResponse,
};
