//! Serializable summary of a pipeline outcome for the serving layer

use crate::error::PipelineError;
use crate::request::{PipelineOutputs, PipelineWarning};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    /// Finished with warnings, e.g. an empty flood extent
    Warning,
    Cancelled,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub status: ReportStatus,
    pub message: String,
    /// Output name to path
    pub outputs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineReport {
    /// Summarize any pipeline result. `pipeline` names the run in the message.
    pub fn from_result<O: PipelineOutputs>(pipeline: &str, result: &Result<O, PipelineError>) -> Self {
        match result {
            Ok(outputs) => {
                let warnings = outputs.warnings().to_vec();
                let (status, message) = if warnings.is_empty() {
                    (ReportStatus::Success, format!("{} analysis complete", pipeline))
                } else {
                    (
                        ReportStatus::Warning,
                        format!("{} analysis complete with {} warning(s)", pipeline, warnings.len()),
                    )
                };
                Self {
                    status,
                    message,
                    outputs: outputs
                        .paths()
                        .into_iter()
                        .map(|(k, p)| (k, p.display().to_string()))
                        .collect(),
                    warnings,
                }
            }
            Err(e) => Self {
                status: if e.is_cancelled() {
                    ReportStatus::Cancelled
                } else {
                    ReportStatus::Error
                },
                message: e.to_string(),
                outputs: BTreeMap::new(),
                warnings: Vec::new(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ReportStatus::Success | ReportStatus::Warning)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"status\":\"error\",\"message\":\"{}\"}}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::MultiHazardOutputs;
    use std::path::PathBuf;

    fn outputs(warnings: Vec<PipelineWarning>) -> MultiHazardOutputs {
        MultiHazardOutputs {
            risk_grid_path: PathBuf::from("out/multi_hazard_risk.tif"),
            classified_grid_path: PathBuf::from("out/multi_hazard_risk_classified.tif"),
            zones_path: PathBuf::from("out/multi_hazard_risk.geojson"),
            warnings,
        }
    }

    #[test]
    fn success_lists_outputs() {
        let report = PipelineReport::from_result("multi-hazard", &Ok(outputs(Vec::new())));
        assert_eq!(report.status, ReportStatus::Success);
        assert_eq!(report.outputs["risk_raster"], "out/multi_hazard_risk.tif");
        assert_eq!(report.outputs.len(), 3);
        let json = report.to_json();
        assert!(json.contains("\"status\": \"success\""));
        assert!(!json.contains("warnings"));
    }

    #[test]
    fn warnings_and_errors() {
        let warn = PipelineWarning::EmptyResult {
            pipeline: "flood".into(),
            detail: "no water detected".into(),
        };
        let report = PipelineReport::from_result("multi-hazard", &Ok(outputs(vec![warn])));
        assert_eq!(report.status, ReportStatus::Warning);
        assert!(report.is_success());

        let err: Result<MultiHazardOutputs, _> = Err(PipelineError::Stage {
            pipeline: "flood",
            stage: "detect",
            source: georisk_core::Error::Cancelled,
        });
        let report = PipelineReport::from_result("flood", &err);
        assert_eq!(report.status, ReportStatus::Cancelled);
        assert!(report.outputs.is_empty());

        let err: Result<MultiHazardOutputs, _> = Err(PipelineError::InvalidRequest("no sar".into()));
        assert_eq!(PipelineReport::from_result("flood", &err).status, ReportStatus::Error);
    }
}
