//! Cycle, domain and stage types.

use std::fmt;

use chrono::{Duration, NaiveDateTime};

/// A model domain. Domain 1 is the outermost; every other domain is nested
/// inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DomainId(usize);

impl DomainId {
    /// The outermost domain.
    pub const OUTER: DomainId = DomainId(1);

    /// Returns `None` for 0.
    pub fn new(id: usize) -> Option<Self> {
        (id >= 1).then_some(Self(id))
    }

    pub fn get(&self) -> usize {
        self.0
    }

    pub fn is_outer(&self) -> bool {
        self.0 == 1
    }

    /// The enclosing domain; every nested domain refers back to domain 1.
    pub fn parent(&self) -> Option<DomainId> {
        (!self.is_outer()).then_some(Self::OUTER)
    }

    /// File-name suffix, e.g. `d02`.
    pub fn suffix(&self) -> String {
        format!("d{:02}", self.0)
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{:02}", self.0)
    }
}

/// One step of the cycle pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    ObservationPreprocess,
    BoundaryUpdateLower,
    VariationalAssimilation,
    BiasCorrection,
    BoundaryUpdateLateral,
    ForecastIntegration,
}

impl PipelineStage {
    /// Stages in pipeline order.
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::ObservationPreprocess,
        PipelineStage::BoundaryUpdateLower,
        PipelineStage::VariationalAssimilation,
        PipelineStage::BiasCorrection,
        PipelineStage::BoundaryUpdateLateral,
        PipelineStage::ForecastIntegration,
    ];

    /// Name of the executable the stage runs.
    pub fn executable(&self) -> &'static str {
        match self {
            PipelineStage::ObservationPreprocess => "obsproc.exe",
            PipelineStage::BoundaryUpdateLower | PipelineStage::BoundaryUpdateLateral => {
                "da_update_bc.exe"
            }
            PipelineStage::VariationalAssimilation => "da_wrfvar.exe",
            PipelineStage::BiasCorrection => "bias-correction",
            PipelineStage::ForecastIntegration => "wrf.exe",
        }
    }

    /// Whether the stage runs once per domain rather than once per cycle.
    pub fn is_per_domain(&self) -> bool {
        matches!(
            self,
            PipelineStage::BoundaryUpdateLower
                | PipelineStage::VariationalAssimilation
                | PipelineStage::BiasCorrection
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::ObservationPreprocess => "observation preprocessing",
            PipelineStage::BoundaryUpdateLower => "lower boundary update",
            PipelineStage::VariationalAssimilation => "variational assimilation",
            PipelineStage::BiasCorrection => "bias correction",
            PipelineStage::BoundaryUpdateLateral => "lateral boundary update",
            PipelineStage::ForecastIntegration => "forecast integration",
        };
        f.write_str(name)
    }
}

/// One analysis cycle: a start time, a forecast length and the domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    start: NaiveDateTime,
    duration: Duration,
    domains: Vec<DomainId>,
}

impl Cycle {
    /// A cycle over domains `1..=domain_count`.
    ///
    /// Returns `None` when `domain_count` is 0.
    pub fn new(start: NaiveDateTime, duration: Duration, domain_count: usize) -> Option<Self> {
        if domain_count == 0 {
            return None;
        }
        Some(Self {
            start,
            duration,
            domains: (1..=domain_count).map(DomainId).collect(),
        })
    }

    /// Start of the cycle, which is also the analysis time.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn end(&self) -> NaiveDateTime {
        self.start + self.duration
    }

    /// Domains in ascending order, outermost first.
    pub fn domains(&self) -> &[DomainId] {
        &self.domains
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_domain_zero_is_rejected() {
        assert_eq!(DomainId::new(0), None);
        assert_eq!(DomainId::new(3).map(|d| d.get()), Some(3));
    }

    #[test]
    fn test_nested_domains_refer_to_outer() {
        let d1 = DomainId::new(1).unwrap();
        let d3 = DomainId::new(3).unwrap();
        assert_eq!(d1.parent(), None);
        assert_eq!(d3.parent(), Some(DomainId::OUTER));
        assert_eq!(d3.suffix(), "d03");
        assert_eq!(DomainId::new(12).unwrap().to_string(), "d12");
    }

    #[test]
    fn test_stage_executables() {
        assert_eq!(PipelineStage::ObservationPreprocess.executable(), "obsproc.exe");
        assert_eq!(PipelineStage::BoundaryUpdateLateral.executable(), "da_update_bc.exe");
        assert_eq!(PipelineStage::ForecastIntegration.executable(), "wrf.exe");
        assert!(PipelineStage::VariationalAssimilation.is_per_domain());
        assert!(!PipelineStage::BoundaryUpdateLateral.is_per_domain());
    }

    #[test]
    fn test_cycle_spans_domains_and_window() {
        let start = NaiveDate::from_ymd_opt(2014, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let cycle = Cycle::new(start, Duration::hours(3), 2).unwrap();
        assert_eq!(cycle.domains().len(), 2);
        assert!(cycle.domains()[0].is_outer());
        assert_eq!(cycle.end() - cycle.start(), Duration::hours(3));
        assert!(Cycle::new(start, Duration::hours(3), 0).is_none());
    }
}
