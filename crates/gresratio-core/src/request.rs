//! Admission request inputs supplied by the scheduler host

use serde::{Deserialize, Serialize};

/// The inputs of one admission call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    /// Partition the job targets
    pub partition: Option<String>,
    /// GRES string, e.g. `gpu:V100:2`
    pub gres: Option<String>,
    /// Requested CPUs
    pub cpu_count: u32,
}

impl AdmissionRequest {
    /// Request for a new job submission
    pub fn submit(partition: Option<&str>, gres: Option<&str>, cpu_count: u32) -> Self {
        Self {
            partition: partition.map(str::to_string),
            gres: gres.map(str::to_string),
            cpu_count,
        }
    }

    /// Request for a modification of an existing job. Fields the update leaves
    /// unset are taken from the job as it currently stands.
    pub fn modify(update: &JobUpdate, current: &JobRecord) -> Self {
        Self {
            partition: update.partition.clone().or_else(|| current.partition.clone()),
            gres: update.gres.clone().or_else(|| current.gres.clone()),
            cpu_count: update.min_cpus.unwrap_or(current.total_cpus),
        }
    }

    /// The GRES string, treating an empty one as absent
    pub fn gres(&self) -> Option<&str> {
        self.gres
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }
}

/// Fields changed by a job modification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobUpdate {
    pub partition: Option<String>,
    pub gres: Option<String>,
    pub min_cpus: Option<u32>,
}

/// The job as currently recorded by the scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRecord {
    pub partition: Option<String>,
    pub gres: Option<String>,
    pub total_cpus: u32,
}
