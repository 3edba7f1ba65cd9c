use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    JobDescriptions,
    Resumes,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::JobDescriptions, Collection::Resumes];

    pub fn name(self) -> &'static str {
        match self {
            Collection::JobDescriptions => "job_descriptions",
            Collection::Resumes => "resumes",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Collection::JobDescriptions => "Job descriptions",
            Collection::Resumes => "Candidate resumes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Query match; `distance` is cosine distance, smaller is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedCandidate {
    pub resume_id: String,
    pub resume_text: String,
    pub metadata: Map<String, Value>,
    pub similarity_score: f32,
}

impl From<SearchHit> for RetrievedCandidate {
    fn from(hit: SearchHit) -> Self {
        Self {
            resume_id: hit.id,
            resume_text: hit.text,
            metadata: hit.metadata,
            similarity_score: 1.0 - hit.distance,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub job_descriptions: usize,
    pub resumes: usize,
}
