//! The A-PROOF functioning domains and the host-side view of their scores.

use std::collections::BTreeMap;

use crate::types::analysis::AnalysisResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Domain {
    pub code: &'static str,
    pub name: &'static str,
    pub name_en: &'static str,
    pub max_level: u8,
    pub description: &'static str,
}

pub const DOMAINS: [Domain; 9] = [
    Domain { code: "b1300", name: "Energie", name_en: "Energy level", max_level: 4, description: "Energieniveau en vermoeidheid" },
    Domain { code: "b140", name: "Aandacht", name_en: "Attention functions", max_level: 4, description: "Concentratie en aandachtsfuncties" },
    Domain { code: "b152", name: "Emotioneel", name_en: "Emotional functions", max_level: 4, description: "Emotionele functies en stemming" },
    Domain { code: "b440", name: "Ademhaling", name_en: "Respiration functions", max_level: 4, description: "Ademhalingsfuncties" },
    Domain { code: "b455", name: "Inspanning", name_en: "Exercise tolerance", max_level: 5, description: "Inspanningstolerantie" },
    Domain { code: "b530", name: "Gewicht", name_en: "Weight maintenance", max_level: 4, description: "Gewichtshandhaving" },
    Domain { code: "d450", name: "Lopen", name_en: "Walking", max_level: 5, description: "Lopen en mobiliteit (FAC)" },
    Domain { code: "d550", name: "Eten", name_en: "Eating", max_level: 4, description: "Eten en voeding" },
    Domain { code: "d840", name: "Werk", name_en: "Work and employment", max_level: 4, description: "Werk en werkgelegenheid" },
];

pub fn lookup(code: &str) -> Option<&'static Domain> {
    DOMAINS.iter().find(|domain| domain.code == code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    NotAssessed,
    NoProblem,
    Mild,
    Moderate,
    Severe,
    Complete,
}

impl Severity {
    pub fn from_level(level: Option<f64>, max_level: f64) -> Self {
        let Some(level) = level else {
            return Severity::NotAssessed;
        };
        let ratio = level / max_level;
        if ratio <= 0.0 {
            Severity::NoProblem
        } else if ratio <= 0.25 {
            Severity::Mild
        } else if ratio <= 0.5 {
            Severity::Moderate
        } else if ratio <= 0.75 {
            Severity::Severe
        } else {
            Severity::Complete
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::NotAssessed => "Niet beoordeeld",
            Severity::NoProblem => "Geen probleem",
            Severity::Mild => "Licht probleem",
            Severity::Moderate => "Matig probleem",
            Severity::Severe => "Ernstig probleem",
            Severity::Complete => "Volledig probleem",
        }
    }
}

/// Bar fill for a level, clamped to 0..=100.
pub fn level_percentage(level: Option<f64>, max_level: f64) -> f64 {
    match level {
        Some(level) => (level / max_level * 100.0).clamp(0.0, 100.0),
        None => 0.0,
    }
}

/// Last known score of one domain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DomainScore {
    pub level: Option<f64>,
    pub confidence: Option<f64>,
    pub evidence: Vec<String>,
    pub reasoning: String,
}

impl DomainScore {
    pub fn severity(&self, code: &str) -> Severity {
        let max_level = lookup(code).map(|d| f64::from(d.max_level)).unwrap_or(4.0);
        Severity::from_level(self.level, max_level)
    }
}

/// Merges analysis results additively: a result only overwrites the codes it
/// mentions, and a blank summary keeps the previous one.
#[derive(Debug, Clone, Default)]
pub struct DomainBoard {
    scores: BTreeMap<String, DomainScore>,
    summary: String,
}

impl DomainBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, result: &AnalysisResult) {
        for finding in result.domains() {
            if finding.code().is_empty() {
                continue;
            }
            self.scores.insert(
                finding.code().to_string(),
                DomainScore {
                    level: finding.level(),
                    confidence: finding.confidence(),
                    evidence: finding.evidence().to_vec(),
                    reasoning: finding.reasoning().unwrap_or_default().to_string(),
                },
            );
        }
        if !result.summary().is_empty() {
            self.summary = result.summary().to_string();
        }
    }

    pub fn score(&self, code: &str) -> Option<&DomainScore> {
        self.scores.get(code)
    }

    pub fn scores(&self) -> impl Iterator<Item = (&str, &DomainScore)> {
        self.scores.iter().map(|(code, score)| (code.as_str(), score))
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty() && self.summary.is_empty()
    }
}
