//! Heuristic content-domain classification.
//!
//! A pure function over the top-ranked candidates: no external calls,
//! deterministic, side-effect free. Each domain owns a disjoint keyword
//! set; the domain with the most hits wins, and anything below the
//! configured hit threshold falls back to the generic label.

use std::collections::HashSet;

use fuseqa_core::{Domain, DomainConfig, DomainLabel, FusedCandidate};

const FINANCIAL_KEYWORDS: &[&str] = &[
    "balance sheet",
    "income statement",
    "cash flow",
    "net profit",
    "revenue",
    "shareholders' equity",
    "annual report",
    "fiscal year",
    "earnings per share",
    "ebitda",
    "total assets",
    "operating margin",
    "audit opinion",
    "dividend",
];

const LEGAL_KEYWORDS: &[&str] = &[
    "contract",
    "agreement",
    "clause",
    "hereinafter",
    "liability",
    "breach",
    "obligation",
    "jurisdiction",
    "pursuant to",
    "statute",
    "warranty",
    "indemnification",
    "governing law",
];

const TECHNICAL_KEYWORDS: &[&str] = &[
    "api",
    "endpoint",
    "interface",
    "algorithm",
    "architecture",
    "deployment",
    "latency",
    "throughput",
    "data structure",
    "runtime",
    "compiler",
    "protocol",
    "benchmark",
];

const ACADEMIC_KEYWORDS: &[&str] = &[
    "abstract",
    "methodology",
    "hypothesis",
    "et al.",
    "references",
    "experiment",
    "dataset",
    "literature review",
    "citation",
    "peer review",
    "findings",
    "baseline",
];

/// Domains with dedicated vocabulary, in tie-break order.
const KEYWORD_SETS: [(Domain, &[&str]); 4] = [
    (Domain::Financial, FINANCIAL_KEYWORDS),
    (Domain::Legal, LEGAL_KEYWORDS),
    (Domain::Technical, TECHNICAL_KEYWORDS),
    (Domain::Academic, ACADEMIC_KEYWORDS),
];

/// Classify the content domain of a ranked candidate set.
///
/// Inspects the text and metadata of the top `probe_depth` candidates.
/// Each candidate contributes at most one hit per keyword. Returns the
/// generic label with confidence 0 when no domain clears `min_hits`.
pub fn classify(candidates: &[FusedCandidate], config: &DomainConfig) -> DomainLabel {
    let mut hits = [0u32; KEYWORD_SETS.len()];

    for candidate in candidates.iter().take(config.probe_depth) {
        let haystack = candidate_text(candidate);
        let tokens: HashSet<&str> = haystack
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        for (i, (_, keywords)) in KEYWORD_SETS.iter().enumerate() {
            for keyword in *keywords {
                if keyword_matches(keyword, &haystack, &tokens) {
                    hits[i] += 1;
                }
            }
        }
    }

    let total: u32 = hits.iter().sum();
    let (winner, winner_hits) = KEYWORD_SETS
        .iter()
        .zip(hits)
        .fold((Domain::Generic, 0u32), |best, ((domain, _), count)| {
            // Strict comparison keeps declaration order on ties
            if count > best.1 {
                (*domain, count)
            } else {
                best
            }
        });

    if winner_hits == 0 || winner_hits < config.min_hits {
        return DomainLabel::generic();
    }

    DomainLabel {
        domain: winner,
        confidence: winner_hits as f32 / total as f32,
    }
}

/// Single-word keywords match whole tokens only, so "api" never fires
/// inside "capital"; phrases match as substrings.
fn keyword_matches(keyword: &str, haystack: &str, tokens: &HashSet<&str>) -> bool {
    if keyword.contains(char::is_whitespace) || keyword.contains('\'') {
        haystack.contains(keyword)
    } else {
        tokens.contains(keyword)
    }
}

fn candidate_text(candidate: &FusedCandidate) -> String {
    let mut haystack = candidate.text.to_lowercase();
    if let Some(filename) = &candidate.metadata.filename {
        haystack.push('\n');
        haystack.push_str(&filename.to_lowercase());
    }
    for value in candidate.metadata.extra.values() {
        if let Some(s) = value.as_str() {
            haystack.push('\n');
            haystack.push_str(&s.to_lowercase());
        }
    }
    haystack
}
