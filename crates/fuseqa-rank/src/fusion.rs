//! Weighted fusion of semantic and lexical candidate lists.
//!
//! Each list's raw scores are min-max normalized independently, then
//! merged by document id under configurable weights. The output order
//! depends only on the content of the two lists, never on which backend
//! answered first.

use std::collections::HashMap;

use fuseqa_core::{Candidate, FusedCandidate, FusionConfig};

/// Score ranges narrower than this are treated as degenerate.
const SCORE_RANGE_EPSILON: f32 = 1e-9;

/// Fuse two independently-ranked candidate lists into one ranking.
///
/// Deterministic for identical inputs. A document present in both lists
/// scores `w_s * norm_semantic + w_l * norm_lexical`; a single-source
/// document keeps that source's weighted normalized score. Ties are
/// broken by dual-source presence, then raw semantic score, then
/// original semantic-list position.
pub fn fuse(
    semantic: Vec<Candidate>,
    lexical: Vec<Candidate>,
    config: &FusionConfig,
) -> Vec<FusedCandidate> {
    let semantic = dedup_keep_best(semantic);
    let lexical = dedup_keep_best(lexical);

    let semantic_norms = normalize(&semantic);
    let lexical_norms = normalize(&lexical);

    // Merge by document id, semantic side first so dual matches keep the
    // semantic candidate's text and metadata.
    let mut index: HashMap<String, usize> = HashMap::with_capacity(semantic.len());
    let mut slots: Vec<Slot> = Vec::with_capacity(semantic.len() + lexical.len());

    for (pos, (cand, norm)) in semantic.into_iter().zip(semantic_norms).enumerate() {
        index.insert(cand.document_id.clone(), slots.len());
        slots.push(Slot {
            document_id: cand.document_id,
            text: cand.text,
            metadata: cand.metadata,
            semantic_norm: Some(norm),
            lexical_norm: None,
            raw_semantic: cand.raw_score,
            semantic_pos: pos,
            lexical_pos: usize::MAX,
        });
    }

    for (pos, (cand, norm)) in lexical.into_iter().zip(lexical_norms).enumerate() {
        if let Some(&i) = index.get(&cand.document_id) {
            slots[i].lexical_norm = Some(norm);
            slots[i].lexical_pos = pos;
        } else {
            slots.push(Slot {
                document_id: cand.document_id,
                text: cand.text,
                metadata: cand.metadata,
                semantic_norm: None,
                lexical_norm: Some(norm),
                raw_semantic: f32::NEG_INFINITY,
                semantic_pos: usize::MAX,
                lexical_pos: pos,
            });
        }
    }

    slots.sort_by(|a, b| {
        b.fused_score(config)
            .total_cmp(&a.fused_score(config))
            .then_with(|| b.is_dual().cmp(&a.is_dual()))
            .then_with(|| b.raw_semantic.total_cmp(&a.raw_semantic))
            .then_with(|| a.semantic_pos.cmp(&b.semantic_pos))
            .then_with(|| a.lexical_pos.cmp(&b.lexical_pos))
            .then_with(|| a.document_id.cmp(&b.document_id))
    });

    slots
        .into_iter()
        .map(|slot| {
            let fused_score = slot.fused_score(config);
            FusedCandidate {
                document_id: slot.document_id,
                fused_score,
                semantic_score: slot.semantic_norm,
                lexical_score: slot.lexical_norm,
                rerank_score: None,
                text: slot.text,
                metadata: slot.metadata,
            }
        })
        .collect()
}

struct Slot {
    document_id: String,
    text: String,
    metadata: fuseqa_core::SourceMetadata,
    semantic_norm: Option<f32>,
    lexical_norm: Option<f32>,
    raw_semantic: f32,
    semantic_pos: usize,
    lexical_pos: usize,
}

impl Slot {
    fn is_dual(&self) -> bool {
        self.semantic_norm.is_some() && self.lexical_norm.is_some()
    }

    fn fused_score(&self, config: &FusionConfig) -> f32 {
        let semantic = self
            .semantic_norm
            .map(|n| config.semantic_weight * n)
            .unwrap_or(0.0);
        let lexical = self
            .lexical_norm
            .map(|n| config.lexical_weight * n)
            .unwrap_or(0.0);
        semantic + lexical
    }
}

/// Min-max normalize a list's raw scores to [0, 1].
///
/// A single-element list, or one whose scores all coincide, normalizes
/// to 1.0 for the first-returned element and 0.0 for the rest, so no
/// division by a zero range ever happens.
fn normalize(list: &[Candidate]) -> Vec<f32> {
    if list.is_empty() {
        return Vec::new();
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for cand in list {
        min = min.min(cand.raw_score);
        max = max.max(cand.raw_score);
    }

    let range = max - min;
    if list.len() == 1 || range <= SCORE_RANGE_EPSILON {
        return (0..list.len())
            .map(|i| if i == 0 { 1.0 } else { 0.0 })
            .collect();
    }

    list.iter()
        .map(|cand| (cand.raw_score - min) / range)
        .collect()
}

/// Collapse duplicate document ids within one list, keeping the
/// highest-scoring occurrence at the position of the first. Backends
/// should not emit duplicates, but fusion tolerates them.
fn dedup_keep_best(list: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(list.len());
    let mut out: Vec<Candidate> = Vec::with_capacity(list.len());

    for cand in list {
        match seen.get(&cand.document_id) {
            Some(&i) => {
                if cand.raw_score > out[i].raw_score {
                    out[i] = cand;
                }
            }
            None => {
                seen.insert(cand.document_id.clone(), out.len());
                out.push(cand);
            }
        }
    }

    out
}
