//! Declarative catalog of lens and generation-pass definitions.
//!
//! The `instruction` strings parameterize an external generator when one is
//! wired in; the deterministic lenses ignore them.

use serde::Serialize;

use crate::mode::EnsembleMode;
use crate::types::{GenerationPassId, LensId};

/// One catalog entry. Immutable and `'static`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LensDefinition<Id: 'static> {
    pub id: Id,
    pub name: &'static str,
    pub description: &'static str,
    pub instruction: &'static str,
}

pub type ValidationLensDefinition = LensDefinition<LensId>;
pub type GenerationPassDefinition = LensDefinition<GenerationPassId>;

static CONSISTENCY: ValidationLensDefinition = LensDefinition {
    id: LensId::Consistency,
    name: "Consistency",
    description: "Do the sections of the packet agree with each other?",
    instruction: "Cross-check runway, month references, option identifiers and signal \
                  language between the brief, scenarios, options and execution plan.",
};

static AUDIT: ValidationLensDefinition = LensDefinition {
    id: LensId::Audit,
    name: "Audit",
    description: "Is every claim traceable to labeled evidence?",
    instruction: "Check provenance markers, valuation methodology, scenario probability \
                  labels, evidence register completion and acknowledgment of missing data.",
};

static RISK: ValidationLensDefinition = LensDefinition {
    id: LensId::Risk,
    name: "Risk",
    description: "Do the options answer the risks the packet itself identifies?",
    instruction: "Confirm that stated risks, downside probability and lender exposure are \
                  reflected in the options and the urgency of the execution plan.",
};

static VALUE: ValidationLensDefinition = LensDefinition {
    id: LensId::Value,
    name: "Value",
    description: "Are value claims carried through to the decisions?",
    instruction: "Confirm that recovery figures, investment amounts and upside probability \
                  are reflected in the options and execution plan.",
};

static SYNTHESIS: ValidationLensDefinition = LensDefinition {
    id: LensId::Synthesis,
    name: "Synthesis",
    description: "What do the other lenses say when read together?",
    instruction: "Aggregate prior lens findings and compare their mean score with the \
                  packet's stated confidence.",
};

static VALIDATION_3PASS: [&ValidationLensDefinition; 3] = [&CONSISTENCY, &AUDIT, &SYNTHESIS];
static VALIDATION_5PASS: [&ValidationLensDefinition; 5] =
    [&CONSISTENCY, &AUDIT, &RISK, &VALUE, &SYNTHESIS];

static CORE_DIAGNOSTIC: GenerationPassDefinition = LensDefinition {
    id: GenerationPassId::CoreDiagnostic,
    name: "Core diagnostic",
    description: "Baseline diagnosis of the business from the intake.",
    instruction: "Produce the full decision packet from the intake with no special emphasis.",
};

static RISK_AUDIT: GenerationPassDefinition = LensDefinition {
    id: GenerationPassId::RiskAudit,
    name: "Risk audit",
    description: "Diagnosis biased toward downside exposure.",
    instruction: "Produce the packet assuming the most pessimistic credible reading of \
                  every ambiguous input.",
};

static VALUE_PASS: GenerationPassDefinition = LensDefinition {
    id: GenerationPassId::ValueLens,
    name: "Value lens",
    description: "Diagnosis focused on recoverable and creatable value.",
    instruction: "Produce the packet emphasising valuation, recovery and return on each option.",
};

static AUDIT_PASS: GenerationPassDefinition = LensDefinition {
    id: GenerationPassId::AuditLens,
    name: "Audit lens",
    description: "Diagnosis restricted to what the evidence supports.",
    instruction: "Produce the packet labeling every claim with its provenance and omitting \
                  anything that cannot be traced to received evidence.",
};

static SYNTHESIS_PASS: GenerationPassDefinition = LensDefinition {
    id: GenerationPassId::Synthesis,
    name: "Synthesis",
    description: "Reconciles the earlier variants into one packet.",
    instruction: "Read the prior variants and produce a single packet that resolves their \
                  disagreements conservatively.",
};

static GENERATION_3PASS: [&GenerationPassDefinition; 3] =
    [&CORE_DIAGNOSTIC, &RISK_AUDIT, &SYNTHESIS_PASS];
static GENERATION_5PASS: [&GenerationPassDefinition; 5] = [
    &CORE_DIAGNOSTIC,
    &RISK_AUDIT,
    &VALUE_PASS,
    &AUDIT_PASS,
    &SYNTHESIS_PASS,
];

/// Validation lenses for `mode`, in execution order. Empty when `off`.
pub fn validation_lenses(mode: EnsembleMode) -> &'static [&'static ValidationLensDefinition] {
    match mode {
        EnsembleMode::Off => &[],
        EnsembleMode::ThreePass => &VALIDATION_3PASS,
        EnsembleMode::FivePass => &VALIDATION_5PASS,
    }
}

/// Generation passes for `mode`, in execution order. Empty when `off`.
pub fn generation_passes(mode: EnsembleMode) -> &'static [&'static GenerationPassDefinition] {
    match mode {
        EnsembleMode::Off => &[],
        EnsembleMode::ThreePass => &GENERATION_3PASS,
        EnsembleMode::FivePass => &GENERATION_5PASS,
    }
}

/// Catalog entry for a validation lens.
pub fn validation_lens(id: LensId) -> &'static ValidationLensDefinition {
    match id {
        LensId::Consistency => &CONSISTENCY,
        LensId::Audit => &AUDIT,
        LensId::Risk => &RISK,
        LensId::Value => &VALUE,
        LensId::Synthesis => &SYNTHESIS,
    }
}

/// Catalog entry for a generation pass.
pub fn generation_pass(id: GenerationPassId) -> &'static GenerationPassDefinition {
    match id {
        GenerationPassId::CoreDiagnostic => &CORE_DIAGNOSTIC,
        GenerationPassId::RiskAudit => &RISK_AUDIT,
        GenerationPassId::ValueLens => &VALUE_PASS,
        GenerationPassId::AuditLens => &AUDIT_PASS,
        GenerationPassId::Synthesis => &SYNTHESIS_PASS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_mode_has_no_lenses() {
        assert!(validation_lenses(EnsembleMode::Off).is_empty());
        assert!(generation_passes(EnsembleMode::Off).is_empty());
    }

    #[test]
    fn test_catalog_sizes_match_pass_count() {
        for mode in [EnsembleMode::ThreePass, EnsembleMode::FivePass] {
            assert_eq!(validation_lenses(mode).len(), mode.pass_count());
            assert_eq!(generation_passes(mode).len(), mode.pass_count());
        }
    }

    #[test]
    fn test_synthesis_always_last() {
        for mode in [EnsembleMode::ThreePass, EnsembleMode::FivePass] {
            assert_eq!(validation_lenses(mode).last().unwrap().id, LensId::Synthesis);
            assert_eq!(
                generation_passes(mode).last().unwrap().id,
                GenerationPassId::Synthesis
            );
        }
    }

    #[test]
    fn test_definitions_serialize_for_listing() {
        let json = serde_json::to_value(validation_lenses(EnsembleMode::ThreePass)).unwrap();
        assert_eq!(json[1]["id"], "AUDIT_LENS");
        assert_eq!(json[1]["name"], "Audit");

        let pass = serde_json::to_value(generation_pass(GenerationPassId::Synthesis)).unwrap();
        assert_eq!(pass["id"], "SYNTHESIS");
        assert!(pass["instruction"].as_str().unwrap().contains("prior variants"));
    }

    #[test]
    fn test_lookup_matches_id() {
        for def in validation_lenses(EnsembleMode::FivePass) {
            assert_eq!(validation_lens(def.id).id, def.id);
        }
        for def in generation_passes(EnsembleMode::FivePass) {
            assert_eq!(generation_pass(def.id).id, def.id);
        }
    }

    #[test]
    fn test_three_pass_order() {
        let ids: Vec<LensId> = validation_lenses(EnsembleMode::ThreePass)
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![LensId::Consistency, LensId::Audit, LensId::Synthesis]);
    }
}
