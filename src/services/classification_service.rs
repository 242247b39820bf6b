use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::classification::{ClassificationResult, ExtractedHints};
use crate::models::document::{Condition, DocumentType};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static OCR_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.\-$%(),:]").expect("valid regex"));

static CASE_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)case.{0,5}(\d{8})").expect("valid regex"));
static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\$(\d{1,3})k").expect("valid regex"));
static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})%").expect("valid regex"));
// Title is case-insensitive, the name itself must be capitalised words.
static DOCTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:dr)\.?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)").expect("valid regex")
});
static CONDITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(COPD|OSA|BCC|PF|asbestosis|mesothelioma|lung cancer)\b")
        .expect("valid regex")
});

const AR_SIGNATURE: &str = "designated as the authorized representative";

/// Normalized letter text handed to each matcher.
struct Letter<'a> {
    text: &'a str,
    lower: &'a str,
    hints: &'a ExtractedHints,
}

impl Letter<'_> {
    fn has(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    fn has_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.lower.contains(n))
    }

    /// Whole-word test for short abbreviations that would otherwise hit
    /// inside ordinary words ("bowl", "lmnop").
    fn has_word(&self, word: &str) -> bool {
        self.lower.match_indices(word).any(|(at, _)| {
            let before = self.lower[..at].chars().next_back();
            let after = self.lower[at + word.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
    }
}

type Verdict = (DocumentType, f64, &'static str);
type Matcher = fn(&Letter) -> Option<Verdict>;

/// Evaluated top to bottom; the first verdict wins. Earlier entries carry
/// the narrower conditions where vocabulary overlaps.
const MATCHERS: &[Matcher] = &[
    match_ar_ack,
    match_claim_ack,
    match_withdraw_ack,
    match_address_change_ack,
    match_objection_rd_deny_ack,
    match_remand_order,
    match_en16,
    match_ee11a,
    match_wh_rfi,
    match_ih_notice,
    match_rfi_post_ih,
    match_rd_decision,
    match_fd_decision,
    match_impairment,
    match_dr_ir_report,
    match_en20_rejection,
    match_wl,
    match_orau,
    match_niosh_waiver,
    match_dme_hhc,
    match_lmn_request,
];

/// Classify OCR text into a document type. Pure: the same input always
/// yields the same result.
pub fn classify(text: &str) -> ClassificationResult {
    if text.trim().is_empty() {
        return ClassificationResult::unknown("empty content");
    }

    let normalized = normalize(text);
    let lower = normalized.to_lowercase();
    let hints = extract_hints(&normalized);

    let letter = Letter {
        text: &normalized,
        lower: &lower,
        hints: &hints,
    };

    for matcher in MATCHERS {
        if let Some((document_type, confidence, reason)) = matcher(&letter) {
            debug!(%document_type, confidence, reason, "classifier matched");
            let mut hints = hints.clone();
            hints.is_increased =
                document_type == DocumentType::DrIrReport && lower.contains("incr");
            return ClassificationResult::new(document_type, confidence, hints, reason);
        }
    }

    ClassificationResult::unknown("no matching patterns found")
}

/// Collapse whitespace and blank out characters OCR tends to invent.
pub fn normalize(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    OCR_NOISE.replace_all(&collapsed, " ").trim().to_string()
}

/// Hints that do not depend on the letter type.
pub fn extract_hints(text: &str) -> ExtractedHints {
    ExtractedHints {
        case_id: CASE_HINT
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        amounts: AMOUNT
            .captures_iter(text)
            .map(|c| format!("${}k", &c[1]))
            .collect(),
        percentages: PERCENT
            .captures_iter(text)
            .map(|c| format!("{}%", &c[1]))
            .collect(),
        doctors: DOCTOR
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .collect(),
        conditions: CONDITION
            .captures_iter(text)
            .filter_map(|c| Condition::parse(&c[1]))
            .collect(),
        is_increased: false,
    }
}

fn match_ar_ack(l: &Letter) -> Option<Verdict> {
    if l.has(AR_SIGNATURE) {
        return Some((
            DocumentType::ArAck,
            0.95,
            "AR acknowledgment signature found",
        ));
    }
    let acknowledged = l.has_any(&[
        "acknowledgment",
        "ar ack",
        "received your claim",
        "claim has been received",
    ]);
    (acknowledged && l.has_any(&["asbestos", "exposure"])).then_some((
        DocumentType::ArAck,
        0.90,
        "AR acknowledgment patterns found",
    ))
}

fn match_claim_ack(l: &Letter) -> Option<Verdict> {
    let indicated = l.has_any(&[
        "claim acknowledgment",
        "acknowledge receipt of your claim",
        "claim has been received",
        "received your claim for benefits",
    ]);
    (indicated && l.has_any(&["claim for benefits", "claim acknowledgment"])).then_some((
        DocumentType::ClaimAck,
        0.90,
        "Claim acknowledgment patterns found",
    ))
}

fn match_withdraw_ack(l: &Letter) -> Option<Verdict> {
    (l.has("withdrawing your claim") && l.has("acknowledging that withdrawal")).then_some((
        DocumentType::WithdrawAck,
        0.95,
        "Withdrawal acknowledgment language found",
    ))
}

fn match_address_change_ack(l: &Letter) -> Option<Verdict> {
    (l.has("change of address request") && l.has("acknowledge receipt")).then_some((
        DocumentType::AddressChangeAck,
        0.95,
        "Address change acknowledgment found",
    ))
}

fn match_objection_rd_deny_ack(l: &Letter) -> Option<Verdict> {
    let objection = l.has_any(&[
        "letter of objection",
        "object to the district office",
        "recommended decision of denial",
        "objections will be carefully considered",
    ]);
    (objection && l.has("received within 20 days")).then_some((
        DocumentType::ObjectionRdDenyAck,
        0.90,
        "Objection to RD denial patterns found",
    ))
}

fn match_remand_order(l: &Letter) -> Option<Verdict> {
    (l.has("remand order") && l.has("file is being returned")).then_some((
        DocumentType::RemandOrder,
        0.95,
        "Remand order language found",
    ))
}

fn match_en16(l: &Letter) -> Option<Verdict> {
    l.has_any(&["en-16", "en 16"]).then_some((
        DocumentType::En16,
        0.95,
        "EN-16 form identifier found",
    ))
}

fn match_ee11a(l: &Letter) -> Option<Verdict> {
    let indicated = l.has_any(&[
        "ee-11a",
        "ee 11a",
        "part e",
        "whole body impairment",
        "physician must be certified",
    ]);
    (indicated && l.has("impairment") && l.has("part e")).then_some((
        DocumentType::Ee11a,
        0.90,
        "EE-11A form patterns found",
    ))
}

fn match_wh_rfi(l: &Letter) -> Option<Verdict> {
    (l.has("work history") && l.has("request")).then_some((
        DocumentType::WhRfi,
        0.85,
        "Work history RFI patterns found",
    ))
}

fn match_ih_notice(l: &Letter) -> Option<Verdict> {
    let indicated = l.has_any(&[
        "industrial hygienist",
        "industrial hygiene",
        "exposure levels",
        "toxins",
    ]);
    (indicated && l.has("work history") && l.has("verified")).then_some((
        DocumentType::IhNotice,
        0.85,
        "Industrial hygienist notice patterns found",
    ))
}

fn match_rfi_post_ih(l: &Letter) -> Option<Verdict> {
    let indicated = l.has("industrial hygiene") && l.has("request for information");
    (indicated && l.has_any(&["dr.", "doctor"])).then_some((
        DocumentType::RfiPostIh,
        0.85,
        "RFI post-IH patterns found",
    ))
}

fn is_denial(l: &Letter) -> bool {
    l.has_any(&["denial", "deny"])
}

fn is_part_e_acceptance(l: &Letter) -> bool {
    l.has("part e") && l.has_any(&["accept", "approved"])
}

fn is_b_and_e_award(l: &Letter) -> bool {
    l.has("part b") && l.has("part e") && l.text.contains("$150")
}

fn match_rd_decision(l: &Letter) -> Option<Verdict> {
    if !l.has("recommended decision") {
        return None;
    }
    if is_denial(l) {
        return Some((DocumentType::RdDeny, 0.90, "RD denial patterns found"));
    }
    if is_b_and_e_award(l) {
        return Some((DocumentType::RdAcceptBe, 0.90, "RD Accept B&E patterns found"));
    }
    if !l.hints.amounts.is_empty() && l.has("impairment") {
        return Some((
            DocumentType::RdAcceptImpair,
            0.90,
            "RD Accept Impairment patterns found",
        ));
    }
    is_part_e_acceptance(l).then_some((DocumentType::RdAcceptE, 0.85, "RD Accept E patterns found"))
}

fn match_fd_decision(l: &Letter) -> Option<Verdict> {
    if !l.has("final decision") {
        return None;
    }
    if is_denial(l) {
        return Some((DocumentType::FdDeny, 0.90, "FD denial patterns found"));
    }
    if is_b_and_e_award(l) {
        return Some((DocumentType::FdAcceptBe, 0.90, "FD Accept B&E patterns found"));
    }
    if l.has("consequential") || l.has_word("cq") {
        return Some(if l.hints.conditions.is_empty() {
            (DocumentType::FdAcceptCq, 0.90, "FD Accept CQ patterns found")
        } else {
            (
                DocumentType::FdAcceptCqSpecific,
                0.90,
                "FD Accept CQ with specific condition found",
            )
        });
    }
    if !l.hints.amounts.is_empty() && l.has("impairment") {
        return Some((DocumentType::FdAcceptIr, 0.90, "FD Accept IR patterns found"));
    }
    is_part_e_acceptance(l).then_some((DocumentType::FdAcceptE, 0.85, "FD Accept E patterns found"))
}

fn match_impairment(l: &Letter) -> Option<Verdict> {
    let evaluation = l.has("impairment evaluation");
    if evaluation
        && l.has("identified you")
        && l.has_any(&["physician criteria", "certified by"])
    {
        return Some((
            DocumentType::ImpairAuth,
            0.90,
            "Impairment authorization patterns found",
        ));
    }
    if evaluation
        && l.has("you have selected dr")
        && (l.has("no enclosed letter") || !l.has("form"))
    {
        return Some((DocumentType::IrAck, 0.90, "IR acknowledgment patterns found"));
    }
    if l.has("received notification") && l.has("impairment appt") {
        return Some((DocumentType::IrFollowUp, 0.90, "IR follow up patterns found"));
    }
    if l.has("final notice") && l.has("impairment authorization") {
        return Some((
            DocumentType::ImpairmentFinalNotice,
            0.90,
            "Impairment final notice patterns found",
        ));
    }
    if l.has("schedule your impairment appt") && l.has("within 30 days") {
        return Some((
            DocumentType::ImpairApptRequest,
            0.90,
            "Impairment appointment request patterns found",
        ));
    }
    (l.has("deferral status") && l.has("impairment claim")).then_some((
        DocumentType::IrDeferralNotice,
        0.90,
        "IR deferral notice patterns found",
    ))
}

fn match_dr_ir_report(l: &Letter) -> Option<Verdict> {
    let rated = !l.hints.doctors.is_empty() && !l.hints.percentages.is_empty();
    (rated && l.has("impairment")).then_some((
        DocumentType::DrIrReport,
        0.85,
        "Doctor IR report patterns found",
    ))
}

fn match_en20_rejection(l: &Letter) -> Option<Verdict> {
    (l.has("en-20") && l.has_any(&["rejection", "errors"])).then_some((
        DocumentType::En20Rejection,
        0.90,
        "EN-20 rejection patterns found",
    ))
}

fn match_wl(l: &Letter) -> Option<Verdict> {
    let wage_loss = l.has("wage loss") || l.has_word("wl");
    (wage_loss && l.has_any(&["benefits", "request"])).then_some((
        DocumentType::Wl,
        0.85,
        "Wage loss patterns found",
    ))
}

fn match_orau(l: &Letter) -> Option<Verdict> {
    let orau = l.has_word("orau") || l.has("dose reconstruction");
    (orau && l.has_any(&["radiation", "monitoring"])).then_some((
        DocumentType::Orau,
        0.90,
        "ORAU document patterns found",
    ))
}

fn match_niosh_waiver(l: &Letter) -> Option<Verdict> {
    (l.has("niosh") && l.has("waiver")).then_some((
        DocumentType::NioshWaiver,
        0.95,
        "NIOSH waiver patterns found",
    ))
}

fn match_dme_hhc(l: &Letter) -> Option<Verdict> {
    let dme = l.has("durable medical equipment") || l.has_word("dme");
    if dme && is_denial(l) {
        return Some((DocumentType::DmeDeny, 0.90, "DME denial patterns found"));
    }
    let hhc = l.has("home healthcare") || l.has_word("hhc");
    (hhc && l.has("auth")).then_some((
        DocumentType::HhcAuth,
        0.90,
        "HHC authorization patterns found",
    ))
}

fn match_lmn_request(l: &Letter) -> Option<Verdict> {
    let lmn = l.has("letter of medical necessity") || l.has_word("lmn");
    (lmn && l.has("request")).then_some((
        DocumentType::LmnRequest,
        0.90,
        "LMN request patterns found",
    ))
}
