use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use crate::models::classification::{ClassificationResult, ExtractedHints};
use crate::models::document::DocumentType;

const DEFAULT_AWARD: &str = "$150k";
const DEFAULT_PART_E_CONDITION: &str = "PF";

static FINAL_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.+ - (?:\S\. \S+|Unknown Client) \d{1,2}\.\d{1,2}\.\d{2}\.pdf$")
        .expect("valid regex")
});

/// `"{base} - {F. Last} {M.D.YY}.pdf"`. Never fails; missing pieces fall
/// back to placeholders.
pub fn generate_filename(
    result: &ClassificationResult,
    client_name: Option<&str>,
    date_override: Option<NaiveDate>,
) -> String {
    let date = date_override.unwrap_or_else(|| Local::now().date_naive());
    format!(
        "{} - {} {}.pdf",
        base_name(result.document_type, &result.hints),
        short_client_name(client_name),
        format_date(date)
    )
}

/// Month and day unpadded, two-digit year.
pub fn format_date(date: NaiveDate) -> String {
    format!("{}.{}.{:02}", date.month(), date.day(), date.year() % 100)
}

/// "Jane Q Doe" to "J. Doe".
pub fn short_client_name(client_name: Option<&str>) -> String {
    let parts: Vec<&str> = client_name.unwrap_or_default().split_whitespace().collect();
    match parts.as_slice() {
        [] => "Unknown Client".to_string(),
        [only] => format!("X. {only}"),
        [first, .., last] => {
            let initial: String = first.chars().take(1).flat_map(char::to_uppercase).collect();
            format!("{initial}. {last}")
        }
    }
}

/// Whether a filename already follows the generated convention. Such files
/// were handled on an earlier pass.
pub fn is_final_form(filename: &str) -> bool {
    FINAL_FORM.is_match(filename)
}

fn with_amount(label: &str, hints: &ExtractedHints) -> String {
    match hints.first_amount() {
        Some(amount) => format!("{label} {amount}"),
        None => label.to_string(),
    }
}

fn with_condition(label: &str, hints: &ExtractedHints) -> String {
    match hints.first_condition() {
        Some(condition) => format!("{label} {condition}"),
        None => label.to_string(),
    }
}

fn doctor_rating(hints: &ExtractedHints) -> String {
    let (Some(doctor), Some(rating)) = (hints.doctors.first(), hints.percentages.first()) else {
        return DocumentType::DrIrReport.label().to_string();
    };
    match (hints.is_increased, hints.percentages.get(1)) {
        (true, Some(increase)) => format!("Dr. {doctor} IR {rating} ({increase} incr)"),
        (true, None) => format!("Dr. {doctor} IR {rating} (incr)"),
        (false, _) => format!("Dr. {doctor} IR {rating}"),
    }
}

/// Filename stem per type. Adding a variant to `DocumentType` fails to
/// compile until it gets an arm here.
pub fn base_name(document_type: DocumentType, hints: &ExtractedHints) -> String {
    use DocumentType::*;

    match document_type {
        RdAcceptBe | FdAcceptBe => format!(
            "{} {}",
            document_type.label(),
            hints.first_amount().unwrap_or(DEFAULT_AWARD)
        ),
        RdAcceptImpair | FdAcceptImpair | FdAcceptIr => with_amount(document_type.label(), hints),
        RdAcceptE => format!(
            "{} {}",
            document_type.label(),
            hints
                .first_condition()
                .map(|c| c.as_str())
                .unwrap_or(DEFAULT_PART_E_CONDITION)
        ),
        RdDeny | FdAcceptE | FdDeny => with_condition(document_type.label(), hints),
        FdAcceptCqSpecific => with_condition(FdAcceptCq.label(), hints),
        DrIrReport => doctor_rating(hints),
        Unknown => "Unknown Document".to_string(),
        ArAck | ClaimAck | WhRfi | IhNotice | RfiPostIh | En16 | WithdrawAck
        | ObjectionRdDenyAck | RemandOrder | FdAcceptCq | Ee11a | ImpairAuth | IrAck
        | IrFollowUp | ImpairmentFinalNotice | ImpairApptRequest | IrDeferralNotice
        | En20Rejection | Wl | Orau | NioshWaiver | DmeDeny | HhcAuth | LmnRequest
        | AddressChangeAck => document_type.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::Condition;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    fn result_for(document_type: DocumentType, hints: ExtractedHints) -> ClassificationResult {
        ClassificationResult::new(document_type, 0.9, hints, "test")
    }

    #[test]
    fn test_ar_ack_filename() {
        let result = result_for(DocumentType::ArAck, ExtractedHints::default());
        assert_eq!(
            generate_filename(&result, Some("Test Person"), Some(day())),
            "AR Ack - T. Person 3.7.25.pdf"
        );
    }

    #[test]
    fn test_date_is_unpadded() {
        assert_eq!(format_date(day()), "3.7.25");
        assert_eq!(
            format_date(NaiveDate::from_ymd_opt(2031, 12, 25).unwrap()),
            "12.25.31"
        );
        assert_eq!(
            format_date(NaiveDate::from_ymd_opt(2009, 1, 1).unwrap()),
            "1.1.09"
        );
    }

    #[test]
    fn test_client_name_placeholders() {
        assert_eq!(short_client_name(None), "Unknown Client");
        assert_eq!(short_client_name(Some("  ")), "Unknown Client");
        assert_eq!(short_client_name(Some("Cher")), "X. Cher");
        assert_eq!(short_client_name(Some("mary ann major")), "M. major");
    }

    #[test]
    fn test_every_type_has_a_base_name() {
        for document_type in DocumentType::ALL {
            let base = base_name(document_type, &ExtractedHints::default());
            assert!(!base.is_empty(), "{document_type} produced an empty base");
            let filename = generate_filename(
                &result_for(document_type, ExtractedHints::default()),
                Some("Jane Doe"),
                Some(day()),
            );
            assert!(is_final_form(&filename), "{filename} is not in final form");
        }
    }

    #[test]
    fn test_hint_fallbacks() {
        let none = ExtractedHints::default();
        assert_eq!(base_name(DocumentType::RdAcceptBe, &none), "RD Accept B&E $150k");
        assert_eq!(base_name(DocumentType::RdAcceptE, &none), "RD Accept E PF");
        assert_eq!(base_name(DocumentType::FdAcceptIr, &none), "FD Accept IR");
        assert_eq!(base_name(DocumentType::FdAcceptCqSpecific, &none), "FD Accept CQ");
        assert_eq!(base_name(DocumentType::DrIrReport, &none), "Dr IR Report");
    }

    #[test]
    fn test_hints_are_spliced_in() {
        let hints = ExtractedHints {
            amounts: vec!["$250k".into()],
            conditions: vec![Condition::Copd],
            ..Default::default()
        };
        assert_eq!(base_name(DocumentType::FdAcceptBe, &hints), "FD Accept B&E $250k");
        assert_eq!(base_name(DocumentType::RdAcceptImpair, &hints), "RD Accept Impair $250k");
        assert_eq!(base_name(DocumentType::RdAcceptE, &hints), "RD Accept E COPD");
        assert_eq!(base_name(DocumentType::FdAcceptCqSpecific, &hints), "FD Accept CQ COPD");
        assert_eq!(base_name(DocumentType::RdDeny, &hints), "RD Deny COPD");
    }

    #[test]
    fn test_doctor_rating_variants() {
        let mut hints = ExtractedHints {
            doctors: vec!["Jones".into()],
            percentages: vec!["25%".into(), "10%".into()],
            ..Default::default()
        };
        assert_eq!(base_name(DocumentType::DrIrReport, &hints), "Dr. Jones IR 25%");
        hints.is_increased = true;
        assert_eq!(
            base_name(DocumentType::DrIrReport, &hints),
            "Dr. Jones IR 25% (10% incr)"
        );
        hints.percentages.truncate(1);
        assert_eq!(
            base_name(DocumentType::DrIrReport, &hints),
            "Dr. Jones IR 25% (incr)"
        );
    }

    #[test]
    fn test_final_form_detection() {
        assert!(is_final_form("AR Ack - T. Person 3.7.25.pdf"));
        assert!(is_final_form("RD Accept B&E $150k - J. Doe 12.25.31.pdf"));
        assert!(!is_final_form("scan_0001.pdf"));
        assert!(!is_final_form("AR Ack - T. Person 2025-03-07.pdf"));
        assert!(!is_final_form("Letter - from DOL.pdf"));
    }
}
