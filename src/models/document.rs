use serde::{Deserialize, Serialize};

/// Every letter type the classifier can report. `Unknown` is the default
/// and means "not ours"; `ArAck` is the only type that gets the full
/// record-update-and-file treatment.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum DocumentType {
    ArAck,
    ClaimAck,
    WhRfi,
    IhNotice,
    RfiPostIh,
    En16,
    RdAcceptBe,
    RdAcceptImpair,
    RdAcceptE,
    RdDeny,
    WithdrawAck,
    ObjectionRdDenyAck,
    RemandOrder,
    FdAcceptBe,
    FdAcceptImpair,
    FdAcceptE,
    FdAcceptCq,
    FdAcceptCqSpecific,
    FdAcceptIr,
    FdDeny,
    Ee11a,
    ImpairAuth,
    IrAck,
    IrFollowUp,
    ImpairmentFinalNotice,
    ImpairApptRequest,
    IrDeferralNotice,
    DrIrReport,
    En20Rejection,
    Wl,
    Orau,
    NioshWaiver,
    DmeDeny,
    HhcAuth,
    LmnRequest,
    AddressChangeAck,
    #[default]
    Unknown,
}

impl DocumentType {
    pub const PRIMARY: DocumentType = DocumentType::ArAck;

    pub const ALL: [DocumentType; 37] = [
        Self::ArAck,
        Self::ClaimAck,
        Self::WhRfi,
        Self::IhNotice,
        Self::RfiPostIh,
        Self::En16,
        Self::RdAcceptBe,
        Self::RdAcceptImpair,
        Self::RdAcceptE,
        Self::RdDeny,
        Self::WithdrawAck,
        Self::ObjectionRdDenyAck,
        Self::RemandOrder,
        Self::FdAcceptBe,
        Self::FdAcceptImpair,
        Self::FdAcceptE,
        Self::FdAcceptCq,
        Self::FdAcceptCqSpecific,
        Self::FdAcceptIr,
        Self::FdDeny,
        Self::Ee11a,
        Self::ImpairAuth,
        Self::IrAck,
        Self::IrFollowUp,
        Self::ImpairmentFinalNotice,
        Self::ImpairApptRequest,
        Self::IrDeferralNotice,
        Self::DrIrReport,
        Self::En20Rejection,
        Self::Wl,
        Self::Orau,
        Self::NioshWaiver,
        Self::DmeDeny,
        Self::HhcAuth,
        Self::LmnRequest,
        Self::AddressChangeAck,
        Self::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::ArAck => "AR Ack",
            Self::ClaimAck => "Claim Ack",
            Self::WhRfi => "WH RFI",
            Self::IhNotice => "IH Notice",
            Self::RfiPostIh => "RFI Post IH",
            Self::En16 => "EN16",
            Self::RdAcceptBe => "RD Accept B&E",
            Self::RdAcceptImpair => "RD Accept Impair",
            Self::RdAcceptE => "RD Accept E",
            Self::RdDeny => "RD Deny",
            Self::WithdrawAck => "Withdraw Ack",
            Self::ObjectionRdDenyAck => "Objection to RD Deny Ack",
            Self::RemandOrder => "Remand Order",
            Self::FdAcceptBe => "FD Accept B&E",
            Self::FdAcceptImpair => "FD Accept Impair",
            Self::FdAcceptE => "FD Accept E",
            Self::FdAcceptCq => "FD Accept CQ",
            Self::FdAcceptCqSpecific => "FD Accept CQ Specific",
            Self::FdAcceptIr => "FD Accept IR",
            Self::FdDeny => "FD Deny",
            Self::Ee11a => "EE-11A",
            Self::ImpairAuth => "Impair Auth",
            Self::IrAck => "IR Ack",
            Self::IrFollowUp => "IR Follow Up",
            Self::ImpairmentFinalNotice => "Impairment Final Notice",
            Self::ImpairApptRequest => "Impair Appt Request",
            Self::IrDeferralNotice => "IR Deferral Notice",
            Self::DrIrReport => "Dr IR Report",
            Self::En20Rejection => "EN-20 Rejection",
            Self::Wl => "WL",
            Self::Orau => "ORAU",
            Self::NioshWaiver => "NIOSH Waiver",
            Self::DmeDeny => "DME Deny",
            Self::HhcAuth => "HHC Auth",
            Self::LmnRequest => "LMN Request",
            Self::AddressChangeAck => "Address Change Ack",
            Self::Unknown => "Unknown",
        }
    }

    pub fn is_primary(self) -> bool {
        self == Self::PRIMARY
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown document type: {s}"))
    }
}

/// Medical condition codes recognised in letter text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Copd,
    Osa,
    Bcc,
    Pf,
    Asbestosis,
    Mesothelioma,
    LungCancer,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Copd => "COPD",
            Self::Osa => "OSA",
            Self::Bcc => "BCC",
            Self::Pf => "PF",
            Self::Asbestosis => "ASBESTOSIS",
            Self::Mesothelioma => "MESOTHELIOMA",
            Self::LungCancer => "LUNG CANCER",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let upper = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        match upper.as_str() {
            "COPD" => Some(Self::Copd),
            "OSA" => Some(Self::Osa),
            "BCC" => Some(Self::Bcc),
            "PF" => Some(Self::Pf),
            "ASBESTOSIS" => Some(Self::Asbestosis),
            "MESOTHELIOMA" => Some(Self::Mesothelioma),
            "LUNG CANCER" => Some(Self::LungCancer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
