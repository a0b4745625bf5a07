//! Maps processor status codes onto the local outcome taxonomy.
//!
//! Classification is pure: unknown codes produce [`Outcome::Unknown`] rather than an error.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The kind of processor operation a status code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationDomain {
    Payment,
    Refund,
    Capture,
}

impl FromStr for OperationDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "payment" => Ok(OperationDomain::Payment),
            "refund" => Ok(OperationDomain::Refund),
            "capture" => Ok(OperationDomain::Capture),
            other => Err(format!("unknown operation domain '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// `captured` separates an authorization-only payment from a settled one.
    /// Refund and capture successes always report `true`.
    Success { captured: bool },
    Pending,
    Declined { reason: String },
    FraudRejected,
    Cancelled,
    Uncertain,
    Unknown { code: i32 },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Success or pending: the processor accepted the request.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Success { .. } | Outcome::Pending)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { captured: true } => f.write_str("success (captured)"),
            Outcome::Success { captured: false } => f.write_str("success (authorized)"),
            Outcome::Pending => f.write_str("pending"),
            Outcome::Declined { reason } => write!(f, "declined ({reason})"),
            Outcome::FraudRejected => f.write_str("rejected by fraud prevention"),
            Outcome::Cancelled => f.write_str("cancelled"),
            Outcome::Uncertain => f.write_str("uncertain"),
            Outcome::Unknown { code } => write!(f, "unknown status code {code}"),
        }
    }
}

/// Payment codes 800-999 are accepted as captured for compatibility with older
/// processor responses. This band is not confirmed by current processor documentation.
const LEGACY_SUCCESS_BAND: std::ops::RangeInclusive<i32> = 800..=999;

pub fn classify(status_code: i32, status: &str, domain: OperationDomain) -> Outcome {
    match domain {
        OperationDomain::Payment => classify_payment(status_code),
        OperationDomain::Refund => classify_refund(status_code, status),
        OperationDomain::Capture => classify_capture(status_code, status),
    }
}

fn classify_payment(code: i32) -> Outcome {
    match code {
        5 => Outcome::Success { captured: false },
        9 => Outcome::Success { captured: true },
        c if LEGACY_SUCCESS_BAND.contains(&c) => Outcome::Success { captured: true },
        2 => Outcome::Declined {
            reason: "declined".to_string(),
        },
        1 => Outcome::Cancelled,
        51 => Outcome::Pending,
        52 => Outcome::Uncertain,
        57 | 59 => Outcome::FraudRejected,
        other => Outcome::Unknown { code: other },
    }
}

// Either the code or the status string is enough to count as success or pending.
fn classify_refund(code: i32, status: &str) -> Outcome {
    if code == 8 || matches!(status, "REFUNDED" | "REFUND_REQUESTED") {
        Outcome::Success { captured: true }
    } else if code == 81 || status == "PENDING_APPROVAL" {
        Outcome::Pending
    } else if code == 83 || status == "REJECTED" {
        Outcome::Declined {
            reason: "rejected".to_string(),
        }
    } else if code == 82 {
        Outcome::Uncertain
    } else {
        Outcome::Unknown { code }
    }
}

fn classify_capture(code: i32, status: &str) -> Outcome {
    if code == 9 || matches!(status, "CAPTURED" | "CAPTURE_REQUESTED") {
        Outcome::Success { captured: true }
    } else if code == 91 || status == "PENDING_CAPTURE" {
        Outcome::Pending
    } else if code == 93 || matches!(status, "REJECTED" | "CANCELLED") {
        Outcome::Declined {
            reason: "rejected".to_string(),
        }
    } else if code == 92 {
        Outcome::Uncertain
    } else {
        Outcome::Unknown { code }
    }
}
