use super::ids::{PaymentRequestId, UserId};
use crate::error::{IouError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A strictly positive amount expressed in minor currency units (pence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct AmountCents(u64);

impl AmountCents {
    pub fn new(cents: u64) -> Result<Self> {
        if cents > 0 {
            Ok(Self(cents))
        } else {
            Err(IouError::invalid_input("Amount must be positive"))
        }
    }

    /// Converts an amount in major units (pounds) to pence, rounding half away
    /// from zero to two decimal places.
    pub fn from_major_units(value: Decimal) -> Result<Self> {
        let cents = value
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| IouError::invalid_input("Amount is too large"))?;
        if cents <= Decimal::ZERO {
            return Err(IouError::invalid_input("Please enter a valid amount"));
        }
        let cents = cents
            .to_u64()
            .ok_or_else(|| IouError::invalid_input("Amount is too large"))?;
        Self::new(cents)
    }

    /// Parses a decimal string such as `"12.50"` in major units.
    pub fn parse_major_units(value: &str) -> Result<Self> {
        let decimal = Decimal::from_str(value.trim())
            .map_err(|_| IouError::invalid_input("Please enter a valid amount"))?;
        Self::from_major_units(decimal)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for AmountCents {
    type Error = IouError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AmountCents> for u64 {
    fn from(amount: AmountCents) -> Self {
        amount.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Gbp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Settled,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Settled => "settled",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The statuses a caller may ask for. `pending` is never a valid target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Settled,
    Cancelled,
}

impl FromStr for TargetStatus {
    type Err = IouError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "settled" => Ok(TargetStatus::Settled),
            "cancelled" => Ok(TargetStatus::Cancelled),
            _ => Err(IouError::invalid_input(
                "Valid status is required (settled or cancelled)",
            )),
        }
    }
}

impl From<TargetStatus> for PaymentStatus {
    fn from(target: TargetStatus) -> Self {
        match target {
            TargetStatus::Settled => PaymentStatus::Settled,
            TargetStatus::Cancelled => PaymentStatus::Cancelled,
        }
    }
}

/// A request from `from_user` asking `to_user` to pay `amount_cents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: PaymentRequestId,
    /// The requester.
    pub from_user: UserId,
    /// The payer.
    pub to_user: UserId,
    pub amount_cents: AmountCents,
    pub currency: Currency,
    pub memo: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn new(
        from_user: UserId,
        to_user: UserId,
        amount_cents: AmountCents,
        memo: Option<String>,
    ) -> Self {
        Self {
            id: PaymentRequestId::new(),
            from_user,
            to_user,
            amount_cents,
            currency: Currency::Gbp,
            memo: memo
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn is_recipient(&self, caller: UserId) -> bool {
        self.to_user == caller
    }

    pub fn is_sender(&self, caller: UserId) -> bool {
        self.from_user == caller
    }

    pub fn involves(&self, caller: UserId) -> bool {
        self.is_recipient(caller) || self.is_sender(caller)
    }

    /// Checks whether `caller` may move this request to `target`.
    ///
    /// Only pending requests move. The recipient may settle or cancel, the
    /// sender may only cancel. A caller who is both is treated as the
    /// recipient.
    pub fn authorize_transition(&self, caller: UserId, target: TargetStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(IouError::conflict(
                "Payment request is already in a final state",
            ));
        }

        let is_recipient = self.is_recipient(caller);
        let is_sender = self.is_sender(caller);

        if !is_recipient && !is_sender {
            return Err(IouError::forbidden(
                "You don't have permission to update this payment request",
            ));
        }

        if !is_recipient && target == TargetStatus::Settled {
            return Err(IouError::forbidden(
                "Only the recipient can mark a payment as settled",
            ));
        }

        Ok(())
    }

    pub fn can_transition(&self, caller: UserId, target: TargetStatus) -> bool {
        self.authorize_transition(caller, target).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending(from: UserId, to: UserId) -> PaymentRequest {
        PaymentRequest::new(from, to, AmountCents::new(500).unwrap(), None)
    }

    #[test]
    fn test_amount_validation() {
        assert!(AmountCents::new(1).is_ok());
        assert!(matches!(
            AmountCents::new(0),
            Err(IouError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_amount_from_major_units() {
        assert_eq!(
            AmountCents::from_major_units(dec!(12.5)).unwrap().value(),
            1250
        );
        assert_eq!(
            AmountCents::from_major_units(dec!(0.015)).unwrap().value(),
            2
        );
        assert_eq!(
            AmountCents::from_major_units(dec!(10.994)).unwrap().value(),
            1099
        );
        assert!(AmountCents::from_major_units(dec!(0.004)).is_err());
        assert!(AmountCents::from_major_units(dec!(-3)).is_err());
    }

    #[test]
    fn test_amount_upper_bound() {
        // Scaling to pence overflows the decimal itself.
        assert!(matches!(
            AmountCents::from_major_units(Decimal::MAX),
            Err(IouError::InvalidInput(msg)) if msg == "Amount is too large"
        ));
        assert!(matches!(
            AmountCents::parse_major_units("79228162514264337593543950335"),
            Err(IouError::InvalidInput(_))
        ));

        // Fits a decimal but not u64 pence.
        assert!(matches!(
            AmountCents::from_major_units(dec!(1000000000000000000)),
            Err(IouError::InvalidInput(msg)) if msg == "Amount is too large"
        ));

        let max_pounds = Decimal::from(u64::MAX) / Decimal::ONE_HUNDRED;
        assert_eq!(
            AmountCents::from_major_units(max_pounds.trunc()).unwrap().value(),
            (u64::MAX / 100) * 100
        );
    }

    #[test]
    fn test_amount_parse_major_units() {
        assert_eq!(AmountCents::parse_major_units(" 7.20 ").unwrap().value(), 720);
        assert!(AmountCents::parse_major_units("seven").is_err());
        assert!(AmountCents::parse_major_units("").is_err());
    }

    #[test]
    fn test_amount_deserialization_rejects_zero() {
        assert!(serde_json::from_str::<AmountCents>("0").is_err());
        assert_eq!(
            serde_json::from_str::<AmountCents>("250").unwrap().value(),
            250
        );
    }

    #[test]
    fn test_target_status_parse() {
        assert_eq!("settled".parse::<TargetStatus>().unwrap(), TargetStatus::Settled);
        assert_eq!(
            "cancelled".parse::<TargetStatus>().unwrap(),
            TargetStatus::Cancelled
        );
        for bad in ["pending", "Settled", "", "paid"] {
            assert!(matches!(
                bad.parse::<TargetStatus>(),
                Err(IouError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_blank_memo_is_dropped() {
        let req = PaymentRequest::new(
            UserId::new(),
            UserId::new(),
            AmountCents::new(1).unwrap(),
            Some("   ".to_string()),
        );
        assert_eq!(req.memo, None);
        assert_eq!(req.status, PaymentStatus::Pending);
        assert_eq!(req.currency, Currency::Gbp);
    }

    #[test]
    fn test_recipient_may_settle_or_cancel() {
        let (a, b) = (UserId::new(), UserId::new());
        let req = pending(a, b);
        assert!(req.authorize_transition(b, TargetStatus::Settled).is_ok());
        assert!(req.authorize_transition(b, TargetStatus::Cancelled).is_ok());
    }

    #[test]
    fn test_sender_may_only_cancel() {
        let (a, b) = (UserId::new(), UserId::new());
        let req = pending(a, b);
        assert!(req.authorize_transition(a, TargetStatus::Cancelled).is_ok());
        assert!(matches!(
            req.authorize_transition(a, TargetStatus::Settled),
            Err(IouError::Forbidden(_))
        ));
    }

    #[test]
    fn test_unrelated_caller_forbidden() {
        let req = pending(UserId::new(), UserId::new());
        let stranger = UserId::new();
        for target in [TargetStatus::Settled, TargetStatus::Cancelled] {
            assert!(matches!(
                req.authorize_transition(stranger, target),
                Err(IouError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn test_terminal_states_conflict_for_everyone() {
        let (a, b) = (UserId::new(), UserId::new());
        for status in [PaymentStatus::Settled, PaymentStatus::Cancelled] {
            let mut req = pending(a, b);
            req.status = status;
            for caller in [a, b, UserId::new()] {
                for target in [TargetStatus::Settled, TargetStatus::Cancelled] {
                    assert!(matches!(
                        req.authorize_transition(caller, target),
                        Err(IouError::Conflict(_))
                    ));
                }
            }
        }
    }

    #[test]
    fn test_self_request_uses_recipient_rules() {
        let a = UserId::new();
        let req = pending(a, a);
        assert!(req.can_transition(a, TargetStatus::Settled));
        assert!(req.can_transition(a, TargetStatus::Cancelled));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(serde_json::to_string(&Currency::Gbp).unwrap(), "\"GBP\"");
    }
}
