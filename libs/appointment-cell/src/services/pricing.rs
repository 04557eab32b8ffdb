use serde::Serialize;

use crate::models::Appointment;

/// Share of the paid amount kept when an appointment is refunded.
pub const CANCELLATION_FEE_RATE: f64 = 0.10;

/// Fee breakdown shown to the operator before a refund. Never persisted.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct RefundQuote {
    pub original_amount: f64,
    pub cancellation_fee: f64,
    pub refund_amount: f64,
}

impl RefundQuote {
    /// The refund is what is left after the rounded fee, so the two always
    /// add back up to the amount paid.
    pub fn for_amount(amount: f64) -> Self {
        let cancellation_fee = round_currency(amount * CANCELLATION_FEE_RATE);
        Self {
            original_amount: amount,
            cancellation_fee,
            refund_amount: round_currency(amount - cancellation_fee),
        }
    }

    pub fn for_appointment(appointment: &Appointment) -> Self {
        Self::for_amount(appointment.amount)
    }

    /// Text of the refund confirmation request.
    pub fn confirmation_message(&self, patient: &str) -> String {
        format!(
            "Refund {} to {}?\n\nOriginal amount: {}\nCancellation fee ({:.0}%): {}\nRefund amount: {}",
            format_rand(self.refund_amount),
            patient,
            format_rand(self.original_amount),
            CANCELLATION_FEE_RATE * 100.0,
            format_rand(self.cancellation_fee),
            format_rand(self.refund_amount),
        )
    }
}

/// Rounds half away from zero to cents.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rand amounts as the dashboard prints them: `R180.00`.
pub fn format_rand(value: f64) -> String {
    format!("R{:.2}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_and_fee_add_back_up() {
        for amount in [0.0, 0.01, 1.05, 12.25, 99.95, 199.99, 200.0, 333.33, 1250.5] {
            let quote = RefundQuote::for_amount(amount);
            assert!(
                (quote.refund_amount + quote.cancellation_fee - amount).abs() < 1e-9,
                "{} -> {:?}",
                amount,
                quote
            );
        }
    }

    #[test]
    fn half_cent_fee_does_not_overcharge() {
        for (amount, printed) in [(12.25, "R12.25"), (99.95, "R99.95"), (1.05, "R1.05")] {
            let quote = RefundQuote::for_amount(amount);
            assert_eq!(format_rand(quote.cancellation_fee + quote.refund_amount), printed);
            assert!(quote.refund_amount <= amount);
        }
    }

    #[test]
    fn message_shows_fee_and_refund() {
        let message = RefundQuote::for_amount(200.0).confirmation_message("Jane Doe");
        assert!(message.contains("R20.00"));
        assert!(message.contains("R180.00"));
        assert!(message.contains("Jane Doe"));
    }
}
