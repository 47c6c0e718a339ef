// Child-to-parent notification. A committed session hands its collected data to
// the view that owns the entity; it never touches shared entity state itself.

#[cfg(test)]
use mockall::automock;

use super::actions::Confirmation;
use crate::domain::{
    CancellationConfirmation, DeliveryConfirmation, DomainError, PaymentReceipt,
    SchemeStatusChange,
};

#[cfg_attr(test, automock)]
pub trait ActionListener: Send + Sync {
    fn on_confirm_delivery(
        &self,
        order_id: &str,
        confirmation: &DeliveryConfirmation,
    ) -> Result<(), DomainError>;

    fn on_confirm_cancel(
        &self,
        order_id: &str,
        confirmation: &CancellationConfirmation,
    ) -> Result<(), DomainError>;

    fn on_confirm_pause(&self, scheme_id: &str, change: &SchemeStatusChange) -> Result<(), DomainError>;

    fn on_confirm_stop(&self, scheme_id: &str, change: &SchemeStatusChange) -> Result<(), DomainError>;

    /// Payments are not code-gated; the payment form calls this directly.
    fn on_record_payment(&self, scheme_id: &str, receipt: &PaymentReceipt) -> Result<(), DomainError>;
}

impl Confirmation {
    /// Route the confirmation to the matching parent callback.
    pub fn notify(&self, target_id: &str, listener: &dyn ActionListener) -> Result<(), DomainError> {
        match self {
            Confirmation::Delivery(c) => listener.on_confirm_delivery(target_id, c),
            Confirmation::Cancellation(c) => listener.on_confirm_cancel(target_id, c),
            Confirmation::Pause(c) => listener.on_confirm_pause(target_id, c),
            Confirmation::Stop(c) => listener.on_confirm_stop(target_id, c),
        }
    }
}
