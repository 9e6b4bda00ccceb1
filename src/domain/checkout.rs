//! Checkout form and order confirmation message

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use validator::{Validate, ValidationError};
use crate::domain::aggregates::order::Order;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod { Pickup, Delivery }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Pix, Card, Cash }

impl DeliveryMethod {
    pub fn label(&self) -> &'static str { match self { Self::Pickup => "Pickup", Self::Delivery => "Delivery" } }
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str { match self { Self::Pix => "Pix", Self::Card => "Card", Self::Cash => "Cash" } }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(min = 1, max = 200, message = "street is required"))]
    pub street: String,
    #[validate(length(min = 1, max = 20, message = "number is required"))]
    pub number: String,
    pub complement: Option<String>,
    #[validate(length(min = 1, max = 100, message = "district is required"))]
    pub district: String,
    #[validate(length(min = 1, max = 100, message = "city is required"))]
    pub city: String,
    pub reference: Option<String>,
}

impl Address {
    pub fn one_line(&self) -> String {
        let mut line = format!("{}, {}", self.street, self.number);
        if let Some(complement) = self.complement.as_deref().filter(|c| !c.trim().is_empty()) { let _ = write!(line, " ({complement})"); }
        let _ = write!(line, " - {}, {}", self.district, self.city);
        line
    }
}

/// Customer-supplied checkout data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_checkout", skip_on_field_errors = false))]
pub struct CheckoutForm {
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub customer_name: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    pub delivery: DeliveryMethod,
    #[validate]
    pub address: Option<Address>,
    pub payment: PaymentMethod,
    pub change_for: Option<Decimal>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    let allowed = phone.chars().all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    if !allowed || !(8..=15).contains(&digits) {
        let mut err = ValidationError::new("phone");
        err.message = Some("phone must have 8 to 15 digits".into());
        return Err(err);
    }
    Ok(())
}

fn validate_checkout(form: &CheckoutForm) -> Result<(), ValidationError> {
    if form.delivery == DeliveryMethod::Delivery && form.address.is_none() {
        let mut err = ValidationError::new("address_required");
        err.message = Some("address is required for delivery".into());
        return Err(err);
    }
    if form.change_for.is_some() && form.payment != PaymentMethod::Cash {
        let mut err = ValidationError::new("change_for");
        err.message = Some("change is only given for cash payments".into());
        return Err(err);
    }
    Ok(())
}

/// Human-readable order summary sent to the store over WhatsApp.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderConfirmation {
    pub message: String,
    pub whatsapp_url: Option<String>,
}

impl OrderConfirmation {
    pub fn render(store_name: &str, order: &Order, whatsapp_number: Option<&str>) -> Self {
        let mut m = String::new();
        let _ = writeln!(m, "*{store_name} - Order {}*", order.order_number());
        let _ = writeln!(m);
        let _ = writeln!(m, "*Customer:* {}", order.customer().name);
        let _ = writeln!(m, "*Phone:* {}", order.customer().phone);
        let _ = writeln!(m);
        let _ = writeln!(m, "*Items:*");
        for item in order.items() {
            let _ = write!(m, "- {}x {}", item.quantity, item.title);
            if let Some(sku) = &item.sku { let _ = write!(m, " [{sku}]"); }
            let _ = writeln!(m, " = {}", item.total);
        }
        let _ = writeln!(m);
        let _ = writeln!(m, "*Subtotal:* {}", order.subtotal());
        match (order.delivery(), order.address()) {
            (DeliveryMethod::Delivery, Some(address)) => {
                let _ = writeln!(m, "*Delivery fee:* {}", order.delivery_fee());
                let _ = writeln!(m, "*Address:* {}", address.one_line());
                if let Some(reference) = address.reference.as_deref().filter(|r| !r.trim().is_empty()) {
                    let _ = writeln!(m, "*Reference:* {reference}");
                }
            }
            _ => { let _ = writeln!(m, "*Delivery:* {}", DeliveryMethod::Pickup.label()); }
        }
        let _ = writeln!(m, "*Total:* {}", order.total());
        let _ = write!(m, "*Payment:* {}", order.payment().label());
        if let Some(change) = order.change_for() { let _ = write!(m, " (change for {change})"); }
        if let Some(notes) = order.notes().filter(|n| !n.trim().is_empty()) {
            let _ = write!(m, "\n\n*Notes:* {notes}");
        }
        let whatsapp_url = whatsapp_number.and_then(|number| whatsapp_link(number, &m));
        Self { message: m, whatsapp_url }
    }
}

fn whatsapp_link(number: &str, text: &str) -> Option<String> {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() { return None; }
    url::Url::parse_with_params(&format!("https://wa.me/{digits}"), &[("text", text)]).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(delivery: DeliveryMethod) -> CheckoutForm {
        CheckoutForm {
            customer_name: "Ana Souza".into(), phone: "+55 (11) 98888-7777".into(), email: None,
            delivery, address: None, payment: PaymentMethod::Pix, change_for: None, notes: None,
        }
    }

    #[test]
    fn test_pickup_form_is_valid() {
        assert!(form(DeliveryMethod::Pickup).validate().is_ok());
    }

    #[test]
    fn test_delivery_requires_address() {
        let mut f = form(DeliveryMethod::Delivery);
        assert!(f.validate().is_err());
        f.address = Some(Address { street: "Rua A".into(), number: "10".into(), district: "Centro".into(), city: "Recife".into(), ..Default::default() });
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_field_errors() {
        let mut f = form(DeliveryMethod::Pickup);
        f.customer_name = String::new();
        f.phone = "12ab".into();
        let errors = f.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("customer_name"));
        assert!(fields.contains_key("phone"));
    }

    #[test]
    fn test_change_only_for_cash() {
        let mut f = form(DeliveryMethod::Pickup);
        f.change_for = Some(Decimal::new(100, 0));
        assert!(f.validate().is_err());
        f.payment = PaymentMethod::Cash;
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_whatsapp_link_encodes_text() {
        let url = whatsapp_link("+55 11 99999-0000", "*Order* 1 & 2").unwrap();
        assert!(url.starts_with("https://wa.me/5511999990000?text="));
        assert!(!url.contains(' ') && !url.contains('&'));
        assert_eq!(whatsapp_link("n/a", "x"), None);
    }
}
