//! Checkout cart: priced lines keyed by (product, variation).

use serde::Serialize;
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    lines: Vec<CartItem>,
    subtotal: Money,
}

/// One priced line. `unit_price` already includes the variation adjustment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub name: String,
    pub variation_label: Option<String>,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }

    /// "Name (Black / M)" for variation lines, the bare name otherwise.
    pub fn title(&self) -> String {
        match &self.variation_label {
            Some(label) => format!("{} ({label})", self.name),
            None => self.name.clone(),
        }
    }
}

impl Cart {
    pub fn new(currency: &str) -> Self { Self { lines: vec![], subtotal: Money::zero(currency) } }

    pub fn items(&self) -> &[CartItem] { &self.lines }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn currency(&self) -> &str { self.subtotal.currency() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// Adds a line; a repeated (product, variation) pair increases the existing quantity.
    pub fn add_item(&mut self, line: CartItem) -> Result<(), CartError> {
        let subtotal = self.subtotal.add(&line.line_total()).map_err(|_| CartError::CurrencyMismatch)?;
        match self.lines.iter_mut().find(|l| l.product_id == line.product_id && l.variation_id == line.variation_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => self.lines.push(line),
        }
        self.subtotal = subtotal;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { CurrencyMismatch }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::CurrencyMismatch => write!(f, "Cart lines must share one currency") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(product_id: Uuid, variation_id: Option<Uuid>, quantity: u32, price: Money) -> CartItem {
        CartItem { product_id, variation_id, name: "Sneaker".into(), variation_label: Some("Black / 40".into()), sku: None, quantity, unit_price: price }
    }

    #[test]
    fn test_same_variation_merges() {
        let mut cart = Cart::new("BRL");
        let (sneaker, black, white) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        cart.add_item(line(sneaker, Some(black), 2, Money::brl(Decimal::new(10, 0)))).unwrap();
        cart.add_item(line(sneaker, Some(black), 1, Money::brl(Decimal::new(10, 0)))).unwrap();
        cart.add_item(line(sneaker, Some(white), 1, Money::brl(Decimal::new(12, 0)))).unwrap();
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.subtotal().amount(), Decimal::new(42, 0));
        assert_eq!(cart.items()[0].title(), "Sneaker (Black / 40)");
    }

    #[test]
    fn test_currency_mismatch() {
        let mut cart = Cart::new("USD");
        let err = cart.add_item(line(Uuid::new_v4(), None, 1, Money::brl(Decimal::ONE))).unwrap_err();
        assert_eq!(err, CartError::CurrencyMismatch);
        assert!(cart.is_empty());
    }
}
