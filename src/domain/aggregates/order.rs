//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::cart::Cart;
use crate::domain::checkout::{Address, CheckoutForm, DeliveryMethod, PaymentMethod};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Order {
    id: Uuid,
    order_number: String,
    customer: Customer,
    status: OrderStatus,
    delivery: DeliveryMethod,
    address: Option<Address>,
    payment: PaymentMethod,
    change_for: Option<Money>,
    notes: Option<String>,
    items: Vec<LineItem>,
    subtotal: Money,
    delivery_fee: Money,
    total: Money,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)] pub struct Customer { pub name: String, pub phone: String, pub email: Option<String> }
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)] pub struct LineItem { pub product_id: Uuid, pub variation_id: Option<Uuid>, pub title: String, pub sku: Option<String>, pub quantity: u32, pub unit_price: Money, pub total: Money }
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Confirmed => "confirmed" }
    }
}

impl Order {
    /// Turns a cart and a validated checkout form into a pending order.
    pub fn place(cart: &Cart, form: &CheckoutForm, delivery_fee: Decimal) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        let currency = cart.currency();
        let items = cart.items().iter().map(|i| LineItem {
            product_id: i.product_id, variation_id: i.variation_id, title: i.title(), sku: i.sku.clone(),
            quantity: i.quantity, unit_price: i.unit_price.clone(), total: i.line_total(),
        }).collect();
        let delivery_fee = match form.delivery {
            DeliveryMethod::Delivery => Money::new(delivery_fee, currency),
            DeliveryMethod::Pickup => Money::zero(currency),
        };
        let mut order = Self {
            id: Uuid::now_v7(),
            order_number: format!("ORD-{:08}", rand::random::<u32>() % 100_000_000),
            customer: Customer { name: form.customer_name.trim().to_string(), phone: form.phone.trim().to_string(), email: form.email.clone() },
            status: OrderStatus::Pending,
            delivery: form.delivery,
            address: form.address.clone().filter(|_| form.delivery == DeliveryMethod::Delivery),
            payment: form.payment,
            change_for: form.change_for.map(|c| Money::new(c, currency)),
            notes: form.notes.clone(),
            items,
            subtotal: Money::zero(currency),
            total: Money::zero(currency),
            delivery_fee,
            created_at: Utc::now(),
            events: vec![],
        };
        order.recalculate();
        if let Some(change) = &order.change_for {
            if change.amount() < order.total.amount() { return Err(OrderError::InsufficientChange); }
        }
        order.raise_event(DomainEvent::Order(OrderEvent::Created { order_id: order.id.to_string(), order_number: order.order_number.clone(), total: order.total.amount() }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn customer(&self) -> &Customer { &self.customer }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn delivery(&self) -> DeliveryMethod { self.delivery }
    pub fn address(&self) -> Option<&Address> { self.address.as_ref() }
    pub fn payment(&self) -> PaymentMethod { self.payment }
    pub fn change_for(&self) -> Option<&Money> { self.change_for.as_ref() }
    pub fn notes(&self) -> Option<&str> { self.notes.as_deref() }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn delivery_fee(&self) -> &Money { &self.delivery_fee }
    pub fn total(&self) -> &Money { &self.total }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Marks the order as accepted by the backend, which may assign its own order number.
    pub fn confirm(&mut self, order_number: Option<String>) {
        if let Some(number) = order_number { self.order_number = number; }
        self.status = OrderStatus::Confirmed;
        self.raise_event(DomainEvent::Order(OrderEvent::Confirmed { order_id: self.id.to_string(), total: self.total.amount() }));
    }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().fold(Money::zero(self.delivery_fee.currency()), |acc, i| acc.add(&i.total).unwrap_or(acc));
        self.total = self.subtotal.add(&self.delivery_fee).unwrap_or(self.subtotal.clone());
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, InsufficientChange }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::NoItems => write!(f, "No items"), Self::InsufficientChange => write!(f, "Change amount is lower than the order total") }
    }
}
