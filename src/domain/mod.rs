//! Catalog domain: attribute catalog, variation generation, checkout
pub mod aggregates;
pub mod checkout;
pub mod combinations;
pub mod events;
pub mod value_objects;
