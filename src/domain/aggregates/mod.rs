//! Aggregates module
pub mod attribute;
pub mod selection;
pub mod variation;
pub mod editor;
pub mod product;
pub mod order;
pub mod cart;

pub use attribute::{AttributeError, AttributeGroup, AttributeKey, AttributeValue, Catalog, GradeBundle, GradeSize};
pub use selection::{GroupSelection, SelectionError, VariationSelection};
pub use variation::{Combination, GradeVariation, ProductVariation, VariationDefaults, VariationId, VariationKey, VariationKind};
pub use editor::{EditorCommand, EditorError, GenerationMode, Pick, VariationEditor};
pub use product::{Product, ProductError, ProductStatus};
pub use order::{Customer, LineItem, Order, OrderError, OrderStatus};
pub use cart::{Cart, CartError, CartItem};
