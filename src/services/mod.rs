// Outbound collaborators
pub mod carrier;
pub mod email;
pub mod payments;

// Checkout and order lifecycle
pub mod checkout;
pub mod orders;
pub mod reconciliation;
pub mod shipments;

// Storefront state
pub mod discounts;
pub mod reviews;
pub mod stock;
pub mod wishlists;

// Service factory for dependency injection
pub mod factory;
