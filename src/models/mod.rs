// Persisted documents and their invariants
pub mod discount;
pub mod email;
pub mod order;
pub mod review;
pub mod stock;
pub mod wishlist;

pub use discount::{DiscountBook, DiscountCode};
pub use email::{
    DeliveryStatus, EmailKind, EmailMessage, EmailStats, EmailStatusRecord, QueuedEmail,
    ReminderType,
};
pub use order::{Order, OrderItem, OrderStatus, ShippingAddress};
pub use review::{PublicReview, Review, ReviewSummary};
pub use stock::{StockAction, StockLevels};
pub use wishlist::{Wishlist, WishlistItem};
