// Domain row types mapped onto the relational schema.

pub mod cart;
pub mod delivered_order;
pub mod order;
pub mod otp;
pub mod payment;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem};
pub use delivered_order::{CustomerSnapshot, PartnerSnapshot};
pub use order::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentResult};
pub use otp::{Otp, OtpPurpose, RegistrationPayload};
pub use payment::{Payment, PaymentStatus};
pub use product::{Product, StockStatus};
pub use user::{PublicUser, User};
