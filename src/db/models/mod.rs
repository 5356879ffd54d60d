//! Database models split into domain-specific modules.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use address::*;
pub use cart::*;
pub use order::*;
pub use product::*;
pub use user::*;
