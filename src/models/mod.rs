// src/models/mod.rs
pub mod dispatch;
pub mod driver;
pub mod identity;
pub mod lifecycle;
pub mod money;
pub mod ride;

pub use dispatch::*;
pub use driver::*;
pub use identity::*;
pub use money::Money;
pub use ride::*;
