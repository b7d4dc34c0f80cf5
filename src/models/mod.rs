pub mod achievement;
pub mod common;
pub mod draw;
pub mod grant;
pub mod ledger;

pub use achievement::*;
pub use common::*;
pub use draw::*;
pub use grant::*;
pub use ledger::*;
