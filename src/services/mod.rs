pub mod achievement_service;
pub mod deferred_grant_service;
pub mod draw_service;
pub mod ledger_service;
pub mod prize_catalog_service;
pub mod reconciliation_service;
pub mod user_service;

pub use achievement_service::*;
pub use deferred_grant_service::*;
pub use draw_service::*;
pub use ledger_service::*;
pub use prize_catalog_service::*;
pub use reconciliation_service::*;
pub use user_service::*;
