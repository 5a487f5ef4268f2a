pub mod aggregate;
pub mod category;
pub mod directory;
pub mod period;
pub mod raw;
pub mod reconciliation;
pub mod settings;
pub mod share;
