pub mod aggregate_repository;
pub mod directory_repository;
pub mod raw_event_repository;
pub mod reference_repository;
pub mod share_repository;
