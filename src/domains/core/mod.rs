pub mod file_storage;
pub mod reference_guard;
pub mod repository;
pub mod transaction;
pub mod unit_of_work;

pub use reference_guard::ReferenceGuard;
pub use transaction::TransactionScope;
pub use unit_of_work::UnitOfWork;
