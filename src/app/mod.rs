//! Application layer containing business logic and shared state.

pub mod catalog;
pub mod lending;
pub mod membership;
pub mod state;

pub use catalog::CatalogService;
pub use lending::LendingService;
pub use membership::MembershipService;
pub use state::AppState;
