mod bookkeeping;
mod production;
mod reset;
mod residents;
mod upkeep;

pub use bookkeeping::BookkeepingSystem;
pub use production::ProductionSystem;
pub use reset::ResetSystem;
pub use residents::{ResidentsSystem, EDUCATION_INTERVAL_DAYS};
pub use upkeep::UpkeepSystem;
