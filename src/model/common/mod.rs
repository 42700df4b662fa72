pub mod candidacy;
pub mod election;
pub mod sync;
