pub mod ecosystem;
pub mod simulation;
