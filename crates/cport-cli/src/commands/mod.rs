pub mod predict;
pub mod predictors;
