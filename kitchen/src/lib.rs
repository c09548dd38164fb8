//! Meal planning logic that doesn't need a database or a network.

pub mod aisle;
pub mod calendar;
pub mod ingredient;
pub mod pantry;
pub mod recipe;
pub mod settings;
pub mod shopping;
pub mod sync;
pub mod template;
pub mod week;
