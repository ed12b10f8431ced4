// src/lib.rs
pub mod config;
pub mod definitions;
pub mod extract;
pub mod fetch;
pub mod load;
pub mod problem;
pub mod retrieve;
pub mod states;
pub mod survey;
pub mod table;
pub mod tasks;
