// src/handlers/mod.rs

pub mod admin;
pub mod generate;
pub mod projects;
pub mod quiz;
