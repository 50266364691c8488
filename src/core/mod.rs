pub mod db;
pub mod frequency;
pub mod participant;
pub mod scan;
pub mod settings;
