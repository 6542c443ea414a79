pub mod knowledge;
pub mod language;
pub mod message;
pub mod persona;
pub mod report;
