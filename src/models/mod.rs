pub mod audit;
pub mod classification;
pub mod document;
pub mod operation;
pub mod processing;
pub mod record;
