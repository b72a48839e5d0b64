pub mod banddos;
pub mod dostable;
pub mod elements;
