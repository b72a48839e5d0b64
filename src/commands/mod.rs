pub mod common;
pub mod band;
pub mod dos;
pub mod info;
