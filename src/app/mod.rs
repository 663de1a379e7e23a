pub mod intro;
pub mod portfolio;
