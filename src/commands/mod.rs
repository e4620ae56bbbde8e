pub mod citation;
pub mod export;
pub mod harvest;
pub mod import;
pub mod inspect;
pub mod project;
pub mod query;
pub mod status;

mod pipeline;
