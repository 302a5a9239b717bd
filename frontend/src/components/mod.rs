pub mod adjustments;
pub mod handlers;
pub mod header;
pub mod history;
pub mod queue;
pub mod results;
pub mod upload_section;
pub mod utils;
