pub mod feedback;
pub mod interview;
pub mod resume;
