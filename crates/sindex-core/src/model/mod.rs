pub mod entity;
pub mod index;
pub mod template;
