//! Penalty schemes and their overdue-day slabs

pub mod model;
pub mod repository;
pub mod service;

pub use model::{slab_for, validate_slabs, Scheme, SchemeDetail, SchemeRequest, Slab};
pub use service::SchemeService;
