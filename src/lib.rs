//! EduConnect: curriculum, grading, scheduling and AI tutoring service.

pub mod api;
pub mod config;
pub mod db;
pub mod flows;
pub mod models;
