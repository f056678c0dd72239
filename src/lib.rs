pub mod app;
pub mod collect;
pub mod ui;
