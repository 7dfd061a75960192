pub mod form;
pub mod gallery;
pub mod layout;
pub mod ui;
