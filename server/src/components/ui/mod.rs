pub mod avatar;
pub mod badge;
pub mod button;
pub mod heading;
pub mod nav_buttons;
