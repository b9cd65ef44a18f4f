//! The browsing controller: application state, commands, control bindings
//! and the view model a front end renders.

pub mod commands;
pub mod controls;
pub mod events;
pub mod helpers;
pub mod proxy;
pub mod state;
pub mod tasks;
pub mod view_model;
