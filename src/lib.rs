pub mod active;
pub mod commands;
pub mod doctor;
pub mod error;
pub mod fs_utils;
pub mod installation;
pub mod paths;
pub mod state;
pub mod store;
pub mod switch;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
