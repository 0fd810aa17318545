pub mod coords;
pub mod demand;
pub mod equilibrium;
pub mod mode_choice;
pub mod oracle;
pub mod segments;
pub mod service_level;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
