// Provisioning
pub mod provision;

// Kernel build
pub mod kernel;

// Inspection and setup
pub mod config;
pub mod doctor;
pub mod steps;
