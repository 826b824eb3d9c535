//! # kernelkit
//!
//! Builds a kernel image from source and packages it as a flashable zip.
//!
//! The build is a fixed sequence of [`Stage`]s run by [`Pipeline`]:
//! download and verify a cross toolchain, clone the kernel and the
//! AnyKernel3 template, run the defconfig and the compile through `make`,
//! then zip the image into `<name>-<YYYYMMDD-HHMMSS>.zip`.
//!
//! External commands go through a [`sequencer::CommandRunner`], toolchain
//! downloads through a [`ToolchainSource`], so the whole pipeline can run in
//! tests against a [`MockSource`] and a fake runner.

pub mod archive;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod stage;
pub mod tools;

pub use config::{BuildConfig, ExtraRepo, ToolchainSpec, normalize_defconfig};
pub use error::{Error, ErrorCategory, Result};
pub use pipeline::{BuildReport, Pipeline, StageObserver, package_name};
pub use source::{FetchedArchive, MockSource, ToolchainSource};
pub use stage::Stage;
