//! auspice-deploy: CLI for promoting Auspice builds from staging to
//! production. All business logic lives in `auspice-deploy-core`; this crate
//! is argument parsing, logging setup and exit-status handling only.

pub mod cli;
