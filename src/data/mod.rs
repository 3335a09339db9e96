//! Data layer: the column table, where it comes from and where it is kept.
//!
//! Architecture:
//! ```text
//!  raw .txt / .zip entry        cache-store://dir
//!        │                            │
//!        ▼                            │
//!   ┌──────────┐                      │
//!   │  loader   │  parse → SensorFrame │
//!   └──────────┘                      │
//!        │                            ▼
//!        │                     ┌────────────┐
//!        └──────► ingest ◄──── │   cache     │  parquet per ExperimentKey
//!                   │          └────────────┘
//!                   ▼                 ▲
//!            ┌──────────────┐         │
//!            │ SensorFrame   │ ────────┘  persist after reconstruction
//!            └──────────────┘
//! ```
//!
//! `select` enumerates experiment keys and loads them back out of a store.

pub mod cache;
pub mod ingest;
pub mod loader;
pub mod locator;
pub mod model;
pub mod select;
