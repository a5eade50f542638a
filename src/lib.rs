//! Reader for UNESCO Institute for Statistics (UIS) bulk datasets.
//!
//! Datasets are published as zip archives of CSV files (raw observations,
//! label concordances and long-format metadata). This crate downloads an
//! archive, normalizes its members into one denormalized table and serves
//! filtered views over it, caching assembled datasets in memory per archive
//! location. A thin client for the query-based UIS API is included as an
//! alternative data source.

pub mod api;
pub mod archive;
pub mod cache;
pub mod catalog;
pub mod dataset;
pub mod error;
pub mod merge;
pub mod reader;
pub mod reshape;
pub mod table;
