//! Retail Store Map API Library
//!
//! Backend for a map-based retail dashboard: ingests CSV exports of store
//! performance metrics, reconciles stores per account, geocodes store
//! addresses through an external service, and serves stores joined with
//! their latest metrics to the map UI.
//!
//! # Modules
//!
//! - `auth`: Bearer-token validation against the hosted auth provider.
//! - `config`: Configuration management.
//! - `csv_format`: CSV header classification (growth vs absolute).
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `geocode_runner`: Batch geocoding over stores lacking coordinates.
//! - `geocoding`: External geocoder HTTP client and bounds validation.
//! - `handlers`: HTTP request handlers.
//! - `ingestion`: Upload orchestration (detect, normalize, reconcile, write).
//! - `metric_writer`: Bulk metric upserts.
//! - `models`: Core data models.
//! - `normalizer`: Row normalization and cell parsing.
//! - `rate_limit`: External-call pacing.
//! - `reconciler`: Store insert-vs-refresh partitioning.

pub mod auth;
pub mod config;
pub mod csv_format;
pub mod db;
pub mod errors;
pub mod geocode_runner;
pub mod geocoding;
pub mod handlers;
pub mod ingestion;
pub mod metric_writer;
pub mod models;
pub mod normalizer;
pub mod rate_limit;
pub mod reconciler;
