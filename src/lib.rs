//! Cardfinder - A credit card catalog service
//!
//! This library provides the catalog store, the search and facet engine,
//! the card presenter and the HTTP API built on top of them.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
