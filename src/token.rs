//! Service token acquisition and refresh, one source per realm.

pub mod dto;
pub mod provider;
pub mod secret;
pub mod source;
