//! Transport errors raised by chat channels

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("{channel} HTTP error ({status}): {body}")]
    Http {
        channel: &'static str,
        status: u16,
        body: String,
    },

    #[error("{channel} API error: {description}")]
    Api {
        channel: &'static str,
        description: String,
    },

    #[error("{0} returned ok but no result")]
    MissingResult(&'static str),

    #[error("Channel request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Channel is not configured: {0}")]
    NotConfigured(&'static str),
}
