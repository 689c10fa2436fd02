//! Log-based URC listener.
//!
//! Implements [`UrcListener`] by writing every dispatched URC to the `log`
//! facade.  Register it first to get a trace of everything the modem
//! announces; feature listeners registered after it still see each event.

use log::info;

use crate::at::{AtEvent, UrcListener, UrcPrefix};

/// Listener that logs every URC to the console.
#[derive(Debug, Default)]
pub struct LogUrcListener;

impl LogUrcListener {
    pub fn new() -> Self {
        Self
    }
}

impl UrcListener for LogUrcListener {
    fn on_urc(&self, event: &AtEvent<'_>) {
        match event.prefix {
            UrcPrefix::Plus => match event.params() {
                Some(params) => info!("URC | {} | {}", event.name(), params),
                None => info!("URC | {}", event.name()),
            },
            UrcPrefix::Caret => info!("URC | vendor | {}", event.payload),
        }
    }
}
