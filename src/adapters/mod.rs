// Adapters layer: concrete implementations for external systems
// (pricing http, chat, storage, spreadsheets).

pub mod pricing;
pub mod storage;
pub mod tabular;
pub mod telegram;
