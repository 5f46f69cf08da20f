//! Command modules. Each module registers its commands, components and
//! modals against the shared registry at bootstrap; the business logic
//! behind them lives in external RPC services the handlers treat as opaque.

pub mod backups;
