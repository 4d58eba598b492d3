//! Utility functions and types

pub mod data_loader;

pub use data_loader::{
    drop_measured_columns, frame_from_records, records_from_frame, DataLoader, DataSaver,
    FrameSummary,
};
