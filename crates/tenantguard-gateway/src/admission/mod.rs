//! Admission Controller: per-key sliding windows and a threat-pattern scan.

pub mod controller;
pub mod scan;
pub mod window;

pub use controller::{AdmissionController, TrafficClass, WindowKey};
pub use scan::{ScanLocation, ScanVerdict, ThreatFamily, ThreatMatch, ThreatScanner};
pub use window::RateWindow;
