#![warn(missing_docs)]
//! This is the documentation for the **NanoMi optics** package, the paraxial ray-transfer engine of the NanoMi
//! open-source electron microscope.
//!
//! Lenses are modelled as thin lenses acting on `[height, angle]` ray vectors through 2x2 transfer (ABCD)
//! matrices. An [`OpticalChain`](chain::OpticalChain) traces rays from a source or sample plane through the active
//! lenses to a screen and reports the image planes and magnifications of every stage. On top of that the crate
//! offers
//!   - a bounded least-squares search of a focal length fulfilling an imaging condition ([`optimizer`])
//!   - the excitation calibration of the NanoMi lenses ([`excitation`])
//!   - the complete NanoMi column with CSV export and SVG ray diagrams ([`column`], [`reporter`], [`plottable`])
pub mod chain;
pub mod column;
pub mod console;
pub mod error;
pub mod excitation;
pub mod lens;
pub mod optimizer;
pub mod plottable;
pub mod ray;
pub mod reporter;
pub mod transfer;
pub mod utils;
