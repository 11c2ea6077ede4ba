//! Signal processing building blocks for the mix graph.
//!
//! Everything here runs on the render side and works on one sample at a
//! time; nothing allocates after construction.

pub mod analyser;
pub mod automation;
pub mod filter;
pub mod mixer;
pub mod oscillator;
pub mod sampler;
pub mod voice;
