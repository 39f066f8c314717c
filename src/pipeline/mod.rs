//! Pipeline stages for a license scan.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the vision backend can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ encode ──▶ llm ──▶ parse
//! (validate)  (base64)   (VLM)   (Key: Value → fields)
//! ```
//!
//! 1. [`upload`]  validate the caller's bytes and MIME type into a `LicenseImage`
//! 2. [`encode`]  base64-wrap the image for the multimodal request body
//! 3. [`llm`]     the `VisionBackend` seam; the only stage with network I/O
//! 4. [`parse`]   map the reply's labelled lines onto `ExtractionResult`

pub mod encode;
pub mod llm;
pub mod parse;
pub mod upload;
